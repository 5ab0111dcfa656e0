use std::error::Error;

use chrono::{DateTime, NaiveTime, Utc};
use tokio_postgres::Statement;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use tokio_util::bytes::BytesMut;

use crate::error::SqlBridgeError;
use crate::types::Value;

use super::wire;

type EncodeResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

fn rejects(value: &Value, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot send {} as {}", value.kind(), ty.name()).into()
}

fn is_text_like(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

#[allow(clippy::cast_precision_loss)]
fn integer_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => {
            wire::encode_numeric(&i.to_string(), out)?;
            Ok(IsNull::No)
        }
        ref other if is_text_like(other) => i.to_string().to_sql(ty, out),
        _ => Err(rejects(&Value::Integer(i), ty)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn real_to_sql(f: f64, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::NUMERIC => {
            wire::encode_numeric(&f.to_string(), out)?;
            Ok(IsNull::No)
        }
        ref other if is_text_like(other) => f.to_string().to_sql(ty, out),
        _ => Err(rejects(&Value::Real(f), ty)),
    }
}

fn text_to_sql(value: &Value, s: &str, ty: &Type, out: &mut BytesMut) -> EncodeResult {
    match *ty {
        ref other if is_text_like(other) => s.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::DATE => value
            .to_date()
            .ok_or_else(|| format!("`{s}` is not a YYYY-MM-DD date"))?
            .to_sql(ty, out),
        Type::TIME => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")?.to_sql(ty, out),
        Type::TIMESTAMP => value
            .to_timestamp()
            .ok_or_else(|| format!("`{s}` is not a timestamp"))?
            .to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(value, s)?.to_sql(ty, out),
        Type::NUMERIC => {
            wire::encode_numeric(s, out)?;
            Ok(IsNull::No)
        }
        Type::UUID => {
            wire::encode_uuid(s, out)?;
            Ok(IsNull::No)
        }
        // Enum labels travel as their text in the binary format.
        ref other if matches!(other.kind(), Kind::Enum(_)) => {
            out.extend_from_slice(s.as_bytes());
            Ok(IsNull::No)
        }
        _ => Err(rejects(value, ty)),
    }
}

/// RFC 3339 first; a zone-less timestamp is taken as UTC.
fn parse_timestamptz(value: &Value, s: &str) -> Result<DateTime<Utc>, Box<dyn Error + Sync + Send>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    value
        .to_timestamp()
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("`{s}` is not a timestamp with time zone").into())
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> EncodeResult {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(i) => integer_to_sql(*i, ty, out),
            Value::Real(f) => real_to_sql(*f, ty, out),
            Value::Text(s) => text_to_sql(self, s, ty, out),
            Value::Blob(b) if *ty == Type::BYTEA => b.as_slice().to_sql(ty, out),
            Value::Boolean(b) if *ty == Type::BOOL => b.to_sql(ty, out),
            Value::Blob(_) | Value::Boolean(_) => Err(rejects(self, ty)),
        }
    }

    // Compatibility is decided per value in `to_sql`.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Encode every parameter against the types the server declared for `statement`.
///
/// Runs before anything is sent so an incompatible value never reaches the wire.
///
/// # Errors
/// Returns `SqlBridgeError::BindingError` naming the first parameter that cannot be encoded.
pub(crate) fn check_binding(statement: &Statement, params: &[Value]) -> Result<(), SqlBridgeError> {
    let types = statement.params();
    if types.len() != params.len() {
        return Err(SqlBridgeError::BindingError(format!(
            "statement expects {} parameters but {} were bound",
            types.len(),
            params.len()
        )));
    }
    let mut scratch = BytesMut::new();
    for (idx, (value, ty)) in params.iter().zip(types).enumerate() {
        scratch.clear();
        value.to_sql_checked(ty, &mut scratch).map_err(|e| {
            SqlBridgeError::BindingError(format!("parameter ${}: {e}", idx + 1))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, ty: &Type) -> Result<Vec<u8>, String> {
        let mut buf = BytesMut::new();
        match value.to_sql(ty, &mut buf) {
            Ok(IsNull::No) => Ok(buf.to_vec()),
            Ok(IsNull::Yes) => Ok(Vec::new()),
            Err(e) => Err(e.to_string()),
        }
    }

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(encode(&Value::Integer(7), &Type::INT2).unwrap(), vec![0, 7]);
        assert_eq!(
            encode(&Value::Integer(7), &Type::INT4).unwrap(),
            vec![0, 0, 0, 7]
        );
        assert!(encode(&Value::Integer(70_000), &Type::INT2).is_err());
        assert!(encode(&Value::Integer(i64::MAX), &Type::INT4).is_err());
        assert_eq!(encode(&Value::Integer(i64::MAX), &Type::INT8).unwrap().len(), 8);
    }

    #[test]
    fn text_is_parsed_for_structured_types() {
        assert!(encode(&Value::Text("{\"a\": 1}".into()), &Type::JSONB).is_ok());
        assert!(encode(&Value::Text("{not json".into()), &Type::JSONB).is_err());
        assert!(encode(&Value::Text("2024-02-29".into()), &Type::DATE).is_ok());
        assert!(encode(&Value::Text("2024-02-30".into()), &Type::DATE).is_err());
        assert!(encode(&Value::Text("2024-01-02 03:04:05".into()), &Type::TIMESTAMP).is_ok());
        assert!(encode(&Value::Text("2024-01-02T03:04:05+02:00".into()), &Type::TIMESTAMPTZ).is_ok());
        assert!(encode(&Value::Text("2024-01-02 03:04:05".into()), &Type::TIMESTAMPTZ).is_ok());
        assert_eq!(
            encode(&Value::Text("abc".into()), &Type::TEXT).unwrap(),
            b"abc".to_vec()
        );
    }

    #[test]
    fn strict_tags() {
        assert!(encode(&Value::Boolean(true), &Type::INT4).is_err());
        assert!(encode(&Value::Blob(vec![1]), &Type::TEXT).is_err());
        assert!(encode(&Value::Text("1".into()), &Type::INT4).is_err());
        assert_eq!(encode(&Value::Boolean(true), &Type::BOOL).unwrap(), vec![1]);
        assert_eq!(encode(&Value::Blob(vec![9, 8]), &Type::BYTEA).unwrap(), vec![9, 8]);
        assert_eq!(encode(&Value::Null, &Type::INT4).unwrap(), Vec::<u8>::new());
    }
}
