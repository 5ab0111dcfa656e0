use std::error::Error;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};

use crate::types::Value;

use super::wire;

/// Raw wire bytes of any column type.
struct RawBytes(Vec<u8>);

impl<'a> FromSql<'a> for RawBytes {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawBytes(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// How one result column is decoded, decided once when the statement is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Bool,
    Text,
    /// Enum labels: UTF-8 text on the wire, but not accepted by `String`'s decoder.
    Label,
    Json,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Numeric,
    Uuid,
    Interval,
    Bytes,
}

impl ColumnKind {
    pub(crate) fn of(ty: &Type) -> Self {
        match *ty {
            Type::INT2 => ColumnKind::Int2,
            Type::INT4 => ColumnKind::Int4,
            Type::INT8 => ColumnKind::Int8,
            Type::OID => ColumnKind::Oid,
            Type::FLOAT4 => ColumnKind::Float4,
            Type::FLOAT8 => ColumnKind::Float8,
            Type::BOOL => ColumnKind::Bool,
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                ColumnKind::Text
            }
            Type::JSON | Type::JSONB => ColumnKind::Json,
            Type::DATE => ColumnKind::Date,
            Type::TIME => ColumnKind::Time,
            Type::TIMESTAMP => ColumnKind::Timestamp,
            Type::TIMESTAMPTZ => ColumnKind::TimestampTz,
            Type::NUMERIC => ColumnKind::Numeric,
            Type::UUID => ColumnKind::Uuid,
            Type::INTERVAL => ColumnKind::Interval,
            ref other if matches!(other.kind(), Kind::Enum(_)) => ColumnKind::Label,
            _ => ColumnKind::Bytes,
        }
    }

    /// Decode column `idx` of `row`; SQL NULL is `Value::Null` for every kind.
    ///
    /// # Errors
    /// Returns the decoder's error if the wire bytes do not match the column type.
    pub(crate) fn decode(
        self,
        row: &Row,
        idx: usize,
    ) -> Result<Value, Box<dyn Error + Sync + Send>> {
        fn get<'a, T: FromSql<'a>>(
            row: &'a Row,
            idx: usize,
        ) -> Result<Option<T>, Box<dyn Error + Sync + Send>> {
            row.try_get::<_, Option<T>>(idx).map_err(Into::into)
        }

        let value = match self {
            ColumnKind::Int2 => get::<i16>(row, idx)?.map(|v| Value::Integer(i64::from(v))),
            ColumnKind::Int4 => get::<i32>(row, idx)?.map(|v| Value::Integer(i64::from(v))),
            ColumnKind::Int8 => get::<i64>(row, idx)?.map(Value::Integer),
            ColumnKind::Oid => get::<u32>(row, idx)?.map(|v| Value::Integer(i64::from(v))),
            ColumnKind::Float4 => get::<f32>(row, idx)?.map(|v| Value::Real(f64::from(v))),
            ColumnKind::Float8 => get::<f64>(row, idx)?.map(Value::Real),
            ColumnKind::Bool => get::<bool>(row, idx)?.map(Value::Boolean),
            ColumnKind::Text => get::<String>(row, idx)?.map(Value::Text),
            ColumnKind::Label => get::<RawBytes>(row, idx)?
                .map(|raw| Value::Text(String::from_utf8_lossy(&raw.0).into_owned())),
            ColumnKind::Json => get::<serde_json::Value>(row, idx)?.map(|v| Value::Text(v.to_string())),
            ColumnKind::Date => get::<NaiveDate>(row, idx)?.map(Value::from),
            ColumnKind::Time => get::<NaiveTime>(row, idx)?
                .map(|v| Value::Text(v.format("%H:%M:%S%.f").to_string())),
            ColumnKind::Timestamp => get::<NaiveDateTime>(row, idx)?.map(Value::from),
            ColumnKind::TimestampTz => get::<DateTime<Utc>>(row, idx)?
                .map(|v| Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())),
            ColumnKind::Numeric => match get::<RawBytes>(row, idx)? {
                Some(raw) => Some(Value::Text(wire::decode_numeric(&raw.0)?)),
                None => None,
            },
            ColumnKind::Uuid => match get::<RawBytes>(row, idx)? {
                Some(raw) => Some(Value::Text(wire::decode_uuid(&raw.0)?)),
                None => None,
            },
            ColumnKind::Interval => match get::<RawBytes>(row, idx)? {
                Some(raw) => Some(Value::Text(wire::decode_interval(&raw.0)?)),
                None => None,
            },
            ColumnKind::Bytes => get::<RawBytes>(row, idx)?.map(|raw| Value::Blob(raw.0)),
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

/// Decode a whole row through the statement's column plan.
///
/// # Errors
/// Returns the first column decoding failure.
pub(crate) fn extract_row(
    row: &Row,
    kinds: &[ColumnKind],
) -> Result<Vec<Value>, Box<dyn Error + Sync + Send>> {
    kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| kind.decode(row, idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_kinds_follow_declared_types() {
        assert_eq!(ColumnKind::of(&Type::INT2), ColumnKind::Int2);
        assert_eq!(ColumnKind::of(&Type::OID), ColumnKind::Oid);
        assert_eq!(ColumnKind::of(&Type::BPCHAR), ColumnKind::Text);
        assert_eq!(ColumnKind::of(&Type::JSONB), ColumnKind::Json);
        assert_eq!(ColumnKind::of(&Type::TIMESTAMPTZ), ColumnKind::TimestampTz);
        assert_eq!(ColumnKind::of(&Type::NUMERIC), ColumnKind::Numeric);
        assert_eq!(ColumnKind::of(&Type::BYTEA), ColumnKind::Bytes);
        assert_eq!(ColumnKind::of(&Type::INET), ColumnKind::Bytes);
        assert_eq!(ColumnKind::of(&Type::INT4_ARRAY), ColumnKind::Bytes);
    }

    #[test]
    fn enum_types_decode_as_labels() {
        let mood = Type::new(
            "mood".into(),
            16_400,
            Kind::Enum(vec!["happy".into(), "sad".into()]),
            "public".into(),
        );
        assert_eq!(ColumnKind::of(&mood), ColumnKind::Label);
    }
}
