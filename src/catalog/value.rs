//! Driver-independent row values and their SQL literal rendering

/// A single column value of a fetched row
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    /// Raw column bytes (strings, decimals, blobs, json)
    Bytes(Vec<u8>),
    /// year, month, day, hour, minute, second, microsecond
    Date(u16, u8, u8, u8, u8, u8, u32),
    /// negative, days, hours, minutes, seconds, microseconds
    Time(bool, u32, u8, u8, u8, u32),
}

impl SqlValue {
    /// Render the value as a literal that MySQL parses back to the same value
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::UInt(v) => v.to_string(),
            SqlValue::Float(v) if v.is_finite() => v.to_string(),
            SqlValue::Double(v) if v.is_finite() => v.to_string(),
            SqlValue::Float(_) | SqlValue::Double(_) => "NULL".to_string(),
            SqlValue::Bytes(bytes) => bytes_literal(bytes),
            SqlValue::Date(year, month, day, hour, minute, second, micros) => {
                let mut out = format!("'{year:04}-{month:02}-{day:02}");
                if *hour != 0 || *minute != 0 || *second != 0 || *micros != 0 {
                    out.push_str(&format!(" {hour:02}:{minute:02}:{second:02}"));
                    if *micros != 0 {
                        out.push_str(&format!(".{micros:06}"));
                    }
                }
                out.push('\'');
                out
            }
            SqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
                let sign = if *negative { "-" } else { "" };
                let total_hours = u64::from(*days) * 24 + u64::from(*hours);
                let mut out = format!("'{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
                if *micros != 0 {
                    out.push_str(&format!(".{micros:06}"));
                }
                out.push('\'');
                out
            }
        }
    }
}

fn bytes_literal(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => quote_string(text),
        Err(_) => format!("X'{}'", hex::encode_upper(bytes)),
    }
}

/// Quote a string literal with MySQL escaping
pub fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

impl From<mysql_async::Value> for SqlValue {
    fn from(value: mysql_async::Value) -> Self {
        use mysql_async::Value;

        match value {
            Value::NULL => SqlValue::Null,
            Value::Int(v) => SqlValue::Int(v),
            Value::UInt(v) => SqlValue::UInt(v),
            Value::Float(v) => SqlValue::Float(v),
            Value::Double(v) => SqlValue::Double(v),
            Value::Bytes(b) => SqlValue::Bytes(b),
            Value::Date(y, mo, d, h, mi, s, us) => SqlValue::Date(y, mo, d, h, mi, s, us),
            Value::Time(neg, d, h, mi, s, us) => SqlValue::Time(neg, d, h, mi, s, us),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literals() {
        assert_eq!(SqlValue::Null.to_sql_literal(), "NULL");
        assert_eq!(SqlValue::Int(-42).to_sql_literal(), "-42");
        assert_eq!(SqlValue::UInt(u64::MAX).to_sql_literal(), "18446744073709551615");
        assert_eq!(SqlValue::Double(1.5).to_sql_literal(), "1.5");
        assert_eq!(SqlValue::Double(f64::NAN).to_sql_literal(), "NULL");
    }

    #[test]
    fn test_string_escaping() {
        let value = SqlValue::Bytes(b"it's a \\ path\nline".to_vec());
        assert_eq!(value.to_sql_literal(), r"'it\'s a \\ path\nline'");
        assert_eq!(SqlValue::Bytes(Vec::new()).to_sql_literal(), "''");
    }

    #[test]
    fn test_binary_as_hex() {
        let value = SqlValue::Bytes(vec![0xff, 0x00, 0x10]);
        assert_eq!(value.to_sql_literal(), "X'FF0010'");
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(
            SqlValue::Date(2024, 2, 29, 0, 0, 0, 0).to_sql_literal(),
            "'2024-02-29'"
        );
        assert_eq!(
            SqlValue::Date(2024, 2, 29, 13, 5, 9, 120).to_sql_literal(),
            "'2024-02-29 13:05:09.000120'"
        );
        assert_eq!(
            SqlValue::Time(true, 1, 2, 3, 4, 0).to_sql_literal(),
            "'-26:03:04'"
        );
    }
}
