//! Scalar value conversions between the canonical JSON encoding and the
//! annotated one.
//!
//! Every conversion here is exactly invertible: `recode` then `restore`
//! (or the reverse) yields the input back. Inputs are the canonical
//! protobuf JSON forms: standard padded base64 for bytes, decimal strings
//! for 64-bit integers, symbolic names for enums, RFC 3339 for timestamps.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::annotations::{BytesEncoding, TimestampFormat};
use crate::plan::EnumValueSpec;

/// Largest integer magnitude JSON consumers hold exactly (2^53).
pub const MAX_SAFE_INTEGER: u64 = 1 << 53;

/// Re-encodes canonical standard base64 into the annotated encoding.
pub fn recode_bytes(canonical: &str, encoding: BytesEncoding) -> Result<String, String> {
    let raw = STANDARD
        .decode(canonical)
        .map_err(|err| format!("invalid base64 input: {err}"))?;
    Ok(match encoding {
        BytesEncoding::Unspecified | BytesEncoding::Base64 => canonical.to_owned(),
        BytesEncoding::Base64Raw => STANDARD_NO_PAD.encode(&raw),
        BytesEncoding::Base64Url => URL_SAFE.encode(&raw),
        BytesEncoding::Base64UrlRaw => URL_SAFE_NO_PAD.encode(&raw),
        BytesEncoding::Hex => hex::encode(&raw),
    })
}

/// Restores canonical standard base64 from the annotated encoding.
pub fn restore_bytes(encoded: &str, encoding: BytesEncoding) -> Result<String, String> {
    let raw = match encoding {
        BytesEncoding::Unspecified | BytesEncoding::Base64 => return Ok(encoded.to_owned()),
        BytesEncoding::Base64Raw => STANDARD_NO_PAD.decode(encoded),
        BytesEncoding::Base64Url => URL_SAFE.decode(encoded),
        BytesEncoding::Base64UrlRaw => URL_SAFE_NO_PAD.decode(encoded),
        BytesEncoding::Hex => {
            return hex::decode(encoded)
                .map(|raw| STANDARD.encode(raw))
                .map_err(|err| format!("invalid hex input: {err}"));
        }
    };
    raw.map(|raw| STANDARD.encode(raw))
        .map_err(|err| format!("invalid {} input: {err}", encoding.as_str()))
}

/// Canonical decimal string to JSON number.
pub fn int64_number(canonical: &str, unsigned: bool) -> Result<Number, String> {
    if unsigned {
        let value: u64 = canonical
            .parse()
            .map_err(|err| format!("invalid uint64 string {canonical:?}: {err}"))?;
        Ok(Number::from(value))
    } else {
        let value: i64 = canonical
            .parse()
            .map_err(|err| format!("invalid int64 string {canonical:?}: {err}"))?;
        Ok(Number::from(value))
    }
}

/// JSON number back to the canonical decimal string.
pub fn int64_string(number: &Number, unsigned: bool) -> Result<String, String> {
    if unsigned {
        number
            .as_u64()
            .map(|value| value.to_string())
            .ok_or_else(|| format!("JSON number {number} is not a uint64"))
    } else {
        number
            .as_i64()
            .map(|value| value.to_string())
            .ok_or_else(|| format!("JSON number {number} is not an int64"))
    }
}

/// Symbolic enum name to its numeric value.
pub fn enum_number(values: &[EnumValueSpec], name: &str) -> Result<i64, String> {
    values
        .iter()
        .find(|value| value.name == name)
        .map(|value| i64::from(value.number))
        .ok_or_else(|| format!("unknown enum value name {name:?}"))
}

/// Numeric enum value to its symbolic name. The first declared value wins
/// for numbers shared through `allow_alias`.
pub fn enum_name(values: &[EnumValueSpec], number: i64) -> Result<String, String> {
    values
        .iter()
        .find(|value| i64::from(value.number) == number)
        .map(|value| value.name.clone())
        .ok_or_else(|| format!("unknown enum value number {number}"))
}

/// Symbolic enum name to its declared alias; names without an alias pass
/// through unchanged.
pub fn enum_alias(values: &[EnumValueSpec], name: &str) -> Result<String, String> {
    let value = values
        .iter()
        .find(|value| value.name == name)
        .ok_or_else(|| format!("unknown enum value name {name:?}"))?;
    Ok(value.alias.clone().unwrap_or_else(|| value.name.clone()))
}

/// Alias (or plain name) back to the symbolic name.
pub fn enum_unalias(values: &[EnumValueSpec], alias: &str) -> Result<String, String> {
    if let Some(value) = values
        .iter()
        .find(|value| value.alias.as_deref() == Some(alias))
    {
        return Ok(value.name.clone());
    }
    values
        .iter()
        .find(|value| value.name == alias && value.alias.is_none())
        .map(|value| value.name.clone())
        .ok_or_else(|| format!("unknown enum value alias {alias:?}"))
}

/// RFC 3339 string to the annotated timestamp form.
pub fn timestamp_value(canonical: &str, format: TimestampFormat) -> Result<Value, String> {
    let parsed = DateTime::parse_from_rfc3339(canonical)
        .map_err(|err| format!("invalid RFC 3339 timestamp {canonical:?}: {err}"))?
        .with_timezone(&Utc);
    Ok(match format {
        TimestampFormat::Unspecified | TimestampFormat::Rfc3339 => Value::String(canonical.to_owned()),
        TimestampFormat::UnixSeconds => Value::Number(Number::from(parsed.timestamp())),
        TimestampFormat::UnixMillis => Value::Number(Number::from(parsed.timestamp_millis())),
        TimestampFormat::Date => Value::String(parsed.format("%Y-%m-%d").to_string()),
    })
}

/// Annotated timestamp form back to an RFC 3339 string in UTC.
pub fn timestamp_rfc3339(value: &Value, format: TimestampFormat) -> Result<String, String> {
    let parsed = match format {
        TimestampFormat::Unspecified | TimestampFormat::Rfc3339 => {
            let text = expect_string(value, "RFC 3339 timestamp")?;
            return Ok(text.to_owned());
        }
        TimestampFormat::UnixSeconds => {
            let seconds = expect_int(value, "unix timestamp")?;
            DateTime::<Utc>::from_timestamp(seconds, 0)
                .ok_or_else(|| format!("unix timestamp {seconds} out of range"))?
        }
        TimestampFormat::UnixMillis => {
            let millis = expect_int(value, "unix millisecond timestamp")?;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| format!("unix millisecond timestamp {millis} out of range"))?
        }
        TimestampFormat::Date => {
            let text = expect_string(value, "date")?;
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|err| format!("invalid date {text:?}: {err}"))?;
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| format!("invalid date {text:?}"))?;
            midnight.and_utc()
        }
    };
    Ok(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn expect_string<'a>(value: &'a Value, what: &str) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a JSON string for {what}, got {value}"))
}

fn expect_int(value: &Value, what: &str) -> Result<i64, String> {
    value
        .as_i64()
        .ok_or_else(|| format!("expected a JSON integer for {what}, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::{
        enum_alias, enum_name, enum_number, enum_unalias, int64_number, int64_string, recode_bytes,
        restore_bytes, timestamp_rfc3339, timestamp_value,
    };
    use crate::annotations::{BytesEncoding, TimestampFormat};
    use crate::plan::EnumValueSpec;
    use serde_json::{Value, json};

    #[test]
    fn bytes_roundtrip_every_encoding() {
        // "Hello?>" exercises the +/ vs -_ alphabet difference.
        let canonical = "SGVsbG8/Pg==";
        for encoding in [
            BytesEncoding::Base64Raw,
            BytesEncoding::Base64Url,
            BytesEncoding::Base64UrlRaw,
            BytesEncoding::Hex,
        ] {
            let encoded = recode_bytes(canonical, encoding).unwrap();
            assert_eq!(restore_bytes(&encoded, encoding).unwrap(), canonical);
        }
        assert_eq!(
            recode_bytes(canonical, BytesEncoding::Base64Url).unwrap(),
            "SGVsbG8_Pg=="
        );
        assert_eq!(
            recode_bytes(canonical, BytesEncoding::Hex).unwrap(),
            "48656c6c6f3f3e"
        );
    }

    #[test]
    fn int64_number_roundtrips_signed_and_unsigned() {
        let number = int64_number("-42", false).unwrap();
        assert_eq!(int64_string(&number, false).unwrap(), "-42");
        let number = int64_number("18446744073709551615", true).unwrap();
        assert_eq!(int64_string(&number, true).unwrap(), "18446744073709551615");
        assert!(int64_number("not-a-number", false).is_err());
    }

    fn status_values() -> Vec<EnumValueSpec> {
        vec![
            EnumValueSpec {
                name: "STATUS_UNSPECIFIED".to_owned(),
                number: 0,
                alias: None,
            },
            EnumValueSpec {
                name: "STATUS_ACTIVE".to_owned(),
                number: 1,
                alias: Some("active".to_owned()),
            },
        ]
    }

    #[test]
    fn enum_number_roundtrips() {
        let values = status_values();
        assert_eq!(enum_number(&values, "STATUS_ACTIVE").unwrap(), 1);
        assert_eq!(enum_name(&values, 1).unwrap(), "STATUS_ACTIVE");
        assert!(enum_number(&values, "NOPE").is_err());
    }

    #[test]
    fn enum_alias_falls_back_to_name() {
        let values = status_values();
        assert_eq!(enum_alias(&values, "STATUS_ACTIVE").unwrap(), "active");
        assert_eq!(
            enum_alias(&values, "STATUS_UNSPECIFIED").unwrap(),
            "STATUS_UNSPECIFIED"
        );
        assert_eq!(enum_unalias(&values, "active").unwrap(), "STATUS_ACTIVE");
        assert_eq!(
            enum_unalias(&values, "STATUS_UNSPECIFIED").unwrap(),
            "STATUS_UNSPECIFIED"
        );
    }

    #[test]
    fn timestamp_unix_millis_matches_known_instant() {
        let value = timestamp_value("2023-11-14T22:13:20Z", TimestampFormat::UnixMillis).unwrap();
        assert_eq!(value, json!(1_700_000_000_000_i64));
        let back = timestamp_rfc3339(&value, TimestampFormat::UnixMillis).unwrap();
        assert_eq!(back, "2023-11-14T22:13:20Z");
    }

    #[test]
    fn timestamp_date_truncates_to_midnight() {
        let value = timestamp_value("2023-11-14T22:13:20Z", TimestampFormat::Date).unwrap();
        assert_eq!(value, Value::String("2023-11-14".to_owned()));
        let back = timestamp_rfc3339(&value, TimestampFormat::Date).unwrap();
        assert_eq!(back, "2023-11-14T00:00:00Z");
    }

    #[test]
    fn timestamp_unix_seconds_roundtrips() {
        let value = timestamp_value("2023-11-14T22:13:20Z", TimestampFormat::UnixSeconds).unwrap();
        assert_eq!(value, json!(1_700_000_000_i64));
        assert_eq!(
            timestamp_rfc3339(&value, TimestampFormat::UnixSeconds).unwrap(),
            "2023-11-14T22:13:20Z"
        );
    }
}
