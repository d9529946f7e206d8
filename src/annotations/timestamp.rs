use crate::model::Field;
use crate::options::ext;

/// JSON representation for `google.protobuf.Timestamp` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    Unspecified,
    Rfc3339,
    UnixSeconds,
    UnixMillis,
    /// Date-only `YYYY-MM-DD`; the time of day is dropped.
    Date,
}

impl TimestampFormat {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Rfc3339,
            2 => Self::UnixSeconds,
            3 => Self::UnixMillis,
            4 => Self::Date,
            _ => Self::Unspecified,
        }
    }
}

/// Reads the `timestamp_format` option off a field.
pub fn timestamp_format(field: &Field) -> TimestampFormat {
    field
        .options
        .get_enum(ext::TIMESTAMP_FORMAT)
        .map_or(TimestampFormat::Unspecified, TimestampFormat::from_i32)
}

#[cfg(test)]
mod tests {
    use super::{TimestampFormat, timestamp_format};
    use crate::model::{Field, TIMESTAMP_TYPE};
    use crate::options::{OptionSet, ext};

    #[test]
    fn unix_millis_reads_back() {
        let field = Field::message("created_at", 1, TIMESTAMP_TYPE)
            .with_options(OptionSet::new().with_enum(ext::TIMESTAMP_FORMAT, 3));
        assert_eq!(timestamp_format(&field), TimestampFormat::UnixMillis);
        assert!(field.is_timestamp());
    }
}
