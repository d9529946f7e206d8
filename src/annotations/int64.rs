use crate::model::Field;
use crate::options::ext;

/// JSON representation for 64-bit integer fields.
///
/// The canonical mapping is decimal strings; `Number` emits a plain JSON
/// number and costs precision beyond 2^53 in JavaScript consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Int64Encoding {
    Unspecified,
    String,
    Number,
}

impl Int64Encoding {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::String,
            2 => Self::Number,
            _ => Self::Unspecified,
        }
    }
}

/// Reads the `int64_encoding` option off a field.
pub fn int64_encoding(field: &Field) -> Int64Encoding {
    field
        .options
        .get_enum(ext::INT64_ENCODING)
        .map_or(Int64Encoding::Unspecified, Int64Encoding::from_i32)
}

/// Whether the field asks for plain JSON number representation.
pub fn is_int64_number(field: &Field) -> bool {
    int64_encoding(field) == Int64Encoding::Number
}

#[cfg(test)]
mod tests {
    use super::{Int64Encoding, int64_encoding, is_int64_number};
    use crate::model::{Field, FieldKind};
    use crate::options::{OptionSet, ext};

    #[test]
    fn string_is_not_shape_affecting_number() {
        let field = Field::scalar("count", 1, FieldKind::Int64)
            .with_options(OptionSet::new().with_enum(ext::INT64_ENCODING, 1));
        assert_eq!(int64_encoding(&field), Int64Encoding::String);
        assert!(!is_int64_number(&field));
    }

    #[test]
    fn number_reads_back() {
        let field = Field::scalar("count", 1, FieldKind::Uint64)
            .with_options(OptionSet::new().with_enum(ext::INT64_ENCODING, 2));
        assert!(is_int64_number(&field));
    }
}
