use crate::model::{Enum, EnumValue, Field};
use crate::options::ext;

/// JSON representation for enum fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumEncoding {
    Unspecified,
    String,
    Number,
}

impl EnumEncoding {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::String,
            2 => Self::Number,
            _ => Self::Unspecified,
        }
    }
}

/// Reads the `enum_encoding` option off a field.
pub fn enum_encoding(field: &Field) -> EnumEncoding {
    field
        .options
        .get_enum(ext::ENUM_ENCODING)
        .map_or(EnumEncoding::Unspecified, EnumEncoding::from_i32)
}

/// Custom JSON literal for one enum value, if aliased.
pub fn enum_value_alias(value: &EnumValue) -> Option<String> {
    value
        .options
        .get_string(ext::ENUM_VALUE)
        .filter(|alias| !alias.is_empty())
}

/// Whether any value of the enum carries a custom JSON literal.
pub fn has_value_aliases(enum_type: &Enum) -> bool {
    enum_type.values.iter().any(|value| enum_value_alias(value).is_some())
}

/// Numeric encoding plus a string alias table is a declared conflict: the
/// aliases could never appear on the wire.
pub fn has_conflicting_enum_annotations(field: &Field, enum_type: &Enum) -> bool {
    enum_encoding(field) == EnumEncoding::Number && has_value_aliases(enum_type)
}

#[cfg(test)]
mod tests {
    use super::{
        EnumEncoding, enum_encoding, enum_value_alias, has_conflicting_enum_annotations,
        has_value_aliases,
    };
    use crate::model::{Enum, EnumValue, Field, FieldKind};
    use crate::options::{OptionSet, ext};

    fn status_enum(aliased: bool) -> Enum {
        let active = if aliased {
            EnumValue::new("STATUS_ACTIVE", 1)
                .with_options(OptionSet::new().with_string(ext::ENUM_VALUE, "active"))
        } else {
            EnumValue::new("STATUS_ACTIVE", 1)
        };
        Enum::new("demo.Status")
            .with_value(EnumValue::new("STATUS_UNSPECIFIED", 0))
            .with_value(active)
    }

    #[test]
    fn alias_reads_back() {
        let enum_type = status_enum(true);
        assert!(has_value_aliases(&enum_type));
        assert_eq!(
            enum_value_alias(&enum_type.values[1]).as_deref(),
            Some("active")
        );
    }

    #[test]
    fn number_plus_alias_conflicts() {
        let field = Field::enumeration("status", 1, "demo.Status")
            .with_options(OptionSet::new().with_enum(ext::ENUM_ENCODING, 2));
        assert_eq!(enum_encoding(&field), EnumEncoding::Number);
        assert!(has_conflicting_enum_annotations(&field, &status_enum(true)));
        assert!(!has_conflicting_enum_annotations(&field, &status_enum(false)));
    }
}
