use crate::model::Field;
use crate::options::ext;

/// What an empty singular message field serializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBehavior {
    Unspecified,
    /// Keep the canonical `{}`.
    Preserve,
    /// Serialize as an explicit `null`.
    Null,
    /// Drop the key entirely.
    Omit,
}

impl EmptyBehavior {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Preserve,
            2 => Self::Null,
            3 => Self::Omit,
            _ => Self::Unspecified,
        }
    }
}

/// Reads the `empty_behavior` option off a field.
pub fn empty_behavior(field: &Field) -> EmptyBehavior {
    field
        .options
        .get_enum(ext::EMPTY_BEHAVIOR)
        .map_or(EmptyBehavior::Unspecified, EmptyBehavior::from_i32)
}
