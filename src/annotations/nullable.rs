use crate::model::Field;
use crate::options::ext;

/// Whether the field carries `nullable = true`.
///
/// A nullable field serializes an explicit JSON `null` when unset instead of
/// being omitted, and accepts `null` on decode.
pub fn is_nullable(field: &Field) -> bool {
    field.options.get_bool(ext::NULLABLE).unwrap_or(false)
}
