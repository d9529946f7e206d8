use crate::model::Field;
use crate::options::ext;

/// Whether the field carries `flatten = true`.
pub fn is_flatten(field: &Field) -> bool {
    field.options.get_bool(ext::FLATTEN).unwrap_or(false)
}

/// Prefix prepended to lifted child JSON names. Empty when unset.
///
/// A prefix without `flatten = true` is a validation error, caught by the
/// directive validator rather than here.
pub fn flatten_prefix(field: &Field) -> String {
    field
        .options
        .get_string(ext::FLATTEN_PREFIX)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{flatten_prefix, is_flatten};
    use crate::model::Field;
    use crate::options::{OptionSet, ext};

    #[test]
    fn flag_and_prefix_read_back() {
        let field = Field::message("address", 1, "demo.Address").with_options(
            OptionSet::new()
                .with_bool(ext::FLATTEN, true)
                .with_string(ext::FLATTEN_PREFIX, "addr_"),
        );
        assert!(is_flatten(&field));
        assert_eq!(flatten_prefix(&field), "addr_");
    }
}
