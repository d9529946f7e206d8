use crate::model::Field;
use crate::options::ext;

/// Whether the field carries `unwrap = true`.
///
/// Structural rules (repeated/map only, one per message, map implies root
/// unwrap) live in the unwrap resolver, which is where the surrounding
/// message is in view.
pub fn has_unwrap(field: &Field) -> bool {
    field.options.get_bool(ext::UNWRAP).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::has_unwrap;
    use crate::model::Field;
    use crate::options::{OptionSet, ext};

    #[test]
    fn flag_reads_back() {
        let field = Field::message("items", 1, "demo.Item")
            .repeated()
            .with_options(OptionSet::new().with_bool(ext::UNWRAP, true));
        assert!(has_unwrap(&field));
    }
}
