//! Global unwrap resolution.
//!
//! Unwrap is the one directive that cannot be planned message-locally: a
//! map field's value type may be declared in another file, so whether its
//! entries collapse depends on annotations elsewhere in the compilation
//! unit. Resolution runs in two passes. Pass one walks every generated file
//! and records each message's unwrap declaration in a table keyed by
//! fully-qualified name. Pass two answers per-message questions against the
//! table, falling back to direct re-extraction for types the table never
//! saw (imported, non-generated files).

use std::collections::BTreeMap;

use crate::annotations;
use crate::error::{Category, ValidationError};
use crate::model::{Message, SchemaSet};

/// One message's unwrap declaration, fully checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapSpec {
    /// Fully-qualified name of the declaring message.
    pub owner: String,
    pub field: String,
    pub field_json: String,
    pub is_map: bool,
    /// The declaring message has no other fields, so the message itself
    /// collapses to the bare collection.
    pub is_root: bool,
    /// Element type for repeated message fields.
    pub element_type: Option<String>,
    /// Value type for map fields with message values.
    pub map_value_type: Option<String>,
}

/// Extracts and checks the unwrap declaration on one message.
///
/// Returns `Ok(None)` when no field carries the annotation. The structural
/// rules live here rather than in the validator so that pass-two fallback
/// re-extraction applies exactly the same checks.
pub fn unwrap_spec(message: &Message) -> Result<Option<UnwrapSpec>, ValidationError> {
    let mut spec: Option<UnwrapSpec> = None;
    for field in &message.fields {
        if !annotations::has_unwrap(field) {
            continue;
        }
        let err = |reason: &str| {
            Err(ValidationError::new(
                Category::Unwrap,
                &message.full_name,
                Some(&field.name),
                reason,
            ))
        };
        if !field.is_repeated() && !field.is_map() {
            return err("unwrap annotation can only be used on repeated or map fields");
        }
        if spec.is_some() {
            return err("only one unwrap annotation is allowed per message");
        }
        let is_root = message.fields.len() == 1;
        if field.is_map() && !is_root {
            return err("unwrap on a map field requires the message to contain only that field");
        }
        spec = Some(UnwrapSpec {
            owner: message.full_name.clone(),
            field: field.name.clone(),
            field_json: field.json_name.clone(),
            is_map: field.is_map(),
            is_root,
            element_type: if field.is_repeated() && field.kind.is_message() {
                field.type_name.clone()
            } else {
                None
            },
            map_value_type: field
                .map_value
                .as_ref()
                .and_then(|value| value.type_name.clone()),
        });
    }
    Ok(spec)
}

/// Pass-one output: every unwrap declaration in the generated files.
#[derive(Debug, Clone, Default)]
pub struct UnwrapTable {
    by_message: BTreeMap<String, UnwrapSpec>,
}

impl UnwrapTable {
    /// Walks every message (nested included) of every generated file.
    pub fn collect(set: &SchemaSet) -> Result<Self, ValidationError> {
        let mut table = Self::default();
        for file in &set.files {
            if !file.generate {
                continue;
            }
            for message in &file.messages {
                table.collect_message(message)?;
            }
        }
        Ok(table)
    }

    fn collect_message(&mut self, message: &Message) -> Result<(), ValidationError> {
        if let Some(spec) = unwrap_spec(message)? {
            self.by_message.insert(message.full_name.clone(), spec);
        }
        for nested in &message.nested {
            self.collect_message(nested)?;
        }
        Ok(())
    }

    pub fn get(&self, full_name: &str) -> Option<&UnwrapSpec> {
        self.by_message.get(full_name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_message.is_empty()
    }
}

/// A message that serializes as a bare collection instead of an object.
#[derive(Debug, Clone)]
pub struct RootUnwrap {
    pub spec: UnwrapSpec,
    /// For root map unwraps whose value type carries its own unwrap
    /// declaration: each map value collapses one level further.
    pub value_unwrap: Option<UnwrapSpec>,
}

/// Pass-two lookup: does this message collapse to a bare collection?
pub fn root_unwrap(message: &Message, table: &UnwrapTable, set: &SchemaSet) -> Option<RootUnwrap> {
    let spec = resolve(&message.full_name, table, set)?;
    if !spec.is_root {
        return None;
    }
    let value_unwrap = if spec.is_map {
        spec.map_value_type
            .as_deref()
            .and_then(|value_type| resolve(value_type, table, set))
    } else {
        None
    };
    Some(RootUnwrap { spec, value_unwrap })
}

/// One map field of a containing message whose values collapse.
#[derive(Debug, Clone)]
pub struct MapValueUnwrap {
    pub field: String,
    pub field_json: String,
    pub value_type: String,
    pub value_spec: UnwrapSpec,
}

/// Pass-two lookup: map fields of `message` whose value type carries an
/// unwrap declaration, root or not. A message that is itself
/// root-unwrapped gets the collapse through [`root_unwrap`] instead and
/// reports none here.
pub fn map_value_unwraps(
    message: &Message,
    table: &UnwrapTable,
    set: &SchemaSet,
) -> Vec<MapValueUnwrap> {
    if root_unwrap(message, table, set).is_some() {
        return Vec::new();
    }
    message
        .fields
        .iter()
        .filter(|field| field.is_map())
        .filter_map(|field| {
            let value_type = field.map_value.as_ref()?.type_name.as_deref()?;
            let value_spec = resolve(value_type, table, set)?;
            Some(MapValueUnwrap {
                field: field.name.clone(),
                field_json: field.json_name.clone(),
                value_type: value_type.to_owned(),
                value_spec,
            })
        })
        .collect()
}

/// Table lookup with direct re-extraction as fallback for types declared
/// in files the table never walked. Fallback extraction errors read as
/// "no unwrap": an import broken that way fails validation when its own
/// file is compiled.
fn resolve(full_name: &str, table: &UnwrapTable, set: &SchemaSet) -> Option<UnwrapSpec> {
    if let Some(spec) = table.get(full_name) {
        return Some(spec.clone());
    }
    let message = set.message(full_name)?;
    unwrap_spec(message).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::{UnwrapTable, map_value_unwraps, root_unwrap, unwrap_spec};
    use crate::model::{Field, FieldKind, Message, SchemaFile, SchemaSet};
    use crate::options::{OptionSet, ext};

    fn unwrap_opt() -> OptionSet {
        OptionSet::new().with_bool(ext::UNWRAP, true)
    }

    fn item_list() -> Message {
        Message::new("demo.ItemList").with_field(
            Field::message("items", 1, "demo.Item")
                .repeated()
                .with_options(unwrap_opt()),
        )
    }

    #[test]
    fn singular_field_rejected() {
        let message = Message::new("demo.Wrapper")
            .with_field(Field::message("item", 1, "demo.Item").with_options(unwrap_opt()));
        let err = unwrap_spec(&message).unwrap_err();
        assert!(err.to_string().contains("repeated or map fields"));
    }

    #[test]
    fn second_unwrap_rejected() {
        let message = Message::new("demo.Wrapper")
            .with_field(
                Field::scalar("ids", 1, FieldKind::String)
                    .repeated()
                    .with_options(unwrap_opt()),
            )
            .with_field(
                Field::scalar("names", 2, FieldKind::String)
                    .repeated()
                    .with_options(unwrap_opt()),
            );
        let err = unwrap_spec(&message).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("names"));
        assert!(err.to_string().contains("only one unwrap annotation"));
    }

    #[test]
    fn map_unwrap_requires_lone_field() {
        let message = Message::new("demo.Wrapper")
            .with_field(Field::scalar("id", 1, FieldKind::String))
            .with_field(
                Field::map("entries", 2, FieldKind::Message, Some("demo.Item"))
                    .with_options(unwrap_opt()),
            );
        assert!(unwrap_spec(&message).is_err());
    }

    #[test]
    fn root_repeated_unwrap_resolves() {
        let set = SchemaSet::new(vec![
            SchemaFile::new("demo.proto", "demo").with_message(item_list()),
        ]);
        let table = UnwrapTable::collect(&set).unwrap();
        let root = root_unwrap(set.message("demo.ItemList").unwrap(), &table, &set)
            .expect("root unwrap");
        assert!(!root.spec.is_map);
        assert_eq!(root.spec.element_type.as_deref(), Some("demo.Item"));
        assert!(root.value_unwrap.is_none());
    }

    #[test]
    fn map_values_unwrap_in_containing_message() {
        let holder = Message::new("demo.Catalog")
            .with_field(Field::scalar("id", 1, FieldKind::String))
            .with_field(Field::map(
                "lists",
                2,
                FieldKind::Message,
                Some("demo.ItemList"),
            ));
        let set = SchemaSet::new(vec![
            SchemaFile::new("demo.proto", "demo")
                .with_message(item_list())
                .with_message(holder),
        ]);
        let table = UnwrapTable::collect(&set).unwrap();
        let unwraps = map_value_unwraps(set.message("demo.Catalog").unwrap(), &table, &set);
        assert_eq!(unwraps.len(), 1);
        assert_eq!(unwraps[0].field_json, "lists");
        assert_eq!(unwraps[0].value_spec.field_json, "items");
    }

    #[test]
    fn multi_field_wrapper_still_collapses_as_map_value() {
        let wrapper = Message::new("demo.TagList")
            .with_field(Field::scalar("owner", 1, FieldKind::String))
            .with_field(
                Field::scalar("tags", 2, FieldKind::String)
                    .repeated()
                    .with_options(unwrap_opt()),
            );
        let holder = Message::new("demo.Doc").with_field(Field::map(
            "tags_by_user",
            1,
            FieldKind::Message,
            Some("demo.TagList"),
        ));
        let set = SchemaSet::new(vec![
            SchemaFile::new("demo.proto", "demo")
                .with_message(wrapper)
                .with_message(holder),
        ]);
        let table = UnwrapTable::collect(&set).unwrap();
        let unwraps = map_value_unwraps(set.message("demo.Doc").unwrap(), &table, &set);
        assert_eq!(unwraps.len(), 1);
        assert_eq!(unwraps[0].value_spec.field_json, "tags");
        assert!(!unwraps[0].value_spec.is_root);
    }

    #[test]
    fn imported_value_type_resolves_by_re_extraction() {
        let holder = Message::new("app.Catalog").with_field(Field::map(
            "lists",
            1,
            FieldKind::Message,
            Some("lib.ItemList"),
        ));
        let imported = Message::new("lib.ItemList").with_field(
            Field::message("items", 1, "lib.Item")
                .repeated()
                .with_options(unwrap_opt()),
        );
        let set = SchemaSet::new(vec![
            SchemaFile::new("app.proto", "app").with_message(holder),
            SchemaFile::new("lib.proto", "lib")
                .with_message(imported)
                .import_only(),
        ]);
        let table = UnwrapTable::collect(&set).unwrap();
        assert!(table.is_empty());
        let unwraps = map_value_unwraps(set.message("app.Catalog").unwrap(), &table, &set);
        assert_eq!(unwraps.len(), 1);
        assert_eq!(unwraps[0].value_type, "lib.ItemList");
    }

    #[test]
    fn combined_root_map_and_value_unwrap() {
        let inner = item_list();
        let outer = Message::new("demo.ListIndex").with_field(
            Field::map("lists", 1, FieldKind::Message, Some("demo.ItemList"))
                .with_options(unwrap_opt()),
        );
        let set = SchemaSet::new(vec![
            SchemaFile::new("demo.proto", "demo")
                .with_message(inner)
                .with_message(outer),
        ]);
        let table = UnwrapTable::collect(&set).unwrap();
        let root = root_unwrap(set.message("demo.ListIndex").unwrap(), &table, &set)
            .expect("root unwrap");
        assert!(root.spec.is_map);
        let value = root.value_unwrap.expect("value unwrap");
        assert_eq!(value.field_json, "items");
        // The root-unwrapped map message itself reports no map-value ops.
        assert!(map_value_unwraps(set.message("demo.ListIndex").unwrap(), &table, &set).is_empty());
    }
}
