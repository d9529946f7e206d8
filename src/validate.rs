//! Directive validation: per-directive structural rules plus the collision
//! rules that only make sense with the whole message (or service) in view.
//!
//! Validation is fail-fast: the first violation aborts the run for the
//! owning file with a message naming the offending message and field.

use std::collections::BTreeMap;

use crate::annotations::{
    self, EmptyBehavior, FieldDirective, Int64Encoding, TimestampFormat, http,
};
use crate::error::{Category, ValidationError};
use crate::model::{Field, Message, SchemaSet, Service};
use crate::unwrap;

/// Validates every message and service in the set, fail-fast per file.
pub fn validate_set(set: &SchemaSet) -> Result<(), ValidationError> {
    for file in &set.files {
        if !file.generate {
            continue;
        }
        for message in &file.messages {
            validate_message_tree(message, set)?;
        }
        for service in &file.services {
            validate_service(service, set)?;
        }
    }
    Ok(())
}

fn validate_message_tree(message: &Message, set: &SchemaSet) -> Result<(), ValidationError> {
    validate_message(message, set)?;
    for nested in &message.nested {
        validate_message_tree(nested, set)?;
    }
    Ok(())
}

/// Validates one message's directives.
pub fn validate_message(message: &Message, set: &SchemaSet) -> Result<(), ValidationError> {
    for field in &message.fields {
        validate_field(message, field, set)?;
    }
    // Structural unwrap rules (one per message, map implies root unwrap).
    unwrap::unwrap_spec(message)?;
    validate_flatten_collisions(message, set)?;
    for index in 0..message.oneofs.len() {
        validate_oneof(message, index, set)?;
    }
    Ok(())
}

fn validate_field(message: &Message, field: &Field, set: &SchemaSet) -> Result<(), ValidationError> {
    let err = |category, reason: String| {
        Err(ValidationError::new(
            category,
            &message.full_name,
            Some(&field.name),
            reason,
        ))
    };

    // Invariant: at most one shape-affecting directive owns a field.
    let shaping = annotations::shape_directives(field);
    if shaping.len() > 1 {
        let names = shaping
            .iter()
            .map(|directive| directive_category(directive).as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return err(
            directive_category(&shaping[0]),
            format!("field carries multiple shape-affecting directives: {names}"),
        );
    }

    let prefix = annotations::flatten_prefix(field);
    if !prefix.is_empty() && !annotations::is_flatten(field) {
        return err(
            Category::Flatten,
            format!("flatten_prefix={prefix:?} set without flatten=true"),
        );
    }

    if annotations::is_flatten(field) {
        if field.is_repeated() {
            return err(
                Category::Flatten,
                "flatten is not valid on repeated fields".to_owned(),
            );
        }
        if field.is_map() {
            return err(
                Category::Flatten,
                "flatten is not valid on map fields".to_owned(),
            );
        }
        if !field.is_message() {
            return err(
                Category::Flatten,
                format!("flatten is only valid on message fields (got {})", field.kind.as_str()),
            );
        }
        if field.oneof_index.is_some() {
            return err(
                Category::Flatten,
                "flatten is not valid on oneof variant fields (use oneof_config.flatten instead)"
                    .to_owned(),
            );
        }
    }

    if annotations::is_nullable(field) {
        if !field.proto3_optional {
            return err(
                Category::Nullable,
                "nullable annotation is only valid on proto3 optional fields".to_owned(),
            );
        }
        if field.kind.is_message() {
            return err(
                Category::Nullable,
                "nullable annotation is only valid on primitive fields, not message fields"
                    .to_owned(),
            );
        }
    }

    if annotations::empty_behavior(field) != EmptyBehavior::Unspecified {
        if !field.kind.is_message() {
            return err(
                Category::EmptyBehavior,
                "empty_behavior annotation is only valid on message fields".to_owned(),
            );
        }
        if field.is_repeated() {
            return err(
                Category::EmptyBehavior,
                "empty_behavior annotation is not valid on repeated fields".to_owned(),
            );
        }
        if field.is_map() {
            return err(
                Category::EmptyBehavior,
                "empty_behavior annotation is not valid on map fields".to_owned(),
            );
        }
    }

    if annotations::bytes_encoding(field) != annotations::BytesEncoding::Unspecified
        && field.kind != crate::model::FieldKind::Bytes
    {
        return err(
            Category::BytesEncoding,
            "bytes_encoding annotation is only valid on bytes fields".to_owned(),
        );
    }

    if annotations::int64_encoding(field) != Int64Encoding::Unspecified && !field.kind.is_int64() {
        return err(
            Category::Int64Encoding,
            "int64_encoding annotation is only valid on 64-bit integer fields".to_owned(),
        );
    }

    if annotations::timestamp_format(field) != TimestampFormat::Unspecified && !field.is_timestamp()
    {
        return err(
            Category::TimestampFormat,
            "timestamp_format annotation is only valid on google.protobuf.Timestamp fields"
                .to_owned(),
        );
    }

    if let Some(type_name) = &field.type_name
        && let Some(enum_type) = set.enum_type(type_name)
        && annotations::has_conflicting_enum_annotations(field, enum_type)
    {
        return err(
            Category::EnumEncoding,
            "enum_encoding=NUMBER conflicts with enum_value aliases on the enum type".to_owned(),
        );
    }

    Ok(())
}

fn directive_category(directive: &FieldDirective) -> Category {
    match directive {
        FieldDirective::Flatten { .. } => Category::Flatten,
        FieldDirective::Unwrap => Category::Unwrap,
        FieldDirective::Nullable => Category::Nullable,
        FieldDirective::Empty(_) => Category::EmptyBehavior,
        FieldDirective::Bytes(_) => Category::BytesEncoding,
        FieldDirective::Int64(_) => Category::Int64Encoding,
        FieldDirective::Enum(_) => Category::EnumEncoding,
        FieldDirective::Timestamp(_) => Category::TimestampFormat,
    }
}

/// Checks the flat key set after lifting every flattened field's children.
/// First collision wins, reported with both source fields.
fn validate_flatten_collisions(message: &Message, set: &SchemaSet) -> Result<(), ValidationError> {
    let mut used: BTreeMap<String, String> = BTreeMap::new();
    for field in &message.fields {
        if annotations::is_flatten(field) {
            continue;
        }
        used.insert(
            field.json_name.clone(),
            format!("parent field {:?}", field.name),
        );
    }

    for field in &message.fields {
        if !annotations::is_flatten(field) {
            continue;
        }
        let Some(child) = field.type_name.as_deref().and_then(|name| set.message(name)) else {
            continue;
        };
        let prefix = annotations::flatten_prefix(field);
        for child_field in &child.fields {
            let lifted = format!("{prefix}{}", child_field.json_name);
            if let Some(source) = used.get(&lifted) {
                return Err(ValidationError::new(
                    Category::Flatten,
                    &message.full_name,
                    Some(&field.name),
                    format!(
                        "flattened child {:?} (JSON: {lifted:?}) collides with {source}",
                        child_field.name
                    ),
                ));
            }
            used.insert(
                lifted,
                format!("flattened from {}.{}", field.name, child_field.name),
            );
        }
    }
    Ok(())
}

/// Discriminator key and flatten rules for one annotated oneof.
fn validate_oneof(message: &Message, index: usize, set: &SchemaSet) -> Result<(), ValidationError> {
    let Some(info) = annotations::discriminator_info(message, index) else {
        return Ok(());
    };

    // Discriminator key vs sibling fields outside this oneof.
    for field in &message.fields {
        if field.oneof_index == Some(index) {
            continue;
        }
        if field.json_name == info.discriminator {
            return Err(ValidationError::new(
                Category::OneofDiscriminator,
                &message.full_name,
                Some(&info.name),
                format!(
                    "discriminator name {:?} collides with field {:?} (JSON: {:?})",
                    info.discriminator, field.name, field.json_name
                ),
            ));
        }
    }

    if !info.flatten {
        // Variant literals must still be unique within the oneof.
        let mut seen = BTreeMap::new();
        for variant in &info.variants {
            if let Some(previous) = seen.insert(variant.literal.clone(), variant.field.clone()) {
                return Err(ValidationError::new(
                    Category::OneofDiscriminator,
                    &message.full_name,
                    Some(&variant.field),
                    format!(
                        "discriminator value {:?} already used by variant {previous:?}",
                        variant.literal
                    ),
                ));
            }
        }
        return Ok(());
    }

    // flatten=true: every variant must be a message, and lifted child names
    // must not collide with parent fields or the discriminator key.
    let mut reserved: BTreeMap<&str, String> = BTreeMap::new();
    reserved.insert(info.discriminator.as_str(), "discriminator".to_owned());
    for field in &message.fields {
        if field.oneof_index == Some(index) {
            continue;
        }
        reserved.insert(
            field.json_name.as_str(),
            format!("parent field {:?}", field.name),
        );
    }

    for variant in &info.variants {
        if !variant.is_message {
            return Err(ValidationError::new(
                Category::OneofDiscriminator,
                &message.full_name,
                Some(&variant.field),
                format!(
                    "oneof {:?} with flatten=true: variant must be a message type (got scalar)",
                    info.name
                ),
            ));
        }
        let Some(child) = variant
            .type_name
            .as_deref()
            .and_then(|name| set.message(name))
        else {
            continue;
        };
        for child_field in &child.fields {
            if let Some(source) = reserved.get(child_field.json_name.as_str()) {
                return Err(ValidationError::new(
                    Category::OneofDiscriminator,
                    &message.full_name,
                    Some(&variant.field),
                    format!(
                        "variant child field {:?} (JSON: {:?}) collides with {source}",
                        child_field.name, child_field.json_name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Validates path/query bindings for every method of a service.
pub fn validate_service(service: &Service, set: &SchemaSet) -> Result<(), ValidationError> {
    for method in &service.methods {
        let Some(route) = http::method_route(method) else {
            continue;
        };
        let scope = format!("{}.{}", service.name, method.name);
        let Some(input) = set.message(&method.input_type) else {
            continue;
        };
        let query = http::query_params(input);

        for param in &route.path_params {
            let Some(field) = input.field(param) else {
                return Err(ValidationError::new(
                    Category::Http,
                    &scope,
                    None,
                    format!(
                        "path variable {{{param}}} in path {:?} has no matching field in message {:?}",
                        route.path, input.name
                    ),
                ));
            };
            if field.cardinality != crate::model::Cardinality::Singular
                || !field.kind.is_path_compatible()
            {
                return Err(ValidationError::new(
                    Category::Http,
                    &scope,
                    Some(&field.name),
                    format!(
                        "path variable {{{param}}} is bound to a {} field, but path parameters must be singular scalars",
                        field.kind.as_str()
                    ),
                ));
            }
            if query.iter().any(|binding| binding.field == *param) {
                return Err(ValidationError::new(
                    Category::Http,
                    &scope,
                    Some(param),
                    "field is bound both as a path variable and as a query parameter".to_owned(),
                ));
            }
        }

        if route.method == "GET" || route.method == "DELETE" {
            let unbound: Vec<&str> = input
                .fields
                .iter()
                .filter(|field| {
                    !route.path_params.iter().any(|param| *param == field.name)
                        && !query.iter().any(|binding| binding.field == field.name)
                })
                .map(|field| field.name.as_str())
                .collect();
            if !unbound.is_empty() {
                return Err(ValidationError::new(
                    Category::Http,
                    &scope,
                    None,
                    format!(
                        "{} request has fields not bound to path or query parameters: {unbound:?}",
                        route.method
                    ),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_message, validate_service};
    use crate::annotations::OneofConfig;
    use crate::error::Category;
    use crate::model::{Field, FieldKind, Message, Method, Oneof, SchemaFile, SchemaSet, Service};
    use crate::options::{OptionSet, ext};

    fn set_of(messages: Vec<Message>) -> SchemaSet {
        let mut file = SchemaFile::new("demo.proto", "demo");
        file.messages = messages;
        SchemaSet::new(vec![file])
    }

    #[test]
    fn flatten_on_scalar_is_rejected() {
        let message = Message::new("demo.User").with_field(
            Field::scalar("name", 1, FieldKind::String)
                .with_options(OptionSet::new().with_bool(ext::FLATTEN, true)),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert_eq!(err.category, Category::Flatten);
        assert_eq!(err.field.as_deref(), Some("name"));
    }

    #[test]
    fn prefix_without_flatten_is_rejected() {
        let message = Message::new("demo.User").with_field(
            Field::message("address", 1, "demo.Address")
                .with_options(OptionSet::new().with_string(ext::FLATTEN_PREFIX, "addr_")),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert!(err.reason.contains("without flatten=true"));
    }

    #[test]
    fn nullable_requires_proto3_optional() {
        let message = Message::new("demo.User").with_field(
            Field::scalar("nickname", 1, FieldKind::String)
                .with_options(OptionSet::new().with_bool(ext::NULLABLE, true)),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert_eq!(err.category, Category::Nullable);
    }

    #[test]
    fn bytes_encoding_on_string_is_rejected() {
        let message = Message::new("demo.User").with_field(
            Field::scalar("name", 1, FieldKind::String)
                .with_options(OptionSet::new().with_enum(ext::BYTES_ENCODING, 5)),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert_eq!(err.category, Category::BytesEncoding);
    }

    #[test]
    fn timestamp_format_on_plain_message_is_rejected() {
        let message = Message::new("demo.User").with_field(
            Field::message("address", 1, "demo.Address")
                .with_options(OptionSet::new().with_enum(ext::TIMESTAMP_FORMAT, 2)),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert_eq!(err.category, Category::TimestampFormat);
    }

    #[test]
    fn two_shape_directives_on_one_field_are_rejected() {
        let message = Message::new("demo.Blob").with_field(
            Field::scalar("data", 1, FieldKind::Bytes).optional().with_options(
                OptionSet::new()
                    .with_enum(ext::BYTES_ENCODING, 5)
                    .with_bool(ext::NULLABLE, true),
            ),
        );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.Blob").unwrap(), &set).unwrap_err();
        assert!(err.reason.contains("multiple shape-affecting directives"));
    }

    #[test]
    fn flatten_collision_reports_both_sources() {
        let address = Message::new("demo.Address")
            .with_field(Field::scalar("city", 1, FieldKind::String));
        let user = Message::new("demo.User")
            .with_field(Field::scalar("city", 1, FieldKind::String))
            .with_field(
                Field::message("address", 2, "demo.Address")
                    .with_options(OptionSet::new().with_bool(ext::FLATTEN, true)),
            );
        let set = set_of(vec![address, user]);
        let err = validate_message(set.message("demo.User").unwrap(), &set).unwrap_err();
        assert!(err.reason.contains("collides with parent field \"city\""));
    }

    #[test]
    fn discriminator_collision_with_sibling_is_rejected() {
        let config = OneofConfig {
            discriminator: "type".to_owned(),
            flatten: false,
        };
        let message = Message::new("demo.Event")
            .with_field(Field::scalar("type", 1, FieldKind::String))
            .with_oneof(Oneof::new("payload").with_options(
                OptionSet::new().with_message(ext::ONEOF_CONFIG, &config),
            ))
            .with_field(Field::message("click", 2, "demo.Click").in_oneof(0));
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.Event").unwrap(), &set).unwrap_err();
        assert_eq!(err.category, Category::OneofDiscriminator);
        assert!(err.reason.contains("collides with field \"type\""));
    }

    #[test]
    fn flatten_oneof_rejects_scalar_variant() {
        let config = OneofConfig {
            discriminator: "type".to_owned(),
            flatten: true,
        };
        let message = Message::new("demo.Event")
            .with_oneof(Oneof::new("payload").with_options(
                OptionSet::new().with_message(ext::ONEOF_CONFIG, &config),
            ))
            .with_field(Field::scalar("note", 1, FieldKind::String).in_oneof(0));
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.Event").unwrap(), &set).unwrap_err();
        assert!(err.reason.contains("must be a message type"));
    }

    #[test]
    fn duplicate_variant_literals_are_rejected() {
        let config = OneofConfig {
            discriminator: "type".to_owned(),
            flatten: false,
        };
        let message = Message::new("demo.Event")
            .with_oneof(Oneof::new("payload").with_options(
                OptionSet::new().with_message(ext::ONEOF_CONFIG, &config),
            ))
            .with_field(
                Field::message("click", 1, "demo.Click")
                    .in_oneof(0)
                    .with_options(OptionSet::new().with_string(ext::ONEOF_VALUE, "event")),
            )
            .with_field(
                Field::message("view", 2, "demo.View")
                    .in_oneof(0)
                    .with_options(OptionSet::new().with_string(ext::ONEOF_VALUE, "event")),
            );
        let set = set_of(vec![message]);
        let err = validate_message(set.message("demo.Event").unwrap(), &set).unwrap_err();
        assert!(err.reason.contains("already used"));
    }

    #[test]
    fn get_with_unbound_body_fields_is_rejected() {
        let config = crate::annotations::http::HttpConfig {
            path: "/users/{id}".to_owned(),
            method: "GET".to_owned(),
        };
        let request = Message::new("demo.GetUserRequest")
            .with_field(Field::scalar("id", 1, FieldKind::String))
            .with_field(Field::scalar("verbose", 2, FieldKind::Bool));
        let service = Service::new("demo.UserService").with_method(
            Method::new("GetUser", "demo.GetUserRequest", "demo.User")
                .with_options(OptionSet::new().with_message(ext::METHOD_CONFIG, &config)),
        );
        let set = set_of(vec![request]);
        let err = validate_service(&service, &set).unwrap_err();
        assert_eq!(err.category, Category::Http);
        assert!(err.reason.contains("verbose"));
    }

    #[test]
    fn path_variable_must_exist() {
        let config = crate::annotations::http::HttpConfig {
            path: "/users/{user_id}".to_owned(),
            method: "GET".to_owned(),
        };
        let request = Message::new("demo.GetUserRequest")
            .with_field(Field::scalar("id", 1, FieldKind::String));
        let service = Service::new("demo.UserService").with_method(
            Method::new("GetUser", "demo.GetUserRequest", "demo.User")
                .with_options(OptionSet::new().with_message(ext::METHOD_CONFIG, &config)),
        );
        let set = set_of(vec![request]);
        let err = validate_service(&service, &set).unwrap_err();
        assert!(err.reason.contains("{user_id}"));
    }
}
