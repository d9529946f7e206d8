//! Plan execution over JSON values.
//!
//! [`encode`] runs a plan's operations in order, patching the canonical
//! protobuf JSON into the annotated shape. [`decode`] runs the inverses in
//! reverse order, restoring canonical JSON. Target-language renderers emit
//! the same patch sequence in their own syntax; this interpreter is the
//! executable definition of what each operation means, and the tests pin
//! the encode/decode pair to being mutually inverse.

use serde_json::{Map, Number, Value};

use crate::annotations::EmptyBehavior;
use crate::plan::{
    DiscriminatorSpec, FlattenSpec, PatchOp, PresenceRewrite, ScalarKind, ScalarRewrite, ShapePlan,
    UnwrapOp, ValueCollapse,
};
use crate::scalar;

/// Plan execution failure on a concrete value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthError {
    #[error("message {message}: expected a JSON object, got {got}")]
    ExpectedObject { message: String, got: String },
    #[error("message {message}, field {field:?}: {reason}")]
    Field {
        message: String,
        field: String,
        reason: String,
    },
    #[error("message {message}: no variant matches discriminator value {literal:?}")]
    UnknownVariant { message: String, literal: String },
}

/// Patches canonical protobuf JSON into the annotated shape.
pub fn encode(plan: &ShapePlan, canonical: Value) -> Result<Value, SynthError> {
    let mut value = canonical;
    for op in &plan.ops {
        value = apply(plan, op, value, Direction::Forward)?;
    }
    Ok(value)
}

/// Restores canonical protobuf JSON from the annotated shape.
pub fn decode(plan: &ShapePlan, shaped: Value) -> Result<Value, SynthError> {
    let mut value = shaped;
    for op in plan.ops.iter().rev() {
        value = apply(plan, op, value, Direction::Inverse)?;
    }
    Ok(value)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

fn apply(
    plan: &ShapePlan,
    op: &PatchOp,
    value: Value,
    direction: Direction,
) -> Result<Value, SynthError> {
    match (op, direction) {
        (PatchOp::Discriminator(spec), Direction::Forward) => {
            discriminator_forward(plan, spec, value)
        }
        (PatchOp::Discriminator(spec), Direction::Inverse) => {
            discriminator_inverse(plan, spec, value)
        }
        (PatchOp::Flatten(spec), Direction::Forward) => flatten_forward(plan, spec, value),
        (PatchOp::Flatten(spec), Direction::Inverse) => flatten_inverse(plan, spec, value),
        (PatchOp::Unwrap(op), Direction::Forward) => unwrap_forward(plan, op, value),
        (PatchOp::Unwrap(op), Direction::Inverse) => unwrap_inverse(plan, op, value),
        (PatchOp::Scalar(rewrite), direction) => scalar_apply(plan, rewrite, value, direction),
        (PatchOp::Presence(rewrite), Direction::Forward) => {
            presence_forward(plan, rewrite, value)
        }
        (PatchOp::Presence(rewrite), Direction::Inverse) => {
            presence_inverse(plan, rewrite, value)
        }
    }
}

fn into_object(plan: &ShapePlan, value: Value) -> Result<Map<String, Value>, SynthError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SynthError::ExpectedObject {
            message: plan.message.clone(),
            got: json_type(&other).to_owned(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn field_error(plan: &ShapePlan, field: &str, reason: impl Into<String>) -> SynthError {
    SynthError::Field {
        message: plan.message.clone(),
        field: field.to_owned(),
        reason: reason.into(),
    }
}

// A oneof with no variant set emits no discriminator key and the inverse
// restores the object untouched.
fn discriminator_forward(
    plan: &ShapePlan,
    spec: &DiscriminatorSpec,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    let Some(variant) = spec
        .variants
        .iter()
        .find(|variant| object.contains_key(&variant.field_json))
    else {
        return Ok(Value::Object(object));
    };

    let mut shaped = Map::new();
    shaped.insert(
        spec.key.clone(),
        Value::String(variant.literal.clone()),
    );
    if spec.flatten {
        let payload = object
            .remove(&variant.field_json)
            .unwrap_or(Value::Object(Map::new()));
        let payload = into_object(plan, payload)?;
        for (key, child) in payload {
            shaped.insert(key, child);
        }
    }
    for (key, child) in object {
        shaped.insert(key, child);
    }
    Ok(Value::Object(shaped))
}

fn discriminator_inverse(
    plan: &ShapePlan,
    spec: &DiscriminatorSpec,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    let Some(tag) = object.remove(&spec.key) else {
        return Ok(Value::Object(object));
    };
    let Value::String(literal) = tag else {
        return Err(field_error(
            plan,
            &spec.key,
            format!("discriminator value must be a string, got {tag}"),
        ));
    };
    let Some(variant) = spec
        .variants
        .iter()
        .find(|variant| variant.literal == literal)
    else {
        return Err(SynthError::UnknownVariant {
            message: plan.message.clone(),
            literal,
        });
    };
    if !spec.flatten {
        return Ok(Value::Object(object));
    }

    let mut payload = Map::new();
    for child in &variant.children {
        if let Some(value) = object.remove(child) {
            payload.insert(child.clone(), value);
        }
    }
    object.insert(variant.field_json.clone(), Value::Object(payload));
    Ok(Value::Object(object))
}

fn flatten_forward(
    plan: &ShapePlan,
    spec: &FlattenSpec,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    let Some(nested) = object.remove(&spec.field_json) else {
        return Ok(Value::Object(object));
    };
    let nested = into_object(plan, nested)?;
    for (key, child) in nested {
        object.insert(format!("{}{key}", spec.prefix), child);
    }
    Ok(Value::Object(object))
}

// An empty or absent nested message leaves no lifted keys, so the inverse
// reads "field absent" for both. Message presence is not recoverable
// through a flatten, which mirrors how the annotation is meant to be used.
fn flatten_inverse(
    plan: &ShapePlan,
    spec: &FlattenSpec,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    let mut nested = Map::new();
    for child in &spec.children {
        let lifted = format!("{}{child}", spec.prefix);
        if let Some(value) = object.remove(&lifted) {
            nested.insert(child.clone(), value);
        }
    }
    if !nested.is_empty() {
        object.insert(spec.field_json.clone(), Value::Object(nested));
    }
    Ok(Value::Object(object))
}

fn empty_collection(is_map: bool) -> Value {
    if is_map {
        Value::Object(Map::new())
    } else {
        Value::Array(Vec::new())
    }
}

fn collapse_wrapper(
    plan: &ShapePlan,
    collapse: &ValueCollapse,
    wrapper: Value,
) -> Result<Value, SynthError> {
    let mut wrapper = into_object(plan, wrapper)?;
    Ok(wrapper
        .remove(&collapse.field_json)
        .unwrap_or_else(|| empty_collection(collapse.is_map)))
}

fn expand_wrapper(collapse: &ValueCollapse, inner: Value) -> Value {
    let mut wrapper = Map::new();
    wrapper.insert(collapse.field_json.clone(), inner);
    Value::Object(wrapper)
}

fn unwrap_forward(plan: &ShapePlan, op: &UnwrapOp, value: Value) -> Result<Value, SynthError> {
    match op {
        UnwrapOp::Root {
            field_json,
            is_map,
            value_collapse,
        } => {
            let mut object = into_object(plan, value)?;
            let collection = object
                .remove(field_json)
                .unwrap_or_else(|| empty_collection(*is_map));
            let Some(collapse) = value_collapse else {
                return Ok(collection);
            };
            let entries = into_object(plan, collection)?;
            let mut collapsed = Map::new();
            for (key, wrapper) in entries {
                collapsed.insert(key, collapse_wrapper(plan, collapse, wrapper)?);
            }
            Ok(Value::Object(collapsed))
        }
        UnwrapOp::MapValues { fields } => {
            let mut object = into_object(plan, value)?;
            for field in fields {
                let Some(entries) = object.remove(&field.field_json) else {
                    continue;
                };
                let entries = into_object(plan, entries)?;
                let mut collapsed = Map::new();
                for (key, wrapper) in entries {
                    collapsed.insert(key, collapse_wrapper(plan, &field.collapse, wrapper)?);
                }
                object.insert(field.field_json.clone(), Value::Object(collapsed));
            }
            Ok(Value::Object(object))
        }
    }
}

fn unwrap_inverse(plan: &ShapePlan, op: &UnwrapOp, value: Value) -> Result<Value, SynthError> {
    match op {
        UnwrapOp::Root {
            field_json,
            is_map,
            value_collapse,
        } => {
            let collection = match value_collapse {
                None => value,
                Some(collapse) => {
                    let entries = into_object(plan, value)?;
                    let mut expanded = Map::new();
                    for (key, inner) in entries {
                        expanded.insert(key, expand_wrapper(collapse, inner));
                    }
                    Value::Object(expanded)
                }
            };
            match (&collection, is_map) {
                (Value::Array(_), false) | (Value::Object(_), true) => {}
                (other, _) => {
                    return Err(field_error(
                        plan,
                        field_json,
                        format!(
                            "expected {} for the unwrapped collection, got {}",
                            if *is_map { "an object" } else { "an array" },
                            json_type(other)
                        ),
                    ));
                }
            }
            let mut object = Map::new();
            object.insert(field_json.clone(), collection);
            Ok(Value::Object(object))
        }
        UnwrapOp::MapValues { fields } => {
            let mut object = into_object(plan, value)?;
            for field in fields {
                let Some(entries) = object.remove(&field.field_json) else {
                    continue;
                };
                let entries = into_object(plan, entries)?;
                let mut expanded = Map::new();
                for (key, inner) in entries {
                    expanded.insert(key, expand_wrapper(&field.collapse, inner));
                }
                object.insert(field.field_json.clone(), Value::Object(expanded));
            }
            Ok(Value::Object(object))
        }
    }
}

// After a root unwrap the value is a bare collection; a scalar rewrite on
// the unwrapped field then applies element-wise to the collection itself.
fn scalar_apply(
    plan: &ShapePlan,
    rewrite: &ScalarRewrite,
    value: Value,
    direction: Direction,
) -> Result<Value, SynthError> {
    let convert = |value: Value| -> Result<Value, SynthError> {
        scalar_value(&rewrite.kind, value, direction)
            .map_err(|reason| field_error(plan, &rewrite.field_json, reason))
    };
    let convert_all = |value: Value| -> Result<Value, SynthError> {
        match value {
            Value::Array(items) => Ok(Value::Array(
                items.into_iter().map(convert).collect::<Result<_, _>>()?,
            )),
            other if !rewrite.repeated => convert(other),
            other => Err(field_error(
                plan,
                &rewrite.field_json,
                format!("expected an array, got {}", json_type(&other)),
            )),
        }
    };

    match value {
        Value::Object(mut object) => {
            match object.remove(&rewrite.field_json) {
                None => {}
                // An explicit null stays an explicit null.
                Some(Value::Null) => {
                    object.insert(rewrite.field_json.clone(), Value::Null);
                }
                Some(present) => {
                    object.insert(rewrite.field_json.clone(), convert_all(present)?);
                }
            }
            Ok(Value::Object(object))
        }
        bare => convert_all(bare),
    }
}

fn scalar_value(kind: &ScalarKind, value: Value, direction: Direction) -> Result<Value, String> {
    match (kind, direction, value) {
        (ScalarKind::Int64Number { unsigned }, Direction::Forward, Value::String(text)) => {
            scalar::int64_number(&text, *unsigned).map(Value::Number)
        }
        // Canonical JSON also accepts plain numbers for 64-bit fields.
        (ScalarKind::Int64Number { .. }, Direction::Forward, Value::Number(number)) => {
            Ok(Value::Number(number))
        }
        (ScalarKind::Int64Number { unsigned }, Direction::Inverse, Value::Number(number)) => {
            scalar::int64_string(&number, *unsigned).map(Value::String)
        }
        (ScalarKind::EnumNumber { values }, Direction::Forward, Value::String(name)) => {
            scalar::enum_number(values, &name).map(|number| Value::Number(Number::from(number)))
        }
        (ScalarKind::EnumNumber { .. }, Direction::Forward, Value::Number(number)) => {
            Ok(Value::Number(number))
        }
        (ScalarKind::EnumNumber { values }, Direction::Inverse, Value::Number(number)) => {
            let number = number
                .as_i64()
                .ok_or_else(|| format!("JSON number {number} is not an enum value"))?;
            scalar::enum_name(values, number).map(Value::String)
        }
        (ScalarKind::EnumAlias { values }, Direction::Forward, Value::String(name)) => {
            scalar::enum_alias(values, &name).map(Value::String)
        }
        (ScalarKind::EnumAlias { values }, Direction::Inverse, Value::String(alias)) => {
            scalar::enum_unalias(values, &alias).map(Value::String)
        }
        (ScalarKind::Bytes { encoding }, Direction::Forward, Value::String(text)) => {
            scalar::recode_bytes(&text, *encoding).map(Value::String)
        }
        (ScalarKind::Bytes { encoding }, Direction::Inverse, Value::String(text)) => {
            scalar::restore_bytes(&text, *encoding).map(Value::String)
        }
        (ScalarKind::Timestamp { format }, Direction::Forward, Value::String(text)) => {
            scalar::timestamp_value(&text, *format)
        }
        (ScalarKind::Timestamp { format }, Direction::Inverse, value) => {
            scalar::timestamp_rfc3339(&value, *format).map(Value::String)
        }
        (_, _, other) => Err(format!("unexpected JSON value {other}")),
    }
}

fn presence_forward(
    plan: &ShapePlan,
    rewrite: &PresenceRewrite,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    match rewrite {
        PresenceRewrite::Nullable { field_json } => {
            object.entry(field_json.clone()).or_insert(Value::Null);
        }
        PresenceRewrite::Empty {
            field_json,
            behavior,
        } => {
            let is_empty = matches!(
                object.get(field_json),
                Some(Value::Object(map)) if map.is_empty()
            );
            if is_empty {
                match behavior {
                    EmptyBehavior::Null => {
                        object.insert(field_json.clone(), Value::Null);
                    }
                    EmptyBehavior::Omit => {
                        object.remove(field_json);
                    }
                    EmptyBehavior::Unspecified | EmptyBehavior::Preserve => {}
                }
            }
        }
    }
    Ok(Value::Object(object))
}

// EMPTY_OMIT drops the key outright, so its inverse cannot tell an omitted
// empty message from an unset one and leaves the field unset.
fn presence_inverse(
    plan: &ShapePlan,
    rewrite: &PresenceRewrite,
    value: Value,
) -> Result<Value, SynthError> {
    let mut object = into_object(plan, value)?;
    match rewrite {
        PresenceRewrite::Nullable { field_json } => {
            if matches!(object.get(field_json), Some(Value::Null)) {
                object.remove(field_json);
            }
        }
        PresenceRewrite::Empty {
            field_json,
            behavior,
        } => {
            if *behavior == EmptyBehavior::Null
                && matches!(object.get(field_json), Some(Value::Null))
            {
                object.insert(field_json.clone(), Value::Object(Map::new()));
            }
        }
    }
    Ok(Value::Object(object))
}
