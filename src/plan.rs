//! Shape plans: the per-message patch programs renderers execute.
//!
//! A plan is an ordered list of patch operations over the canonical JSON
//! object. Order is fixed by category so every renderer derives the same
//! shape: discriminator injection first, then flatten lifts, then unwrap
//! collapses, then scalar re-encodings, then presence rewrites. Each
//! operation has an exact inverse, which is what makes the synthesized
//! unmarshal side (see [`crate::synth`]) a mechanical reversal.

use crate::annotations::{
    self, BytesEncoding, EmptyBehavior, EnumEncoding, Int64Encoding, TimestampFormat,
};
use crate::error::{Category, ConflictError, Error};
use crate::model::{Field, Message, SchemaSet};
use crate::unwrap::{self, UnwrapTable};

/// One variant of a discriminated oneof, as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VariantSpec {
    pub field_json: String,
    /// Literal emitted under the discriminator key.
    pub literal: String,
    pub is_message: bool,
    /// Child JSON keys lifted to the parent level when flattening.
    pub children: Vec<String>,
}

/// Discriminator injection for one oneof.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DiscriminatorSpec {
    pub oneof: String,
    /// JSON key carrying the variant tag.
    pub key: String,
    pub flatten: bool,
    pub variants: Vec<VariantSpec>,
}

/// Child-lift for one flattened message field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FlattenSpec {
    pub field_json: String,
    pub prefix: String,
    /// Child JSON keys, in declaration order.
    pub children: Vec<String>,
}

/// Collapse of a wrapper message to its single collection field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValueCollapse {
    /// The lone field inside the wrapper.
    pub field_json: String,
    /// Whether that field is a map (a JSON object) rather than a list.
    pub is_map: bool,
}

/// One map field whose values collapse to their single inner field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MapValueField {
    pub field_json: String,
    pub value_type: String,
    pub collapse: ValueCollapse,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnwrapOp {
    /// The whole message collapses to the bare collection.
    Root {
        field_json: String,
        is_map: bool,
        /// Set for root map unwraps whose values collapse one level more.
        value_collapse: Option<ValueCollapse>,
    },
    /// Map fields of this message whose values collapse.
    MapValues { fields: Vec<MapValueField> },
}

/// One enum value, with its optional wire alias.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EnumValueSpec {
    pub name: String,
    pub number: i32,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    /// Canonical decimal string becomes a JSON number.
    Int64Number { unsigned: bool },
    /// Canonical symbolic name becomes the numeric value.
    EnumNumber { values: Vec<EnumValueSpec> },
    /// Canonical symbolic name becomes its declared alias.
    EnumAlias { values: Vec<EnumValueSpec> },
    /// Canonical standard base64 re-encoded.
    Bytes { encoding: BytesEncoding },
    /// Canonical RFC 3339 string re-encoded.
    Timestamp { format: TimestampFormat },
}

/// Value re-encoding for one field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScalarRewrite {
    pub field_json: String,
    /// Apply element-wise to a JSON array.
    pub repeated: bool,
    pub kind: ScalarKind,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceRewrite {
    /// Absent optional field surfaces as an explicit `null`.
    Nullable { field_json: String },
    /// Empty message value rewritten per the declared behavior.
    Empty {
        field_json: String,
        behavior: EmptyBehavior,
    },
}

/// One patch operation. Variant order is execution order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    Discriminator(DiscriminatorSpec),
    Flatten(FlattenSpec),
    Unwrap(UnwrapOp),
    Scalar(ScalarRewrite),
    Presence(PresenceRewrite),
}

impl PatchOp {
    pub fn category(&self) -> Category {
        match self {
            Self::Discriminator(_) => Category::OneofDiscriminator,
            Self::Flatten(_) => Category::Flatten,
            Self::Unwrap(_) => Category::Unwrap,
            Self::Scalar(rewrite) => match rewrite.kind {
                ScalarKind::Int64Number { .. } => Category::Int64Encoding,
                ScalarKind::EnumNumber { .. } | ScalarKind::EnumAlias { .. } => {
                    Category::EnumEncoding
                }
                ScalarKind::Bytes { .. } => Category::BytesEncoding,
                ScalarKind::Timestamp { .. } => Category::TimestampFormat,
            },
            Self::Presence(rewrite) => match rewrite {
                PresenceRewrite::Nullable { .. } => Category::Nullable,
                PresenceRewrite::Empty { .. } => Category::EmptyBehavior,
            },
        }
    }
}

/// The patch program for one message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ShapePlan {
    /// Fully-qualified message name.
    pub message: String,
    /// Operations in execution order.
    pub ops: Vec<PatchOp>,
    pub warnings: Vec<String>,
}

impl ShapePlan {
    /// An identity plan leaves the canonical mapping untouched.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Builds the plan for one message against resolved global unwrap
    /// state. Assumes [`crate::validate::validate_message`] has passed.
    pub fn build(message: &Message, table: &UnwrapTable, set: &SchemaSet) -> Result<Self, Error> {
        let mut plan = Self {
            message: message.full_name.clone(),
            ops: Vec::new(),
            warnings: Vec::new(),
        };

        for index in 0..message.oneofs.len() {
            if let Some(info) = annotations::discriminator_info(message, index) {
                let variants = info
                    .variants
                    .iter()
                    .map(|variant| VariantSpec {
                        field_json: variant.json_name.clone(),
                        literal: variant.literal.clone(),
                        is_message: variant.is_message,
                        children: if info.flatten {
                            child_keys(variant.type_name.as_deref(), set)
                        } else {
                            Vec::new()
                        },
                    })
                    .collect();
                plan.ops.push(PatchOp::Discriminator(DiscriminatorSpec {
                    oneof: info.name,
                    key: info.discriminator,
                    flatten: info.flatten,
                    variants,
                }));
            }
        }

        for field in &message.fields {
            if annotations::is_flatten(field) {
                plan.ops.push(PatchOp::Flatten(FlattenSpec {
                    field_json: field.json_name.clone(),
                    prefix: annotations::flatten_prefix(field),
                    children: child_keys(field.type_name.as_deref(), set),
                }));
            }
        }

        if let Some(root) = unwrap::root_unwrap(message, table, set) {
            plan.ops.push(PatchOp::Unwrap(UnwrapOp::Root {
                field_json: root.spec.field_json,
                is_map: root.spec.is_map,
                value_collapse: root.value_unwrap.map(|spec| ValueCollapse {
                    field_json: spec.field_json,
                    is_map: spec.is_map,
                }),
            }));
        } else {
            let fields: Vec<MapValueField> = unwrap::map_value_unwraps(message, table, set)
                .into_iter()
                .map(|entry| MapValueField {
                    field_json: entry.field_json,
                    value_type: entry.value_type,
                    collapse: ValueCollapse {
                        field_json: entry.value_spec.field_json,
                        is_map: entry.value_spec.is_map,
                    },
                })
                .collect();
            if !fields.is_empty() {
                plan.ops.push(PatchOp::Unwrap(UnwrapOp::MapValues { fields }));
            }
        }

        for field in &message.fields {
            if let Some(kind) = scalar_kind(field, set) {
                if let ScalarKind::Int64Number { .. } = kind {
                    let warning = format!(
                        "{}.{}: int64_encoding=NUMBER loses integer precision above {}",
                        message.full_name,
                        field.name,
                        crate::scalar::MAX_SAFE_INTEGER
                    );
                    tracing::warn!(field = %field.name, message = %message.full_name,
                        limit = crate::scalar::MAX_SAFE_INTEGER,
                        "int64_encoding=NUMBER loses integer precision");
                    plan.warnings.push(warning);
                }
                plan.ops.push(PatchOp::Scalar(ScalarRewrite {
                    field_json: field.json_name.clone(),
                    repeated: field.is_repeated(),
                    kind,
                }));
            }
        }

        for field in &message.fields {
            if annotations::is_nullable(field) {
                plan.ops.push(PatchOp::Presence(PresenceRewrite::Nullable {
                    field_json: field.json_name.clone(),
                }));
            }
            let behavior = annotations::empty_behavior(field);
            if matches!(behavior, EmptyBehavior::Null | EmptyBehavior::Omit) {
                plan.ops.push(PatchOp::Presence(PresenceRewrite::Empty {
                    field_json: field.json_name.clone(),
                    behavior,
                }));
            }
        }

        plan.check_conflicts()?;
        Ok(plan)
    }

    /// Discriminator injection rewrites the whole object and cannot be
    /// composed with any other patch category on the same message.
    fn check_conflicts(&self) -> Result<(), ConflictError> {
        let has_discriminator = self
            .ops
            .iter()
            .any(|op| matches!(op, PatchOp::Discriminator(_)));
        if !has_discriminator {
            return Ok(());
        }
        let mut categories = vec![Category::OneofDiscriminator];
        for op in &self.ops {
            let category = op.category();
            if category != Category::OneofDiscriminator && !categories.contains(&category) {
                categories.push(category);
            }
        }
        if categories.len() > 1 {
            return Err(ConflictError {
                message: self.message.clone(),
                categories,
            });
        }
        Ok(())
    }
}

/// Child JSON keys of a message type, empty when the type is unknown.
fn child_keys(type_name: Option<&str>, set: &SchemaSet) -> Vec<String> {
    type_name
        .and_then(|name| set.message(name))
        .map(|child| {
            child
                .fields
                .iter()
                .map(|field| field.json_name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// The scalar rewrite a field's annotations call for, if any.
fn scalar_kind(field: &Field, set: &SchemaSet) -> Option<ScalarKind> {
    let encoding = annotations::bytes_encoding(field);
    if !matches!(encoding, BytesEncoding::Unspecified | BytesEncoding::Base64) {
        return Some(ScalarKind::Bytes { encoding });
    }
    if annotations::int64_encoding(field) == Int64Encoding::Number && field.kind.is_int64() {
        return Some(ScalarKind::Int64Number {
            unsigned: field.kind.is_uint64(),
        });
    }
    if field.kind == crate::model::FieldKind::Enum {
        let values = field
            .type_name
            .as_deref()
            .and_then(|name| set.enum_type(name))
            .map(|enum_type| {
                enum_type
                    .values
                    .iter()
                    .map(|value| EnumValueSpec {
                        name: value.name.clone(),
                        number: value.number,
                        alias: annotations::enum_value_alias(value),
                    })
                    .collect::<Vec<_>>()
            })?;
        if annotations::enum_encoding(field) == EnumEncoding::Number {
            return Some(ScalarKind::EnumNumber { values });
        }
        if values.iter().any(|value| value.alias.is_some()) {
            return Some(ScalarKind::EnumAlias { values });
        }
        return None;
    }
    let format = annotations::timestamp_format(field);
    if field.is_timestamp() && !matches!(format, TimestampFormat::Unspecified | TimestampFormat::Rfc3339)
    {
        return Some(ScalarKind::Timestamp { format });
    }
    None
}
