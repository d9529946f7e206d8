use crate::model::{Message, Oneof};
use crate::options::ext;

/// The `oneof_config` option message, as declared on a oneof.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OneofConfig {
    /// JSON key carrying the variant tag, e.g. `"type"`.
    #[prost(string, tag = "1")]
    pub discriminator: String,
    /// Lift variant fields to the parent JSON level.
    #[prost(bool, tag = "2")]
    pub flatten: bool,
}

/// Resolved discriminator configuration for one oneof.
#[derive(Debug, Clone)]
pub struct OneofDiscriminatorInfo {
    /// Index of the oneof in its parent message.
    pub index: usize,
    pub name: String,
    pub discriminator: String,
    pub flatten: bool,
    pub variants: Vec<OneofVariant>,
}

/// One variant of a discriminated oneof.
#[derive(Debug, Clone)]
pub struct OneofVariant {
    pub field: String,
    pub json_name: String,
    /// Literal emitted under the discriminator key for this variant.
    pub literal: String,
    pub is_message: bool,
    /// Variant message type, when message-typed.
    pub type_name: Option<String>,
}

/// Reads the `oneof_config` option off a oneof.
///
/// An empty discriminator reads as "annotation absent".
pub fn oneof_config(oneof: &Oneof) -> Option<OneofConfig> {
    oneof
        .options
        .get_message::<OneofConfig>(ext::ONEOF_CONFIG)
        .filter(|config| !config.discriminator.is_empty())
}

/// Custom discriminator literal for a variant field, if set.
pub fn variant_literal(field: &crate::model::Field) -> Option<String> {
    field
        .options
        .get_string(ext::ONEOF_VALUE)
        .filter(|literal| !literal.is_empty())
}

/// Resolves full discriminator info for the oneof at `index`, or `None` if
/// the oneof is not annotated. Each variant's literal falls back to its
/// proto field name.
pub fn discriminator_info(message: &Message, index: usize) -> Option<OneofDiscriminatorInfo> {
    let oneof = message.oneofs.get(index)?;
    let config = oneof_config(oneof)?;

    let variants = message
        .oneof_fields(index)
        .map(|field| OneofVariant {
            literal: variant_literal(field).unwrap_or_else(|| field.name.clone()),
            field: field.name.clone(),
            json_name: field.json_name.clone(),
            is_message: field.is_message(),
            type_name: field.type_name.clone(),
        })
        .collect();

    Some(OneofDiscriminatorInfo {
        index,
        name: oneof.name.clone(),
        discriminator: config.discriminator,
        flatten: config.flatten,
        variants,
    })
}

/// Whether any oneof in the message carries a discriminator annotation.
pub fn has_discriminator(message: &Message) -> bool {
    (0..message.oneofs.len()).any(|index| discriminator_info(message, index).is_some())
}
