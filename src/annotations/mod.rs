//! Annotation extraction: typed directive values read off schema nodes.
//!
//! Extraction is a pure function of the node and never fails. An absent or
//! malformed option reads as "directive absent"; enum options with a number
//! outside the known range resolve to their `Unspecified` default.

mod bytes;
mod empty;
mod enums;
mod flatten;
pub mod http;
mod int64;
mod nullable;
mod oneof;
mod timestamp;
mod unwrap;

pub use bytes::{BytesEncoding, bytes_encoding};
pub use empty::{EmptyBehavior, empty_behavior};
pub use enums::{
    EnumEncoding, enum_encoding, enum_value_alias, has_conflicting_enum_annotations,
    has_value_aliases,
};
pub use flatten::{flatten_prefix, is_flatten};
pub use int64::{Int64Encoding, int64_encoding, is_int64_number};
pub use nullable::is_nullable;
pub use oneof::{
    OneofConfig, OneofDiscriminatorInfo, OneofVariant, discriminator_info, has_discriminator,
    oneof_config, variant_literal,
};
pub use timestamp::{TimestampFormat, timestamp_format};
pub use unwrap::has_unwrap;

use crate::model::Field;

/// The per-field shaping directives as one closed union.
///
/// At most one of these may be shape-affecting on a given field; the
/// validator rejects fields carrying more.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDirective {
    Flatten { prefix: String },
    Unwrap,
    Nullable,
    Empty(EmptyBehavior),
    Bytes(BytesEncoding),
    Int64(Int64Encoding),
    Enum(EnumEncoding),
    Timestamp(TimestampFormat),
}

impl FieldDirective {
    /// Whether the directive changes the canonical JSON shape.
    ///
    /// Default-equivalent settings (standard base64, string int64, RFC 3339
    /// timestamps, symbolic enum names, preserve-empty) extract as present
    /// but leave the canonical mapping untouched.
    pub fn is_shape_affecting(&self) -> bool {
        match self {
            Self::Flatten { .. } | Self::Unwrap | Self::Nullable => true,
            Self::Empty(behavior) => {
                !matches!(behavior, EmptyBehavior::Unspecified | EmptyBehavior::Preserve)
            }
            Self::Bytes(encoding) => {
                !matches!(encoding, BytesEncoding::Unspecified | BytesEncoding::Base64)
            }
            Self::Int64(encoding) => *encoding == Int64Encoding::Number,
            Self::Enum(encoding) => *encoding == EnumEncoding::Number,
            Self::Timestamp(format) => {
                !matches!(format, TimestampFormat::Unspecified | TimestampFormat::Rfc3339)
            }
        }
    }
}

/// Every directive present on a field, in a fixed extraction order.
pub fn field_directives(field: &Field) -> Vec<FieldDirective> {
    let mut directives = Vec::new();
    if is_flatten(field) {
        directives.push(FieldDirective::Flatten {
            prefix: flatten_prefix(field),
        });
    }
    if has_unwrap(field) {
        directives.push(FieldDirective::Unwrap);
    }
    if is_nullable(field) {
        directives.push(FieldDirective::Nullable);
    }
    let behavior = empty_behavior(field);
    if behavior != EmptyBehavior::Unspecified {
        directives.push(FieldDirective::Empty(behavior));
    }
    let encoding = bytes_encoding(field);
    if encoding != BytesEncoding::Unspecified {
        directives.push(FieldDirective::Bytes(encoding));
    }
    let encoding = int64_encoding(field);
    if encoding != Int64Encoding::Unspecified {
        directives.push(FieldDirective::Int64(encoding));
    }
    let encoding = enum_encoding(field);
    if encoding != EnumEncoding::Unspecified {
        directives.push(FieldDirective::Enum(encoding));
    }
    let format = timestamp_format(field);
    if format != TimestampFormat::Unspecified {
        directives.push(FieldDirective::Timestamp(format));
    }
    directives
}

/// The shape-affecting directives present on a field.
pub fn shape_directives(field: &Field) -> Vec<FieldDirective> {
    field_directives(field)
        .into_iter()
        .filter(FieldDirective::is_shape_affecting)
        .collect()
}
