//! Planning-time diagnostics.
//!
//! Exactly two failure kinds exist: a directive misapplied to an
//! incompatible field (or colliding with a sibling name), and two or more
//! shape-affecting directives co-occurring in a way the synthesizer cannot
//! compose. Both abort the owning file — partial output would let renderers
//! disagree on the wire shape, which is the defect class this crate exists
//! to prevent.

use core::fmt;

/// Directive family a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OneofDiscriminator,
    Flatten,
    Unwrap,
    Nullable,
    EmptyBehavior,
    BytesEncoding,
    Int64Encoding,
    EnumEncoding,
    TimestampFormat,
    Http,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneofDiscriminator => "oneof_config",
            Self::Flatten => "flatten",
            Self::Unwrap => "unwrap",
            Self::Nullable => "nullable",
            Self::EmptyBehavior => "empty_behavior",
            Self::BytesEncoding => "bytes_encoding",
            Self::Int64Encoding => "int64_encoding=NUMBER",
            Self::EnumEncoding => "enum_encoding",
            Self::TimestampFormat => "timestamp_format",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single directive misapplied, or a name collision it would cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
pub struct ValidationError {
    pub category: Category,
    /// Fully-qualified message name, or `Service.Method` for service rules.
    pub scope: String,
    pub field: Option<String>,
    pub reason: String,
}

impl ValidationError {
    pub fn new(
        category: Category,
        scope: impl Into<String>,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            scope: scope.into(),
            field: field.map(ToOwned::to_owned),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "invalid {} annotation on {}.{}: {}",
                self.category, self.scope, field, self.reason
            ),
            None => write!(
                f,
                "invalid {} annotation on {}: {}",
                self.category, self.scope, self.reason
            ),
        }
    }
}

/// Shape-affecting directives that cannot be composed on one message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
pub struct ConflictError {
    /// Fully-qualified message name.
    pub message: String,
    /// Every conflicting category, discriminator first.
    pub categories: Vec<Category>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.categories.iter().copied().map(Category::as_str);
        let first = names.next().unwrap_or("oneof_config");
        let rest = names.collect::<Vec<_>>().join(", ");
        write!(
            f,
            "message {}: {first} requires custom encoding but conflicts with {rest} (also requires custom encoding)",
            self.message
        )
    }
}

/// Any planning failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
}

#[cfg(test)]
mod tests {
    use super::{Category, ConflictError, ValidationError};

    #[test]
    fn validation_error_names_message_and_field() {
        let err = ValidationError::new(
            Category::Unwrap,
            "demo.ItemList",
            Some("items"),
            "unwrap annotation can only be used on repeated or map fields",
        );
        assert_eq!(
            err.to_string(),
            "invalid unwrap annotation on demo.ItemList.items: unwrap annotation can only be used on repeated or map fields"
        );
    }

    #[test]
    fn conflict_error_names_every_category() {
        let err = ConflictError {
            message: "demo.Event".to_owned(),
            categories: vec![
                Category::OneofDiscriminator,
                Category::BytesEncoding,
                Category::TimestampFormat,
            ],
        };
        let text = err.to_string();
        assert!(text.contains("oneof_config"));
        assert!(text.contains("bytes_encoding, timestamp_format"));
    }
}
