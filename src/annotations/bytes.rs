use crate::model::Field;
use crate::options::ext;

/// Bytes field alphabet for JSON serialization.
///
/// The canonical mapping is standard base64 with padding; everything else is
/// a shape-affecting rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BytesEncoding {
    Unspecified,
    Base64,
    Base64Raw,
    Base64Url,
    Base64UrlRaw,
    Hex,
}

impl BytesEncoding {
    /// Unknown numbers resolve to `Unspecified`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Base64,
            2 => Self::Base64Raw,
            3 => Self::Base64Url,
            4 => Self::Base64UrlRaw,
            5 => Self::Hex,
            _ => Self::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Base64 => "base64",
            Self::Base64Raw => "base64_raw",
            Self::Base64Url => "base64url",
            Self::Base64UrlRaw => "base64url_raw",
            Self::Hex => "hex",
        }
    }
}

/// Reads the `bytes_encoding` option off a field.
pub fn bytes_encoding(field: &Field) -> BytesEncoding {
    field
        .options
        .get_enum(ext::BYTES_ENCODING)
        .map_or(BytesEncoding::Unspecified, BytesEncoding::from_i32)
}
