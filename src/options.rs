//! Raw option payloads attached to schema nodes.
//!
//! The ingestion front end hands options through exactly as a compiler
//! plugin receives them: wire-encoded extension payloads keyed by extension
//! field number. Scalar options (bool, enum) are varints, string options are
//! UTF-8 bytes, and message-typed options are serialized messages. Reading a
//! payload is always lenient — a malformed payload reads as "option absent".

use std::collections::BTreeMap;

use prost::bytes::Buf;

/// Extension field numbers for the shaping annotations.
///
/// One registry so every extractor and every ingestion front end agrees on
/// the numbering.
pub mod ext {
    /// `HttpConfig` on a method.
    pub const METHOD_CONFIG: u32 = 50003;
    /// `ServiceConfig` on a service.
    pub const SERVICE_CONFIG: u32 = 50004;
    /// `bool unwrap` on a repeated or map field.
    pub const UNWRAP: u32 = 50010;
    /// `bool flatten` on a singular message field.
    pub const FLATTEN: u32 = 50011;
    /// `string flatten_prefix` on a flattened field.
    pub const FLATTEN_PREFIX: u32 = 50012;
    /// `bool nullable` on a proto3-optional scalar field.
    pub const NULLABLE: u32 = 50013;
    /// `EmptyBehavior` enum on a singular message field.
    pub const EMPTY_BEHAVIOR: u32 = 50014;
    /// `BytesEncoding` enum on a bytes field.
    pub const BYTES_ENCODING: u32 = 50015;
    /// `Int64Encoding` enum on a 64-bit integer field.
    pub const INT64_ENCODING: u32 = 50016;
    /// `EnumEncoding` enum on an enum field.
    pub const ENUM_ENCODING: u32 = 50017;
    /// `TimestampFormat` enum on a `google.protobuf.Timestamp` field.
    pub const TIMESTAMP_FORMAT: u32 = 50018;
    /// `string oneof_value` on a oneof variant field.
    pub const ONEOF_VALUE: u32 = 50019;
    /// `QueryConfig` on a request field.
    pub const QUERY: u32 = 50020;
    /// `OneofConfig` on a oneof declaration.
    pub const ONEOF_CONFIG: u32 = 50030;
    /// `string enum_value` alias on an enum value.
    pub const ENUM_VALUE: u32 = 50040;
    /// `HeaderList` on a service.
    pub const SERVICE_HEADERS: u32 = 50050;
    /// `HeaderList` on a method.
    pub const METHOD_HEADERS: u32 = 50051;
}

/// Raw option payloads for one schema node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: BTreeMap<u32, Vec<Vec<u8>>>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a raw payload for an extension number.
    pub fn push_raw(&mut self, number: u32, payload: Vec<u8>) {
        self.entries.entry(number).or_default().push(payload);
    }

    #[must_use]
    pub fn with_raw(mut self, number: u32, payload: Vec<u8>) -> Self {
        self.push_raw(number, payload);
        self
    }

    #[must_use]
    pub fn with_bool(self, number: u32, value: bool) -> Self {
        self.with_raw(number, encode_varint(u64::from(value)))
    }

    #[must_use]
    pub fn with_enum(self, number: u32, value: i32) -> Self {
        // Enum payloads are int64 varints on the wire, sign-extended.
        self.with_raw(number, encode_varint(i64::from(value) as u64))
    }

    #[must_use]
    pub fn with_string(self, number: u32, value: &str) -> Self {
        self.with_raw(number, value.as_bytes().to_vec())
    }

    #[must_use]
    pub fn with_message(self, number: u32, message: &impl prost::Message) -> Self {
        self.with_raw(number, message.encode_to_vec())
    }

    fn first(&self, number: u32) -> Option<&[u8]> {
        self.entries
            .get(&number)
            .and_then(|payloads| payloads.first())
            .map(Vec::as_slice)
    }

    /// Reads a bool payload. Malformed or absent payloads read as `None`.
    pub fn get_bool(&self, number: u32) -> Option<bool> {
        self.first(number)
            .and_then(decode_varint_opt)
            .map(|value| value != 0)
    }

    /// Reads an enum number payload. Malformed or absent reads as `None`.
    pub fn get_enum(&self, number: u32) -> Option<i32> {
        self.first(number)
            .and_then(decode_varint_opt)
            .map(|value| value as i32)
    }

    /// Reads a string payload. Non-UTF-8 payloads read as `None`.
    pub fn get_string(&self, number: u32) -> Option<String> {
        self.first(number)
            .and_then(|payload| std::str::from_utf8(payload).ok())
            .map(ToOwned::to_owned)
    }

    /// Decodes a message-typed payload. Undecodable payloads read as `None`.
    pub fn get_message<M: prost::Message + Default>(&self, number: u32) -> Option<M> {
        self.first(number)
            .and_then(|payload| M::decode(payload).ok())
    }

    /// Decodes every occurrence of a repeated message-typed payload,
    /// skipping undecodable ones.
    pub fn get_messages<M: prost::Message + Default>(&self, number: u32) -> Vec<M> {
        self.entries
            .get(&number)
            .map(|payloads| {
                payloads
                    .iter()
                    .filter_map(|payload| M::decode(payload.as_slice()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn encode_varint(value: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(10);
    prost::encoding::encode_varint(value, &mut buf);
    buf
}

fn decode_varint_opt(payload: &[u8]) -> Option<u64> {
    let mut buf = payload;
    let value = prost::encoding::decode_varint(&mut buf).ok()?;
    if buf.has_remaining() {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::{OptionSet, ext};

    #[derive(Clone, PartialEq, prost::Message)]
    struct Probe {
        #[prost(string, tag = "1")]
        name: String,
        #[prost(bool, tag = "2")]
        flag: bool,
    }

    #[test]
    fn bool_roundtrip() {
        let options = OptionSet::new().with_bool(ext::UNWRAP, true);
        assert_eq!(options.get_bool(ext::UNWRAP), Some(true));
        assert_eq!(options.get_bool(ext::FLATTEN), None);
    }

    #[test]
    fn negative_enum_roundtrip() {
        let options = OptionSet::new().with_enum(ext::ENUM_ENCODING, -3);
        assert_eq!(options.get_enum(ext::ENUM_ENCODING), Some(-3));
    }

    #[test]
    fn message_roundtrip() {
        let probe = Probe {
            name: "x-api-key".to_owned(),
            flag: true,
        };
        let options = OptionSet::new().with_message(ext::METHOD_HEADERS, &probe);
        assert_eq!(options.get_message::<Probe>(ext::METHOD_HEADERS), Some(probe));
    }

    #[test]
    fn malformed_payload_reads_as_absent() {
        let options = OptionSet::new().with_raw(ext::NULLABLE, vec![0xFF; 11]);
        assert_eq!(options.get_bool(ext::NULLABLE), None);
    }

    #[test]
    fn trailing_bytes_read_as_absent() {
        let options = OptionSet::new().with_raw(ext::UNWRAP, vec![0x01, 0x01]);
        assert_eq!(options.get_bool(ext::UNWRAP), None);
    }
}
