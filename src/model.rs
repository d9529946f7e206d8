//! Normalized schema model consumed by the planner.
//!
//! The ingestion front end (the part of the host that parses the compiler
//! request) produces this model; nothing in this crate parses descriptor
//! wire bytes itself. The constructors double as the builder API for that
//! front end and for tests.

use crate::options::OptionSet;

/// Fully-qualified name of the well-known timestamp type.
pub const TIMESTAMP_TYPE: &str = "google.protobuf.Timestamp";

/// One compilation unit: every file handed to the compiler in one run.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    pub files: Vec<SchemaFile>,
}

impl SchemaSet {
    pub fn new(files: Vec<SchemaFile>) -> Self {
        Self { files }
    }

    /// All messages in the set, nested ones included, in declaration order.
    pub fn all_messages(&self) -> Vec<&Message> {
        let mut out = Vec::new();
        for file in &self.files {
            for message in &file.messages {
                collect_messages(message, &mut out);
            }
        }
        out
    }

    /// Looks up a message anywhere in the set by fully-qualified name.
    pub fn message(&self, full_name: &str) -> Option<&Message> {
        self.all_messages()
            .into_iter()
            .find(|message| message.full_name == full_name)
    }

    /// Looks up an enum anywhere in the set by fully-qualified name.
    pub fn enum_type(&self, full_name: &str) -> Option<&Enum> {
        for file in &self.files {
            for enum_type in &file.enums {
                if enum_type.full_name == full_name {
                    return Some(enum_type);
                }
            }
        }
        for message in self.all_messages() {
            for enum_type in &message.nested_enums {
                if enum_type.full_name == full_name {
                    return Some(enum_type);
                }
            }
        }
        None
    }
}

fn collect_messages<'a>(message: &'a Message, out: &mut Vec<&'a Message>) {
    out.push(message);
    for nested in &message.nested {
        collect_messages(nested, out);
    }
}

/// One schema file within a compilation unit.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    pub name: String,
    pub package: String,
    /// Whether the compiler was asked to generate output for this file.
    /// Files pulled in only as imports carry `false`.
    pub generate: bool,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub services: Vec<Service>,
}

impl SchemaFile {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            generate: true,
            messages: Vec::new(),
            enums: Vec::new(),
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, enum_type: Enum) -> Self {
        self.enums.push(enum_type);
        self
    }

    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn import_only(mut self) -> Self {
        self.generate = false;
        self
    }
}

/// Proto field kind, flattened across the 32/64-bit integer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Enum,
    Message,
}

impl FieldKind {
    /// All five 64-bit integer spellings.
    pub fn is_int64(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Sint64 | Self::Sfixed64 | Self::Uint64 | Self::Fixed64
        )
    }

    pub fn is_uint64(self) -> bool {
        matches!(self, Self::Uint64 | Self::Fixed64)
    }

    pub fn is_message(self) -> bool {
        self == Self::Message
    }

    /// Kinds that may be bound to a path variable.
    pub fn is_path_compatible(self) -> bool {
        !matches!(self, Self::Enum | Self::Bytes | Self::Message)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Enum => "enum",
            Self::Message => "message",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

/// Value side of a map field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapValue {
    pub kind: FieldKind,
    /// Fully-qualified value type for message/enum-valued maps.
    pub type_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub json_name: String,
    pub number: i32,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    /// Fully-qualified type name for message and enum fields.
    pub type_name: Option<String>,
    /// Index into the parent message's oneof list, if this is a variant.
    pub oneof_index: Option<usize>,
    pub proto3_optional: bool,
    /// Present exactly when `cardinality` is `Map`.
    pub map_value: Option<MapValue>,
    pub options: OptionSet,
}

impl Field {
    pub fn scalar(name: impl Into<String>, number: i32, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            json_name: json_name(&name),
            name,
            number,
            kind,
            cardinality: Cardinality::Singular,
            type_name: None,
            oneof_index: None,
            proto3_optional: false,
            map_value: None,
            options: OptionSet::new(),
        }
    }

    pub fn message(name: impl Into<String>, number: i32, type_name: impl Into<String>) -> Self {
        let mut field = Self::scalar(name, number, FieldKind::Message);
        field.type_name = Some(type_name.into());
        field
    }

    pub fn enumeration(name: impl Into<String>, number: i32, type_name: impl Into<String>) -> Self {
        let mut field = Self::scalar(name, number, FieldKind::Enum);
        field.type_name = Some(type_name.into());
        field
    }

    pub fn map(
        name: impl Into<String>,
        number: i32,
        value_kind: FieldKind,
        value_type: Option<&str>,
    ) -> Self {
        let mut field = Self::scalar(name, number, FieldKind::Message);
        field.cardinality = Cardinality::Map;
        field.map_value = Some(MapValue {
            kind: value_kind,
            type_name: value_type.map(ToOwned::to_owned),
        });
        field
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.proto3_optional = true;
        self
    }

    #[must_use]
    pub fn in_oneof(mut self, index: usize) -> Self {
        self.oneof_index = Some(index);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    pub fn is_message(&self) -> bool {
        self.kind == FieldKind::Message && !self.is_map()
    }

    pub fn is_timestamp(&self) -> bool {
        self.is_message() && self.type_name.as_deref() == Some(TIMESTAMP_TYPE)
    }
}

/// A oneof declaration. Member fields reference it through
/// [`Field::oneof_index`].
#[derive(Debug, Clone)]
pub struct Oneof {
    pub name: String,
    pub options: OptionSet,
}

impl Oneof {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: OptionSet::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub fields: Vec<Field>,
    pub oneofs: Vec<Oneof>,
    pub nested: Vec<Message>,
    pub nested_enums: Vec<Enum>,
    pub options: OptionSet,
}

impl Message {
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_owned();
        Self {
            name,
            full_name,
            fields: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            nested_enums: Vec::new(),
            options: OptionSet::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_oneof(mut self, oneof: Oneof) -> Self {
        self.oneofs.push(oneof);
        self
    }

    #[must_use]
    pub fn with_nested(mut self, message: Message) -> Self {
        self.nested.push(message);
        self
    }

    #[must_use]
    pub fn with_nested_enum(mut self, enum_type: Enum) -> Self {
        self.nested_enums.push(enum_type);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Member fields of the oneof at `index`, in declaration order.
    pub fn oneof_fields(&self, index: usize) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(move |field| field.oneof_index == Some(index))
    }
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    pub values: Vec<EnumValue>,
}

impl Enum {
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_owned();
        Self {
            name,
            full_name,
            values: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: EnumValue) -> Self {
        self.values.push(value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub options: OptionSet,
}

impl EnumValue {
    pub fn new(name: impl Into<String>, number: i32) -> Self {
        Self {
            name: name.into(),
            number,
            options: OptionSet::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub full_name: String,
    pub methods: Vec<Method>,
    pub options: OptionSet,
}

impl Service {
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_owned();
        Self {
            name,
            full_name,
            methods: Vec::new(),
            options: OptionSet::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub options: OptionSet,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
            options: OptionSet::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

/// Default protobuf JSON name: lowerCamelCase of the proto field name.
pub fn json_name(proto_name: &str) -> String {
    let mut out = String::with_capacity(proto_name.len());
    let mut upper_next = false;
    for ch in proto_name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Field, FieldKind, Message, SchemaFile, SchemaSet, json_name};

    #[test]
    fn json_name_camel_cases() {
        assert_eq!(json_name("created_at"), "createdAt");
        assert_eq!(json_name("name"), "name");
        assert_eq!(json_name("a_b_c"), "aBC");
    }

    #[test]
    fn nested_messages_are_reachable() {
        let inner = Message::new("demo.Outer.Inner");
        let outer = Message::new("demo.Outer").with_nested(inner);
        let set = SchemaSet::new(vec![SchemaFile::new("demo.proto", "demo").with_message(outer)]);
        assert!(set.message("demo.Outer.Inner").is_some());
        assert_eq!(set.all_messages().len(), 2);
    }

    #[test]
    fn oneof_fields_filter_by_index() {
        let message = Message::new("demo.Event")
            .with_field(Field::scalar("id", 1, FieldKind::String))
            .with_field(Field::scalar("a", 2, FieldKind::String).in_oneof(0))
            .with_field(Field::scalar("b", 3, FieldKind::Int32).in_oneof(0));
        let names: Vec<_> = message.oneof_fields(0).map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
