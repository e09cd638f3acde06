//! Scalar values and the table that decides which of them are written as
//! plain text leaves.

use chrono::{DateTime, Duration, FixedOffset, SecondsFormat};

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// A scalar with a direct text form.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Duration(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    DateTime,
    Duration,
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Bool(_) => PrimitiveKind::Bool,
            Primitive::Char(_) => PrimitiveKind::Char,
            Primitive::I8(_) => PrimitiveKind::I8,
            Primitive::I16(_) => PrimitiveKind::I16,
            Primitive::I32(_) => PrimitiveKind::I32,
            Primitive::I64(_) => PrimitiveKind::I64,
            Primitive::U8(_) => PrimitiveKind::U8,
            Primitive::U16(_) => PrimitiveKind::U16,
            Primitive::U32(_) => PrimitiveKind::U32,
            Primitive::U64(_) => PrimitiveKind::U64,
            Primitive::F32(_) => PrimitiveKind::F32,
            Primitive::F64(_) => PrimitiveKind::F64,
            Primitive::String(_) => PrimitiveKind::String,
            Primitive::DateTime(_) => PrimitiveKind::DateTime,
            Primitive::Duration(_) => PrimitiveKind::Duration,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind(),
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
        )
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(val) => write!(f, "{}", val),
            Primitive::Char(val) => write!(f, "{}", val),
            Primitive::I8(val) => write!(f, "{}", val),
            Primitive::I16(val) => write!(f, "{}", val),
            Primitive::I32(val) => write!(f, "{}", val),
            Primitive::I64(val) => write!(f, "{}", val),
            Primitive::U8(val) => write!(f, "{}", val),
            Primitive::U16(val) => write!(f, "{}", val),
            Primitive::U32(val) => write!(f, "{}", val),
            Primitive::U64(val) => write!(f, "{}", val),
            Primitive::F32(val) => write!(f, "{}", val),
            Primitive::F64(val) => write!(f, "{}", val),
            Primitive::String(val) => f.write_str(val),
            Primitive::DateTime(val) => {
                f.write_str(&val.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Primitive::Duration(val) => write!(f, "{}", val),
        }
    }
}

macro_rules! basic_primitive {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Primitive {
            fn from(val: $type) -> Self {
                Primitive::$variant(val)
            }
        }
    };
}

basic_primitive!(bool, Bool);
basic_primitive!(char, Char);
basic_primitive!(i8, I8);
basic_primitive!(i16, I16);
basic_primitive!(i32, I32);
basic_primitive!(i64, I64);
basic_primitive!(u8, U8);
basic_primitive!(u16, U16);
basic_primitive!(u32, U32);
basic_primitive!(u64, U64);
basic_primitive!(f32, F32);
basic_primitive!(f64, F64);
basic_primitive!(String, String);
basic_primitive!(DateTime<FixedOffset>, DateTime);
basic_primitive!(Duration, Duration);

impl From<&str> for Primitive {
    fn from(val: &str) -> Self {
        Primitive::String(val.to_owned())
    }
}

pub type Render = fn(&Primitive) -> String;

fn render_display(primitive: &Primitive) -> String {
    primitive.to_string()
}

fn render_dotnet(primitive: &Primitive) -> String {
    match primitive {
        Primitive::Bool(true) => "True".to_owned(),
        Primitive::Bool(false) => "False".to_owned(),
        other => other.to_string(),
    }
}

/// How one kind of primitive is named and rendered.
#[derive(Clone)]
pub struct TypeSerializationInfo {
    type_name: Cow<'static, str>,
    render: Render,
}

impl TypeSerializationInfo {
    pub fn new(type_name: impl Into<Cow<'static, str>>, render: Render) -> Self {
        Self {
            type_name: type_name.into(),
            render,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn render(&self, primitive: &Primitive) -> String {
        (self.render)(primitive)
    }
}

impl fmt::Debug for TypeSerializationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSerializationInfo")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Lookup table from primitive kind to its serialization info.
///
/// A kind missing from the table is not a known type: values of that kind
/// are written through the string-coercion path instead of as typed leaves.
#[derive(Clone, Debug)]
pub struct KnownTypes {
    table: HashMap<PrimitiveKind, TypeSerializationInfo>,
}

macro_rules! known_types {
    ($render:expr; $($kind:ident => $name:expr),* $(,)?) => {{
        let mut table = HashMap::new();
        $(
            table.insert(
                PrimitiveKind::$kind,
                TypeSerializationInfo::new($name, $render),
            );
        )*
        KnownTypes { table }
    }};
}

impl KnownTypes {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Type names of the tag-based markup this format comes from.
    pub fn dotnet() -> Self {
        known_types! {
            render_dotnet;
            Bool => "System.Boolean",
            Char => "System.Char",
            I8 => "System.SByte",
            I16 => "System.Int16",
            I32 => "System.Int32",
            I64 => "System.Int64",
            U8 => "System.Byte",
            U16 => "System.UInt16",
            U32 => "System.UInt32",
            U64 => "System.UInt64",
            F32 => "System.Single",
            F64 => "System.Double",
            String => "System.String",
            DateTime => "System.DateTime",
            Duration => "System.TimeSpan",
        }
    }

    pub fn get(&self, kind: PrimitiveKind) -> Option<&TypeSerializationInfo> {
        self.table.get(&kind)
    }

    pub fn register(
        &mut self,
        kind: PrimitiveKind,
        info: TypeSerializationInfo,
    ) -> Option<TypeSerializationInfo> {
        self.table.insert(kind, info)
    }

    pub fn unregister(&mut self, kind: PrimitiveKind) -> Option<TypeSerializationInfo> {
        self.table.remove(&kind)
    }
}

impl Default for KnownTypes {
    fn default() -> Self {
        known_types! {
            render_display;
            Bool => "bool",
            Char => "char",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            F32 => "f32",
            F64 => "f64",
            String => "String",
            DateTime => "DateTime",
            Duration => "Duration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{KnownTypes, Primitive, PrimitiveKind, TypeSerializationInfo};
    use chrono::{DateTime, Duration};
    use test_log::test;

    #[test]
    fn default_table_uses_rust_names() {
        let table = KnownTypes::default();
        let info = table.get(PrimitiveKind::I32).unwrap();
        assert_eq!(info.type_name(), "i32");
        assert_eq!(info.render(&Primitive::I32(42)), "42");
        assert_eq!(
            table
                .get(PrimitiveKind::Bool)
                .unwrap()
                .render(&Primitive::Bool(true)),
            "true"
        );
    }

    #[test]
    fn dotnet_table_renders_booleans_capitalised() {
        let table = KnownTypes::dotnet();
        let info = table.get(PrimitiveKind::Bool).unwrap();
        assert_eq!(info.type_name(), "System.Boolean");
        assert_eq!(info.render(&Primitive::Bool(false)), "False");
        assert_eq!(
            table.get(PrimitiveKind::F64).unwrap().render(&0.5f64.into()),
            "0.5"
        );
    }

    #[test]
    fn register_replaces_entries() {
        fn shout(primitive: &Primitive) -> String {
            primitive.to_string().to_uppercase()
        }

        let mut table = KnownTypes::default();
        let old = table.register(
            PrimitiveKind::String,
            TypeSerializationInfo::new("str", shout),
        );
        assert_eq!(old.unwrap().type_name(), "String");
        let info = table.get(PrimitiveKind::String).unwrap();
        assert_eq!(info.render(&"abc".into()), "ABC");

        assert!(table.unregister(PrimitiveKind::Char).is_some());
        assert!(table.get(PrimitiveKind::Char).is_none());
        assert!(KnownTypes::empty().get(PrimitiveKind::I8).is_none());
    }

    #[test]
    fn temporal_values_render() {
        let stamp = DateTime::parse_from_rfc3339("2021-03-04T05:06:07+00:00").unwrap();
        assert_eq!(Primitive::from(stamp).to_string(), "2021-03-04T05:06:07Z");
        assert_eq!(Primitive::from(Duration::seconds(90)).to_string(), "PT90S");
    }

    #[test]
    fn integer_kinds() {
        assert!(Primitive::U16(3).is_integer());
        assert!(!Primitive::F32(3.0).is_integer());
        assert!(!Primitive::from("3").is_integer());
    }
}
