//! The object graph the serializer walks.
//!
//! Values are a closed set of variants rather than anything discovered at
//! runtime. Properties, display strings and container contents can be
//! deferred behind closures, which is how getters that fail and enumerators
//! that break half way are represented.

use crate::primitives::{KnownTypes, Primitive};

use chrono::{DateTime, Duration, FixedOffset};

use std::borrow::Cow;
use std::fmt;
use std::result::Result as StdResult;
use std::sync::Arc;

pub type FetchFn<T> = Arc<dyn Fn() -> StdResult<T, String> + Send + Sync>;

pub type ItemIter<T> = Box<dyn Iterator<Item = StdResult<T, String>>>;

pub type EnumerateFn<T> = Arc<dyn Fn() -> StdResult<ItemIter<T>, String> + Send + Sync>;

/// A value that is either present, known to be unavailable, or computed on
/// demand.
#[derive(Clone)]
pub enum Fetch<T> {
    Ready(T),
    Failed(String),
    Deferred(FetchFn<T>),
}

impl<T: Clone> Fetch<T> {
    pub fn deferred<F>(getter: F) -> Self
    where
        F: Fn() -> StdResult<T, String> + Send + Sync + 'static,
    {
        Fetch::Deferred(Arc::new(getter))
    }

    pub fn fetch(&self) -> StdResult<Cow<'_, T>, String> {
        match self {
            Fetch::Ready(val) => Ok(Cow::Borrowed(val)),
            Fetch::Failed(reason) => Err(reason.clone()),
            Fetch::Deferred(getter) => getter().map(Cow::Owned),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetch::Ready(val) => Some(val),
            _ => None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Fetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fetch::Ready(val) => f.debug_tuple("Ready").field(val).finish(),
            Fetch::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
            Fetch::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Elements of a container, either materialized or produced by an
/// enumerator that may fail when created or while advancing.
#[derive(Clone)]
pub enum Sequence<T> {
    Ready(Vec<T>),
    Deferred(EnumerateFn<T>),
}

impl<T> Sequence<T> {
    pub fn deferred<F>(enumerate: F) -> Self
    where
        F: Fn() -> StdResult<ItemIter<T>, String> + Send + Sync + 'static,
    {
        Sequence::Deferred(Arc::new(enumerate))
    }
}

impl<T: fmt::Debug> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Ready(items) => f.debug_tuple("Ready").field(items).finish(),
            Sequence::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Sequence::Ready(Vec::new())
    }
}

#[derive(Clone, Debug)]
pub struct Property {
    name: String,
    type_name: Option<String>,
    value: Fetch<Value>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            value: Fetch::Ready(value.into()),
        }
    }

    /// A property whose value is produced by `getter` each time it is read.
    pub fn deferred<F>(name: impl Into<String>, type_name: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> StdResult<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            value: Fetch::deferred(getter),
        }
    }

    /// A property whose getter is known to fail.
    pub fn failing(
        name: impl Into<String>,
        type_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            value: Fetch::Failed(reason.into()),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, falling back to the type of an already present value.
    pub fn type_name<'a>(&'a self, known_types: &'a KnownTypes) -> Option<Cow<'a, str>> {
        match &self.type_name {
            Some(name) => Some(Cow::Borrowed(name)),
            None => self
                .value
                .ready()
                .and_then(|value| value.type_name(known_types)),
        }
    }

    pub fn value(&self) -> &Fetch<Value> {
        &self.value
    }
}

/// A complex value: a type name and an ordered set of named properties.
#[derive(Clone, Debug)]
pub struct Object {
    type_name: String,
    properties: Vec<Property>,
    display: Option<Fetch<String>>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
            display: None,
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push(Property::new(name, value));
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(Fetch::Ready(display.into()));
        self
    }

    pub fn with_display_fetch(mut self, display: Fetch<String>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn push(&mut self, property: Property) {
        self.properties.push(property);
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    /// String form used when the object is not expanded. Without an explicit
    /// display the type name stands in.
    pub fn display(&self) -> StdResult<Cow<'_, str>, String> {
        match &self.display {
            Some(display) => display.fetch().map(|text| match text {
                Cow::Borrowed(text) => Cow::Borrowed(text.as_str()),
                Cow::Owned(text) => Cow::Owned(text),
            }),
            None => Ok(Cow::Borrowed(&self.type_name)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    List,
    Stack,
    Queue,
    Enumerable,
}

impl ContainerKind {
    fn default_type_name(self) -> &'static str {
        match self {
            ContainerKind::List => "Vec",
            ContainerKind::Stack => "Stack",
            ContainerKind::Queue => "VecDeque",
            ContainerKind::Enumerable => "Iterator",
        }
    }
}

/// An ordered collection. Generic enumerables may also carry properties of
/// their own, written after the elements.
#[derive(Clone, Debug)]
pub struct Container {
    kind: ContainerKind,
    type_name: Option<String>,
    elements: Sequence<Value>,
    properties: Vec<Property>,
}

impl Container {
    pub fn new(kind: ContainerKind, elements: Sequence<Value>) -> Self {
        Self {
            kind,
            type_name: None,
            elements,
            properties: Vec::new(),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        self.type_name
            .as_deref()
            .unwrap_or_else(|| self.kind.default_type_name())
    }

    pub fn elements(&self) -> &Sequence<Value> {
        &self.elements
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
}

#[derive(Clone, Debug)]
pub struct Dictionary {
    type_name: Option<String>,
    entries: Sequence<(Value, Value)>,
}

impl Dictionary {
    pub fn new(entries: Sequence<(Value, Value)>) -> Self {
        Self {
            type_name: None,
            entries,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or("Map")
    }

    pub fn entries(&self) -> &Sequence<(Value, Value)> {
        &self.entries
    }
}

/// A named constant backed by an integer.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumValue {
    type_name: String,
    name: String,
    underlying: Primitive,
}

impl EnumValue {
    /// `underlying` should be an integer primitive.
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        underlying: impl Into<Primitive>,
    ) -> Self {
        let underlying = underlying.into();
        debug_assert!(underlying.is_integer(), "enum backed by {:?}", underlying);
        Self {
            type_name: type_name.into(),
            name: name.into(),
            underlying,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn underlying(&self) -> &Primitive {
        &self.underlying
    }
}

/// A value with extra instance-level properties ("notes") attached.
#[derive(Clone, Debug)]
pub struct Decorated {
    inner: Value,
    notes: Vec<Property>,
    deserialized: bool,
}

impl Decorated {
    pub fn new(inner: impl Into<Value>) -> Self {
        Self {
            inner: inner.into(),
            notes: Vec::new(),
            deserialized: false,
        }
    }

    pub fn with_note(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.notes.push(Property::new(name, value));
        self
    }

    pub fn with_note_property(mut self, property: Property) -> Self {
        self.notes.push(property);
        self
    }

    /// Marks a value rebuilt from an earlier serialization. Containers marked
    /// this way get their properties written as well as their elements.
    pub fn deserialized(mut self) -> Self {
        self.deserialized = true;
        self
    }

    pub fn inner(&self) -> &Value {
        &self.inner
    }

    pub fn notes(&self) -> &[Property] {
        &self.notes
    }

    pub fn is_deserialized(&self) -> bool {
        self.deserialized
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Primitive(Primitive),
    List(Container),
    Dict(Dictionary),
    Object(Object),
    Enum(EnumValue),
    Decorated(Box<Decorated>),
}

impl Value {
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(Container::new(
            ContainerKind::List,
            Sequence::Ready(items.into_iter().map(Into::into).collect()),
        ))
    }

    pub fn dict<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Dict(Dictionary::new(Sequence::Ready(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value a decorator chain ends in.
    pub fn base(&self) -> &Value {
        let mut value = self;
        while let Value::Decorated(decorated) = value {
            value = &decorated.inner;
        }
        value
    }

    /// Type name of the base value; `None` for null.
    pub fn type_name<'a>(&'a self, known_types: &'a KnownTypes) -> Option<Cow<'a, str>> {
        match self.base() {
            Value::Null => None,
            Value::Primitive(primitive) => Some(match known_types.get(primitive.kind()) {
                Some(info) => Cow::Borrowed(info.type_name()),
                None => Cow::Owned(format!("{:?}", primitive.kind())),
            }),
            Value::List(container) => Some(Cow::Borrowed(container.type_name())),
            Value::Dict(dictionary) => Some(Cow::Borrowed(dictionary.type_name())),
            Value::Object(object) => Some(Cow::Borrowed(object.type_name())),
            Value::Enum(enum_value) => Some(Cow::Borrowed(enum_value.type_name())),
            Value::Decorated(_) => unreachable!("base() strips decorators"),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

macro_rules! value_from_primitive {
    ($($type:ty),* $(,)?) => {
        $(
            impl From<$type> for Value {
                fn from(val: $type) -> Self {
                    Value::Primitive(val.into())
                }
            }
        )*
    };
}

value_from_primitive!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    &str,
    DateTime<FixedOffset>,
    Duration,
);

impl From<Primitive> for Value {
    fn from(val: Primitive) -> Self {
        Value::Primitive(val)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        val.map_or(Value::Null, Into::into)
    }
}

impl From<Object> for Value {
    fn from(val: Object) -> Self {
        Value::Object(val)
    }
}

impl From<Container> for Value {
    fn from(val: Container) -> Self {
        Value::List(val)
    }
}

impl From<Dictionary> for Value {
    fn from(val: Dictionary) -> Self {
        Value::Dict(val)
    }
}

impl From<EnumValue> for Value {
    fn from(val: EnumValue) -> Self {
        Value::Enum(val)
    }
}

impl From<Decorated> for Value {
    fn from(val: Decorated) -> Self {
        Value::Decorated(Box::new(val))
    }
}

#[cfg(test)]
mod tests {
    use super::{Container, ContainerKind, Decorated, Fetch, Object, Property, Sequence, Value};
    use crate::primitives::KnownTypes;
    use std::borrow::Cow;
    use test_log::test;

    #[test]
    fn base_strips_every_decorator() {
        let value: Value = Decorated::new(Decorated::new(Object::new("Point"))).into();
        match value.base() {
            Value::Object(object) => assert_eq!(object.type_name(), "Point"),
            other => panic!("unexpected base {:?}", other),
        }
        assert_eq!(
            value.type_name(&KnownTypes::default()).as_deref(),
            Some("Point")
        );
    }

    #[test]
    fn property_type_falls_back_to_value() {
        let table = KnownTypes::default();
        let prop = Property::new("Count", 3i64);
        assert_eq!(prop.type_name(&table).as_deref(), Some("i64"));

        let prop = Property::new("Missing", Value::Null);
        assert_eq!(prop.type_name(&table), None);

        let prop = Property::failing("Size", "u64", "denied");
        assert_eq!(prop.type_name(&table).as_deref(), Some("u64"));
        assert_eq!(prop.value().fetch().unwrap_err(), "denied");
    }

    #[test]
    fn deferred_fetch_runs_getter() {
        let fetch: Fetch<Value> = Fetch::deferred(|| Ok(Value::from(7i32)));
        assert!(fetch.ready().is_none());
        match fetch.fetch().unwrap() {
            Cow::Owned(Value::Primitive(p)) => assert_eq!(p.to_string(), "7"),
            other => panic!("unexpected fetch {:?}", other),
        }
    }

    #[test]
    fn object_display_defaults_to_type_name() {
        let object = Object::new("Widget");
        assert_eq!(object.display().unwrap(), "Widget");
        let object = object.with_display("widget #4");
        assert_eq!(object.display().unwrap(), "widget #4");
        let object = Object::new("Widget").with_display_fetch(Fetch::Failed("boom".into()));
        assert_eq!(object.display().unwrap_err(), "boom");
    }

    #[test]
    fn container_type_names() {
        let queue = Container::new(ContainerKind::Queue, Sequence::default());
        assert_eq!(queue.type_name(), "VecDeque");
        let named = queue.with_type_name("JobQueue");
        assert_eq!(named.type_name(), "JobQueue");
        assert_eq!(named.kind(), ContainerKind::Queue);
    }
}
