use crate::cancel::StopHandle;
use crate::classify::{classify, Shape, Strategy};
use crate::error::{Error, Result};
use crate::primitives::Primitive;
use crate::value::{ContainerKind, Decorated, EnumValue, Property, Sequence, Value};
use crate::writer::ElementWriter;

use super::serializer_policy::{SerializationMethod, SerializationPolicy, TypeHints};

use log::{debug, trace, warn};

fn for_each_item<T, F>(items: &Sequence<T>, mut f: F) -> Result<()>
where
    F: FnMut(&T) -> Result<()>,
{
    match items {
        Sequence::Ready(items) => {
            for item in items {
                f(item)?;
            }
        }
        Sequence::Deferred(enumerate) => {
            let iter = match enumerate() {
                Ok(iter) => iter,
                Err(reason) => {
                    warn!("{}; writing an empty container", Error::Enumeration(reason));
                    return Ok(());
                }
            };
            for item in iter {
                match item {
                    Ok(item) => f(&item)?,
                    Err(reason) => {
                        warn!("{}; dropping remaining elements", Error::Enumeration(reason));
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Notes of every decorator wrapping `value`, innermost first.
fn collect_notes(value: &Value) -> Vec<&Property> {
    let mut chain: Vec<&Decorated> = Vec::new();
    let mut current = value;
    while let Value::Decorated(decorated) = current {
        chain.push(decorated);
        current = decorated.inner();
    }
    chain
        .into_iter()
        .rev()
        .flat_map(|decorated| decorated.notes())
        .collect()
}

/// Properties of the base value followed by the notes of its decorators.
fn collect_properties(value: &Value) -> Vec<&Property> {
    let mut properties: Vec<&Property> = match value.base() {
        Value::Object(object) => object.properties().iter().collect(),
        Value::List(container) => container.properties().iter().collect(),
        _ => Vec::new(),
    };
    properties.extend(collect_notes(value));
    properties
}

/// Walks one top-level value into a writer.
///
/// A fresh instance is made per top-level item: `first_call` decides that the
/// first unnamed element gets the item tag, and `first_object_call` allows a
/// single promotion of a decorator chain's properties.
pub(crate) struct InternalSerializer<'a, W: ElementWriter + ?Sized> {
    writer: &'a mut W,
    policy: &'a SerializationPolicy,
    stop: &'a StopHandle,
    first_call: bool,
    first_object_call: bool,
    visited: usize,
}

impl<'a, W: ElementWriter + ?Sized> InternalSerializer<'a, W> {
    pub(crate) fn new(
        writer: &'a mut W,
        policy: &'a SerializationPolicy,
        stop: &'a StopHandle,
        is_first_call_for_object: bool,
    ) -> Self {
        Self {
            writer,
            policy,
            stop,
            first_call: is_first_call_for_object,
            first_object_call: true,
            visited: 0,
        }
    }

    /// Nodes visited so far.
    pub(crate) fn visited(&self) -> usize {
        self.visited
    }

    fn check_if_stopping(&self) -> Result<()> {
        if self.stop.is_cancelled() {
            debug!("stop requested after {} nodes", self.visited);
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Writes `value` as exactly one element, named `property` if given,
    /// allowing `depth` more levels of property expansion.
    pub(crate) fn write_one_value(
        &mut self,
        value: &Value,
        property: Option<&str>,
        depth: usize,
    ) -> Result<()> {
        self.check_if_stopping()?;
        self.visited += 1;

        let strategy = classify(value, depth, self.policy);
        trace!(
            "node {} property={:?} depth={} strategy={:?}",
            self.visited,
            property,
            depth,
            strategy
        );

        match strategy {
            Strategy::Null => self.write_null(property),
            Strategy::Primitive(primitive) => self.write_primitive(property, primitive),
            Strategy::DecoratedPrimitive {
                decorated,
                primitive,
            } => self.handle_decorated_primitive(decorated, primitive, property, depth),
            Strategy::Container { shape, decorated } => {
                self.handle_container(value, shape, decorated, property, depth)
            }
            Strategy::EnumLike(enum_value) => self.write_enum(property, enum_value),
            Strategy::AsString => self.handle_as_string(value, property, depth),
            Strategy::Complex => self.handle_complex(value, property, depth),
        }
    }

    fn write_start(&mut self, property: Option<&str>) -> Result<()> {
        let policy = self.policy;
        let names = policy.names();
        match property {
            Some(name) => {
                self.writer.open_element(&names.property)?;
                self.writer.set_attribute(&names.name_attribute, name)
            }
            None if self.first_call => {
                self.first_call = false;
                self.writer.open_element(&names.object)
            }
            None => self.writer.open_element(&names.property),
        }
    }

    fn write_type(&mut self, type_name: Option<&str>) -> Result<()> {
        match type_name {
            Some(type_name) if self.policy.includes_type_names() => self
                .writer
                .set_attribute(&self.policy.names().type_attribute, type_name),
            _ => Ok(()),
        }
    }

    fn write_type_of(&mut self, value: &Value) -> Result<()> {
        let policy = self.policy;
        let type_name = value.type_name(policy.known_types());
        self.write_type(type_name.as_deref())
    }

    fn write_null(&mut self, property: Option<&str>) -> Result<()> {
        self.write_start(property)?;
        self.writer.close_element()
    }

    fn write_primitive(&mut self, property: Option<&str>, primitive: &Primitive) -> Result<()> {
        let policy = self.policy;
        let (type_name, text) = match policy.known_types().get(primitive.kind()) {
            Some(info) => (info.type_name().to_owned(), info.render(primitive)),
            None => (format!("{:?}", primitive.kind()), primitive.to_string()),
        };
        self.write_start(property)?;
        self.write_type(Some(&type_name))?;
        self.writer.write_text(&text)?;
        self.writer.close_element()
    }

    fn write_enum(&mut self, property: Option<&str>, enum_value: &EnumValue) -> Result<()> {
        self.write_primitive(property, enum_value.underlying())
    }

    /// A property that is null or could not be read: named, typed if the type
    /// is known, and empty.
    fn write_property_with_null_value(&mut self, prop: &Property) -> Result<()> {
        let policy = self.policy;
        let names = policy.names();
        self.writer.open_element(&names.property)?;
        self.writer.set_attribute(&names.name_attribute, prop.name())?;
        let type_name = prop.type_name(policy.known_types());
        self.write_type(type_name.as_deref())?;
        self.writer.close_element()
    }

    fn write_property(&mut self, prop: &Property, depth: usize) -> Result<()> {
        self.check_if_stopping()?;
        match prop.value().fetch() {
            Ok(value) if value.is_null() => self.write_property_with_null_value(prop),
            Ok(value) => self.write_one_value(&value, Some(prop.name()), depth),
            Err(reason) => {
                warn!(
                    "{}; writing it empty",
                    Error::PropertyFetch {
                        property: prop.name().to_owned(),
                        reason,
                    }
                );
                self.write_property_with_null_value(prop)
            }
        }
    }

    /// Writes properties of something at `depth`; each property gets one less.
    fn write_properties<'p, I>(&mut self, properties: I, depth: usize) -> Result<()>
    where
        I: IntoIterator<Item = &'p Property>,
    {
        let depth = depth.saturating_sub(1);
        for prop in properties {
            self.write_property(prop, depth)?;
        }
        Ok(())
    }

    fn hints_for(&self, value: &Value) -> Option<&'a TypeHints> {
        let policy = self.policy;
        let type_name = value.type_name(policy.known_types())?;
        policy.type_hints(&type_name)
    }

    /// The property walk of a complex value, honouring per-type depth and
    /// property selection.
    fn write_object_properties(&mut self, value: &Value, depth: usize) -> Result<()> {
        let hints = self.hints_for(value);
        let depth = match hints.and_then(|hints| hints.depth) {
            Some(type_depth) if type_depth > 0 => type_depth,
            _ => depth,
        };
        let properties = collect_properties(value);

        match hints.map(|hints| &hints.method) {
            Some(SerializationMethod::SpecificProperties(names)) => {
                let selected = names.iter().filter_map(|name| {
                    properties
                        .iter()
                        .copied()
                        .find(|prop| prop.name() == name.as_str())
                });
                self.write_properties(selected, depth)
            }
            _ => self.write_properties(properties.iter().copied(), depth),
        }
    }

    fn handle_decorated_primitive(
        &mut self,
        decorated: &Decorated,
        primitive: &Primitive,
        property: Option<&str>,
        depth: usize,
    ) -> Result<()> {
        if decorated.notes().is_empty() {
            return self.write_primitive(property, primitive);
        }
        let policy = self.policy;
        self.write_start(property)?;
        self.write_type(
            policy
                .known_types()
                .get(primitive.kind())
                .map(|info| info.type_name()),
        )?;
        self.write_primitive(None, primitive)?;
        self.write_properties(decorated.notes(), depth)?;
        self.writer.close_element()
    }

    fn handle_container(
        &mut self,
        value: &Value,
        shape: Shape<'_>,
        decorated: Option<&Decorated>,
        property: Option<&str>,
        depth: usize,
    ) -> Result<()> {
        self.write_start(property)?;
        self.write_type_of(value)?;

        let sidecar = match shape {
            Shape::Dictionary(dictionary) => {
                let policy = self.policy;
                let names = policy.names();
                for_each_item(dictionary.entries(), |(key, value)| {
                    self.write_one_value(key, Some(names.key.as_str()), depth)?;
                    self.write_one_value(value, Some(names.value.as_str()), depth)
                })?;
                false
            }
            Shape::List(container) => {
                for_each_item(container.elements(), |item| {
                    self.write_one_value(item, None, depth)
                })?;
                container.kind() == ContainerKind::Enumerable
            }
        };

        let deserialized = decorated.map_or(false, Decorated::is_deserialized);
        if sidecar || deserialized {
            self.write_object_properties(value, depth)?;
        } else if let Some(decorated) = decorated {
            self.write_properties(decorated.notes(), depth)?;
        }

        self.writer.close_element()
    }

    /// The string form of a value, or `None` when there is none or building
    /// it failed.
    fn string_form(&self, value: &Value) -> Option<String> {
        match self.try_string_form(value) {
            Ok(text) => text,
            Err(err) => {
                warn!("{}; writing null instead", err);
                None
            }
        }
    }

    fn try_string_form(&self, value: &Value) -> Result<Option<String>> {
        let source = self
            .hints_for(value)
            .and_then(|hints| hints.string_source.as_deref());
        if let Some(source) = source {
            let prop = collect_properties(value)
                .into_iter()
                .find(|prop| prop.name() == source);
            if let Some(prop) = prop {
                let source_value = prop.value().fetch().map_err(Error::StringConversion)?;
                return self.display_string(&source_value);
            }
        }
        self.display_string(value)
    }

    fn display_string(&self, value: &Value) -> Result<Option<String>> {
        let text = match value.base() {
            Value::Null => return Ok(None),
            Value::Primitive(primitive) => match self.policy.known_types().get(primitive.kind()) {
                Some(info) => info.render(primitive),
                None => primitive.to_string(),
            },
            Value::Object(object) => object
                .display()
                .map_err(Error::StringConversion)?
                .into_owned(),
            Value::List(container) => container.type_name().to_owned(),
            Value::Dict(dictionary) => dictionary.type_name().to_owned(),
            Value::Enum(enum_value) => enum_value.name().to_owned(),
            Value::Decorated(_) => unreachable!("base() strips decorators"),
        };
        Ok(Some(text))
    }

    /// The unnamed leaf written next to notes: a primitive base keeps its own
    /// type, anything else becomes its string form.
    fn string_leaf(&self, value: &Value) -> Option<Primitive> {
        let has_source = self
            .hints_for(value)
            .map_or(false, |hints| hints.string_source.is_some());
        match value.base() {
            Value::Primitive(primitive) if !has_source => Some(primitive.clone()),
            _ => self.string_form(value).map(Primitive::String),
        }
    }

    fn handle_as_string(&mut self, value: &Value, property: Option<&str>, depth: usize) -> Result<()> {
        let notes = collect_notes(value);

        if notes.is_empty() {
            return match self.string_form(value) {
                Some(text) => {
                    self.write_start(property)?;
                    self.write_type_of(value)?;
                    self.writer.write_text(&text)?;
                    self.writer.close_element()
                }
                None => self.write_null(property),
            };
        }

        self.write_start(property)?;
        self.write_type_of(value)?;
        if let Some(leaf) = self.string_leaf(value) {
            self.write_primitive(None, &leaf)?;
        }
        self.write_properties(notes, depth)?;
        self.writer.close_element()
    }

    fn handle_complex(&mut self, value: &Value, property: Option<&str>, depth: usize) -> Result<()> {
        self.write_start(property)?;
        self.write_type_of(value)?;

        match value {
            Value::Decorated(outer) if matches!(outer.inner(), Value::Decorated(_)) => {
                if self.first_object_call {
                    self.first_object_call = false;
                    match value.base() {
                        Value::Object(_) => self.write_object_properties(value, depth)?,
                        base => {
                            self.write_one_value(base, None, depth)?;
                            self.write_properties(collect_notes(value), depth)?;
                        }
                    }
                } else {
                    self.write_one_value(outer.inner(), None, depth)?;
                    self.write_properties(outer.notes(), depth)?;
                }
            }
            _ => self.write_object_properties(value, depth)?,
        }

        self.writer.close_element()
    }
}
