//! Knobs that shape the serialized output.
//!
//! A [`SerializationPolicy`] holds the default depth, whether type names are
//! written, the element/attribute vocabulary, the primitive type table, and
//! per-type [`TypeHints`] keyed by type name.

use crate::error::{Error, Result};
use crate::primitives::KnownTypes;

use std::collections::HashMap;

/// How objects of one type are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializationMethod {
    AllPublicProperties,
    /// Write a single string instead of expanding properties.
    String,
    /// Expand only these properties, in this order.
    SpecificProperties(Vec<String>),
}

impl Default for SerializationMethod {
    fn default() -> Self {
        SerializationMethod::AllPublicProperties
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeHints {
    pub method: SerializationMethod,
    /// Replaces the incoming depth for this type's property walk when set
    /// and non-zero.
    pub depth: Option<usize>,
    /// Property whose value supplies the string form of the object.
    pub string_source: Option<String>,
}

impl TypeHints {
    pub fn as_string() -> Self {
        Self {
            method: SerializationMethod::String,
            ..Self::default()
        }
    }

    pub fn specific_properties<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: SerializationMethod::SpecificProperties(
                names.into_iter().map(Into::into).collect(),
            ),
            ..Self::default()
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_string_source(mut self, property: impl Into<String>) -> Self {
        self.string_source = Some(property.into());
        self
    }
}

/// Tag and attribute names used in the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementNames {
    pub root: String,
    pub object: String,
    pub property: String,
    pub name_attribute: String,
    pub type_attribute: String,
    pub key: String,
    pub value: String,
}

impl Default for ElementNames {
    fn default() -> Self {
        Self {
            root: "Objects".to_owned(),
            object: "Object".to_owned(),
            property: "Property".to_owned(),
            name_attribute: "Name".to_owned(),
            type_attribute: "Type".to_owned(),
            key: "Key".to_owned(),
            value: "Value".to_owned(),
        }
    }
}

impl ElementNames {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("root", &self.root),
            ("object", &self.object),
            ("property", &self.property),
            ("name_attribute", &self.name_attribute),
            ("type_attribute", &self.type_attribute),
            ("key", &self.key),
            ("value", &self.value),
        ];
        for (field, name) in fields.iter() {
            if name.is_empty() {
                return Err(Error::Configuration(format!(
                    "element name `{}` must not be empty",
                    field
                )));
            }
        }
        if self.key == self.value {
            return Err(Error::Configuration(format!(
                "dictionary key and value names must differ, both are `{}`",
                self.key
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SerializationPolicy {
    depth: usize,
    include_type_names: bool,
    names: ElementNames,
    known_types: KnownTypes,
    type_hints: HashMap<String, TypeHints>,
}

impl SerializationPolicy {
    pub const DEFAULT_DEPTH: usize = 1;

    /// Fails with [`Error::Configuration`] when `depth` is zero.
    pub fn new(depth: usize) -> Result<Self> {
        if depth < 1 {
            return Err(Error::Configuration(format!(
                "serialization depth must be at least 1, got {}",
                depth
            )));
        }
        Ok(Self {
            depth,
            include_type_names: true,
            names: ElementNames::default(),
            known_types: KnownTypes::default(),
            type_hints: HashMap::new(),
        })
    }

    pub fn include_type_names(mut self, include: bool) -> Self {
        self.include_type_names = include;
        self
    }

    pub fn with_names(mut self, names: ElementNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_known_types(mut self, known_types: KnownTypes) -> Self {
        self.known_types = known_types;
        self
    }

    pub fn with_type_hints(mut self, type_name: impl Into<String>, hints: TypeHints) -> Self {
        self.type_hints.insert(type_name.into(), hints);
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn includes_type_names(&self) -> bool {
        self.include_type_names
    }

    pub fn names(&self) -> &ElementNames {
        &self.names
    }

    pub fn known_types(&self) -> &KnownTypes {
        &self.known_types
    }

    pub fn type_hints(&self, type_name: &str) -> Option<&TypeHints> {
        self.type_hints.get(type_name)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.depth < 1 {
            return Err(Error::Configuration(format!(
                "serialization depth must be at least 1, got {}",
                self.depth
            )));
        }
        self.names.validate()
    }
}

impl Default for SerializationPolicy {
    fn default() -> Self {
        Self {
            depth: Self::DEFAULT_DEPTH,
            include_type_names: true,
            names: ElementNames::default(),
            known_types: KnownTypes::default(),
            type_hints: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementNames, SerializationMethod, SerializationPolicy, TypeHints};
    use crate::error::{Error, Result};
    use test_log::test;

    #[test]
    fn zero_depth_is_rejected() {
        match SerializationPolicy::new(0) {
            Err(Error::Configuration(msg)) => assert!(msg.contains("at least 1")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn defaults() -> Result<()> {
        let policy = SerializationPolicy::default();
        assert_eq!(policy.depth(), SerializationPolicy::DEFAULT_DEPTH);
        assert!(policy.includes_type_names());
        assert_eq!(policy.names().key, "Key");
        assert_eq!(policy.names().value, "Value");
        policy.validate()?;

        let policy = SerializationPolicy::new(3)?.include_type_names(false);
        assert_eq!(policy.depth(), 3);
        assert!(!policy.includes_type_names());
        Ok(())
    }

    #[test]
    fn type_hints_are_keyed_by_type_name() -> Result<()> {
        let policy = SerializationPolicy::new(2)?
            .with_type_hints("Secret", TypeHints::as_string().with_string_source("Id"))
            .with_type_hints(
                "Process",
                TypeHints::specific_properties(vec!["Name", "Id"]).with_depth(4),
            );

        let secret = policy.type_hints("Secret").unwrap();
        assert_eq!(secret.method, SerializationMethod::String);
        assert_eq!(secret.string_source.as_deref(), Some("Id"));

        let process = policy.type_hints("Process").unwrap();
        assert_eq!(
            process.method,
            SerializationMethod::SpecificProperties(vec!["Name".to_owned(), "Id".to_owned()])
        );
        assert_eq!(process.depth, Some(4));
        assert!(policy.type_hints("Other").is_none());
        Ok(())
    }

    #[test]
    fn bad_vocabularies_are_rejected() {
        let names = ElementNames {
            property: String::new(),
            ..ElementNames::default()
        };
        let policy = SerializationPolicy::default().with_names(names);
        assert!(matches!(policy.validate(), Err(Error::Configuration(_))));

        let names = ElementNames {
            value: "Key".to_owned(),
            ..ElementNames::default()
        };
        let policy = SerializationPolicy::default().with_names(names);
        assert!(matches!(policy.validate(), Err(Error::Configuration(_))));
    }
}
