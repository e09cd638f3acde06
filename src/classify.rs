//! Picks the strategy used to write one value.
//!
//! Rules are tried in a fixed order and the first match wins:
//!
//! 1. null
//! 2. a primitive listed in the policy's [`KnownTypes`](crate::primitives::KnownTypes)
//! 3. a decorated value whose immediate inner value is such a primitive
//! 4. anything else reached with no depth left collapses to a string
//! 5. a dictionary or list, bare or directly decorated
//! 6. an enum-like scalar, bare or decorated
//! 7. a type the policy marks for string serialization, or a base value
//!    with no richer form
//! 8. a complex object, expanded property by property

use crate::primitives::Primitive;
use crate::ser::serializer_policy::{SerializationMethod, SerializationPolicy};
use crate::value::{Container, Decorated, Dictionary, EnumValue, Value};

#[derive(Clone, Copy, Debug)]
pub enum Shape<'v> {
    Dictionary(&'v Dictionary),
    List(&'v Container),
}

#[derive(Clone, Copy, Debug)]
pub enum Strategy<'v> {
    Null,
    Primitive(&'v Primitive),
    DecoratedPrimitive {
        decorated: &'v Decorated,
        primitive: &'v Primitive,
    },
    Container {
        shape: Shape<'v>,
        decorated: Option<&'v Decorated>,
    },
    EnumLike(&'v EnumValue),
    AsString,
    Complex,
}

fn shape_of(value: &Value) -> Option<Shape<'_>> {
    match value {
        Value::Dict(dictionary) => Some(Shape::Dictionary(dictionary)),
        Value::List(container) => Some(Shape::List(container)),
        _ => None,
    }
}

pub fn classify<'v>(value: &'v Value, depth: usize, policy: &SerializationPolicy) -> Strategy<'v> {
    let known_types = policy.known_types();
    let is_known = |primitive: &Primitive| known_types.get(primitive.kind()).is_some();

    match value {
        Value::Null => return Strategy::Null,
        Value::Primitive(primitive) if is_known(primitive) => {
            return Strategy::Primitive(primitive)
        }
        Value::Decorated(decorated) => {
            if let Value::Primitive(primitive) = decorated.inner() {
                if is_known(primitive) {
                    return Strategy::DecoratedPrimitive {
                        decorated: &**decorated,
                        primitive,
                    };
                }
            }
        }
        _ => {}
    }

    if depth == 0 {
        return Strategy::AsString;
    }

    let container = match value {
        Value::Decorated(decorated) => {
            shape_of(decorated.inner()).map(|shape| (shape, Some(&**decorated)))
        }
        other => shape_of(other).map(|shape| (shape, None)),
    };
    if let Some((shape, decorated)) = container {
        return Strategy::Container { shape, decorated };
    }

    if let Value::Enum(enum_value) = value.base() {
        return Strategy::EnumLike(enum_value);
    }

    // A decorator chain keeps every note, whatever it wraps.
    if let Value::Decorated(outer) = value {
        if let Value::Decorated(_) = outer.inner() {
            return Strategy::Complex;
        }
    }

    if let Value::Null | Value::Primitive(_) = value.base() {
        return Strategy::AsString;
    }

    let as_string = value
        .type_name(known_types)
        .and_then(|type_name| policy.type_hints(&type_name))
        .map_or(false, |hints| hints.method == SerializationMethod::String);
    if as_string {
        Strategy::AsString
    } else {
        Strategy::Complex
    }
}
