//! A depth-bounded serializer from object graphs to nested elements.
//!
//! Values are described with the [`value`] model: primitives, lists,
//! dictionaries, objects with named properties, enum-like scalars, and
//! values decorated with extra instance-level properties. Anything that
//! implements [`serde::Serialize`] can be brought into that model with
//! [`to_value`].
//!
//! Serialization walks the graph up to a configured depth. Primitives become
//! typed text leaves, containers are written element by element, complex
//! objects are expanded property by property until the depth runs out, after
//! which they collapse to their string form. Faults local to one property or
//! one enumeration are logged and degraded in place; cancellation and writer
//! failures abort the current top-level item.
//!
//! The walker never writes markup itself: it drives an
//! [`ElementWriter`](writer::ElementWriter). [`XmlWriter`](writer::XmlWriter)
//! produces text, and [`TreeWriter`](writer::TreeWriter) builds an in-memory
//! tree.
//!
//! ```
//! use objxml::ser::serializer_policy::SerializationPolicy;
//! use objxml::ser::Session;
//! use objxml::value::Object;
//! use objxml::writer::XmlWriter;
//!
//! # fn main() -> objxml::error::Result<()> {
//! let point = Object::new("Point").with("X", 1i32).with("Y", 2i32);
//!
//! let mut session = Session::new(XmlWriter::new(Vec::new()), SerializationPolicy::default())?;
//! session.serialize(&point.into())?;
//! let xml = String::from_utf8(session.done()?.into_inner()).unwrap();
//! assert_eq!(
//!     xml,
//!     "<Objects><Object Type=\"Point\">\
//!      <Property Name=\"X\" Type=\"i32\">1</Property>\
//!      <Property Name=\"Y\" Type=\"i32\">2</Property>\
//!      </Object></Objects>"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! [`to_value`]: crate::ser::to_value()

pub mod cancel;
pub mod classify;
pub mod error;
pub mod primitives;
pub mod ser;
pub mod value;
pub mod writer;

pub use cancel::StopHandle;
pub use error::{Error, Result};
pub use ser::serializer_policy::SerializationPolicy;
pub use ser::{serialize, serialize_with_policy, to_value, to_xml, Layout, Session};
pub use value::Value;
