use crate::cancel::StopHandle;
use crate::error::{Error, Result};
use crate::value::Value;
use crate::writer::{ElementWriter, EventRecorder, XmlWriter};

use log::{debug, trace};
use serde::Serialize;

mod internal;
pub mod serializer_policy;
mod value_serializer;

use internal::InternalSerializer;
use serializer_policy::SerializationPolicy;
pub use value_serializer::to_value;

/// How top-level items are laid out in the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// All items inside one root element, closed by [`Session::done`].
    Document,
    /// Each item is its own top-level element; there is no root.
    Stream,
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Document
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    AtRoot,
    InDocument,
    Poisoned,
}

/// One serialization run over a writer.
///
/// Each call to [`serialize`](Session::serialize) writes one top-level item.
/// Items are walked into a buffer first and only replayed into the writer
/// when the walk succeeds, so a cancelled item leaves nothing behind. A
/// fatal error poisons the session: later calls fail with
/// [`Error::SessionPoisoned`].
pub struct Session<W: ElementWriter> {
    writer: W,
    policy: SerializationPolicy,
    layout: Layout,
    state: State,
    stop: StopHandle,
    recorder: EventRecorder,
    items: usize,
}

impl<W: ElementWriter> Session<W> {
    /// A session in [`Layout::Document`].
    pub fn new(writer: W, policy: SerializationPolicy) -> Result<Self> {
        Self::with_layout(writer, policy, Layout::Document)
    }

    /// A session in [`Layout::Stream`].
    pub fn stream(writer: W, policy: SerializationPolicy) -> Result<Self> {
        Self::with_layout(writer, policy, Layout::Stream)
    }

    pub fn with_layout(writer: W, policy: SerializationPolicy, layout: Layout) -> Result<Self> {
        policy.validate()?;
        debug!(
            "starting {:?} session, depth {}, type names {}",
            layout,
            policy.depth(),
            policy.includes_type_names()
        );
        Ok(Self {
            writer,
            policy,
            layout,
            state: State::AtRoot,
            stop: StopHandle::new(),
            recorder: EventRecorder::new(),
            items: 0,
        })
    }

    /// Share an existing stop signal instead of the session's own.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// A handle that stops this session from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn policy(&self) -> &SerializationPolicy {
        &self.policy
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Top-level items written so far.
    pub fn items(&self) -> usize {
        self.items
    }

    pub fn serialize(&mut self, value: &Value) -> Result<()> {
        if self.state == State::Poisoned {
            return Err(Error::SessionPoisoned);
        }
        let result = self.write_item(value);
        if let Err(err) = &result {
            if err.is_fatal() {
                debug!("item {} failed, poisoning session: {}", self.items + 1, err);
                self.state = State::Poisoned;
            }
        }
        result
    }

    fn write_item(&mut self, value: &Value) -> Result<()> {
        self.recorder.clear();
        let mut walker = InternalSerializer::new(&mut self.recorder, &self.policy, &self.stop, true);
        walker.write_one_value(value, None, self.policy.depth())?;
        let visited = walker.visited();

        if self.state == State::AtRoot {
            self.start()?;
        }
        self.recorder.replay(&mut self.writer)?;
        self.items += 1;
        trace!(
            "item {} written, {} nodes, {} events",
            self.items,
            visited,
            self.recorder.events().len()
        );
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.layout == Layout::Document {
            self.writer.open_element(&self.policy.names().root)?;
        }
        self.state = State::InDocument;
        Ok(())
    }

    /// Closes the root element (writing an empty one if nothing was
    /// serialized), flushes, and hands the writer back.
    pub fn done(mut self) -> Result<W> {
        match self.state {
            State::Poisoned => return Err(Error::SessionPoisoned),
            State::AtRoot => self.start()?,
            State::InDocument => {}
        }
        if self.layout == Layout::Document {
            self.writer.close_element()?;
        }
        self.writer.flush()?;
        debug!("session done after {} items", self.items);
        Ok(self.writer)
    }
}

/// Writes `values` as one document and returns the markup.
pub fn to_xml(values: &[Value], policy: SerializationPolicy) -> Result<String> {
    let mut session = Session::new(XmlWriter::new(Vec::new()), policy)?;
    for value in values {
        session.serialize(value)?;
    }
    let out = session.done()?.into_inner();
    String::from_utf8(out).map_err(|err| Error::Writer(err.to_string()))
}

/// Converts `value` with [`to_value`] and writes it as a single-item document.
pub fn serialize_with_policy(value: impl Serialize, policy: SerializationPolicy) -> Result<String> {
    let value = to_value(&value)?;
    to_xml(&[value], policy)
}

/// [`serialize_with_policy`] with [`SerializationPolicy::default`].
pub fn serialize(value: impl Serialize) -> Result<String> {
    serialize_with_policy(value, SerializationPolicy::default())
}

#[cfg(test)]
mod tests {
    use super::{serialize, serialize_with_policy, to_xml, Session};
    use crate::error::{Error, Result};
    use crate::primitives::KnownTypes;
    use crate::ser::serializer_policy::SerializationPolicy;
    use crate::value::{Object, Property, Value};
    use crate::writer::{ElementWriter, Event, EventRecorder, XmlWriter};
    use serde::Serialize;
    use test_log::test;

    #[test]
    fn serialize_int() -> Result<()> {
        assert_eq!(
            serialize(37i32)?,
            "<Objects><Object Type=\"i32\">37</Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn serialize_struct() -> Result<()> {
        #[derive(Serialize)]
        struct Person {
            name: String,
            age: u32,
        }

        let data = Person {
            name: "Bob".to_owned(),
            age: 40,
        };
        assert_eq!(
            serialize(&data)?,
            "<Objects><Object Type=\"Person\">\
             <Property Name=\"name\" Type=\"String\">Bob</Property>\
             <Property Name=\"age\" Type=\"u32\">40</Property>\
             </Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn serialize_without_type_names() -> Result<()> {
        let policy = SerializationPolicy::default()
            .include_type_names(false)
            .with_known_types(KnownTypes::dotnet());
        assert_eq!(
            serialize_with_policy(vec![true, false], policy)?,
            "<Objects><Object><Property>True</Property><Property>False</Property></Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn dotnet_type_names() -> Result<()> {
        let policy = SerializationPolicy::default().with_known_types(KnownTypes::dotnet());
        assert_eq!(
            serialize_with_policy("hi", policy)?,
            "<Objects><Object Type=\"System.String\">hi</Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn empty_document_still_has_a_root() -> Result<()> {
        assert_eq!(to_xml(&[], SerializationPolicy::default())?, "<Objects />");
        Ok(())
    }

    #[test]
    fn several_items_share_the_root() -> Result<()> {
        let values = vec![Value::from(1i32), Value::Null, Value::from("x")];
        assert_eq!(
            to_xml(&values, SerializationPolicy::default())?,
            "<Objects><Object Type=\"i32\">1</Object><Object />\
             <Object Type=\"String\">x</Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn stream_layout_has_no_root() -> Result<()> {
        let mut session = Session::stream(XmlWriter::new(Vec::new()), SerializationPolicy::default())?;
        session.serialize(&Value::from(1i32))?;
        session.serialize(&Value::from(2i32))?;
        assert_eq!(session.items(), 2);
        let out = session.done()?.into_inner();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<Object Type=\"i32\">1</Object><Object Type=\"i32\">2</Object>"
        );
        Ok(())
    }

    #[test]
    fn cancelled_item_leaves_no_fragment() -> Result<()> {
        let mut session = Session::new(EventRecorder::new(), SerializationPolicy::default())?;
        session.serialize(&Value::from(1i32))?;
        let written = session.writer().events().len();

        let stop = session.stop_handle();
        let slow: Value = Object::new("Slow")
            .with("A", 1i32)
            .with_property(Property::deferred("B", "i32", move || {
                stop.request_cancel();
                Ok(Value::from(2i32))
            }))
            .into();
        assert_eq!(session.serialize(&slow), Err(Error::Cancelled));
        assert_eq!(session.writer().events().len(), written);
        assert_eq!(session.writer().events()[0], Event::Open("Objects".to_owned()));
        assert!(!session.writer().is_balanced());

        assert_eq!(
            session.serialize(&Value::from(3i32)),
            Err(Error::SessionPoisoned)
        );
        assert!(matches!(session.done(), Err(Error::SessionPoisoned)));
        Ok(())
    }

    struct FailingWriter {
        opens_left: usize,
    }

    impl ElementWriter for FailingWriter {
        fn open_element(&mut self, _: &str) -> Result<()> {
            if self.opens_left == 0 {
                return Err(Error::Writer("disk full".to_owned()));
            }
            self.opens_left -= 1;
            Ok(())
        }

        fn set_attribute(&mut self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn write_text(&mut self, _: &str) -> Result<()> {
            Ok(())
        }

        fn close_element(&mut self) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failures_propagate() -> Result<()> {
        let writer = FailingWriter { opens_left: 2 };
        let mut session = Session::new(writer, SerializationPolicy::default())?;
        let point: Value = Object::new("Point").with("X", 1i32).with("Y", 2i32).into();
        assert_eq!(
            session.serialize(&point),
            Err(Error::Writer("disk full".to_owned()))
        );
        assert_eq!(session.serialize(&point), Err(Error::SessionPoisoned));
        Ok(())
    }

    #[test]
    fn bad_policy_is_rejected_up_front() {
        let names = crate::ser::serializer_policy::ElementNames {
            root: String::new(),
            ..Default::default()
        };
        let policy = SerializationPolicy::default().with_names(names);
        assert!(matches!(
            Session::new(EventRecorder::new(), policy),
            Err(Error::Configuration(_))
        ));
    }
}
