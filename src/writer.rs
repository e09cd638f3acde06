//! The sink the serializer writes through.
//!
//! The walker only ever calls [`ElementWriter`]; any structure that can
//! express nested elements with attributes and text can sit behind it.
//! Three implementations ship here: [`XmlWriter`] for markup,
//! [`EventRecorder`] for buffering and replay, and [`TreeWriter`] for an
//! in-memory [`Element`] tree.

use crate::error::{Error, Result};

use std::borrow::Cow;
use std::io;

/// Ordering contract: opens and closes balance, and attributes only follow
/// an open, before any text or child element.
pub trait ElementWriter {
    fn open_element(&mut self, tag: &str) -> Result<()>;
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()>;
    fn write_text(&mut self, text: &str) -> Result<()>;
    fn close_element(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

impl<W: ElementWriter + ?Sized> ElementWriter for &mut W {
    fn open_element(&mut self, tag: &str) -> Result<()> {
        (**self).open_element(tag)
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        (**self).set_attribute(name, value)
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        (**self).write_text(text)
    }

    fn close_element(&mut self) -> Result<()> {
        (**self).close_element()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Characters XML 1.0 can carry at all, escaped or not.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn escape(text: &str, quote: bool) -> Result<Cow<'_, str>> {
    if let Some(c) = text.chars().find(|c| !is_xml_char(*c)) {
        return Err(Error::Writer(format!(
            "character U+{:04X} is not allowed in XML",
            c as u32
        )));
    }

    // A literal '\r' would be normalized away by any parser.
    let needs_escape = |c: char| match c {
        '&' | '<' | '>' | '\r' => true,
        '"' | '\n' | '\t' => quote,
        _ => false,
    };
    if !text.contains(needs_escape) {
        return Ok(Cow::Borrowed(text));
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#xD;"),
            '"' if quote => escaped.push_str("&quot;"),
            '\n' if quote => escaped.push_str("&#xA;"),
            '\t' if quote => escaped.push_str("&#x9;"),
            c => escaped.push(c),
        }
    }
    Ok(Cow::Owned(escaped))
}

struct Frame {
    tag: String,
    has_children: bool,
    has_text: bool,
}

/// Writes elements as XML text into any [`io::Write`].
pub struct XmlWriter<W: io::Write> {
    out: W,
    stack: Vec<Frame>,
    // "<tag" (and maybe attributes) written, ">" not yet
    start_tag_open: bool,
    indent: Option<usize>,
    written: bool,
}

impl<W: io::Write> XmlWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stack: Vec::new(),
            start_tag_open: false,
            indent: None,
            written: false,
        }
    }

    /// Put every element on its own line, nested `width` spaces per level.
    /// Elements holding text stay on one line.
    pub fn indented(out: W, width: usize) -> Self {
        Self {
            indent: Some(width),
            ..Self::new(out)
        }
    }

    /// Write an `<?xml ...?>` declaration. Only valid before the first element.
    pub fn write_declaration(&mut self) -> Result<()> {
        if self.written {
            return Err(Error::Writer(
                "declaration must precede all elements".to_owned(),
            ));
        }
        self.out
            .write_all(b"<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        self.written = true;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn finish_start_tag(&mut self) -> Result<()> {
        if self.start_tag_open {
            self.out.write_all(b">")?;
            self.start_tag_open = false;
        }
        Ok(())
    }

    fn newline(&mut self, level: usize) -> Result<()> {
        if let Some(width) = self.indent {
            if self.written {
                self.out.write_all(b"\n")?;
            }
            for _ in 0..level * width {
                self.out.write_all(b" ")?;
            }
        }
        Ok(())
    }
}

impl<W: io::Write> ElementWriter for XmlWriter<W> {
    fn open_element(&mut self, tag: &str) -> Result<()> {
        if tag.is_empty() {
            return Err(Error::Writer("element tag must not be empty".to_owned()));
        }
        self.finish_start_tag()?;
        if let Some(parent) = self.stack.last_mut() {
            parent.has_children = true;
        }
        self.newline(self.stack.len())?;
        write!(self.out, "<{}", tag)?;
        self.stack.push(Frame {
            tag: tag.to_owned(),
            has_children: false,
            has_text: false,
        });
        self.start_tag_open = true;
        self.written = true;
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        if !self.start_tag_open {
            return Err(Error::Writer(format!(
                "attribute `{}` written outside of a start tag",
                name
            )));
        }
        let value = escape(value, true)?;
        write!(self.out, " {}=\"{}\"", name, value)?;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Err(Error::Writer("text outside of any element".to_owned())),
        };
        let text = escape(text, false)?;
        frame.has_text = true;
        self.finish_start_tag()?;
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn close_element(&mut self) -> Result<()> {
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return Err(Error::Writer("no open element to close".to_owned())),
        };
        if self.start_tag_open {
            self.out.write_all(b" />")?;
            self.start_tag_open = false;
            return Ok(());
        }
        if frame.has_children && !frame.has_text {
            self.newline(self.stack.len())?;
        }
        write!(self.out, "</{}>", frame.tag)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Open(String),
    Attribute(String, String),
    Text(String),
    Close,
}

/// Buffers writer calls so they can be checked or replayed later.
///
/// Nesting is tracked as events arrive; a close without a matching open, or
/// an attribute after content, is rejected immediately.
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    events: Vec<Event>,
    depth: usize,
    max_depth: usize,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Currently open elements.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Deepest nesting seen so far.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_balanced(&self) -> bool {
        self.depth == 0
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.depth = 0;
        self.max_depth = 0;
    }

    pub fn replay<W: ElementWriter + ?Sized>(&self, writer: &mut W) -> Result<()> {
        for event in &self.events {
            match event {
                Event::Open(tag) => writer.open_element(tag)?,
                Event::Attribute(name, value) => writer.set_attribute(name, value)?,
                Event::Text(text) => writer.write_text(text)?,
                Event::Close => writer.close_element()?,
            }
        }
        Ok(())
    }
}

impl ElementWriter for EventRecorder {
    fn open_element(&mut self, tag: &str) -> Result<()> {
        self.events.push(Event::Open(tag.to_owned()));
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        match self.events.last() {
            Some(Event::Open(_)) | Some(Event::Attribute(..)) => {
                self.events
                    .push(Event::Attribute(name.to_owned(), value.to_owned()));
                Ok(())
            }
            _ => Err(Error::Writer(format!(
                "attribute `{}` written outside of a start tag",
                name
            ))),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::Writer("text outside of any element".to_owned()));
        }
        self.events.push(Event::Text(text.to_owned()));
        Ok(())
    }

    fn close_element(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::Writer("no open element to close".to_owned()));
        }
        self.depth -= 1;
        self.events.push(Event::Close);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One node of the tree built by [`TreeWriter`].
///
/// `text` is `None` when no text was ever written, and `Some("")` when an
/// empty string was, so null and empty values stay distinguishable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// No text and no children.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.children.is_empty()
    }

    /// Children whose attribute `name` equals `value`.
    pub fn children_where<'a>(
        &'a self,
        name: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |child| child.attribute(name) == Some(value))
    }

    /// Nesting depth of this subtree, counting this element as 1.
    pub fn height(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Element::height)
            .max()
            .unwrap_or(0)
    }
}

/// Builds [`Element`] trees in memory.
#[derive(Debug, Default)]
pub struct TreeWriter {
    stack: Vec<Element>,
    roots: Vec<Element>,
}

impl TreeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed top-level elements. Fails if an element is still open.
    pub fn into_roots(self) -> Result<Vec<Element>> {
        if let Some(open) = self.stack.last() {
            return Err(Error::Writer(format!(
                "element `{}` was never closed",
                open.tag
            )));
        }
        Ok(self.roots)
    }

    pub fn roots(&self) -> &[Element] {
        &self.roots
    }
}

impl ElementWriter for TreeWriter {
    fn open_element(&mut self, tag: &str) -> Result<()> {
        self.stack.push(Element {
            tag: tag.to_owned(),
            ..Element::default()
        });
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(element) if element.text.is_none() && element.children.is_empty() => {
                element
                    .attributes
                    .push((name.to_owned(), value.to_owned()));
                Ok(())
            }
            _ => Err(Error::Writer(format!(
                "attribute `{}` written outside of a start tag",
                name
            ))),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(element) => {
                element.text.get_or_insert_with(String::new).push_str(text);
                Ok(())
            }
            None => Err(Error::Writer("text outside of any element".to_owned())),
        }
    }

    fn close_element(&mut self) -> Result<()> {
        let element = match self.stack.pop() {
            Some(element) => element,
            None => return Err(Error::Writer("no open element to close".to_owned())),
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.roots.push(element),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementWriter, Event, EventRecorder, TreeWriter, XmlWriter};
    use crate::error::{Error, Result};
    use test_log::test;

    fn sample<W: ElementWriter>(writer: &mut W) -> Result<()> {
        writer.open_element("Objects")?;
        writer.open_element("Object")?;
        writer.set_attribute("Type", "Vec<\"a\">")?;
        writer.open_element("Property")?;
        writer.set_attribute("Name", "x")?;
        writer.write_text("1 < 2 & 3")?;
        writer.close_element()?;
        writer.open_element("Property")?;
        writer.set_attribute("Name", "empty")?;
        writer.write_text("")?;
        writer.close_element()?;
        writer.open_element("Property")?;
        writer.close_element()?;
        writer.close_element()?;
        writer.close_element()?;
        writer.flush()
    }

    #[test]
    fn xml_compact() -> Result<()> {
        let mut writer = XmlWriter::new(Vec::new());
        sample(&mut writer)?;
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            xml,
            "<Objects><Object Type=\"Vec&lt;&quot;a&quot;&gt;\">\
             <Property Name=\"x\">1 &lt; 2 &amp; 3</Property>\
             <Property Name=\"empty\"></Property>\
             <Property /></Object></Objects>"
        );
        Ok(())
    }

    #[test]
    fn xml_indented() -> Result<()> {
        let mut writer = XmlWriter::indented(Vec::new(), 2);
        writer.write_declaration()?;
        sample(&mut writer)?;
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        let expected = [
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
            "<Objects>",
            "  <Object Type=\"Vec&lt;&quot;a&quot;&gt;\">",
            "    <Property Name=\"x\">1 &lt; 2 &amp; 3</Property>",
            "    <Property Name=\"empty\"></Property>",
            "    <Property />",
            "  </Object>",
            "</Objects>",
        ]
        .join("\n");
        assert_eq!(xml, expected);
        Ok(())
    }

    #[test]
    fn xml_rejects_misordered_calls() -> Result<()> {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(matches!(writer.close_element(), Err(Error::Writer(_))));
        assert!(matches!(writer.write_text("x"), Err(Error::Writer(_))));
        writer.open_element("a")?;
        writer.write_text("x")?;
        assert!(matches!(
            writer.set_attribute("late", "1"),
            Err(Error::Writer(_))
        ));
        assert!(matches!(writer.write_declaration(), Err(Error::Writer(_))));
        Ok(())
    }

    #[test]
    fn xml_keeps_carriage_returns() -> Result<()> {
        let mut writer = XmlWriter::new(Vec::new());
        writer.open_element("a")?;
        writer.set_attribute("v", "1\r\n2")?;
        writer.write_text("x\r\ny")?;
        writer.close_element()?;
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(xml, "<a v=\"1&#xD;&#xA;2\">x&#xD;\ny</a>");
        Ok(())
    }

    #[test]
    fn xml_rejects_characters_it_cannot_carry() -> Result<()> {
        let mut writer = XmlWriter::new(Vec::new());
        writer.open_element("a")?;
        assert_eq!(
            writer.set_attribute("v", "bell\u{7}"),
            Err(Error::Writer(
                "character U+0007 is not allowed in XML".to_owned()
            ))
        );
        assert!(matches!(
            writer.write_text("nul\u{0}"),
            Err(Error::Writer(_))
        ));
        assert!(matches!(
            writer.write_text("\u{FFFE}"),
            Err(Error::Writer(_))
        ));
        writer.write_text("tab\tok")?;
        writer.close_element()?;
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(xml, "<a>tab\tok</a>");
        Ok(())
    }

    #[test]
    fn recorder_tracks_nesting_and_replays() -> Result<()> {
        let mut recorder = EventRecorder::new();
        sample(&mut recorder)?;
        assert!(recorder.is_balanced());
        assert_eq!(recorder.max_depth(), 3);
        assert_eq!(recorder.events()[0], Event::Open("Objects".to_owned()));
        assert_eq!(
            recorder.events().iter().filter(|e| **e == Event::Close).count(),
            5
        );

        let mut tree = TreeWriter::new();
        recorder.replay(&mut tree)?;
        let roots = tree.into_roots()?;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].height(), 3);

        assert!(matches!(
            EventRecorder::new().close_element(),
            Err(Error::Writer(_))
        ));
        Ok(())
    }

    #[test]
    fn tree_keeps_null_and_empty_apart() -> Result<()> {
        let mut tree = TreeWriter::new();
        sample(&mut tree)?;
        let roots = tree.into_roots()?;
        let object = &roots[0].children[0];
        assert_eq!(object.attribute("Type"), Some("Vec<\"a\">"));

        let empty = object.children_where("Name", "empty").next().unwrap();
        assert_eq!(empty.text(), Some(""));
        assert!(!empty.is_empty());

        let null = &object.children[2];
        assert!(null.is_empty());
        assert_eq!(null.attribute("Name"), None);
        Ok(())
    }

    #[test]
    fn tree_reports_unclosed_elements() {
        let mut tree = TreeWriter::new();
        tree.open_element("dangling").unwrap();
        assert!(matches!(tree.into_roots(), Err(Error::Writer(_))));
    }
}
