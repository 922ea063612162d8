use super::{Entry, Feed, Link, Person, Text};
use crate::error::{AppError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{BufWriter, Write};

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const OPDS_NS: &str = "http://opds-spec.org/2010/catalog";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Event writer that turns serializer failures into [`AppError::Xml`].
pub(super) struct XmlOut<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlOut<W> {
    pub(super) fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
        }
    }

    pub(super) fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| AppError::Xml(e.to_string()))
    }

    pub(super) fn decl(&mut self) -> Result<()> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub(super) fn start(&mut self, elem: BytesStart<'_>) -> Result<()> {
        self.event(Event::Start(elem))
    }

    pub(super) fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    pub(super) fn empty(&mut self, elem: BytesStart<'_>) -> Result<()> {
        self.event(Event::Empty(elem))
    }

    /// `<name attrs..>text</name>` with the text escaped.
    pub(super) fn text_element(&mut self, elem: BytesStart<'_>, text: &str) -> Result<()> {
        let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
        self.start(elem)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(&name)
    }

    pub(super) fn simple(&mut self, name: &str, text: &str) -> Result<()> {
        self.text_element(BytesStart::new(name), text)
    }

    pub(super) fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serialize a feed as an Atom document.
///
/// Output is buffered and flushed before returning; a failing sink (such as
/// a disconnected client) surfaces as an error.
pub fn write_feed<W: Write>(feed: &Feed, out: W) -> Result<()> {
    let mut xml = XmlOut::new(BufWriter::new(out));
    xml.decl()?;

    let mut root = BytesStart::new("feed");
    root.push_attribute(("xmlns", ATOM_NS));
    root.push_attribute(("xmlns:opds", OPDS_NS));
    root.push_attribute(("xmlns:dc", DC_NS));
    xml.start(root)?;

    xml.simple("id", &feed.id)?;
    xml.simple("title", &feed.title)?;
    xml.simple("updated", &timestamp(&feed.updated))?;
    if let Some(author) = &feed.author {
        write_person(&mut xml, author)?;
    }
    if let Some(limit) = feed.page_limit {
        xml.simple("opds:pageLimit", &limit.to_string())?;
    }
    for link in &feed.links {
        write_link(&mut xml, link)?;
    }
    for entry in &feed.entries {
        write_entry(&mut xml, entry)?;
    }

    xml.end("feed")?;
    xml.into_inner().flush()?;
    Ok(())
}

fn write_person<W: Write>(xml: &mut XmlOut<W>, person: &Person) -> Result<()> {
    xml.start(BytesStart::new("author"))?;
    xml.simple("name", &person.name)?;
    if let Some(uri) = &person.uri {
        xml.simple("uri", uri)?;
    }
    xml.end("author")
}

fn write_link<W: Write>(xml: &mut XmlOut<W>, link: &Link) -> Result<()> {
    let mut elem = BytesStart::new("link");
    elem.push_attribute(("rel", link.rel.as_str()));
    elem.push_attribute(("href", link.href.as_str()));
    elem.push_attribute(("type", link.link_type.as_str()));
    if let Some(title) = &link.title {
        elem.push_attribute(("title", title.as_str()));
    }
    xml.empty(elem)
}

fn write_text<W: Write>(xml: &mut XmlOut<W>, name: &str, text: &Text) -> Result<()> {
    let mut elem = BytesStart::new(name);
    elem.push_attribute(("type", text.kind.as_str()));
    xml.text_element(elem, &text.value)
}

fn write_entry<W: Write>(xml: &mut XmlOut<W>, entry: &Entry) -> Result<()> {
    xml.start(BytesStart::new("entry"))?;
    xml.simple("id", &entry.id)?;
    xml.simple("title", &entry.title)?;
    xml.simple("updated", &timestamp(&entry.updated))?;
    for author in &entry.authors {
        write_person(xml, author)?;
    }
    if let Some(summary) = &entry.summary {
        write_text(xml, "summary", summary)?;
    }
    if let Some(content) = &entry.content {
        write_text(xml, "content", content)?;
    }
    for link in &entry.links {
        write_link(xml, link)?;
    }
    xml.end("entry")
}
