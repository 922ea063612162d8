use super::ATOM_MIME;
use super::xml::XmlOut;
use crate::error::Result;
use quick_xml::events::BytesStart;
use std::io::{BufWriter, Write};

const OPENSEARCH_NS: &str = "http://a9.com/-/spec/opensearch/1.1/";

/// URL template clients fill in to search the catalog.
pub const SEARCH_TEMPLATE: &str = "/opds/books?search={searchTerms}";

/// Write an OpenSearch description advertising the book search endpoint.
pub fn write_opensearch<W: Write>(title: &str, out: W) -> Result<()> {
    let name = format!("Search {}", title);
    let mut xml = XmlOut::new(BufWriter::new(out));
    xml.decl()?;

    let mut root = BytesStart::new("OpenSearchDescription");
    root.push_attribute(("xmlns", OPENSEARCH_NS));
    xml.start(root)?;

    xml.simple("LongName", &name)?;
    xml.simple("ShortName", &name)?;

    let mut url = BytesStart::new("Url");
    url.push_attribute(("type", ATOM_MIME));
    url.push_attribute(("template", SEARCH_TEMPLATE));
    xml.empty(url)?;

    xml.simple("SyndicationRight", "open")?;
    xml.simple("OutputEncoding", "UTF-8")?;
    xml.simple("InputEncoding", "UTF-8")?;

    xml.end("OpenSearchDescription")?;
    xml.into_inner().flush()?;
    Ok(())
}
