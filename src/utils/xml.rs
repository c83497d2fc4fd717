/*!
Thin helpers over the `quick_xml` event writer, enough to emit the root-description document.
*/

use quick_xml::events::{attributes::Attribute, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

/// An open element; call [`end`](struct.Element.html#method.end) to close it.
#[derive(Debug)]
pub struct Element {
    name: &'static [u8],
}

pub const X_DECL_VERSION: &[u8] = b"1.0";

pub const X_ATTR_NAMESPACE: &str = "xmlns";

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn decl<T: Write>(writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
    writer
        .write_event(Event::Decl(BytesDecl::new(X_DECL_VERSION, None, None)))
        .map(|_| ())
}

pub fn start_element<T: Write>(
    writer: &mut Writer<T>,
    name: &'static [u8],
) -> Result<Element, quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::borrowed_name(name)))?;
    Ok(Element { name })
}

pub fn start_ns_element<T: Write>(
    writer: &mut Writer<T>,
    name: &'static [u8],
    namespace: &str,
    prefix: Option<&str>,
) -> Result<Element, quick_xml::Error> {
    let attribute_name = match prefix {
        None => X_ATTR_NAMESPACE.to_string(),
        Some(prefix) => format!("{}:{}", X_ATTR_NAMESPACE, prefix),
    };
    let mut element = BytesStart::borrowed_name(name);
    element.push_attribute(Attribute::from((attribute_name.as_str(), namespace)));
    writer.write_event(Event::Start(element))?;
    Ok(Element { name })
}

pub fn empty_element<T: Write>(
    writer: &mut Writer<T>,
    name: &'static [u8],
) -> Result<(), quick_xml::Error> {
    writer
        .write_event(Event::Empty(BytesStart::borrowed_name(name)))
        .map(|_| ())
}

pub fn text_element<T: Write>(
    writer: &mut Writer<T>,
    name: &'static [u8],
    content: &[u8],
) -> Result<(), quick_xml::Error> {
    let element = start_element(writer, name)?;
    writer.write_event(Event::Text(BytesText::from_plain(content)))?;
    element.end(writer)
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Element {
    pub fn end<T: Write>(&self, writer: &mut Writer<T>) -> Result<(), quick_xml::Error> {
        writer
            .write_event(Event::End(BytesEnd::borrowed(self.name)))
            .map(|_| ())
    }
}
