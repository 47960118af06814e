//! Reads block interfaces back out of exported documents.

use log::debug;
use plcnet_core::{InterfaceSection, Member, SectionName};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, XmlError};

fn strip_bom(document: &str) -> &str {
    document.trim_start_matches('\u{feff}')
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(XmlError::parse)?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(XmlError::parse)?.into_owned()));
        }
    }
    Ok(None)
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Extract every interface section except `Constant`, members in document order.
///
/// Only direct `Member` children of a `Section` are read; nested struct
/// members and members lacking a name or datatype are skipped.
pub fn parse_interface(document: &str) -> Result<Vec<InterfaceSection>> {
    let mut reader = Reader::from_str(strip_bom(document));
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut sections = Vec::new();
    let mut current: Option<InterfaceSection> = None;
    let mut found = false;

    loop {
        let event = reader.read_event().map_err(XmlError::parse)?;
        let (element, empty) = match &event {
            Event::Start(e) => (Some(e), false),
            Event::Empty(e) => (Some(e), true),
            Event::End(_) => {
                let closed = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str);
                if closed == "Section" && parent == Some("Sections") {
                    if let Some(section) = current.take() {
                        sections.push(section);
                    }
                } else if closed == "Sections" {
                    break;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let Some(element) = element else { continue };

        let name = local_name(element);
        let parent = stack.last().map(String::as_str);
        match (name.as_str(), parent) {
            ("Sections", _) if !found => {
                found = true;
                if empty {
                    break;
                }
            }
            ("Section", Some("Sections")) if found => {
                let section_name = attribute(element, b"Name")?.unwrap_or_default();
                let section = match section_name.parse::<SectionName>() {
                    Ok(SectionName::Constant) => None,
                    Ok(section) => Some(InterfaceSection::new(section)),
                    Err(e) => {
                        debug!("skipping section: {e}");
                        None
                    }
                };
                if empty {
                    sections.extend(section);
                } else {
                    current = section;
                }
            }
            ("Member", Some("Section")) => {
                if let Some(section) = current.as_mut() {
                    let member_name = attribute(element, b"Name")?;
                    let datatype = attribute(element, b"Datatype")?;
                    if let (Some(member_name), Some(datatype)) = (member_name, datatype) {
                        section.members.push(Member::new(member_name, datatype));
                    }
                }
            }
            _ => {}
        }
        if !empty {
            stack.push(name);
        }
    }

    if !found {
        return Err(XmlError::parse("document has no interface Sections element"));
    }
    Ok(sections)
}

/// The `AttributeList/Name` of the document's block element.
pub fn document_block_name(document: &str) -> Result<String> {
    let mut reader = Reader::from_str(strip_bom(document));
    reader.trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut capture = false;
    loop {
        match reader.read_event().map_err(XmlError::parse)? {
            Event::Start(e) => {
                let name = local_name(&e);
                capture = name == "Name"
                    && stack.len() == 3
                    && stack[1].starts_with("SW.Blocks.")
                    && stack[2] == "AttributeList";
                stack.push(name);
            }
            Event::Text(text) if capture => {
                return text.unescape().map(|s| s.into_owned()).map_err(XmlError::parse);
            }
            Event::End(_) => {
                if capture {
                    return Ok(String::new());
                }
                stack.pop();
            }
            Event::Eof => return Err(XmlError::parse("document has no block name")),
            _ => {}
        }
    }
}

/// Replace the value of attribute `name` in the block's first `AttributeList`.
///
/// Both the `<Name>..</Name>` and the empty `<Name />` forms are recognized.
pub fn replace_attribute(document: &str, name: &str, value: &str) -> Result<String> {
    let list = document
        .find("<AttributeList>")
        .ok_or_else(|| XmlError::parse("document has no AttributeList"))?;
    let end = document[list..]
        .find("</AttributeList>")
        .map(|i| list + i)
        .ok_or_else(|| XmlError::parse("unterminated AttributeList"))?;

    let replacement = format!("<{name}>{}</{name}>", escape(value));
    let open = format!("<{name}>");
    let empty = format!("<{name} />");
    let scope = &document[list..end];
    let (start, stop) = if let Some(i) = scope.find(&open) {
        let close = format!("</{name}>");
        let j = scope[i..]
            .find(&close)
            .ok_or_else(|| XmlError::parse(format!("unterminated attribute {name}")))?;
        (list + i, list + i + j + close.len())
    } else if let Some(i) = scope.find(&empty) {
        (list + i, list + i + empty.len())
    } else {
        return Err(XmlError::parse(format!("document has no attribute {name}")));
    };

    let mut out = String::with_capacity(document.len() + value.len());
    out.push_str(&document[..start]);
    out.push_str(&replacement);
    out.push_str(&document[stop..]);
    Ok(out)
}
