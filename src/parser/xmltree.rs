use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Lightweight element tree built from quick-xml events. Tag and attribute
/// names are stored without their namespace prefix: vendor exports disagree
/// on prefixes but never on local names, and all lookups here are by local
/// name, case-insensitively.
#[derive(Debug, Default)]
pub struct Element {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First direct child with the given local name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }

    /// All descendants with the given local name, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect(self, name, &mut found);
        found
    }

    /// Trimmed text of a direct child, None when the child is absent or
    /// empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        let text = self.find(name)?.text.trim();
        (!text.is_empty()).then_some(text)
    }

    fn trimmed_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Trimmed text of the first matching descendant.
    pub fn descendant_text(&self, name: &str) -> Option<&str> {
        self.descendants(name)
            .into_iter()
            .find_map(|el| el.trimmed_text())
    }
}

fn collect<'a>(el: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in &el.children {
        if child.name.eq_ignore_ascii_case(name) {
            found.push(child);
        }
        collect(child, name, found);
    }
}

fn local_name(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    raw.rsplit(':').next().unwrap_or(&raw).to_string()
}

/// Parse a whole document into its root element.
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                stack.push(element_from_start(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let el = element_from_start(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => return Ok(el),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::End(_)) => {
                let el = stack.pop().context("unbalanced end tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => return Ok(el),
                }
            }
            Ok(Event::Eof) => bail!("document ended without a root element"),
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<Element> {
    let mut el = Element {
        name: local_name(e.name().as_ref()),
        ..Element::default()
    };
    for attr in e.attributes() {
        let attr = attr?;
        el.attrs.insert(
            local_name(attr.key.as_ref()),
            attr.unescape_value()?.to_string(),
        );
    }
    Ok(el)
}

// ── Tests ──
