// SPDX-License-Identifier: Apache-2.0

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{ErrorKind, EucanetdError};

/// Minimal owned XML element tree, the desired state document is small
/// enough to be held fully in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct XmlElement {
    pub(crate) name: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) text: String,
    pub(crate) children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(e: &BytesStart) -> Result<Self, EucanetdError> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                attr.unescape_value()?.to_string(),
            ));
        }
        Ok(Self {
            name: String::from_utf8_lossy(e.name().as_ref()).to_string(),
            attrs,
            ..Default::default()
        })
    }

    pub(crate) fn parse(content: &str) -> Result<Self, EucanetdError> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    attach(&mut stack, &mut root, Self::from_start(&e)?)?
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        EucanetdError::new(
                            ErrorKind::TransientInput,
                            "Unexpected closing XML tag".to_string(),
                        )
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(t.unescape()?.as_ref());
                    }
                }
                Event::CData(t) => {
                    if let Some(top) = stack.last_mut() {
                        let data = t.into_inner();
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => (),
            }
        }
        if let Some(e) = stack.last() {
            return Err(EucanetdError::new(
                ErrorKind::TransientInput,
                format!("Truncated XML document, <{}> not closed", e.name),
            ));
        }
        root.ok_or_else(|| {
            EucanetdError::new(
                ErrorKind::TransientInput,
                "Empty XML document".to_string(),
            )
        })
    }

    pub(crate) fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub(crate) fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// `<property name="{name}">` child
    pub(crate) fn property(&self, name: &str) -> Option<&XmlElement> {
        self.children_named("property")
            .find(|c| c.attr("name") == Some(name))
    }

    /// Text of all `<value>` children
    pub(crate) fn values(&self) -> Vec<String> {
        self.children_named("value")
            .map(|v| v.text.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub(crate) fn first_value(&self) -> Option<String> {
        self.values().into_iter().next()
    }

    /// Text of child element `name`, empty if absent
    pub(crate) fn child_text(&self, name: &str) -> String {
        self.child(name)
            .map(|c| c.text.trim().to_string())
            .unwrap_or_default()
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), EucanetdError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(EucanetdError::new(
            ErrorKind::TransientInput,
            format!("Multiple XML root elements found: <{}>", element.name),
        ))
    }
}
