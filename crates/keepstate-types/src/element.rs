use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Reference to a document element, addressed by a CSS-like selector.
///
/// There is no live document behind this type. Persisting an element keeps
/// only enough to look it up again (`tag#id.class1.class2`); whatever the
/// selector matches after a reload may be a different element, or none.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Lower-cased tag name (`div`, `button`, ...).
    pub tag: String,
    /// Element id, if any.
    pub id: Option<String>,
    /// Class list in document order.
    pub classes: Vec<String>,
}

impl ElementRef {
    /// Create a reference from a bare tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
        }
    }

    /// Builder: set the element id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: append a class.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Selector built from tag name, then id, then class list.
    pub fn selector(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        out
    }

    /// Parse a selector produced by [`ElementRef::selector`].
    pub fn from_selector(selector: &str) -> Result<Self, TypeError> {
        let selector = selector.trim();
        let invalid = || TypeError::InvalidSelector(selector.to_string());

        let tag_end = selector.find(['#', '.']).unwrap_or(selector.len());
        let tag = &selector[..tag_end];
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid());
        }

        let mut element = ElementRef::new(tag);
        let mut rest = &selector[tag_end..];
        while !rest.is_empty() {
            let sigil = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let part = &body[..end];
            if part.is_empty() {
                return Err(invalid());
            }
            match sigil {
                b'#' if element.id.is_none() => element.id = Some(part.to_string()),
                b'.' => element.classes.push(part.to_string()),
                _ => return Err(invalid()),
            }
            rest = &body[end..];
        }
        Ok(element)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_order_is_tag_id_classes() {
        let el = ElementRef::new("DIV").with_id("main").with_class("a").with_class("b");
        assert_eq!(el.selector(), "div#main.a.b");
    }

    #[test]
    fn bare_tag() {
        assert_eq!(ElementRef::new("span").selector(), "span");
    }

    #[test]
    fn parse_back() {
        let el = ElementRef::from_selector("button#ok.primary.large").unwrap();
        assert_eq!(el.tag, "button");
        assert_eq!(el.id.as_deref(), Some("ok"));
        assert_eq!(el.classes, vec!["primary", "large"]);
    }

    #[test]
    fn parse_classes_only() {
        let el = ElementRef::from_selector("p.note").unwrap();
        assert_eq!(el.id, None);
        assert_eq!(el.classes, vec!["note"]);
    }

    #[test]
    fn reject_malformed() {
        assert!(ElementRef::from_selector("").is_err());
        assert!(ElementRef::from_selector("#id-only").is_err());
        assert!(ElementRef::from_selector("div#a#b").is_err());
        assert!(ElementRef::from_selector("div..x").is_err());
    }
}
