//! A small XML element tree and an indenting serializer.

use std::fmt::{Display, Write as _};

/// One XML element. Text and children are not mixed in the documents
/// this crate writes, so an element has at most one of them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// `<name>text</name>`.
    pub fn leaf(name: impl Into<String>, text: impl Display) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Display) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn attr_value(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child named `name`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of the first direct child named `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|c| c.text.as_deref())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Every element below this one named `name`, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// Visit this element and its descendants in document order.
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Element)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }
}

/// Serialize `root` after the given prologue lines, two spaces per level.
pub fn write_document(prologue: &[&str], root: &Element) -> String {
    let mut out = String::new();
    for line in prologue {
        out.push_str(line);
        out.push('\n');
    }
    write_element(&mut out, root, 0);
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}<{}", element.name);
    for (key, value) in &element.attrs {
        let _ = write!(out, " {key}=\"{}\"", escape_xml(value));
    }

    if !element.children.is_empty() {
        out.push_str(">\n");
        for child in &element.children {
            write_element(out, child, depth + 1);
        }
        let _ = writeln!(out, "{indent}</{}>", element.name);
        return;
    }

    match element.text.as_deref() {
        Some(text) if !text.is_empty() => {
            let _ = writeln!(out, ">{}</{}>", escape_xml(text), element.name);
        }
        _ => out.push_str("/>\n"),
    }
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
