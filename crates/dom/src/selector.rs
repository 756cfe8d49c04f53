use crate::page::Element;

/// A single compound CSS selector: optional tag plus `#id` / `.class` parts.
///
/// Covers the selector shapes the command set actually carries
/// (`button.submit`, `#login`, `input`); combinators are out of scope.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl SimpleSelector {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input.contains(char::is_whitespace) {
            return None;
        }
        let mut tag = None;
        let mut id = None;
        let mut classes = Vec::new();
        let mut rest = input;
        if !rest.starts_with('#') && !rest.starts_with('.') {
            let end = rest.find(['#', '.']).unwrap_or(rest.len());
            tag = Some(rest[..end].to_lowercase());
            rest = &rest[end..];
        }
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                b'#' => id = Some(name.to_string()),
                b'.' => classes.push(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }
        Some(Self { tag, id, classes })
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if &element.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = element.attr("class").unwrap_or("");
            let have: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        true
    }
}
