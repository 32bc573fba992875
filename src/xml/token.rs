use std::fmt;

/// Tag attributes in first-seen order.
///
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.insert(k.into(), v.into());
        }
        attributes
    }
}

/// Smallest classified unit of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Character data between two tags, undecoded.
    Text { text: String },
    OpenTag { name: String, attributes: Attributes },
    CloseTag { name: String },
    /// Self-closing tag such as `<t/>`.
    SingleTag { name: String, attributes: Attributes },
}

impl Token {
    pub fn text(text: impl Into<String>) -> Self {
        Token::Text { text: text.into() }
    }

    pub fn open(name: impl Into<String>) -> Self {
        Token::OpenTag {
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn close(name: impl Into<String>) -> Self {
        Token::CloseTag { name: name.into() }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Token::SingleTag {
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    /// Tag name, `None` for text.
    pub fn name(&self) -> Option<&str> {
        match self {
            Token::Text { .. } => None,
            Token::OpenTag { name, .. }
            | Token::CloseTag { name }
            | Token::SingleTag { name, .. } => Some(name),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        match self {
            Token::OpenTag { attributes, .. } | Token::SingleTag { attributes, .. } => {
                attributes.get(key)
            }
            _ => None,
        }
    }

    pub fn is_open(&self, tag: &str) -> bool {
        matches!(self, Token::OpenTag { name, .. } if name == tag)
    }

    pub fn is_close(&self, tag: &str) -> bool {
        matches!(self, Token::CloseTag { name } if name == tag)
    }

    pub fn is_single(&self, tag: &str) -> bool {
        matches!(self, Token::SingleTag { name, .. } if name == tag)
    }

    /// True for text made only of XML whitespace.
    pub fn is_blank_text(&self) -> bool {
        match self {
            Token::Text { text } => text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n')),
            _ => false,
        }
    }
}

fn write_attributes(f: &mut fmt::Formatter<'_>, attributes: &Attributes) -> fmt::Result {
    for (key, value) in attributes.iter() {
        write!(f, " {key}=\"{value}\"")?;
    }
    Ok(())
}

/// Renders the token back to markup.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text { text } => f.write_str(text),
            Token::OpenTag { name, attributes } => {
                write!(f, "<{name}")?;
                write_attributes(f, attributes)?;
                f.write_str(">")
            }
            Token::CloseTag { name } => write!(f, "</{name}>"),
            Token::SingleTag { name, attributes } => {
                write!(f, "<{name}")?;
                write_attributes(f, attributes)?;
                f.write_str("/>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_overwrite_in_place() {
        let attributes: Attributes = [("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();
        assert_eq!(
            attributes.iter().collect::<Vec<_>>(),
            vec![("a", "3"), ("b", "2")]
        );
        assert_eq!(attributes.get("a"), Some("3"));
        assert_eq!(attributes.get("c"), None);
    }

    #[test]
    fn display_renders_markup() {
        let tag = Token::OpenTag {
            name: "sst".into(),
            attributes: [("count", "2"), ("uniqueCount", "1")].into_iter().collect(),
        };
        assert_eq!(tag.to_string(), r#"<sst count="2" uniqueCount="1">"#);
        assert_eq!(Token::close("si").to_string(), "</si>");
        assert_eq!(Token::single("t").to_string(), "<t/>");
        assert_eq!(Token::text("a & b").to_string(), "a & b");
    }

    #[test]
    fn predicates() {
        assert!(Token::open("si").is_open("si"));
        assert!(!Token::open("si").is_close("si"));
        assert!(Token::text(" \r\n\t").is_blank_text());
        assert!(!Token::text(" x ").is_blank_text());
        assert_eq!(Token::text("x").name(), None);
        assert_eq!(Token::single("t").name(), Some("t"));
    }
}
