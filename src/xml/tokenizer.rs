use std::mem;

use super::token::{Attributes, Token};
use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::pipeline::{BoundedQueue, Transform};

/// Character-level markup tokenizer.
///
/// State is carried across chunks, so a document split at arbitrary points
/// produces the same tokens as the document fed in one piece. Anything still
/// accumulated when the input stops is discarded.
#[derive(Debug)]
pub struct Tokenizer {
    in_tag: bool,
    is_open_tag: bool,
    at_tag_start: bool,
    is_self_closing: bool,
    in_quoted_attr: bool,
    text: String,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            in_tag: false,
            is_open_tag: false,
            at_tag_start: false,
            is_self_closing: false,
            in_quoted_attr: false,
            text: String::new(),
        }
    }

    /// Tokenize one chunk, appending completed tokens to `out`.
    pub fn feed(&mut self, chunk: &[char], out: &mut Vec<Token>) -> Result<()> {
        for &c in chunk {
            self.step(c, out)?;
        }
        Ok(())
    }

    /// Tokenize a complete string.
    pub fn tokenize(input: &str) -> Result<Vec<Token>> {
        let mut tokenizer = Self::new();
        let mut out = Vec::new();
        for c in input.chars() {
            tokenizer.step(c, &mut out)?;
        }
        Ok(out)
    }

    fn step(&mut self, c: char, out: &mut Vec<Token>) -> Result<()> {
        if !self.in_tag {
            if c == '<' {
                if !self.text.is_empty() {
                    out.push(Token::Text {
                        text: mem::take(&mut self.text),
                    });
                }
                self.in_tag = true;
                self.at_tag_start = true;
                self.is_open_tag = true;
                self.is_self_closing = false;
                self.in_quoted_attr = false;
            } else {
                self.text.push(c);
            }
            return Ok(());
        }

        match c {
            '<' => Err(Error::malformed(&self.text, "unexpected '<' inside a tag")),
            '>' if !self.in_quoted_attr => {
                self.in_tag = false;
                let raw = mem::take(&mut self.text);
                out.push(self.finish_tag(&raw)?);
                Ok(())
            }
            _ => {
                if c == '"' {
                    self.in_quoted_attr = !self.in_quoted_attr;
                }
                if c == '/' {
                    if self.at_tag_start {
                        self.is_open_tag = false;
                    } else if !self.in_quoted_attr {
                        self.is_self_closing = true;
                    }
                }
                self.at_tag_start = false;
                self.text.push(c);
                Ok(())
            }
        }
    }

    fn finish_tag(&self, raw: &str) -> Result<Token> {
        if let Some(decl) = raw.strip_prefix('?') {
            let body = decl
                .strip_suffix('?')
                .ok_or_else(|| Error::malformed(raw, "unterminated declaration"))?;
            let (name, attributes) = parse_tag(raw, body)?;
            return Ok(Token::SingleTag {
                name: format!("?{name}"),
                attributes,
            });
        }
        if raw.starts_with('!') {
            return Err(Error::malformed(raw, "comments and DTDs are not supported"));
        }

        if !self.is_open_tag {
            if self.is_self_closing {
                return Err(Error::malformed(raw, "closing tag cannot be self-closing"));
            }
            let name = raw.get(1..).unwrap_or_default().trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::malformed(raw, "closing tag must be a single name"));
            }
            return Ok(Token::CloseTag {
                name: name.to_string(),
            });
        }

        if self.is_self_closing {
            let body = raw
                .trim_end()
                .strip_suffix('/')
                .ok_or_else(|| Error::malformed(raw, "'/' outside a quoted value"))?;
            let (name, attributes) = parse_tag(raw, body)?;
            return Ok(Token::SingleTag { name, attributes });
        }

        let (name, attributes) = parse_tag(raw, raw)?;
        Ok(Token::OpenTag { name, attributes })
    }
}

impl Transform<Chunk, Token> for Tokenizer {
    fn transform(&mut self, input: &mut BoundedQueue<Chunk>) -> Result<Vec<Token>> {
        let mut out = Vec::new();
        while let Some(chunk) = input.pop() {
            self.feed(chunk.as_chars(), &mut out)?;
        }
        Ok(out)
    }
}

/// Split tag text on whitespace outside double quotes.
fn words(body: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = None;
    let mut quoted = false;
    for (i, c) in body.char_indices() {
        if c == '"' {
            quoted = !quoted;
        }
        if c.is_whitespace() && !quoted {
            if let Some(s) = start.take() {
                words.push(&body[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&body[s..]);
    }
    words
}

/// Parse `name key="value" ...` into a name and attributes.
fn parse_tag(raw: &str, body: &str) -> Result<(String, Attributes)> {
    let words = words(body);
    let (name, pairs) = words
        .split_first()
        .ok_or_else(|| Error::malformed(raw, "empty tag"))?;
    if name.contains(['=', '"']) {
        return Err(Error::malformed(raw, "missing tag name"));
    }

    let mut attributes = Attributes::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::malformed(raw, "attribute without '='"))?;
        if key.is_empty() {
            return Err(Error::malformed(raw, "attribute without a name"));
        }
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .ok_or_else(|| Error::malformed(raw, "attribute value must be double-quoted"))?;
        if value.contains(['"', '&']) {
            return Err(Error::malformed(raw, "escaped attribute values are not supported"));
        }
        attributes.insert(key.to_string(), value.to_string());
    }
    Ok((name.to_string(), attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs.iter().copied().collect()
    }

    #[test]
    fn basic_document() {
        let tokens =
            Tokenizer::tokenize(r#"<sst uniqueCount="1"><si><t>a</t></si></sst>"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::OpenTag {
                    name: "sst".into(),
                    attributes: attrs(&[("uniqueCount", "1")]),
                },
                Token::open("si"),
                Token::open("t"),
                Token::text("a"),
                Token::close("t"),
                Token::close("si"),
                Token::close("sst"),
            ]
        );
    }

    #[test]
    fn empty_text_between_tags_is_not_emitted() {
        let tokens = Tokenizer::tokenize("<a></a><b/>").unwrap();
        assert_eq!(
            tokens,
            vec![Token::open("a"), Token::close("a"), Token::single("b")]
        );
    }

    #[test]
    fn close_tag_is_not_self_closing() {
        assert_eq!(Tokenizer::tokenize("</t>").unwrap(), vec![Token::close("t")]);
    }

    #[test]
    fn slash_inside_quotes_is_not_self_closing() {
        let tokens = Tokenizer::tokenize(r#"<si a="x/y">"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::OpenTag {
                name: "si".into(),
                attributes: attrs(&[("a", "x/y")]),
            }]
        );
    }

    #[test]
    fn self_closing_with_attributes() {
        let tokens = Tokenizer::tokenize(r#"<c r="A1" s="2" />"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::SingleTag {
                name: "c".into(),
                attributes: attrs(&[("r", "A1"), ("s", "2")]),
            }]
        );
    }

    #[test]
    fn quoted_values_may_contain_spaces_and_gt() {
        let tokens = Tokenizer::tokenize(r#"<t title="a > b c">x"#).unwrap();
        assert_eq!(tokens[0].attribute("title"), Some("a > b c"));
        assert_eq!(tokens.len(), 1, "trailing text is discarded without a tag");
    }

    #[test]
    fn gt_in_text_is_text() {
        let tokens = Tokenizer::tokenize("<t>1 > 0</t>").unwrap();
        assert_eq!(tokens[1], Token::text("1 > 0"));
    }

    #[test]
    fn xml_declaration_is_a_single_tag() {
        let tokens =
            Tokenizer::tokenize(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#)
                .unwrap();
        assert!(tokens[0].is_single("?xml"));
        assert_eq!(tokens[0].attribute("standalone"), Some("yes"));
    }

    #[test]
    fn malformed_tags() {
        for input in [
            "<a b>",
            r#"<a ="1">"#,
            "<a b=1>",
            r#"<a b="&quot;">"#,
            "<a/b>",
            "</a/>",
            "</a b>",
            "<>",
            "<!-- note -->",
            "<a <b>",
        ] {
            assert!(
                matches!(Tokenizer::tokenize(input), Err(Error::MalformedTag { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn transform_drains_queued_chunks() {
        let mut tokenizer = Tokenizer::new();
        let mut queue = BoundedQueue::new(2);
        queue.push(Chunk::from("<si><t")).unwrap();
        assert_eq!(
            tokenizer.transform(&mut queue).unwrap(),
            vec![Token::open("si")]
        );
        queue.push(Chunk::from(">hi</t>")).unwrap();
        assert_eq!(
            tokenizer.transform(&mut queue).unwrap(),
            vec![Token::open("t"), Token::text("hi"), Token::close("t")]
        );
        assert!(queue.is_empty());
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9:]{0,6}"
    }

    fn attributes() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::btree_map(name(), "[a-zA-Z0-9 ./:-]{0,8}", 0..3)
            .prop_map(|m| m.into_iter().collect())
    }

    fn render_attributes(attributes: &[(String, String)]) -> String {
        attributes
            .iter()
            .map(|(k, v)| format!(" {k}=\"{v}\""))
            .collect()
    }

    fn markup() -> impl Strategy<Value = String> {
        let piece = prop_oneof![
            "[a-zA-Z0-9 ,.!?/=\"'>\n]{1,12}",
            (name(), attributes()).prop_map(|(n, a)| format!("<{n}{}>", render_attributes(&a))),
            name().prop_map(|n| format!("</{n}>")),
            (name(), attributes()).prop_map(|(n, a)| format!("<{n}{}/>", render_attributes(&a))),
        ];
        // A closing tag flushes any trailing text run.
        prop::collection::vec(piece, 0..24).prop_map(|pieces| format!("{}<end/>", pieces.concat()))
    }

    proptest! {
        #[test]
        fn rendering_tokens_reproduces_markup(input in markup()) {
            let tokens = Tokenizer::tokenize(&input).unwrap();
            let rendered: String = tokens.iter().map(ToString::to_string).collect();
            prop_assert_eq!(rendered, input);
        }

        #[test]
        fn chunking_does_not_change_tokens(
            input in markup(),
            cuts in prop::collection::vec(1usize..16, 0..32),
        ) {
            let whole = Tokenizer::tokenize(&input).unwrap();

            let chars: Vec<char> = input.chars().collect();
            let mut tokenizer = Tokenizer::new();
            let mut pieces = Vec::new();
            let mut rest = &chars[..];
            for cut in cuts {
                let (head, tail) = rest.split_at(cut.min(rest.len()));
                tokenizer.feed(head, &mut pieces).unwrap();
                rest = tail;
            }
            tokenizer.feed(rest, &mut pieces).unwrap();

            prop_assert_eq!(whole, pieces);
        }
    }
}
