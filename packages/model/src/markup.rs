//! # Model markup
//!
//! Compact textual form of node lists, used by tests, tools and logs:
//!
//! ```text
//! <paragraph align="left">foo<$text bold=true>bar</$text></paragraph><image/>
//! ```
//!
//! - elements are tags; empty elements may be self-closing
//! - `$text` wraps text carrying attributes
//! - attribute values are quoted strings or bare JSON scalars
//!   (`true`, `false`, numbers); `null` means "no attribute"
//! - `&`, `<`, `>` and `"` are escaped as entities

use crate::errors::{ModelError, ModelResult};
use crate::node::{Attributes, Element, Node, NodeList, Text};
use logos::Logos;
use serde_json::Value;

const TEXT_TAG: &str = "$text";

#[derive(Logos, Debug, Clone, PartialEq)]
enum MarkupToken<'src> {
    #[regex(r"<[A-Za-z$][^<>]*>", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    OpenTag(&'src str),

    #[regex(r"</[^<>]*>", |lex| {
        let s = lex.slice();
        &s[2..s.len() - 1]
    })]
    CloseTag(&'src str),

    #[regex(r"[^<>]+", |lex| lex.slice())]
    Text(&'src str),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum TagToken<'src> {
    #[regex(r"[A-Za-z$_][A-Za-z0-9_$:\-]*", |lex| lex.slice())]
    Ident(&'src str),

    #[token("=")]
    Equals,

    #[token("/")]
    Slash,

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    Quoted(&'src str),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice())]
    Number(&'src str),
}

struct Tag {
    name: String,
    attributes: Attributes,
    self_closing: bool,
}

struct Frame {
    name: String,
    attributes: Attributes,
    children: Vec<Node>,
}

/// Parses markup into a normalized node list.
pub fn parse(source: &str) -> ModelResult<NodeList> {
    let mut stack = vec![Frame {
        name: String::new(),
        attributes: Attributes::new(),
        children: Vec::new(),
    }];

    let mut lexer = MarkupToken::lexer(source);

    while let Some(token) = lexer.next() {
        let offset = lexer.span().start;
        let token = token.map_err(|_| ModelError::invalid_markup(offset, "unexpected character"))?;

        match token {
            MarkupToken::Text(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.children.push(Node::text(unescape(data)));
                }
            }
            MarkupToken::OpenTag(inner) => {
                let tag = parse_tag(inner, offset)?;
                let frame = Frame {
                    name: tag.name,
                    attributes: tag.attributes,
                    children: Vec::new(),
                };

                if tag.self_closing {
                    let node = close_frame(frame, offset)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                } else {
                    stack.push(frame);
                }
            }
            MarkupToken::CloseTag(name) => {
                if stack.len() < 2 {
                    return Err(ModelError::invalid_markup(
                        offset,
                        format!("unexpected closing tag </{name}>"),
                    ));
                }

                let frame = stack.pop().ok_or_else(|| {
                    ModelError::invalid_markup(offset, "unbalanced closing tag")
                })?;

                if frame.name != name.trim() {
                    return Err(ModelError::invalid_markup(
                        offset,
                        format!("expected </{}> but found </{}>", frame.name, name),
                    ));
                }

                let node = close_frame(frame, offset)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
        }
    }

    if stack.len() != 1 {
        let name = stack.last().map(|frame| frame.name.clone()).unwrap_or_default();
        return Err(ModelError::invalid_markup(
            source.len(),
            format!("unclosed tag <{name}>"),
        ));
    }

    let root = stack.pop().map(|frame| frame.children).unwrap_or_default();
    Ok(NodeList::from_nodes(root))
}

fn close_frame(frame: Frame, offset: usize) -> ModelResult<Node> {
    if frame.name != TEXT_TAG {
        return Ok(Node::Element(
            Element::new(frame.name)
                .with_attributes(frame.attributes)
                .with_children(NodeList::from_nodes(frame.children)),
        ));
    }

    let mut data = String::new();
    for child in frame.children {
        match child {
            Node::Text(text) if text.attributes.is_empty() => data.push_str(&text.data),
            _ => {
                return Err(ModelError::invalid_markup(
                    offset,
                    "<$text> may only contain plain text",
                ))
            }
        }
    }

    Ok(Node::Text(Text::new(data).with_attributes(frame.attributes)))
}

fn parse_tag(inner: &str, offset: usize) -> ModelResult<Tag> {
    let mut lexer = TagToken::lexer(inner);
    let mut next = || next_tag_token(&mut lexer, offset);

    let name = match next()? {
        Some(TagToken::Ident(name)) => name.to_string(),
        _ => return Err(ModelError::invalid_markup(offset, "missing tag name")),
    };

    let mut attributes = Attributes::new();
    let mut self_closing = false;

    loop {
        match next()? {
            None => break,
            Some(TagToken::Slash) => {
                self_closing = true;
                if next()?.is_some() {
                    return Err(ModelError::invalid_markup(offset, "content after '/'"));
                }
                break;
            }
            Some(TagToken::Ident(key)) => {
                if next()? != Some(TagToken::Equals) {
                    return Err(ModelError::invalid_markup(
                        offset,
                        format!("expected '=' after attribute '{key}'"),
                    ));
                }

                let value = match next()? {
                    Some(TagToken::Quoted(value)) => Some(Value::String(unescape(value))),
                    Some(TagToken::Number(number)) => Some(
                        serde_json::from_str(number)
                            .map_err(|_| ModelError::invalid_markup(offset, "invalid number"))?,
                    ),
                    Some(TagToken::Ident("true")) => Some(Value::Bool(true)),
                    Some(TagToken::Ident("false")) => Some(Value::Bool(false)),
                    Some(TagToken::Ident("null")) => None,
                    Some(TagToken::Ident(word)) => Some(Value::String(word.to_string())),
                    _ => {
                        return Err(ModelError::invalid_markup(
                            offset,
                            format!("missing value for attribute '{key}'"),
                        ))
                    }
                };

                if let Some(value) = value {
                    attributes.insert(key.to_string(), value);
                }
            }
            Some(_) => return Err(ModelError::invalid_markup(offset, "unexpected token in tag")),
        }
    }

    Ok(Tag {
        name,
        attributes,
        self_closing,
    })
}

fn next_tag_token<'src>(
    lexer: &mut logos::Lexer<'src, TagToken<'src>>,
    offset: usize,
) -> ModelResult<Option<TagToken<'src>>> {
    match lexer.next() {
        Some(Ok(token)) => Ok(Some(token)),
        Some(Err(_)) => Err(ModelError::invalid_markup(offset, "invalid tag")),
        None => Ok(None),
    }
}

/// Renders a node list as markup.
pub fn stringify(list: &NodeList) -> String {
    let mut out = String::new();
    for node in list {
        write_node(&mut out, node);
    }
    out
}

pub fn stringify_node(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node);
    out
}

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) if text.attributes.is_empty() => out.push_str(&escape(&text.data)),
        Node::Text(text) => {
            out.push('<');
            out.push_str(TEXT_TAG);
            write_attributes(out, &text.attributes);
            out.push('>');
            out.push_str(&escape(&text.data));
            out.push_str("</");
            out.push_str(TEXT_TAG);
            out.push('>');
        }
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            write_attributes(out, &element.attributes);
            out.push('>');
            for child in &element.children {
                write_node(out, child);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

fn write_attributes(out: &mut String, attributes: &Attributes) {
    for (key, value) in attributes {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        match value {
            Value::String(value) => {
                out.push('"');
                out.push_str(&escape(value));
                out.push('"');
            }
            Value::Bool(_) | Value::Number(_) | Value::Null => out.push_str(&value.to_string()),
            other => {
                out.push('"');
                out.push_str(&escape(&other.to_string()));
                out.push('"');
            }
        }
    }
}

fn escape(data: &str) -> String {
    data.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(data: &str) -> String {
    data.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_elements_and_text() {
        let list = parse(r#"<paragraph align="left">foo<$text bold=true>bar</$text></paragraph><image/>"#)
            .unwrap();

        assert_eq!(list.len(), 2);
        let paragraph = list.get(0).and_then(Node::as_element).unwrap();
        assert_eq!(paragraph.name, "paragraph");
        assert_eq!(paragraph.attributes.get("align"), Some(&json!("left")));
        assert_eq!(paragraph.max_offset(), 6);
        assert_eq!(
            paragraph.children.get(1).and_then(|node| node.get_attribute("bold")),
            Some(&json!(true))
        );

        let image = list.get(1).and_then(Node::as_element).unwrap();
        assert_eq!(image.name, "image");
        assert!(image.children.is_empty());
    }

    #[test]
    fn test_stringify_is_canonical() {
        let source = r#"<paragraph align="left" level=2>a &amp; b<$text bold=true>c</$text></paragraph>"#;
        assert_eq!(stringify(&parse(source).unwrap()), source);

        // Self-closing tags come back in long form; adjacent text is merged.
        assert_eq!(stringify(&parse("<br/>a<$text>b</$text>").unwrap()), "<br></br>ab");
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("<p>foo").unwrap_err().code(), "invalid-markup");
        assert_eq!(parse("<p>foo</q>").unwrap_err().code(), "invalid-markup");
        assert_eq!(parse("foo</p>").unwrap_err().code(), "invalid-markup");
        assert_eq!(parse("<p a>x</p>").unwrap_err().code(), "invalid-markup");
        assert_eq!(parse("<$text><b></b></$text>").unwrap_err().code(), "invalid-markup");
    }
}
