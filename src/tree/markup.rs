//! Markup parsing and serialization for [`MemoryTree`]
//!
//! A small HTML-ish reader: elements, attributes (quoted, unquoted or bare),
//! text, comments and void elements. Enough for templates, not a full HTML5
//! tokenizer.

use super::memory::value_override;
use super::{MemoryTree, NodeId, NodeKind, RenderTree};
use crate::error::{LsdomError, Result};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn markup_error(position: usize, details: impl Into<String>) -> LsdomError {
    LsdomError::MarkupParse {
        position,
        details: details.into(),
    }
}

/// Parse `source` into a new fragment node of `tree`
pub fn parse(tree: &mut MemoryTree, source: &str) -> Result<NodeId> {
    let fragment = tree.create_fragment();
    // open elements with the offset of their start tag
    let mut stack: Vec<(NodeId, String, usize)> = Vec::new();
    let mut i = 0usize;

    while i < source.len() {
        let parent = stack.last().map_or(fragment, |(node, _, _)| *node);
        let rest = &source[i..];

        if rest.starts_with("<!--") {
            let end = rest[4..]
                .find("-->")
                .ok_or_else(|| markup_error(i, "unterminated comment"))?;
            let comment = tree.create_comment(&rest[4..4 + end]);
            tree.append_child(parent, comment);
            i += 4 + end + 3;
            continue;
        }

        if rest.starts_with("</") {
            let end = rest
                .find('>')
                .ok_or_else(|| markup_error(i, "unterminated closing tag"))?;
            let tag = rest[2..end].trim().to_ascii_lowercase();
            match stack.pop() {
                Some((_, open, _)) if open == tag => {}
                Some((_, open, position)) => {
                    return Err(markup_error(position, format!("<{open}> closed by </{tag}>")))
                }
                None => return Err(markup_error(i, format!("unexpected closing tag </{tag}>"))),
            }
            i += end + 1;
            continue;
        }

        if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let end = find_tag_end(source, i).ok_or_else(|| markup_error(i, "unterminated tag"))?;
            let (name, attrs, self_closing) = split_start_tag(&source[i + 1..end]);
            let element = tree.create_element(name);
            for (attr, value) in parse_attributes(attrs) {
                tree.set_attribute(&element, &attr, &decode_entities(&value));
            }
            tree.append_child(parent, element);

            let tag = name.to_ascii_lowercase();
            if !self_closing && !is_void(&tag) {
                stack.push((element, tag, i));
            }
            i = end + 1;
            continue;
        }

        // text up to the next tag start
        let first = rest.chars().next().map_or(1, char::len_utf8);
        let len = rest[first..].find('<').map_or(rest.len(), |p| p + first);
        let text = tree.create_text(&decode_entities(&rest[..len]));
        tree.append_child(parent, text);
        i += len;
    }

    if let Some((_, tag, position)) = stack.pop() {
        return Err(markup_error(position, format!("unclosed <{tag}>")));
    }
    Ok(fragment)
}

/// Offset of the `>` closing the tag opened at `lt_idx` (quote-aware)
fn find_tag_end(input: &str, lt_idx: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(lt_idx + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i),
            None => {}
        }
    }
    None
}

/// `div class="x" /` -> (`div`, `class="x"`, true)
fn split_start_tag(inside: &str) -> (&str, &str, bool) {
    let trimmed = inside.trim();
    let self_closing = trimmed.ends_with('/');
    let core = if self_closing {
        trimmed[..trimmed.len() - 1].trim_end()
    } else {
        trimmed
    };
    let name_end = core.find(char::is_whitespace).unwrap_or(core.len());
    (&core[..name_end], core[name_end..].trim_start(), self_closing)
}

fn parse_attributes(input: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0usize;

    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    loop {
        i = skip_ws(i);
        if i >= bytes.len() {
            break;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = input[name_start..i].to_string();

        i = skip_ws(i);
        if i >= bytes.len() || bytes[i] != b'=' {
            out.push((name, String::new()));
            continue;
        }
        i = skip_ws(i + 1);
        if i >= bytes.len() {
            out.push((name, String::new()));
            break;
        }

        let value = if bytes[i] == b'"' || bytes[i] == b'\'' {
            let quote = bytes[i];
            let start = i + 1;
            let end = input[start..]
                .bytes()
                .position(|b| b == quote)
                .map_or(input.len(), |p| start + p);
            i = (end + 1).min(input.len());
            &input[start..end]
        } else {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            &input[start..i]
        };
        out.push((name, value.to_string()));
    }
    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Serialize `node` (a fragment serializes its children)
pub fn serialize(tree: &MemoryTree, node: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

fn write_node(tree: &MemoryTree, node: NodeId, out: &mut String) {
    match tree.kind(&node) {
        NodeKind::Text => out.push_str(&escape_text(&tree.text(&node))),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(&tree.text(&node));
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for child in tree.children(&node) {
                write_node(tree, child, out);
            }
        }
        NodeKind::Element => {
            let tag = tree.tag_name(&node).unwrap_or_default();
            out.push('<');
            out.push_str(&tag);
            let value = value_override(tree, node);
            let mut wrote_value = false;
            for (name, attr) in tree.attributes(&node) {
                let attr = match (name.as_str(), value) {
                    ("value", Some(current)) => {
                        wrote_value = true;
                        current.to_string()
                    }
                    _ => attr,
                };
                out.push(' ');
                out.push_str(&name);
                if !attr.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr));
                    out.push('"');
                }
            }
            if let (Some(current), false) = (value, wrote_value) {
                out.push_str(" value=\"");
                out.push_str(&escape_attr(current));
                out.push('"');
            }
            out.push('>');
            if is_void(&tag) {
                return;
            }
            for child in tree.children(&node) {
                write_node(tree, child, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
    }
}
