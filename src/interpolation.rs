//! `{expr}` interpolation splitter
//!
//! Splits attribute and text templates into literal and expression segments.
//! When no segment depends on data, the template collapses to one literal
//! string computed at split time.

use serde_json::Value;

use crate::error::Result;
use crate::expr::ast::KeySet;
use crate::expr::eval::to_display;
use crate::expr::{compile_in, Compiled, Expression, Scope};

#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Expr(Expression),
}

/// An interpolated template with at least one data dependency
#[derive(Debug, Clone)]
pub struct TemplateString {
    segments: Vec<Segment>,
    keys: KeySet,
}

impl TemplateString {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Union of the segment key sets
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Concatenate every segment against `snapshot`
    pub fn render(&self, snapshot: &Value) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr(expr) => out.push_str(&to_display(&expr.evaluate(snapshot))),
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum Interpolated {
    Static(String),
    Dynamic(TemplateString),
}

impl Interpolated {
    pub fn is_static(&self) -> bool {
        matches!(self, Interpolated::Static(_))
    }
}

pub fn split(template: &str) -> Result<Interpolated> {
    split_in(template, &Scope::default())
}

/// Split `template` compiling each expression under `scope`
pub fn split_in(template: &str, scope: &Scope) -> Result<Interpolated> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut keys = KeySet::new();
    let mut literal = String::new();
    let mut cursor = 0;

    while let Some(offset) = template[cursor..].find('{') {
        let open = cursor + offset;
        let doubled = template[open + 1..].starts_with('{');
        let body_start = open + if doubled { 2 } else { 1 };

        let Some(body_end) = find_close(template, body_start, doubled) else {
            // unterminated: the rest is literal text
            break;
        };

        literal.push_str(&template[cursor..open]);
        cursor = body_end + if doubled { 2 } else { 1 };

        let body = template[body_start..body_end].trim();
        if body.is_empty() {
            continue;
        }
        match compile_in(body, scope)? {
            Compiled::Literal(value) => literal.push_str(&to_display(&value)),
            Compiled::Dynamic(expr) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                keys.extend_from(expr.keys());
                segments.push(Segment::Expr(expr));
            }
        }
    }
    literal.push_str(&template[cursor..]);

    if keys.is_empty() {
        // dependency-free calls still get one evaluation
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => out.push_str(&text),
                Segment::Expr(expr) => out.push_str(&to_display(&expr.evaluate(&Value::Null))),
            }
        }
        out.push_str(&literal);
        return Ok(Interpolated::Static(out));
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(Interpolated::Dynamic(TemplateString { segments, keys }))
}

/// Find the byte offset of the brace closing an expression body that starts
/// at `from`. Quoted strings and nested object braces are skipped.
fn find_close(template: &str, from: usize, doubled: bool) -> Option<usize> {
    let bytes = template.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth > 0 => depth -= 1,
                b'}' if !doubled => return Some(i),
                b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
                _ => {}
            },
        }
        i += 1;
    }
    None
}
