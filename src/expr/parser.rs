//! Expression parser
//!
//! Precedence climbing over the token stream from [`super::lexer`].
//! Static member chains rooted at a data identifier are folded into
//! `Expr::Path` while parsing, so dependency extraction is a plain tree walk.
//!
//! Grammar (lowest to highest):
//! ```text
//! expr     := arrow | ternary
//! arrow    := IDENT "=>" expr | "(" [IDENT ("," IDENT)*] ")" "=>" expr
//! ternary  := binary ["?" expr ":" expr]
//! binary   := unary (OP unary)*        ; || && ==/!= </<= +/- */%
//! unary    := ("!" | "-") unary | postfix
//! postfix  := primary ("." NAME | "[" expr "]" | "(" args ")")*
//! primary  := NUMBER | STRING | IDENT | "(" expr ")" | object | array
//! ```

use serde_json::Value;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::eval::number;
use super::lexer::{tokenize, Punct, Spanned, Token};
use super::Scope;
use crate::error::{LsdomError, Result};
use crate::path::{is_segment, Path};

/// Parse a complete expression, resolving item aliases through `scope`
pub fn parse(source: &str, scope: &Scope) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        scope,
        locals: Vec::new(),
    };
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(parser.error(format!("unexpected trailing {}", describe(other)))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Punct(p) => format!("token {p:?}"),
        Token::Eof => "end of expression".to_string(),
    }
}

fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    let Token::Punct(p) = token else {
        return None;
    };
    let op = match p {
        Punct::OrOr => (BinaryOp::Or, 1),
        Punct::AndAnd => (BinaryOp::And, 2),
        Punct::EqEq => (BinaryOp::Eq, 3),
        Punct::NotEq => (BinaryOp::NotEq, 3),
        Punct::StrictEq => (BinaryOp::StrictEq, 3),
        Punct::StrictNotEq => (BinaryOp::StrictNotEq, 3),
        Punct::Lt => (BinaryOp::Lt, 4),
        Punct::Le => (BinaryOp::Le, 4),
        Punct::Gt => (BinaryOp::Gt, 4),
        Punct::Ge => (BinaryOp::Ge, 4),
        Punct::Plus => (BinaryOp::Add, 5),
        Punct::Minus => (BinaryOp::Sub, 5),
        Punct::Star => (BinaryOp::Mul, 6),
        Punct::Slash => (BinaryOp::Div, 6),
        Punct::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some(op)
}

/// Format a numeric member/index key as a path segment
fn index_segment(n: f64) -> Option<String> {
    (n >= 0.0 && n.fract() == 0.0 && n < 9_007_199_254_740_992.0).then(|| (n as u64).to_string())
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    scope: &'a Scope,
    /// Arrow parameters currently in scope
    locals: Vec<String>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, details: impl Into<String>) -> LsdomError {
        let position = self.tokens[self.pos.min(self.tokens.len() - 1)].pos;
        LsdomError::parse(self.source, position, details)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        if self.peek() == &Token::Punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: Punct) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {punct:?}, found {}",
                describe(self.peek())
            )))
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        if let Some((params, skip)) = self.arrow_params() {
            self.pos += skip;
            let depth = self.locals.len();
            self.locals.extend(params.iter().cloned());
            let body = self.expression();
            self.locals.truncate(depth);
            return Ok(Expr::Lambda {
                params,
                body: Box::new(body?),
            });
        }
        self.ternary()
    }

    /// Look ahead for an arrow head; returns the parameters and how many
    /// tokens the head spans (including `=>`)
    fn arrow_params(&self) -> Option<(Vec<String>, usize)> {
        match self.peek() {
            Token::Ident(name) if self.peek_at(1) == &Token::Punct(Punct::Arrow) => {
                Some((vec![name.clone()], 2))
            }
            Token::Punct(Punct::LParen) => {
                let mut params = Vec::new();
                let mut offset = 1;
                loop {
                    match self.peek_at(offset) {
                        Token::Punct(Punct::RParen) => {
                            offset += 1;
                            break;
                        }
                        Token::Ident(name) => {
                            params.push(name.clone());
                            offset += 1;
                            match self.peek_at(offset) {
                                Token::Punct(Punct::Comma) => offset += 1,
                                Token::Punct(Punct::RParen) => {}
                                _ => return None,
                            }
                        }
                        _ => return None,
                    }
                }
                (self.peek_at(offset) == &Token::Punct(Punct::Arrow)).then_some((params, offset + 1))
            }
            _ => None,
        }
    }

    fn ternary(&mut self) -> Result<Expr> {
        let test = self.binary(0)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(Punct::Colon)?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = binary_op(self.peek()) {
            if prec <= min_prec {
                break;
            }
            self.advance();
            let rhs = self.binary(prec)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Punct(Punct::Bang) => UnaryOp::Not,
            Token::Punct(Punct::Minus) => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::Punct(Punct::Dot) => {
                    self.advance();
                    let property = match self.advance() {
                        Token::Ident(name) => name,
                        Token::Number(n) => index_segment(n)
                            .ok_or_else(|| self.error("invalid numeric member"))?,
                        other => {
                            return Err(
                                self.error(format!("expected member name, found {}", describe(&other)))
                            )
                        }
                    };
                    expr = match expr {
                        Expr::Path(path) => Expr::Path(path.child(&property)),
                        object => Expr::Member {
                            object: Box::new(object),
                            property,
                        },
                    };
                }
                Token::Punct(Punct::LBracket) => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Punct::RBracket)?;
                    let literal_key = match &index {
                        Expr::Literal(Value::String(s)) if is_segment(s) => Some(s.clone()),
                        Expr::Literal(Value::Number(n)) => n.as_f64().and_then(index_segment),
                        _ => None,
                    };
                    expr = match (expr, literal_key) {
                        (Expr::Path(path), Some(key)) => Expr::Path(path.child(&key)),
                        (object, Some(key)) => Expr::Member {
                            object: Box::new(object),
                            property: key,
                        },
                        (object, None) => Expr::Index {
                            object: Box::new(object),
                            index: Box::new(index),
                        },
                    };
                }
                Token::Punct(Punct::LParen) => {
                    self.advance();
                    let args = self.list(Punct::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Comma-separated expressions up to `close` (trailing comma allowed)
    fn list(&mut self, close: Punct) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(Punct::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(self.identifier(name)),
            Token::Punct(Punct::LParen) => {
                let inner = self.expression()?;
                self.expect(Punct::RParen)?;
                Ok(inner)
            }
            Token::Punct(Punct::LBracket) => Ok(Expr::Array(self.list(Punct::RBracket)?)),
            Token::Punct(Punct::LBrace) => self.object(),
            other => {
                // report at the offending token, not after it
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }

    fn identifier(&self, name: String) -> Expr {
        match name.as_str() {
            "true" => return Expr::Literal(Value::Bool(true)),
            "false" => return Expr::Literal(Value::Bool(false)),
            "null" | "undefined" => return Expr::Literal(Value::Null),
            _ => {}
        }
        if self.locals.iter().any(|local| local == &name) {
            return Expr::Local(name);
        }
        match self.scope.resolve(&name) {
            Some(aliased) => Expr::Path(aliased.clone()),
            None => Expr::Path(Path::from_segments([name])),
        }
    }

    fn object(&mut self) -> Result<Expr> {
        let mut fields = Vec::new();
        while !self.eat(Punct::RBrace) {
            let key = match self.advance() {
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Number(n) => number(n).to_string(),
                other => {
                    return Err(self.error(format!("expected object key, found {}", describe(&other))))
                }
            };
            self.expect(Punct::Colon)?;
            let value = self.expression()?;
            fields.push((key, value));
            if !self.eat(Punct::Comma) {
                self.expect(Punct::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::KeySet;
    use pretty_assertions::assert_eq;

    fn p(source: &str) -> Expr {
        parse(source, &Scope::default()).unwrap()
    }

    fn path(raw: &str) -> Expr {
        Expr::Path(Path::parse(raw).unwrap())
    }

    #[test]
    fn member_chain_folds_into_path() {
        assert_eq!(p("todos.length"), path("todos.length"));
        assert_eq!(p("todos[0].name"), path("todos.0.name"));
        assert_eq!(p("a['b']"), path("a.b"));
    }

    #[test]
    fn keys_that_are_not_segments_stay_indexed() {
        let expr = p("a['b c']");
        assert!(matches!(expr, Expr::Index { .. }));
        let mut keys = KeySet::new();
        expr.collect_keys(&mut keys);
        assert_eq!(keys.iter().map(Path::as_str).collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn precedence_of_arithmetic() {
        assert_eq!(
            p("a + b * 2"),
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(path("a")),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(path("b")),
                    rhs: Box::new(Expr::Literal(Value::from(2))),
                }),
            }
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let Expr::Binary { lhs, rhs, .. } = p("a - b - c") else {
            panic!("expected binary");
        };
        assert_eq!(*rhs, path("c"));
        assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn ternary_with_comparison() {
        let expr = p("todos.length > 0 ? 'none' : 'inherit'");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn object_literal_keys_are_not_paths() {
        assert_eq!(
            p("{display: shown ? 'block' : 'none', 'z-index': 2}"),
            Expr::Object(vec![
                (
                    "display".into(),
                    Expr::Conditional {
                        test: Box::new(path("shown")),
                        consequent: Box::new(Expr::Literal(Value::from("block"))),
                        alternate: Box::new(Expr::Literal(Value::from("none"))),
                    }
                ),
                ("z-index".into(), Expr::Literal(Value::from(2))),
            ])
        );
    }

    #[test]
    fn arrow_params_become_locals() {
        assert_eq!(
            p("(e) => add(e)"),
            Expr::Lambda {
                params: vec!["e".into()],
                body: Box::new(Expr::Call {
                    callee: Box::new(path("add")),
                    args: vec![Expr::Local("e".into())],
                }),
            }
        );
        assert!(matches!(p("e => e.which"), Expr::Lambda { .. }));
        assert!(matches!(p("() => reset()"), Expr::Lambda { .. }));
    }

    #[test]
    fn parenthesized_expression_is_not_arrow() {
        assert_eq!(p("(a)"), path("a"));
    }

    #[test]
    fn scope_substitutes_alias_everywhere() {
        let scope = Scope::default().with_alias("item", Path::parse("todos.3").unwrap());
        let expr = parse("item.done ? item.name : other", &scope).unwrap();
        assert_eq!(
            expr,
            Expr::Conditional {
                test: Box::new(path("todos.3.done")),
                consequent: Box::new(path("todos.3.name")),
                alternate: Box::new(path("other")),
            }
        );
    }

    #[test]
    fn arrow_param_shadows_alias() {
        let scope = Scope::default().with_alias("item", Path::parse("todos.0").unwrap());
        let expr = parse("item => item.name", &scope).unwrap();
        let Expr::Lambda { body, .. } = expr else {
            panic!("expected lambda");
        };
        assert!(matches!(*body, Expr::Member { .. }));
    }

    #[test]
    fn keywords_are_literals() {
        assert_eq!(p("true"), Expr::Literal(Value::Bool(true)));
        assert_eq!(p("undefined"), Expr::Literal(Value::Null));
    }

    #[test]
    fn errors_point_at_offending_token() {
        let err = parse("a + * b", &Scope::default()).unwrap_err();
        assert!(matches!(err, LsdomError::ExpressionParse { position: 4, .. }));

        assert!(parse("a b", &Scope::default()).is_err());
        assert!(parse("(a", &Scope::default()).is_err());
        assert!(parse("{a}", &Scope::default()).is_err());
        assert!(parse("", &Scope::default()).is_err());
    }
}
