//! Expression tokenizer

use crate::error::{LsdomError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(Punct),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Dot,
    Comma,
    Colon,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    StrictEq,
    StrictNotEq,
    AndAnd,
    OrOr,
    Arrow,
}

/// A token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Split an expression into tokens, ending with `Token::Eof`
pub fn tokenize(source: &str) -> Result<Vec<Spanned>> {
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let digit_follows = |at: usize| {
            source[at + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        };
        let prev = tokens.last().map(|s| &s.token);
        let prev_is_value = matches!(
            prev,
            Some(
                Token::Ident(_)
                    | Token::Number(_)
                    | Token::Str(_)
                    | Token::Punct(Punct::RParen | Punct::RBracket)
            )
        );
        // `items.0.name`: after a member dot only an integer segment is lexed
        let member_index = matches!(prev, Some(Token::Punct(Punct::Dot)));

        if ch.is_ascii_digit() || (ch == '.' && !prev_is_value && digit_follows(pos)) {
            let start = pos;
            let mut end = pos;
            let mut seen_dot = member_index;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    end = i + 1;
                    chars.next();
                } else if c == '.' && !seen_dot && digit_follows(i) {
                    seen_dot = true;
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &source[start..end];
            let value = text
                .parse::<f64>()
                .map_err(|_| LsdomError::parse(source, start, format!("invalid number '{text}'")))?;
            tokens.push(Spanned {
                token: Token::Number(value),
                pos: start,
            });
            continue;
        }

        if is_ident_start(ch) {
            let start = pos;
            let mut end = pos;
            while let Some(&(i, c)) = chars.peek() {
                if is_ident_continue(c) {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Spanned {
                token: Token::Ident(source[start..end].to_string()),
                pos: start,
            });
            continue;
        }

        if ch == '\'' || ch == '"' {
            let quote = ch;
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => text.push('\n'),
                        Some((_, 't')) => text.push('\t'),
                        Some((_, 'r')) => text.push('\r'),
                        Some((_, other)) => text.push(other),
                        None => break,
                    },
                    c if c == quote => {
                        closed = true;
                        break;
                    }
                    c => text.push(c),
                }
            }
            if !closed {
                return Err(LsdomError::parse(source, pos, "unterminated string literal"));
            }
            tokens.push(Spanned {
                token: Token::Str(text),
                pos,
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let punct = match (ch, next) {
            ('=', Some('=')) => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                    Punct::StrictEq
                } else {
                    Punct::EqEq
                }
            }
            ('=', Some('>')) => {
                chars.next();
                Punct::Arrow
            }
            ('!', Some('=')) => {
                chars.next();
                if chars.peek().map(|&(_, c)| c) == Some('=') {
                    chars.next();
                    Punct::StrictNotEq
                } else {
                    Punct::NotEq
                }
            }
            ('<', Some('=')) => {
                chars.next();
                Punct::Le
            }
            ('>', Some('=')) => {
                chars.next();
                Punct::Ge
            }
            ('&', Some('&')) => {
                chars.next();
                Punct::AndAnd
            }
            ('|', Some('|')) => {
                chars.next();
                Punct::OrOr
            }
            ('.', _) => Punct::Dot,
            (',', _) => Punct::Comma,
            (':', _) => Punct::Colon,
            ('?', _) => Punct::Question,
            ('(', _) => Punct::LParen,
            (')', _) => Punct::RParen,
            ('[', _) => Punct::LBracket,
            (']', _) => Punct::RBracket,
            ('{', _) => Punct::LBrace,
            ('}', _) => Punct::RBrace,
            ('+', _) => Punct::Plus,
            ('-', _) => Punct::Minus,
            ('*', _) => Punct::Star,
            ('/', _) => Punct::Slash,
            ('%', _) => Punct::Percent,
            ('!', _) => Punct::Bang,
            ('<', _) => Punct::Lt,
            ('>', _) => Punct::Gt,
            (other, _) => {
                return Err(LsdomError::parse(
                    source,
                    pos,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        tokens.push(Spanned {
            token: Token::Punct(punct),
            pos,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: source.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn tokenize_member_chain() {
        assert_eq!(
            kinds("todos.length"),
            vec![
                Token::Ident("todos".into()),
                Token::Punct(Punct::Dot),
                Token::Ident("length".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenize_numeric_member_segment() {
        assert_eq!(
            kinds("todos.0.name"),
            vec![
                Token::Ident("todos".into()),
                Token::Punct(Punct::Dot),
                Token::Number(0.0),
                Token::Punct(Punct::Dot),
                Token::Ident("name".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenize_leading_dot_decimal() {
        assert_eq!(kinds("x * .5")[2], Token::Number(0.5));
    }

    #[test]
    fn tokenize_numbers_and_operators() {
        assert_eq!(
            kinds("a >= 1.5 && b !== 2"),
            vec![
                Token::Ident("a".into()),
                Token::Punct(Punct::Ge),
                Token::Number(1.5),
                Token::Punct(Punct::AndAnd),
                Token::Ident("b".into()),
                Token::Punct(Punct::StrictNotEq),
                Token::Number(2.0),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenize_strings_keep_colons_and_quotes() {
        assert_eq!(
            kinds(r#"'literal:text' + "it\"s""#),
            vec![
                Token::Str("literal:text".into()),
                Token::Punct(Punct::Plus),
                Token::Str("it\"s".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenize_arrow() {
        assert_eq!(
            kinds("(e) => f(e)")[..4],
            [
                Token::Punct(Punct::LParen),
                Token::Ident("e".into()),
                Token::Punct(Punct::RParen),
                Token::Punct(Punct::Arrow),
            ]
        );
    }

    #[test]
    fn tokenize_reports_position_of_bad_char() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, LsdomError::ExpressionParse { position: 2, .. }));
    }

    #[test]
    fn tokenize_unterminated_string_fails() {
        assert!(tokenize("'abc").is_err());
    }
}
