//! MUQL lexer

use crate::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: keyword, table, column, or node reference.
    Ident,
    /// Quoted string (single or double quotes, quotes stripped).
    StringLit,
    Number,
    /// Punctuation and operators: `, ( ) * = != < <= > >= <>`.
    Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    /// Case-insensitive keyword probe.
    pub fn is_kw(&self, kw: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(kw)
    }
}

fn is_ident_char(c: char) -> bool {
    // Node refs may contain : / . % @ - # so the charset is wide;
    // whitespace and the symbols below terminate.
    c.is_alphanumeric() || matches!(c, '_' | ':' | '/' | '.' | '%' | '@' | '-' | '#')
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        // Strings
        if c == '\'' || c == '"' {
            let quote = c;
            let mut text = String::new();
            let mut closed = false;
            for (_, ch) in chars.by_ref() {
                if ch == quote {
                    closed = true;
                    break;
                }
                text.push(ch);
            }
            if !closed {
                return Err(QueryError::Syntax {
                    offset,
                    expected: format!("closing {quote}"),
                });
            }
            tokens.push(Token {
                kind: TokenKind::StringLit,
                text,
                offset,
            });
            continue;
        }

        // Numbers
        if c.is_ascii_digit() {
            let mut text = String::from(c);
            while let Some(&(_, next)) = chars.peek() {
                if next.is_ascii_digit() || next == '.' {
                    text.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Number,
                text,
                offset,
            });
            continue;
        }

        // Operators, including the two-character forms.
        if matches!(c, ',' | '(' | ')' | '*' | '=' | '<' | '>' | '!') {
            let mut text = String::from(c);
            if matches!(c, '!' | '<' | '>') {
                if let Some(&(_, next)) = chars.peek() {
                    let pair = matches!(
                        (c, next),
                        ('!', '=') | ('<', '=') | ('>', '=') | ('<', '>')
                    );
                    if pair {
                        text.push(next);
                        chars.next();
                    }
                }
            }
            if text == "!" {
                return Err(QueryError::Syntax {
                    offset,
                    expected: "!=".to_string(),
                });
            }
            tokens.push(Token {
                kind: TokenKind::Symbol,
                text,
                offset,
            });
            continue;
        }

        // Idents
        if is_ident_char(c) {
            let mut text = String::from(c);
            while let Some(&(_, next)) = chars.peek() {
                if is_ident_char(next) {
                    text.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text,
                offset,
            });
            continue;
        }

        return Err(QueryError::Syntax {
            offset,
            expected: format!("token, found {c:?}"),
        });
    }

    Ok(tokens)
}
