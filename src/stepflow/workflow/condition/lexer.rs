//! Tokenizer for condition expressions

use super::error::ConditionCause;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start
    pub offset: usize,
}

/// Split an expression into tokens, ending with `Eof`
pub(super) fn tokenize(input: &str) -> Result<Vec<Token>, ConditionCause> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let (kind, consumed) = lex_number(input, &chars[i..])?;
            tokens.push(Token { kind, offset });
            i += consumed;
            continue;
        }

        if c == '\'' || c == '"' {
            let (value, consumed) = lex_string(&chars[i..])?;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                offset,
            });
            i += consumed;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            tokens.push(Token {
                kind: TokenKind::Ident(ident),
                offset,
            });
            continue;
        }

        let (kind, width) = match (c, next) {
            ('*', Some('*')) => (TokenKind::DoubleStar, 2),
            ('/', Some('/')) => (TokenKind::DoubleSlash, 2),
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::Lte, 2),
            ('>', Some('=')) => (TokenKind::Gte, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            _ => {
                return Err(ConditionCause::syntax(
                    offset,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        tokens.push(Token { kind, offset });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

fn lex_number(input: &str, chars: &[(usize, char)]) -> Result<(TokenKind, usize), ConditionCause> {
    let start = chars[0].0;
    let mut i = 0;
    let mut is_float = false;

    let digits = |i: &mut usize| {
        while *i < chars.len() && chars[*i].1.is_ascii_digit() {
            *i += 1;
        }
    };

    digits(&mut i);
    if i < chars.len() && chars[i].1 == '.' {
        is_float = true;
        i += 1;
        digits(&mut i);
    }
    if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j].1 == '+' || chars[j].1 == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].1.is_ascii_digit() {
            is_float = true;
            i = j;
            digits(&mut i);
        }
    }

    let end = chars.get(i).map(|&(o, _)| o).unwrap_or(input.len());
    let text = &input[start..end];

    if !is_float {
        if let Ok(n) = text.parse::<i64>() {
            return Ok((TokenKind::Int(n), i));
        }
    }
    text.parse::<f64>()
        .map(|n| (TokenKind::Float(n), i))
        .map_err(|_| ConditionCause::syntax(start, format!("invalid number '{}'", text)))
}

fn lex_string(chars: &[(usize, char)]) -> Result<(String, usize), ConditionCause> {
    let (start, quote) = chars[0];
    let mut value = String::new();
    let mut i = 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((value, i + 1));
        }
        if c == '\\' {
            let Some(&(_, escaped)) = chars.get(i + 1) else {
                break;
            };
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                '\\' | '\'' | '"' => value.push(escaped),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
            i += 2;
            continue;
        }
        if c == '\n' {
            break;
        }
        value.push(c);
        i += 1;
    }

    Err(ConditionCause::syntax(start, "unterminated string literal"))
}
