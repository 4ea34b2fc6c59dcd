//! Hand-rolled lexer for the JS-expression-like filter grammar.

use crate::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Identifier(String),
    Punct(Punct),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Not,
    BitNot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    EqLoose,
    NeLoose,
    EqStrict,
    NeStrict,
    BitAnd,
    BitXor,
    BitOr,
    AndAnd,
    OrOr,
    RegexMatch,
    GlobMatch,
}

/// A token plus the byte offset it started at, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let c = bytes[i] as char;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && peek_digit(bytes, i + 1)) {
            let (num, len) = lex_number(&input[i..], start)?;
            tokens.push(Spanned {
                token: Token::Number(num),
                pos: start,
            });
            i += len;
            continue;
        }

        if c == '"' || c == '\'' {
            let (s, len) = lex_string(&input[i..], start)?;
            tokens.push(Spanned {
                token: Token::Str(s),
                pos: start,
            });
            i += len;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let mut j = i + 1;
            while j < bytes.len() {
                let d = bytes[j] as char;
                if d.is_ascii_alphanumeric() || d == '_' || d == '$' {
                    j += 1;
                } else {
                    break;
                }
            }
            tokens.push(Spanned {
                token: Token::Identifier(input[i..j].to_string()),
                pos: start,
            });
            i = j;
            continue;
        }

        let (punct, len) = lex_punct(&input[i..])
            .ok_or_else(|| ExprError::at(start, format!("unexpected character '{c}'")))?;
        tokens.push(Spanned {
            token: Token::Punct(punct),
            pos: start,
        });
        i += len;
    }

    Ok(tokens)
}

fn peek_digit(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|b| (*b as char).is_ascii_digit())
}

fn lex_number(rest: &str, start: usize) -> Result<(f64, usize), ExprError> {
    let mut len = 0;
    let bytes = rest.as_bytes();
    let mut seen_dot = false;
    let mut seen_exp = false;

    while len < bytes.len() {
        let c = bytes[len] as char;
        match c {
            '0'..='9' => len += 1,
            '.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                len += 1;
            }
            'e' | 'E' if !seen_exp => {
                seen_exp = true;
                len += 1;
                if len < bytes.len() && (bytes[len] == b'+' || bytes[len] == b'-') {
                    len += 1;
                }
            }
            _ => break,
        }
    }

    rest[..len]
        .parse::<f64>()
        .map(|n| (n, len))
        .map_err(|_| ExprError::at(start, format!("malformed number '{}'", &rest[..len])))
}

fn lex_string(rest: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = rest.char_indices();
    let (_, quote) = chars.next().expect("caller checked");
    let mut out = String::new();

    while let Some((idx, c)) = chars.next() {
        if c == quote {
            return Ok((out, idx + c.len_utf8()));
        }
        if c == '\\' {
            match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, e)) => out.push(e),
                None => break,
            }
        } else {
            out.push(c);
        }
    }

    Err(ExprError::at(start, "unterminated string literal"))
}

fn lex_punct(rest: &str) -> Option<(Punct, usize)> {
    // Longest match first.
    const TABLE: &[(&str, Punct)] = &[
        ("===", Punct::EqStrict),
        ("!==", Punct::NeStrict),
        ("==", Punct::EqLoose),
        ("!=", Punct::NeLoose),
        ("<=", Punct::Le),
        (">=", Punct::Ge),
        ("<<", Punct::Shl),
        (">>", Punct::Shr),
        ("&&", Punct::AndAnd),
        ("||", Punct::OrOr),
        ("=~", Punct::RegexMatch),
        ("=*", Punct::GlobMatch),
        ("(", Punct::LParen),
        (")", Punct::RParen),
        ("[", Punct::LBracket),
        ("]", Punct::RBracket),
        (",", Punct::Comma),
        (".", Punct::Dot),
        ("?", Punct::Question),
        (":", Punct::Colon),
        ("!", Punct::Not),
        ("~", Punct::BitNot),
        ("+", Punct::Plus),
        ("-", Punct::Minus),
        ("*", Punct::Star),
        ("/", Punct::Slash),
        ("%", Punct::Percent),
        ("<", Punct::Lt),
        (">", Punct::Gt),
        ("&", Punct::BitAnd),
        ("^", Punct::BitXor),
        ("|", Punct::BitOr),
    ];

    TABLE
        .iter()
        .find(|(text, _)| rest.starts_with(text))
        .map(|&(text, punct)| (punct, text.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_numbers_strings_idents() {
        assert_eq!(
            kinds(r#"x.name == 'a' && cost >= 1.5e2"#),
            vec![
                Token::Identifier("x".into()),
                Token::Punct(Punct::Dot),
                Token::Identifier("name".into()),
                Token::Punct(Punct::EqLoose),
                Token::Str("a".into()),
                Token::Punct(Punct::AndAnd),
                Token::Identifier("cost".into()),
                Token::Punct(Punct::Ge),
                Token::Number(150.0),
            ]
        );
    }

    #[test]
    fn longest_match_wins() {
        assert_eq!(
            kinds("a === b =~ c =* d"),
            vec![
                Token::Identifier("a".into()),
                Token::Punct(Punct::EqStrict),
                Token::Identifier("b".into()),
                Token::Punct(Punct::RegexMatch),
                Token::Identifier("c".into()),
                Token::Punct(Punct::GlobMatch),
                Token::Identifier("d".into()),
            ]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize("'oops").is_err());
    }
}
