//! Recursive-descent parser with precedence climbing. Grammar mirrors JS
//! expressions: ternary > logical > bitwise > (in)equality > relational >
//! shifts > additive > multiplicative > unary > member/call > primary.

use serde_json::Value;

use crate::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::error::ExprError;
use crate::token::{tokenize, Punct, Spanned, Token};

/// Parse an expression string into an AST. Malformed syntax fails here;
/// a successfully parsed expression can always be compiled and evaluated.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        input_len: input.len(),
    };
    let expr = parser.ternary()?;
    if let Some(t) = parser.peek() {
        return Err(ExprError::at(t.pos, "trailing input after expression"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self) -> Option<Punct> {
        match self.peek() {
            Some(Spanned {
                token: Token::Punct(p),
                ..
            }) => Some(*p),
            _ => None,
        }
    }

    fn bump(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, p: Punct) -> bool {
        if self.peek_punct() == Some(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: Punct, what: &str) -> Result<(), ExprError> {
        if self.eat(p) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn error_here(&self, message: String) -> ExprError {
        let pos = self.peek().map_or(self.input_len, |t| t.pos);
        ExprError::at(pos, message)
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let test = self.binary(1)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.ternary()?;
        self.expect(Punct::Colon, "':' in conditional")?;
        let alternate = self.ternary()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary(&mut self, min_prec: u8) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;

        while let Some(punct) = self.peek_punct() {
            let Some(prec) = binary_precedence(punct) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.binary(prec + 1)?;

            left = match punct {
                Punct::AndAnd => Expr::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Punct::OrOr => Expr::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                _ => Expr::Binary {
                    op: binary_op(punct).expect("precedence table covers operator"),
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek_punct() {
            Some(Punct::Not) => Some(UnaryOp::Not),
            Some(Punct::Minus) => Some(UnaryOp::Neg),
            Some(Punct::Plus) => Some(UnaryOp::Pos),
            Some(Punct::BitNot) => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(Punct::Dot) {
                let name = match self.bump() {
                    Some(Spanned {
                        token: Token::Identifier(name),
                        ..
                    }) => name,
                    _ => return Err(self.error_here("expected member name after '.'".into())),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(Expr::Literal(Value::String(name))),
                    computed: false,
                };
            } else if self.eat(Punct::LBracket) {
                let property = self.ternary()?;
                self.expect(Punct::RBracket, "']' after index")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                    computed: true,
                };
            } else if self.peek_punct() == Some(Punct::LParen) {
                // Only plain names are callable: the registry is static.
                let Expr::Identifier(callee) = expr else {
                    return Err(self.error_here("only named functions are callable".into()));
                };
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(Punct::RParen) {
                    loop {
                        args.push(self.ternary()?);
                        if self.eat(Punct::Comma) {
                            continue;
                        }
                        self.expect(Punct::RParen, "')' after arguments")?;
                        break;
                    }
                }
                expr = Expr::Call { callee, args };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.bump() {
            Some(Spanned {
                token: Token::Number(n),
                ..
            }) => Ok(Expr::Literal(number_value(n))),
            Some(Spanned {
                token: Token::Str(s),
                ..
            }) => Ok(Expr::Literal(Value::String(s))),
            Some(Spanned {
                token: Token::Identifier(name),
                ..
            }) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Identifier(name),
            }),
            Some(Spanned {
                token: Token::Punct(Punct::LParen),
                ..
            }) => {
                let expr = self.ternary()?;
                self.expect(Punct::RParen, "closing ')'")?;
                Ok(expr)
            }
            Some(Spanned {
                token: Token::Punct(Punct::LBracket),
                ..
            }) => {
                let mut items = Vec::new();
                if !self.eat(Punct::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat(Punct::Comma) {
                            continue;
                        }
                        self.expect(Punct::RBracket, "']' after array items")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Some(t) => Err(ExprError::at(t.pos, "unexpected token")),
            None => Err(ExprError::at(self.input_len, "unexpected end of input")),
        }
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn binary_precedence(p: Punct) -> Option<u8> {
    Some(match p {
        Punct::OrOr => 1,
        Punct::AndAnd => 2,
        Punct::BitOr => 3,
        Punct::BitXor => 4,
        Punct::BitAnd => 5,
        Punct::EqLoose
        | Punct::NeLoose
        | Punct::EqStrict
        | Punct::NeStrict
        | Punct::RegexMatch
        | Punct::GlobMatch => 6,
        Punct::Lt | Punct::Le | Punct::Gt | Punct::Ge => 7,
        Punct::Shl | Punct::Shr => 8,
        Punct::Plus | Punct::Minus => 9,
        Punct::Star | Punct::Slash | Punct::Percent => 10,
        _ => return None,
    })
}

fn binary_op(p: Punct) -> Option<BinaryOp> {
    Some(match p {
        Punct::Star => BinaryOp::Mul,
        Punct::Slash => BinaryOp::Div,
        Punct::Percent => BinaryOp::Rem,
        Punct::Plus => BinaryOp::Add,
        Punct::Minus => BinaryOp::Sub,
        Punct::Shl => BinaryOp::Shl,
        Punct::Shr => BinaryOp::Shr,
        Punct::Lt => BinaryOp::Lt,
        Punct::Le => BinaryOp::Le,
        Punct::Gt => BinaryOp::Gt,
        Punct::Ge => BinaryOp::Ge,
        Punct::EqLoose => BinaryOp::EqLoose,
        Punct::NeLoose => BinaryOp::NeLoose,
        Punct::EqStrict => BinaryOp::EqStrict,
        Punct::NeStrict => BinaryOp::NeStrict,
        Punct::BitAnd => BinaryOp::BitAnd,
        Punct::BitXor => BinaryOp::BitXor,
        Punct::BitOr => BinaryOp::BitOr,
        Punct::RegexMatch => BinaryOp::RegexMatch,
        Punct::GlobMatch => BinaryOp::GlobMatch,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_precedence() {
        // 1 + 2 * 3 groups as 1 + (2 * 3)
        let e = parse("1 + 2 * 3").unwrap();
        match e {
            Expr::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                *right,
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn parses_member_chains_and_calls() {
        let e = parse("includes(meta.tags, 'x') && meta['rev'] !== null").unwrap();
        assert!(matches!(e, Expr::Logical { .. }));
    }

    #[test]
    fn parses_ternary_and_array() {
        let e = parse("x > 0 ? [1, 2] : []").unwrap();
        assert!(matches!(e, Expr::Conditional { .. }));
    }

    #[test]
    fn literal_keywords() {
        assert_eq!(parse("null").unwrap(), Expr::Literal(json!(null)));
        assert_eq!(parse("true").unwrap(), Expr::Literal(json!(true)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("a &&").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("a.b(").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn member_call_is_rejected() {
        assert!(parse("a.b()").is_err());
    }
}
