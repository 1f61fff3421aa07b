//! Recursive-descent parser for condition expressions
//!
//! Precedence, lowest first:
//! `or`, `and`, `not`, comparisons, `+ -`, `* / // %`, unary `- +`, `**`,
//! then subscripts, attributes and calls on an atom.

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
use super::error::{ConditionCause, ConditionError};
use super::lexer::{tokenize, Token, TokenKind};

/// Deepest nesting the parser accepts before giving up
pub const MAX_DEPTH: usize = 64;

/// Longest expression text accepted, in bytes
pub const MAX_LENGTH: usize = 4096;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expr, ConditionError> {
    parse_expr(input).map_err(|cause| cause.with_expression(input))
}

fn parse_expr(input: &str) -> Result<Expr, ConditionCause> {
    if input.len() > MAX_LENGTH {
        return Err(ConditionCause::syntax(
            MAX_LENGTH,
            format!("expression longer than {} bytes", MAX_LENGTH),
        ));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ConditionCause::syntax(
            trailing.offset,
            format!("unexpected {}", describe(&trailing.kind)),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if is_keyword(&self.peek().kind, word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ConditionCause> {
        if self.eat(&kind) {
            return Ok(());
        }
        let token = self.peek();
        Err(ConditionCause::syntax(
            token.offset,
            format!("expected {}, found {}", what, describe(&token.kind)),
        ))
    }

    fn enter(&mut self) -> Result<(), ConditionCause> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionCause::syntax(
                self.peek().offset,
                format!("expression nests deeper than {} levels", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr, ConditionCause> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> Result<Expr, ConditionCause> {
        let first = self.and_expr()?;
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.and_expr()?);
        }
        Ok(fold_bool(BoolOp::Or, values))
    }

    fn and_expr(&mut self) -> Result<Expr, ConditionCause> {
        let first = self.not_expr()?;
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.not_expr()?);
        }
        Ok(fold_bool(BoolOp::And, values))
    }

    fn not_expr(&mut self) -> Result<Expr, ConditionCause> {
        if self.eat_keyword("not") {
            self.enter()?;
            let operand = self.not_expr();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ConditionCause> {
        let left = self.sum()?;
        let mut rest = Vec::new();
        while let Some(op) = self.compare_op() {
            rest.push((op, self.sum()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let kind = self.peek().kind.clone();
        let op = match kind {
            TokenKind::EqEq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Lte => CompareOp::Lte,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Gte => CompareOp::Gte,
            ref k if is_keyword(k, "in") => CompareOp::In,
            ref k if is_keyword(k, "is") => {
                self.advance();
                return Some(if self.eat_keyword("not") {
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                });
            }
            ref k if is_keyword(k, "not") && is_keyword(self.peek_at(1), "in") => {
                self.advance();
                self.advance();
                return Some(CompareOp::NotIn);
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn sum(&mut self) -> Result<Expr, ConditionCause> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ConditionCause> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ConditionCause> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn power(&mut self) -> Result<Expr, ConditionCause> {
        let base = self.postfix()?;
        if self.eat(&TokenKind::DoubleStar) {
            self.enter()?;
            let exponent = self.unary();
            self.leave();
            return Ok(binary(BinaryOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ConditionCause> {
        let mut expr = self.atom()?;
        loop {
            if self.eat(&TokenKind::LBracket) {
                let key = self.expression()?;
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Subscript {
                    target: Box::new(expr),
                    key: Box::new(key),
                };
            } else if self.eat(&TokenKind::Dot) {
                let token = self.advance();
                let attr = match token.kind {
                    TokenKind::Ident(attr) => attr,
                    other => {
                        return Err(ConditionCause::syntax(
                            token.offset,
                            format!("expected attribute name, found {}", describe(&other)),
                        ))
                    }
                };
                expr = Expr::Attribute {
                    target: Box::new(expr),
                    attr,
                };
            } else if self.eat(&TokenKind::LParen) {
                let args = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ConditionCause> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::Comma) {
                if self.eat(&TokenKind::RParen) {
                    return Ok(args);
                }
                continue;
            }
            self.expect(TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn atom(&mut self) -> Result<Expr, ConditionCause> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(n) => Ok(Expr::Literal(Literal::Int(n))),
            TokenKind::Float(n) => Ok(Expr::Literal(Literal::Float(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => match name.as_str() {
                "True" => Ok(Expr::Literal(Literal::Boolean(true))),
                "False" => Ok(Expr::Literal(Literal::Boolean(false))),
                "None" => Ok(Expr::Literal(Literal::Null)),
                "and" | "or" | "not" | "in" | "is" => Err(ConditionCause::syntax(
                    token.offset,
                    format!("unexpected keyword '{}'", name),
                )),
                _ => Ok(Expr::Name(name)),
            },
            other => Err(ConditionCause::syntax(
                token.offset,
                format!("unexpected {}", describe(&other)),
            )),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn fold_bool(op: BoolOp, mut values: Vec<Expr>) -> Expr {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Expr::Bool { op, values }
    }
}

fn is_keyword(kind: &TokenKind, word: &str) -> bool {
    matches!(kind, TokenKind::Ident(name) if name == word)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Int(n) => format!("number {}", n),
        TokenKind::Float(n) => format!("number {}", n),
        TokenKind::Str(s) => format!("string '{}'", s),
        TokenKind::Ident(name) => format!("'{}'", name),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::DoubleStar => "'**'".to_string(),
        TokenKind::Slash => "'/'".to_string(),
        TokenKind::DoubleSlash => "'//'".to_string(),
        TokenKind::Percent => "'%'".to_string(),
        TokenKind::EqEq => "'=='".to_string(),
        TokenKind::NotEq => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::Lte => "'<='".to_string(),
        TokenKind::Gt => "'>'".to_string(),
        TokenKind::Gte => "'>='".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }

    fn string(s: &str) -> Expr {
        Expr::Literal(Literal::String(s.to_string()))
    }

    fn subscript(key: &str) -> Expr {
        Expr::Subscript {
            target: Box::new(name("state")),
            key: Box::new(string(key)),
        }
    }

    #[test]
    fn test_parse_subscript_comparison() {
        let expr = parse("state['x'] > 5").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                left: Box::new(subscript("x")),
                rest: vec![(CompareOp::Gt, int(5))],
            }
        );
    }

    #[test]
    fn test_parse_get_call() {
        let expr = parse("state.get('i', 0)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                func: Box::new(Expr::Attribute {
                    target: Box::new(name("state")),
                    attr: "get".to_string(),
                }),
                args: vec![string("i"), int(0)],
            }
        );
    }

    #[test]
    fn test_parse_chained_comparison() {
        let expr = parse("1 < state['x'] <= 10").unwrap();
        match expr {
            Expr::Compare { left, rest } => {
                assert_eq!(*left, int(1));
                assert_eq!(rest.len(), 2);
                assert_eq!(rest[0].0, CompareOp::Lt);
                assert_eq!(rest[1].0, CompareOp::Lte);
            }
            other => panic!("Expected Compare, got {:?}", other),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a or b and c").unwrap();
        assert_eq!(
            expr,
            Expr::Bool {
                op: BoolOp::Or,
                values: vec![
                    name("a"),
                    Expr::Bool {
                        op: BoolOp::And,
                        values: vec![name("b"), name("c")],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_bool_chains_are_flattened() {
        match parse("a and b and c").unwrap() {
            Expr::Bool { op, values } => {
                assert_eq!(op, BoolOp::And);
                assert_eq!(values.len(), 3);
            }
            other => panic!("Expected Bool, got {:?}", other),
        }
    }

    #[test]
    fn test_not_is_looser_than_comparison() {
        let expr = parse("not a == b").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Compare {
                    left: Box::new(name("a")),
                    rest: vec![(CompareOp::Eq, name("b"))],
                }),
            }
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        // 1 + 2 * 3 == 1 + (2 * 3)
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            binary(BinaryOp::Add, int(1), binary(BinaryOp::Mul, int(2), int(3)))
        );
    }

    #[test]
    fn test_power_is_right_associative_and_beats_unary_minus() {
        let expr = parse("-2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(binary(
                    BinaryOp::Pow,
                    int(2),
                    binary(BinaryOp::Pow, int(3), int(2))
                )),
            }
        );
    }

    #[test]
    fn test_power_accepts_signed_exponent() {
        let expr = parse("2 ** -1").unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Pow,
                int(2),
                Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(int(1)),
                }
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = parse("(1 + 2) * 3").unwrap();
        assert_eq!(
            expr,
            binary(BinaryOp::Mul, binary(BinaryOp::Add, int(1), int(2)), int(3))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("True").unwrap(), Expr::Literal(Literal::Boolean(true)));
        assert_eq!(parse("False").unwrap(), Expr::Literal(Literal::Boolean(false)));
        assert_eq!(parse("None").unwrap(), Expr::Literal(Literal::Null));
        assert_eq!(parse("true").unwrap(), Expr::Name("true".to_string()));
        assert_eq!(parse("null").unwrap(), Expr::Name("null".to_string()));
        assert_eq!(parse(r#""hi""#).unwrap(), string("hi"));
    }

    #[test]
    fn test_disallowed_operators_still_parse() {
        assert!(matches!(
            parse("1 // 2").unwrap(),
            Expr::Binary { op: BinaryOp::FloorDiv, .. }
        ));
        for (src, op) in [
            ("'a' in state", CompareOp::In),
            ("'a' not in state", CompareOp::NotIn),
            ("state is None", CompareOp::Is),
            ("state is not None", CompareOp::IsNot),
        ] {
            match parse(src).unwrap() {
                Expr::Compare { rest, .. } => assert_eq!(rest[0].0, op),
                other => panic!("Expected Compare for {}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_parse_errors() {
        for src in [
            "",
            "state[",
            "state['x'] >",
            "(1 + 2",
            "state.get('a',",
            "state.",
            "1 2",
            "and x",
            "state.get(key='a')",
            "x if y else z",
            "lambda: 1",
        ] {
            assert!(parse(src).is_err(), "expected parse error for {:?}", src);
        }
    }

    #[test]
    fn test_error_carries_expression_and_offset() {
        let err = parse("state['x'] >").unwrap_err();
        assert_eq!(err.expression, "state['x'] >");
        assert_eq!(
            err.cause,
            ConditionCause::syntax(12, "unexpected end of input")
        );
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("nests deeper"));

        let ok = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_overlong_input_is_rejected() {
        let long = format!("state.get('{}')", "k".repeat(MAX_LENGTH));
        let err = parse(&long).unwrap_err();
        assert!(err.to_string().contains("longer than"));
    }

    #[test]
    fn test_deep_unary_is_rejected() {
        let deep = format!("{}1", "not ".repeat(500));
        assert!(parse(&deep).is_err());
    }
}
