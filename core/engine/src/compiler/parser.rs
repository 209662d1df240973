//! Recursive descent parser with precedence climbing for binary operators.

use std::rc::Rc;

use crate::{
    JsError, JsResult,
    compiler::{
        ast::{BinaryOp, Expr, FunctionNode, LogicalOp, Stmt, UnaryOp},
        lexer::{Keyword, Lexer, Token, TokenKind},
    },
};

/// Binding power of binary operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    Or,
    And,
    Equality,
    Relational,
    Additive,
    Multiplicative,
}

impl Precedence {
    const fn next(self) -> Self {
        match self {
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Relational,
            Self::Relational => Self::Additive,
            Self::Additive | Self::Multiplicative => Self::Multiplicative,
        }
    }
}

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix(kind: &TokenKind) -> Option<(Precedence, Infix)> {
    Some(match kind {
        TokenKind::OrOr => (Precedence::Or, Infix::Logical(LogicalOp::Or)),
        TokenKind::AndAnd => (Precedence::And, Infix::Logical(LogicalOp::And)),
        TokenKind::Eq => (Precedence::Equality, Infix::Binary(BinaryOp::Eq)),
        TokenKind::NotEq => (Precedence::Equality, Infix::Binary(BinaryOp::NotEq)),
        TokenKind::StrictEq => (Precedence::Equality, Infix::Binary(BinaryOp::StrictEq)),
        TokenKind::StrictNotEq => (Precedence::Equality, Infix::Binary(BinaryOp::StrictNotEq)),
        TokenKind::Less => (Precedence::Relational, Infix::Binary(BinaryOp::Less)),
        TokenKind::LessEq => (Precedence::Relational, Infix::Binary(BinaryOp::LessEq)),
        TokenKind::Greater => (Precedence::Relational, Infix::Binary(BinaryOp::Greater)),
        TokenKind::GreaterEq => (Precedence::Relational, Infix::Binary(BinaryOp::GreaterEq)),
        TokenKind::Plus => (Precedence::Additive, Infix::Binary(BinaryOp::Add)),
        TokenKind::Minus => (Precedence::Additive, Infix::Binary(BinaryOp::Sub)),
        TokenKind::Star => (Precedence::Multiplicative, Infix::Binary(BinaryOp::Mul)),
        TokenKind::Slash => (Precedence::Multiplicative, Infix::Binary(BinaryOp::Div)),
        TokenKind::Percent => (Precedence::Multiplicative, Infix::Binary(BinaryOp::Mod)),
        _ => return None,
    })
}

pub(crate) struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    previous_line: u32,
    function_depth: usize,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str, start_line: u32) -> JsResult<Self> {
        let mut lexer = Lexer::new(source, start_line);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            previous_line: start_line,
            function_depth: 0,
        })
    }

    /// Parses a whole program. Returns the statements and the last line of the source.
    pub(crate) fn parse_program(&mut self) -> JsResult<(Vec<Stmt>, u32)> {
        let mut body = Vec::new();
        while self.current.kind != TokenKind::Eof {
            body.push(self.parse_statement()?);
        }
        Ok((body, self.previous_line))
    }

    fn advance(&mut self) -> JsResult<Token> {
        let next = self.lexer.next_token()?;
        let token = std::mem::replace(&mut self.current, next);
        self.previous_line = token.line;
        Ok(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current.kind == TokenKind::Keyword(keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> JsResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> JsResult<Token> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.error(&format!("expected `{kind}`")))
        }
    }

    fn expect_identifier(&mut self) -> JsResult<Rc<str>> {
        if let TokenKind::Ident(name) = &self.current.kind {
            let name = name.clone();
            self.advance()?;
            Ok(name)
        } else {
            Err(self.error("expected an identifier"))
        }
    }

    /// Property names may be identifiers, keywords, strings or numbers.
    fn expect_property_name(&mut self) -> JsResult<Rc<str>> {
        let name: Rc<str> = match &self.current.kind {
            TokenKind::Ident(name) | TokenKind::String(name) => name.clone(),
            TokenKind::Keyword(keyword) => keyword.as_str().into(),
            TokenKind::Number(n) => crate::value::number_to_string(*n).into(),
            _ => return Err(self.error("expected a property name")),
        };
        self.advance()?;
        Ok(name)
    }

    fn error(&self, message: &str) -> JsError {
        JsError::syntax_error(format!(
            "line {}: unexpected `{}`: {message}",
            self.current.line, self.current.kind
        ))
    }

    fn consume_semicolon(&mut self) -> JsResult<()> {
        self.eat(&TokenKind::Semicolon)?;
        Ok(())
    }

    fn parse_statement(&mut self) -> JsResult<Stmt> {
        let line = self.current.line;
        match &self.current.kind {
            TokenKind::Semicolon => {
                self.advance()?;
                Ok(Stmt::Empty)
            }
            TokenKind::LBrace => {
                self.advance()?;
                let mut body = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    if self.check(&TokenKind::Eof) {
                        return Err(self.error("unterminated block"));
                    }
                    body.push(self.parse_statement()?);
                }
                self.advance()?;
                Ok(Stmt::Block(body))
            }
            TokenKind::Keyword(Keyword::Var) => {
                self.advance()?;
                let mut declarations = Vec::new();
                loop {
                    let name = self.expect_identifier()?;
                    let init = if self.eat(&TokenKind::Assign)? {
                        Some(self.parse_assignment()?)
                    } else {
                        None
                    };
                    declarations.push((name, init));
                    if !self.eat(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.consume_semicolon()?;
                Ok(Stmt::Var { declarations, line })
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance()?;
                let name = self.expect_identifier()?;
                let function = self.parse_function_rest(Some(name), line)?;
                Ok(Stmt::Function(Rc::new(function)))
            }
            TokenKind::Keyword(Keyword::Return) => {
                if self.function_depth == 0 {
                    return Err(self.error("return outside of a function"));
                }
                self.advance()?;
                let ends_statement = matches!(
                    self.current.kind,
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                ) || self.current.line != line;
                let value = if ends_statement {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return { value, line })
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance()?;
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let then = Box::new(self.parse_statement()?);
                let otherwise = if self.check_keyword(Keyword::Else) {
                    self.advance()?;
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    condition,
                    then,
                    otherwise,
                    line,
                })
            }
            TokenKind::Keyword(Keyword::While) => {
                self.advance()?;
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While {
                    condition,
                    body,
                    line,
                })
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance()?;
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw { value, line })
            }
            TokenKind::Keyword(Keyword::Debugger) => {
                self.advance()?;
                self.consume_semicolon()?;
                Ok(Stmt::Debugger { line })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expression { expr, line })
            }
        }
    }

    /// Parses `(params) { body }` after the `function` keyword and optional name.
    fn parse_function_rest(&mut self, name: Option<Rc<str>>, start_line: u32) -> JsResult<FunctionNode> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;

        self.function_depth += 1;
        let mut body = Vec::new();
        let result = loop {
            if self.check(&TokenKind::RBrace) {
                break Ok(());
            }
            if self.check(&TokenKind::Eof) {
                break Err(self.error("unterminated function body"));
            }
            match self.parse_statement() {
                Ok(stmt) => body.push(stmt),
                Err(err) => break Err(err),
            }
        };
        self.function_depth -= 1;
        result?;

        let end_line = self.expect(&TokenKind::RBrace)?.line;
        Ok(FunctionNode {
            name,
            params,
            body,
            start_line,
            end_line,
        })
    }

    pub(crate) fn parse_expression(&mut self) -> JsResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> JsResult<Expr> {
        let target = self.parse_binary(Precedence::Or)?;
        if !self.check(&TokenKind::Assign) {
            return Ok(target);
        }
        if !matches!(target, Expr::Identifier(_) | Expr::Member { .. }) {
            return Err(self.error("invalid assignment target"));
        }
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_binary(&mut self, min: Precedence) -> JsResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((precedence, op)) = infix(&self.current.kind) {
            if precedence < min {
                break;
            }
            self.advance()?;
            let rhs = self.parse_binary(precedence.next())?;
            lhs = match op {
                Infix::Binary(op) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
                Infix::Logical(op) => Expr::Logical(op, Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> JsResult<Expr> {
        let op = match self.current.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Keyword(Keyword::TypeOf) => UnaryOp::TypeOf,
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> JsResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot)? {
                let name = self.expect_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    name,
                };
            } else if self.eat(&TokenKind::LParen)? {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.eat(&TokenKind::Comma)? {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen)?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> JsResult<Expr> {
        let token = self.advance()?;
        Ok(match token.kind {
            TokenKind::Number(n) => Expr::Number(n),
            TokenKind::String(s) => Expr::String(s),
            TokenKind::Ident(name) => Expr::Identifier(name),
            TokenKind::Keyword(Keyword::This) => Expr::This,
            TokenKind::Keyword(Keyword::True) => Expr::Boolean(true),
            TokenKind::Keyword(Keyword::False) => Expr::Boolean(false),
            TokenKind::Keyword(Keyword::Null) => Expr::Null,
            TokenKind::Keyword(Keyword::Undefined) => Expr::Undefined,
            TokenKind::Keyword(Keyword::Function) => {
                let name = match &self.current.kind {
                    TokenKind::Ident(name) => {
                        let name = name.clone();
                        self.advance()?;
                        Some(name)
                    }
                    _ => None,
                };
                Expr::Function(Rc::new(self.parse_function_rest(name, token.line)?))
            }
            TokenKind::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                expr
            }
            TokenKind::LBrace => {
                let mut properties = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.expect_property_name()?;
                    self.expect(&TokenKind::Colon)?;
                    let value = self.parse_assignment()?;
                    properties.push((key, value));
                    if !self.eat(&TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                Expr::Object(properties)
            }
            kind => {
                return Err(JsError::syntax_error(format!(
                    "line {}: unexpected `{kind}`",
                    token.line
                )));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> JsResult<Vec<Stmt>> {
        Parser::new(source, 1)?.parse_program().map(|(body, _)| body)
    }

    fn expression(source: &str) -> Expr {
        match parse(source).expect("parse failed").remove(0) {
            Stmt::Expression { expr, .. } => expr,
            other => panic!("not an expression statement: {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(
            expression("1 + 2 * 3"),
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0))
                ))
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            expression("5 - 2 - 1"),
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(
                    BinaryOp::Sub,
                    Box::new(Expr::Number(5.0)),
                    Box::new(Expr::Number(2.0))
                )),
                Box::new(Expr::Number(1.0))
            )
        );
    }

    #[test]
    fn keywords_are_valid_property_names() {
        assert_eq!(
            expression("({ return: 42 })"),
            Expr::Object(vec![("return".into(), Expr::Number(42.0))])
        );
    }

    #[test]
    fn top_level_return_is_rejected() {
        assert!(parse("return 1;").is_err());
        assert!(parse("function f() { return 1; }").is_ok());
    }

    #[test]
    fn function_nodes_record_their_lines() {
        let body = parse("\nfunction f(a, b) {\n  return a;\n}\n").expect("parse failed");
        let Stmt::Function(f) = &body[0] else {
            panic!("expected a function declaration");
        };
        assert_eq!((f.start_line, f.end_line), (2, 4));
        assert_eq!(f.params, vec![Rc::<str>::from("a"), Rc::from("b")]);
    }

    #[test]
    fn assignment_requires_a_reference() {
        assert!(parse("1 = 2;").is_err());
        assert!(parse("a.b = 2;").is_ok());
    }
}
