//! Recursive-descent parser: tokens → AST.
//!
//! Precedence, loosest to tightest:
//! assignment (right-assoc) → array literal → type test (`is`/`from`)
//! → logical OR → logical AND → comparison → additive → multiplicative
//! → unary → postfix chain → `this` → primary.

use crate::ast::*;
use crate::lexer::{Literal, Token, TokenKind};
use glint_core::TypeTag;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

type PResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> PResult<Program> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.statement()?);
        }
        Ok(Program { statements })
    }

    // ----- token plumbing -----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous().clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_one(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&format!(
                "expected {:?} {}, found '{}'",
                kind,
                context,
                self.peek().lexeme
            )))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            line: self.peek().line,
        }
    }

    // ----- statements -----

    fn statement(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        if self.match_one(TokenKind::Cl) {
            return self.var_decl(line);
        }
        if self.check(TokenKind::LBrace) {
            return Ok(Stmt::new(StmtKind::Block(self.block()?), line));
        }
        if self.match_one(TokenKind::If) {
            return self.if_stmt(line);
        }
        if self.match_one(TokenKind::While) {
            return self.while_stmt(line);
        }
        if self.match_one(TokenKind::Break) {
            self.consume(TokenKind::Semicolon, "after 'break'")?;
            return Ok(Stmt::new(StmtKind::Break, line));
        }
        if self.match_one(TokenKind::Continue) {
            self.consume(TokenKind::Semicolon, "after 'continue'")?;
            return Ok(Stmt::new(StmtKind::Continue, line));
        }
        if self.match_one(TokenKind::Proc) {
            return self.fn_decl(line);
        }
        if self.match_one(TokenKind::Klass) {
            return self.class_decl(line);
        }
        if self.match_one(TokenKind::Print) {
            let value = self.expression()?;
            self.consume(TokenKind::Semicolon, "after 'print' expression")?;
            return Ok(Stmt::new(StmtKind::Print(value), line));
        }
        if self.match_one(TokenKind::Ret) {
            let value = if self.check(TokenKind::Semicolon) {
                None
            } else {
                Some(self.expression()?)
            };
            self.consume(TokenKind::Semicolon, "after 'ret'")?;
            return Ok(Stmt::new(StmtKind::Return(value), line));
        }
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "after expression")?;
        Ok(Stmt::new(StmtKind::ExprStmt(expr), line))
    }

    fn var_decl(&mut self, line: u32) -> PResult<Stmt> {
        let name = self.identifier_name("after 'cl'")?;
        let init = if self.match_one(TokenKind::Eq) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "after variable declaration")?;
        Ok(Stmt::new(StmtKind::VarDecl { name, init }, line))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.consume(TokenKind::LBrace, "to start a block")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }
        self.consume(TokenKind::RBrace, "to close a block")?;
        Ok(statements)
    }

    fn if_stmt(&mut self, line: u32) -> PResult<Stmt> {
        let mut branches = Vec::new();
        self.consume(TokenKind::LParen, "after 'if'")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RParen, "after 'if' condition")?;
        branches.push((cond, self.block()?));

        while self.match_one(TokenKind::Elif) {
            self.consume(TokenKind::LParen, "after 'elif'")?;
            let cond = self.expression()?;
            self.consume(TokenKind::RParen, "after 'elif' condition")?;
            branches.push((cond, self.block()?));
        }

        let else_branch = if self.match_one(TokenKind::Else) {
            Some(self.block()?)
        } else {
            None
        };

        Ok(Stmt::new(
            StmtKind::If {
                branches,
                else_branch,
            },
            line,
        ))
    }

    fn while_stmt(&mut self, line: u32) -> PResult<Stmt> {
        self.consume(TokenKind::LParen, "after 'while'")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RParen, "after 'while' condition")?;
        let body = self.block()?;
        Ok(Stmt::new(StmtKind::While { cond, body }, line))
    }

    fn fn_decl(&mut self, line: u32) -> PResult<Stmt> {
        let name = self.identifier_name("for procedure name")?;
        let params = self.param_list()?;
        let body = self.block()?;
        Ok(Stmt::new(
            StmtKind::FnDecl {
                name,
                params,
                body,
            },
            line,
        ))
    }

    fn param_list(&mut self) -> PResult<Vec<Rc<str>>> {
        self.consume(TokenKind::LParen, "to start parameter list")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.identifier_name("for parameter name")?);
                if !self.match_one(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "to close parameter list")?;
        Ok(params)
    }

    fn class_decl(&mut self, line: u32) -> PResult<Stmt> {
        let name = self.identifier_name("for class name")?;
        self.consume(TokenKind::LBrace, "to start class body")?;

        let mut ctor = None;
        let mut methods = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if self.match_one(TokenKind::Init) {
                if ctor.is_some() {
                    return Err(self.error("class may declare at most one 'init'"));
                }
                let params = self.param_list()?;
                let body = self.block()?;
                ctor = Some((params, body));
            } else {
                self.consume(TokenKind::Proc, "to start a method")?;
                let method_name = self.identifier_name("for method name")?;
                let params = self.param_list()?;
                let body = self.block()?;
                methods.push((method_name, params, body));
            }
        }
        self.consume(TokenKind::RBrace, "to close class body")?;

        Ok(Stmt::new(
            StmtKind::ClassDecl {
                name,
                ctor,
                methods,
            },
            line,
        ))
    }

    fn identifier_name(&mut self, context: &str) -> PResult<Rc<str>> {
        let token = self.consume(TokenKind::Identifier, context)?;
        Ok(Rc::from(token.lexeme.as_ref()))
    }

    // ----- expressions -----

    pub fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let target = self.array_literal()?;
        if self.match_one(TokenKind::Eq) {
            let value = self.assignment()?;
            return Ok(Expr::new(
                ExprKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
                line,
            ));
        }
        Ok(target)
    }

    fn array_literal(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        if !self.check(TokenKind::LBracket) {
            return self.type_test();
        }
        self.advance();
        let mut items = Vec::new();
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.expression()?);
                if !self.match_one(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RBracket, "to close array literal")?;
        let length = if self.match_one(TokenKind::Colon) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Array { items, length }, line))
    }

    fn type_test(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.logical_or()?;
        loop {
            if self.match_one(TokenKind::Is) {
                let tag = self.type_tag()?;
                expr = Expr::new(
                    ExprKind::IsTest {
                        value: Box::new(expr),
                        tag,
                    },
                    line,
                );
            } else if self.match_one(TokenKind::From) {
                let class_name = self.identifier_name("after 'from'")?;
                expr = Expr::new(
                    ExprKind::FromTest {
                        value: Box::new(expr),
                        class_name,
                    },
                    line,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn type_tag(&mut self) -> PResult<TypeTag> {
        let token = self.advance();
        Ok(match token.kind {
            TokenKind::Nil => TypeTag::Nil,
            TokenKind::Bool => TypeTag::Bool,
            TokenKind::IntKw => TypeTag::Int,
            TokenKind::StrKw => TypeTag::Str,
            TokenKind::Arr => TypeTag::Arr,
            TokenKind::Proc => TypeTag::Callable,
            TokenKind::Klass => TypeTag::Class,
            TokenKind::Instance => TypeTag::Instance,
            _ => {
                return Err(ParseError {
                    message: format!(
                        "expected a type name after 'is', found '{}'",
                        token.lexeme
                    ),
                    line: token.line,
                });
            }
        })
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.logical_and()?;
        while self.match_one(TokenKind::OrOr) {
            let right = self.logical_and()?;
            expr = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.comparison()?;
        while self.match_one(TokenKind::AndAnd) {
            let right = self.comparison()?;
            expr = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.additive()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn additive(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
                line,
            );
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        if self.match_one(TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        if self.match_one(TokenKind::Bang) {
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let mut expr = self.this_or_primary()?;
        loop {
            if self.match_one(TokenKind::LBracket) {
                let index = self.expression()?;
                self.consume(TokenKind::RBracket, "to close index expression")?;
                expr = Expr::new(
                    ExprKind::Index {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else if self.match_one(TokenKind::Dot) {
                let name = self.identifier_name("after '.'")?;
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    line,
                );
            } else if self.match_one(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.match_one(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RParen, "to close call arguments")?;
                expr = Expr::new(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn this_or_primary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        if self.match_one(TokenKind::This) {
            let member = if self.match_one(TokenKind::Dot) {
                Some(self.identifier_name("after 'this.'")?)
            } else {
                None
            };
            return Ok(Expr::new(ExprKind::This(member), line));
        }
        self.primary()
    }

    fn primary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        if self.match_one(TokenKind::Nil) {
            return Ok(Expr::new(ExprKind::Nil, line));
        }
        if self.check(TokenKind::True) || self.check(TokenKind::False) {
            let token = self.advance();
            let value = matches!(token.literal, Literal::Bool(true));
            return Ok(Expr::new(ExprKind::Bool(value), line));
        }
        if self.check(TokenKind::Int) {
            let token = self.advance();
            let Literal::Int(value) = token.literal else {
                unreachable!("lexer always attaches Literal::Int to Int tokens")
            };
            return Ok(Expr::new(ExprKind::Int(value), line));
        }
        if self.check(TokenKind::Str) {
            let token = self.advance();
            let Literal::Str(value) = token.literal else {
                unreachable!("lexer always attaches Literal::Str to Str tokens")
            };
            return Ok(Expr::new(ExprKind::Str(value), line));
        }
        if self.check(TokenKind::Identifier) {
            let token = self.advance();
            return Ok(Expr::new(
                ExprKind::Identifier(Rc::from(token.lexeme.as_ref())),
                line,
            ));
        }
        if self.match_one(TokenKind::LParen) {
            let inner = self.expression()?;
            self.consume(TokenKind::RParen, "to close grouped expression")?;
            return Ok(Expr::new(ExprKind::Group(Box::new(inner)), line));
        }
        Err(self.error(&format!(
            "unexpected token '{}' in expression",
            self.peek().lexeme
        )))
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Program {
        parse(tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_var_decl_and_print() {
        let program = parse_src("cl x = 10; print x;");
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(
            program.statements[0].kind,
            StmtKind::VarDecl { .. }
        ));
        assert!(matches!(program.statements[1].kind, StmtKind::Print(_)));
    }

    #[test]
    fn parses_if_elif_else_as_flat_cascade() {
        let program = parse_src("if (true) { } elif (false) { } else { }");
        match &program.statements[0].kind {
            StmtKind::If {
                branches,
                else_branch,
            } => {
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            _ => panic!("expected if statement"),
        }
    }

    #[test]
    fn parses_array_literal_with_length() {
        let program = parse_src("cl a = []:5;");
        match &program.statements[0].kind {
            StmtKind::VarDecl { init: Some(e), .. } => match &e.kind {
                ExprKind::Array { items, length } => {
                    assert!(items.is_empty());
                    assert!(length.is_some());
                }
                _ => panic!("expected array literal"),
            },
            _ => panic!("expected var decl"),
        }
    }

    #[test]
    fn assignment_is_right_associative_and_lowest_precedence() {
        let program = parse_src("a = b = 1 + 2;");
        match &program.statements[0].kind {
            StmtKind::ExprStmt(e) => match &e.kind {
                ExprKind::Assign { value, .. } => {
                    assert!(matches!(value.kind, ExprKind::Assign { .. }));
                }
                _ => panic!("expected assignment"),
            },
            _ => panic!("expected expr stmt"),
        }
    }

    #[test]
    fn unexpected_token_is_parse_error() {
        let tokens = tokenize("cl = 5;").unwrap();
        assert!(parse(tokens).is_err());
    }
}
