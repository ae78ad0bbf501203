//! Lexer and recursive-descent parser for rule scripts.
//!
//! The grammar is ordinary infix arithmetic with assignment statements:
//!
//! ```text
//! script    := { statement ( ";" | newline ) }
//! statement := expr [ assign_op expr ]
//! expr      := term { ("+" | "-") term }
//! term      := unary { ("*" | "/" | "%") unary }
//! unary     := ("+" | "-" | "!" | "~") unary | postfix
//! postfix   := primary { "(" [ expr { "," expr } ] ")" }
//! primary   := number | identifier | "(" expr ")"
//! ```
//!
//! Newlines end a statement, except inside parentheses or directly after
//! an operator. `//` and `/* */` comments are skipped.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ast::{AssignOp, BinaryOp, Statement, Syntax, UnaryOp};
use crate::error::{ScriptError, ScriptResult};

/// Deepest expression tree the parser accepts, counting every operator,
/// group and call on the path from the root to a leaf.
pub const MAX_PARSE_DEPTH: usize = 128;

/// An expression together with the height of its tree.
type Parsed = (Syntax, usize);

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Number(Decimal),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Tilde,
    LParen,
    RParen,
    Comma,
    Assign(AssignOp),
    Semicolon,
    Newline,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
            TokenKind::Number(value) => write!(f, "number `{}`", value),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::Slash => write!(f, "`/`"),
            TokenKind::Percent => write!(f, "`%`"),
            TokenKind::Bang => write!(f, "`!`"),
            TokenKind::Tilde => write!(f, "`~`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Assign(AssignOp::Simple) => write!(f, "`=`"),
            TokenKind::Assign(AssignOp::Compound(op)) => write!(f, "`{}=`", op.symbol()),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Eof => write!(f, "end of script"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    paren_depth: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            paren_depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ScriptError {
        ScriptError::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    fn tokenize(mut self) -> ScriptResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (offset, line, column) = (self.pos, self.line, self.column);
            let Some(c) = self.bump() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    offset,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '\n' => TokenKind::Newline,
                '+' | '-' | '*' | '/' | '%' => {
                    let op = match c {
                        '+' => BinaryOp::Add,
                        '-' => BinaryOp::Sub,
                        '*' => BinaryOp::Mul,
                        '/' => BinaryOp::Div,
                        _ => BinaryOp::Rem,
                    };
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::Assign(AssignOp::Compound(op))
                    } else {
                        match op {
                            BinaryOp::Add => TokenKind::Plus,
                            BinaryOp::Sub => TokenKind::Minus,
                            BinaryOp::Mul => TokenKind::Star,
                            BinaryOp::Div => TokenKind::Slash,
                            BinaryOp::Rem => TokenKind::Percent,
                        }
                    }
                }
                '!' => TokenKind::Bang,
                '~' => TokenKind::Tilde,
                '(' => {
                    self.paren_depth += 1;
                    TokenKind::LParen
                }
                ')' => {
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                    TokenKind::RParen
                }
                ',' => TokenKind::Comma,
                '=' => TokenKind::Assign(AssignOp::Simple),
                ';' => TokenKind::Semicolon,
                c if c.is_ascii_digit() => self.number(offset, line, column)?,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                        self.bump();
                    }
                    TokenKind::Ident(self.source[offset..self.pos].to_string())
                }
                other => {
                    return Err(self.error(line, column, format!("unexpected character {:?}", other)))
                }
            };
            tokens.push(Token {
                kind,
                offset,
                line,
                column,
            });
        }
    }

    fn number(&mut self, start: usize, line: usize, column: usize) -> ScriptResult<TokenKind> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.source[start..self.pos];
        Decimal::from_str(text)
            .map(TokenKind::Number)
            .map_err(|e| self.error(line, column, format!("invalid number `{}`: {}", text, e)))
    }

    /// Skip whitespace and comments. Newlines are kept as tokens unless
    /// they appear inside parentheses.
    fn skip_trivia(&mut self) -> ScriptResult<()> {
        loop {
            match self.peek() {
                Some('\n') if self.paren_depth > 0 => {
                    self.bump();
                }
                Some(c) if c.is_whitespace() && c != '\n' => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error(line, column, "unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ScriptError {
        ScriptError::Parse {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn script(&mut self) -> ScriptResult<Vec<Statement<Syntax>>> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon) {
                self.advance();
            }
            if self.peek().kind == TokenKind::Eof {
                return Ok(statements);
            }
            statements.push(self.statement()?);
            let next = self.peek().clone();
            match &next.kind {
                TokenKind::Semicolon | TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Eof => {}
                other => {
                    return Err(self.error_at(&next, format!("expected `;` or end of line, found {}", other)))
                }
            }
        }
    }

    fn statement(&mut self) -> ScriptResult<Statement<Syntax>> {
        let (target, _) = self.expr()?;
        if let TokenKind::Assign(op) = self.peek().kind {
            self.advance();
            self.skip_newlines();
            let offset = self.peek().offset;
            let (value, _) = self.expr()?;
            return Ok(Statement::Assign {
                target,
                op,
                value,
                offset,
            });
        }
        Ok(Statement::Expression(target))
    }

    fn expr(&mut self) -> ScriptResult<Parsed> {
        let (mut left, mut height) = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok((left, height)),
            };
            let token = self.advance();
            self.skip_newlines();
            let (right, right_height) = self.term()?;
            height = self.nest(&token, height.max(right_height))?;
            left = Syntax::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> ScriptResult<Parsed> {
        let (mut left, mut height) = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok((left, height)),
            };
            let token = self.advance();
            self.skip_newlines();
            let (right, right_height) = self.unary()?;
            height = self.nest(&token, height.max(right_height))?;
            left = Syntax::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> ScriptResult<Parsed> {
        let op = match self.peek().kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::Complement,
            _ => return self.postfix(),
        };
        let token = self.advance();
        self.skip_newlines();
        self.enter(&token)?;
        let operand = self.unary();
        self.depth -= 1;
        let (operand, height) = operand?;
        Ok((
            Syntax::Unary {
                op,
                operand: Box::new(operand),
            },
            self.nest(&token, height)?,
        ))
    }

    fn postfix(&mut self) -> ScriptResult<Parsed> {
        let (mut expr, mut height) = self.primary()?;
        while self.peek().kind == TokenKind::LParen {
            let token = self.advance();
            self.enter(&token)?;
            let args = self.arguments();
            self.depth -= 1;
            let (args, args_height) = args?;
            self.expect_rparen()?;
            height = self.nest(&token, height.max(args_height))?;
            expr = Syntax::Call {
                callee: Box::new(expr),
                args,
            };
        }
        Ok((expr, height))
    }

    fn arguments(&mut self) -> ScriptResult<(Vec<Syntax>, usize)> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.peek().kind == TokenKind::RParen {
            return Ok((args, height));
        }
        loop {
            let (arg, arg_height) = self.expr()?;
            args.push(arg);
            height = height.max(arg_height);
            if self.peek().kind != TokenKind::Comma {
                return Ok((args, height));
            }
            self.advance();
        }
    }

    fn primary(&mut self) -> ScriptResult<Parsed> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok((Syntax::Number(value), 1)),
            TokenKind::Ident(name) => Ok((Syntax::Ident(name), 1)),
            TokenKind::LParen => {
                self.enter(&token)?;
                let inner = self.expr();
                self.depth -= 1;
                let (inner, height) = inner?;
                self.expect_rparen()?;
                Ok((Syntax::Group(Box::new(inner)), self.nest(&token, height)?))
            }
            ref other => Err(self.error_at(&token, format!("expected expression, found {}", other))),
        }
    }

    fn expect_rparen(&mut self) -> ScriptResult<()> {
        let token = self.advance();
        if token.kind == TokenKind::RParen {
            Ok(())
        } else {
            Err(self.error_at(&token, format!("expected `)`, found {}", token.kind)))
        }
    }

    /// Guard parser recursion into parentheses, call arguments and unary operands.
    fn enter(&mut self, token: &Token) -> ScriptResult<()> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(self.error_at(token, "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Height of a node built at `token` over children of height `child`.
    ///
    /// Every later pass walks expressions recursively, so long operator
    /// chains are bounded here as well as nested parentheses.
    fn nest(&self, token: &Token, child: usize) -> ScriptResult<usize> {
        if child >= MAX_PARSE_DEPTH {
            return Err(self.error_at(token, "expression nested too deeply"));
        }
        Ok(child + 1)
    }
}

/// Parse rule script text into its top-level statements.
pub fn parse(source: &str) -> ScriptResult<Vec<Statement<Syntax>>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser {
        tokens,
        pos: 0,
        depth: 0,
    }
    .script()
}
