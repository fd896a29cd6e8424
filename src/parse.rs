use crate::lexer::{Token, TokenType};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Concat,
    Greater,
    Less,
}

impl BinaryOp {
    fn from_token(token_type: &TokenType) -> Option<BinaryOp> {
        match token_type {
            TokenType::PLUS => Some(BinaryOp::Add),
            TokenType::MINUS => Some(BinaryOp::Subtract),
            TokenType::STAR => Some(BinaryOp::Multiply),
            TokenType::SLASH => Some(BinaryOp::Divide),
            TokenType::CONCAT => Some(BinaryOp::Concat),
            TokenType::GREATER => Some(BinaryOp::Greater),
            TokenType::LESS => Some(BinaryOp::Less),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Concat => "<>",
            BinaryOp::Greater => "/\\",
            BinaryOp::Less => "\\/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(i64),
    /// Raw literal text; `#{name}` markers are resolved when evaluated.
    StringLiteral(String),
    Identifier {
        name: String,
        line: usize,
    },
    Binary {
        operator: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: usize,
    },
    List(Vec<Expr>),
    Call {
        name: String,
        arguments: Vec<Expr>,
        line: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    Write {
        value: Expr,
        line: usize,
    },
    Read {
        name: String,
        line: usize,
    },
    RandomAssign {
        name: String,
        bound: Expr,
        line: usize,
    },
    /// Both surface forms end up here; the short form's body is a single
    /// `Expression` statement.
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
        line: usize,
    },
    Expression {
        expr: Expr,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Assign { line, .. }
            | Stmt::Write { line, .. }
            | Stmt::Read { line, .. }
            | Stmt::RandomAssign { line, .. }
            | Stmt::FunctionDef { line, .. }
            | Stmt::Expression { line, .. } => *line,
        }
    }

    /// Short description used to name the enclosing statement in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Stmt::Assign { name, .. } => format!("assignment to `{}`", name),
            Stmt::Write { .. } => "write".to_string(),
            Stmt::Read { name, .. } => format!("read into `{}`", name),
            Stmt::RandomAssign { name, .. } => format!("random into `{}`", name),
            Stmt::FunctionDef { name, .. } => format!("definition of `{}`", name),
            Stmt::Expression {
                expr: Expr::Call { name, .. },
                ..
            } => format!("call to `{}`", name),
            Stmt::Expression { .. } => "function result".to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::StringLiteral(text) => write!(f, "\"{}\"", text),
            Expr::Identifier { name, .. } => write!(f, "{}", name),
            Expr::Binary {
                operator,
                left,
                right,
                ..
            } => write!(f, "({} {} {})", operator.symbol(), left, right),
            Expr::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Expr::Call {
                name, arguments, ..
            } => {
                write!(f, "(call {}", name)?;
                for argument in arguments {
                    write!(f, " {}", argument)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { name, value, .. } => write!(f, "(assign {} {})", name, value),
            Stmt::Write { value, .. } => write!(f, "(write {})", value),
            Stmt::Read { name, .. } => write!(f, "(read {})", name),
            Stmt::RandomAssign { name, bound, .. } => write!(f, "(random {} {})", name, bound),
            Stmt::FunctionDef {
                name, params, body, ..
            } => {
                write!(f, "(function {} ({})", name, params.join(" "))?;
                for stmt in body.iter() {
                    write!(f, " {}", stmt)?;
                }
                write!(f, ")")
            }
            Stmt::Expression { expr, .. } => write!(f, "{}", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    UnexpectedToken {
        lexeme: String,
        line: usize,
        message: String,
    },
    #[error("Error at end: unexpected end of input. {message}")]
    UnexpectedEof { message: String },
}

type Result<T> = std::result::Result<T, SyntaxError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parses the whole token sequence. A program holds at least one statement.
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = vec![self.statement()?];
        while !self.is_at_end() {
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned();
        if token.is_some() {
            self.current += 1;
        }
        token
    }

    fn check(&self, token_type: &TokenType) -> bool {
        matches!(self.peek(), Some(token) if &token.token_type == token_type)
    }

    fn match_token(&mut self, token_types: &[TokenType]) -> Option<Token> {
        let peek_token = self.peek()?;
        if token_types.contains(&peek_token.token_type) {
            return self.advance();
        }
        None
    }

    fn error(&self, message: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::UnexpectedToken {
                lexeme: token.lexeme.clone(),
                line: token.line,
                message: message.to_string(),
            },
            None => SyntaxError::UnexpectedEof {
                message: message.to_string(),
            },
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<Token> {
        if self.check(&token_type) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        Err(self.error(message))
    }

    fn identifier(&mut self, message: &str) -> Result<(String, usize)> {
        if let Some(Token {
            token_type: TokenType::IDENTIFIER(name),
            line,
            ..
        }) = self.peek()
        {
            let found = (name.clone(), *line);
            self.current += 1;
            return Ok(found);
        }
        Err(self.error(message))
    }

    fn statement(&mut self) -> Result<Stmt> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("Expect statement.")),
        };
        match token.token_type {
            TokenType::FUNCTION => self.function_definition(),
            TokenType::WRITE => self.write_statement(),
            TokenType::IDENTIFIER(name) => {
                self.advance();
                if self.match_token(&[TokenType::ASSIGN]).is_some() {
                    self.assignment(name, token.line)
                } else if self.match_token(&[TokenType::LEFT_PAREN]).is_some() {
                    let arguments = self.arguments()?;
                    self.consume(TokenType::SEMICOLON, "Expect ';' after function call.")?;
                    Ok(Stmt::Expression {
                        expr: Expr::Call {
                            name,
                            arguments,
                            line: token.line,
                        },
                        line: token.line,
                    })
                } else {
                    Err(self.error("Expect '=' or '(' after identifier."))
                }
            }
            _ => Err(self.error("Expect statement.")),
        }
    }

    fn assignment(&mut self, name: String, line: usize) -> Result<Stmt> {
        if self.match_token(&[TokenType::READ]).is_some() {
            self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'read'.")?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after 'read('.")?;
            self.consume(TokenType::SEMICOLON, "Expect ';' after read.")?;
            return Ok(Stmt::Read { name, line });
        }

        if self.match_token(&[TokenType::RANDOM]).is_some() {
            self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'random'.")?;
            let bound = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after random bound.")?;
            self.consume(TokenType::SEMICOLON, "Expect ';' after random.")?;
            return Ok(Stmt::RandomAssign { name, bound, line });
        }

        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after assignment.")?;
        Ok(Stmt::Assign { name, value, line })
    }

    fn write_statement(&mut self) -> Result<Stmt> {
        let keyword = self.consume(TokenType::WRITE, "Expect 'write'.")?;
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'write'.")?;
        let value = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after value.")?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after write.")?;
        Ok(Stmt::Write {
            value,
            line: keyword.line,
        })
    }

    fn function_definition(&mut self) -> Result<Stmt> {
        let keyword = self.consume(TokenType::FUNCTION, "Expect 'function'.")?;
        let (name, _) = self.identifier("Expect function name.")?;
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after function name.")?;
        let params = self.parameters()?;

        let body = if self.match_token(&[TokenType::COMMA]).is_some() {
            self.consume(TokenType::COLON, "Expect ':' after ','.")?;
            let line = self.peek().map_or(keyword.line, |token| token.line);
            let expr = self.expression()?;
            self.consume(TokenType::SEMICOLON, "Expect ';' after function body.")?;
            vec![Stmt::Expression { expr, line }]
        } else {
            self.consume(
                TokenType::COLON,
                "Expect ':' or ', :' after parameter list.",
            )?;
            let mut body = vec![self.statement()?];
            while self.match_token(&[TokenType::END]).is_none() {
                if self.is_at_end() {
                    return Err(self.error("Expect 'end' after function body."));
                }
                body.push(self.statement()?);
            }
            body
        };

        Ok(Stmt::FunctionDef {
            name,
            params,
            body: Rc::new(body),
            line: keyword.line,
        })
    }

    fn parameters(&mut self) -> Result<Vec<String>> {
        let mut params: Vec<String> = Vec::new();
        if self.match_token(&[TokenType::RIGHT_PAREN]).is_some() {
            return Ok(params);
        }
        loop {
            if let Some(token) = self.peek() {
                if let TokenType::IDENTIFIER(name) = &token.token_type {
                    if params.contains(name) {
                        return Err(self.error("Duplicate parameter name."));
                    }
                }
            }
            let (param, _) = self.identifier("Expect parameter name.")?;
            params.push(param);
            if self.match_token(&[TokenType::RIGHT_PAREN]).is_some() {
                return Ok(params);
            }
            self.consume(TokenType::COMMA, "Expect ',' or ')' after parameter.")?;
        }
    }

    /// Parses `expr, expr, ...` up to `close`; the opening token is already consumed.
    fn expression_list(&mut self, close: TokenType, message: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.match_token(&[close.clone()]).is_some() {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.match_token(&[close.clone()]).is_some() {
                return Ok(items);
            }
            self.consume(TokenType::COMMA, message)?;
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        self.expression_list(TokenType::RIGHT_PAREN, "Expect ',' or ')' after argument.")
    }

    pub fn expression(&mut self) -> Result<Expr> {
        self.concat()
    }

    fn match_operator(&mut self, token_types: &[TokenType]) -> Option<(BinaryOp, usize)> {
        let token = self.match_token(token_types)?;
        BinaryOp::from_token(&token.token_type).map(|op| (op, token.line))
    }

    fn concat(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        while let Some((operator, line)) = self.match_operator(&[TokenType::CONCAT]) {
            let right = self.term()?;
            expr = binary(expr, operator, right, line);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;
        while let Some((operator, line)) =
            self.match_operator(&[TokenType::MINUS, TokenType::PLUS])
        {
            let right = self.factor()?;
            expr = binary(expr, operator, right, line);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;
        while let Some((operator, line)) =
            self.match_operator(&[TokenType::SLASH, TokenType::STAR])
        {
            let right = self.comparison()?;
            expr = binary(expr, operator, right, line);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while let Some((operator, line)) =
            self.match_operator(&[TokenType::GREATER, TokenType::LESS])
        {
            let right = self.primary()?;
            expr = binary(expr, operator, right, line);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error("Expect expression.")),
        };
        match token.token_type {
            TokenType::NUMBER(value) => {
                self.advance();
                Ok(Expr::Literal(value))
            }
            TokenType::STRING(text) => {
                self.advance();
                Ok(Expr::StringLiteral(text))
            }
            TokenType::IDENTIFIER(name) => {
                self.advance();
                if self.match_token(&[TokenType::LEFT_PAREN]).is_some() {
                    let arguments = self.arguments()?;
                    Ok(Expr::Call {
                        name,
                        arguments,
                        line: token.line,
                    })
                } else {
                    Ok(Expr::Identifier {
                        name,
                        line: token.line,
                    })
                }
            }
            TokenType::LEFT_BRACKET => {
                self.advance();
                let elements = self.expression_list(
                    TokenType::RIGHT_BRACKET,
                    "Expect ',' or ']' after list element.",
                )?;
                Ok(Expr::List(elements))
            }
            TokenType::LEFT_PAREN => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
                Ok(expr)
            }
            _ => Err(self.error("Expect expression.")),
        }
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr, line: usize) -> Expr {
    Expr::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        line,
    }
}

/// Parses an already tokenized program.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>> {
    Parser::new(tokens).parse()
}
