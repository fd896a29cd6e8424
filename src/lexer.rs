use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenType {
    // Grouping tokens
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACKET,
    RIGHT_BRACKET,

    // Single-character tokens
    STAR,
    COMMA,
    COLON,
    PLUS,
    MINUS,
    SEMICOLON,
    SLASH,
    ASSIGN,

    // Two character tokens
    CONCAT,
    GREATER,
    LESS,

    // Literals
    STRING(String),
    NUMBER(i64),
    IDENTIFIER(String),

    // Keywords
    WRITE,
    READ,
    RANDOM,
    FUNCTION,
    END,
}

impl TokenType {
    /// Name of the token kind as printed by `tplang tokenize`.
    pub fn name(&self) -> &'static str {
        match self {
            TokenType::LEFT_PAREN => "LEFT_PAREN",
            TokenType::RIGHT_PAREN => "RIGHT_PAREN",
            TokenType::LEFT_BRACKET => "LEFT_BRACKET",
            TokenType::RIGHT_BRACKET => "RIGHT_BRACKET",
            TokenType::STAR => "STAR",
            TokenType::COMMA => "COMMA",
            TokenType::COLON => "COLON",
            TokenType::PLUS => "PLUS",
            TokenType::MINUS => "MINUS",
            TokenType::SEMICOLON => "SEMICOLON",
            TokenType::SLASH => "SLASH",
            TokenType::ASSIGN => "ASSIGN",
            TokenType::CONCAT => "CONCAT",
            TokenType::GREATER => "GREATER",
            TokenType::LESS => "LESS",
            TokenType::STRING(_) => "STRING",
            TokenType::NUMBER(_) => "NUMBER",
            TokenType::IDENTIFIER(_) => "IDENTIFIER",
            TokenType::WRITE => "WRITE",
            TokenType::READ => "READ",
            TokenType::RANDOM => "RANDOM",
            TokenType::FUNCTION => "FUNCTION",
            TokenType::END => "END",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.token_type.name(), self.lexeme, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("[line {line}] Error: Unexpected character: {ch}")]
    UnexpectedCharacter { ch: char, line: usize },
    #[error("[line {line}] Error: Unterminated string.")]
    UnterminatedString { line: usize },
    #[error("[line {line}] Error: Unterminated block comment.")]
    UnterminatedComment { line: usize },
    #[error("[line {line}] Error: Number literal out of range: {lexeme}")]
    NumberOutOfRange { lexeme: String, line: usize },
}

fn keywords(key: &str) -> Option<TokenType> {
    match key {
        "write" | "ESCREVER" => Some(TokenType::WRITE),
        "read" | "ENTRADA" => Some(TokenType::READ),
        "random" | "ALEATORIO" => Some(TokenType::RANDOM),
        "function" | "FUNCAO" => Some(TokenType::FUNCTION),
        "end" | "FIM" => Some(TokenType::END),
        _ => None,
    }
}

/// Source text ready to be scanned. Every call to [`Lexer::tokens`] starts
/// a fresh scan from the first character.
pub struct Lexer<'src> {
    source: &'src str,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source }
    }

    pub fn tokens(&self) -> Tokens<'src> {
        Tokens {
            chars: self.source.chars().peekable(),
            line: 1,
        }
    }

    /// Scans the whole source, splitting tokens from the errors met on the way.
    pub fn lex(&self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for item in self.tokens() {
            match item {
                Ok(token) => tokens.push(token),
                Err(error) => errors.push(error),
            }
        }
        (tokens, errors)
    }
}

/// Lazy token stream. Errors are yielded in place and scanning resumes
/// right after the offending input.
#[derive(Clone)]
pub struct Tokens<'src> {
    chars: Peekable<Chars<'src>>,
    line: usize,
}

impl<'src> Iterator for Tokens<'src> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            if let Some(item) = self.scan_token(ch) {
                return Some(item);
            }
        }
        None
    }
}

impl<'src> Tokens<'src> {
    fn scan_token(&mut self, ch: char) -> Option<Result<Token, LexError>> {
        let line = self.line;
        match ch {
            '(' => Some(Ok(make_token(TokenType::LEFT_PAREN, "(", line))),
            ')' => Some(Ok(make_token(TokenType::RIGHT_PAREN, ")", line))),
            '[' => Some(Ok(make_token(TokenType::LEFT_BRACKET, "[", line))),
            ']' => Some(Ok(make_token(TokenType::RIGHT_BRACKET, "]", line))),
            '*' => Some(Ok(make_token(TokenType::STAR, "*", line))),
            ',' => Some(Ok(make_token(TokenType::COMMA, ",", line))),
            ':' => Some(Ok(make_token(TokenType::COLON, ":", line))),
            '+' => Some(Ok(make_token(TokenType::PLUS, "+", line))),
            ';' => Some(Ok(make_token(TokenType::SEMICOLON, ";", line))),
            '=' => Some(Ok(make_token(TokenType::ASSIGN, "=", line))),

            // Two-character tokens
            '/' => Some(Ok(self.match_next(
                '/',
                '\\',
                TokenType::GREATER,
                TokenType::SLASH,
            ))),
            '\\' => self.match_only('\\', '/', TokenType::LESS),
            '<' => self.match_only('<', '>', TokenType::CONCAT),

            // Comments
            '-' => {
                if self.chars.peek() == Some(&'-') {
                    while let Some(ch) = self.chars.peek() {
                        if *ch == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                    None
                } else {
                    Some(Ok(make_token(TokenType::MINUS, "-", line)))
                }
            }
            '{' => {
                if self.chars.peek() == Some(&'-') {
                    self.chars.next();
                    self.skip_block_comment(line).map(Err)
                } else {
                    Some(Err(LexError::UnexpectedCharacter { ch, line }))
                }
            }

            // String literals
            '"' => Some(self.scan_string(line)),

            // Number
            '0'..='9' => Some(self.scan_num(ch, line)),

            // Whitespace
            '\n' => {
                self.line += 1;
                None
            }
            ch if ch.is_whitespace() => None,

            id if id == '_' || id.is_ascii_alphabetic() => Some(Ok(self.scan_identifier(id, line))),

            // Unexpected characters
            _ => Some(Err(LexError::UnexpectedCharacter { ch, line })),
        }
    }

    fn skip_block_comment(&mut self, start: usize) -> Option<LexError> {
        while let Some(ch) = self.chars.next() {
            match ch {
                '\n' => self.line += 1,
                '-' if self.chars.peek() == Some(&'}') => {
                    self.chars.next();
                    return None;
                }
                _ => {}
            }
        }
        Some(LexError::UnterminatedComment { line: start })
    }

    fn scan_string(&mut self, line: usize) -> Result<Token, LexError> {
        // Work on a copy so an unterminated literal leaves the stream right
        // after the opening quote.
        let mut lookahead = self.chars.clone();
        let mut value = String::new();
        while let Some(ch) = lookahead.next() {
            match ch {
                '"' => {
                    self.chars = lookahead;
                    return Ok(Token {
                        lexeme: format!("\"{}\"", value),
                        token_type: TokenType::STRING(value),
                        line,
                    });
                }
                '\n' => break,
                '\\' => {
                    value.push(ch);
                    match lookahead.next() {
                        Some(escaped) if escaped != '\n' => value.push(escaped),
                        _ => break,
                    }
                }
                _ => value.push(ch),
            }
        }
        Err(LexError::UnterminatedString { line })
    }

    fn scan_num(&mut self, first: char, line: usize) -> Result<Token, LexError> {
        let mut lexeme = String::from(first);
        while let Some(ch) = self.chars.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            lexeme.push(*ch);
            self.chars.next();
        }

        match lexeme.parse::<i64>() {
            Ok(value) => Ok(Token {
                token_type: TokenType::NUMBER(value),
                lexeme,
                line,
            }),
            Err(_) => Err(LexError::NumberOutOfRange { lexeme, line }),
        }
    }

    fn scan_identifier(&mut self, first: char, line: usize) -> Token {
        let mut identifier = String::from(first);
        while let Some(ch) = self.chars.peek() {
            match ch {
                ch if ch.is_ascii_alphanumeric() || *ch == '_' => identifier.push(*ch),
                _ => break,
            }
            self.chars.next();
        }
        if let Some(&ch) = self.chars.peek() {
            if ch == '?' || ch == '!' {
                identifier.push(ch);
                self.chars.next();
            }
        }

        let token_type =
            keywords(&identifier).unwrap_or_else(|| TokenType::IDENTIFIER(identifier.clone()));
        Token {
            token_type,
            lexeme: identifier,
            line,
        }
    }

    fn match_next(
        &mut self,
        current: char,
        expected: char,
        double_type: TokenType,
        single_type: TokenType,
    ) -> Token {
        let (token_type, lexeme) = if self.chars.peek() == Some(&expected) {
            self.chars.next();
            (double_type, format!("{}{}", current, expected))
        } else {
            (single_type, current.to_string())
        };

        make_token(token_type, &lexeme, self.line)
    }

    /// Like `match_next`, for characters that are not tokens on their own.
    fn match_only(
        &mut self,
        current: char,
        expected: char,
        double_type: TokenType,
    ) -> Option<Result<Token, LexError>> {
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            let lexeme = format!("{}{}", current, expected);
            Some(Ok(make_token(double_type, &lexeme, self.line)))
        } else {
            Some(Err(LexError::UnexpectedCharacter {
                ch: current,
                line: self.line,
            }))
        }
    }
}

fn make_token(token_type: TokenType, lexeme: &str, line: usize) -> Token {
    Token {
        token_type,
        lexeme: String::from(lexeme),
        line,
    }
}
