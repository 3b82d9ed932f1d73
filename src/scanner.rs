use crate::ast::{Token, TokenType};
use crate::error::SyntaxError;

pub struct Scanner {
    source_chars: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    col: u32,
    start_line: u32,
    start_col: u32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            tokens: vec![],
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            start_line: 1,
            start_col: 1,
        }
    }

    pub fn tokens(&self) -> &Vec<Token> {
        &self.tokens
    }

    fn advance(&mut self) -> char {
        let c = self.source_chars[self.current];
        self.current += 1;
        self.col += 1;
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source_chars[self.current]
        }
    }

    fn peek_next_i(&self, i: usize) -> char {
        if self.current + i >= self.source_chars.len() {
            '\0'
        } else {
            self.source_chars[self.current + i]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        };

        self.advance();
        true
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.tokens.push(Token {
            kind: token_type,
            lexeme: self.current_source_str(),
            line: self.start_line,
            col: self.start_col,
        });
    }

    fn current_source_str(&self) -> String {
        self.source_chars[self.start..self.current].iter().collect()
    }

    fn reset(&mut self) {
        self.tokens.clear();
        self.start = 0;
        self.current = 0;
        self.line = 1;
        self.col = 1;
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.col = 1;
    }

    pub fn scan(&mut self) -> Result<(), SyntaxError> {
        self.reset();
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_col = self.col;
            self.scan_token()?;
        }
        self.tokens.push(Token {
            kind: TokenType::Eof,
            lexeme: String::from("eof"),
            line: self.line,
            col: self.col,
        });

        Ok(())
    }

    /// Scans up to the closing `delimiter`. A doubled delimiter is an escaped one.
    /// Returns the unescaped content.
    fn scan_delimited(&mut self, delimiter: char, what: &str) -> Result<String, SyntaxError> {
        let mut content = String::new();
        loop {
            if self.is_at_end() {
                return Err(self.error(&format!("Found unterminated {}", what)));
            }
            let c = self.advance();
            if c == delimiter {
                if self.peek() == delimiter {
                    self.advance();
                    content.push(delimiter);
                    continue;
                }
                break;
            }
            if c == '\n' {
                self.new_line();
            }
            content.push(c);
        }
        Ok(content)
    }

    fn match_string(&mut self) -> Result<(), SyntaxError> {
        let content = self.scan_delimited('\'', "string")?;
        self.add_token(TokenType::String(content));
        Ok(())
    }

    fn match_quoted_identifier(&mut self) -> Result<(), SyntaxError> {
        let content = self.scan_delimited('"', "quoted identifier")?;
        if content.is_empty() {
            return Err(self.error("Found empty quoted identifier."));
        }
        self.add_token(TokenType::QuotedIdentifier(content));
        Ok(())
    }

    fn match_number(&mut self) -> Result<(), SyntaxError> {
        let mut found_dot = self.source_chars[self.start] == '.';
        let mut found_e = false;
        loop {
            let peek_char = self.peek();

            if peek_char == '.' {
                if found_dot || found_e {
                    return Err(self.error("Found invalid number"));
                }
                found_dot = true;
                self.advance();
            } else if peek_char == 'e' || peek_char == 'E' {
                if found_e {
                    return Err(self.error("Found invalid number"));
                }
                found_e = true;
                let peek_next_char = self.peek_next_i(1);
                if peek_next_char == '+' || peek_next_char == '-' {
                    self.advance();
                    if !(self.peek_next_i(1).is_ascii_digit()) {
                        return Err(self.error("Found invalid number"));
                    }
                    self.advance();
                } else if peek_next_char.is_ascii_digit() {
                    self.advance();
                } else {
                    return Err(self.error("Found invalid number"));
                }
            } else if peek_char.is_ascii_digit() {
                self.advance();
            } else {
                self.add_token(TokenType::Number(self.current_source_str()));
                break;
            }
        }

        Ok(())
    }

    fn match_keyword_or_identifier(&mut self) {
        loop {
            let peek_char = self.peek();
            if !(peek_char.is_alphanumeric() || peek_char == '_' || peek_char == '$') {
                break;
            }
            self.advance();
        }
        let identifier = self.current_source_str();

        match keyword(&identifier) {
            Some(keyword) => self.add_token(keyword),
            None => self.add_token(TokenType::Identifier(identifier)),
        }
    }

    fn scan_token(&mut self) -> Result<(), SyntaxError> {
        let curr_char = self.advance();
        match curr_char {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '*' => self.add_token(TokenType::Star),
            ',' => self.add_token(TokenType::Comma),
            ';' => self.add_token(TokenType::Semicolon),
            '%' => self.add_token(TokenType::Percent),
            '+' => self.add_token(TokenType::Plus),
            '=' => self.add_token(TokenType::Equal),
            '.' => {
                if self.peek().is_ascii_digit() {
                    self.match_number()?;
                } else {
                    self.add_token(TokenType::Dot);
                }
            }
            '/' => {
                if self.match_char('*') {
                    loop {
                        if self.is_at_end() {
                            return Err(self.error("Found unterminated comment"));
                        }
                        if self.peek() == '*' && self.peek_next_i(1) == '/' {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance() == '\n' {
                            self.new_line();
                        }
                    }
                } else {
                    self.add_token(TokenType::Slash)
                }
            }
            '-' => {
                if self.match_char('-') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Minus)
                }
            }
            '<' => {
                if self.match_char('>') {
                    self.add_token(TokenType::NotEqual);
                } else if self.match_char('=') {
                    self.add_token(TokenType::LessEqual);
                } else {
                    self.add_token(TokenType::Less);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenType::GreaterEqual);
                } else {
                    self.add_token(TokenType::Greater);
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenType::NotEqual);
                } else {
                    return Err(self.error("Found unexpected character while scanning: !"));
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.add_token(TokenType::ConcatOperator);
                } else {
                    return Err(self.error("Found unexpected character while scanning: |"));
                }
            }
            '\n' => {
                self.new_line();
            }
            '\r' | ' ' | '\t' => {}

            '\'' => self.match_string()?,
            '"' => self.match_quoted_identifier()?,

            // numeric
            c if c.is_ascii_digit() => {
                self.match_number()?;
            }

            // Keywords and identifiers
            c if c.is_alphabetic() || c == '_' => {
                self.match_keyword_or_identifier();
            }

            _ => {
                return Err(self.error(&format!(
                    "Found unexpected character while scanning: {}",
                    curr_char
                )));
            }
        }
        Ok(())
    }

    fn error(&self, error: &str) -> SyntaxError {
        SyntaxError::at(
            self.start_line,
            self.start_col,
            format!("Scanner error: {}", error),
        )
    }
}

/// The reserved keyword spelled by `word`, in any case.
pub fn keyword(word: &str) -> Option<TokenType> {
    let keyword = match word.to_lowercase().as_str() {
        "all" => TokenType::All,
        "and" => TokenType::And,
        "as" => TokenType::As,
        "asc" => TokenType::Asc,
        "between" => TokenType::Between,
        "by" => TokenType::By,
        "case" => TokenType::Case,
        "cast" => TokenType::Cast,
        "cross" => TokenType::Cross,
        "desc" => TokenType::Desc,
        "distinct" => TokenType::Distinct,
        "else" => TokenType::Else,
        "end" => TokenType::End,
        "except" => TokenType::Except,
        "exists" => TokenType::Exists,
        "false" => TokenType::False,
        "from" => TokenType::From,
        "full" => TokenType::Full,
        "group" => TokenType::Group,
        "having" => TokenType::Having,
        "in" => TokenType::In,
        "inner" => TokenType::Inner,
        "intersect" => TokenType::Intersect,
        "is" => TokenType::Is,
        "join" => TokenType::Join,
        "left" => TokenType::Left,
        "like" => TokenType::Like,
        "limit" => TokenType::Limit,
        "not" => TokenType::Not,
        "null" => TokenType::Null,
        "offset" => TokenType::Offset,
        "on" => TokenType::On,
        "or" => TokenType::Or,
        "order" => TokenType::Order,
        "outer" => TokenType::Outer,
        "over" => TokenType::Over,
        "partition" => TokenType::Partition,
        "right" => TokenType::Right,
        "select" => TokenType::Select,
        "then" => TokenType::Then,
        "true" => TokenType::True,
        "union" => TokenType::Union,
        "using" => TokenType::Using,
        "when" => TokenType::When,
        "where" => TokenType::Where,
        "with" => TokenType::With,
        _ => return None,
    };
    Some(keyword)
}
