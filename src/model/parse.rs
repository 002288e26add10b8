use thiserror::Error;
use std::fmt::{self, Display};

/// Errors raised while reading the brace-delimited text format. Every variant
/// carries enough context (the block being read and what was expected) to point
/// the user at the offending token.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {

    #[error("Line {line}: while reading {context}, expected {expected} but found '{found}'")]
    Unexpected { context : String, expected : String, found : String, line : usize },

    #[error("While reading {context}, expected {expected} but input ended")]
    Eof { context : String, expected : String },

    #[error("Line {line}: invalid {context}: {message}")]
    Invalid { context : String, message : String, line : usize },

    #[error("Line {line}: unknown distribution type '{name}'")]
    UnknownDistribution { name : String, line : usize }

}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    Word(String)
}

impl Display for Token {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => write!(f, "{{"),
            Token::Close => write!(f, "}}"),
            Token::Word(w) => write!(f, "{}", w)
        }
    }

}

/// Whitespace-insensitive token stream over the text format. Braces are
/// always tokens of their own; '#' and '//' start comments running to the end
/// of the line.
#[derive(Debug, Clone)]
pub struct Tokens {
    tokens : Vec<(Token, usize)>,
    pos : usize
}

impl Tokens {

    pub fn new(text : &str) -> Self {
        let mut tokens = Vec::new();
        for (ix, line) in text.lines().enumerate() {
            let line_no = ix + 1;
            let content = match (line.find('#'), line.find("//")) {
                (Some(a), Some(b)) => &line[..a.min(b)],
                (Some(a), None) | (None, Some(a)) => &line[..a],
                (None, None) => line
            };
            let mut word = String::new();
            for c in content.chars() {
                if c == '{' || c == '}' || c.is_whitespace() {
                    if !word.is_empty() {
                        tokens.push((Token::Word(std::mem::take(&mut word)), line_no));
                    }
                    match c {
                        '{' => tokens.push((Token::Open, line_no)),
                        '}' => tokens.push((Token::Close, line_no)),
                        _ => { }
                    }
                } else {
                    word.push(c);
                }
            }
            if !word.is_empty() {
                tokens.push((Token::Word(word), line_no));
            }
        }
        Self { tokens, pos : 0 }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    /// Line of the next token, or of the last one when the input is exhausted.
    pub fn line(&self) -> usize {
        self.tokens.get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(0)
    }

    pub fn next_token(&mut self, context : &str, expected : &str) -> Result<Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some((t, _)) => {
                self.pos += 1;
                Ok(t.clone())
            },
            None => Err(ParseError::Eof { context : context.to_string(), expected : expected.to_string() })
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn unexpected(&self, context : &str, expected : &str, found : &Token) -> ParseError {
        ParseError::Unexpected {
            context : context.to_string(),
            expected : expected.to_string(),
            found : found.to_string(),
            line : self.line().max(1)
        }
    }

    pub fn invalid(&self, context : &str, message : impl Display) -> ParseError {
        ParseError::Invalid { context : context.to_string(), message : message.to_string(), line : self.line() }
    }

    pub fn expect_open(&mut self, context : &str) -> Result<(), ParseError> {
        match self.next_token(context, "'{'")? {
            Token::Open => Ok(()),
            other => Err(self.unexpected(context, "'{'", &other))
        }
    }

    pub fn expect_close(&mut self, context : &str) -> Result<(), ParseError> {
        match self.next_token(context, "'}'")? {
            Token::Close => Ok(()),
            other => Err(self.unexpected(context, "'}'", &other))
        }
    }

    pub fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(self.unexpected("end of input", "nothing", t))
        }
    }

    pub fn word(&mut self, context : &str) -> Result<String, ParseError> {
        match self.next_token(context, "a name")? {
            Token::Word(w) => Ok(w),
            other => Err(self.unexpected(context, "a name", &other))
        }
    }

    pub fn keyword(&mut self, context : &str, expected : &str) -> Result<(), ParseError> {
        let found = self.next_token(context, expected)?;
        match &found {
            Token::Word(w) if w == expected => Ok(()),
            _ => Err(self.unexpected(context, expected, &found))
        }
    }

    pub fn number(&mut self, context : &str) -> Result<f64, ParseError> {
        match self.next_token(context, "a number")? {
            Token::Word(w) => w.parse::<f64>().map_err(|_| {
                self.unexpected(context, "a number", &Token::Word(w.clone()))
            }),
            other => Err(self.unexpected(context, "a number", &other))
        }
    }

    pub fn integer(&mut self, context : &str) -> Result<usize, ParseError> {
        match self.next_token(context, "a non-negative integer")? {
            Token::Word(w) => w.parse::<usize>().map_err(|_| {
                self.unexpected(context, "a non-negative integer", &Token::Word(w.clone()))
            }),
            other => Err(self.unexpected(context, "a non-negative integer", &other))
        }
    }

    /// Reads '{ x1 x2 ... }'.
    pub fn numbers(&mut self, context : &str) -> Result<Vec<f64>, ParseError> {
        self.expect_open(context)?;
        let mut values = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.pos += 1;
                    return Ok(values);
                },
                Some(_) => values.push(self.number(context)?),
                None => return Err(ParseError::Eof { context : context.to_string(), expected : "'}'".to_string() })
            }
        }
    }

    pub fn integers(&mut self, context : &str) -> Result<Vec<usize>, ParseError> {
        self.expect_open(context)?;
        let mut values = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.pos += 1;
                    return Ok(values);
                },
                Some(_) => values.push(self.integer(context)?),
                None => return Err(ParseError::Eof { context : context.to_string(), expected : "'}'".to_string() })
            }
        }
    }

    pub fn words(&mut self, context : &str) -> Result<Vec<String>, ParseError> {
        self.expect_open(context)?;
        let mut values = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.pos += 1;
                    return Ok(values);
                },
                Some(_) => values.push(self.word(context)?),
                None => return Err(ParseError::Eof { context : context.to_string(), expected : "'}'".to_string() })
            }
        }
    }

    /// Returns the next key inside a '{ key value ... }' block, or None after
    /// consuming the closing brace.
    pub fn next_key(&mut self, context : &str) -> Result<Option<String>, ParseError> {
        match self.next_token(context, "a key or '}'")? {
            Token::Close => Ok(None),
            Token::Word(w) => Ok(Some(w)),
            Token::Open => Err(self.unexpected(context, "a key or '}'", &Token::Open))
        }
    }

}

/// Formats a slice of numbers as a '{ ... }' block. Rust's float formatting
/// writes the shortest representation that reads back to the same value.
pub fn format_numbers(values : &[f64]) -> String {
    let mut s = String::from("{");
    for v in values {
        s += &format!(" {}", v);
    }
    s + " }"
}

pub fn format_integers(values : &[usize]) -> String {
    let mut s = String::from("{");
    for v in values {
        s += &format!(" {}", v);
    }
    s + " }"
}
