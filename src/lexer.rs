use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Num(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Eq,       // =
    At,       // @
    AtAt,     // @@
    Dot,      // .
    Question, // ?
    Newline,  // end of a non-empty line

    Eof,
}

/// A token together with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character '{ch}' on line {line}")]
    UnexpectedChar { ch: char, line: usize },
    #[error("Unterminated string starting on line {0}")]
    UnterminatedString(usize),
    #[error("Unterminated block comment starting on line {0}")]
    UnterminatedComment(usize),
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    /// Set when a block comment swallowed a line break.
    pending_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            pending_newline: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.chars.peek() {
                Some('\n') => break,
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            // Line comment, `///` doc comments included. The
                            // newline itself is left for the caller.
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => self.skip_block_comment()?,
                        _ => break,
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.line;
        self.bump(); // /
        self.bump(); // *
        loop {
            match self.bump() {
                Some('*') if self.chars.peek() == Some(&'/') => {
                    self.bump();
                    return Ok(());
                }
                Some('\n') => self.pending_newline = true,
                Some(_) => {}
                None => return Err(LexError::UnterminatedComment(start)),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let start = self.line;
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        match c {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            _ => s.push(c),
                        }
                    }
                }
                Some('\n') | None => return Err(LexError::UnterminatedString(start)),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self, first: char) -> String {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    pub fn next_token(&mut self) -> Result<Lexeme, LexError> {
        self.skip_whitespace_and_comments()?;

        let line = self.line;
        if self.pending_newline {
            self.pending_newline = false;
            return Ok(Lexeme {
                token: Token::Newline,
                line,
            });
        }

        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Lexeme {
                    token: Token::Eof,
                    line,
                });
            }
        };

        let token = match c {
            '\n' => Token::Newline,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '=' => Token::Eq,
            '.' => Token::Dot,
            '?' => Token::Question,
            '@' => {
                if self.chars.peek() == Some(&'@') {
                    self.bump();
                    Token::AtAt
                } else {
                    Token::At
                }
            }
            '"' => Token::Str(self.read_string()?),
            '-' if self.chars.peek().is_some_and(|c| c.is_ascii_digit()) => {
                Token::Num(self.read_number('-'))
            }
            c if c.is_ascii_digit() => Token::Num(self.read_number(c)),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(c)),
            ch => return Err(LexError::UnexpectedChar { ch, line }),
        };

        Ok(Lexeme { token, line })
    }

    /// Tokenize the whole input. Blank lines collapse into a single
    /// `Newline`, and no `Newline` precedes the first real token.
    pub fn tokenize(mut self) -> Result<Vec<Lexeme>, LexError> {
        let mut tokens: Vec<Lexeme> = Vec::new();
        loop {
            let lexeme = self.next_token()?;
            match lexeme.token {
                Token::Eof => {
                    tokens.push(lexeme);
                    break;
                }
                Token::Newline => {
                    let redundant = tokens
                        .last()
                        .is_none_or(|prev| prev.token == Token::Newline);
                    if !redundant {
                        tokens.push(lexeme);
                    }
                }
                _ => tokens.push(lexeme),
            }
        }
        Ok(tokens)
    }
}
