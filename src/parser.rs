use crate::ast::*;
use crate::lexer::{LexError, Lexeme, Lexer, Token};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),
    #[error("Unexpected token {found:?} on line {line}, expected {expected}")]
    Unexpected {
        found: Token,
        expected: &'static str,
        line: usize,
    },
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Field '{field}' on line {line} is missing its type")]
    MissingType { field: String, line: usize },
    #[error("Model '{0}' is declared more than once")]
    DuplicateModel(String),
    #[error("Field '{field}' is declared more than once in model '{model}'")]
    DuplicateField { model: String, field: String },
}

static EOF: Lexeme = Lexeme {
    token: Token::Eof,
    line: 0,
};

pub struct Parser {
    tokens: Vec<Lexeme>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> &Token {
        &self.tokens.get(self.pos).unwrap_or(&EOF).token
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |l| l.line)
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens.get(self.pos).unwrap_or(&EOF).token;
        self.pos += 1;
        tok
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Token::Eof => ParseError::UnexpectedEof,
            found => ParseError::Unexpected {
                found: found.clone(),
                expected,
                line: self.line(),
            },
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn check_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == name)
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.advance();
        }
    }

    /// A declaration ends at a line break, or directly at the closing brace.
    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::RBrace => Ok(()),
            _ => Err(self.unexpected("end of line")),
        }
    }

    pub fn parse(&mut self) -> Result<Document, ParseError> {
        let mut blocks = Vec::new();

        loop {
            self.skip_newlines();
            if *self.peek() == Token::Eof {
                break;
            }

            if self.check_ident("model") {
                self.advance();
                blocks.push(Block::Model(self.parse_model()?));
            } else if self.check_ident("datasource") {
                self.advance();
                blocks.push(Block::Datasource(self.parse_datasource()?));
            } else if let Token::Ident(keyword) = self.peek().clone() {
                self.advance();
                let name = self.expect_ident()?;
                self.skip_block()?;
                blocks.push(Block::Other { keyword, name });
            } else {
                return Err(self.unexpected("model, datasource, or another block declaration"));
            }
        }

        Ok(Document { blocks })
    }

    /// Skip a brace-delimited block we do not interpret.
    fn skip_block(&mut self) -> Result<(), ParseError> {
        self.expect(Token::LBrace, "'{'")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Token::LBrace => depth += 1,
                Token::RBrace => depth -= 1,
                Token::Eof => return Err(ParseError::UnexpectedEof),
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_model(&mut self) -> Result<ModelBlock, ParseError> {
        let line = self.line();
        let name = self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut members = Vec::new();

        loop {
            self.skip_newlines();
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(ParseError::UnexpectedEof),
                Token::AtAt => {
                    members.push(Member::Attribute(self.parse_attribute()?));
                }
                _ => {
                    members.push(Member::Field(self.parse_field()?));
                }
            }
            self.expect_line_end()?;
        }

        Ok(ModelBlock {
            name,
            line,
            members,
        })
    }

    fn parse_field(&mut self) -> Result<FieldDecl, ParseError> {
        let line = self.line();
        let name = self.expect_ident()?;

        let type_name = match self.peek().clone() {
            Token::Ident(t) => {
                self.advance();
                t
            }
            Token::Newline | Token::RBrace | Token::Eof | Token::At => {
                return Err(ParseError::MissingType { field: name, line });
            }
            _ => return Err(self.unexpected("field type")),
        };

        // `Unsupported("circle")` carries the native type as an argument.
        if *self.peek() == Token::LParen {
            self.parse_args()?;
        }

        let modifier = match self.peek() {
            Token::Question => {
                self.advance();
                TypeModifier::Optional
            }
            Token::LBracket => {
                self.advance();
                self.expect(Token::RBracket, "']'")?;
                TypeModifier::List
            }
            _ => TypeModifier::Required,
        };

        let mut attributes = Vec::new();
        while *self.peek() == Token::At {
            attributes.push(self.parse_attribute()?);
        }

        Ok(FieldDecl {
            name,
            typ: TypeRef {
                name: type_name,
                modifier,
            },
            attributes,
            line,
        })
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let scope = match self.peek() {
            Token::At => AttributeScope::Field,
            Token::AtAt => AttributeScope::Block,
            _ => return Err(self.unexpected("'@' or '@@'")),
        };
        self.advance();

        let mut name = self.expect_ident()?;
        while *self.peek() == Token::Dot {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }

        let args = if *self.peek() == Token::LParen {
            Some(self.parse_args()?)
        } else {
            None
        };

        Ok(Attribute { scope, name, args })
    }

    /// Parse `( arg, name: arg, ... )`. Line breaks inside are insignificant.
    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        self.expect(Token::LParen, "'('")?;
        let mut args = Vec::new();

        loop {
            self.skip_newlines();
            if *self.peek() == Token::RParen {
                self.advance();
                break;
            }

            let named = matches!(
                self.tokens.get(self.pos + 1),
                Some(next) if next.token == Token::Colon
            );
            let name = match self.peek().clone() {
                Token::Ident(s) if named => {
                    self.advance();
                    self.advance();
                    Some(s)
                }
                _ => None,
            };
            let value = self.parse_expr()?;
            args.push(Arg { name, value });

            self.skip_newlines();
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        Ok(args)
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                if *self.peek() == Token::LParen {
                    let args = self.parse_args()?;
                    Ok(Expr::Call { name: s, args })
                } else {
                    Ok(Expr::Ident(s))
                }
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                loop {
                    self.skip_newlines();
                    if *self.peek() == Token::RBracket {
                        self.advance();
                        break;
                    }
                    items.push(self.parse_expr()?);
                    self.skip_newlines();
                    match self.peek() {
                        Token::Comma => {
                            self.advance();
                        }
                        Token::RBracket => {}
                        _ => return Err(self.unexpected("',' or ']'")),
                    }
                }
                Ok(Expr::Array(items))
            }
            _ => Err(self.unexpected("attribute argument")),
        }
    }

    fn parse_datasource(&mut self) -> Result<DatasourceBlock, ParseError> {
        let name = self.expect_ident()?;
        self.expect(Token::LBrace, "'{'")?;

        let mut entries = Vec::new();

        loop {
            self.skip_newlines();
            if *self.peek() == Token::RBrace {
                self.advance();
                break;
            }
            let key = self.expect_ident()?;
            self.expect(Token::Eq, "'='")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.expect_line_end()?;
        }

        Ok(DatasourceBlock { name, entries })
    }
}
