//! Tokenizer for script source text.

use std::{fmt, rc::Rc};

use crate::{JsError, JsResult};

const EOF_CHAR: char = '\0';

/// A token together with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: u32,
}

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    Var,
    Function,
    Return,
    If,
    Else,
    While,
    Throw,
    Debugger,
    This,
    True,
    False,
    Null,
    Undefined,
    TypeOf,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "var" | "let" | "const" => Self::Var,
            "function" => Self::Function,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "throw" => Self::Throw,
            "debugger" => Self::Debugger,
            "this" => Self::This,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            "typeof" => Self::TypeOf,
            _ => return None,
        })
    }

    /// The keyword as written in source. `let` and `const` read as `var`.
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Function => "function",
            Self::Return => "return",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Throw => "throw",
            Self::Debugger => "debugger",
            Self::This => "this",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::TypeOf => "typeof",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    String(Rc<str>),
    Ident(Rc<str>),
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    Colon,
    Assign,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number(n) => return write!(f, "{n}"),
            Self::String(s) => return write!(f, "{s:?}"),
            Self::Ident(name) => return f.write_str(name),
            Self::Keyword(kw) => kw.as_str(),
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Assign => "=",
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::NotEq => "!=",
            Self::StrictNotEq => "!==",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Bang => "!",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Eof => "end of input",
        };
        f.write_str(s)
    }
}

/// Turns source text into tokens, tracking line numbers.
pub(crate) struct Lexer<'src> {
    source: &'src str,
    chars: std::str::Chars<'src>,
    pos: usize,
    line: u32,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str, start_line: u32) -> Self {
        Self {
            source,
            chars: source.chars(),
            pos: 0,
            line: start_line,
        }
    }

    fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    fn second(&self) -> char {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next().unwrap_or(EOF_CHAR)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if !self.is_eof() && self.first() == c {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.first()) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> JsError {
        JsError::syntax_error(format!("line {}: {message}", self.line))
    }

    fn skip_trivia(&mut self) -> JsResult<()> {
        loop {
            self.eat_while(char::is_whitespace);
            match (self.first(), self.second()) {
                ('/', '/') => self.eat_while(|c| c != '\n'),
                ('/', '*') => {
                    self.bump();
                    self.bump();
                    loop {
                        if self.is_eof() {
                            return Err(self.error("unterminated comment"));
                        }
                        if self.first() == '*' && self.second() == '/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produces the next token.
    pub(crate) fn next_token(&mut self) -> JsResult<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' if self.eat('=') => {
                if self.eat('=') {
                    TokenKind::StrictEq
                } else {
                    TokenKind::Eq
                }
            }
            '=' => TokenKind::Assign,
            '!' if self.eat('=') => {
                if self.eat('=') {
                    TokenKind::StrictNotEq
                } else {
                    TokenKind::NotEq
                }
            }
            '!' => TokenKind::Bang,
            '<' if self.eat('=') => TokenKind::LessEq,
            '<' => TokenKind::Less,
            '>' if self.eat('=') => TokenKind::GreaterEq,
            '>' => TokenKind::Greater,
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            '"' | '\'' => self.string(c)?,
            c if c.is_ascii_digit() => {
                self.eat_while(|c| c.is_ascii_digit() || c == '.');
                let text = &self.source[start..self.pos];
                let number = text
                    .parse()
                    .map_err(|_| self.error(&format!("invalid number literal `{text}`")))?;
                TokenKind::Number(number)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                let text = &self.source[start..self.pos];
                Keyword::from_ident(text).map_or_else(|| TokenKind::Ident(text.into()), TokenKind::Keyword)
            }
            other => return Err(self.error(&format!("unexpected character `{other}`"))),
        };
        Ok(Token { kind, line })
    }

    fn string(&mut self, quote: char) -> JsResult<TokenKind> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string literal")),
                },
                Some(c) => value.push(c),
            }
        }
        Ok(TokenKind::String(value.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source, 1);
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_token().expect("lexing failed");
            if token.kind == TokenKind::Eof {
                return kinds;
            }
            kinds.push(token.kind);
        }
    }

    #[test]
    fn operators_take_the_longest_match() {
        assert_eq!(
            kinds("a === b !== c == d"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::StrictEq,
                TokenKind::Ident("b".into()),
                TokenKind::StrictNotEq,
                TokenKind::Ident("c".into()),
                TokenKind::Eq,
                TokenKind::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let mut lexer = Lexer::new("// one\n/* two\nthree */ x", 10);
        let token = lexer.next_token().expect("lexing failed");
        assert_eq!(token.kind, TokenKind::Ident("x".into()));
        assert_eq!(token.line, 12);
    }

    #[test]
    fn strings_support_escapes() {
        assert_eq!(kinds(r#"'a\'b' "c\nd""#), vec![
            TokenKind::String("a'b".into()),
            TokenKind::String("c\nd".into()),
        ]);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let mut lexer = Lexer::new("'abc", 1);
        assert!(lexer.next_token().is_err());
    }
}
