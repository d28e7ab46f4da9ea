// ABOUTME: Tokenizer producing a located token stream from rill source text

use crate::ast::SourceLocation;
use crate::error::{codes, RillError};
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char as nom_char, digit1, satisfy};
use nom::combinator::{opt, recognize};
use nom::multi::many0;
use nom::sequence::preceded;
use nom::{IResult, Parser};

/// Reserved words. `true` / `false` / `null` lex as identifiers and are
/// mapped by the parser, since they are also legal dict keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    Pass,
    Break,
    Continue,
    Error,
    Each,
    Map,
    Filter,
    Fold,
}

impl Reserved {
    pub fn as_str(self) -> &'static str {
        match self {
            Reserved::Pass => "pass",
            Reserved::Break => "break",
            Reserved::Continue => "continue",
            Reserved::Error => "error",
            Reserved::Each => "each",
            Reserved::Map => "map",
            Reserved::Filter => "filter",
            Reserved::Fold => "fold",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "pass" => Reserved::Pass,
            "break" => Reserved::Break,
            "continue" => Reserved::Continue,
            "error" => Reserved::Error,
            "each" => Reserved::Each,
            "map" => Reserved::Map,
            "filter" => Reserved::Filter,
            "fold" => Reserved::Fold,
            _ => return None,
        })
    }
}

/// One segment of a string literal. Interpolation expressions are kept as
/// sub-token streams and parsed by the expression parser.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSegment {
    Text(String),
    Expr(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(Vec<StringSegment>),
    /// Identifier, possibly namespaced (`llm::complete`).
    Ident(String),
    /// `$name` without the sigil; the bare pipe value is `"$"` and the
    /// accumulator is `"$@"`.
    Var(String),
    Reserved(Reserved),
    Newline,

    Arrow,       // ->
    FatArrow,    // =>
    Capture,     // :>
    CondCapture, // ?>
    Coalesce,    // ??
    Question,    // ?
    Bang,        // !
    Pipe,        // |
    PipePipe,    // ||
    AmpAmp,      // &&
    Amp,         // &
    EqEq,        // ==
    Eq,          // = (closure parameter defaults)
    BangEq,      // !=
    Lt,          // <
    Gt,          // >
    Le,          // <=
    Ge,          // >=
    Plus,        // +
    Minus,       // -
    Star,        // *
    Slash,       // /
    Percent,     // %
    LBrace,      // {
    RBrace,      // }
    LBracket,    // [
    RBracket,    // ]
    LParen,      // (
    RParen,      // )
    Colon,       // :
    Comma,       // ,
    Dot,         // .
    DotQuestion, // .?
    At,          // @
    AtQuestion,  // @?
    QuestionAt,  // ?@
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

/// Tokenize a complete source text.
pub fn lex(source: &str) -> Result<Vec<Token>, RillError> {
    Lexer::new(source, 1, 1).run()
}

fn lex_number(input: &str) -> IResult<&str, &str> {
    // A trailing `.` belongs to a member access (`1.str`), so the fraction
    // is only consumed when digits follow.
    recognize((digit1, opt(preceded(nom_char('.'), digit1)))).parse(input)
}

fn ident_part(input: &str) -> IResult<&str, &str> {
    recognize((
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn lex_ident(input: &str) -> IResult<&str, &str> {
    recognize((ident_part, many0(preceded(tag("::"), ident_part)))).parse(input)
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, line: u32, col: u32) -> Self {
        Lexer {
            src,
            pos: 0,
            line,
            col,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.col,
        }
    }

    /// Advance over `n` bytes, updating line/column from the consumed text.
    fn advance(&mut self, n: usize) {
        for c in self.src[self.pos..self.pos + n].chars() {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += n;
    }

    fn push(&mut self, kind: TokenKind, loc: SourceLocation) {
        self.tokens.push(Token { kind, loc });
    }

    fn push_newline(&mut self, loc: SourceLocation) {
        // Consecutive separators collapse into one token
        if !matches!(
            self.tokens.last(),
            Some(Token {
                kind: TokenKind::Newline,
                ..
            })
        ) {
            self.push(TokenKind::Newline, loc);
        }
    }

    fn run(mut self) -> Result<Vec<Token>, RillError> {
        while let Some(c) = self.peek() {
            let loc = self.loc();
            match c {
                ' ' | '\t' | '\r' => self.advance(1),
                '\n' => {
                    self.advance(1);
                    self.push_newline(loc);
                }
                ';' => {
                    self.advance(1);
                    self.push_newline(loc);
                }
                '/' if self.rest().starts_with("//") => {
                    let end = self.rest().find('\n').unwrap_or(self.rest().len());
                    self.advance(end);
                }
                '"' => self.lex_string(loc)?,
                '0'..='9' => {
                    let (next, num) = lex_number(self.rest())
                        .map_err(|_| RillError::parse(codes::UNEXPECTED_TOKEN, "malformed number", loc))?;
                    let parsed: f64 = num.parse().map_err(|_| {
                        RillError::parse(codes::UNEXPECTED_TOKEN, "malformed number", loc)
                    })?;
                    let consumed = self.rest().len() - next.len();
                    self.advance(consumed);
                    self.push(TokenKind::Number(parsed), loc);
                }
                '$' => {
                    self.advance(1);
                    match self.peek() {
                        Some('@') => {
                            self.advance(1);
                            self.push(TokenKind::Var("$@".to_string()), loc);
                        }
                        Some(c2) if c2.is_ascii_alphabetic() || c2 == '_' => {
                            let (next, name) = ident_part(self.rest()).map_err(|_| {
                                RillError::parse(codes::UNEXPECTED_TOKEN, "malformed variable", loc)
                            })?;
                            let consumed = self.rest().len() - next.len();
                            let name = name.to_string();
                            self.advance(consumed);
                            self.push(TokenKind::Var(name), loc);
                        }
                        _ => self.push(TokenKind::Var("$".to_string()), loc),
                    }
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let (next, name) = lex_ident(self.rest()).map_err(|_| {
                        RillError::parse(codes::UNEXPECTED_TOKEN, "malformed identifier", loc)
                    })?;
                    let consumed = self.rest().len() - next.len();
                    let name = name.to_string();
                    self.advance(consumed);
                    match Reserved::from_str(&name) {
                        Some(r) => self.push(TokenKind::Reserved(r), loc),
                        None => self.push(TokenKind::Ident(name), loc),
                    }
                }
                _ => self.lex_punct(loc)?,
            }
        }
        Ok(self.tokens)
    }

    fn lex_punct(&mut self, loc: SourceLocation) -> Result<(), RillError> {
        const TWO: &[(&str, TokenKind)] = &[
            ("->", TokenKind::Arrow),
            ("=>", TokenKind::FatArrow),
            (":>", TokenKind::Capture),
            ("?>", TokenKind::CondCapture),
            ("??", TokenKind::Coalesce),
            ("?@", TokenKind::QuestionAt),
            ("@?", TokenKind::AtQuestion),
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::BangEq),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            (".?", TokenKind::DotQuestion),
        ];
        for (text, kind) in TWO {
            if self.rest().starts_with(text) {
                self.advance(2);
                self.push(kind.clone(), loc);
                return Ok(());
            }
        }
        let kind = match self.peek().unwrap() {
            '=' => TokenKind::Eq,
            '?' => TokenKind::Question,
            '!' => TokenKind::Bang,
            '|' => TokenKind::Pipe,
            '&' => TokenKind::Amp,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '@' => TokenKind::At,
            other => {
                return Err(RillError::parse(
                    codes::UNEXPECTED_TOKEN,
                    format!("unexpected character '{}'", other),
                    loc,
                ));
            }
        };
        self.advance(1);
        self.push(kind, loc);
        Ok(())
    }

    /// Lex a string literal starting at the opening quote. Triple-quoted
    /// strings preserve newlines and permit embedded quotes; both forms
    /// support `{expr}` interpolation.
    fn lex_string(&mut self, loc: SourceLocation) -> Result<(), RillError> {
        let triple = self.rest().starts_with("\"\"\"");
        self.advance(if triple { 3 } else { 1 });

        let mut segments: Vec<StringSegment> = Vec::new();
        let mut text = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(RillError::parse(
                    codes::UNTERMINATED_STRING,
                    "unterminated string literal",
                    loc,
                ));
            };
            if triple {
                if self.rest().starts_with("\"\"\"") {
                    self.advance(3);
                    break;
                }
            } else if c == '"' {
                self.advance(1);
                break;
            } else if c == '\n' {
                return Err(RillError::parse(
                    codes::UNTERMINATED_STRING,
                    "unterminated string literal",
                    loc,
                ));
            }

            match c {
                '\\' => {
                    let escaped = self.peek2().ok_or_else(|| {
                        RillError::parse(codes::UNTERMINATED_STRING, "incomplete escape", loc)
                    })?;
                    self.advance(1 + escaped.len_utf8());
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        '"' => text.push('"'),
                        '\\' => text.push('\\'),
                        '{' => text.push('{'),
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                '{' => {
                    if !text.is_empty() {
                        segments.push(StringSegment::Text(std::mem::take(&mut text)));
                    }
                    let seg = self.lex_interpolation(loc)?;
                    segments.push(StringSegment::Expr(seg));
                }
                other => {
                    self.advance(other.len_utf8());
                    text.push(other);
                }
            }
        }

        if !text.is_empty() || segments.is_empty() {
            segments.push(StringSegment::Text(text));
        }
        self.push(TokenKind::Str(segments), loc);
        Ok(())
    }

    /// Scan a `{expr}` interpolation segment and tokenize its contents.
    fn lex_interpolation(&mut self, str_loc: SourceLocation) -> Result<Vec<Token>, RillError> {
        self.advance(1); // opening brace
        let inner_line = self.line;
        let inner_col = self.col;
        let start = self.pos;

        let mut depth = 1usize;
        let mut in_string = false;
        loop {
            let Some(c) = self.peek() else {
                return Err(RillError::parse(
                    codes::BAD_INTERPOLATION,
                    "unterminated interpolation in string literal",
                    str_loc,
                ));
            };
            if in_string {
                match c {
                    '\\' => {
                        let skip = 1 + self.peek2().map(|c2| c2.len_utf8()).unwrap_or(0);
                        self.advance(skip);
                        continue;
                    }
                    '"' => in_string = false,
                    _ => {}
                }
            } else {
                match c {
                    '"' => in_string = true,
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            self.advance(c.len_utf8());
        }

        let inner = &self.src[start..self.pos];
        self.advance(1); // closing brace

        let tokens: Vec<Token> = Lexer::new(inner, inner_line, inner_col)
            .run()?
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();
        if tokens.is_empty() {
            return Err(RillError::parse(
                codes::BAD_INTERPOLATION,
                "empty interpolation in string literal",
                str_loc,
            ));
        }
        Ok(tokens)
    }
}
