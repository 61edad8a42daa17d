//! JavaScript lexer/tokenizer
//!
//! Produces tokens for the interpreter's parser. Covers the syntax learners
//! write in exercises: template literals with nested substitutions, regular
//! expression literals (disambiguated from division by the previous token),
//! numeric separators and every ES2020 punctuator.

pub mod numeric;
mod token;

pub use token::{Keyword, Token, TokenKind};

use crate::error::{Error, Result, SourceLocation};
use token::PUNCTUATORS;

/// A lexer for JavaScript source code
pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    line: u32,
    column: u32,
    /// Set when whitespace skipped before the current token held a newline
    saw_newline: bool,
    /// Kind of the last significant token, for regex/division disambiguation
    last_kind: Option<TokenKind>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source code
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            saw_newline: false,
            last_kind: None,
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn error(&self, message: impl Into<String>, location: SourceLocation) -> Error {
        Error::lexer_error_with_context(message, location, self.source)
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.saw_newline = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.advance();
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.advance_while(char::is_whitespace);
            if self.rest().starts_with("//") {
                self.advance_while(|c| c != '\n');
            } else if self.rest().starts_with("/*") {
                let start = self.location();
                self.advance();
                self.advance();
                loop {
                    if self.rest().starts_with("*/") {
                        self.advance();
                        self.advance();
                        break;
                    }
                    if self.advance().is_none() {
                        return Err(self.error("Unterminated comment", start));
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn is_id_start(c: char) -> bool {
        c == '_' || c == '$' || unicode_xid::UnicodeXID::is_xid_start(c)
    }

    fn is_id_continue(c: char) -> bool {
        c == '_' || c == '$' || unicode_xid::UnicodeXID::is_xid_continue(c)
    }

    fn token(&self, kind: TokenKind, start: usize, location: SourceLocation) -> Token<'src> {
        Token {
            kind,
            text: &self.source[start..self.pos],
            location,
            newline_before: false,
        }
    }

    fn scan_identifier(&mut self, start: usize, location: SourceLocation) -> Token<'src> {
        self.advance_while(Self::is_id_continue);
        let text = &self.source[start..self.pos];
        let kind = Keyword::lookup(text)
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);
        self.token(kind, start, location)
    }

    fn scan_number(&mut self, start: usize, location: SourceLocation) -> Result<Token<'src>> {
        let radix_digit: Option<fn(char) -> bool> = if self.peek() == Some('0') {
            match self.peek_next() {
                Some('x' | 'X') => Some(|c: char| c.is_ascii_hexdigit()),
                Some('b' | 'B') => Some(|c: char| c == '0' || c == '1'),
                Some('o' | 'O') => Some(|c: char| ('0'..='7').contains(&c)),
                _ => None,
            }
        } else {
            None
        };

        if let Some(is_digit) = radix_digit {
            self.advance();
            self.advance();
            self.advance_while(|c| is_digit(c) || c == '_');
        } else {
            self.advance_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek() == Some('.') {
                self.advance();
                self.advance_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                self.advance_while(|c| c.is_ascii_digit());
            }
        }

        if self.peek() == Some('n') {
            return Err(self.error("BigInt literals are not supported", location));
        }
        if self.peek().is_some_and(Self::is_id_start) {
            return Err(self.error("Invalid or unexpected token", self.location()));
        }
        Ok(self.token(TokenKind::NumberLiteral, start, location))
    }

    fn scan_string(
        &mut self,
        quote: char,
        start: usize,
        location: SourceLocation,
    ) -> Result<Token<'src>> {
        self.advance();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error("Invalid or unexpected token", location));
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(c) => {
                    self.advance();
                    if c == quote {
                        break;
                    }
                }
            }
        }
        Ok(self.token(TokenKind::StringLiteral, start, location))
    }

    /// Scan template text up to a closing backtick or a `${`. The opening
    /// delimiter (backtick or `}`) has already been consumed.
    fn scan_template_text(&mut self, location: SourceLocation) -> Result<bool> {
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated template literal", location)),
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('`') => {
                    self.advance();
                    return Ok(false);
                }
                Some('$') if self.peek_next() == Some('{') => {
                    self.advance();
                    self.advance();
                    return Ok(true);
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn scan_template(&mut self, start: usize, location: SourceLocation) -> Result<Token<'src>> {
        self.advance();
        let kind = if self.scan_template_text(location)? {
            TokenKind::TemplateHead
        } else {
            TokenKind::TemplateLiteral
        };
        Ok(self.token(kind, start, location))
    }

    /// Continue a template literal after the `}` that closes a substitution.
    /// The returned token's text starts at that `}`.
    pub fn scan_template_continuation(&mut self) -> Result<Token<'src>> {
        let location = self.location();
        let start = self.pos;
        if self.peek() != Some('}') {
            return Err(self.error("Expected '}' to close template substitution", location));
        }
        self.advance();
        let kind = if self.scan_template_text(location)? {
            TokenKind::TemplateMiddle
        } else {
            TokenKind::TemplateTail
        };
        Ok(self.token(kind, start, location))
    }

    fn scan_regex(&mut self, start: usize, location: SourceLocation) -> Result<Token<'src>> {
        self.advance();
        let mut in_class = false;
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(self.error("Invalid regular expression: missing /", location))
                }
                Some('\\') => {
                    self.advance();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        self.advance_while(Self::is_id_continue);
        Ok(self.token(TokenKind::RegexLiteral, start, location))
    }

    fn scan_punctuator(&mut self, start: usize, location: SourceLocation) -> Result<Token<'src>> {
        let rest = self.rest();
        let found = PUNCTUATORS.iter().find(|(text, kind)| {
            rest.starts_with(text)
                // `a?.5:b` is a conditional, not optional chaining
                && !(*kind == TokenKind::QuestionDot
                    && rest[2..].starts_with(|c: char| c.is_ascii_digit()))
        });
        let Some(&(text, kind)) = found else {
            let c = self.peek().unwrap_or_default();
            return Err(self.error(format!("Invalid or unexpected token '{}'", c), location));
        };
        for _ in 0..text.len() {
            self.advance();
        }
        Ok(self.token(kind, start, location))
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token<'src>> {
        self.saw_newline = false;
        self.skip_trivia()?;
        let newline_before = self.saw_newline;
        let location = self.location();
        let start = self.pos;

        let mut token = match self.peek() {
            None => self.token(TokenKind::Eof, start, location),
            Some(c) if Self::is_id_start(c) => self.scan_identifier(start, location),
            Some(c)
                if c.is_ascii_digit()
                    || (c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit())) =>
            {
                self.scan_number(start, location)?
            }
            Some(q @ ('"' | '\'')) => self.scan_string(q, start, location)?,
            Some('`') => self.scan_template(start, location)?,
            Some('/') if !self.last_kind.is_some_and(|k| k.ends_operand()) => {
                self.scan_regex(start, location)?
            }
            Some(_) => self.scan_punctuator(start, location)?,
        };

        token.newline_before = newline_before;
        self.last_kind = Some(token.kind);
        Ok(token)
    }

    /// Tokenize the entire source, splicing template continuations in place
    /// of the `}` that closes each substitution.
    pub fn tokenize(&mut self) -> Result<Vec<Token<'src>>> {
        let mut tokens = Vec::new();
        // One entry per open template substitution: braces opened inside it
        let mut substitutions: Vec<u32> = Vec::new();

        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::Eof => {
                    tokens.push(token);
                    return Ok(tokens);
                }
                TokenKind::TemplateHead => substitutions.push(0),
                TokenKind::LeftBrace => {
                    if let Some(depth) = substitutions.last_mut() {
                        *depth += 1;
                    }
                }
                TokenKind::RightBrace if substitutions.last() == Some(&0) => {
                    // Rewind onto the `}` so the continuation owns it
                    self.pos = token.location.offset;
                    self.line = token.location.line;
                    self.column = token.location.column;
                    let continuation = self.scan_template_continuation()?;
                    if continuation.kind == TokenKind::TemplateTail {
                        substitutions.pop();
                    }
                    self.last_kind = Some(continuation.kind);
                    tokens.push(continuation);
                    continue;
                }
                TokenKind::RightBrace => {
                    if let Some(depth) = substitutions.last_mut() {
                        *depth -= 1;
                    }
                }
                _ => {}
            }
            tokens.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = Lexer::new("let total = of").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Let));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "total");
        assert_eq!(tokens[3].kind, TokenKind::Keyword(Keyword::Of));
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::new("42 3.14 0xFF 0b1010 0o17 1e3 1_000 .5").tokenize().unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(
            texts,
            vec!["42", "3.14", "0xFF", "0b1010", "0o17", "1e3", "1_000", ".5", ""]
        );
    }

    #[test]
    fn test_bigint_rejected() {
        assert!(Lexer::new("10n").tokenize().is_err());
    }

    #[test]
    fn test_strings() {
        let tokens = Lexer::new(r#""a \"b\"" 'c'"#).tokenize().unwrap();
        assert_eq!(tokens[0].text, r#""a \"b\"""#);
        assert_eq!(tokens[1].text, "'c'");
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("let s = 'oops\n").tokenize().unwrap_err();
        assert!(err.to_string().contains("Invalid or unexpected token"));
    }

    #[test]
    fn test_longest_punctuator() {
        assert_eq!(
            kinds("a >>>= b ?? c?.d"),
            vec![
                TokenKind::Identifier,
                TokenKind::GreaterGreaterGreaterEquals,
                TokenKind::Identifier,
                TokenKind::QuestionQuestion,
                TokenKind::Identifier,
                TokenKind::QuestionDot,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_conditional_with_decimal_is_not_optional_chain() {
        assert_eq!(kinds("a?.5:1")[1], TokenKind::Question);
    }

    #[test]
    fn test_regex_versus_division() {
        assert_eq!(kinds("x = /ab+c/gi")[2], TokenKind::RegexLiteral);
        assert_eq!(kinds("a / b / c")[1], TokenKind::Slash);
        let tokens = Lexer::new("s.replace(/[/]/g, '')").tokenize().unwrap();
        assert_eq!(tokens[4].text, "/[/]/g");
    }

    #[test]
    fn test_comments_and_newlines() {
        let tokens = Lexer::new("a // one\n/* two */ b").tokenize().unwrap();
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[1].text, "b");
        assert!(tokens[1].newline_before);
        assert!(!tokens[0].newline_before);
    }

    #[test]
    fn test_template_with_nested_braces() {
        let tokens = Lexer::new("`a${ {x: 1}.x }b${y}c`").tokenize().unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::TemplateHead);
        assert!(kinds.contains(&TokenKind::TemplateMiddle));
        let tail = tokens
            .iter()
            .find(|t| t.kind == TokenKind::TemplateTail)
            .unwrap();
        assert_eq!(tail.text, "}c`");
    }

    #[test]
    fn test_location_tracking() {
        let tokens = Lexer::new("a\n  b").tokenize().unwrap();
        assert_eq!(tokens[1].location.line, 2);
        assert_eq!(tokens[1].location.column, 3);
    }
}
