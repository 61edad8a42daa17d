//! Token definitions for the JavaScript lexer

use crate::error::SourceLocation;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    /// The kind of token
    pub kind: TokenKind,
    /// The source text of the token
    pub text: &'src str,
    /// Location in source
    pub location: SourceLocation,
    /// A line terminator separates this token from the previous one
    pub newline_before: bool,
}

/// The kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    NumberLiteral,
    StringLiteral,
    /// Template literal with no substitutions (`hello`)
    TemplateLiteral,
    /// Template head up to and including the first `${`
    TemplateHead,
    /// Template text between `}` and the next `${`
    TemplateMiddle,
    /// Template text after the last `}` including the closing backtick
    TemplateTail,
    /// Regular expression literal (/pattern/flags)
    RegexLiteral,

    Identifier,
    Keyword(Keyword),

    // Punctuators
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Dot,
    DotDotDot,
    Semicolon,
    Comma,
    Colon,
    Question,
    QuestionDot,
    QuestionQuestion,
    QuestionQuestionEquals,
    Arrow,

    // Arithmetic
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,

    // Comparison
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    EqualsEquals,
    EqualsEqualsEquals,
    BangEquals,
    BangEqualsEquals,

    // Bitwise
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LessLess,
    GreaterGreater,
    GreaterGreaterGreater,

    // Logical
    Bang,
    AmpersandAmpersand,
    PipePipe,

    // Assignment
    Equals,
    PlusEquals,
    MinusEquals,
    StarEquals,
    StarStarEquals,
    SlashEquals,
    PercentEquals,
    LessLessEquals,
    GreaterGreaterEquals,
    GreaterGreaterGreaterEquals,
    AmpersandEquals,
    PipeEquals,
    CaretEquals,
    AmpersandAmpersandEquals,
    PipePipeEquals,

    /// End of input
    Eof,
}

/// Punctuators ordered so that the longest spelling is tried first
pub(crate) const PUNCTUATORS: &[(&str, TokenKind)] = &[
    (">>>=", TokenKind::GreaterGreaterGreaterEquals),
    ("...", TokenKind::DotDotDot),
    ("===", TokenKind::EqualsEqualsEquals),
    ("!==", TokenKind::BangEqualsEquals),
    ("**=", TokenKind::StarStarEquals),
    ("<<=", TokenKind::LessLessEquals),
    (">>=", TokenKind::GreaterGreaterEquals),
    (">>>", TokenKind::GreaterGreaterGreater),
    ("&&=", TokenKind::AmpersandAmpersandEquals),
    ("||=", TokenKind::PipePipeEquals),
    ("??=", TokenKind::QuestionQuestionEquals),
    ("=>", TokenKind::Arrow),
    ("==", TokenKind::EqualsEquals),
    ("!=", TokenKind::BangEquals),
    ("<=", TokenKind::LessEquals),
    (">=", TokenKind::GreaterEquals),
    ("&&", TokenKind::AmpersandAmpersand),
    ("||", TokenKind::PipePipe),
    ("??", TokenKind::QuestionQuestion),
    ("?.", TokenKind::QuestionDot),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("**", TokenKind::StarStar),
    ("<<", TokenKind::LessLess),
    (">>", TokenKind::GreaterGreater),
    ("+=", TokenKind::PlusEquals),
    ("-=", TokenKind::MinusEquals),
    ("*=", TokenKind::StarEquals),
    ("/=", TokenKind::SlashEquals),
    ("%=", TokenKind::PercentEquals),
    ("&=", TokenKind::AmpersandEquals),
    ("|=", TokenKind::PipeEquals),
    ("^=", TokenKind::CaretEquals),
    ("(", TokenKind::LeftParen),
    (")", TokenKind::RightParen),
    ("{", TokenKind::LeftBrace),
    ("}", TokenKind::RightBrace),
    ("[", TokenKind::LeftBracket),
    ("]", TokenKind::RightBracket),
    (".", TokenKind::Dot),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    ("?", TokenKind::Question),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("&", TokenKind::Ampersand),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
    ("=", TokenKind::Equals),
];

/// JavaScript keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Await,
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Export,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    Let,
    New,
    Null,
    Return,
    Super,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,

    // Contextual keywords, valid as identifiers
    Async,
    Get,
    Of,
    Set,
    Static,
}

impl Keyword {
    const ALL: &'static [Keyword] = &[
        Keyword::Await,
        Keyword::Break,
        Keyword::Case,
        Keyword::Catch,
        Keyword::Class,
        Keyword::Const,
        Keyword::Continue,
        Keyword::Debugger,
        Keyword::Default,
        Keyword::Delete,
        Keyword::Do,
        Keyword::Else,
        Keyword::Export,
        Keyword::Extends,
        Keyword::False,
        Keyword::Finally,
        Keyword::For,
        Keyword::Function,
        Keyword::If,
        Keyword::Import,
        Keyword::In,
        Keyword::Instanceof,
        Keyword::Let,
        Keyword::New,
        Keyword::Null,
        Keyword::Return,
        Keyword::Super,
        Keyword::Switch,
        Keyword::This,
        Keyword::Throw,
        Keyword::True,
        Keyword::Try,
        Keyword::Typeof,
        Keyword::Var,
        Keyword::Void,
        Keyword::While,
        Keyword::With,
        Keyword::Yield,
        Keyword::Async,
        Keyword::Get,
        Keyword::Of,
        Keyword::Set,
        Keyword::Static,
    ];

    /// Look up the keyword spelled by `text`
    pub fn lookup(text: &str) -> Option<Keyword> {
        Self::ALL.iter().copied().find(|kw| kw.as_str() == text)
    }

    /// Contextual keywords may be used as binding names
    pub fn is_contextual(&self) -> bool {
        matches!(
            self,
            Keyword::Async | Keyword::Get | Keyword::Of | Keyword::Set | Keyword::Static
        )
    }

    /// Get the string representation of the keyword
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Await => "await",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Catch => "catch",
            Keyword::Class => "class",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Debugger => "debugger",
            Keyword::Default => "default",
            Keyword::Delete => "delete",
            Keyword::Do => "do",
            Keyword::Else => "else",
            Keyword::Export => "export",
            Keyword::Extends => "extends",
            Keyword::False => "false",
            Keyword::Finally => "finally",
            Keyword::For => "for",
            Keyword::Function => "function",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::In => "in",
            Keyword::Instanceof => "instanceof",
            Keyword::Let => "let",
            Keyword::New => "new",
            Keyword::Null => "null",
            Keyword::Return => "return",
            Keyword::Super => "super",
            Keyword::Switch => "switch",
            Keyword::This => "this",
            Keyword::Throw => "throw",
            Keyword::True => "true",
            Keyword::Try => "try",
            Keyword::Typeof => "typeof",
            Keyword::Var => "var",
            Keyword::Void => "void",
            Keyword::While => "while",
            Keyword::With => "with",
            Keyword::Yield => "yield",
            Keyword::Async => "async",
            Keyword::Get => "get",
            Keyword::Of => "of",
            Keyword::Set => "set",
            Keyword::Static => "static",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TokenKind {
    /// Check if this token is an assignment operator
    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Equals
                | TokenKind::PlusEquals
                | TokenKind::MinusEquals
                | TokenKind::StarEquals
                | TokenKind::StarStarEquals
                | TokenKind::SlashEquals
                | TokenKind::PercentEquals
                | TokenKind::LessLessEquals
                | TokenKind::GreaterGreaterEquals
                | TokenKind::GreaterGreaterGreaterEquals
                | TokenKind::AmpersandEquals
                | TokenKind::PipeEquals
                | TokenKind::CaretEquals
                | TokenKind::AmpersandAmpersandEquals
                | TokenKind::PipePipeEquals
                | TokenKind::QuestionQuestionEquals
        )
    }

    /// After these tokens a `/` is a division operator rather than the start
    /// of a regular expression literal.
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::NumberLiteral
                | TokenKind::StringLiteral
                | TokenKind::TemplateLiteral
                | TokenKind::TemplateTail
                | TokenKind::RegexLiteral
                | TokenKind::RightParen
                | TokenKind::RightBracket
                | TokenKind::RightBrace
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::Keyword(
                    Keyword::This | Keyword::Super | Keyword::True | Keyword::False | Keyword::Null
                )
        ) || matches!(self, TokenKind::Keyword(kw) if kw.is_contextual())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(Keyword::lookup("instanceof"), Some(Keyword::Instanceof));
        assert_eq!(Keyword::lookup("of"), Some(Keyword::Of));
        assert_eq!(Keyword::lookup("banana"), None);
    }

    #[test]
    fn test_punctuators_longest_first() {
        for (i, (text, _)) in PUNCTUATORS.iter().enumerate() {
            for (later, _) in &PUNCTUATORS[i + 1..] {
                assert!(
                    !later.starts_with(text) || later == text,
                    "{} shadows {}",
                    text,
                    later
                );
            }
        }
    }
}
