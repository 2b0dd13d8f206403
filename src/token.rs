use log::debug;
use phf::phf_map;
use serde::Serialize;
use std::fmt;
use std::mem;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "fn"       => TokenType::FUNCTION,
    "let"      => TokenType::LET,
    "const"    => TokenType::CONST,
    "true"     => TokenType::TRUE,
    "false"    => TokenType::FALSE,
    "if"       => TokenType::IF,
    "elif"     => TokenType::ELIF,
    "else"     => TokenType::ELSE,
    "return"   => TokenType::RETURN,
    "while"    => TokenType::WHILE,
    "for"      => TokenType::FOR,
    "break"    => TokenType::BREAK,
    "continue" => TokenType::CONTINUE,
    "null"     => TokenType::NULL,
    "class"    => TokenType::CLASS,
    "extends"  => TokenType::EXTENDS,
    "new"      => TokenType::NEW,
    "super"    => TokenType::SUPER,
};

/// Resolve an identifier lexeme to its keyword token type, or `IDENT`.
pub fn lookup_ident(ident: &str) -> TokenType {
    KEYWORDS.get(ident).cloned().unwrap_or(TokenType::IDENT)
}

/// 1‑based source position of a token's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One piece of an interpolated string literal.
///
/// Embedded expressions are kept as source text; the parser re‑lexes them
/// starting at `position` so diagnostics point into the original file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FStringSegment {
    Text(String),
    Expr { source: String, position: Position },
}

/// The different kinds of tokens recognized by the scanner.
///
/// Only `FSTRING` carries a payload: the already split segments of the
/// interpolated literal.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// Unrecognized input; the token literal holds the diagnostic.
    ILLEGAL,

    /// End‑of‑file marker
    EOF,

    // ── identifiers and literals ────────────────────────────────────────
    IDENT,
    INT,
    FLOAT,
    STRING,
    FSTRING(Vec<FStringSegment>),

    // ── operators ───────────────────────────────────────────────────────
    /// '='
    ASSIGN,
    /// '+'
    PLUS,
    /// '-'
    MINUS,
    /// '!'
    BANG,
    /// '*'
    ASTERISK,
    /// '/'
    SLASH,
    /// '%'
    PERCENT,
    /// '<'
    LT,
    /// '>'
    GT,
    /// '<='
    LT_EQ,
    /// '>='
    GT_EQ,
    /// '=='
    EQ,
    /// '!='
    NOT_EQ,
    /// '&&'
    AND,
    /// '||'
    OR,
    /// '+='
    PLUS_ASSIGN,
    /// '-='
    MINUS_ASSIGN,
    /// '*='
    ASTERISK_ASSIGN,
    /// '/='
    SLASH_ASSIGN,

    // ── delimiters ──────────────────────────────────────────────────────
    COMMA,
    SEMICOLON,
    COLON,
    DOT,
    LPAREN,
    RPAREN,
    LBRACE,
    RBRACE,
    LBRACKET,
    RBRACKET,

    // ── keywords ────────────────────────────────────────────────────────
    FUNCTION,
    LET,
    CONST,
    TRUE,
    FALSE,
    IF,
    ELIF,
    ELSE,
    RETURN,
    WHILE,
    FOR,
    BREAK,
    CONTINUE,
    NULL,
    CLASS,
    EXTENDS,
    NEW,
    SUPER,
}

impl PartialEq for TokenType {
    /// Two TokenTypes are equal if they share the same variant
    /// (ignoring any inner data). Uses `mem::discriminant` to compare.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl TokenType {
    /// Variant name without payload, as shown in token listings.
    pub fn name(&self) -> &'static str {
        match self {
            TokenType::ILLEGAL => "ILLEGAL",
            TokenType::EOF => "EOF",
            TokenType::IDENT => "IDENT",
            TokenType::INT => "INT",
            TokenType::FLOAT => "FLOAT",
            TokenType::STRING => "STRING",
            TokenType::FSTRING(_) => "FSTRING",
            TokenType::ASSIGN => "ASSIGN",
            TokenType::PLUS => "PLUS",
            TokenType::MINUS => "MINUS",
            TokenType::BANG => "BANG",
            TokenType::ASTERISK => "ASTERISK",
            TokenType::SLASH => "SLASH",
            TokenType::PERCENT => "PERCENT",
            TokenType::LT => "LT",
            TokenType::GT => "GT",
            TokenType::LT_EQ => "LT_EQ",
            TokenType::GT_EQ => "GT_EQ",
            TokenType::EQ => "EQ",
            TokenType::NOT_EQ => "NOT_EQ",
            TokenType::AND => "AND",
            TokenType::OR => "OR",
            TokenType::PLUS_ASSIGN => "PLUS_ASSIGN",
            TokenType::MINUS_ASSIGN => "MINUS_ASSIGN",
            TokenType::ASTERISK_ASSIGN => "ASTERISK_ASSIGN",
            TokenType::SLASH_ASSIGN => "SLASH_ASSIGN",
            TokenType::COMMA => "COMMA",
            TokenType::SEMICOLON => "SEMICOLON",
            TokenType::COLON => "COLON",
            TokenType::DOT => "DOT",
            TokenType::LPAREN => "LPAREN",
            TokenType::RPAREN => "RPAREN",
            TokenType::LBRACE => "LBRACE",
            TokenType::RBRACE => "RBRACE",
            TokenType::LBRACKET => "LBRACKET",
            TokenType::RBRACKET => "RBRACKET",
            TokenType::FUNCTION => "FUNCTION",
            TokenType::LET => "LET",
            TokenType::CONST => "CONST",
            TokenType::TRUE => "TRUE",
            TokenType::FALSE => "FALSE",
            TokenType::IF => "IF",
            TokenType::ELIF => "ELIF",
            TokenType::ELSE => "ELSE",
            TokenType::RETURN => "RETURN",
            TokenType::WHILE => "WHILE",
            TokenType::FOR => "FOR",
            TokenType::BREAK => "BREAK",
            TokenType::CONTINUE => "CONTINUE",
            TokenType::NULL => "NULL",
            TokenType::CLASS => "CLASS",
            TokenType::EXTENDS => "EXTENDS",
            TokenType::NEW => "NEW",
            TokenType::SUPER => "SUPER",
        }
    }

    /// Keywords that can begin a statement; the parser resynchronizes on them.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenType::LET
                | TokenType::CONST
                | TokenType::RETURN
                | TokenType::WHILE
                | TokenType::FOR
                | TokenType::BREAK
                | TokenType::CONTINUE
                | TokenType::CLASS
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scanned token: its type, the literal text it stands for, and where its
/// first character sits in the source.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token {
    /// The category of this token.
    pub token_type: TokenType,

    /// Source lexeme; for strings the unescaped contents, for `ILLEGAL`
    /// the diagnostic message.
    pub literal: String,

    pub position: Position,
}

impl Token {
    /// Create a new Token with the given type, literal and position.
    pub fn new<S: Into<String>>(token_type: TokenType, literal: S, position: Position) -> Self {
        let literal: String = literal.into();

        debug!(
            "Creating new token: type={}, literal={}, at={}",
            token_type, literal, position
        );

        Self {
            token_type,
            literal,
            position,
        }
    }

    pub fn eof(position: Position) -> Self {
        Self::new(TokenType::EOF, "", position)
    }

    #[inline]
    pub fn is(&self, token_type: &TokenType) -> bool {
        self.token_type == *token_type
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.token_type.name(),
            self.literal,
            self.position
        )
    }
}
