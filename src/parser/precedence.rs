use crate::token::TokenType;

/// Binding power of infix operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Assign,      // = += -= *= /=
    Or,          // ||
    And,         // &&
    Equals,      // == !=
    LessGreater, // < > <= >=
    Sum,         // + -
    Product,     // * / %
    Prefix,      // -x !x
    Call,        // f(x) a[i] a.b
}

/// Maps token types to the precedence of the infix operator they start.
pub struct PrecedenceTable;

impl PrecedenceTable {
    pub fn lookup(token_type: &TokenType) -> Precedence {
        match token_type {
            TokenType::ASSIGN
            | TokenType::PLUS_ASSIGN
            | TokenType::MINUS_ASSIGN
            | TokenType::ASTERISK_ASSIGN
            | TokenType::SLASH_ASSIGN => Precedence::Assign,
            TokenType::OR => Precedence::Or,
            TokenType::AND => Precedence::And,
            TokenType::EQ | TokenType::NOT_EQ => Precedence::Equals,
            TokenType::LT | TokenType::GT | TokenType::LT_EQ | TokenType::GT_EQ => {
                Precedence::LessGreater
            }
            TokenType::PLUS | TokenType::MINUS => Precedence::Sum,
            TokenType::ASTERISK | TokenType::SLASH | TokenType::PERCENT => Precedence::Product,
            TokenType::LPAREN | TokenType::LBRACKET | TokenType::DOT => Precedence::Call,
            _ => Precedence::Lowest,
        }
    }

    /// The level one below `precedence`, used to parse right‑associative
    /// operators.
    pub fn below(precedence: Precedence) -> Precedence {
        match precedence {
            Precedence::Lowest | Precedence::Assign => Precedence::Lowest,
            Precedence::Or => Precedence::Assign,
            Precedence::And => Precedence::Or,
            Precedence::Equals => Precedence::And,
            Precedence::LessGreater => Precedence::Equals,
            Precedence::Sum => Precedence::LessGreater,
            Precedence::Product => Precedence::Sum,
            Precedence::Prefix => Precedence::Product,
            Precedence::Call => Precedence::Prefix,
        }
    }
}
