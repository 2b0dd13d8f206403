#[cfg(test)]
mod scanner_tests {
    use stepscript as script;

    use script::scanner::*;
    use script::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let tokens = tokenize(source);

        assert_eq!(
            tokens.len(),
            expected.len(),
            "token count mismatch for {:?}: {:?}",
            source,
            tokens
        );

        for (actual, (expected_type, expected_literal)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.literal, *expected_literal);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({[*.,+%]});:",
            &[
                (TokenType::LPAREN, "("),
                (TokenType::LBRACE, "{"),
                (TokenType::LBRACKET, "["),
                (TokenType::ASTERISK, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::PERCENT, "%"),
                (TokenType::RBRACKET, "]"),
                (TokenType::RBRACE, "}"),
                (TokenType::RPAREN, ")"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::COLON, ":"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "== != <= >= && || += -= *= /= = < >",
            &[
                (TokenType::EQ, "=="),
                (TokenType::NOT_EQ, "!="),
                (TokenType::LT_EQ, "<="),
                (TokenType::GT_EQ, ">="),
                (TokenType::AND, "&&"),
                (TokenType::OR, "||"),
                (TokenType::PLUS_ASSIGN, "+="),
                (TokenType::MINUS_ASSIGN, "-="),
                (TokenType::ASTERISK_ASSIGN, "*="),
                (TokenType::SLASH_ASSIGN, "/="),
                (TokenType::ASSIGN, "="),
                (TokenType::LT, "<"),
                (TokenType::GT, ">"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "let const fn class extends new super elif foo _bar9",
            &[
                (TokenType::LET, "let"),
                (TokenType::CONST, "const"),
                (TokenType::FUNCTION, "fn"),
                (TokenType::CLASS, "class"),
                (TokenType::EXTENDS, "extends"),
                (TokenType::NEW, "new"),
                (TokenType::SUPER, "super"),
                (TokenType::ELIF, "elif"),
                (TokenType::IDENT, "foo"),
                (TokenType::IDENT, "_bar9"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_numbers() {
        assert_token_sequence(
            "42 3.14 .5 1e6 1.5e-3",
            &[
                (TokenType::INT, "42"),
                (TokenType::FLOAT, "3.14"),
                (TokenType::FLOAT, ".5"),
                (TokenType::FLOAT, "1e6"),
                (TokenType::FLOAT, "1.5e-3"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_member_access_after_integer() {
        // `1.len` must not swallow the dot into a float.
        assert_token_sequence(
            "1.len",
            &[
                (TokenType::INT, "1"),
                (TokenType::DOT, "."),
                (TokenType::IDENT, "len"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_06_string_escapes() {
        assert_token_sequence(
            r#""a\tb\n\"q\"""#,
            &[(TokenType::STRING, "a\tb\n\"q\""), (TokenType::EOF, "")],
        );
    }

    #[test]
    fn test_scanner_07_fstring_segments() {
        let tokens = tokenize(r#"f"x = {x + 1} {{ok}}""#);

        assert_eq!(tokens.len(), 2);

        match &tokens[0].token_type {
            TokenType::FSTRING(segments) => {
                assert_eq!(segments.len(), 3);
                assert_eq!(segments[0], FStringSegment::Text("x = ".into()));

                match &segments[1] {
                    FStringSegment::Expr { source, position } => {
                        assert_eq!(source, "x + 1");
                        assert_eq!(*position, Position::new(1, 8));
                    }
                    other => panic!("expected expression segment, got {:?}", other),
                }

                assert_eq!(segments[2], FStringSegment::Text(" {ok}".into()));
            }
            other => panic!("expected FSTRING, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_08_comments_and_positions() {
        let tokens = tokenize("let a = 1; // trailing\n  a");

        let ident = &tokens[5];
        assert_eq!(ident.token_type, TokenType::IDENT);
        assert_eq!(ident.position, Position::new(2, 3));
        assert_eq!(ident.to_string(), "IDENT a 2:3");
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let tokens = tokenize(",.$(#");

        // COMMA, DOT, ILLEGAL, LPAREN, ILLEGAL, EOF
        assert_eq!(tokens.len(), 6, "Expected 6 tokens");

        assert_eq!(tokens[0].token_type, TokenType::COMMA);
        assert_eq!(tokens[1].token_type, TokenType::DOT);
        assert_eq!(tokens[3].token_type, TokenType::LPAREN);
        assert_eq!(tokens[5].token_type, TokenType::EOF);

        let illegal: Vec<&Token> = tokens
            .iter()
            .filter(|t| t.is(&TokenType::ILLEGAL))
            .collect();
        assert_eq!(illegal.len(), 2, "Expected 2 illegal tokens");

        for token in illegal {
            assert!(
                token.literal.contains("unexpected character"),
                "Diagnostic should mention the unexpected character, got: {}",
                token.literal
            );
        }
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = tokenize("\"abc");

        assert_eq!(tokens[0].token_type, TokenType::ILLEGAL);
        assert_eq!(tokens[0].literal, "unterminated string");
        assert_eq!(tokens.last().map(|t| t.token_type.name()), Some("EOF"));
    }

    #[test]
    fn test_scanner_is_fused() {
        let mut scanner = Scanner::new("x");

        assert!(scanner.next().is_some());
        assert!(scanner.next().is_some());
        assert!(scanner.next().is_none());
        assert!(scanner.next().is_none());
    }
}
