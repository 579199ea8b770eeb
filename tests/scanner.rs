#[cfg(test)]
mod scanner_tests {
    use rlox::scanner::*;
    use rlox::token::*;

    fn scan_all(source: &str) -> Vec<Result<Token, rlox::error::LoxError>> {
        Scanner::new(source.as_bytes().to_vec()).collect()
    }

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(
            tokens.len(),
            expected.len(),
            "token count mismatch for {:?}: got {:?}",
            source,
            tokens
        );

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type, "source: {:?}", source);
            assert_eq!(actual.lexeme, *expected_lexeme, "source: {:?}", source);
        }
    }

    #[test]
    fn test_scanner_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_extended_punctuation() {
        assert_token_sequence(
            "[ ] : ? | ;",
            &[
                (TokenType::LEFT_BRACKET, "["),
                (TokenType::RIGHT_BRACKET, "]"),
                (TokenType::COLON, ":"),
                (TokenType::QUESTION_MARK, "?"),
                (TokenType::PIPE, "|"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_operators() {
        assert_token_sequence(
            "! != = == > >= < <=",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_numbers() {
        let tokens: Vec<_> = Scanner::new(b"123 45.67".to_vec())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens.len(), 3);

        match tokens[0].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 123.0),
            ref other => panic!("expected NUMBER, got {:?}", other),
        }
        assert_eq!(tokens[0].lexeme, "123");

        match tokens[1].token_type {
            TokenType::NUMBER(n) => assert_eq!(n, 45.67),
            ref other => panic!("expected NUMBER, got {:?}", other),
        }
        assert_eq!(tokens[1].lexeme, "45.67");
    }

    #[test]
    fn test_scanner_number_followed_by_dot() {
        // A trailing dot is not part of the number literal.
        assert_token_sequence(
            "123.",
            &[
                (TokenType::NUMBER(0.0), "123"),
                (TokenType::DOT, "."),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_identifiers() {
        assert_token_sequence(
            "varName abc123 _test",
            &[
                (TokenType::IDENTIFIER, "varName"),
                (TokenType::IDENTIFIER, "abc123"),
                (TokenType::IDENTIFIER, "_test"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_string_literals() {
        let tokens: Vec<_> = Scanner::new(b"\"hello\" \"world\"".to_vec())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens.len(), 3);

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "hello"),
            other => panic!("expected STRING, got {:?}", other),
        }
        // The lexeme keeps the surrounding quotes.
        assert_eq!(tokens[0].lexeme, "\"hello\"");

        match &tokens[1].token_type {
            TokenType::STRING(s) => assert_eq!(s, "world"),
            other => panic!("expected STRING, got {:?}", other),
        }
    }

    #[test]
    fn test_scanner_multiline_string_advances_line() {
        let tokens: Vec<_> = Scanner::new(b"\"a\nb\" x".to_vec())
            .filter_map(Result::ok)
            .collect();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\nb"),
            other => panic!("expected STRING, got {:?}", other),
        }

        // The identifier after the string sits on line 2.
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_scanner_keywords() {
        assert_token_sequence(
            "and class else if nil or true false var while break continue type fun for print return super this",
            &[
                (TokenType::AND, "and"),
                (TokenType::CLASS, "class"),
                (TokenType::ELSE, "else"),
                (TokenType::IF, "if"),
                (TokenType::NIL, "nil"),
                (TokenType::OR, "or"),
                (TokenType::TRUE, "true"),
                (TokenType::FALSE, "false"),
                (TokenType::VAR, "var"),
                (TokenType::WHILE, "while"),
                (TokenType::BREAK, "break"),
                (TokenType::CONTINUE, "continue"),
                (TokenType::TYPE, "type"),
                (TokenType::FUN, "fun"),
                (TokenType::FOR, "for"),
                (TokenType::PRINT, "print"),
                (TokenType::RETURN, "return"),
                (TokenType::SUPER, "super"),
                (TokenType::THIS, "this"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_keyword_prefix_is_identifier() {
        assert_token_sequence(
            "classy orchid",
            &[
                (TokenType::IDENTIFIER, "classy"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_line_comments() {
        assert_token_sequence(
            "// this is a comment\n42",
            &[(TokenType::NUMBER(0.0), "42"), (TokenType::EOF, "")],
        );
    }

    #[test]
    fn test_scanner_block_comments() {
        assert_token_sequence(
            "/* this is\na block\ncomment */42",
            &[(TokenType::NUMBER(0.0), "42"), (TokenType::EOF, "")],
        );
    }

    #[test]
    fn test_scanner_block_comment_tracks_lines() {
        let tokens: Vec<_> = Scanner::new(b"/* a\nb\nc */ x".to_vec())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn test_scanner_comments_between_tokens() {
        assert_token_sequence(
            "(123 /* comment */ + /* another */ abc)",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::NUMBER(0.0), "123"),
                (TokenType::PLUS, "+"),
                (TokenType::IDENTIFIER, "abc"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_unterminated_block_comment() {
        let results = scan_all("/* unterminated");

        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unterminated block comment."));
    }

    #[test]
    fn test_scanner_unterminated_string() {
        let results = scan_all("\"open");

        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Unterminated string."));
    }

    #[test]
    fn test_scanner_continues_after_unexpected_chars() {
        let results = scan_all(",.$(#");

        // COMMA, DOT, error for '$', LEFT_PAREN, error for '#', EOF.
        assert_eq!(results.len(), 6);

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2);

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "error should mention the unexpected character, got: {}",
                err
            );
        }

        let kinds: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|t| t.token_type.clone())
            .collect();

        assert_eq!(
            kinds,
            vec![
                TokenType::COMMA,
                TokenType::DOT,
                TokenType::LEFT_PAREN,
                TokenType::EOF,
            ]
        );
    }

    #[test]
    fn test_scanner_eof_only() {
        let results = scan_all("");

        assert_eq!(results.len(), 1);

        match &results[0] {
            Ok(token) => assert_eq!(token.token_type, TokenType::EOF),
            Err(e) => panic!("expected EOF token, got error: {}", e),
        }
    }

    #[test]
    fn test_scanner_lexeme_round_trip() {
        // Concatenated lexemes reproduce the source minus trivia.
        let source = "var x = 1; // comment\nprint x + 2; /* block */";

        let significant: String = Scanner::new(source.as_bytes().to_vec())
            .filter_map(Result::ok)
            .map(|t| t.lexeme)
            .collect();

        assert_eq!(significant, "varx=1;printx+2;");
    }
}
