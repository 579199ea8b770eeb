use rlox::ast_printer::AstPrinter;
use rlox::error::LoxError;
use rlox::expr::Expr;
use rlox::parser::Parser;
use rlox::scanner::Scanner;
use rlox::stmt::Stmt;
use rlox::token::Token;

fn tokens_for(source: &str) -> Vec<Token> {
    Scanner::new(source.as_bytes().to_vec())
        .collect::<Result<Vec<_>, _>>()
        .expect("test source should scan cleanly")
}

fn parse_expr(source: &str) -> Result<Expr, LoxError> {
    Parser::new(tokens_for(source)).parse_expression()
}

fn parse_program(source: &str) -> Result<Vec<Stmt>, LoxError> {
    Parser::new(tokens_for(source)).parse()
}

#[test]
fn test_expression_forms() {
    let cases: Vec<(&str, &str)> = vec![
        // Literals
        ("123", "123.0"),
        ("45.67", "45.67"),
        ("\"hello\"", "hello"),
        ("true", "true"),
        ("false", "false"),
        ("nil", "nil"),
        // Unary
        ("-123", "(- 123.0)"),
        ("!true", "(! true)"),
        ("!!true", "(! (! true))"),
        // Binary and precedence
        ("1 + 2", "(+ 1.0 2.0)"),
        ("1 + 2 * 3", "(+ 1.0 (* 2.0 3.0))"),
        ("(1 + 2) * 3", "(* (group (+ 1.0 2.0)) 3.0)"),
        ("3 * (4 - 5)", "(* 3.0 (group (- 4.0 5.0)))"),
        ("1 + 2 * 3 - 4 / 5", "(- (+ 1.0 (* 2.0 3.0)) (/ 4.0 5.0))"),
        // Comparison and equality
        ("4 > 3", "(> 4.0 3.0)"),
        ("5 <= 6", "(<= 5.0 6.0)"),
        ("7 == 7", "(== 7.0 7.0)"),
        ("8 != 9", "(!= 8.0 9.0)"),
        ("1 < 2 == true", "(== (< 1.0 2.0) true)"),
        // Logical operators sit between assignment and equality
        ("a or b and c", "(or a (and b c))"),
        ("a and b or c", "(or (and a b) c)"),
        ("a == b or c", "(or (== a b) c)"),
        // Assignment is right-associative
        ("a = b = c", "(= a (= b c))"),
        ("a = 1 + 2", "(= a (+ 1.0 2.0))"),
        // Calls and properties chain in any order
        ("f()", "(call f)"),
        ("f(1, 2)", "(call f 1.0 2.0)"),
        ("f(1)(2)", "(call (call f 1.0) 2.0)"),
        ("a.b.c", "(. (. a b) c)"),
        ("a.b()", "(call (. a b))"),
        ("a.b = 1", "(set a b 1.0)"),
        ("a().b = c", "(set (call a) b c)"),
        // this / super
        ("this.x", "(. this x)"),
        ("super.method()", "(call (super method))"),
    ];

    for (input, expected) in cases {
        let expr = parse_expr(input)
            .unwrap_or_else(|e| panic!("parse failed for {:?}: {}", input, e));

        assert_eq!(AstPrinter::print(&expr), expected, "input: {:?}", input);
    }
}

#[test]
fn test_expression_errors() {
    let cases: Vec<(&str, &str)> = vec![
        ("(1 + )", "Expect expression."),
        ("5 + * 2", "Expect expression."),
        ("(1 + 2", "Expect ')' after expression."),
        ("+", "Expect expression."),
        ("! + 1", "Expect expression."),
        ("1 2", "Expect end of expression."),
        ("1 = 2", "Invalid assignment target."),
        ("a + b = c", "Invalid assignment target."),
        ("super.", "Expect superclass method name."),
        ("super", "Expect '.' after 'super'."),
    ];

    for (input, expected) in cases {
        match parse_expr(input) {
            Ok(expr) => panic!(
                "expected error for {:?}, parsed {}",
                input,
                AstPrinter::print(&expr)
            ),

            Err(e) => assert!(
                e.to_string().contains(expected),
                "input {:?}: expected {:?} in {:?}",
                input,
                expected,
                e.to_string()
            ),
        }
    }
}

#[test]
fn test_parse_error_format() {
    let err = parse_program("print 1").unwrap_err();

    assert_eq!(err.to_string(), "[line 1] Error at end: Expect ';' after value.");

    let err = parse_program("var 1 = 2;").unwrap_err();

    assert_eq!(err.to_string(), "[line 1] Error at '1': Expect variable name.");
}

#[test]
fn test_program_statement_count() {
    let statements = parse_program("var a = 1; print a; a = 2; { print a; }")
        .expect("program should parse");

    assert_eq!(statements.len(), 4);
}

#[test]
fn test_statement_errors() {
    let cases: Vec<(&str, &str)> = vec![
        ("var x = 1", "Expect ';' after variable declaration."),
        ("var = 1;", "Expect variable name."),
        ("if () print 1;", "Expect expression."),
        ("if (true print 1;", "Expect ')' after if condition."),
        ("while () print 1;", "Expect expression."),
        ("while (true print 1;", "Expect ')' after condition."),
        ("{ print 1;", "Expect '}' after block."),
        ("break", "Expect ';' after 'break'."),
        ("return 1", "Expect ';' after return value."),
        ("class {}", "Expect class name."),
        ("class A < {}", "Expect superclass name."),
        ("fun f(x { return x; }", "Expect ')' after parameters."),
    ];

    for (input, expected) in cases {
        match parse_program(input) {
            Ok(_) => panic!("expected error for {:?}", input),

            Err(e) => assert!(
                e.to_string().contains(expected),
                "input {:?}: expected {:?} in {:?}",
                input,
                expected,
                e.to_string()
            ),
        }
    }
}

#[test]
fn test_for_desugars_to_while() {
    let statements =
        parse_program("for (var i = 0; i < 3; i = i + 1) print i;").expect("should parse");

    assert_eq!(statements.len(), 1);

    // Initializer block wrapping a while whose body carries the increment.
    match &statements[0] {
        Stmt::Block(inner) => {
            assert_eq!(inner.len(), 2);
            assert!(matches!(inner[0], Stmt::Var { .. }));

            match &inner[1] {
                Stmt::While { body, .. } => match body.as_ref() {
                    Stmt::Block(body_parts) => {
                        assert_eq!(body_parts.len(), 2);
                        assert!(matches!(body_parts[1], Stmt::Expression(_)));
                    }

                    other => panic!("expected block body, got {:?}", other),
                },

                other => panic!("expected while, got {:?}", other),
            }
        }

        other => panic!("expected block, got {:?}", other),
    }
}

#[test]
fn test_for_with_empty_clauses() {
    // `for (;;)` becomes a bare `while (true)`.
    let statements = parse_program("for (;;) break;").expect("should parse");

    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::While { .. }));
}

#[test]
fn test_class_declaration_shapes() {
    let statements = parse_program(
        "class Breakfast { cook() { print \"eggs\"; } serve(who) { print who; } }",
    )
    .expect("should parse");

    match &statements[0] {
        Stmt::Class {
            name,
            superclass,
            methods,
        } => {
            assert_eq!(name.lexeme, "Breakfast");
            assert!(superclass.is_none());
            assert_eq!(methods.len(), 2);
            assert_eq!(methods[0].name.lexeme, "cook");
            assert_eq!(methods[1].params.len(), 1);
        }

        other => panic!("expected class, got {:?}", other),
    }

    let statements = parse_program("class B < A {}").expect("should parse");

    match &statements[0] {
        Stmt::Class { superclass, .. } => match superclass {
            Some(Expr::Variable { name, .. }) => assert_eq!(name.lexeme, "A"),
            other => panic!("expected superclass variable, got {:?}", other),
        },

        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn test_parameter_and_argument_limits() {
    // 256 parameters crosses the cap.
    let params = vec!["p"; 256].join(", ");
    let source = format!("fun big({}) {{ return 1; }}", params);

    let err = parse_program(&source).unwrap_err();
    assert!(err
        .to_string()
        .contains("Cannot have more than 255 parameters."));

    let args = vec!["1"; 256].join(", ");
    let source = format!("f({});", args);

    let err = parse_program(&source).unwrap_err();
    assert!(err
        .to_string()
        .contains("Cannot have more than 255 arguments."));

    // 255 exactly is fine.
    let params = vec!["p"; 255].join(", ");
    let source = format!("fun big({}) {{ return 1; }}", params);

    assert!(parse_program(&source).is_ok());
}

#[test]
fn test_distinct_expression_identities() {
    // Two parses of the same source never share node identities.
    let first = parse_expr("a").expect("should parse");
    let second = parse_expr("a").expect("should parse");

    match (first, second) {
        (Expr::Variable { id: a, .. }, Expr::Variable { id: b, .. }) => {
            assert_ne!(a, b);
        }

        _ => panic!("expected variable expressions"),
    }
}
