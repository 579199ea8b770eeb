use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use log::info;

use rlox::interpreter::Interpreter;
use rlox::parser::Parser;
use rlox::resolver::Resolver;
use rlox::scanner::Scanner;
use rlox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script file to execute; starts an interactive prompt when omitted.
    script: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.script.as_slice() {
        [] => run_prompt()?,

        [path] => run_file(path),

        _ => {
            println!("Usage: lox [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}

fn run_file(path: &Path) {
    let mut buf: Vec<u8> = Vec::new();

    let read_result = File::open(path).and_then(|file| {
        let mut reader: BufReader<File> = BufReader::new(file);
        reader.read_to_end(&mut buf)
    });

    if let Err(e) = read_result {
        eprintln!("Error reading file: {}", e);
        std::process::exit(1);
    }

    info!("Running file {} ({} bytes)", path.display(), buf.len());

    let mut interpreter = Interpreter::new();

    run_program(&buf, &mut interpreter);
}

fn run_prompt() -> io::Result<()> {
    let mut interpreter = Interpreter::new();

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();

        if stdin.read_line(&mut line)? == 0 {
            // End of input.
            break;
        }

        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        run_line(trimmed, &mut interpreter);
    }

    Ok(())
}

/// Scan the whole source, reporting lexical errors as they surface.  The
/// scanner recovers by itself, so one bad character costs one diagnostic,
/// not the rest of the token stream.
fn scan(source: &[u8]) -> (Vec<Token>, bool) {
    let scanner = Scanner::new(source.to_vec());

    let mut tokens: Vec<Token> = Vec::new();
    let mut had_error = false;

    for item in scanner {
        match item {
            Ok(token) => tokens.push(token),

            Err(e) => {
                eprintln!("{}", e);
                had_error = true;
            }
        }
    }

    (tokens, had_error)
}

/// Full pipeline for a program: scan, parse, resolve, interpret.  Any
/// reported error stops before the next stage runs; lexical and parse
/// errors can surface together.
fn run_program(source: &[u8], interpreter: &mut Interpreter) {
    let (tokens, had_lex_error) = scan(source);

    let mut parser = Parser::new(tokens);

    let statements = match parser.parse() {
        Ok(statements) => statements,

        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    if had_lex_error {
        return;
    }

    let mut resolver = Resolver::new(interpreter);

    if let Err(e) = resolver.resolve(&statements) {
        eprintln!("{}", e);
        return;
    }

    if let Err(e) = interpreter.interpret(&statements) {
        eprintln!("{}", e);
    }
}

/// One prompt line.  Program mode first; a line that does not parse as
/// statements is retried as a bare expression whose value gets printed.
fn run_line(source: &str, interpreter: &mut Interpreter) {
    let (tokens, had_lex_error) = scan(source.as_bytes());

    let mut parser = Parser::new(tokens.clone());

    match parser.parse() {
        Ok(statements) => {
            if had_lex_error {
                return;
            }

            let mut resolver = Resolver::new(interpreter);

            if let Err(e) = resolver.resolve(&statements) {
                eprintln!("{}", e);
                return;
            }

            if let Err(e) = interpreter.interpret(&statements) {
                eprintln!("{}", e);
            }
        }

        Err(program_error) => {
            let mut expr_parser = Parser::new(tokens);

            let expr = match expr_parser.parse_expression() {
                Ok(expr) if !had_lex_error => expr,

                _ => {
                    // Not an expression either; the statement-mode error
                    // is the one worth showing.
                    eprintln!("{}", program_error);
                    return;
                }
            };

            let mut resolver = Resolver::new(interpreter);

            if let Err(e) = resolver.resolve_expression(&expr) {
                eprintln!("{}", e);
                return;
            }

            match interpreter.interpret_expression(&expr) {
                Ok(value) => println!("{}", value),

                Err(e) => eprintln!("{}", e),
            }
        }
    }
}
