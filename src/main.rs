//! Small Basic Compiler CLI
//!
//! The `sbc` command drives the pipeline: lex → parse → analyze → generate →
//! emit. It owns everything presentational — diagnostic rendering, progress
//! output, token/AST dumps — and is the only place that turns "an error
//! exists" into "stop": after every stage it checks the sink and halts with
//! exit code 1 before invoking the next one.

use clap::Parser;
use smallbasic::ast::Program;
use smallbasic::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
use smallbasic::ir::CodeGenerator;
use smallbasic::lexer::tokenize;
use smallbasic::parser::parse;
use smallbasic::semantic::analyze;
use smallbasic::token::{Token, TokenKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sbc")]
#[command(version = smallbasic::VERSION)]
#[command(about = "Compiler for Small Basic programs", long_about = None)]
struct Cli {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Write a token stream dump to FILE (debugging aid)
    #[arg(long, value_name = "FILE")]
    export_tokens: Option<PathBuf>,

    /// Write an AST dump to FILE (debugging aid)
    #[arg(long, value_name = "FILE")]
    export_ast: Option<PathBuf>,

    /// Output path for the textual IR module
    #[arg(short, long, value_name = "FILE", default_value = "output.ll")]
    output: PathBuf,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)
        .map_err(|e| miette::miette!("Failed to read {}: {}", cli.input.display(), e))?;
    let filename = cli.input.display().to_string();

    println!("Compiling {}...", filename);

    let mut diagnostics = Diagnostics::new();

    let tokens = tokenize(&source, &mut diagnostics);
    check_gate(&diagnostics, &source, &filename);

    if let Some(path) = &cli.export_tokens {
        export_tokens(&tokens, path)
            .map_err(|e| miette::miette!("Failed to write {}: {}", path.display(), e))?;
        println!("Tokens exported to {}", path.display());
    }

    let program = parse(tokens, &mut diagnostics);
    check_gate(&diagnostics, &source, &filename);

    if let Some(path) = &cli.export_ast {
        export_ast(&program, path)
            .map_err(|e| miette::miette!("Failed to write {}: {}", path.display(), e))?;
        println!("AST exported to {}", path.display());
    }

    analyze(&program, &mut diagnostics);
    check_gate(&diagnostics, &source, &filename);

    let module_name = cli
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");

    let mut generator = CodeGenerator::new();
    generator.generate(&program, module_name, &mut diagnostics);
    check_gate(&diagnostics, &source, &filename);

    generator
        .emit(&cli.output)
        .map_err(|e| miette::miette!("Failed to write {}: {}", cli.output.display(), e))?;

    // A successful run still surfaces accumulated warnings and notes
    render_diagnostics(&diagnostics, &source, &filename);
    println!("Wrote {}", cli.output.display());

    Ok(())
}

/// Halt with exit code 1 if any stage has recorded an error
fn check_gate(diagnostics: &Diagnostics, source: &str, filename: &str) {
    if diagnostics.has_errors() {
        render_diagnostics(diagnostics, source, filename);
        std::process::exit(1);
    }
}

// ============ Debug exports ============

fn export_tokens(tokens: &[Token], path: &Path) -> io::Result<()> {
    let mut out = String::new();
    for token in tokens {
        if token.kind == TokenKind::Eof {
            continue;
        }
        out.push_str(&format!(
            "[{}:{}] {} : '{}'\n",
            token.line, token.column, token.kind, token.text
        ));
    }
    fs::write(path, out)
}

fn export_ast(program: &Program, path: &Path) -> io::Result<()> {
    fs::write(path, format!("{:#?}\n", program))
}

// ============ Diagnostic rendering ============

const RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const CYAN: &str = "\x1b[1;36m";
const BLUE: &str = "\x1b[1;34m";
const RESET: &str = "\x1b[0m";

fn render_diagnostics(diagnostics: &Diagnostics, source: &str, filename: &str) {
    for diagnostic in diagnostics.entries() {
        render_diagnostic(diagnostic, source, filename);
    }

    if diagnostics.has_errors() {
        let count = diagnostics.error_count();
        if count == 1 {
            eprintln!("{RED}error{RESET}: could not compile `{filename}` due to previous error");
        } else {
            eprintln!("{RED}error{RESET}: could not compile `{filename}` due to {count} previous errors");
        }
    }
}

fn render_diagnostic(diagnostic: &Diagnostic, source: &str, filename: &str) {
    let (level, color) = match diagnostic.level {
        DiagnosticLevel::Error => ("error", RED),
        DiagnosticLevel::Warning => ("warning", YELLOW),
        DiagnosticLevel::Note => ("note", CYAN),
    };
    let loc = diagnostic.location;

    eprintln!("{color}{level}{RESET}: {}", diagnostic.message);
    eprintln!("  {BLUE}-->{RESET} {}:{}:{}", filename, loc.line, loc.column);

    let line_text = source
        .lines()
        .nth((loc.line as usize).saturating_sub(1))
        .unwrap_or("");
    let gutter = loc.line.to_string().len();

    eprintln!("{:gutter$}  {BLUE}|{RESET}", "");
    eprintln!(" {BLUE}{} |{RESET} {}", loc.line, line_text);

    let carets = "^".repeat(loc.length);
    let padding = " ".repeat(loc.column as usize);
    match &diagnostic.hint {
        Some(hint) => eprintln!("{:gutter$}  {BLUE}|{RESET} {padding}{color}{carets}{RESET} {hint}", ""),
        None => eprintln!("{:gutter$}  {BLUE}|{RESET} {padding}{color}{carets}{RESET}", ""),
    }
    eprintln!("{:gutter$}  {BLUE}|{RESET}", "");
}
