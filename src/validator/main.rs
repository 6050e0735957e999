//! Standalone validator for quiz files.
//!
//! Checks a quiz JSON file the same way the bot checks uploads and reports
//! every faulty question instead of stopping at the first one.

use std::process::ExitCode;

use clap::Parser;

use quiz_bot::quiz::{Quiz, MIN_OPTIONS};

/// Quiz file validator.
#[derive(Parser, Debug)]
#[command(name = "validate_quiz")]
#[command(about = "Validates quiz JSON files for the Telegram quiz bot")]
#[command(version)]
struct Args {
    /// Path to the quiz JSON file to validate.
    #[arg(short, long, default_value = "quiz.json")]
    file: String,

    /// Generate an example quiz file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show every question, not only the faulty ones.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_quiz(&args.file, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = Quiz::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example quiz written to: {output_path}");
            println!("\nThe file contains {} example questions.", example.len());
            println!("Upload it to the bot as a document to create a quiz.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_quiz(path: &str, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let payload = match std::fs::read_to_string(path) {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("✗ Failed to read quiz file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let results = match Quiz::inspect(&payload) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    let total = results.len();
    let mut errors = 0;

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(question) => {
                if verbose {
                    println!(
                        "[{i}] \"{}\" ({} options, answer: \"{}\")",
                        truncate(&question.question, 40),
                        question.options.len(),
                        truncate(question.correct_answer().unwrap_or_default(), 20)
                    );
                    println!("  ✓ OK");
                }
            }
            Err(e) => {
                errors += 1;
                println!("[{i}]");
                println!("  ✗ Error: {e}");
            }
        }
    }

    println!();

    if errors == 0 {
        println!("✓ All {total} questions are valid!");
        println!(
            "\nEach question needs at least {MIN_OPTIONS} options and a zero-based correct_option."
        );
        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {errors} error(s) in {total} questions");
        println!("  Valid: {}/{total}", total - errors);
        ExitCode::FAILURE
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
