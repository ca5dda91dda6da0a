use std::{fs, io::Read, path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use ll1_workbench::{
    parse_rules, tokenize, Grammar, GrammarConfig, ParseOptions, RecoveryMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Productions
    Prod,
    /// Nullable, first and follow
    Nff,
    /// LL(1) parsing table
    Ll1,
    /// LL(1) conflicts with factoring hints
    Conflicts,
    /// Step-by-step parse of --input
    Trace,
    /// Derivation tree of --input
    Tree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Plain,
    Latex,
    Json,
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// What to print
    #[arg(required = true, value_enum)]
    outputs: Vec<Output>,

    /// File containing the grammar (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    grammar: Option<PathBuf>,

    /// Start symbol (default: left side of the first rule)
    #[arg(short, long, value_name = "SYMBOL")]
    start: Option<String>,

    /// Whitespace-separated tokens to parse
    #[arg(short, long, value_name = "TOKENS", default_value = "")]
    input: String,

    #[arg(long, default_value_t = 100)]
    max_steps: usize,

    /// Stop at the first empty table cell instead of recovering
    #[arg(long)]
    no_recovery: bool,

    /// JSON file with the symbol convention and ε placeholder
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,
}

fn load(cli: &Cli) -> Result<Grammar, String> {
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            GrammarConfig::from_json(&text).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => GrammarConfig::default(),
    };

    let text = match &cli.grammar {
        Some(path) => {
            fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| e.to_string())?;
            text
        }
    };

    let rules = parse_rules(&text, &config).map_err(|e| e.to_string())?;
    Grammar::build(&rules, cli.start.as_deref(), &config).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let g = match load(&cli) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = ParseOptions {
        max_steps: cli.max_steps,
        recovery: if cli.no_recovery {
            RecoveryMode::Disabled
        } else {
            RecoveryMode::PanicMode
        },
    };
    let parse = || g.run(&tokenize(&cli.input), &options);

    for output in &cli.outputs {
        let text = match (output, cli.format) {
            (Output::Prod, OutputFormat::Plain) => g.to_production_output_vec().to_plaintext(),
            (Output::Prod, OutputFormat::Latex) => g.to_production_output_vec().to_latex(),
            (Output::Prod, OutputFormat::Json) => g.to_production_output_vec().to_json(),
            (Output::Nff, OutputFormat::Plain) => g.to_non_terminal_output_vec().to_plaintext(),
            (Output::Nff, OutputFormat::Latex) => g.to_non_terminal_output_vec().to_latex(),
            (Output::Nff, OutputFormat::Json) => g.to_non_terminal_output_vec().to_json(),
            (Output::Ll1, OutputFormat::Plain) => g.to_ll1_parsing_table().to_plaintext(),
            (Output::Ll1, OutputFormat::Latex) => g.to_ll1_parsing_table().to_latex(),
            (Output::Ll1, OutputFormat::Json) => g.to_analysis().to_json(),
            (Output::Conflicts, OutputFormat::Json) => {
                serde_json::to_string(&g.to_analysis().conflicts).unwrap_or_default()
            }
            (Output::Conflicts, OutputFormat::Plain) => g.to_analysis().conflicts_to_plaintext(),
            (Output::Conflicts, OutputFormat::Latex) => g.to_analysis().conflicts_to_latex(),
            (Output::Trace, OutputFormat::Plain) => parse().to_plaintext(),
            (Output::Trace, OutputFormat::Latex) => parse().to_latex(),
            (Output::Trace, OutputFormat::Json) => parse().to_json(),
            (Output::Tree, OutputFormat::Json) => parse().tree.to_json(),
            (Output::Tree, OutputFormat::Plain) => parse().tree.to_bracketed(),
            (Output::Tree, OutputFormat::Latex) => parse().tree.to_latex(),
        };
        println!("{}", text);
    }

    ExitCode::SUCCESS
}
