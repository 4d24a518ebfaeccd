use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use primetower::*;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Inject a multi-material prime tower into a tokenized G-code stream
#[derive(Parser, Debug)]
#[command(name = "primetower")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON array of state-annotated tokens
    tokens: PathBuf,

    /// Configuration file (defaults to ~/.primetower/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the G-code here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep one tower layer per print layer
    #[arg(long)]
    no_optimize: bool,

    /// Print the report as JSON
    #[arg(long)]
    report_json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => TowerConfig::default_config_path()?,
    };
    let config = TowerConfig::load_from_path(&config_path)?;
    info!("Using config {}", config_path.display());

    let data = fs::read(&cli.tokens)
        .with_context(|| format!("read token stream {}", cli.tokens.display()))?;
    let tokens: Vec<Token> =
        serde_json::from_slice(&data).context("deserialize token stream")?;
    let mut tokens: InstructionList = tokens.into_iter().collect();

    let report = process(&mut tokens, &config, !cli.no_optimize)
        .with_context(|| format!("inject prime tower into {}", cli.tokens.display()))?;

    let gcode = render_gcode(&tokens);
    let mut text = gcode.lines.join("\n");
    text.push('\n');
    match &cli.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("write G-code {}", path.display()))?
        }
        None => std::io::stdout()
            .write_all(text.as_bytes())
            .context("write G-code to stdout")?,
    }

    if cli.report_json {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        eprintln!("{json}");
    } else {
        eprint!("{report}");
    }

    Ok(())
}
