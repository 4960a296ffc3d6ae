#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for the Maze Lab sandbox.

mod commands;
mod config;
mod level_store;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use maze_lab_core::SyntaxTag;
use maze_lab_system_session::MAX_SIZE;

#[derive(Debug, Parser)]
#[command(
    name = "maze-lab",
    version,
    about = "Generate mazes and run maze-solving programs against them"
)]
struct Cli {
    /// Configuration file; a missing file means defaults.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Subcommands,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Print a freshly generated maze.
    Generate {
        /// Side length of the maze.
        #[arg(long, default_value_t = 11, value_parser = parse_size)]
        size: u32,
        /// Seed for a reproducible layout.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a program once and print its trail and result.
    Run {
        /// Program source file.
        file: PathBuf,
        /// Authoring syntax; inferred from the file extension when omitted.
        #[arg(long, value_enum)]
        syntax: Option<SyntaxArg>,
        /// Side length of the maze.
        #[arg(long, default_value_t = 11, value_parser = parse_size)]
        size: u32,
        /// Seed for a reproducible layout.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the primitive-call translation of an indented program.
    Normalize {
        /// Program source file.
        file: PathBuf,
    },
    /// Play consecutive levels with one program, persisting progress.
    Play {
        /// Program source file.
        file: PathBuf,
        /// Authoring syntax; inferred from the file extension when omitted.
        #[arg(long, value_enum)]
        syntax: Option<SyntaxArg>,
        /// Number of levels to attempt.
        #[arg(long, default_value_t = 1)]
        levels: u32,
        /// Wait the configured move delay between moves.
        #[arg(long)]
        realtime: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SyntaxArg {
    Indented,
    PrimitiveCall,
}

impl From<SyntaxArg> for SyntaxTag {
    fn from(value: SyntaxArg) -> Self {
        match value {
            SyntaxArg::Indented => SyntaxTag::Indented,
            SyntaxArg::PrimitiveCall => SyntaxTag::PrimitiveCall,
        }
    }
}

/// Accepts side lengths up to the largest maze a session generates.
fn parse_size(raw: &str) -> Result<u32, String> {
    let size: u32 = raw.parse().map_err(|error| format!("{error}"))?;
    if size > MAX_SIZE {
        return Err(format!("size must be at most {MAX_SIZE}"));
    }
    Ok(size)
}

/// Entry point for the Maze Lab command-line interface.
fn main() -> Result<ExitCode> {
    logging::init();
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Subcommands::Generate { size, seed } => Ok(commands::generate(&config, size, seed)),
        Subcommands::Run {
            file,
            syntax,
            size,
            seed,
        } => commands::run(&config, &file, syntax.map(SyntaxTag::from), size, seed),
        Subcommands::Normalize { file } => commands::normalize_file(&file),
        Subcommands::Play {
            file,
            syntax,
            levels,
            realtime,
        } => commands::play(
            &config,
            &file,
            syntax.map(SyntaxTag::from),
            levels,
            realtime,
        ),
    }
}
