// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Verdict CLI
//!
//! The `verdict` binary drives the decision pipeline end to end from
//! the command line: index text documents, run a policy-checked query,
//! resolve pending approvals, and inspect the audit trail and learning
//! metrics.
//!
//! ## Commands
//!
//! - `verdict ask` - index documents and run one query
//! - `verdict grade` - run a query and auto-grade the answer
//! - `verdict rules` - validate a YAML policy rule set

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{AskArgs, GradeArgs, RulesArgs};

/// AEGIS Verdict - auditable decisions over an indexed evidence corpus
#[derive(Parser)]
#[command(name = "verdict")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "VERDICT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index documents and run one policy-checked query
    Ask(AskArgs),

    /// Run a query and auto-grade the answer against an expected output
    Grade(GradeArgs),

    /// Validate a YAML policy rule set
    Rules(RulesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Ask(args) => commands::run_ask(args).await,
        Commands::Grade(args) => commands::run_grade(args).await,
        Commands::Rules(args) => commands::run_rules(args),
    }
}
