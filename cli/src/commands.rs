// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Command implementations for the `verdict` binary.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use verdict_core::application::{DecisionPipeline, PolicyEngine};
use verdict_core::config::Settings;
use verdict_core::domain::{AgentState, AuditSink, Decision, PolicyCondition, RetrievalStrategy};
use verdict_core::infrastructure::{
    AnthropicReviewer, InMemoryAuditLog, OpenAiGenerator, PlainTextExtractor,
};

#[derive(Args)]
pub struct AskArgs {
    /// The question to decide on
    pub question: String,

    /// Text documents to index before querying (repeatable)
    #[arg(long = "doc", value_name = "FILE")]
    pub docs: Vec<PathBuf>,

    /// Number of evidence chunks to retrieve
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Retrieval strategy: bm25, vector, or hybrid
    #[arg(long, default_value = "hybrid")]
    pub strategy: RetrievalStrategy,

    /// Policy context entries as key=value (repeatable)
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub context: Vec<(String, String)>,

    /// Additional YAML rule set to load before deciding
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Approve the decision immediately if it pauses for review
    #[arg(long)]
    pub approve: bool,

    /// Reject a paused decision with this reason instead of approving
    #[arg(long, value_name = "REASON", conflicts_with = "approve")]
    pub reject: Option<String>,

    /// Print the full audit trail after the decision
    #[arg(long)]
    pub trail: bool,
}

#[derive(Args)]
pub struct GradeArgs {
    /// The question to decide on
    pub question: String,

    /// The expected answer to grade against
    #[arg(long, value_name = "TEXT")]
    pub expected: String,

    /// Text documents to index before querying (repeatable)
    #[arg(long = "doc", value_name = "FILE")]
    pub docs: Vec<PathBuf>,

    /// Number of evidence chunks to retrieve
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Retrieval strategy: bm25, vector, or hybrid
    #[arg(long, default_value = "hybrid")]
    pub strategy: RetrievalStrategy,
}

#[derive(Args)]
pub struct RulesArgs {
    /// YAML rule set to validate
    pub file: PathBuf,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn build_pipeline() -> DecisionPipeline {
    let settings = Settings::from_env();
    debug!(
        orchestrator = %settings.orchestrator.model,
        reviewer = %settings.reviewer.model,
        human_in_loop = settings.enable_human_in_loop,
        "building decision pipeline"
    );
    let generator = Arc::new(OpenAiGenerator::new(settings.orchestrator.clone()));
    let reviewer = Arc::new(AnthropicReviewer::new(settings.reviewer.clone()));
    DecisionPipeline::new(
        settings,
        generator,
        reviewer,
        Arc::new(PlainTextExtractor::new()),
    )
}

async fn ingest_and_ask(
    pipeline: &DecisionPipeline,
    docs: &[PathBuf],
    rules: Option<&PathBuf>,
    question: &str,
    top_k: usize,
    strategy: RetrievalStrategy,
    context: &[(String, String)],
) -> Result<Decision> {
    if let Some(rules_path) = rules {
        let yaml = std::fs::read_to_string(rules_path)
            .with_context(|| format!("reading rule set {}", rules_path.display()))?;
        let added = pipeline.policy().load_rules_yaml(&yaml)?;
        println!("{} {added} rules from {}", "loaded".bold(), rules_path.display());
    }

    for doc in docs {
        let report = pipeline
            .ingest(doc)
            .with_context(|| format!("ingesting {}", doc.display()))?;
        println!(
            "{} {} ({} blocks, {} chunks)",
            "indexed".bold(),
            report.filename,
            report.text_blocks,
            report.chunks_indexed
        );
    }

    let context: HashMap<String, String> = context.iter().cloned().collect();
    Ok(pipeline.query(question, top_k, strategy, &context).await)
}

pub async fn run_ask(args: AskArgs) -> Result<()> {
    let pipeline = build_pipeline();
    let decision = ingest_and_ask(
        &pipeline,
        &args.docs,
        args.rules.as_ref(),
        &args.question,
        args.top_k,
        args.strategy,
        &args.context,
    )
    .await?;

    print_decision(&decision);

    if decision.state == AgentState::WaitingApproval {
        if args.approve {
            if let Some(approved) = pipeline.approve(decision.decision_id) {
                println!("\n{}", "approved:".green().bold());
                print_decision(&approved);
            }
        } else if let Some(reason) = &args.reject {
            if let Some(rejected) = pipeline.reject(decision.decision_id, reason) {
                println!("\n{}", "rejected:".red().bold());
                print_decision(&rejected);
            }
        } else {
            println!(
                "\n{}",
                "decision is waiting for approval; rerun with --approve or --reject <reason>"
                    .yellow()
            );
        }
    }

    if args.trail {
        println!("\n{}", "audit trail:".bold());
        for event in pipeline.audit_trail(None) {
            println!("{}", serde_json::to_string(&event)?);
        }
    }

    Ok(())
}

pub async fn run_grade(args: GradeArgs) -> Result<()> {
    let pipeline = build_pipeline();
    let decision = ingest_and_ask(
        &pipeline,
        &args.docs,
        None,
        &args.question,
        args.top_k,
        args.strategy,
        &[],
    )
    .await?;

    print_decision(&decision);

    let record = pipeline.learning().evaluate_decision(&decision, &args.expected);
    let rating = match record.rating.as_str() {
        "correct" => record.rating.as_str().green(),
        "partially_correct" => record.rating.as_str().yellow(),
        _ => record.rating.as_str().red(),
    };
    println!("\n{} {rating}", "graded:".bold());

    let stats = pipeline.learning_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

pub fn run_rules(args: RulesArgs) -> Result<()> {
    let yaml = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading rule set {}", args.file.display()))?;

    let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditLog::new());
    let engine = PolicyEngine::new(audit);
    let added = engine.load_rules_yaml(&yaml)?;
    println!("{} {added} rules", "parsed".bold());

    for rule in engine.rules() {
        let status = if PolicyCondition::parse(&rule.condition).is_unknown() {
            "unrecognized condition (rule will never match)".red()
        } else {
            "ok".green()
        };
        println!(
            "  {} [{}] {} -> {}",
            rule.name.bold(),
            rule.verdict,
            rule.condition,
            status
        );
    }

    Ok(())
}

fn print_decision(decision: &Decision) {
    let state = match decision.state {
        AgentState::Completed => "completed".green(),
        AgentState::WaitingApproval => "waiting_approval".yellow(),
        AgentState::Failed => "failed".red(),
        AgentState::Running => "running".normal(),
    };

    println!("{} {}", "decision:".bold(), decision.decision_id);
    println!("{} {state}", "state:".bold());
    if !decision.model_used.is_empty() {
        println!(
            "{} {} (review: {})",
            "models:".bold(),
            decision.model_used,
            decision.reviewer_model
        );
    }
    println!("{} {}", "answer:".bold(), decision.answer);

    if !decision.evidence.is_empty() {
        println!("{}", "evidence:".bold());
        for result in &decision.evidence {
            let citations = result
                .citations
                .iter()
                .map(|c| format!("doc={}, page={}", c.doc_id, c.page))
                .collect::<Vec<_>>()
                .join("; ");
            let excerpt: String = result.text.chars().take(120).collect();
            println!("  [{:.4}] {excerpt} ({citations})", result.score);
        }
    }

    let matched: Vec<&str> = decision
        .policy_evaluations
        .iter()
        .filter(|e| e.matched)
        .map(|e| e.rule_name.as_str())
        .collect();
    if !matched.is_empty() {
        println!("{} {}", "matched policies:".bold(), matched.join(", "));
    }
}
