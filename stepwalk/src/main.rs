//! Step plan runner.
//!
//! Assembles a scenario from a JSON step plan, prints or validates the
//! resulting tree, or walks it with the plan's scripted outcomes and reports
//! each step.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use stepwalk::exit_codes;
use stepwalk::io::config::{RunnerConfig, load_config};
use stepwalk::io::plan::load_plan;
use stepwalk::io::report_log::{JsonlSink, RunReport, write_report};
use stepwalk::logging;
use stepwalk::simulate::{prepare_plan, render_tree, run_plan, validate_plan};
use stepwalk::walker::RecordingSink;

#[derive(Parser)]
#[command(
    name = "stepwalk",
    version,
    about = "Assemble and walk behavior-driven step trees"
)]
struct Cli {
    /// Runner config (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "stepwalk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the assembled step tree.
    Tree {
        plan: PathBuf,
    },
    /// Check plan schema, markers, tree invariants and step resolution.
    Validate {
        plan: PathBuf,
    },
    /// Walk the plan and print one line per step.
    Run {
        plan: PathBuf,
        /// Resolve and report without invoking actions or hooks.
        #[arg(long)]
        dry_run: bool,
        /// Reject depth jumps instead of attaching to the deepest ancestor.
        #[arg(long)]
        strict_depth: bool,
        /// Write the full report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Stream node events as JSON lines to this path.
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::INVALID)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    match cli.command {
        Command::Tree { plan } => cmd_tree(&plan, &config),
        Command::Validate { plan } => cmd_validate(&plan, &config),
        Command::Run {
            plan,
            dry_run,
            strict_depth,
            report,
            jsonl,
        } => {
            let mut config = config;
            config.dry_run |= dry_run;
            config.strict_depth |= strict_depth;
            if jsonl.is_some() {
                config.report.jsonl = jsonl;
            }
            config.validate()?;
            cmd_run(&plan, &config, report.as_deref())
        }
    }
}

fn cmd_tree(plan_path: &Path, config: &RunnerConfig) -> Result<i32> {
    let plan = load_plan(plan_path)?;
    let tree = prepare_plan(&plan, config)?;
    print!("{}", render_tree(&tree));
    Ok(exit_codes::OK)
}

fn cmd_validate(plan_path: &Path, config: &RunnerConfig) -> Result<i32> {
    let plan = load_plan(plan_path)?;
    let (_, problems) = validate_plan(&plan, config)?;
    if problems.is_empty() {
        println!("ok");
        return Ok(exit_codes::OK);
    }
    for problem in &problems {
        eprintln!("{problem}");
    }
    Ok(exit_codes::INVALID)
}

fn cmd_run(plan_path: &Path, config: &RunnerConfig, report_path: Option<&Path>) -> Result<i32> {
    let plan = load_plan(plan_path)?;
    let report = match &config.report.jsonl {
        Some(path) => {
            let mut sink = JsonlSink::create(path)?;
            let report = run_plan(&plan, config, &mut sink)?;
            sink.finish()?;
            report
        }
        None => run_plan(&plan, config, &mut RecordingSink::default())?,
    };

    print_report(&report)?;
    if let Some(path) = report_path {
        write_report(path, &report)
            .with_context(|| format!("write report {}", path.display()))?;
    }
    Ok(exit_codes::for_status(report.scenario.status))
}

fn print_report(report: &RunReport) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for node in &report.nodes {
        write!(out, "{:<12} {:<10} {}", node.status.as_str(), node.path, node.text)?;
        if let Some(branch) = &node.branch {
            write!(out, " <{branch}>")?;
        }
        if let Some(error) = &node.error {
            write!(out, ": {error}")?;
        }
        writeln!(out)?;
    }
    let scenario = &report.scenario;
    writeln!(
        out,
        "scenario '{}' {} ({} executed, {} skipped)",
        scenario.name, scenario.status, scenario.executed, scenario.skipped
    )?;
    Ok(())
}
