//! CDE CLI
//!
//! Usage:
//!   cde --text "DO IT NOW!!!" --speaker npc1   # Single turn, human output
//!   cde --text "..." --json                   # Single turn, JSON report
//!   cde --stdin < turn.json                   # One JSON turn from stdin
//!   cde --replay demo/ramp_test.jsonl         # Replay, audit log + summary
//!   cde --serve                               # HTTP API server

use clap::Parser;
use colored::Colorize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use cde::core::{replay, run_server, AuditLog, DeviationEngine, BaselineResolver};
use cde::types::{DeviationEvent, GateLevel, ScopeKey, ScopeSummary, Turn, TurnReport};
use cde::{CdeError, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "cde",
    version = VERSION,
    about = "Conversational deviation engine - score turns against baselines and route deviating scopes",
    long_about = "CDE scores each conversational turn against declared baselines across\n\
                  independent signal layers, smooths the result per scope (global, agent,\n\
                  task, scene) with enter/exit hysteresis, and emits a routing decision.\n\n\
                  Modes:\n  \
                  --text      Single turn from the command line\n  \
                  --stdin     Single JSON turn from stdin\n  \
                  --replay    Replay a JSONL file of turns\n  \
                  --serve     HTTP API server mode\n\n\
                  Gate levels:\n  \
                  0 NORMAL  - No gating\n  \
                  1 DAMPEN  - Soft review\n  \
                  2 FREEZE  - Hard gate"
)]
struct Args {
    /// Text of a single turn
    #[arg(short, long)]
    text: Option<String>,

    /// Speaker id for --text
    #[arg(long, default_value = "speaker")]
    speaker: String,

    /// Channel id for --text
    #[arg(long, default_value = "cli")]
    channel: String,

    /// Task id for --text
    #[arg(long)]
    task: Option<String>,

    /// Scene id for --text
    #[arg(long)]
    scene: Option<String>,

    /// Explicit scope keys (repeatable), e.g. --scope global --scope task:T1
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Read one JSON turn from stdin, print a compact JSON report
    #[arg(long)]
    stdin: bool,

    /// Replay a JSONL file of turns
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Audit log for --replay
    #[arg(long, default_value = "./logs/cde_audit.jsonl")]
    audit: PathBuf,

    /// Summary file for --replay
    #[arg(long, default_value = "./logs/last_run_summary.json")]
    summary: PathBuf,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Directory holding global.json and optional scene/task/agent overrides
    #[arg(short, long, default_value = "./manifests")]
    manifests: PathBuf,

    /// Cache baseline documents after first read
    #[arg(long)]
    cache_baselines: bool,

    /// JSON output
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cde=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let result = if args.serve {
        run_serve(&args).await
    } else if args.stdin {
        run_stdin(&args)
    } else if let Some(ref path) = args.replay {
        run_replay(path, &args)
    } else if let Some(ref text) = args.text {
        run_single(text, &args)
    } else {
        Err("nothing to do: pass --text, --stdin, --replay or --serve".into())
    };

    if let Err(e) = result {
        eprintln!("cde error: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn engine(args: &Args) -> DeviationEngine {
    let resolver = BaselineResolver::new(&args.manifests);
    let resolver = if args.cache_baselines { resolver.with_cache() } else { resolver };
    DeviationEngine::new(resolver)
}

fn explicit_scopes(args: &Args) -> Result<Option<Vec<ScopeKey>>, CdeError> {
    if args.scopes.is_empty() {
        return Ok(None);
    }
    args.scopes.iter().map(|s| ScopeKey::parse(s)).collect::<Result<Vec<_>, _>>().map(Some)
}

/// Run single text evaluation
fn run_single(text: &str, args: &Args) -> CliResult {
    let mut turn = Turn::new(format!("cli-{}", std::process::id()), &args.speaker, &args.channel, text);
    turn.task_id = args.task.clone();
    turn.scene_id = args.scene.clone();

    let scopes = explicit_scopes(args)?;
    let outcome = engine(args).process_turn(&turn, scopes.as_deref())?;
    let report = TurnReport::from_outcome(outcome);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for event in &report.events {
            print_event(event);
        }
        for failure in &report.failures {
            println!("{} {} {}", "✗".red(), failure.scope_key, failure.message.dimmed());
        }
    }
    Ok(())
}

/// One JSON turn on stdin → compact JSON report on stdout
fn run_stdin(args: &Args) -> CliResult {
    let mut raw = String::new();
    io::stdin().read_to_string(&mut raw)?;
    if raw.trim().is_empty() {
        return Err(CdeError::input_invalid("stdin must contain one JSON object").into());
    }

    let turn = Turn::from_json(&raw)?;
    let scopes = explicit_scopes(args)?;
    let outcome = engine(args).process_turn(&turn, scopes.as_deref())?;
    println!("{}", serde_json::to_string(&TurnReport::from_outcome(outcome))?);
    Ok(())
}

/// Replay a JSONL file, write audit log and summary
fn run_replay(path: &Path, args: &Args) -> CliResult {
    let mut engine = engine(args);
    let audit = AuditLog::open(&args.audit)?;

    let run = replay::run_file(&mut engine, Some(&audit), path)?;
    let summary = replay::summarize(&run.events);

    if let Some(parent) = args.summary.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.summary, serde_json::to_string_pretty(&summary)?)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Wrote: {}", audit.path().display());
    println!("Wrote: {}", args.summary.display());
    println!("\n{} turns, {} events, {} scope failures", run.turns, run.events.len(), run.failures.len());
    println!("\nLast scope states:");
    for (scope, s) in &summary {
        print_summary_line(scope, s);
    }
    Ok(())
}

/// Run HTTP API server
async fn run_serve(args: &Args) -> CliResult {
    run_server(&args.addr, args.manifests.clone()).await
}

fn gate_label(level: GateLevel) -> colored::ColoredString {
    let label = format!("gate={} {}", level.level(), level);
    match level {
        GateLevel::Normal => label.green(),
        GateLevel::Dampen => label.yellow(),
        GateLevel::Freeze => label.red().bold(),
    }
}

fn print_event(e: &DeviationEvent) {
    let marker = if e.enter {
        " ENTER".red().bold()
    } else if e.exit {
        " EXIT".green().bold()
    } else {
        "".normal()
    };
    println!(
        "{:<16} sev={:.3} ema={:.3} conf={:.3} active={} {}{}",
        e.scope_key.to_string().bold(),
        e.severity,
        e.ema_severity,
        e.confidence,
        e.active,
        gate_label(e.decision.gate_level),
        marker
    );
    if !e.dominant_layers.is_empty() {
        println!("  {} {}", "dominant:".dimmed(), e.dominant_layers.join(", "));
    }
}

fn print_summary_line(scope: &str, s: &ScopeSummary) {
    let Some(last) = &s.last else {
        return;
    };
    println!(
        "- {}: active={} ema={:.3} sev={:.3} conf={:.3} {} peak_ema={:.3}",
        scope,
        last.active,
        last.ema_severity,
        last.severity,
        last.confidence,
        gate_label(last.decision.gate_level),
        s.peak_ema
    );
}
