//! agentcheck - compliance evaluation for AI coding agents
//!
//! ## Commands
//!
//! - `list`: Show the test cases a filter selects
//! - `validate`: Load and validate every case file
//! - `run`: Run a suite against an agent command and apply the gate
//! - `evaluate`: Score a previously recorded timeline

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use agentcheck_core::config::DEFAULT_CONFIG_FILE;
use agentcheck_core::metrics::METRICS;
use agentcheck_core::reporting::{run_dir, write_summary_md};
use agentcheck_core::{
    discover_cases, evaluate_timeline, load_case_file, load_timeline, write_suite_artifact,
    write_timeline, CaseFilter, CaseStatus, EvalConfig, EvaluatorRegistry, ProcessAgent,
    SuiteResultsArtifact, SuiteRunner,
};

#[derive(Parser)]
#[command(name = "agentcheck")]
#[command(version = agentcheck_core::VERSION)]
#[command(about = "Evaluate AI agent sessions against workflow compliance rules")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file; must exist when named (default: ./agentcheck.toml if present)
    #[arg(long, global = true, env = "AGENTCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List test cases matching a filter
    List {
        /// Directory containing case files (.json / .toml)
        #[arg(long)]
        cases: PathBuf,

        /// Glob matched against `id` and `category/id`
        #[arg(long)]
        pattern: Option<String>,

        /// Required tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Load and validate every case file
    Validate {
        #[arg(long)]
        cases: PathBuf,
    },

    /// Run test cases against an agent and apply the suite gate
    Run {
        #[arg(long)]
        cases: PathBuf,

        /// Agent command line; the agent speaks JSON lines over stdio
        #[arg(long)]
        agent_cmd: String,

        /// Agent name recorded in results (default: the command's program)
        #[arg(long)]
        agent_name: Option<String>,

        #[arg(long)]
        pattern: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Stop starting cases after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Baseline pass rate (0.0-1.0) for regression checking
        #[arg(long)]
        baseline_pass_rate: Option<f32>,

        /// Artifacts directory (default: from config)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Evaluate a recorded timeline against one test case
    Evaluate {
        /// Case file; must hold exactly one case unless --id is given
        #[arg(long)]
        case: PathBuf,

        /// Case id to pick from a multi-case file
        #[arg(long)]
        id: Option<String>,

        /// Recorded timeline JSON
        #[arg(long)]
        timeline: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    agentcheck_core::init_tracing(cli.json, level);

    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    let config = EvalConfig::load_or_fallback(cli.config.as_deref(), fallback)
        .context("Failed to load config")?;

    let ok = match cli.command {
        Commands::List {
            cases,
            pattern,
            tags,
        } => cmd_list(&cases, pattern.as_deref(), tags)?,
        Commands::Validate { cases } => cmd_validate(&cases)?,
        Commands::Run {
            cases,
            agent_cmd,
            agent_name,
            pattern,
            tags,
            fail_fast,
            baseline_pass_rate,
            out,
        } => {
            let opts = RunOptions {
                agent_cmd,
                agent_name,
                pattern,
                tags,
                fail_fast,
                baseline_pass_rate,
                out,
            };
            cmd_run(config, &cases, opts).await?
        }
        Commands::Evaluate { case, id, timeline } => {
            cmd_evaluate(&config, &case, id.as_deref(), &timeline)?
        }
    };

    METRICS.flush();
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_list(dir: &Path, pattern: Option<&str>, tags: Vec<String>) -> Result<bool> {
    let filter = CaseFilter::new(pattern, tags)?;
    let cases = discover_cases(dir).with_context(|| format!("load cases from {:?}", dir))?;
    let cases = filter.apply(cases);

    if cases.is_empty() {
        println!("No cases matched.");
        return Ok(true);
    }
    for case in &cases {
        let tags = if case.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", case.tags.join(", "))
        };
        println!("{}{}", case.qualified_id(), tags);
    }
    println!("{} case(s)", cases.len());
    Ok(true)
}

fn cmd_validate(dir: &Path) -> Result<bool> {
    match discover_cases(dir) {
        Ok(cases) => {
            println!("{} case(s) valid", cases.len());
            Ok(true)
        }
        Err(e) => {
            eprintln!("invalid: {e}");
            Ok(false)
        }
    }
}

struct RunOptions {
    agent_cmd: String,
    agent_name: Option<String>,
    pattern: Option<String>,
    tags: Vec<String>,
    fail_fast: bool,
    baseline_pass_rate: Option<f32>,
    out: Option<PathBuf>,
}

fn agent_name_from_command(cmd: &str) -> String {
    cmd.split_whitespace()
        .next()
        .and_then(|program| Path::new(program).file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("agent")
        .to_string()
}

async fn cmd_run(config: EvalConfig, dir: &Path, opts: RunOptions) -> Result<bool> {
    if let Some(b) = opts.baseline_pass_rate {
        if !(0.0..=1.0).contains(&b) {
            bail!("--baseline-pass-rate must be within 0.0..=1.0, got {b}");
        }
    }

    let cases = discover_cases(dir).with_context(|| format!("load cases from {:?}", dir))?;
    let filter = CaseFilter::new(opts.pattern.as_deref(), opts.tags)?;

    let agent_name = opts
        .agent_name
        .unwrap_or_else(|| agent_name_from_command(&opts.agent_cmd));
    let agent = ProcessAgent::from_command_line(agent_name.clone(), &opts.agent_cmd)
        .context("invalid --agent-cmd")?;

    let out_dir = opts.out.unwrap_or_else(|| config.artifacts_dir.clone());
    let rule_set = config.gate_rule_set();

    let runner = SuiteRunner::new(Arc::new(agent), config)
        .with_fail_fast(opts.fail_fast)
        .with_baseline_pass_rate(opts.baseline_pass_rate);
    let run = runner.run(cases, &filter).await?;
    let gate = run.gate(&rule_set);

    let artifact = SuiteResultsArtifact::from_run(&run, &agent_name, &gate);
    let results_path = write_suite_artifact(&out_dir, &artifact)
        .with_context(|| format!("write results under {:?}", out_dir))?;
    let run_path = run_dir(&out_dir, run.run_id);
    for outcome in &run.outcomes {
        if let Some(session) = &outcome.session {
            write_timeline(&run_path, session)?;
        }
    }
    write_summary_md(&run_path.join("summary.md"), &artifact)?;
    info!(path = %results_path.display(), "results written");

    for outcome in &run.outcomes {
        let mark = match outcome.status {
            CaseStatus::Passed => "PASS",
            CaseStatus::Failed => "FAIL",
            CaseStatus::Errored => "ERR ",
            CaseStatus::Skipped => "SKIP",
        };
        println!("{mark} {} ({:.2})", outcome.case_id, outcome.score());
        if let Some(err) = &outcome.error {
            println!("     error: {err}");
        }
    }
    println!();
    println!(
        "pass rate {:.1}%  mean score {:.3}  escalations {}",
        run.report.pass_rate * 100.0,
        run.report.mean_score,
        run.report.escalations()
    );
    for v in &gate.violations {
        println!("gate: {}", v.reason);
    }
    println!("Results: {}", results_path.display());

    println!("Gate {}", if gate.passed() { "PASSED" } else { "FAILED" });
    Ok(gate.passed())
}

fn cmd_evaluate(
    config: &EvalConfig,
    case_path: &Path,
    id: Option<&str>,
    timeline_path: &Path,
) -> Result<bool> {
    let cases = load_case_file(case_path).with_context(|| format!("load {:?}", case_path))?;
    let case = match id {
        Some(id) => cases
            .into_iter()
            .find(|c| c.id == id)
            .with_context(|| format!("no case '{id}' in {:?}", case_path))?,
        None => {
            if cases.len() != 1 {
                bail!(
                    "{:?} holds {} cases; pick one with --id",
                    case_path,
                    cases.len()
                );
            }
            cases.into_iter().next().context("case file is empty")?
        }
    };
    let timeline =
        load_timeline(timeline_path).with_context(|| format!("load {:?}", timeline_path))?;

    let verdict = evaluate_timeline(
        &case,
        &timeline,
        &EvaluatorRegistry::standard(),
        &config.tool_policy,
        &config.scoring,
    );
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    Ok(verdict.passed)
}
