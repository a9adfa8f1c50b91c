//! jipcy - find tracker issues similar to a new report
//!
//! The `jipcy` command generates a Jira query from free text, scores every
//! returned issue for similarity (with optional Slack thread context) and
//! prints the best matches with short summaries.
//!
//! ## Commands
//!
//! - `search`: Triage a report and print the ranked matches

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};

use jipcy_clients::{JiraClient, OpenAiClient, SlackClient, SlackConfig};
use jipcy_core::{
    init_tracing, Evaluator, LogFormat, NotifyTarget, PipelineConfig, RunContext, Scheduler,
    ThreadFinder, TriageReport, TriageService,
};

#[derive(Parser)]
#[command(name = "jipcy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find Jira issues similar to a new report", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for issues similar to TEXT
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Description of the problem to triage
    text: String,

    /// Slack channel id that receives progress notifications
    #[arg(long)]
    channel: Option<String>,

    /// Post progress notifications into this thread
    #[arg(long, requires = "channel")]
    thread_ts: Option<String>,

    /// Minimum similarity for a match (overrides JIPCY_SCORE_THRESHOLD)
    #[arg(long)]
    threshold: Option<f64>,

    /// Number of matches to print (overrides JIPCY_TOP_K)
    #[arg(long)]
    top_k: Option<usize>,

    /// Concurrent evaluations (overrides JIPCY_MAX_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    if let Err(err) = dotenv {
        debug!(error = %err, "no .env file loaded");
    }

    match cli.command {
        Commands::Search(args) => cmd_search(args).await,
    }
}

/// Apply command-line overrides on top of the environment configuration.
fn apply_overrides(config: &mut PipelineConfig, args: &SearchArgs) {
    if let Some(threshold) = args.threshold {
        config.evaluator.score_threshold = threshold;
    }
    if let Some(top_k) = args.top_k {
        config.scheduler.top_k = top_k;
    }
    if let Some(concurrency) = args.concurrency {
        config.scheduler.max_concurrency = concurrency;
    }
}

/// Triage a report and print the ranked matches
async fn cmd_search(args: SearchArgs) -> Result<()> {
    let mut config = PipelineConfig::from_env().context("Failed to read jipcy configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid jipcy configuration")?;

    let jira = JiraClient::from_env().context("Failed to configure Jira client")?;
    let openai = Arc::new(OpenAiClient::from_env().context("Failed to configure OpenAI client")?);
    let slack = SlackConfig::from_env();

    let mut threads = config.threads.clone();
    threads.scope_channel = threads.scope_channel.or_else(|| slack.channel.clone());
    threads.workspace_url = threads.workspace_url.or_else(|| slack.workspace_url.clone());

    let finder = match &slack.user_token {
        Some(token) => {
            let search = SlackClient::new(token)
                .context("Failed to configure Slack search client")?
                .with_api_url(&slack.api_url);
            ThreadFinder::new(Arc::new(search), threads)
        }
        None => {
            info!("SLACK_USER_TOKEN not set, thread search disabled");
            ThreadFinder::disabled()
        }
    };

    let evaluator = Evaluator::new(Arc::new(finder), openai.clone(), config.evaluator.clone());
    let mut scheduler = Scheduler::new(evaluator, config.scheduler.clone());

    let cancel = CancellationToken::new();
    let mut ctx = RunContext::new().with_cancel(cancel.clone());

    if let Some(channel) = &args.channel {
        match &slack.bot_token {
            Some(token) => {
                let transport = SlackClient::new(token)
                    .context("Failed to configure Slack bot client")?
                    .with_api_url(&slack.api_url);
                scheduler = scheduler.with_notifications(Arc::new(transport));

                let mut target = NotifyTarget::new(channel.as_str());
                if let Some(ts) = &args.thread_ts {
                    target = target.in_thread(ts.as_str());
                }
                ctx = ctx.with_target(target);
            }
            None => warn!("SLACK_BOT_TOKEN not set, progress notifications disabled"),
        }
    }

    let service = TriageService::new(openai.clone(), Arc::new(jira), openai, scheduler)
        .with_query_retry(config.query_retry.clone());

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let report = service
        .triage(&args.text, ctx)
        .await
        .context("Triage failed")?;

    for failure in &report.failures {
        warn!(
            key = %failure.key,
            attempts = failure.attempts,
            error = %failure.error,
            "candidate could not be evaluated"
        );
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report.results)?),
        OutputFormat::Text => print!("{}", render_text(&report)),
    }

    Ok(())
}

fn render_text(report: &TriageReport) -> String {
    if report.results.is_empty() {
        return format!(
            "No similar issues found ({} candidates for `{}`)\n",
            report.candidates, report.query
        );
    }

    let mut out = String::new();
    for result in &report.results {
        out.push_str(&format!("[{}] {}\n", result.key, result.title));
        out.push_str(&format!("  URL:        {}\n", result.url));
        if let Some(thread_url) = &result.thread_url {
            out.push_str(&format!("  Thread:     {}\n", thread_url));
        }
        out.push_str(&format!("  Similarity: {:.2}\n", result.score));
        if let Some(summary) = &result.summary {
            out.push_str("  Summary:\n");
            for line in summary.lines() {
                out.push_str(&format!("    {}\n", line));
            }
        }
        out.push('\n');
    }
    out
}
