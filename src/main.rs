//! vulnscout: LLM-driven vulnerability hunting over a target source tree.
//!
//! Usage:
//!   vulnscout run <task>            Run a built-in or task-file task
//!   vulnscout custom <file> <input> Run ad-hoc instructions with chosen tools
//!   vulnscout tasks                 List available tasks
//!   vulnscout index                 Build the embedding index for code search
//!   vulnscout prepare               Clone the target repository
//!   vulnscout flag-server           Serve the CTF flag
//!   vulnscout init                  Write a default config

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use vulnscout::agent::{self, AnswerSchema, LoopConfig, TaskPrompt};
use vulnscout::config::{self, ScoutConfig};
use vulnscout::flag_server;
use vulnscout::index::{self, IndexOptions};
use vulnscout::llm::{EmbeddingClient, Embedder, InferenceClient};
use vulnscout::target::{self, Prepared};
use vulnscout::tasks::{self, BuiltinContext, TaskSpec};
use vulnscout::tools::{ToolContext, ToolKind, ToolSet};
use vulnscout::types::*;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "vulnscout")]
#[command(version)]
#[command(about = "ReAct tool-using agent that hunts for vulnerabilities in a source tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ./vulnscout.toml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a built-in task or a task file by name.
    Run {
        task: String,

        /// Replace the task's default input.
        #[arg(long)]
        input: Option<String>,

        #[arg(long)]
        max_iterations: Option<u32>,

        #[arg(long)]
        temperature: Option<f64>,

        /// Print every step.
        #[arg(long)]
        verbose: bool,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run instructions from a file against an input, with the given tools.
    Custom {
        instructions_file: PathBuf,

        input: String,

        /// Comma-separated tool names.
        #[arg(long, value_delimiter = ',', required = true)]
        tools: Vec<String>,

        #[arg(long)]
        verbose: bool,

        #[arg(long)]
        json: bool,
    },

    /// List available tasks.
    Tasks,

    /// Build the embedding index used by code search.
    Index,

    /// Clone the target repository into target_dir.
    Prepare,

    /// Serve the CTF flag over HTTP.
    FlagServer {
        /// Address to bind (default: flag_bind from the config).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = config::locate_config(cli.config.as_deref());
    let cfg = config::load_with_env(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let succeeded = match cli.command {
        Commands::Run {
            task,
            input,
            max_iterations,
            temperature,
            verbose,
            json,
        } => {
            let overrides = RunOverrides {
                max_iterations,
                temperature,
                verbose,
                json,
            };
            cmd_run(cfg, &task, input.as_deref(), overrides).await?
        }
        Commands::Custom {
            instructions_file,
            input,
            tools,
            verbose,
            json,
        } => {
            let overrides = RunOverrides {
                verbose,
                json,
                ..RunOverrides::default()
            };
            cmd_custom(cfg, &instructions_file, input, &tools, overrides).await?
        }
        Commands::Tasks => cmd_tasks(&cfg)?,
        Commands::Index => cmd_index(&cfg).await?,
        Commands::Prepare => cmd_prepare(&cfg)?,
        Commands::FlagServer { bind } => cmd_flag_server(&cfg, bind).await?,
        Commands::Init { force } => cmd_init(&config_path, force)?,
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RunOverrides {
    max_iterations: Option<u32>,
    temperature: Option<f64>,
    verbose: bool,
    json: bool,
}

async fn cmd_run(
    cfg: ScoutConfig,
    name: &str,
    input: Option<&str>,
    overrides: RunOverrides,
) -> Result<bool> {
    let catalogue = load_catalogue(&cfg)?;
    let task = tasks::find(&catalogue, name)?;
    run_and_report(cfg, task, input, overrides).await
}

async fn cmd_custom(
    cfg: ScoutConfig,
    instructions_file: &Path,
    input: String,
    tool_names: &[String],
    overrides: RunOverrides,
) -> Result<bool> {
    let instructions = std::fs::read_to_string(instructions_file).with_context(|| {
        format!("Failed to read instructions from {}", instructions_file.display())
    })?;
    let tools = tool_names
        .iter()
        .map(|n| {
            ToolKind::from_name(n).with_context(|| {
                let known: Vec<_> = ToolKind::ALL.iter().map(|k| k.name()).collect();
                format!("Unknown tool '{}'; available: {}", n, known.join(", "))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let task = TaskSpec {
        name: "custom".into(),
        description: format!("Instructions from {}", instructions_file.display()),
        instructions,
        input,
        tools,
        answer: None,
        temperature: None,
    };
    run_and_report(cfg, &task, None, overrides).await
}

fn cmd_tasks(cfg: &ScoutConfig) -> Result<bool> {
    let catalogue = load_catalogue(cfg)?;

    println!();
    println!("{}", "=== Tasks ===".bold());
    println!();
    for task in &catalogue {
        let tools: Vec<_> = task.tools.iter().map(|k| k.name()).collect();
        println!("  {}  {}", task.name.green().bold(), task.description);
        println!("    Tools:  {}", tools.join(", ").dimmed());
        if let Some(schema) = &task.answer {
            let fields: Vec<_> = schema
                .fields()
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .collect();
            println!("    Answer: {}", fields.join(", ").dimmed());
        }
    }
    println!();
    Ok(true)
}

async fn cmd_index(cfg: &ScoutConfig) -> Result<bool> {
    config::validate(cfg)?;
    let root = cfg.resolved_target_dir();
    if !root.is_dir() {
        bail!(
            "Target directory {} does not exist; run `vulnscout prepare` first",
            root.display()
        );
    }

    let embedder = embedding_client(cfg)?;
    let options = IndexOptions {
        extensions: cfg.index_extensions.clone(),
        ignore: cfg.ignore.clone(),
        chunk_lines: cfg.chunk_lines,
        chunk_overlap: cfg.chunk_overlap,
        max_file_bytes: cfg.max_index_file_bytes,
    };

    println!(
        "{} Indexing {} with {}",
        ">>>".green().bold(),
        root.display(),
        embedder.model()
    );
    let built = index::build_index(&root, embedder.as_ref(), &options).await?;
    let path = cfg.resolved_index_path();
    built.save(&path)?;

    println!(
        "{} {} chunks written to {}",
        "Done:".green().bold(),
        built.chunks.len(),
        path.display()
    );
    Ok(true)
}

fn cmd_prepare(cfg: &ScoutConfig) -> Result<bool> {
    let dir = cfg.resolved_target_dir();
    match target::prepare_target(&cfg.target_repo_url, &dir)? {
        Prepared::Cloned => println!(
            "{} Cloned {} into {}",
            ">>>".green().bold(),
            cfg.target_repo_url,
            dir.display()
        ),
        Prepared::AlreadyPresent => println!(
            "{} {} already holds a checkout",
            ">>>".yellow().bold(),
            dir.display()
        ),
    }
    Ok(true)
}

async fn cmd_flag_server(cfg: &ScoutConfig, bind: Option<String>) -> Result<bool> {
    let addr = bind.unwrap_or_else(|| cfg.flag_bind.clone());
    println!("{} Serving flag on {}", ">>>".green().bold(), addr);
    flag_server::run(&addr, cfg.flag_body.clone()).await?;
    println!("\n{} Flag server stopped", "<<<".red().bold());
    Ok(true)
}

fn cmd_init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    config::save_config(&ScoutConfig::default(), path)?;
    println!("{} Wrote {}", ">>>".green().bold(), path.display());
    Ok(true)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn builtin_context(cfg: &ScoutConfig) -> BuiltinContext {
    let target = cfg.target_dir.trim_end_matches('/');
    BuiltinContext {
        target: format!("{}/", target),
        flag_url: cfg.flag_url.clone(),
    }
}

fn load_catalogue(cfg: &ScoutConfig) -> Result<Vec<TaskSpec>> {
    let files = tasks::load_tasks(&cfg.resolved_tasks_dir())?;
    Ok(tasks::catalogue(&builtin_context(cfg), files))
}

fn embedding_client(cfg: &ScoutConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(EmbeddingClient::new(
        &cfg.api_url,
        &cfg.api_key,
        &cfg.embedding_model,
        cfg.model_timeout_secs,
    )?))
}

/// Wire model, tools and loop settings for one task, run it, and print the outcome.
async fn run_and_report(
    mut cfg: ScoutConfig,
    task: &TaskSpec,
    input: Option<&str>,
    overrides: RunOverrides,
) -> Result<bool> {
    if let Some(n) = overrides.max_iterations {
        cfg.max_iterations = n;
    }
    cfg.verbose |= overrides.verbose;
    config::validate(&cfg)?;

    let model = InferenceClient::new(
        &cfg.api_url,
        &cfg.api_key,
        &cfg.model,
        cfg.model_timeout_secs,
    )?;
    let embedder = task
        .tools
        .contains(&ToolKind::CodeSearch)
        .then(|| embedding_client(&cfg))
        .transpose()?;
    let ctx = ToolContext::from_config(&cfg, &task.tools, embedder);
    let tools = ToolSet::build(&task.tools, &ctx)?;

    let mut loop_config = LoopConfig::from_config(&cfg);
    loop_config.temperature = overrides
        .temperature
        .or(task.temperature)
        .unwrap_or(cfg.temperature);

    let prompt: TaskPrompt<'_> = task.prompt(input);
    if !overrides.json {
        println!(
            "{} Running task '{}' with {} (tools: {})",
            ">>>".green().bold(),
            task.name,
            cfg.model,
            tools.names().join(", ")
        );
    }

    let outcome = agent::run_task(prompt, &tools, &model, &loop_config).await;
    info!("Task '{}' ended in state {}", task.name, outcome.final_state());

    if overrides.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        if cfg.verbose {
            print_steps(outcome.steps());
        }
        print_outcome(&outcome, task.answer.as_ref());
    }
    Ok(outcome.is_completed())
}

fn print_steps(steps: &[Step]) {
    println!();
    println!("{}", "=== Intermediate Steps ===".bold());
    for (i, step) in steps.iter().enumerate() {
        println!(
            "Step {}: Action: {} - {}",
            i + 1,
            step.action.tool.cyan(),
            step.action.input.trim()
        );
        let observation = match step.kind {
            ObservationKind::ToolOutput => step.observation.normal(),
            _ => step.observation.yellow(),
        };
        println!("Observation: {}", observation);
    }
}

fn print_outcome(outcome: &RunOutcome, schema: Option<&AnswerSchema>) {
    println!();
    match outcome {
        RunOutcome::Completed {
            answer,
            structured,
            steps,
        } => {
            println!(
                "{} ({} steps, {} tool calls)",
                "=== Final Answer ===".green().bold(),
                steps.len(),
                steps.iter().filter(|s| s.is_tool_call()).count()
            );
            match (structured, schema) {
                (Some(value), Some(_)) => println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| answer.clone())
                ),
                _ => println!("{}", answer),
            }
        }
        RunOutcome::Failed(failure) => {
            println!(
                "{} {} after {} steps",
                "=== Run Failed ===".red().bold(),
                failure.kind,
                failure.steps.len()
            );
            if let Some(last) = &failure.last_output {
                println!("{}", "Last model output:".bold());
                println!("{}", last.dimmed());
            }
        }
    }
}
