//! CLI for GenFlow - submit generation jobs and join videos.

use clap::{Args, Parser, Subcommand};
use genflow::{
    catalog, BackendSet, Category, ConcatOptions, ConcatPipeline, EngineConfig, GenerationInput,
    GenerationJob, Params, Persistence, StorageConfig, TaskEngine,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genflow")]
#[command(about = "Submit AI generation jobs (DashScope, Ark, OpenAI) and join video clips")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    Models {
        /// Only models of this category (e.g. text_to_image)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Validate parameters against a model without submitting
    Validate(ValidateArgs),

    /// Submit a generation group and wait for it
    Generate(GenerateArgs),

    /// Download and join video clips into one file
    Concat(ConcatArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// Model id
    model: String,

    /// Parameter as key=value (value parsed as JSON when possible)
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Model id
    model: String,

    /// Text prompt
    #[arg(long)]
    prompt: Option<String>,

    /// Source image URL (image-to-image, image-to-video)
    #[arg(long)]
    image: Option<String>,

    /// Reference image URL (reference-to-video), repeatable
    #[arg(long = "reference")]
    references: Vec<String>,

    /// Number of parallel generations
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Project name used in storage keys
    #[arg(long)]
    project: Option<String>,

    /// Parameter as key=value (value parsed as JSON when possible)
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

#[derive(Args)]
struct ConcatArgs {
    /// Video URLs, in playback order
    #[arg(required = true)]
    urls: Vec<String>,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Target frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genflow=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Models { category } => list_models(category.as_deref(), cli.json)?,
        Commands::Validate(args) => validate(args, cli.json)?,
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Concat(args) => concat(args, cli.json).await?,
    }

    Ok(())
}

fn list_models(category: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let registry = catalog::builtin()?;
    let models: Vec<_> = match category {
        Some(name) => {
            let category = Category::parse(name)
                .ok_or_else(|| anyhow::anyhow!("unknown category `{name}`"))?;
            registry.list_by_category(category)
        }
        None => registry.list().collect(),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("{:<36} {:<20} {:<10} STYLE", "MODEL", "CATEGORY", "PROVIDER");
    for model in models {
        println!(
            "{:<36} {:<20} {:<10} {}",
            model.id, model.category, model.provider, model.style
        );
    }
    Ok(())
}

fn validate(args: ValidateArgs, json_output: bool) -> anyhow::Result<()> {
    let registry = catalog::builtin()?;
    let params: Params = args.params.into_iter().collect();
    let report = registry.validate(&args.model, &params)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_ok() {
        println!("{}: parameters are valid", args.model);
    } else {
        for error in &report.errors {
            println!("{error}");
        }
    }

    if !report.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let registry = Arc::new(catalog::builtin()?);
    let category = registry.get(&args.model)?.category;

    let mut input = GenerationInput {
        prompt: args.prompt,
        image_url: args.image,
        reference_urls: args.references,
        ..Default::default()
    };
    if input.prompt.as_deref() == Some("") {
        input.prompt = None;
    }

    let mut job = GenerationJob::new(category, &args.model, input)
        .with_params(args.params.into_iter().collect())
        .with_count(args.count);
    if let Some(project) = args.project {
        job = job.with_project(project);
    }

    let engine = TaskEngine::new(
        registry,
        BackendSet::from_env(),
        Persistence::from_config(StorageConfig::from_env()?),
        EngineConfig::builder().build()?,
    );
    let group = engine.submit_and_wait(&job).await?;
    let report = group.report();

    if json_output {
        let result = serde_json::json!({
            "group_id": group.id.to_string(),
            "model": group.model,
            "status": report.status,
            "artifacts": report.artifacts,
            "texts": report.texts,
            "error": report.error,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for (i, member) in group.members.iter().enumerate() {
        match (&member.text, member.artifact_url(), &member.error) {
            (Some(text), _, _) => println!("[{i}] {text}"),
            (None, Some(url), _) => println!("[{i}] {url}"),
            (None, None, Some(error)) => println!("[{i}] FAILED {error}"),
            (None, None, None) => println!("[{i}] {}", member.status),
        }
    }
    report.into_result()?;
    Ok(())
}

async fn concat(args: ConcatArgs, json_output: bool) -> anyhow::Result<()> {
    let options = ConcatOptions {
        fps: args.fps,
        ..Default::default()
    };
    let outcome = ConcatPipeline::from_options(options)
        .concat(&args.urls, &args.output)
        .await?;

    if json_output {
        let result = serde_json::json!({
            "output": outcome.output.display().to_string(),
            "strategy": format!("{:?}", outcome.strategy),
            "segments": outcome.segments,
            "width": outcome.target.map(|t| t.width),
            "height": outcome.target.map(|t| t.height),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Joined {} segment(s) into {} ({:?})",
            outcome.segments,
            outcome.output.display(),
            outcome.strategy
        );
    }
    Ok(())
}
