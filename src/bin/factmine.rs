use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use factmine::config::Settings;
use factmine::error::PipelineError;
use factmine::factstore::{HttpFactSink, store_facts};
use factmine::params::Params;
use factmine::processor::{Pipeline, RunOptions};
use factmine::processors;
use factmine::runner::SystemRunner;
use factmine::translator;

#[derive(Parser)]
#[command(name = "factmine")]
#[command(about = "Run scholarly-document processors and harvest extracted facts")]
#[command(version, author)]
struct Cli {
    /// Settings file (defaults to ./factmine.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run one processor against a document workspace")]
    Run(RunArgs),
    #[command(about = "Translate an externally-produced results file into facts")]
    Translate(TranslateArgs),
    #[command(about = "List the available processors")]
    List,
}

#[derive(Args)]
struct RunArgs {
    /// Processor name (see `factmine list`).
    processor: String,
    /// Tool parameter as key=value; repeatable, order is preserved.
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
    /// Skip the variant's before-hook.
    #[arg(long)]
    no_before: bool,
    /// Skip the variant's after-hook.
    #[arg(long)]
    no_after: bool,
    /// Send harvested facts to the configured fact store.
    #[arg(long)]
    post: bool,
    /// Tag attached to stored facts; repeatable.
    #[arg(long)]
    tag: Vec<String>,
}

#[derive(Args)]
struct TranslateArgs {
    /// Tool that produced the results file.
    tool: String,
    /// Path to the results file.
    file: Utf8PathBuf,
    /// Fact group label attached to stored facts.
    #[arg(long)]
    set: Option<String>,
    /// Send translated facts to the configured fact store.
    #[arg(long)]
    post: bool,
    /// Tag attached to stored facts; repeatable.
    #[arg(long)]
    tag: Vec<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            let code = report
                .downcast_ref::<PipelineError>()
                .map(map_exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn map_exit_code(error: &PipelineError) -> u8 {
    match error {
        PipelineError::UnsupportedTool(_) => 2,
        PipelineError::ConfigRead(_) | PipelineError::ConfigParse(_) => 2,
        PipelineError::FactStoreHttp(_) | PipelineError::FactStoreStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).into_diagnostic()?;

    match cli.command {
        Commands::Run(args) => run_processor(args, settings),
        Commands::Translate(args) => run_translate(args, settings),
        Commands::List => {
            print_json(&processors::names()).into_diagnostic()?;
            Ok(())
        }
    }
}

fn run_processor(args: RunArgs, settings: Settings) -> miette::Result<()> {
    let processor = processors::from_name(&args.processor).into_diagnostic()?;
    let params: Params = args.params.into_iter().collect();
    let options = RunOptions {
        run_before: !args.no_before,
        run_after: !args.no_after,
    };

    let runner = SystemRunner::new(settings.timeout());
    let pipeline = Pipeline::new(&settings, &runner);
    let output = pipeline.run(processor.as_ref(), params, options);

    if args.post && !output.facts.is_empty() {
        let sink = HttpFactSink::new(&settings.fact_api_url).into_diagnostic()?;
        store_facts(
            &sink,
            output.facts.clone(),
            output.cid.as_deref(),
            &args.tag,
            Some(processor.name()),
            None,
        )
        .into_diagnostic()?;
    }

    print_json(&output).into_diagnostic()?;
    Ok(())
}

fn run_translate(args: TranslateArgs, settings: Settings) -> miette::Result<()> {
    let facts = translator::translate(&args.tool, &args.file).into_diagnostic()?;

    if args.post && !facts.is_empty() {
        let sink = HttpFactSink::new(&settings.fact_api_url).into_diagnostic()?;
        store_facts(
            &sink,
            facts.clone(),
            None,
            &args.tag,
            Some(&args.tool.to_ascii_lowercase()),
            args.set.as_deref(),
        )
        .into_diagnostic()?;
    }

    print_json(&facts).into_diagnostic()?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{json}");
    Ok(())
}
