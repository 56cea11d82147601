//! CLI entry point for vaultgraph.
//!
//! Provides commands to extract records from a vault, embed and index them,
//! build the similarity graph, and inject related links back into notes.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vaultgraph::display::{THEME, with_spinner};
use vaultgraph::io::ExitCode;
use vaultgraph::vector::{default_models_dir, parse_embedding_model};
use vaultgraph::{
    ArtifactPaths, EmbeddingComposer, FastEmbedGenerator, Graph, Injector,
    JsonlRecordSource, PhaseStats, Pipeline, PipelineError, Settings, VaultExtractor,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic similarity graphs for Markdown vaults
#[derive(Parser)]
#[command(
    name = "vaultgraph",
    version = env!("CARGO_PKG_VERSION"),
    about = "Link similar Markdown notes through embeddings",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ vaultgraph init\n  $ vaultgraph extract --vault notes\n  $ vaultgraph run\n  $ vaultgraph inject --vault notes"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Graph-shaping flags shared by `graph` and `run`
#[derive(clap::Args, Debug, Clone, Copy)]
struct GraphArgs {
    /// Maximum neighbors per document (overrides config, default 5)
    #[arg(short, long)]
    k: Option<usize>,

    /// Minimum edge score (overrides config, default 0.4; accepts -inf)
    #[arg(short, long, allow_hyphen_values = true)]
    threshold: Option<f32>,
}

/// Artifact path flags shared by the pipeline commands
#[derive(clap::Args, Debug, Clone)]
struct ArtifactArgs {
    /// JSONL document records
    #[arg(long)]
    records: Option<PathBuf>,

    /// Vector matrix artifact
    #[arg(long)]
    vectors: Option<PathBuf>,

    /// Similarity index artifact
    #[arg(long)]
    index: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .vaultgraph directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Extract document records from a vault
    #[command(about = "Scan a vault and write one JSONL record per note")]
    Extract {
        /// Vault directory
        #[arg(long)]
        vault: PathBuf,

        /// Output record file (defaults to paths.records)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Embed records and build the similarity index
    #[command(about = "Compose document vectors and build the index")]
    Embed {
        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Build the similarity graph from existing artifacts
    #[command(about = "Link every document to its nearest neighbors")]
    Graph {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        #[command(flatten)]
        graph: GraphArgs,

        /// Output graph file (defaults to paths.graph)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run embedding, indexing and graph building in one pass
    #[command(about = "Embed, index and link in one pass")]
    Run {
        #[command(flatten)]
        artifacts: ArtifactArgs,

        #[command(flatten)]
        graph_args: GraphArgs,

        /// Output graph file (defaults to paths.graph)
        #[arg(long)]
        graph: Option<PathBuf>,
    },

    /// Write related links into note front matter
    #[command(about = "Write each note's neighbors into its 'related' field")]
    Inject {
        /// Vault directory
        #[arg(long)]
        vault: PathBuf,

        /// Graph file (defaults to paths.graph)
        #[arg(long)]
        graph: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", THEME.error_with_icon(&format!("Configuration error: {e}")));
            std::process::exit(ExitCode::ConfigError.into());
        }
    };

    init_tracing(cli.verbose || settings.debug);

    if let Err(error) = run(cli, settings) {
        std::process::exit(report(&error).into());
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, Box<figment::Error>> {
    match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "vaultgraph=debug" } else { "vaultgraph=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print the error chain and pick the exit code.
fn report(error: &anyhow::Error) -> ExitCode {
    eprintln!("{}", THEME.error_with_icon(&format!("Error: {error}")));
    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }

    let code = match error.downcast_ref::<PipelineError>() {
        Some(pipeline_error) => {
            for suggestion in pipeline_error.recovery_suggestions() {
                eprintln!("  Suggestion: {suggestion}");
            }
            ExitCode::from_error(pipeline_error)
        }
        None => ExitCode::GeneralError,
    };

    let summary = format!("{} (exit code {})", code.description(), i32::from(code));
    if code.is_blocking() {
        eprintln!("{}", THEME.warning_with_icon(&summary));
    } else {
        eprintln!("  {}", THEME.apply(&THEME.dim, summary));
    }
    code
}

fn run(cli: Cli, mut settings: Settings) -> anyhow::Result<()> {
    let show_progress = !cli.no_progress;

    match cli.command {
        Commands::Init { force } => {
            let root = std::env::current_dir().context("cannot determine working directory")?;
            let path = Settings::init_config_file(&root, force)?;
            println!(
                "{}",
                THEME.success_with_icon(&format!("Created configuration at {}", path.display()))
            );
            println!(
                "{}",
                THEME.apply(&THEME.dim, "Edit this file to customize your settings.")
            );
        }

        Commands::Config => {
            println!("{}", THEME.apply(&THEME.header, "Current Configuration:"));
            println!("{}", "=".repeat(50));
            println!("{}", settings.to_toml()?);
        }

        Commands::Extract { vault, out } => {
            let out = out.unwrap_or_else(|| settings.resolve(&settings.paths.records));
            let count = VaultExtractor::new(&vault).extract_to(&out)?;
            println!(
                "{}",
                THEME.success_with_icon(&format!(
                    "Wrote {} records to {}",
                    THEME.apply(&THEME.number, count),
                    THEME.apply(&THEME.path, out.display())
                ))
            );
        }

        Commands::Embed { artifacts } => {
            apply_artifacts(&mut settings, &artifacts)?;
            configure(&settings)?;
            let composer = build_composer(&settings, show_progress)?;
            let pipeline = pipeline(&settings, show_progress);

            let stats = pipeline.run_embedding(&composer)?;
            pipeline.run_indexing()?;
            print_stats("Embedded", &stats);
        }

        Commands::Graph {
            artifacts,
            graph,
            out,
        } => {
            apply_artifacts(&mut settings, &artifacts)?;
            apply_graph_args(&mut settings, graph);
            if let Some(out) = &out {
                settings.paths.graph = cli_path(out)?;
            }
            configure(&settings)?;

            let (_, stats) = pipeline(&settings, show_progress).run_graph(settings.graph)?;
            print_stats("Linked", &stats);
        }

        Commands::Run {
            artifacts,
            graph_args,
            graph,
        } => {
            apply_artifacts(&mut settings, &artifacts)?;
            apply_graph_args(&mut settings, graph_args);
            if let Some(graph) = &graph {
                settings.paths.graph = cli_path(graph)?;
            }
            configure(&settings)?;
            let composer = build_composer(&settings, show_progress)?;

            let (_, stats) =
                pipeline(&settings, show_progress).run_all(&composer, settings.graph)?;
            print_stats("Linked", &stats);
        }

        Commands::Inject { vault, graph } => {
            let graph_path = graph.unwrap_or_else(|| settings.resolve(&settings.paths.graph));
            let graph = Graph::load(&graph_path)?;
            let report = Injector::new(&vault).inject_graph(&graph)?;
            println!(
                "{}",
                THEME.success_with_icon(&format!(
                    "Injected related links into {} notes ({} unchanged)",
                    THEME.apply(&THEME.number, report.updated),
                    THEME.apply(&THEME.number, report.unchanged)
                ))
            );
        }
    }

    Ok(())
}

/// Flag paths are relative to the working directory, not the workspace root.
fn cli_path(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}

fn apply_artifacts(settings: &mut Settings, artifacts: &ArtifactArgs) -> anyhow::Result<()> {
    if let Some(records) = &artifacts.records {
        settings.paths.records = cli_path(records)?;
    }
    if let Some(vectors) = &artifacts.vectors {
        settings.paths.vectors = cli_path(vectors)?;
    }
    if let Some(index) = &artifacts.index {
        settings.paths.index = cli_path(index)?;
    }
    Ok(())
}

fn apply_graph_args(settings: &mut Settings, args: GraphArgs) {
    if let Some(k) = args.k {
        settings.graph.k = k;
    }
    if let Some(threshold) = args.threshold {
        settings.graph.threshold = threshold;
    }
}

/// Validate the final settings and size the rayon pool.
fn configure(settings: &Settings) -> anyhow::Result<()> {
    settings.validate()?;
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.indexing.parallel_threads)
        .build_global()
    {
        tracing::warn!("could not size worker pool: {e}");
    }
    tracing::debug!(threads = settings.indexing.parallel_threads, "worker pool ready");
    Ok(())
}

fn pipeline(settings: &Settings, show_progress: bool) -> Pipeline {
    let source = JsonlRecordSource::new(settings.resolve(&settings.paths.records));
    Pipeline::new(Arc::new(source), ArtifactPaths::from_settings(settings))
        .with_progress(show_progress)
}

fn build_composer(settings: &Settings, show_progress: bool) -> anyhow::Result<EmbeddingComposer> {
    let config = &settings.embedding;
    let model = parse_embedding_model(&config.model).map_err(|e| PipelineError::Config {
        reason: e.to_string(),
    })?;
    let cache_dir = config.cache_dir.clone().unwrap_or_else(default_models_dir);

    let generator = with_spinner(show_progress, "Loading embedding model", || {
        FastEmbedGenerator::with_model(model, cache_dir, config.show_download_progress)
    })
    .map_err(|e| PipelineError::ModelInit {
        model: config.model.clone(),
        reason: e.to_string(),
    })?;

    let composer = EmbeddingComposer::new(Arc::new(generator), config.weights).map_err(|e| {
        PipelineError::Config {
            reason: e.to_string(),
        }
    })?;
    Ok(composer)
}

fn print_stats(verb: &str, stats: &PhaseStats) {
    let mut line = format!(
        "{verb} {} documents ({} dimensions)",
        THEME.apply(&THEME.number, stats.documents),
        THEME.apply(&THEME.number, stats.dimension)
    );
    if stats.edges > 0 {
        line.push_str(&format!(
            ", {} edges",
            THEME.apply(&THEME.number, stats.edges)
        ));
    }
    println!("{}", THEME.success_with_icon(&line));
}
