//! omopgraph CLI
//!
//! - `check`: verify a vocabulary directory holds every table a run reads
//! - `build`: compile the vocabulary into an OWL (Turtle) or JSON document
//! - `hierarchy`: print the asserted subsumption tree of the compiled graph

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use omopgraph_ingest_omop::{
    CompiledGraph, Pipeline, PipelineConfig, RunReport, VocabularyDir, REQUIRED_TABLES,
};
use omopgraph_owl::{DocumentFormat, FileSink, Hierarchy, NodeId};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "omopgraph")]
#[command(author, version, about = "Compile OMOP vocabularies into an OWL class graph")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that every required table exists and is readable.
    Check {
        /// Directory holding the vocabulary export.
        #[arg(long)]
        vocab: PathBuf,
    },

    /// Compile the vocabulary into a document.
    Build {
        #[arg(long)]
        vocab: PathBuf,
        #[arg(long)]
        outdir: PathBuf,
        /// File name inside `--outdir`.
        #[arg(long)]
        outfile: String,
        /// JSON pipeline configuration; omitted fields keep their defaults.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output encoding (default: from the file extension, else turtle).
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
        /// Restrict to these vocabularies (repeatable).
        #[arg(long = "vocabulary")]
        vocabularies: Vec<String>,
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Plan concept rows on all cores.
        #[arg(long)]
        parallel: bool,
        /// Overwrite an existing output file.
        #[arg(long)]
        recreate: bool,
        /// Also write the run report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the direct subsumption hierarchy with labels.
    Hierarchy {
        #[arg(long)]
        vocab: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Start below this concept id instead of every top-level concept.
        #[arg(long)]
        root: Option<String>,
        #[arg(long)]
        depth: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Turtle,
    Json,
}

impl From<FormatArg> for DocumentFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Turtle => DocumentFormat::Turtle,
            FormatArg::Json => DocumentFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let result = match cli.command {
        Commands::Check { vocab } => cmd_check(&vocab),
        Commands::Build {
            vocab,
            outdir,
            outfile,
            config,
            format,
            vocabularies,
            chunk_size,
            parallel,
            recreate,
            report,
        } => {
            let mut config = load_config(config.as_deref())?;
            apply_overrides(&mut config, vocabularies, chunk_size, parallel);
            let out = outdir.join(&outfile);
            let format = resolve_format(format, &out);
            cmd_build(&vocab, &outdir, &out, format, config, recreate, report.as_deref())
                .map(|_| ())
        }
        Commands::Hierarchy {
            vocab,
            config,
            root,
            depth,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_hierarchy(&vocab, config, root.as_deref(), depth)
        }
    };

    if let Err(err) = result {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "omopgraph=debug" } else { "omopgraph=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(
    config: &mut PipelineConfig,
    vocabularies: Vec<String>,
    chunk_size: Option<usize>,
    parallel: bool,
) {
    if !vocabularies.is_empty() {
        config.target_vocabularies = vocabularies;
    }
    if let Some(size) = chunk_size {
        config.chunk_size = size;
    }
    config.parallel_rows |= parallel;
}

/// `--format`, else the output file extension, else Turtle.
fn resolve_format(format: Option<FormatArg>, out: &Path) -> DocumentFormat {
    format
        .map(DocumentFormat::from)
        .or_else(|| DocumentFormat::from_extension(out))
        .unwrap_or(DocumentFormat::Turtle)
}

fn require_tables(dir: &VocabularyDir) -> Result<()> {
    let missing = dir.missing_tables(&REQUIRED_TABLES);
    if missing.is_empty() {
        return Ok(());
    }
    for table in &missing {
        eprintln!(
            "{} missing {}",
            "✗".red(),
            dir.path_of(table).display()
        );
    }
    bail!(
        "{} of {} required tables missing in {}",
        missing.len(),
        REQUIRED_TABLES.len(),
        dir.root().display()
    )
}

fn cmd_check(vocab: &Path) -> Result<()> {
    let dir = VocabularyDir::new(vocab);
    require_tables(&dir)?;
    println!(
        "{} all {} tables present in {}",
        "ok".green().bold(),
        REQUIRED_TABLES.len(),
        vocab.display()
    );
    Ok(())
}

fn cmd_build(
    vocab: &Path,
    outdir: &Path,
    out: &Path,
    format: DocumentFormat,
    config: PipelineConfig,
    recreate: bool,
    report_path: Option<&Path>,
) -> Result<Option<RunReport>> {
    let dir = VocabularyDir::new(vocab);
    require_tables(&dir)?;

    if out.exists() && !recreate {
        println!(
            "{} {} already exists, nothing to do (pass --recreate to rebuild)",
            "info:".yellow().bold(),
            out.display()
        );
        return Ok(None);
    }
    fs::create_dir_all(outdir)
        .with_context(|| format!("creating output directory {}", outdir.display()))?;
    tracing::debug!(?format, out = %out.display(), recreate, "output resolved");

    println!(
        "{} {} → {}",
        "Compiling".green().bold(),
        vocab.display(),
        out.display()
    );
    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    let mut sink = FileSink::new(out, format);
    let report = pipeline.run(&dir, &mut sink)?;

    print_report(&report);
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        println!("  {} {}", "→".cyan(), path.display());
    }
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(Some(report))
}

fn print_report(report: &RunReport) {
    println!(
        "  {:<18} {:>10} {:>10} {:>8} {:>8} {:>12} {:>10}",
        "stage", "read", "kept", "nodes", "edges", "annotations", "unresolved"
    );
    for stage in &report.stages {
        println!(
            "  {:<18} {:>10} {:>10} {:>8} {:>8} {:>12} {:>10}",
            stage.stage.name(),
            stage.rows_read,
            stage.rows_kept,
            stage.nodes_created,
            stage.edges_added,
            stage.annotations_added,
            stage.unresolved
        );
        if stage.duplicates > 0 {
            println!(
                "  {} {} duplicate keys in {}",
                "warning:".yellow().bold(),
                stage.duplicates,
                stage.stage
            );
        }
    }
    println!(
        "  {} nodes, {} subclass edges, {} restrictions, {} annotations",
        report.graph.nodes,
        report.graph.subclass_edges,
        report.graph.restriction_edges,
        report.graph.annotations
    );
}

fn cmd_hierarchy(
    vocab: &Path,
    config: PipelineConfig,
    root: Option<&str>,
    depth: Option<usize>,
) -> Result<()> {
    let dir = VocabularyDir::new(vocab);
    require_tables(&dir)?;
    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;
    let compiled = pipeline.compile(&dir)?;
    let hierarchy = Hierarchy::build(&compiled.graph);

    let starts = match root {
        Some(id) => vec![compiled
            .index
            .lookup(id)
            .ok_or_else(|| anyhow!("concept {id} is not in the compiled vocabularies"))?],
        None => concept_roots(&compiled, &hierarchy),
    };

    let mut out = String::new();
    for start in starts {
        render_tree(&compiled, &hierarchy, start, depth, &mut out);
    }
    print!("{out}");
    Ok(())
}

/// Top-level concepts: indexed concepts with no asserted superclass,
/// including ones that have no ancestry rows at all.
fn concept_roots(compiled: &CompiledGraph, hierarchy: &Hierarchy) -> Vec<NodeId> {
    hierarchy.roots(compiled.index.nodes())
}

fn render_tree(
    compiled: &CompiledGraph,
    hierarchy: &Hierarchy,
    start: NodeId,
    depth: Option<usize>,
    out: &mut String,
) {
    let namespace = compiled.graph.namespace();
    hierarchy.walk(start, depth, |node, level| {
        let iri = compiled.graph.iri(node);
        let id = namespace.local_part(iri).unwrap_or(iri);
        let label = hierarchy.label(node).unwrap_or("");
        out.push_str(&"    ".repeat(level));
        out.push_str(&format!("{label} ({id})\n"));
    });
}
