//! ctxbundle CLI: dependency-aware context bundles from the terminal.
//!
//! Calls `ctxbundle-core` directly; every subcommand is one library call plus printing.

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctxbundle_core::progress::ProgressReporter;
use ctxbundle_core::run::{analyze_file, selected_extensions};
use ctxbundle_core::scan::scan_project;
use ctxbundle_core::tree::render_project_tree;
use ctxbundle_core::types::normalize_ext;
use ctxbundle_core::{extract::ExtractorRegistry, load_ctxbundle_config, process_project, AnalysisConfig, RunLog};

/// ctxbundle: per-file context bundles with every intra-project dependency inlined.
#[derive(Parser)]
#[command(name = "ctxbundle", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a project and write one context bundle per file
    Run {
        /// Project root to analyse
        source: PathBuf,

        /// Directory the bundles are written to
        #[arg(long)]
        dest: PathBuf,

        /// Restrict to these extensions (repeatable, dot optional)
        #[arg(long = "ext")]
        ext: Vec<String>,

        /// Maximum dependency hops followed per file
        #[arg(long)]
        max_depth: Option<usize>,

        /// Worker threads (default: available parallelism, at least 4)
        #[arg(long)]
        threads: Option<usize>,

        /// Only print warnings and the final summary
        #[arg(long)]
        quiet: bool,
    },
    /// Show the direct and transitive dependencies of one file
    Deps {
        /// File to analyse (project-relative or absolute)
        file: PathBuf,

        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Restrict to these extensions (repeatable, dot optional)
        #[arg(long = "ext")]
        ext: Vec<String>,

        /// Maximum dependency hops followed
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Print the tree of in-scope project files
    Tree {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Restrict to these extensions (repeatable, dot optional)
        #[arg(long = "ext")]
        ext: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

fn resolve_root(root: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = match root {
        Some(r) => r,
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    root.canonicalize().with_context(|| format!("project root not found: {}", root.display()))
}

/// `.ctxbundle.toml` from the root, then command-line overrides.
fn load_config(root: &Path, ext: &[String], max_depth: Option<usize>) -> anyhow::Result<AnalysisConfig> {
    let mut config = load_ctxbundle_config(root).context("could not load project configuration")?;
    if !ext.is_empty() {
        config.extensions = ext.iter().map(|e| normalize_ext(e)).filter(|e| !e.is_empty()).collect();
    }
    if let Some(depth) = max_depth {
        config.max_depth = depth;
    }
    Ok(config)
}

/// Run-log lines already reach the console through tracing.
fn silent_reporter() -> Arc<dyn ProgressReporter> {
    Arc::new(|_: &str| -> Option<String> { None })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Run { quiet: true, .. }) || cli.json;
    let directive = if quiet { "ctxbundle=warn" } else { "ctxbundle=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { source, dest, ext, max_depth, threads, .. } => {
            let root = resolve_root(Some(source))?;
            let mut config = load_config(&root, &ext, max_depth)?;
            if threads.is_some() {
                config.threads = threads;
            }
            let report = process_project(&config, Some(dest.as_path()), silent_reporter())
                .with_context(|| format!("failed to process {}", root.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Project:    {}", report.root.display());
                println!("Files:      {}", report.files.len());
                for (status, count) in &report.status_counts {
                    println!("  {status:<22} {count}");
                }
                println!("Bundles:    {} written to {}", report.bundles_written, dest.display());
                println!("Time:       {}ms", report.elapsed_ms);
                let errors = report.error_count();
                if errors > 0 {
                    eprintln!("\n{errors} file(s) could not be analysed; see the log above");
                }
            }
        }
        Commands::Deps { file, root, ext, max_depth } => {
            let root = resolve_root(root)?;
            let config = load_config(&root, &ext, max_depth)?;
            // A path that exists from here wins over a root-relative reading
            let target = match file.canonicalize() {
                Ok(abs) if abs.starts_with(&root) => abs.to_string_lossy().into_owned(),
                _ => file.to_string_lossy().replace('\\', "/"),
            };

            let deps = analyze_file(&config, &target, silent_reporter())
                .with_context(|| format!("could not analyse {}", file.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&deps)?);
            } else {
                println!("{} ({})", deps.path, deps.status);
                if let Some(err) = &deps.error {
                    println!("  error: {err}");
                }
                println!("\nDirect ({}):", deps.direct.len());
                for d in &deps.direct {
                    println!("  {d}");
                }
                println!("\nTransitive ({}):", deps.transitive.len());
                for d in &deps.transitive {
                    println!("  {d}");
                }
            }
        }
        Commands::Tree { root, ext } => {
            let root = resolve_root(root)?;
            let config = load_config(&root, &ext, None)?;
            let extensions = selected_extensions(&config, &ExtractorRegistry::with_defaults());
            if extensions.is_empty() {
                bail!("no extensions selected");
            }
            let scan = scan_project(&config, &extensions, &RunLog::detached())
                .with_context(|| format!("failed to scan {}", root.display()))?;

            if cli.json {
                let paths: Vec<&String> = scan.files.keys().collect();
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                println!("{}", render_project_tree(scan.files.keys().map(|s| s.as_str())));
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "ctxbundle", &mut std::io::stdout());
        }
    }
    Ok(())
}
