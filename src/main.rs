use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use classweave::core::{AccessContext, DependencyScope, LoaderPaths, ScanResult};
use classweave::formatters::JsonCompactFormatter;
use classweave::{ClasspathScanner, ScanConfig};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "classweave",
    version = "0.1.0",
    author = "classweave developers",
    about = "Scan a classpath into a class graph without loading any classes"
)]
struct Cli {
    /// Classpath entry or platform path list; may be repeated
    #[arg(short, long = "path", value_name = "PATH")]
    paths: Vec<String>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Package prefixes to scan
    #[arg(long, value_name = "PKG", value_delimiter = ',')]
    accept: Vec<String>,

    /// Package prefixes to skip
    #[arg(long, value_name = "PKG", value_delimiter = ',')]
    reject: Vec<String>,

    /// Write the class graph as compact JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Include members and edge origins in the JSON output
    #[arg(long)]
    full: bool,

    /// Print the dependencies of this class
    #[arg(long = "class", value_name = "NAME")]
    class_name: Option<String>,

    /// Restrict --class to dependencies reachable through inheritance
    #[arg(long)]
    accessible_only: bool,

    /// Print the classes carrying this annotation
    #[arg(long, value_name = "NAME")]
    annotation: Option<String>,

    /// Print the subtypes of this class or interface
    #[arg(long, value_name = "NAME")]
    subtypes: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("classweave=info")),
        )
        .init();

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();

    let mut config = match &cli.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    config.scan.accept_packages.extend(cli.accept.iter().cloned());
    config.scan.reject_packages.extend(cli.reject.iter().cloned());

    let scanner = ClasspathScanner::new(config);
    let result = if cli.paths.is_empty() {
        scanner.scan_config_classpath()?
    } else {
        let loaders: Vec<LoaderPaths> = cli
            .paths
            .iter()
            .map(|list| LoaderPaths::from_classpath("cli", list))
            .collect();
        scanner.scan(&loaders)?
    };

    print_summary(&result);

    if let Some(name) = &cli.class_name {
        let scope = if cli.accessible_only {
            DependencyScope::AccessibleOnly
        } else {
            DependencyScope::All
        };
        println!("Dependencies of {name} ({scope:?}):");
        for dependency in result.graph.class_dependencies(name, scope)? {
            println!("  {}", dependency.name());
        }
        if cli.accessible_only {
            let outside = AccessContext::outsider(name);
            let visible = result.graph.dependencies_seen_by(name, &outside)?;
            println!("Visible to other packages: {}", visible.len());
        }
    }

    if let Some(annotation) = &cli.annotation {
        println!("Classes annotated with {annotation}:");
        for node in result.graph.classes_with_annotation(annotation) {
            println!("  {}", node.name());
        }
    }

    if let Some(supertype) = &cli.subtypes {
        println!("Subtypes of {supertype}:");
        for node in result.graph.direct_subtypes(supertype) {
            println!("  {}", node.name());
        }
    }

    if let Some(output) = &cli.output {
        let formatter = if cli.full {
            JsonCompactFormatter::full()
        } else {
            JsonCompactFormatter::new()
        };
        formatter.format_to_file(&result, output)?;
        println!("JSON output: {}", output.display());
    }

    println!(
        "Total execution time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_summary(result: &ScanResult) {
    let stats = &result.stats;
    println!(
        "Scanned {} roots, {} entries in {:.2}s ({:?})",
        stats.roots,
        stats.entries,
        stats.elapsed.as_secs_f64(),
        result.completion
    );
    println!(
        "Classes: {}, shadowed: {}, dangling edges: {}, diagnostics: {}",
        stats.classes,
        stats.shadowed,
        stats.dangling_edges,
        result.diagnostics.len()
    );
}
