//! crxviewer CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use crxviewer::models::SignatureKind;
use crxviewer::packager::builder::{default_file_names, write_original, write_payload};
use crxviewer::packager::{load_package_file, PackageArchive};
use crxviewer::{
    inspect_package, load_package, public_key_to_extension_id, DecodeOptions, DecodedPackage,
    FetchOptions, HeaderPolicy, PackageReport, PackageSource, Progress,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "crxviewer")]
#[command(about = "Inspect and unpack CRX/XPI extension packages", long_about = None)]
#[command(version)]
struct Cli {
    /// Fail on unexpected CRX3 header fields instead of warning
    #[arg(long, global = true)]
    strict: bool,

    /// Maximum number of nested CRX layers to unwrap
    #[arg(long, global = true, default_value_t = 10)]
    max_depth: usize,

    /// Network timeout in seconds
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format, public key, extension ID and signer of packages
    Inspect {
        /// Files, directories or URLs (store pages are resolved)
        #[arg(required = true)]
        sources: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Extract the ZIP payload of a package
    Unpack {
        source: String,

        /// Output path for the ZIP payload
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save the original container when it held a nested CRX
        #[arg(long)]
        original: Option<PathBuf>,
    },

    /// List the files inside a package
    List { source: String },

    /// Compute the extension ID of a base64 public key
    Id { public_key: String },

    /// Show the Mozilla signing certificate subject of an XPI
    Signer { source: String },
}

impl Cli {
    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.timeout),
            decode: DecodeOptions {
                header_policy: if self.strict { HeaderPolicy::Strict } else { HeaderPolicy::Lenient },
                max_nesting_depth: self.max_depth,
                ..DecodeOptions::default()
            },
            ..FetchOptions::default()
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "crxviewer=debug" } else { "crxviewer=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Fetch and decode one source, showing a progress bar for downloads.
async fn load(arg: &str, options: &FetchOptions) -> Result<DecodedPackage> {
    let source = PackageSource::from_arg(arg);
    let bar = matches!(source, PackageSource::Url(_)).then(|| {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner} {bytes}/{total_bytes} [{bar:30.cyan/dim}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    });
    let report: &(dyn Fn(Progress) + Send + Sync) = &|p: Progress| {
        if let Some(bar) = &bar {
            if let Some(total) = p.total {
                bar.set_length(total);
            }
            bar.set_position(p.loaded);
        }
    };

    let result = tokio::select! {
        result = load_package(source, options, Some(report)) => result,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted"),
    };
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    result
        .with_context(|| format!("Failed to load {}", arg))?
        .with_context(|| format!("No input: {}", arg))
}

fn print_report(source: &str, report: &PackageReport) {
    println!("{}", source.bold().blue());
    let summary = &report.summary;
    println!("  Format:       {}", summary.format);
    println!("  Payload:      {} bytes, {} files", summary.payload_size, report.file_count);
    if summary.nesting_depth > 0 {
        println!("  Nested CRX:   {} level(s) unwrapped", summary.nesting_depth);
    }
    if let (Some(name), Some(version)) = (&report.name, &report.version) {
        println!("  Manifest:     {} v{}", name, version);
    }
    if let Some(id) = &report.gecko_id {
        println!("  Add-on ID:    {}", id.green());
    }
    if let Some(id) = &summary.extension_id {
        println!("  Extension ID: {}", id.green());
    }
    if let Some(key) = &summary.public_key {
        println!("  Public key:   {}", key.dimmed());
    }
    match report.manifest_key_matches {
        Some(true) => println!("  Manifest key: {}", "matches container".green()),
        Some(false) => println!("  Manifest key: {}", "differs from container".yellow()),
        None => {}
    }
    if let Some(signature) = &report.signature {
        print_signature(signature);
    }
    if let Some(error) = &report.signature_error {
        println!("  Signature:    {}", error.red());
    }
    for warning in &summary.warnings {
        println!("  {} {}", "⚠️ ".yellow(), warning);
    }
    println!();
}

fn print_signature(signature: &crxviewer::models::SignatureInfo) {
    match signature.kind {
        SignatureKind::Cose => {
            let subject = signature.subject.clone().unwrap_or_default();
            let environment = if signature.is_production() { "production".green() } else { "non-production".yellow() };
            println!(
                "  Signed by:    CN={} OU={} ({})",
                subject.common_name.as_deref().unwrap_or("?"),
                subject.organizational_unit.as_deref().unwrap_or("?"),
                environment
            );
        }
        SignatureKind::Pkcs7Only => println!("  Signature:    PKCS#7 only (mozilla.rsa)"),
        SignatureKind::Unsigned => {}
    }
}

/// Expands directories into the packages they contain.
fn expand_sources(sources: &[String]) -> Vec<String> {
    let mut expanded = Vec::new();
    for source in sources {
        let path = Path::new(source);
        if !path.is_dir() {
            expanded.push(source.clone());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let is_package = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "crx" | "xpi" | "zip"))
                .unwrap_or(false);
            if entry.file_type().is_file() && is_package {
                expanded.push(entry.path().display().to_string());
            }
        }
    }
    expanded
}

async fn run(cli: Cli) -> Result<()> {
    let options = cli.fetch_options();

    match cli.command {
        Commands::Inspect { sources, json } => {
            let mut reports = Vec::new();
            let mut failures = 0usize;
            for source in expand_sources(&sources) {
                let loaded = if Path::new(&source).is_file() {
                    load_package_file(Path::new(&source), &options.decode)
                } else {
                    load(&source, &options).await
                };
                match loaded.and_then(|package| inspect_package(&package)) {
                    Ok(report) if json => reports.push(serde_json::json!({ "source": source, "report": report })),
                    Ok(report) => print_report(&source, &report),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{} {}", "❌".red(), format!("{}: {:#}", source, e).red());
                    }
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            if failures > 0 {
                anyhow::bail!("{} package(s) failed to decode", failures);
            }
        }

        Commands::Unpack { source, output, original } => {
            let package = load(&source, &options).await?;
            let stem = Path::new(&source)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| package.extension_id().map(|id| id.to_string()))
                .unwrap_or_else(|| "package".to_string());
            let (default_zip, default_original) = default_file_names(&stem, &package);

            let zip_path = output.unwrap_or(default_zip);
            write_payload(&package, &zip_path)?;
            println!("{} {}", "✅ Wrote".green(), zip_path.display());

            if let Some(path) = original.or(default_original.filter(|_| package.is_nested())) {
                if write_original(&package, &path)? {
                    println!("{} {}", "✅ Wrote original".green(), path.display());
                } else {
                    println!("{}", "Nothing nested; original not written".dimmed());
                }
            }
        }

        Commands::List { source } => {
            let package = load(&source, &options).await?;
            let archive = PackageArchive::open(&package)?;
            for entry in archive.entries() {
                if entry.is_dir {
                    println!("{:>10}  {}", "", entry.path.blue());
                } else {
                    println!("{:>10}  {}", entry.size, entry.path);
                }
            }
        }

        Commands::Id { public_key } => {
            let id = public_key_to_extension_id(&public_key)?;
            println!("{}", id);
        }

        Commands::Signer { source } => {
            let package = load(&source, &options).await?;
            let mut archive = PackageArchive::open(&package)?;
            let signature = crxviewer::signing::inspect_signature(&mut archive)?;
            print_signature(&signature);
            if signature.kind == SignatureKind::Unsigned {
                println!("{}", "Package is not signed".yellow());
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}", "❌ Failed!".red().bold());
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}
