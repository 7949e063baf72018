//! ChainFS command line
//!
//! Operates on a single container file, creating it on first use.

use anyhow::{bail, Context};
use chainfs::{ContainerConfig, FileSystem};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "chainfs")]
#[command(about = "Block-structured file system inside a single container file")]
struct Args {
    /// Path to the container file
    #[arg(short = 'c', long, default_value = "File_system.bin")]
    container: PathBuf,

    /// TOML file overriding the container geometry
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files with size and start block
    Ls,
    /// Create a file from a string
    Create { name: String, content: String },
    /// Print a file's content
    Cat { name: String },
    /// Append a string to an existing file
    Append { name: String, content: String },
    /// Delete a file
    Rm { name: String },
    /// Copy a host file into the container
    Import {
        host_path: PathBuf,
        /// Name inside the container (defaults to the host file name)
        name: Option<String>,
    },
    /// Copy a file out to the host
    Export { name: String, host_path: PathBuf },
    /// Repack all files contiguously
    Defrag,
    /// Print space accounting as JSON
    Stats,
    /// Audit block ownership
    Verify,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ContainerConfig> {
    match path {
        Some(path) => ContainerConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path)),
        None => Ok(ContainerConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let mut fs = FileSystem::open_or_create(&args.container, config)
        .with_context(|| format!("Failed to open container {:?}", args.container))?;

    let mut stdout = std::io::stdout().lock();

    match args.command {
        Command::Ls => {
            for entry in fs.list() {
                let start = entry
                    .start_block
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "-".to_string());
                writeln!(stdout, "{:<32} {:>10} {:>8}", entry.filename, entry.file_size, start)?;
            }
        }
        Command::Create { name, content } => {
            fs.create(&name, content.as_bytes())
                .with_context(|| format!("Failed to create {}", name))?;
            info!("Created {}", name);
        }
        Command::Cat { name } => {
            let content = fs
                .read(&name)
                .with_context(|| format!("Failed to read {}", name))?;
            stdout.write_all(&content)?;
            writeln!(stdout)?;
        }
        Command::Append { name, content } => {
            fs.append(&name, content.as_bytes())
                .with_context(|| format!("Failed to append to {}", name))?;
            info!("Appended {} bytes to {}", content.len(), name);
        }
        Command::Rm { name } => {
            fs.delete(&name)
                .with_context(|| format!("Failed to delete {}", name))?;
            info!("Deleted {}", name);
        }
        Command::Import { host_path, name } => {
            let name = match name {
                Some(name) => name,
                None => match host_path.file_name().and_then(|n| n.to_str()) {
                    Some(n) => n.to_string(),
                    None => bail!("Cannot derive a file name from {:?}", host_path),
                },
            };
            fs.import_file(&host_path, &name)
                .with_context(|| format!("Failed to import {:?}", host_path))?;
            info!("Imported {:?} as {}", host_path, name);
        }
        Command::Export { name, host_path } => {
            let written = fs
                .export_file(&name, &host_path)
                .with_context(|| format!("Failed to export {}", name))?;
            info!("Exported {} bytes to {:?}", written, host_path);
        }
        Command::Defrag => {
            let report = fs.defragment().context("Defragmentation failed")?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        Command::Stats => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(&fs.stats())?)?;
        }
        Command::Verify => {
            let report = fs.verify().context("Block audit failed")?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
            if !report.is_consistent() {
                bail!(
                    "Container is inconsistent: {} leaked, {} double-owned blocks",
                    report.leaked.len(),
                    report.double_owned.len()
                );
            }
        }
    }

    fs.close().context("Failed to flush container")?;
    Ok(())
}
