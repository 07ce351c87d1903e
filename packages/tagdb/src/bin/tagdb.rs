//! tagdb - command-line front end over a tag database snapshot
//!
//! Usage: tagdb [--root DIR] [--config FILE] <command>
//!
//! Logging goes to stderr; set `TAGDB_LOG` (e.g. `TAGDB_LOG=debug`) to
//! change the filter, default `warn`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tagdb::{Resolution, TagDb, TagDbConfig, TagDbError, Target};

#[derive(Parser)]
#[command(version, about = "Tag database: browse and edit files by tag")]
struct Opts {
    /// Directory holding the snapshot (overrides the config file)
    #[arg(long)]
    root: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory, or show what a path names
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Describe a path: kind, ids, tags
    Stat { path: String },
    /// Create a file record at a path
    Touch { path: String },
    /// Add tags to the file at a path
    Tag {
        path: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove the file at a path from that path's tags
    Rm { path: String },
    /// Move or rename a file
    Mv { from: String, to: String },
    /// Create empty tags for every component of a path
    Mkdir { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Show the tags of a path
    Tags {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print every file record
    Dump,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGDB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn load_config(opts: &Opts) -> anyhow::Result<TagDbConfig> {
    let mut config = match &opts.config {
        Some(path) => TagDbConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => TagDbConfig::default(),
    };
    if let Some(root) = &opts.root {
        config.root = root.clone();
    }
    Ok(config)
}

fn print_resolution(resolution: &Resolution) {
    match resolution {
        Resolution::Directory(entries) | Resolution::Files(entries) => {
            for entry in entries {
                println!("{}", entry.listing_name());
            }
        }
        Resolution::File(entry) => println!("{}", entry.name),
    }
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let config = load_config(&opts)?;
    let db = TagDb::open(&config)
        .with_context(|| format!("opening {}", config.snapshot_path().display()))?;

    match opts.command {
        Command::Ls { path } => print_resolution(&db.resolve(&path, Target::Unsure)?),
        Command::Stat { path } => {
            let resolution = db.resolve(&path, Target::Unsure)?;
            println!("path: {}", path);
            println!("kind: {}", resolution.kind());
            match &resolution {
                Resolution::Directory(entries) => println!("entries: {}", entries.len()),
                Resolution::File(_) | Resolution::Files(_) => {
                    if let Some(record) = resolution.single_file().and_then(|e| db.file(e.id)) {
                        println!("id: {}", record.id);
                        println!("storage: {}", record.storage_name());
                    }
                }
            }
            let tags: Vec<String> = db.list_tags_of(&path)?.into_iter().collect();
            println!("tags: {}", tags.join(" "));
        }
        Command::Touch { path } => {
            let id = db.create_at(&path)?;
            println!("{}", id);
        }
        Command::Tag { path, tags } => {
            let resolution = db.resolve(&path, Target::File)?;
            let entry = resolution
                .single_file()
                .ok_or_else(|| TagDbError::NoSuchFile(path.clone()))?;
            db.add_tags(entry.id, &tags)?;
        }
        Command::Rm { path } => {
            let outcome = db.unlink(&path)?;
            if outcome.deleted {
                println!("deleted {}", outcome.storage_name);
            }
        }
        Command::Mv { from, to } => {
            let outcome = db.rename(&from, &to)?;
            if outcome.old_storage_name != outcome.new_storage_name {
                println!("{} -> {}", outcome.old_storage_name, outcome.new_storage_name);
            }
        }
        Command::Mkdir { path } => {
            db.mkdir(&path)?;
        }
        Command::Rmdir { path } => {
            for tag in db.rmdir(&path)? {
                println!("removed tag {}", tag);
            }
        }
        Command::Tags { path } => {
            for tag in db.list_tags_of(&path)? {
                println!("{}", tag);
            }
        }
        Command::Dump => db.read(|catalog| {
            for record in catalog.files() {
                let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
                let root = if catalog.in_root(record.id) { " /" } else { "" };
                println!("{} {} [{}]{}", record.id, record.name, tags.join(","), root);
            }
        }),
    }
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run(Opts::parse()) {
        eprintln!("tagdb: {:#}", e);
        let status = e
            .downcast_ref::<TagDbError>()
            .map(TagDbError::errno)
            .unwrap_or(1);
        std::process::exit(status);
    }
}
