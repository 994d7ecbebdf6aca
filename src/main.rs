//! Chitin operator CLI
//!
//! Workers and the crawl frontier talk to the store through the library
//! API; this binary is the operator surface: queue inspection, manual
//! enqueueing, purges, blocklist and label management.

use anyhow::Context;
use chitin::config::load_config_with_hash;
use chitin::storage::{open_store, NewTask, Store};
use chitin::taxonomy::ActionKind;
use chitin::url::{normalize_url, url_key};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Chitin: crawl task queue and deduplicated content store
#[derive(Parser, Debug)]
#[command(name = "chitin")]
#[command(version = "1.0.0")]
#[command(about = "Crawl task queue and deduplicated content store", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show queue and store statistics
    Stats,

    /// Enqueue a crawl task (id is generated)
    Enqueue {
        /// URL to crawl
        url: String,

        /// Action to apply: download_file, store_page_text, page_to_pdf
        #[arg(long, default_value = "store_page_text")]
        action: String,

        /// Prettify the fetched page before storing
        #[arg(long)]
        prettify: bool,
    },

    /// Delete a task from the queue
    PurgeTask {
        /// Task id
        id: String,
    },

    /// Delete all stored versions of a URL and its identity
    PurgeUrl {
        /// URL whose content history should be removed
        url: String,
    },

    /// Add a host to the blocklist
    Block {
        host: String,

        /// Note explaining the block
        #[arg(long)]
        comment: Option<String>,
    },

    /// Remove a host from the blocklist
    Unblock { host: String },

    /// List blocked hosts
    Blocked,

    /// Attach a label to a URL (works before the URL was ever fetched)
    Label {
        /// Label short name
        label: String,

        /// URL to tag
        url: String,
    },

    /// Show labels attached to a URL, or all labels
    Labels {
        /// URL to inspect; lists every label when omitted
        url: Option<String>,
    },

    /// Delete a label and every association carrying it
    DeleteLabel {
        /// Label short name
        label: String,
    },

    /// Remove orphaned identity-level labels past the retention window
    SweepLabels,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    let mut store = open_store(Path::new(&config.store.database_path))
        .with_context(|| format!("failed to open store at {}", config.store.database_path))?;

    // Configured blocklist entries are applied on every start so edits to
    // the config file take effect without a separate command
    for entry in &config.blocklist {
        store.block_host(&entry.host, entry.comment.as_deref())?;
    }

    match cli.command {
        Command::Stats => {
            println!("Queued tasks:        {}", store.count_queued()?);
            println!("  transient-failed:  {}", store.count_transient_failures()?);
            println!("  permanent-failed:  {}", store.count_permanent_failures()?);
            println!("Content identities:  {}", store.count_identities()?);
            println!("Content versions:    {}", store.count_versions()?);
            println!("Blocked hosts:       {}", store.blocked_hosts()?.len());
            if let Some(task) = store.next_eligible()? {
                println!("Next eligible task:  {} ({})", task.id, task.url);
            } else {
                println!("Next eligible task:  none");
            }
        }
        Command::Enqueue {
            url,
            action,
            prettify,
        } => {
            let action = ActionKind::from_db_string(&action).with_context(|| {
                format!(
                    "unknown action '{}'; expected one of: {}",
                    action,
                    ActionKind::all()
                        .iter()
                        .map(|a| a.to_db_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?;
            let id = uuid::Uuid::new_v4().to_string();
            let task = NewTask::from_url(id.clone(), &url, action, prettify)?;
            store.enqueue(&task)?;
            println!("Enqueued {} as task {}", task.url, id);
        }
        Command::PurgeTask { id } => {
            store.remove_task(&id)?;
            println!("Removed task {}", id);
        }
        Command::PurgeUrl { url } => {
            let normalized = normalize_url(&url)?;
            let key = url_key(&normalized);
            match store.identity_by_key(&key)? {
                Some(identity) => {
                    let locations = store.remove_all_versions(identity.id)?;
                    println!("Removed identity {} and its versions", identity.url);
                    if !locations.is_empty() {
                        println!("Externally stored payloads left to clean up:");
                        for loc in locations {
                            println!("  [{}] {}", loc.backend, loc.location);
                        }
                    }
                }
                None => println!("No stored content for {}", normalized),
            }
        }
        Command::Block { host, comment } => {
            store.block_host(&host, comment.as_deref())?;
            println!("Blocked {}", host);
        }
        Command::Unblock { host } => {
            store.unblock_host(&host)?;
            println!("Unblocked {}", host);
        }
        Command::Blocked => {
            let entries = store.blocked_hosts()?;
            if entries.is_empty() {
                println!("Blocklist is empty");
            }
            for entry in entries {
                match entry.comment {
                    Some(comment) => println!("{}  # {}", entry.host, comment),
                    None => println!("{}", entry.host),
                }
            }
        }
        Command::Label { label, url } => {
            let normalized = normalize_url(&url)?;
            let key = url_key(&normalized);
            store.attach_label_to_key(&label, &key)?;
            println!("Attached '{}' to {}", label, normalized);
        }
        Command::Labels { url: Some(url) } => {
            let normalized = normalize_url(&url)?;
            let labels = store.labels_for_key(&url_key(&normalized))?;
            if labels.is_empty() {
                println!("No labels on {}", normalized);
            }
            for label in labels {
                println!("{}", label);
            }
        }
        Command::Labels { url: None } => {
            for label in store.labels()? {
                match label.description {
                    Some(description) => println!("{}  # {}", label.short_name, description),
                    None => println!("{}", label.short_name),
                }
            }
        }
        Command::DeleteLabel { label } => {
            store.delete_label(&label)?;
            println!("Deleted label '{}'", label);
        }
        Command::SweepLabels => {
            let cutoff = chrono::Utc::now()
                - chrono::Duration::days(config.labels.sweep_retention_days as i64);
            let removed = store.sweep_orphan_key_labels(cutoff)?;
            println!("Removed {} orphaned label associations", removed);
        }
    }

    Ok(())
}

/// Sets up logging based on verbosity flags
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
