use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use spdlog::{info, warn};

use syncpress::config::{open_config, Config};
use syncpress::feed::RssChannel;
use syncpress::logger::configure_logger;
use syncpress::new_post::create_post_file;
use syncpress::post::Post;
use syncpress::post_list::load_posts;
use syncpress::store::{PostStore, SqliteStore};
use syncpress::sync::{ConflictPolicy, ConsoleDecider, Decider, Reconciler, ScriptedDecider, SyncReport};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config path
    #[arg(short, long)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a new post file from the configured template
    New {
        /// Title of the post
        title: String,
        /// Directory where the post file is written
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
    /// Reconciles a directory of posts with the database
    Sync {
        /// Directory holding the markdown posts
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Shows what would change without asking or changing anything
        #[arg(long, conflicts_with = "yes")]
        dry_run: bool,
        /// Uploads new posts and deletes missing ones without asking
        #[arg(short, long)]
        yes: bool,
        /// How to handle posts changed on both sides: report, ask, prefer-local or prefer-remote
        #[arg(long)]
        conflicts: Option<ConflictPolicy>,
    },
    /// Writes the RSS feed of the newest stored posts to stdout
    Feed {
        /// Number of posts in the feed
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Prints a stored post as JSON
    Show {
        slug: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path.map(PathBuf::from);

    let config = match open_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("Please run syncpress --help");
            std::process::exit(2);
        }
    };

    if let Err(err) = configure_logger(&config) {
        warn!("Error creating logger sinks. Using console instead. Desc={}", err);
    }

    match args.command {
        Command::New { title, dir } => new_cmd(&config, &title, dir),
        Command::Sync { path, dry_run, yes, conflicts } => {
            let policy = conflicts.unwrap_or(config.sync.conflict_policy);
            sync_cmd(&config, path, dry_run, yes, policy)
        }
        Command::Feed { limit } => feed_cmd(&config, limit),
        Command::Show { slug } => show_cmd(&config, &slug),
    }
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    let db_path = config.store_path();
    info!("Using database {}", db_path.display());
    SqliteStore::open(&db_path).with_context(|| format!("Cannot open database {}", db_path.display()))
}

fn new_cmd(config: &Config, title: &str, dir: PathBuf) -> Result<()> {
    let now = Local::now().naive_local();
    let path = create_post_file(&dir, &config.posts.new_post_template, title, &now)?;
    println!("{}", path.display());
    Ok(())
}

fn sync_cmd(config: &Config, path: PathBuf, dry_run: bool, yes: bool, policy: ConflictPolicy) -> Result<()> {
    let local = load_posts(&path, &config.parser_config())?;
    let mut store = open_store(config)?;

    let report = if dry_run {
        // nothing is approved, conflicts are only reported
        reconcile(&mut store, &mut ScriptedDecider::decline_all(), &path, ConflictPolicy::Report, &local)?
    } else if yes {
        reconcile(&mut store, &mut ScriptedDecider::approve_all(), &path, policy, &local)?
    } else {
        reconcile(&mut store, &mut ConsoleDecider::stdio(), &path, policy, &local)?
    };

    print_report(&report, dry_run)
}

fn reconcile<D: Decider>(store: &mut SqliteStore, decider: &mut D, dir: &Path,
                         policy: ConflictPolicy, local: &[Post]) -> Result<SyncReport> {
    let report = Reconciler::new(store, decider, dir, policy).run(local)?;
    Ok(report)
}

fn print_report(report: &SyncReport, verbose: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if verbose {
        for (slug, action) in &report.plan {
            writeln!(out, "{:>10} {}", action, slug)?;
        }
    }
    for conflict in report.open_conflicts() {
        writeln!(out, "Conflict: {} (local {}, database {})", conflict.slug, conflict.local_hash, conflict.remote_hash)?;
    }
    writeln!(out, "{}", report)?;
    writeln!(out, "Sync done.")?;
    Ok(())
}

fn feed_cmd(config: &Config, limit: Option<usize>) -> Result<()> {
    let store = open_store(config)?;
    let posts = store.list_recent(limit.unwrap_or(config.feed.page_size as usize))?;

    let channel = RssChannel {
        ch_title: &config.feed.title,
        ch_link: &config.feed.site_url,
        ch_desc: &config.feed.description,
    };
    let xml = channel.render(&posts).context("Error rendering RSS feed")?;

    let mut out = std::io::stdout().lock();
    out.write_all(&xml)?;
    writeln!(out)?;
    Ok(())
}

fn show_cmd(config: &Config, slug: &str) -> Result<()> {
    let store = open_store(config)?;
    match store.find_by_slug(slug)? {
        Some(post) => {
            println!("{}", serde_json::to_string_pretty(&post)?);
            Ok(())
        }
        None => bail!("No post with slug {}", slug),
    }
}
