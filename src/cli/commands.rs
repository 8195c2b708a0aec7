//! Command implementations for the onion-index CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use tracing::{debug, warn};

use crate::ban::{BanGate, SqliteBanStore, host_of};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::Config;
use crate::db;
use crate::document::Document;
use crate::host::{HostStatusStore, SqliteHostStatusStore};
use crate::search::SearchRequest;
use crate::service::IndexHandle;
use crate::storage::FileStorage;

/// Execute a CLI command.
pub fn execute_command(args: OnionIndexArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    match &args.command {
        Command::Search(search_args) => search_index(search_args, &config, &args),
        Command::Stats => show_stats(&config, &args),
        Command::Add(add_args) => add_documents(add_args, &config, &args),
        Command::Remove(url_args) => remove_document(url_args, &config, &args),
        Command::Ban(url_args) => run_async(ban(url_args, BanAction::Ban, &config, &args)),
        Command::Unban(url_args) => run_async(ban(url_args, BanAction::Unban, &config, &args)),
        Command::IsBanned(url_args) => run_async(ban(url_args, BanAction::Check, &config, &args)),
        Command::Hosts(hosts_args) => run_async(hosts(hosts_args, &config, &args)),
    }
}

/// Read the configuration file if one was given and apply command line overrides.
fn load_config(args: &OnionIndexArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &args.index_dir {
        config.index.index_dir = dir.clone();
    }
    debug!(index_dir = %config.index.index_dir.display(), "loaded configuration");
    Ok(config)
}

fn run_async<F: Future<Output = anyhow::Result<()>>>(future: F) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(future)
}

/// Search the index.
fn search_index(
    search_args: &SearchArgs,
    config: &Config,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let handle = IndexHandle::open(&config.index)?;
    let limit = search_args.limit.unwrap_or(config.index.default_limit);
    let request = SearchRequest::new(search_args.query.as_str(), limit).offset(search_args.offset);

    let start_time = Instant::now();
    let results = handle.search_request(&request)?;
    let duration = start_time.elapsed();
    handle.close()?;

    output_result(
        &SearchOutput {
            query: search_args.query.clone(),
            total_hits: results.total_hits,
            max_score: results.max_score,
            duration_ms: duration.as_millis() as u64,
            hits: results.hits,
        },
        args,
    )
}

/// Show index statistics.
fn show_stats(config: &Config, args: &OnionIndexArgs) -> anyhow::Result<()> {
    let handle = IndexHandle::open(&config.index)?;
    let searcher = handle.searcher();
    let reader = searcher.reader();
    let storage = FileStorage::new(handle.directory())?;

    let stats = IndexStats {
        index_dir: handle.directory().display().to_string(),
        generation: reader.generation(),
        committed_at: reader.commit().committed_at,
        live_documents: reader.num_docs(),
        max_doc: reader.max_doc(),
        segments: reader.segments().len(),
        index_size_bytes: storage.total_size()?,
    };
    drop(searcher);
    handle.close()?;

    output_result(&stats, args)
}

/// Add documents from a JSON-lines file and persist them as one commit.
fn add_documents(
    add_args: &AddArgs,
    config: &Config,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let path = &add_args.document_file;
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let start_time = Instant::now();
    let handle = IndexHandle::open(&config.index)?;
    let mut documents_added = 0;
    let mut lines_skipped = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Document>(&line) {
            Ok(doc) => {
                handle.add(&doc)?;
                documents_added += 1;
            }
            Err(e) if add_args.strict => {
                bail!("{}:{}: {e}", path.display(), line_num + 1);
            }
            Err(e) => {
                warn!(line = line_num + 1, error = %e, "skipping malformed document");
                lines_skipped += 1;
            }
        }
    }

    let generation = handle.persist()?;
    handle.close()?;

    output_result(
        &AddOutput {
            documents_added,
            lines_skipped,
            generation,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        args,
    )
}

/// Remove every document carrying the URL.
fn remove_document(
    url_args: &UrlArgs,
    config: &Config,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let handle = IndexHandle::open(&config.index)?;
    handle.remove(&url_args.url)?;
    let generation = handle.persist()?;
    let live_documents = handle.num_docs();
    handle.close()?;

    output_result(
        &RemoveOutput {
            url: url_args.url.clone(),
            generation,
            live_documents,
        },
        args,
    )
}

#[derive(Debug, Clone, Copy)]
enum BanAction {
    Ban,
    Unban,
    Check,
}

async fn ban(
    url_args: &UrlArgs,
    action: BanAction,
    config: &Config,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let host = host_of(&url_args.url)?;
    let pool = db::connect_sqlite(&config.database).await?;
    let gate = BanGate::uncached(Arc::new(SqliteBanStore::new(pool)));

    match action {
        BanAction::Ban => gate.ban(&url_args.url).await?,
        BanAction::Unban => gate.unban(&url_args.url).await?,
        BanAction::Check => {}
    }
    let banned = gate.is_banned(&url_args.url).await?;

    output_result(
        &BanOutput {
            url: url_args.url.clone(),
            host,
            banned,
        },
        args,
    )
}

async fn hosts(
    hosts_args: &HostsArgs,
    config: &Config,
    args: &OnionIndexArgs,
) -> anyhow::Result<()> {
    let pool = db::connect_sqlite(&config.database).await?;
    let store = SqliteHostStatusStore::new(pool);

    let status = match &hosts_args.host {
        Some(host) => {
            if let Some(state) = hosts_args.set {
                store.set_status(host, state == HostState::Online).await?;
            }
            store.status(host).await?
        }
        None => None,
    };

    output_result(
        &HostsOutput {
            known_hosts: store.count().await?,
            status,
        },
        args,
    )
}
