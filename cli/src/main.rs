use anyhow::{anyhow, bail, Result};
use authoring_core::config::{load_config, AuthoringConfig};
use authoring_core::memory::load_catalog;
use authoring_core::search::{SearchOrchestrator, SearchPhase, SearchSettings, SearchView};
use authoring_core::service::Services;
use authoring_core::tree::TreeResolver;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

mod http;

use http::HttpSearchClient;

#[derive(Parser)]
#[command(name = "authoring")]
#[command(about = "Inspect canonical paths, item trees and component search", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical path of a preview URL
    Canonical {
        url: String,
    },
    /// Resolve the ancestor chain of a path against a catalog
    Ancestors {
        /// Catalog JSON file
        #[arg(long)]
        catalog: PathBuf,
        /// Canonical path, or a preview URL when --url is set
        #[arg(long)]
        target: String,
        #[arg(long, default_value_t = false)]
        url: bool,
        /// Root to resolve from; defaults to the content root
        #[arg(long)]
        root: Option<String>,
    },
    /// List every prefix of a path, most specific first
    Paths {
        path: String,
        #[arg(long)]
        root: Option<String>,
    },
    /// Run a component search against an authoring server
    Search {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
        /// Site to search; defaults to the configured site
        #[arg(long)]
        site: Option<String>,
        #[arg(long, default_value = "")]
        keywords: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Page size; defaults to the configured page size
        #[arg(long)]
        limit: Option<usize>,
        /// Request timeout seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AuthoringConfig::default(),
    };

    match cli.command {
        Commands::Canonical { url } => {
            println!("{}", config.paths.to_canonical(&url));
            Ok(())
        }
        Commands::Ancestors { catalog, target, url, root } => ancestors(&config, &catalog, &target, url, root),
        Commands::Paths { path, root } => {
            let resolver = TreeResolver::new(config.paths.clone());
            for prefix in resolver.individual_paths(&path, root.as_deref()) {
                println!("{prefix}");
            }
            Ok(())
        }
        Commands::Search { server, site, keywords, offset, limit, timeout_secs } => {
            let timeout = Duration::from_secs(timeout_secs);
            let limit = limit.unwrap_or(config.search.page_size);
            let settings = search_settings(&config, site)?;
            let client = HttpSearchClient::new(&server, timeout)?;
            run_search(settings, client, &keywords, offset, limit, timeout).await
        }
    }
}

fn ancestors(config: &AuthoringConfig, catalog: &Path, target: &str, is_url: bool, root: Option<String>) -> Result<()> {
    let catalog = load_catalog(catalog)?.with_conventions(config.paths.clone());
    let index = catalog.item_index();
    let resolver = TreeResolver::new(config.paths.clone());
    let target = if is_url { config.paths.to_canonical(target) } else { target.to_string() };
    let root = root.unwrap_or_else(|| config.paths.content_root.clone());

    let chain = resolver.resolve_ancestors(&target, &root, &index);
    tracing::info!(%target, slots = chain.len(), missing = chain.missing_paths().len(), "resolved ancestors");
    println!("{}", serde_json::to_string_pretty(&chain)?);
    Ok(())
}

/// Configured search settings, with `--site` taking precedence over the config file.
fn search_settings(config: &AuthoringConfig, site: Option<String>) -> Result<SearchSettings> {
    let mut settings = config.search_settings();
    if let Some(site) = site {
        settings.site = site;
    }
    if settings.site.trim().is_empty() {
        bail!("no site to search: pass --site or set `site` in the config file");
    }
    Ok(settings)
}

async fn run_search(
    settings: SearchSettings,
    client: HttpSearchClient,
    keywords: &str,
    offset: usize,
    limit: usize,
    timeout: Duration,
) -> Result<()> {
    let mut orchestrator = SearchOrchestrator::spawn(settings, Services::from_backend(Arc::new(client)), None);
    let mut view = orchestrator.subscribe();

    // The base query goes out on spawn; keywords replace it after the debounce.
    if !keywords.is_empty() {
        orchestrator.set_keywords(keywords);
    }
    let settled = settle(&mut view, keywords, 0, None, timeout).await?;
    let settled = if offset != 0 || settled.query.as_ref().is_some_and(|q| q.limit != limit) {
        orchestrator.set_page(offset, limit);
        settle(&mut view, keywords, offset, Some(limit), timeout).await?
    } else {
        settled
    };
    orchestrator.teardown();

    let result = settled.result.unwrap_or_default();
    tracing::info!(total = result.total, hydrated = settled.content_instances.len(), "search finished");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Wait for the response to the query with these keywords and page.
async fn settle(
    view: &mut watch::Receiver<SearchView>,
    keywords: &str,
    offset: usize,
    limit: Option<usize>,
    timeout: Duration,
) -> Result<SearchView> {
    let wait = view.wait_for(|v| match &v.phase {
        SearchPhase::Failed(_) => true,
        SearchPhase::Resolved => v.query.as_ref().is_some_and(|q| {
            q.keywords == keywords && q.offset == offset && limit.map_or(true, |l| q.limit == l)
        }),
        _ => false,
    });
    let settled = tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| anyhow!("search did not settle within {}s", timeout.as_secs()))??
        .clone();
    match &settled.phase {
        SearchPhase::Failed(reason) => Err(anyhow!("search failed: {reason}")),
        _ => Ok(settled),
    }
}
