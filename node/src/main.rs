use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use shepherd_files::{FileLocator, LedgerQuery, ProviderFetcher, RestLedgerQuery};
use shepherd_names::{AliasResolver, RestNameRegistry};
use shepherd_rpc::{start_server, AppState, Gateway};
use shepherd_storage::{ContentCache, SledContentCache};
use shepherd_types::MimeTable;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings;
mod version;

use settings::AppConfig;
use version::{git_commit_hash, SHEPHERD_VERSION};

fn cli() -> Command {
    Command::new("shepherd")
        .version(SHEPHERD_VERSION)
        .about("Read-only HTTP gateway for content-addressed storage")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to listen on"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Port to listen on"),
        )
        .arg(
            Arg::new("lcd-url")
                .long("lcd-url")
                .value_name("URL")
                .help("Ledger REST (LCD) endpoint"),
        )
        .arg(
            Arg::new("cache-path")
                .long("cache-path")
                .value_name("DIR")
                .help("Content cache directory"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Serve every request from the network"),
        )
        .arg(
            Arg::new("list-cache")
                .long("list-cache")
                .action(ArgAction::SetTrue)
                .help("Print every cached key and exit"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log filter when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Log output format"),
        )
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    if let Some(lcd_url) = matches.get_one::<String>("lcd-url") {
        config.lcd_url = lcd_url.clone();
    }

    if let Some(cache_path) = matches.get_one::<String>("cache-path") {
        config.cache_path = cache_path.clone();
    }

    if matches.get_flag("no-cache") {
        config.cache_enabled = false;
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config_with_overrides(&matches)?;

    if matches.get_flag("list-cache") {
        return list_cache(&config);
    }

    init_logging(&config)?;

    info!(
        "Starting Shepherd gateway {} ({})",
        SHEPHERD_VERSION,
        git_commit_hash()
    );
    if let Some(path) = &config.config_path {
        info!("Configuration file: {}", path.display());
    }

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let ledger: Arc<dyn LedgerQuery> = Arc::new(RestLedgerQuery::new(
        &config.lcd_url,
        http.clone(),
        config.ledger_timeout(),
    ));
    let registry = Arc::new(RestNameRegistry::new(
        &config.lcd_url,
        http.clone(),
        config.ledger_timeout(),
    ));
    info!("Ledger endpoint: {}", config.lcd_url);

    let sled_cache = open_cache(&config)?;
    let cache = sled_cache
        .clone()
        .map(|cache| cache as Arc<dyn ContentCache>);

    let mime = MimeTable::embedded().context("embedded MIME table is invalid")?;
    info!("Loaded {} MIME types", mime.len());

    let gateway = Gateway::new(
        AliasResolver::new(registry, config.alias_suffix.clone()),
        FileLocator::new(ledger.clone()),
        ProviderFetcher::new(ledger, http, config.fetch_config()),
        cache,
    );
    let state = AppState::new(gateway, mime, config.banner.clone());

    let addr = config.listen_addr();
    tokio::select! {
        result = start_server(state, &addr) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutting down Shepherd gateway");
        }
    }

    if let Some(cache) = sled_cache {
        cache.flush().context("failed to flush content cache")?;
    }

    info!("Shepherd gateway shutdown complete");
    Ok(())
}

fn open_cache(config: &AppConfig) -> Result<Option<Arc<SledContentCache>>> {
    if !config.cache_enabled {
        warn!("Content cache disabled; every request goes to the network");
        return Ok(None);
    }

    let cache = SledContentCache::open(config.cache_path()).with_context(|| {
        format!(
            "failed to open content cache at {}",
            config.cache_path().display()
        )
    })?;
    info!(
        "Content cache at {} holds {} entries",
        config.cache_path().display(),
        cache.len()?
    );
    Ok(Some(Arc::new(cache)))
}

fn list_cache(config: &AppConfig) -> Result<()> {
    let cache = SledContentCache::open(config.cache_path()).with_context(|| {
        format!(
            "failed to open content cache at {}",
            config.cache_path().display()
        )
    })?;
    let keys = cache.keys()?;
    for key in &keys {
        println!("{key}");
    }
    println!("{} entries", keys.len());
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}
