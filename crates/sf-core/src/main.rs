//! sysfacts - system fact gathering with a persistent cache
//!
//! The main entry point for `sf`, handling:
//! - Fact queries (`sf`, `sf memorysize`, `sf query partitions./dev/sda1.uuid`)
//! - Cache inspection and cleanup (`sf cache status`, `sf cache clear`)
//! - Version reporting

use clap::{Args, Parser, Subcommand};
use humantime::format_duration;
use sf_common::config::ConfigPaths;
use sf_common::{Config, ConfigResolver, Error, GroupIndex, OutputFormat, StructuredError};
use sf_core::cache::{FactCache, GroupStatus};
use sf_core::exit_codes::ExitCode;
use sf_core::facts::{all_requests, requests_for_queries};
use sf_core::logging::{generate_run_id, init_logging, LogConfig, LogLevel};
use sf_core::manager::FactManager;
use sf_core::output::{build_document, render_document, render_serialized};
use sf_core::resolvers::ResolverSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span};

/// sysfacts - gather system facts, cached per group with configurable TTLs
#[derive(Parser)]
#[command(name = "sf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Facts to query (all core facts when empty)
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Path to sysfacts.json
    #[arg(long, global = true, env = "SYSFACTS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true, env = "SYSFACTS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Neither read nor write the fact cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Include legacy facts when listing all facts
    #[arg(long, global = true)]
    show_legacy: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve facts (the default command)
    Query(QueryArgs),

    /// Inspect or clear the persistent fact cache
    Cache(CacheArgs),

    /// Show version information
    Version,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Facts to query (all core facts when empty)
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,
}

#[derive(Args, Debug)]
struct CacheArgs {
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show each cache group's file, TTL, and age
    Status,

    /// Delete every cache group file
    Clear,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too.
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let level = LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet);
    init_logging(&LogConfig::from_env(level));

    let run_id = generate_run_id();
    let span = info_span!("sf", run_id = %run_id);
    let _enter = span.enter();

    let result = match cli.command {
        None => run_query(&cli.global, &cli.queries),
        Some(Commands::Query(args)) => run_query(&cli.global, &args.queries),
        Some(Commands::Cache(args)) => run_cache(&cli.global, &args),
        Some(Commands::Version) => print_version(&cli.global),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => output_error(&cli.global, &err),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn load_config(global: &GlobalOpts) -> Result<Config, Error> {
    ConfigResolver::new(ConfigPaths {
        config_path: global.config.clone(),
        cache_dir: global.cache_dir.clone(),
    })
    .load()
}

fn build_cache(config: &Config) -> FactCache {
    let groups: Arc<dyn GroupIndex> = Arc::new(config.groups.clone());
    FactCache::new(&config.cache_dir, groups)
}

fn run_query(global: &GlobalOpts, queries: &[String]) -> Result<ExitCode, Error> {
    let config = load_config(global)?;

    let cache = if global.no_cache {
        debug!("fact cache disabled by --no-cache");
        None
    } else if !config.groups.has_ttls() {
        debug!("no cache ttls configured");
        None
    } else {
        Some(build_cache(&config))
    };

    let requests = if queries.is_empty() {
        all_requests(global.show_legacy)
    } else {
        requests_for_queries(queries)
    };

    let manager = FactManager::new(ResolverSet::system(), cache);
    let facts = manager.resolve(requests);

    let document = build_document(&facts, !queries.is_empty());
    let rendered = render_document(&document, global.format, queries.len() == 1)?;
    println!("{}", rendered);
    Ok(ExitCode::Clean)
}

fn run_cache(global: &GlobalOpts, args: &CacheArgs) -> Result<ExitCode, Error> {
    let config = load_config(global)?;
    let cache = build_cache(&config);

    match args.action {
        CacheAction::Status => {
            let groups = cache.status();
            match global.format {
                OutputFormat::Text => print_status_text(&cache, &groups),
                format => {
                    let output = serde_json::json!({
                        "cache_dir": cache.cache_dir(),
                        "config_path": config.source.path,
                        "groups": groups,
                    });
                    println!("{}", render_serialized(&output, format)?);
                }
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            match global.format {
                OutputFormat::Text => {
                    println!("removed {} cache file(s) from {}", removed, cache.cache_dir().display());
                }
                format => {
                    let output = serde_json::json!({
                        "cache_dir": cache.cache_dir(),
                        "removed": removed,
                    });
                    println!("{}", render_serialized(&output, format)?);
                }
            }
        }
    }

    Ok(ExitCode::Clean)
}

fn print_status_text(cache: &FactCache, groups: &[GroupStatus]) {
    println!("cache dir: {}", cache.cache_dir().display());
    for status in groups {
        let ttl = status
            .ttl_secs
            .map(|secs| format_duration(Duration::from_secs(secs)).to_string())
            .unwrap_or_else(|| "not cached".to_string());
        let state = match (status.exists, status.expired) {
            (false, _) => "absent".to_string(),
            (true, true) => "expired".to_string(),
            (true, false) => format!(
                "{} fact(s), age {}",
                status.fact_count,
                format_duration(Duration::from_secs(status.age_secs.unwrap_or(0)))
            ),
        };
        println!("  {:<18} ttl {:<12} {}", status.group, ttl, state);
    }
}

fn print_version(global: &GlobalOpts) -> Result<ExitCode, Error> {
    match global.format {
        OutputFormat::Text => {
            println!("sf {}", env!("CARGO_PKG_VERSION"));
        }
        format => {
            let version_info = serde_json::json!({
                "sf_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            println!("{}", render_serialized(&version_info, format)?);
        }
    }
    Ok(ExitCode::Clean)
}

fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    if global.format.is_machine_readable() {
        let structured = StructuredError::from(error);
        match serde_json::to_string_pretty(&structured) {
            Ok(json) => eprintln!("{}", json),
            Err(_) => eprintln!("{}", error),
        }
    } else {
        eprintln!("{}", StructuredError::human(error));
    }
    ExitCode::from(error)
}
