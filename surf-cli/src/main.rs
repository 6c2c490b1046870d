use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use surf::{
    backends::memory::Snapshot,
    config::{CliOverrides, SurfConfig},
    decode::DefaultDecoderFactory,
    links,
    search::{
        BucketSearchInput, BucketSearcher, CertificateFilters, CertificateSearchInput,
        CertificateSearcher, KvSearcher, MatchLevel, RecursiveSearcher, RegexMatcher,
        SearchInput, TableSearchInput, TableSearcher,
    },
    text::sanitize_ascii,
    BucketSearchOutput, CertificateSearchOutput, KvSearchOutput, SurfError, TableSearchOutput,
    TreeSearchOutput,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file layered over the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short = 'j', long, global = true)]
    parallel: Option<usize>,

    /// Abort on the first failing bucket, table or certificate
    #[arg(long, global = true, overrides_with = "no_fail_fast")]
    fail_fast: bool,

    /// Skip failing resources even if the config file says otherwise
    #[arg(long, global = true, overrides_with = "fail_fast")]
    no_fail_fast: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Args)]
struct SnapshotArgs {
    /// JSON or YAML snapshot of the backend to search
    #[arg(short, long)]
    snapshot: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Search secret paths of a hierarchical secret store
    Vault {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Pattern matched against full secret paths
        #[arg(short, long)]
        query: String,

        /// Path to start from; empty searches every storage mount
        #[arg(short, long, default_value = "")]
        path: String,

        /// Server address used for web links
        #[arg(long)]
        address: Option<String>,
    },

    /// Search keys of a key-value store
    Consul {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Pattern matched against keys
        #[arg(short, long)]
        query: String,

        /// Key prefix to list
        #[arg(long, default_value = "")]
        prefix: String,

        /// UI base address used for web links
        #[arg(long)]
        address: Option<String>,
    },

    /// Search object keys across buckets
    S3 {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Pattern matched against object keys
        #[arg(short, long)]
        query: String,

        /// Bucket name pattern; empty selects every bucket
        #[arg(short, long, default_value = "")]
        bucket: String,

        /// Key prefix to list inside each bucket
        #[arg(long, default_value = "")]
        prefix: String,

        /// Search every bucket even above the configured cap
        #[arg(long)]
        all: bool,

        #[arg(long)]
        region: Option<String>,
    },

    /// Search rows across tables
    Ddb {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Pattern matched against attribute names and decoded values
        #[arg(short, long)]
        query: Option<String>,

        /// Table name pattern; empty selects every table
        #[arg(short, long, default_value = "")]
        table: String,

        /// object, table, table_name_only or schema_keys_only
        #[arg(short, long, default_value = "object")]
        level: MatchLevel,

        /// Include global tables
        #[arg(long)]
        include_global: bool,

        /// Stop scanning a table at its first matching row
        #[arg(long)]
        stop_first_match: bool,

        /// Search every table even above the configured cap
        #[arg(long)]
        all: bool,

        /// Report every row instead of matching a query
        #[arg(long)]
        match_all: bool,

        /// Only list the tables that would be searched
        #[arg(long)]
        list_tables: bool,

        /// Replace non-printable characters in values
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        sanitize: bool,

        #[arg(long)]
        region: Option<String>,
    },

    /// Search certificates by domain, ARN or attached resource
    Acm {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Pattern matched against the enabled certificate fields
        #[arg(short, long)]
        query: String,

        /// Match domain names and subject alternative names
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        filter_domains: bool,

        /// Match certificate ARNs
        #[arg(long)]
        filter_id: bool,

        /// Match ARNs of the resources using the certificate
        #[arg(long)]
        filter_used_by: bool,

        /// Match every field above
        #[arg(long)]
        filter_all: bool,

        #[arg(long)]
        region: Option<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if let Some(SurfError::TooManyResources { .. }) = e.downcast_ref::<SurfError>() {
                eprintln!("Hint: pass a name pattern or --all");
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let (vault_address, consul_address, region) = match &cli.command {
        Commands::Vault { address, .. } => (address.clone(), None, None),
        Commands::Consul { address, .. } => (None, address.clone(), None),
        Commands::S3 { region, .. } | Commands::Ddb { region, .. } | Commands::Acm { region, .. } => {
            (None, None, region.clone())
        }
    };
    let config = SurfConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?
        .merge_with_cli(CliOverrides {
            parallel: cli.parallel,
            log_level: None,
            fail_fast: match (cli.fail_fast, cli.no_fail_fast) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            vault_address,
            consul_address,
            region,
        });
    setup_logging(cli.verbose, &config.log_level);
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Vault {
            source, query, path, ..
        } => {
            let snapshot = load_snapshot(&source)?;
            let searcher = RecursiveSearcher::new(snapshot.vault()?, RegexMatcher::default());
            let output = searcher.search(&SearchInput::new(query, path, config.parallel))?;
            emit(cli.output, &output, |o| print_tree(o, &config))
        }
        Commands::Consul {
            source,
            query,
            prefix,
            ..
        } => {
            let snapshot = load_snapshot(&source)?;
            let searcher = KvSearcher::new(snapshot.consul()?, RegexMatcher::default());
            let output = searcher.search(&SearchInput::new(query, prefix, config.parallel))?;
            emit(cli.output, &output, |o| print_kv(o, &config))
        }
        Commands::S3 {
            source,
            query,
            bucket,
            prefix,
            all,
            ..
        } => {
            let snapshot = load_snapshot(&source)?;
            let searcher = BucketSearcher::new(snapshot.s3()?, RegexMatcher::default());
            let input = BucketSearchInput::new(bucket, prefix, query, config.parallel, all)
                .with_limits(config.selection_limits(all))
                .with_fail_fast(config.fail_fast);
            let output = searcher.search(&input)?;
            emit(cli.output, &output, |o| print_buckets(o, &config))
        }
        Commands::Ddb {
            source,
            query,
            table,
            level,
            include_global,
            stop_first_match,
            all,
            match_all,
            list_tables,
            sanitize,
            ..
        } => {
            let snapshot = load_snapshot(&source)?;
            let searcher = TableSearcher::new(
                snapshot.ddb()?,
                RegexMatcher::default(),
                DefaultDecoderFactory::with_delimiter(config.proto_delimiter.clone()),
            );

            let input = if match_all || list_tables {
                TableSearchInput::match_all(table, level, config.parallel)?
            } else {
                TableSearchInput::new(table, query.unwrap_or_default(), level, config.parallel)?
            };
            let input = input
                .with_global_tables(include_global)
                .with_stop_on_first_match(stop_first_match)
                .with_limits(config.selection_limits(all))
                .with_fail_fast(config.fail_fast);

            if list_tables {
                let tables = searcher.list_tables(&input)?;
                let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
                return emit(cli.output, &names, |names| {
                    for name in names {
                        println!("{}", name.blue());
                    }
                });
            }

            let output = searcher.search(&input)?;
            emit(cli.output, &output, |o| print_tables(o, &config, sanitize))
        }
        Commands::Acm {
            source,
            query,
            filter_domains,
            filter_id,
            filter_used_by,
            filter_all,
            ..
        } => {
            let snapshot = load_snapshot(&source)?;
            let searcher = CertificateSearcher::new(snapshot.acm()?, RegexMatcher::default());
            let filters = if filter_all {
                CertificateFilters::all()
            } else {
                CertificateFilters {
                    domains: filter_domains,
                    id: filter_id,
                    used_by: filter_used_by,
                }
            };
            let input = CertificateSearchInput::new(query, config.parallel)?
                .with_filters(filters)
                .with_fail_fast(config.fail_fast);
            let output = searcher.search(&input)?;
            emit(cli.output, &output, |o| print_certificates(o, &config, cli.verbose))
        }
    }
}

fn setup_logging(verbose: u8, config_level: &str) {
    let level = match verbose {
        0 => config_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("surf={},warn", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_snapshot(source: &SnapshotArgs) -> Result<Snapshot> {
    Snapshot::load(&source.snapshot)
        .with_context(|| format!("failed to load snapshot {}", source.snapshot.display()))
}

fn emit<T: Serialize>(format: OutputFormat, output: &T, pretty: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(output)?),
        OutputFormat::Pretty => pretty(output),
    }
    Ok(())
}

fn print_tree(output: &TreeSearchOutput, config: &SurfConfig) {
    let mut paths = output.paths();
    paths.sort();
    for path in &paths {
        match &config.vault_address {
            Some(addr) => println!("{}  {}", path.blue(), links::vault_web_url(addr, path).dimmed()),
            None => println!("{}", path.blue()),
        }
    }
    println!("\nFound {} matching secrets", paths.len().to_string().green());
}

fn print_kv(output: &KvSearchOutput, config: &SurfConfig) {
    for key in &output.matches {
        match &config.consul_address {
            Some(addr) => println!("{}  {}", key.blue(), links::consul_web_url(addr, key).dimmed()),
            None => println!("{}", key.blue()),
        }
    }
    println!("\nFound {} matching keys", output.matches.len().to_string().green());
}

fn print_buckets(output: &BucketSearchOutput, config: &SurfConfig) {
    for (bucket, keys) in &output.bucket_to_matches {
        if keys.is_empty() {
            continue;
        }
        println!("\n{}", bucket.bold());
        for key in keys {
            match &config.region {
                Some(region) => println!(
                    "  {}  {}",
                    key.green(),
                    links::s3_web_url(bucket, region, key).dimmed()
                ),
                None => println!("  {}", key.green()),
            }
        }
    }
    println!(
        "\nFound {} matching keys in {} buckets",
        output.total_matches().to_string().green(),
        output.buckets_searched()
    );
}

fn print_tables(output: &TableSearchOutput, config: &SurfConfig, sanitize: bool) {
    for (table, hits) in &output.table_to_hits {
        if hits.is_empty() {
            continue;
        }
        match &config.region {
            Some(region) => println!(
                "\n{}  {}",
                table.bold(),
                links::dynamodb_web_url(table, region).dimmed()
            ),
            None => println!("\n{}", table.bold()),
        }
        for hit in hits {
            if hit.data.is_empty() {
                continue;
            }
            println!("  {}", "---".dimmed());
            for (name, value) in &hit.data {
                let value = if sanitize {
                    sanitize_ascii(value)
                } else {
                    value.clone()
                };
                println!("  {}: {}", name.blue(), value);
            }
        }
    }
    println!(
        "\nFound {} hits in {} tables",
        output.total_matches().to_string().green(),
        output.tables_searched()
    );
}

fn print_certificates(output: &CertificateSearchOutput, config: &SurfConfig, verbose: u8) {
    for cert in &output.certificates {
        println!("\n{}  [{}]", cert.domain_name.bold(), cert.status.green());
        match &config.region {
            Some(region) => println!("  {}", links::acm_web_url(region, cert.id()).dimmed()),
            None => println!("  {}", cert.arn.dimmed()),
        }
        if verbose > 0 {
            if let Some(created) = &cert.created_at {
                println!("  {}: {}", "Created".blue(), created);
            }
            if let Some(not_after) = &cert.not_after {
                println!("  {}: {}", "Expires".blue(), not_after);
            }
        }
        for arn in &cert.in_use_by {
            println!("  {}: {}", "Used by".blue(), arn);
        }
    }
    println!(
        "\nFound {} matching certificates",
        output.certificates.len().to_string().green()
    );
}
