//! `hoist` command line entry point.
//!
//! Publishes a local build tree to an S3 bucket and toggles anonymous read
//! access on it. Settings come from the nearest `hoist.json` at or above the
//! publish root, overridden by flags.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hoist_publish::{PublishEngine, PublishOptions, PublishReport};
use hoist_storage::{Destination, ObjectStore, WebsiteConfig};
use hoist_storage_crt::{AwsCredentials, CrtStorageClient, S3Settings, DEFAULT_REGION};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, Config};

/// Incremental, content-addressed publishing of static sites.
#[derive(Parser, Debug)]
#[command(name = "hoist", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a local tree to its destination bucket.
    Publish(PublishArgs),
    /// Serve the destination bucket as a public website.
    Public(BucketArgs),
    /// Revoke anonymous read access to the destination bucket.
    Private(BucketArgs),
}

#[derive(Args, Debug, Clone)]
struct BucketArgs {
    /// Directory whose hoist.json names the bucket.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Destination bucket, overriding hoist.json.
    #[arg(long, env = "HOIST_BUCKET")]
    bucket: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct PublishArgs {
    /// Publish root.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Only publish this sub-directory of the root.
    #[arg(long)]
    dir: Option<String>,

    /// Destination bucket, overriding hoist.json.
    #[arg(long, env = "HOIST_BUCKET")]
    bucket: Option<String>,

    /// Delete unwanted objects once their retention window has passed.
    #[arg(long)]
    auto_delete: bool,

    /// Maximum concurrent uploads.
    #[arg(long)]
    lanes: Option<usize>,

    /// Days an unwanted object is kept before it may be deleted.
    #[arg(long)]
    retention_days: Option<u32>,

    /// Report what would change without writing to the bucket.
    #[arg(long)]
    dry_run: bool,
}

/// Settings of one run after merging hoist.json and flags.
#[derive(Debug)]
struct RunSettings {
    destination: Destination,
    options: PublishOptions,
    s3: S3Settings,
}

fn resolve_bucket(flag: &Option<String>, config: &Config) -> Result<String> {
    flag.clone()
        .or_else(|| config.bucket.clone())
        .context("No destination bucket: pass --bucket or set \"bucket\" in hoist.json")
}

/// Store connection settings from hoist.json.
///
/// Static credentials are used only when both keys are present; otherwise
/// the default provider chain applies.
fn s3_settings(config: &Config) -> S3Settings {
    let credentials: Option<AwsCredentials> =
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: config.session_token.clone(),
            }),
            _ => None,
        };

    S3Settings {
        region: config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        credentials,
        endpoint_url: config.endpoint.clone(),
    }
}

fn resolve_settings(args: &PublishArgs, config: Config) -> Result<RunSettings> {
    let bucket: String = resolve_bucket(&args.bucket, &config)?;
    let s3: S3Settings = s3_settings(&config);

    let mut destination: Destination = Destination::new(bucket);
    if config.create_bucket {
        destination = destination.create_if_missing(config.location);
    }

    let mut options: PublishOptions = PublishOptions::new()
        .with_auto_delete(args.auto_delete || config.auto_delete)
        .with_dry_run(args.dry_run)
        .with_preserve(config.preserve)
        .with_exclude(config.exclude)
        .with_never_cache(config.never_cache);
    if let Some(lanes) = args.lanes.or(config.lanes) {
        options = options.with_lanes(lanes);
    }
    if let Some(days) = args.retention_days.or(config.retention_days) {
        options = options.with_retention_days(days);
    }
    if let Some(dir) = &args.dir {
        options = options.with_scope(dir.clone());
    }

    Ok(RunSettings {
        destination,
        options,
        s3,
    })
}

/// Canonicalize `root` and load the hoist.json governing it.
fn load_root(root: &Path) -> Result<(PathBuf, Config)> {
    let root: PathBuf = root
        .canonicalize()
        .with_context(|| format!("Publish root {} not found", root.display()))?;

    let (config, config_path) = load_config(&root)?;
    match &config_path {
        Some(path) => log::info!("Using {}", path.display()),
        None => log::info!("No hoist.json found above {}", root.display()),
    }
    Ok((root, config))
}

async fn publish(args: PublishArgs, cancel: CancellationToken) -> Result<PublishReport> {
    let (root, config) = load_root(&args.root)?;
    let settings: RunSettings = resolve_settings(&args, config)?;

    let store: CrtStorageClient = CrtStorageClient::new(settings.s3)
        .await
        .context("Failed to set up the storage client")?;

    let report: PublishReport = PublishEngine::new(&store, settings.destination)
        .with_options(settings.options)
        .with_cancellation(cancel)
        .publish(&root)
        .await
        .with_context(|| format!("Failed to publish {}", root.display()))?;
    Ok(report)
}

/// Make the destination bucket public or private.
///
/// Going public also (re)applies the website documents so the bucket serves
/// `index.html` and `404.html`.
///
/// # Returns
/// The bucket name.
async fn set_access(args: BucketArgs, public: bool) -> Result<String> {
    let (_, config) = load_root(&args.root)?;
    let bucket: String = resolve_bucket(&args.bucket, &config)?;

    let store: CrtStorageClient = CrtStorageClient::new(s3_settings(&config))
        .await
        .context("Failed to set up the storage client")?;

    if !store.bucket_exists(&bucket).await? {
        anyhow::bail!("Bucket {} does not exist", bucket);
    }
    if public {
        store
            .configure_website(&bucket, &WebsiteConfig::default())
            .await
            .with_context(|| format!("Failed to configure website hosting on {}", bucket))?;
    }
    store
        .set_public_access(&bucket, public)
        .await
        .with_context(|| format!("Failed to update access on {}", bucket))?;
    Ok(bucket)
}

fn print_report(report: &PublishReport) -> ExitCode {
    println!("{}", report);
    for error in &report.errors {
        eprintln!("  {}", error);
    }
    if report.is_success() {
        println!("Published to {}", report.url);
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_logging(verbose: u8) {
    let level: &str = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter: EnvFilter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},aws_config=warn,aws_smithy_runtime=warn",
            level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli: Cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel: CancellationToken = CancellationToken::new();
    let on_interrupt: CancellationToken = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing in-flight uploads");
            on_interrupt.cancel();
        }
    });

    let result: Result<ExitCode> = match cli.command {
        Command::Publish(args) => publish(args, cancel).await.map(|r| print_report(&r)),
        Command::Public(args) => set_access(args, true).await.map(|bucket| {
            println!("{} is public", bucket);
            ExitCode::SUCCESS
        }),
        Command::Private(args) => set_access(args, false).await.map(|bucket| {
            println!("{} is private", bucket);
            ExitCode::SUCCESS
        }),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_args(argv: &[&str]) -> PublishArgs {
        let mut full: Vec<&str> = vec!["hoist", "publish"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Publish(args) => args,
            other => panic!("expected publish, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_publish_defaults() {
        let args: PublishArgs = publish_args(&[]);
        assert_eq!(args.root, PathBuf::from("."));
        assert!(!args.auto_delete);
        assert!(!args.dry_run);
        assert_eq!(args.lanes, None);
    }

    #[test]
    fn test_flags_override_config() {
        let args: PublishArgs = publish_args(&[
            "site",
            "--dir",
            "blog",
            "--bucket",
            "flag.example.com",
            "--lanes",
            "4",
            "--retention-days",
            "1",
        ]);
        let config: Config = Config {
            bucket: Some("file.example.com".into()),
            region: Some("eu-west-1".into()),
            lanes: Some(20),
            retention_days: Some(9),
            auto_delete: true,
            preserve: vec!["*.pdf".into()],
            ..Default::default()
        };

        let settings: RunSettings = resolve_settings(&args, config).unwrap();

        assert_eq!(settings.destination.bucket, "flag.example.com");
        assert!(!settings.destination.create_if_missing);
        assert_eq!(settings.options.lanes, 4);
        assert_eq!(settings.options.retention_millis(), hoist_common::MILLIS_PER_DAY);
        assert_eq!(settings.options.scope.as_deref(), Some("blog"));
        assert_eq!(settings.options.preserve, vec!["*.pdf".to_string()]);
        assert!(settings.options.auto_delete);
        assert_eq!(settings.s3.region, "eu-west-1");
    }

    #[test]
    fn test_config_fills_missing_flags() {
        let args: PublishArgs = publish_args(&[]);
        let config: Config = Config {
            bucket: Some("file.example.com".into()),
            location: Some("EU".into()),
            create_bucket: true,
            ..Default::default()
        };

        let settings: RunSettings = resolve_settings(&args, config).unwrap();

        assert_eq!(settings.destination.bucket, "file.example.com");
        assert!(settings.destination.create_if_missing);
        assert_eq!(settings.destination.location_hint.as_deref(), Some("EU"));
        assert_eq!(settings.options.lanes, hoist_common::DEFAULT_LANES);
        assert_eq!(settings.s3.region, DEFAULT_REGION);
    }

    #[test]
    fn test_missing_bucket_is_an_error() {
        let args: PublishArgs = publish_args(&[]);
        assert!(resolve_settings(&args, Config::default()).is_err());
    }

    #[test]
    fn test_parse_access_commands() {
        let cli: Cli =
            Cli::try_parse_from(["hoist", "public", "site", "--bucket", "www.example.org"])
                .unwrap();
        match cli.command {
            Command::Public(args) => {
                assert_eq!(args.root, PathBuf::from("site"));
                assert_eq!(args.bucket.as_deref(), Some("www.example.org"));
            }
            other => panic!("expected public, got {:?}", other),
        }

        let cli: Cli = Cli::try_parse_from(["hoist", "private"]).unwrap();
        assert!(matches!(cli.command, Command::Private(ref args) if args.root == PathBuf::from(".")));
    }

    #[test]
    fn test_static_credentials_from_config() {
        let config: Config = Config {
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("secret".into()),
            endpoint: Some("http://localhost:9000".into()),
            ..Default::default()
        };

        let settings: S3Settings = s3_settings(&config);
        let credentials: AwsCredentials = settings.credentials.unwrap();
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert_eq!(credentials.secret_access_key, "secret");
        assert!(credentials.session_token.is_none());
        assert_eq!(settings.endpoint_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_partial_credentials_use_default_chain() {
        let config: Config = Config {
            access_key_id: Some("AKIDEXAMPLE".into()),
            ..Default::default()
        };
        assert!(s3_settings(&config).credentials.is_none());
    }
}
