use crate::services::photo_store::{DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE, UploadPolicy};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Centralized application configuration for the API server.
/// Combines environment variables and CLI arguments; read-only after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Selects the filesystem backend instead of S3.
    pub use_mock: bool,
    pub mock_storage_dir: PathBuf,
    /// Origin clients reach this server at; prefixes mock URLs.
    pub public_base_url: String,
    /// Directory holding the static tester page.
    pub public_dir: PathBuf,
    /// CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    pub policy: UploadPolicy,
    /// Present whenever `use_mock` is false.
    pub s3: Option<S3Settings>,
}

/// Where and how to reach the S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO/LocalStack.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    /// Attach the `public-read` canned ACL to uploads.
    pub public_read: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo upload API")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Use the local filesystem instead of S3 (overrides USE_MOCK_SERVICES)
    #[arg(long)]
    pub mock: bool,

    /// Directory for mock storage (overrides MOCK_STORAGE_DIR)
    #[arg(long)]
    pub mock_storage_dir: Option<PathBuf>,

    /// Directory with the static tester page (overrides PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<PathBuf>,

    /// S3 bucket (overrides S3_BUCKET_NAME)
    #[arg(long)]
    pub bucket: Option<String>,

    /// AWS region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge CLI args over values from `lookup`, which stands in for the
    /// process environment.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .or_else(|| lookup("PHOTO_UPLOAD_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "PORT", 3000)?,
        };
        let use_mock = args.mock || parse_flag(&lookup, "USE_MOCK_SERVICES")?;

        let mock_storage_dir = args
            .mock_storage_dir
            .or_else(|| lookup("MOCK_STORAGE_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./mock-storage"));
        let public_dir = args
            .public_dir
            .or_else(|| lookup("PUBLIC_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./public"));
        let public_base_url =
            lookup("PUBLIC_BASE_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".into()]);

        let allowed_mime_types = lookup("ALLOWED_MIME_TYPES")
            .map(|raw| split_list(&raw))
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_ALLOWED_MIME_TYPES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        let policy = UploadPolicy {
            allowed_mime_types,
            max_file_size: parse_var(&lookup, "MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?,
        };

        let bucket = args.bucket.or_else(|| lookup("S3_BUCKET_NAME"));
        let s3 = match bucket {
            Some(bucket) => Some(S3Settings {
                bucket,
                region: args
                    .region
                    .or_else(|| lookup("AWS_REGION"))
                    .unwrap_or_else(|| "us-east-1".into()),
                endpoint_url: lookup("S3_ENDPOINT_URL"),
                force_path_style: parse_flag(&lookup, "S3_FORCE_PATH_STYLE")?,
                public_read: parse_flag(&lookup, "S3_PUBLIC_READ")?,
            }),
            None if use_mock => None,
            None => bail!("S3_BUCKET_NAME must be set unless USE_MOCK_SERVICES=true"),
        };

        Ok(Self {
            host,
            port,
            use_mock,
            mock_storage_dir,
            public_base_url,
            public_dir,
            allowed_origins,
            policy,
            s3,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the standalone ingest function.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub host: String,
    pub port: u16,
    /// Shared bearer secret the capture client presents.
    pub secret: String,
    pub target: IngestTarget,
}

/// Where ingested frames are written.
#[derive(Debug, Clone)]
pub enum IngestTarget {
    S3(S3Settings),
    Directory(PathBuf),
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo ingest function")]
pub struct IngestArgs {
    /// Host to bind to (overrides INGEST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides INGEST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Write frames to this directory instead of S3 (overrides INGEST_LOCAL_DIR)
    #[arg(long)]
    pub local_dir: Option<PathBuf>,
}

impl IngestConfig {
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(IngestArgs::parse(), |name| env::var(name).ok())
    }

    pub fn resolve(args: IngestArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = args
            .host
            .or_else(|| lookup("INGEST_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "INGEST_PORT", 3001)?,
        };
        let secret = lookup("SECRET_KEY")
            .filter(|s| !s.is_empty())
            .context("SECRET_KEY must be set for the ingest function")?;

        let target = match args
            .local_dir
            .or_else(|| lookup("INGEST_LOCAL_DIR").map(PathBuf::from))
        {
            Some(dir) => IngestTarget::Directory(dir),
            None => IngestTarget::S3(S3Settings {
                bucket: lookup("BUCKET_NAME")
                    .context("BUCKET_NAME must be set unless INGEST_LOCAL_DIR is")?,
                region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint_url: lookup("S3_ENDPOINT_URL"),
                force_path_style: parse_flag(&lookup, "S3_FORCE_PATH_STYLE")?,
                public_read: false,
            }),
        };

        Ok(Self {
            host,
            port,
            secret,
            target,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Capture client settings. CLI only, apart from the token.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Poll a camera and relay frames to the ingest endpoint")]
pub struct CaptureArgs {
    /// Snapshot URL of the camera
    #[arg(long, default_value = "http://192.13.13.13/capture.jpg")]
    pub camera_url: String,

    /// Ingest endpoint frames are POSTed to
    #[arg(long, default_value = "http://localhost:3001/upload")]
    pub upload_url: String,

    /// Bearer token for the ingest endpoint (falls back to CAPTURE_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Poll period in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Where the most recent frame is written for viewing
    #[arg(long, default_value = "./latest.jpg")]
    pub preview: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub camera_url: String,
    pub upload_url: String,
    pub token: String,
    pub interval: Duration,
    pub preview_path: PathBuf,
}

impl CaptureConfig {
    pub fn from_env_and_args() -> Result<Self> {
        let args = CaptureArgs::parse();
        let token = args
            .token
            .or_else(|| env::var("CAPTURE_TOKEN").ok())
            .context("a bearer token is required (--token or CAPTURE_TOKEN)")?;
        if args.interval_ms == 0 {
            bail!("--interval-ms must be greater than zero");
        }

        Ok(Self {
            camera_url: args.camera_url,
            upload_url: args.upload_url,
            token,
            interval: Duration::from_millis(args.interval_ms),
            preview_path: args.preview,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<bool> {
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
        Some(v) => bail!("{} must be true or false, got `{}`", name, v),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
