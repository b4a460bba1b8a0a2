//! CLI argument definitions

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ucresign_core::config::{DEFAULT_DATA_DIR, DEFAULT_ORIGIN_DOWNLOAD_URL};
use ucresign_core::{AppConfig, PatchConfig, SignerConfig, SourceConfig, SourceLocation};
use ucresign_manifest::Envelope;

/// ucresign - re-signing mirror for Jenkins update-center documents
#[derive(Parser)]
#[command(name = "ucresign")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true, env = "DEBUG")]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the re-signed update center and proxy everything else
    Serve(ServeArgs),

    /// Run one refresh cycle and exit
    Refresh {
        #[command(flatten)]
        app: AppArgs,
    },

    /// Verify the signature of an update-center document
    Verify {
        /// Document to check
        file: PathBuf,

        /// Wrapper around the JSON payload (jsonp, html, json)
        #[arg(long, default_value = "jsonp")]
        envelope: Envelope,

        /// Verify against this PEM certificate instead of the embedded one
        #[arg(long)]
        certificate: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub app: AppArgs,

    /// Address to listen on; empty means all interfaces
    #[arg(long, env = "SERVER_ADDR", default_value = "")]
    pub server_addr: String,

    /// Port to listen on
    #[arg(long, env = "LISTEN_PORT", default_value_t = 8282)]
    pub listen_port: u16,
}

#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Local path of the upstream update-center.json
    #[arg(
        long,
        env = "UPDATE_JSON_PATH",
        conflicts_with = "update_json_url",
        required_unless_present = "update_json_url"
    )]
    pub update_json_path: Option<PathBuf>,

    /// URL of the upstream update-center.json
    #[arg(long, env = "UPDATE_JSON_URL")]
    pub update_json_url: Option<String>,

    /// Wrapper around the upstream payload (jsonp, html, json)
    #[arg(long, env = "UPDATE_JSON_ENVELOPE", default_value = "jsonp")]
    pub update_json_envelope: Envelope,

    /// Bound on fetching and decoding the upstream document
    #[arg(long, env = "UPDATE_JSON_DOWNLOAD_TIMEOUT", default_value = "120s", value_parser = parse_duration)]
    pub download_timeout: Duration,

    /// How long the upstream document is cached; 0 disables the cache
    #[arg(long, env = "UPDATE_JSON_CACHE_TTL", default_value = "30m", value_parser = parse_duration)]
    pub cache_ttl: Duration,

    /// Download URL prefix to replace
    #[arg(long, env = "ORIGIN_DOWNLOAD_URL", default_value = DEFAULT_ORIGIN_DOWNLOAD_URL)]
    pub origin_download_url: String,

    /// Download URL prefix of the mirror
    #[arg(long, env = "NEW_DOWNLOAD_URL")]
    pub new_download_url: String,

    /// PEM bundle the signing certificate should chain to
    #[arg(long, env = "SIGN_CA_PATH")]
    pub sign_ca_path: Option<PathBuf>,

    /// PEM signing certificate
    #[arg(long, env = "SIGN_CERTIFICATE_PATH")]
    pub sign_certificate_path: PathBuf,

    /// PEM RSA private key
    #[arg(long, env = "SIGN_KEY_PATH")]
    pub sign_key_path: PathBuf,

    /// Password of an encrypted private key
    #[arg(long, env = "SIGN_KEY_PASSWORD", hide_env_values = true)]
    pub sign_key_password: Option<String>,

    /// Directory for published artifacts and temporary files
    #[arg(long, env = "DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
}

impl AppArgs {
    pub fn to_config(&self) -> AppConfig {
        let location = match (&self.update_json_path, &self.update_json_url) {
            (Some(path), _) => SourceLocation::File(path.clone()),
            (None, Some(url)) => SourceLocation::Url(url.clone()),
            (None, None) => SourceLocation::Url(String::new()),
        };

        let mut source = SourceConfig::new(location);
        source.envelope = self.update_json_envelope;
        source.fetch_timeout = self.download_timeout;
        source.cache_ttl = self.cache_ttl;

        AppConfig {
            data_dir: self.data_dir.clone(),
            source,
            signer: SignerConfig {
                ca_path: self.sign_ca_path.clone(),
                certificate_path: self.sign_certificate_path.clone(),
                key_path: self.sign_key_path.clone(),
                key_password: self.sign_key_password.clone(),
            },
            patch: PatchConfig::new(&self.origin_download_url, &self.new_download_url),
        }
    }
}

fn parse_duration(text: &str) -> Result<Duration, humantime::DurationError> {
    match text.trim() {
        "0" => Ok(Duration::ZERO),
        other => humantime::parse_duration(other),
    }
}
