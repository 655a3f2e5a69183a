//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use phpipam_client::ClientConfig;
use std::time::Duration;

/// phpIPAM API from the command line
#[derive(Parser, Debug)]
#[command(name = "phpipam")]
#[command(about = "phpIPAM REST API client")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// phpIPAM server URL, e.g. http://phpipam:8080
    #[arg(long, env = "PHPIPAM_HOST")]
    pub host: String,

    /// API application identifier
    #[arg(long, env = "PHPIPAM_APIAPP")]
    pub app: String,

    /// Login user
    #[arg(long, env = "PHPIPAM_USER")]
    pub user: Option<String>,

    /// Login password
    #[arg(long, env = "PHPIPAM_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Pre-shared token, skips the login
    #[arg(long, env = "PHPIPAM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Do not verify TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and print the issued token
    Login,
    /// GET a controller path
    Get(ReadArgs),
    /// DELETE a controller path
    Delete(ReadArgs),
    /// POST JSON to a controller path
    Post(WriteArgs),
    /// PUT JSON to a controller path
    Put(WriteArgs),
    /// PATCH JSON to a controller path
    Patch(WriteArgs),
    /// List a controller's items indexed by key fields
    Catalog {
        /// Controller name, e.g. devices or tools/locations
        #[arg(value_name = "CONTROLLER")]
        controller: String,

        /// Key field(s)
        #[arg(short, long = "key", value_name = "FIELD", required = true, num_args = 1..)]
        keys: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Controller name, e.g. devices or tools/locations
    #[arg(value_name = "CONTROLLER")]
    pub controller: String,

    /// Path below the controller, e.g. 12 or search/10.0.0.1
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// Query parameter (repeatable)
    #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Controller name, e.g. devices or tools/locations
    #[arg(value_name = "CONTROLLER")]
    pub controller: String,

    /// Path below the controller
    #[arg(value_name = "PATH", default_value = "")]
    pub path: String,

    /// JSON request body
    #[arg(short, long, value_name = "JSON", value_parser = parse_json)]
    pub data: serde_json::Value,
}

impl Cli {
    /// Client configuration from the parsed arguments
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.host, &self.app)
            .with_verify_tls(!self.insecure)
            .with_timeout(Duration::from_secs(self.timeout));

        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            config = config.with_credentials(user, password);
        }
        if let Some(token) = &self.token {
            config = config.with_token(token, None);
        }
        config
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}
