//! phpIPAM command-line client
//!
//! Thin front end over `phpipam-client`: every subcommand maps to one
//! controller call and prints the server's answer as-is.
//!
//! Connection settings come from flags or the `PHPIPAM_*` environment
//! variables (`PHPIPAM_HOST`, `PHPIPAM_APIAPP`, `PHPIPAM_USER`,
//! `PHPIPAM_PASSWORD`, `PHPIPAM_TOKEN`).

mod cli;
mod logging;
mod output;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use phpipam_client::{Method, PhpIpamClient};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.client_config();
    info!("phpIPAM API: {}", config.api_url());

    let client = PhpIpamClient::new(config).context("Failed to create phpIPAM client")?;

    let (method, controller, path, query, body) = match cli.command {
        Commands::Login => {
            let token = client.login().await.context("Login failed")?;
            println!("{}", token.value());
            match token.expires() {
                Some(expires) => eprintln!("expires {expires}"),
                None => eprintln!("expiry unknown"),
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Catalog { controller, keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let catalog = client
                .controller(&controller)
                .catalog(&keys)
                .await
                .with_context(|| format!("Failed to read {controller}"))?;

            for (key, item) in &catalog {
                println!("{}\t{}", key.parts().join("\t"), item);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Get(args) => (Method::GET, args.controller, args.path, args.query, None),
        Commands::Delete(args) => (Method::DELETE, args.controller, args.path, args.query, None),
        Commands::Post(args) => (Method::POST, args.controller, args.path, Vec::new(), Some(args.data)),
        Commands::Put(args) => (Method::PUT, args.controller, args.path, Vec::new(), Some(args.data)),
        Commands::Patch(args) => (Method::PATCH, args.controller, args.path, Vec::new(), Some(args.data)),
    };

    let mut request = client.controller(&controller).request(method.clone(), &path).query(query);
    if let Some(body) = &body {
        request = request.json(body);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("{method} {controller}/{path} failed"))?;

    Ok(output::print_response(&response))
}
