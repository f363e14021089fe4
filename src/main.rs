//! Termgame Seller CLI
//!
//! Account queries, purchases and the webhook receiver.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};
use termgame_seller::client::{format_price, BuyRequest, SellerClient, DEFAULT_CURRENCY};
use termgame_seller::config::SellerConfig;
use termgame_seller::webhook::{
    compute_signature, serve, webhook_router, LoggingSideEffect, WebhookPipeline,
};

/// Termgame Seller CLI
#[derive(Parser, Debug)]
#[command(name = "tgseller")]
#[command(version)]
#[command(about = "Termgame Seller V2 API client and webhook receiver")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook receiver
    Serve {
        /// Host to bind to (overrides WEBHOOK_HOST)
        #[arg(short = 'H', long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides WEBHOOK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the account balance
    Balance,

    /// List products
    Products {
        /// Include inactive products
        #[arg(long)]
        all: bool,

        /// Only products whose name contains this text
        #[arg(long)]
        name: Option<String>,
    },

    /// List orders
    Orders,

    /// Show the status of one order
    OrderStatus {
        /// Order (transaction) id
        order_id: String,
    },

    /// Buy a package
    Buy(BuyArgs),

    /// Print the x-hash the vendor sends for the configured key
    Signature,
}

#[derive(ClapArgs, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["player_id", "url", "username"])))]
struct BuyArgs {
    /// Package id
    package_id: String,

    /// Player id to top up
    #[arg(long)]
    player_id: Option<String>,

    /// Zone / server id (with --player-id)
    #[arg(long, requires = "player_id")]
    zone_id: Option<String>,

    /// Redeem URL
    #[arg(long)]
    url: Option<String>,

    /// Game account username
    #[arg(long, requires = "password")]
    username: Option<String>,

    /// Game account password
    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Callback URL for status updates
    #[arg(long)]
    callback_url: Option<String>,
}

impl BuyArgs {
    fn to_request(&self) -> anyhow::Result<BuyRequest> {
        let request = match (&self.player_id, &self.url, &self.username, &self.password) {
            (Some(player_id), _, _, _) => {
                let request = BuyRequest::player_id(player_id);
                match &self.zone_id {
                    Some(zone) => request.with_zone(zone),
                    None => request,
                }
            }
            (None, Some(url), _, _) => BuyRequest::url(url),
            (None, None, Some(username), Some(password)) => {
                BuyRequest::credentials(username, password)
            }
            _ => bail!("one of --player-id, --url or --username/--password is required"),
        };

        Ok(match &self.callback_url {
            Some(callback) => request.with_callback(callback),
            None => request,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = SellerConfig::from_env().context("failed to load configuration")?;
    let client = SellerClient::from_config(&config.api)?;

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.webhook.host = host;
            }
            if let Some(port) = port {
                config.webhook.port = port;
            }

            tracing::info!(
                version = termgame_seller::VERSION,
                path = %config.webhook.path,
                "Termgame Seller webhook receiver starting"
            );

            let pipeline = WebhookPipeline::from_config(&config, Arc::new(client))
                .with_side_effect(Arc::new(LoggingSideEffect));
            let router = webhook_router(Arc::new(pipeline), &config.webhook.path);
            serve(router, config.webhook.socket_addr())
                .await
                .context("webhook server failed")?;
        }

        Command::Balance => {
            let balance = client.balance_amount().await?;
            println!("{}", format_price(balance, DEFAULT_CURRENCY));
        }

        Command::Products { all, name } => {
            let mut products = if all {
                client.products().await?
            } else {
                client.active_products().await?
            };
            if let Some(needle) = name {
                let needle = needle.to_lowercase();
                products.retain(|p| p.name.to_lowercase().contains(&needle));
            }

            for product in &products {
                println!("[{}] {}", product.id, product.name);
                for package in &product.packages {
                    println!(
                        "    [{}] {} - {}{}",
                        package.id,
                        package.name,
                        format_price(package.price, DEFAULT_CURRENCY),
                        if package.is_active { "" } else { " (inactive)" }
                    );
                }
            }
        }

        Command::Orders => {
            let orders = client.orders().await?;
            println!("{}", serde_json::to_string_pretty(&orders)?);
        }

        Command::OrderStatus { order_id } => {
            let status = client.order_status(&order_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Command::Buy(buy) => {
            let request = buy.to_request()?;
            let result = client.buy_package(&buy.package_id, &request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Signature => {
            println!("{}", compute_signature(config.api.api_key()));
        }
    }

    Ok(())
}
