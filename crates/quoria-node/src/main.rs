use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use quoria_node::cli::{Cli, Commands};
use quoria_node::{generate_sample_config, Node, NodeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init { output } => {
            init_config(output)?;
        }
        Commands::Keygen { output } => {
            generate_keypair(output)?;
        }
        Commands::Status { endpoint } => {
            show_status(&endpoint).await?;
        }
        Commands::Tx {
            endpoint,
            from,
            to,
            amount,
            uid,
        } => {
            submit_transfer(&endpoint, from, to, amount, uid).await?;
        }
    }

    Ok(())
}

/// Run a Quoria node
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("loading configuration from {:?}", config_path);

    if !config_path.exists() {
        error!(
            "configuration file not found: {:?}. Run 'quoria init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("configuration file not found"));
    }
    let config = NodeConfig::load(&config_path)?;

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: PathBuf) -> Result<()> {
    let config = generate_sample_config();
    config.save(&output)?;

    println!("Configuration file created: {}", output.display());
    println!("Edit the file to set the global peer list for your run.");
    println!("\nTo start the node, run:");
    println!("  quoria run --config {}", output.display());

    Ok(())
}

/// Generate a new keypair
fn generate_keypair(output: Option<PathBuf>) -> Result<()> {
    let keypair = quoria_core::KeyPair::generate();

    println!("Generated new keypair:");
    println!("  Public key:  {}", keypair.public.to_hex());
    println!("  Secret key:  {}", keypair.secret.to_hex());

    if let Some(path) = output {
        std::fs::write(&path, keypair.secret.to_hex())?;
        info!("secret key saved to {:?}", path);
    }

    println!("\nWARNING: keep your secret key safe! Do not share it with anyone.");

    Ok(())
}

/// Show node status
async fn show_status(endpoint: &str) -> Result<()> {
    let url = format!("{}/status", endpoint.trim_end_matches('/'));

    let response = reqwest::get(&url).await?;
    if response.status().is_success() {
        let status: serde_json::Value = response.json().await?;
        println!("Node status:");
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        error!("failed to get status: {}", response.status());
    }

    Ok(())
}

/// Submit a transfer transaction
async fn submit_transfer(
    endpoint: &str,
    from: String,
    to: String,
    amount: i64,
    uid: Option<String>,
) -> Result<()> {
    let uid = uid.unwrap_or_else(|| {
        let nonce: u64 = rand::thread_rng().gen();
        format!("{from}->{to}:{amount}:{nonce:016x}")
    });

    let transaction = quoria_core::Transaction::Transfer(quoria_core::TransferTransaction::new(
        from, to, amount, uid,
    ));

    let url = format!("{}/tx", endpoint.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .json(&serde_json::json!({ "transaction": transaction }))
        .send()
        .await?;

    if response.status().is_success() {
        let result: serde_json::Value = response.json().await?;
        println!("Transaction submitted:");
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        error!("failed to submit transaction: {}", response.status());
    }

    Ok(())
}
