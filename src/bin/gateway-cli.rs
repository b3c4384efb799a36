//! Operator CLI for a running session gateway.

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the Session Gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    /// Session cookie to send, as name=token (e.g. "connect.sid=abc").
    #[arg(short, long)]
    cookie: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and the configured upstream
    Health,
    /// Show the current session's identity and expiry
    SessionInfo,
    /// Destroy the current session
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(cookie) = &cli.cookie {
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
    }

    let path = match cli.command {
        Commands::Health => "/gateway/health",
        Commands::SessionInfo => "/gateway/session-info",
        Commands::Logout => "/gateway/logout",
    };

    let res = client
        .get(format!("{}{}", cli.url, path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
