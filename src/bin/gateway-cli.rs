use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the rategate admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show limiter statistics
    Stats,
    /// List currently blocked IPs
    Blocked,
    /// Block an IP address
    Block {
        ip: String,
        #[arg(short, long)]
        reason: Option<String>,
        #[arg(short, long)]
        permanent: bool,
    },
    /// Unblock an IP address
    Unblock { ip: String },
    /// Check the limiter state of a single IP
    Check { ip: String },
    /// Tail the recent request log
    Logs {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert("X-Admin-Key", HeaderValue::from_str(&cli.key)?);

    let mut request = match &cli.command {
        Commands::Stats => client.get(format!("{}/admin/stats", cli.url)),
        Commands::Blocked => client.get(format!("{}/admin/blocked", cli.url)),
        Commands::Block {
            ip,
            reason,
            permanent,
        } => {
            let mut req = client
                .get(format!("{}/admin/block", cli.url))
                .query(&[("ip", ip.as_str())]);
            if let Some(reason) = reason {
                req = req.query(&[("reason", reason.as_str())]);
            }
            if *permanent {
                req = req.query(&[("permanent", "true")]);
            }
            req
        }
        Commands::Unblock { ip } => client
            .get(format!("{}/admin/unblock", cli.url))
            .query(&[("ip", ip.as_str())]),
        Commands::Check { ip } => client
            .get(format!("{}/admin/check", cli.url))
            .query(&[("ip", ip.as_str())]),
        Commands::Logs { limit } => client
            .get(format!("{}/admin/logs", cli.url))
            .query(&[("limit", limit.to_string())]),
    };
    request = request.headers(headers);

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
