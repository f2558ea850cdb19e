use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fpp-cli")]
#[command(about = "Operator CLI for the FPP monitor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check monitor status
    Status,
    /// Show circuit breaker statistics
    Breaker,
    /// Force the circuit breaker closed
    Reset,
    /// Run one poll now
    Poll,
    /// Show the cached now-playing view
    NowPlaying,
    /// Show recent poll attempts
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", base)),
        Commands::Breaker => client.get(format!("{}/admin/circuit-breaker", base)),
        Commands::Reset => client.post(format!("{}/admin/circuit-breaker/reset", base)),
        Commands::Poll => client.post(format!("{}/admin/poll", base)),
        Commands::NowPlaying => client.get(format!("{}/api/fpp/now-playing", base)),
        Commands::History { limit } => client
            .get(format!("{}/api/fpp/history", base))
            .query(&[("limit", limit)]),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: monitor returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
