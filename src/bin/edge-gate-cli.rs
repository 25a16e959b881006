use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::PathBuf;
use url::Url;

#[derive(Parser)]
#[command(name = "edge-gate-cli")]
#[command(about = "Management CLI for the edge gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "EDGE_GATE_URL", default_value = "http://localhost:8080")]
    url: Url,

    /// Bearer secret for protected endpoints.
    #[arg(short, long, env = "EDGE_GATE_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness check
    Health,
    /// Cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Probe the rate limiter for this client
    RateLimit,
    /// Swiss canton, tax rate and language for a postal code
    Canton { postal_code: String },
    /// Geolocation the edge reports for this client
    Geo,
    /// Upload an image
    Upload {
        file: PathBuf,
        /// Override the MIME type guessed from the extension
        #[arg(long)]
        content_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Get { key: String },
    /// Store a JSON value (plain text is stored as a string)
    Put {
        key: String,
        value: String,
        #[arg(long)]
        ttl: Option<u64>,
    },
    Delete { key: String },
    /// Purge by prefix or glob (`menu:*`)
    Purge { pattern: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let res = match cli.command {
        Commands::Health => client.get(endpoint(&cli.url, &["health"])?).send().await?,
        Commands::Cache { action } => match action {
            CacheAction::Get { key } => {
                client
                    .get(endpoint(&cli.url, &["api", "v1", "cache", &key])?)
                    .headers(headers)
                    .send()
                    .await?
            }
            CacheAction::Put { key, value, ttl } => {
                let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
                client
                    .put(endpoint(&cli.url, &["api", "v1", "cache", &key])?)
                    .headers(headers)
                    .json(&json!({ "value": value, "ttl": ttl }))
                    .send()
                    .await?
            }
            CacheAction::Delete { key } => {
                client
                    .delete(endpoint(&cli.url, &["api", "v1", "cache", &key])?)
                    .headers(headers)
                    .send()
                    .await?
            }
            CacheAction::Purge { pattern } => {
                client
                    .post(endpoint(&cli.url, &["api", "v1", "cache", "purge"])?)
                    .headers(headers)
                    .json(&json!({ "pattern": pattern }))
                    .send()
                    .await?
            }
        },
        Commands::RateLimit => {
            let res = client
                .get(endpoint(&cli.url, &["api", "v1", "rate-limit-test"])?)
                .send()
                .await?;
            for name in ["x-ratelimit-limit", "x-ratelimit-remaining", "x-ratelimit-reset", "retry-after"] {
                if let Some(value) = res.headers().get(name) {
                    println!("{name}: {}", value.to_str().unwrap_or("?"));
                }
            }
            res
        }
        Commands::Canton { postal_code } => {
            client
                .get(endpoint(&cli.url, &["api", "v1", "swiss", "canton"])?)
                .query(&[("postalCode", postal_code)])
                .send()
                .await?
        }
        Commands::Geo => client.get(endpoint(&cli.url, &["api", "v1", "geo"])?).send().await?,
        Commands::Upload { file, content_type } => {
            let bytes = tokio::fs::read(&file).await?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let mime = content_type.unwrap_or_else(|| guess_mime(&file_name).to_string());
            let part = Part::bytes(bytes).file_name(file_name).mime_str(&mime)?;
            client
                .post(endpoint(&cli.url, &["api", "v1", "images", "upload"])?)
                .headers(headers)
                .multipart(Form::new().part("file", part))
                .send()
                .await?
        }
    };

    print_response(res).await
}

/// Append percent-encoded path segments to the base URL.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| "base URL cannot carry a path")?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{pretty}");
    } else {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("{pretty}");
        std::process::exit(1);
    }
    Ok(())
}
