use clap::{Parser, Subcommand};
use serde_json::json;

use server_timing::trace::{parse_header, TimingEntry};

#[derive(Parser)]
#[command(name = "timing-cli")]
#[command(about = "Inspect Server-Timing values", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a URL and print its Server-Timing entries
    Fetch {
        #[arg(default_value = "http://localhost:8080/")]
        url: String,

        /// HTTP method to use
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Parse a Server-Timing value given on the command line
    Parse { value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { url, method, data } => {
            let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())?;
            let mut request = reqwest::Client::new().request(method, &url);
            if let Some(data) = data {
                request = request.body(data);
            }
            let res = request.send().await?;

            let status = res.status();
            match res.headers().get("server-timing") {
                Some(value) => {
                    let entries = parse_header(value.to_str()?);
                    print_entries(Some(status.as_u16()), &entries)?;
                }
                None => {
                    eprintln!("No Server-Timing header (status {})", status);
                }
            }
        }
        Commands::Parse { value } => {
            print_entries(None, &parse_header(&value))?;
        }
    }

    Ok(())
}

fn print_entries(
    status: Option<u16>,
    entries: &[TimingEntry],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut report = json!({ "entries": entries });
    if let Some(status) = status {
        report["status"] = json!(status);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
