use clap::{Parser, Subcommand};
use pgtester_service::{
    client::HttpApiClient,
    dashboard::Dashboard,
    endpoints::{ENDPOINTS, EndpointId},
    models::ApiResponse,
    render::render_text,
};
use std::error::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "pgtester")]
#[command(about = "Trigger PostgreSQL connection probes and show what they return")]
struct Cli {
    /// Base URL of the probe function; `?path=<endpoint>` is appended
    #[arg(
        long,
        env = "PGTESTER_API_URL",
        default_value = "http://localhost:3000/api/v1/probe"
    )]
    api_url: Url,

    /// Print stored responses as JSON instead of formatted blocks
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a single endpoint
    Test {
        /// One of: conn, cursor, info
        endpoint: EndpointId,
    },
    /// Trigger every endpoint concurrently
    All,
    /// List the endpoints the dashboard knows about
    Endpoints,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let dashboard = Dashboard::new(HttpApiClient::new(cli.api_url));

    match cli.command {
        Commands::Test { endpoint } => {
            dashboard.trigger(endpoint).await;
            print_responses(&dashboard, cli.json)?;
        }
        Commands::All => {
            tokio::join!(
                dashboard.trigger(EndpointId::Conn),
                dashboard.trigger(EndpointId::Cursor),
                dashboard.trigger(EndpointId::Info),
            );
            print_responses(&dashboard, cli.json)?;
        }
        Commands::Endpoints => {
            for descriptor in &ENDPOINTS {
                println!(
                    "{:<8}{:<20}icon: {}",
                    descriptor.id.as_str(),
                    descriptor.label,
                    descriptor.icon
                );
            }
        }
    }

    Ok(())
}

/// Print stored responses in endpoint order, whatever order they settled in.
fn print_responses(
    dashboard: &Dashboard<HttpApiClient>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let responses: Vec<(EndpointId, ApiResponse)> = EndpointId::ALL
        .into_iter()
        .filter_map(|id| dashboard.response(id).map(|response| (id, response)))
        .collect();

    if json {
        let mut map = serde_json::Map::new();
        for (id, response) in responses {
            map.insert(id.to_string(), serde_json::to_value(response)?);
        }
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (id, response) in responses {
            println!("{}", render_text(id, &response));
        }
    }

    Ok(())
}
