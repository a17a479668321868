use clap::{Parser, ValueEnum};
use spotify_mcp::app::App;
use spotify_mcp::config::GatewayConfig;
use spotify_mcp::mcp::{http, server::McpServer};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// MCP tool gateway for the Spotify Web API and Last.fm
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Protocol transport to serve
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Listen address for the http transport (overrides MCP_BIND)
    #[arg(long)]
    bind: Option<String>,
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config = GatewayConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    let app = App::initialize(config).map_err(|err| err.to_string())?;
    let server = McpServer::new(&app);
    let served = match cli.transport {
        Transport::Stdio => server.run_stdio().await,
        Transport::Http => {
            app.logger.info(
                "serving MCP over http",
                Some(&serde_json::json!({ "bind": app.config.bind })),
            );
            http::serve(Arc::new(server), &app.config.bind).await
        }
    };
    served.map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("spotify-mcp: {}", err);
        std::process::exit(1);
    }
}
