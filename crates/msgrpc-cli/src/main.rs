//! # msgrpc CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Start the demo server on localhost:8080
//! msgrpc serve
//!
//! # Start it on all interfaces, port 9000
//! msgrpc serve --host 0.0.0.0 -p 9000
//!
//! # Call a method (arguments are JSON; bare words are strings)
//! msgrpc call add 2 3
//! msgrpc call greet World
//! msgrpc call --port 9000 --timeout-ms 500 heavy_computation 10
//!
//! # Send a notification
//! msgrpc notify foo
//! ```

use anyhow::Result;
use argh::FromArgs;
use msgrpc_cli::{demo, json};
use msgrpc_client::Client;
use msgrpc_server::Server;
use std::time::Duration;

#[derive(FromArgs)]
/// msgrpc - MessagePack-RPC server and client
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
    Notify(NotifyArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// start a server with the demo functions bound
struct ServeArgs {
    /// host to listen on
    #[argh(option, default = "\"localhost\".into()")]
    host: String,

    /// port to listen on
    #[argh(option, short = 'p', default = "8080")]
    port: u16,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a method and print its result as JSON
struct CallArgs {
    /// server host
    #[argh(option, default = "\"localhost\".into()")]
    host: String,

    /// server port
    #[argh(option, short = 'p', default = "8080")]
    port: u16,

    /// give up if no response arrives within this many milliseconds
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// method name
    #[argh(positional)]
    method: String,

    /// positional arguments, each parsed as JSON
    #[argh(positional)]
    args: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "notify")]
/// send a notification (no response is expected)
struct NotifyArgs {
    /// server host
    #[argh(option, default = "\"localhost\".into()")]
    host: String,

    /// server port
    #[argh(option, short = 'p', default = "8080")]
    port: u16,

    /// method name
    #[argh(positional)]
    method: String,

    /// positional arguments, each parsed as JSON
    #[argh(positional)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call/notify keep stdout clean for piping into other tools
    if matches!(cli.command, Commands::Serve(_)) {
        // Set default log level to INFO, but allow RUST_LOG env var to override
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
        Commands::Notify(args) => run_notify(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let server = Server::with_host(&args.host, args.port).await?;
    demo::bind_demo_methods(&server);

    tracing::info!("Available methods: {}", server.method_names().join(", "));
    tracing::info!("Press Ctrl+C to stop the server");

    let handle = server.async_run();
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down server...");
    handle.stop_and_join().await?;
    Ok(())
}

async fn run_call(args: CallArgs) -> Result<()> {
    let client = Client::connect(&args.host, args.port).await?;
    let params = json::parse_args(&args.args);

    let result = match args.timeout_ms {
        Some(ms) => {
            client
                .call_with_timeout(&args.method, params, Duration::from_millis(ms))
                .await?
        }
        None => client.call(&args.method, params).await?,
    };
    client.close().await;

    let value = result.into_value()?;
    println!("{}", serde_json::to_string(&json::value_to_json(&value))?);
    Ok(())
}

async fn run_notify(args: NotifyArgs) -> Result<()> {
    let client = Client::connect(&args.host, args.port).await?;
    client.notify(&args.method, json::parse_args(&args.args)).await?;
    client.close().await;
    Ok(())
}
