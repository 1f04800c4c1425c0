use clap::Parser;
use filemock::config::ServerOptions;
use filemock::server::MockServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// File-based mock server with live editing, recording and proxying.
#[derive(Parser, Debug)]
#[command(name = "filemock", version)]
struct Args {
    /// Directory to serve mocks from
    #[arg(default_value = ".")]
    mocks_folder: PathBuf,

    /// Server port
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Server host
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Mock set to use
    #[arg(short, long)]
    set: Option<String>,

    /// Glob for mocks served on 404 errors
    #[arg(short, long, default_value = "404.*")]
    not_found: String,

    /// Glob of files to ignore
    #[arg(short = 'g', long)]
    ignore: Option<String>,

    /// Enable request logs
    #[arg(short, long)]
    logs: bool,

    /// Proxy requests to this host when no mock matches
    #[arg(long)]
    proxy: Option<String>,

    /// Proxy and record requests when no mock matches
    #[arg(short, long, value_name = "HOST")]
    record: Option<String>,

    /// Directory depth for recorded mocks
    #[arg(short, long, default_value = "1")]
    depth: usize,

    /// Save response headers when recording
    #[arg(short = 'a', long)]
    save_headers: bool,

    /// Constrain recorded mocks by request query parameters
    #[arg(short = 'q', long)]
    save_query_params: bool,

    /// Record into this mock collection instead of standalone files
    #[arg(short, long)]
    collection: Option<String>,
}

impl From<Args> for ServerOptions {
    fn from(args: Args) -> Self {
        ServerOptions {
            base_path: args.mocks_folder,
            port: args.port,
            host: args.host,
            set: args.set,
            not_found: args.not_found,
            ignore: args.ignore.into_iter().collect(),
            logs: args.logs,
            record: args.record.is_some(),
            proxy: args.record.or(args.proxy),
            depth: args.depth,
            save_headers: args.save_headers,
            save_query_params: args.save_query_params,
            collection: args.collection,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let default_filter = if args.logs { "filemock=debug" } else { "filemock=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    MockServer::new(ServerOptions::from(args)).run().await
}
