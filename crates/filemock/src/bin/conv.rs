use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Convert a single-file mock collection to separate mock files and
/// conversely.
///
/// If the input is a mock collection (.mocks.json), it is split into
/// separate mock files under the output folder. If the input is a set of
/// separate mock files, they are gathered into one collection named
/// `<output>.mocks.json`.
#[derive(Parser, Debug)]
#[command(name = "filemock-conv", version)]
struct Args {
    /// Input mocks glob, directory or collection file
    input: String,

    /// Output file (files to collection) or folder (collection to files)
    output: String,

    /// Glob of files to ignore
    #[arg(short = 'g', long)]
    ignore: Option<String>,

    /// Directory depth for generated mock files
    #[arg(short, long, default_value = "1")]
    depth: usize,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filemock=info")),
        )
        .init();

    // Per-entry failures are already logged and skipped inside the
    // converter; a batch that produced nothing still exits cleanly.
    if let Err(err) = filemock::convert::convert(
        &args.input,
        &args.output,
        args.ignore.as_deref(),
        args.depth,
    ) {
        tracing::error!("Error during conversion: {err}");
    }
}
