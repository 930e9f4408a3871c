//! `triage` binary entry point.

use anyhow::Result;
use triage_cli::{build_command, execute, CliArgs};
use triage_core::observability::init_logging;

fn main() -> Result<()> {
    // Secrets may come from a local .env file
    let dotenv = dotenvy::dotenv();

    let matches = build_command().get_matches();
    let cli = CliArgs::from_matches(&matches)?;
    init_logging(cli.log_format);

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(execute(cli))
}
