//
// main.rs
// Tag2Dcm-rs
//
// Tokio entry point that hands off execution to the CLI layer so commands are resolved asynchronously.
//

use tag2dcm::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Tokio runtime entry point: delegate all argument parsing and dispatching to the CLI module.
    cli::run().await
}
