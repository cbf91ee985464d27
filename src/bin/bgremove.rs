//! Background removal service and batch CLI
//!
//! Runs the HTTP job API (`bgremove serve`) or processes a directory of images
//! in parallel (`bgremove batch`).

#[cfg(feature = "cli")]
use bgremove_service::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
