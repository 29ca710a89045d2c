//! rembg-process CLI tool
//!
//! Command-line driver removing image backgrounds through the rembg CLI,
//! for local files and remote URLs.

#[cfg(feature = "cli")]
use rembg_process::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
