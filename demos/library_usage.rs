//! Example removing backgrounds from a local image and a remote URL
//!
//! Needs `rembg` and `curl` on `PATH` and a `my-image.jpg` next to the
//! working directory.

use anyhow::Result;
use rembg_process::{
    init_cli_tracing, remove_background, remove_background_from_url, RemovalOptions,
    TracingFormat,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_cli_tracing(1, TracingFormat::Console)?;

    println!("🚀 rembg-process library example");

    // A very short timeout (e.g. 1ms) shows the timeout handling; real images
    // usually want something closer to 30 seconds.
    let options = RemovalOptions::builder().timeout_ms(10 * 1000).build()?;

    println!("\n🖼️ Removing background from a local file...");
    match remove_background("my-image.jpg", "my-image-no-bg.png", &options).await {
        Ok(output) => println!("✅ Output saved to: {}", output.display()),
        Err(e) => eprintln!("❌ Background removal failed: {}", e),
    }

    println!("\n🌐 Removing background from a remote URL...");
    let image_url = "https://upload.wikimedia.org/wikipedia/commons/4/4d/Cat_November_2010-1a.jpg";
    match remove_background_from_url(image_url, "remote-image-no-bg.png", &options).await {
        Ok(output) => println!("✅ Output saved to: {}", output.display()),
        Err(e) => eprintln!("❌ Background removal from URL failed: {}", e),
    }

    Ok(())
}
