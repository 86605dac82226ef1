//! Background removal HTTP server
//!
//! Loads the segmentation model once, then serves `POST /remove` until Ctrl-C.

#[cfg(feature = "cli")]
use bgremove_server::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
