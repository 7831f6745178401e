//! Atelier Engine Demo Viewer
//!
//! Opens a window, builds a small demo scene, and drives the frame loop:
//! an orbiting camera fills the per-frame constants while the back buffer
//! is cleared to a slowly shifting color.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p atelier-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--no-vsync`: Present immediately instead of waiting for vblank
//! - `--validation`: Force-enable Vulkan validation layers
//! - `--software`: Accept a software rasterizer adapter
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use atelier_app::{run_app, AppConfig};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let args: Vec<String> = std::env::args().collect();
    let vsync = !args.iter().any(|a| a == "--no-vsync");
    let validation = args.iter().any(|a| a == "--validation") || cfg!(debug_assertions);
    let software = args.iter().any(|a| a == "--software");

    run_app::<Viewer>(
        AppConfig::new("Atelier Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_vsync(vsync)
            .with_validation(validation)
            .with_software_adapter(software),
    )
}

fn print_help() {
    eprintln!(
        "Atelier Engine Demo Viewer

USAGE:
    cargo run -p atelier-viewer -- [OPTIONS]

OPTIONS:
    --no-vsync      Present immediately instead of waiting for vblank
    --validation    Force-enable Vulkan validation layers
    --software      Accept a software rasterizer adapter
    -h, --help      Print this help message

ENVIRONMENT:
    RUST_LOG        Log level filter (info, debug, trace)"
    );
}
