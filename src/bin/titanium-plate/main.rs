//! titanium-plate - render the disc-with-holes plate to `$PREFIX/ppm/TitaniumPlate.ppm`.
//!
//! Takes no arguments. Logging is controlled with `RUST_LOG` (default `info`).

use std::process::ExitCode;

use disc_trace::config::{RenderSettings, RunConfig};
use disc_trace::engine::cpu::CpuEngine;
use disc_trace::engine::ProgramSet;
use disc_trace::render::render_to_file;
use disc_trace::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run() -> Result<()> {
    // Environment is checked before any engine resource exists.
    let config = RunConfig::from_env()?;
    let settings = RenderSettings::default();
    let programs = ProgramSet::for_run(&config);

    let engine = CpuEngine::new();
    let path = render_to_file(&engine, &config, &programs, &settings)?;
    tracing::info!("done: {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    tracing::info!("titanium-plate {}", env!("CARGO_PKG_VERSION"));

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("titanium-plate: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
