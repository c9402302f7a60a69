mod app;

extern crate pretty_env_logger;
#[macro_use] extern crate log;

use clap::Parser;

use app::config::{Cli, Command, RadarConfig};

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = RadarConfig::from_cli(&cli)?;

    info!(
        "Starting radar loop for {} ({} images, {} ms per frame)...",
        config.station, config.loop_image_count, config.frame_duration_ms
    );

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        match &cli.command {
            Command::Play { output } => app::radar::run_playback(&config, output).await,
            Command::Export { output } => app::radar::run_export(&config, output).await,
            Command::Frame { index, output } => app::radar::run_single_frame(&config, *index, output).await,
        }
    });

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
