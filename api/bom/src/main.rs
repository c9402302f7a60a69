extern crate pretty_env_logger;
#[macro_use] extern crate log;

use anyhow::anyhow;
use bom::{radar_time_string, BomRadarAPI, Transparency, DEFAULT_BASE_URL};
use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bom", about = "Fetch single Bureau of Meteorology radar images")]
struct Cli {
    /// Image host to fetch from
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a static transparency (legend, background, topography, range, locations)
    Transparency { station: String, layer: String },
    /// Fetch one loop image; time is UTC YYYYMMDDHHmm
    Frame { station: String, time: String },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let api = BomRadarAPI::with_base_url(&cli.base_url)?;

    match cli.command {
        Command::Transparency { station, layer } => {
            let transparency = Transparency::from_name(&layer)
                .ok_or_else(|| anyhow!("unknown transparency '{}'", layer))?;

            let url = api.urls().transparency(&station, transparency);
            let data = api.fetch_image_bytes(&url).await?;

            let filename = format!("{}.{}.png", station, transparency.name());
            std::fs::write(&filename, &data)?;
            info!("Saved {} ({} bytes)", filename, data.len());
        }

        Command::Frame { station, time } => {
            let time = NaiveDateTime::parse_from_str(&time, "%Y%m%d%H%M")?.and_utc();
            let radar_time = radar_time_string(&time);

            let url = api.urls().loop_frame(&station, &radar_time);
            let data = api.fetch_image_bytes(&url).await?;

            let filename = format!("{}.T.{}.png", station, radar_time);
            std::fs::write(&filename, &data)?;
            info!(
                "Saved {} ({} bytes, {} minutes old)",
                filename,
                data.len(),
                (Utc::now() - time).num_minutes()
            );
        }
    }

    Ok(())
}
