use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bom::BomRadarAPI;
use chrono::Utc;
use image::RgbaImage;
use tokio::time::MissedTickBehavior;

use crate::app::assembler::{assemble_loop, RadarLoop};
use crate::app::compositor::{draw_frame, CanvasSize, LabelFont, RgbaSurface, Surface, BACKGROUND};
use crate::app::config::RadarConfig;
use crate::app::export::export_gif;
use crate::app::loader::{BomImageLoader, ImageLoader};
use crate::app::playback::PlaybackDriver;
use crate::app::utils::write_png_atomic;

pub fn bom_loader(config: &RadarConfig) -> Result<BomImageLoader> {
    let api = BomRadarAPI::with_base_url(&config.base_url)?;
    Ok(BomImageLoader::new(api))
}

fn label_font(config: &RadarConfig) -> Option<LabelFont> {
    if config.draw_time_label {
        LabelFont::discover(config.font_path.as_deref())
    } else {
        None
    }
}

async fn load_loop<L: ImageLoader>(loader: &L, config: &RadarConfig) -> Result<RadarLoop> {
    let radar_loop = assemble_loop(loader, &config.station, config.loop_image_count, Utc::now())
        .await
        .with_context(|| format!("loading radar loop for {}", config.station))?;
    Ok(radar_loop)
}

/// Composite a single frame onto a fresh canvas
pub fn render_frame(
    radar_loop: &RadarLoop,
    index: usize,
    size: CanvasSize,
    font: Option<LabelFont>,
    draw_label: bool,
) -> RgbaImage {
    let mut surface = RgbaSurface::new(size, font);
    surface.fill(BACKGROUND);
    draw_frame(&mut surface, &radar_loop.layers, &radar_loop.frames, index, draw_label);
    surface.image().clone()
}

/// Hand a freshly loaded loop to the driver; every tick redraws the canvas
/// and rewrites `output`
fn start_loop(
    driver: &mut PlaybackDriver,
    radar_loop: RadarLoop,
    size: CanvasSize,
    font: Option<LabelFont>,
    draw_label: bool,
    output: PathBuf,
) {
    let frame_count = radar_loop.frames.len();
    let mut surface = RgbaSurface::new(size, font);
    surface.fill(BACKGROUND);

    driver.start(frame_count, move |index| {
        draw_frame(&mut surface, &radar_loop.layers, &radar_loop.frames, index, draw_label);
        if let Err(e) = write_png_atomic(&output, surface.image()) {
            error!("failed to write frame {}: {:#}", index, e);
        }
    });
}

/// Play the loop into `output` until `shutdown` completes, reloading it on
/// the configured interval. A reload that fails keeps the previous loop.
pub async fn run_playback_with<L, S>(
    loader: &L,
    config: &RadarConfig,
    output: &Path,
    shutdown: S,
) -> Result<()>
where
    L: ImageLoader,
    S: Future<Output = ()>,
{
    let size = config.canvas_size();
    let font = label_font(config);

    // Whatever happens while loading, the output shows a blank canvas
    let mut blank = RgbaSurface::new(size, None);
    blank.fill(BACKGROUND);
    write_png_atomic(output, blank.image())?;

    let radar_loop = load_loop(loader, config).await?;
    let mut driver = PlaybackDriver::new(config.frame_duration());
    start_loop(&mut driver, radar_loop, size, font.clone(), config.draw_time_label, output.to_path_buf());
    info!("playing {} into {}", config.station, output.display());

    tokio::pin!(shutdown);
    match config.reload_interval() {
        Some(every) => {
            let mut reload = tokio::time::interval(every);
            reload.set_missed_tick_behavior(MissedTickBehavior::Delay);
            reload.tick().await;
            loop {
                tokio::select! {
                    _ = reload.tick() => {}
                    _ = &mut shutdown => break,
                }

                info!("reloading radar loop for {}", config.station);
                // shutdown wins over a reload that never completes
                let reloaded = tokio::select! {
                    result = load_loop(loader, config) => result,
                    _ = &mut shutdown => break,
                };
                match reloaded {
                    Ok(radar_loop) => start_loop(
                        &mut driver,
                        radar_loop,
                        size,
                        font.clone(),
                        config.draw_time_label,
                        output.to_path_buf(),
                    ),
                    Err(e) => error!("reload failed, keeping previous loop: {:#}", e),
                }
            }
        }
        None => shutdown.await,
    }

    driver.stop();
    info!("playback finished");
    Ok(())
}

/// Play from the radar image host until Ctrl-C
pub async fn run_playback(config: &RadarConfig, output: &Path) -> Result<()> {
    let loader = bom_loader(config)?;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_playback_with(&loader, config, output, shutdown).await
}

pub async fn run_export(config: &RadarConfig, output: &Path) -> Result<()> {
    let loader = bom_loader(config)?;
    let radar_loop = load_loop(&loader, config).await?;
    export_gif(
        output,
        &radar_loop,
        config.canvas_size(),
        label_font(config),
        config.draw_time_label,
        config.frame_duration(),
    )
}

/// Write one frame; `index` counts from the oldest frame, newest by default
pub async fn run_single_frame(config: &RadarConfig, index: Option<usize>, output: &Path) -> Result<()> {
    let loader = bom_loader(config)?;
    run_single_frame_with(&loader, config, index, output).await
}

pub async fn run_single_frame_with<L: ImageLoader>(
    loader: &L,
    config: &RadarConfig,
    index: Option<usize>,
    output: &Path,
) -> Result<()> {
    let radar_loop = load_loop(loader, config).await?;

    let count = radar_loop.frames.len();
    let last = count.saturating_sub(1);
    let index = match index {
        None => last,
        Some(i) if i < count => i,
        Some(i) => {
            return Err(anyhow!(
                "frame index {} out of range: loop has {} frames (0..={})",
                i,
                count,
                last
            ))
        }
    };
    let image = render_frame(&radar_loop, index, config.canvas_size(), label_font(config), config.draw_time_label);
    write_png_atomic(output, &image)?;

    if let Some(frame) = radar_loop.frames.get(index) {
        info!("wrote frame {} ({}) to {}", index, frame.radar_time, output.display());
    }
    Ok(())
}
