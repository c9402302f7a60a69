use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::app::assembler::RadarLoop;
use crate::app::compositor::{draw_frame, CanvasSize, LabelFont, RgbaSurface, Surface, BACKGROUND};

/// Lower is better quality, slower quantization
const QUANTIZE_SPEED: i32 = 10;

/// Write every frame of the loop, oldest first, as a repeating animated GIF
pub fn export_gif(
    path: &Path,
    radar_loop: &RadarLoop,
    size: CanvasSize,
    font: Option<LabelFont>,
    draw_label: bool,
    frame_duration: Duration,
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_gif(&mut writer, radar_loop, size, font, draw_label, frame_duration)?;
    writer.flush()?;

    info!("wrote {} frames to {}", radar_loop.frames.len(), path.display());
    Ok(())
}

pub fn write_gif<W: Write>(
    writer: W,
    radar_loop: &RadarLoop,
    size: CanvasSize,
    font: Option<LabelFont>,
    draw_label: bool,
    frame_duration: Duration,
) -> Result<()> {
    let width = u16::try_from(size.width).context("canvas too wide for GIF")?;
    let height = u16::try_from(size.height).context("canvas too tall for GIF")?;
    // GIF delays are in hundredths of a second
    let delay = u16::try_from(frame_duration.as_millis() / 10).unwrap_or(u16::MAX);

    let mut encoder = gif::Encoder::new(writer, width, height, &[])?;
    encoder.set_repeat(gif::Repeat::Infinite)?;

    let mut surface = RgbaSurface::new(size, font);
    surface.fill(BACKGROUND);
    for index in 0..radar_loop.frames.len() {
        draw_frame(&mut surface, &radar_loop.layers, &radar_loop.frames, index, draw_label);

        let mut pixels = surface.image().as_raw().clone();
        let mut frame = gif::Frame::from_rgba_speed(width, height, &mut pixels, QUANTIZE_SPEED);
        frame.delay = delay;
        encoder.write_frame(&frame)?;
    }

    Ok(())
}
