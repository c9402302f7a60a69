use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app::compositor::CanvasSize;

#[derive(Parser, Debug)]
#[command(name = "radar-loop", about = "Animated radar loop for a single radar station")]
pub struct Cli {
    /// JSON configuration file; command line flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Radar station identifier, e.g. IDR703
    #[arg(long, global = true)]
    pub station: Option<String>,

    /// Number of loop images to request
    #[arg(long, global = true)]
    pub frames: Option<usize>,

    /// How long each loop image is shown, in milliseconds
    #[arg(long, global = true)]
    pub frame_duration_ms: Option<u64>,

    /// Do not draw the time of day on each frame
    #[arg(long, global = true)]
    pub no_label: bool,

    /// Reload the whole loop every N minutes (0 disables)
    #[arg(long, global = true)]
    pub reload_minutes: Option<u64>,

    #[arg(long, global = true)]
    pub viewport_width: Option<u32>,

    #[arg(long, global = true)]
    pub viewport_height: Option<u32>,

    /// Image host to fetch from
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// TrueType font used for the time label
    #[arg(long, global = true)]
    pub font: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Play the loop, rewriting the output PNG on every frame
    Play {
        #[arg(short, long, default_value = "radar_loop.png")]
        output: PathBuf,
    },
    /// Write the whole loop as an animated GIF
    Export {
        #[arg(short, long, default_value = "radar_loop.gif")]
        output: PathBuf,
    },
    /// Write a single composited frame (newest by default)
    Frame {
        #[arg(long)]
        index: Option<usize>,
        #[arg(short, long, default_value = "radar_frame.png")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub station: String,
    pub loop_image_count: usize,
    pub frame_duration_ms: u64,
    pub draw_time_label: bool,
    pub reload_minutes: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub base_url: String,
    pub font_path: Option<PathBuf>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            station: "IDR703".to_string(),
            // 7 images are published per loop, +1 since the newest may be missing
            loop_image_count: 8,
            frame_duration_ms: 750,
            draw_time_label: true,
            reload_minutes: 10,
            viewport_width: 512,
            viewport_height: 557,
            base_url: bom::DEFAULT_BASE_URL.to_string(),
            font_path: None,
        }
    }
}

impl RadarConfig {
    /// Load configuration from a JSON file, or the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: RadarConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Build the effective configuration for a command line invocation
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(station) = &cli.station {
            self.station = station.clone();
        }
        if let Some(frames) = cli.frames {
            self.loop_image_count = frames;
        }
        if let Some(ms) = cli.frame_duration_ms {
            self.frame_duration_ms = ms;
        }
        if cli.no_label {
            self.draw_time_label = false;
        }
        if let Some(minutes) = cli.reload_minutes {
            self.reload_minutes = minutes;
        }
        if let Some(width) = cli.viewport_width {
            self.viewport_width = width;
        }
        if let Some(height) = cli.viewport_height {
            self.viewport_height = height;
        }
        if let Some(base_url) = &cli.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(font) = &cli.font {
            self.font_path = Some(font.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.station.trim().is_empty() {
            return Err(anyhow!("station identifier must not be empty"));
        }
        if self.station.contains('/') {
            return Err(anyhow!("station identifier '{}' must not contain '/'", self.station));
        }
        if self.loop_image_count == 0 {
            return Err(anyhow!("loop_image_count must be at least 1"));
        }
        if self.frame_duration_ms == 0 {
            return Err(anyhow!("frame_duration_ms must be greater than 0"));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(anyhow!("viewport dimensions must be greater than 0"));
        }
        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_millis(self.frame_duration_ms)
    }

    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_minutes > 0).then(|| Duration::from_secs(self.reload_minutes * 60))
    }

    pub fn canvas_size(&self) -> CanvasSize {
        CanvasSize::fit_viewport(self.viewport_width, self.viewport_height)
    }
}
