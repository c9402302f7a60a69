use bom::Transparency;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::app::loader::{ImageLoader, LoadError, RadarImage};
use crate::app::timestamps::{candidate_frame_times_local, FrameTime};

/// The five static layers drawn around every loop image
#[derive(Debug)]
pub struct ReferenceLayerSet {
    pub legend: RadarImage,
    pub background: RadarImage,
    pub topography: RadarImage,
    pub range: RadarImage,
    pub locations: RadarImage,
}

/// One loop image and the label drawn with it
#[derive(Debug)]
pub struct Frame {
    pub image: RadarImage,
    pub label: String,
    pub radar_time: String,
}

/// Loop images in playback order (oldest first). Never empty.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Frames must already be in playback order
    pub(crate) fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.iter().map(|f| f.label.as_str()).collect()
    }
}

/// Everything needed to play a loop
#[derive(Debug)]
pub struct RadarLoop {
    pub layers: ReferenceLayerSet,
    pub frames: FrameSequence,
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("failed to load some static images: {}", failed_layer_names(.failures))]
    ReferenceLoad { failures: Vec<(Transparency, LoadError)> },

    #[error("none of the {requested} loop images could be loaded")]
    NoFrames { requested: usize },
}

fn failed_layer_names(failures: &[(Transparency, LoadError)]) -> String {
    failures
        .iter()
        .map(|(t, _)| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load all five static layers concurrently; any failure fails the whole set
pub async fn load_reference_layers<L: ImageLoader>(
    loader: &L,
    station: &str,
) -> Result<ReferenceLayerSet, LoopError> {
    let urls = loader.urls();
    let legend_url = urls.transparency(station, Transparency::Legend);
    let background_url = urls.transparency(station, Transparency::Background);
    let topography_url = urls.transparency(station, Transparency::Topography);
    let range_url = urls.transparency(station, Transparency::Range);
    let locations_url = urls.transparency(station, Transparency::Locations);

    let (legend, background, topography, range, locations) = tokio::join!(
        loader.load(&legend_url),
        loader.load(&background_url),
        loader.load(&topography_url),
        loader.load(&range_url),
        loader.load(&locations_url),
    );

    match (legend, background, topography, range, locations) {
        (Ok(legend), Ok(background), Ok(topography), Ok(range), Ok(locations)) => {
            info!("loaded static images for {}", station);
            Ok(ReferenceLayerSet {
                legend,
                background,
                topography,
                range,
                locations,
            })
        }
        (legend, background, topography, range, locations) => {
            let failures: Vec<(Transparency, LoadError)> = [
                (Transparency::Legend, legend.err()),
                (Transparency::Background, background.err()),
                (Transparency::Topography, topography.err()),
                (Transparency::Range, range.err()),
                (Transparency::Locations, locations.err()),
            ]
            .into_iter()
            .filter_map(|(t, err)| err.map(|e| (t, e)))
            .collect();

            for (t, e) in &failures {
                error!("static image {} failed: {}", t.name(), e);
            }
            Err(LoopError::ReferenceLoad { failures })
        }
    }
}

/// Load loop images one after another, newest first, dropping the ones that fail.
/// Loads are sequential so the host only ever sees one loop request at a time.
pub async fn load_frame_sequence<L: ImageLoader>(
    loader: &L,
    station: &str,
    times: &[FrameTime],
) -> Result<FrameSequence, LoopError> {
    let mut frames = Vec::with_capacity(times.len());

    for time in times {
        let url = loader.urls().loop_frame(station, &time.radar_time);
        debug!("requesting loop image for {}", time.instant.to_rfc3339());
        match loader.load(&url).await {
            Ok(image) => frames.push(Frame {
                image,
                label: time.label.clone(),
                radar_time: time.radar_time.clone(),
            }),
            Err(e) => warn!("skipping loop image {}: {}", time.radar_time, e),
        }
    }

    if frames.is_empty() {
        return Err(LoopError::NoFrames {
            requested: times.len(),
        });
    }

    info!("loaded {}/{} loop images for {}", frames.len(), times.len(), station);

    frames.reverse();
    let sequence = FrameSequence::from_frames(frames);
    debug!("loop order: {}", sequence.labels().join(", "));
    Ok(sequence)
}

/// Load the static layers, then the loop images for the given candidate times
pub async fn assemble_loop_for_times<L: ImageLoader>(
    loader: &L,
    station: &str,
    times: &[FrameTime],
) -> Result<RadarLoop, LoopError> {
    let layers = load_reference_layers(loader, station).await?;
    let frames = load_frame_sequence(loader, station, times).await?;
    Ok(RadarLoop { layers, frames })
}

/// Load a complete loop ending at the latest image published before `now`
pub async fn assemble_loop<L: ImageLoader>(
    loader: &L,
    station: &str,
    frame_count: usize,
    now: DateTime<Utc>,
) -> Result<RadarLoop, LoopError> {
    let times = candidate_frame_times_local(now, frame_count);
    assemble_loop_for_times(loader, station, &times).await
}
