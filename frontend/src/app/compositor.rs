use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{Font, Scale};

use crate::app::assembler::{FrameSequence, ReferenceLayerSet};
use crate::app::loader::RadarImage;

/// Radar images and transparencies are published at 512x512
pub const NATIVE_WIDTH: u32 = 512;
pub const NATIVE_HEIGHT: u32 = 512;
/// Extra rows below the radar image that only the legend covers
pub const LEGEND_MARGIN: u32 = 45;

pub const MAX_CANVAS_WIDTH: u32 = 512;
pub const MAX_CANVAS_HEIGHT: u32 = 557;

pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    /// Largest canvas that fits the viewport, capped at 512x557
    pub fn fit_viewport(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            width: viewport_width.min(MAX_CANVAS_WIDTH),
            height: viewport_height.min(MAX_CANVAS_HEIGHT),
        }
    }

    /// Height of the area radar layers are scaled into
    pub fn content_height(&self) -> u32 {
        self.height.saturating_sub(LEGEND_MARGIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    pub x: i32,
    /// y of the text baseline
    pub baseline: i32,
    pub size: f32,
    pub color: Rgba<u8>,
}

pub const TIME_LABEL: LabelStyle = LabelStyle {
    x: 10,
    baseline: 40,
    size: 20.0,
    color: Rgba([0, 0, 0, 255]),
};

/// Drawing target for composited frames
pub trait Surface {
    fn size(&self) -> CanvasSize;

    fn fill(&mut self, color: Rgba<u8>);

    /// Scale the `src` region of `image` into `dst`, blending over what is there
    fn draw_image(&mut self, image: &RadarImage, src: Rect, dst: Rect);

    fn draw_text(&mut self, text: &str, style: &LabelStyle);
}

/// Draw one loop frame.
///
/// Stacking order, bottom to top: legend, background, topography, time label,
/// loop image, range, locations. Everything but the legend is scaled from the
/// native 512x512 into the canvas minus the legend margin; the legend fills
/// the whole canvas.
pub fn draw_frame<S: Surface>(
    surface: &mut S,
    layers: &ReferenceLayerSet,
    frames: &FrameSequence,
    index: usize,
    draw_label: bool,
) {
    let size = surface.size();
    let native = Rect::new(0, 0, NATIVE_WIDTH, NATIVE_HEIGHT);
    let content = Rect::new(0, 0, size.width, size.content_height());

    surface.draw_image(
        &layers.legend,
        Rect::new(0, 0, NATIVE_WIDTH, NATIVE_HEIGHT + LEGEND_MARGIN),
        Rect::new(0, 0, size.width, size.height),
    );
    surface.draw_image(&layers.background, native, content);
    surface.draw_image(&layers.topography, native, content);

    match frames.get(index) {
        Some(frame) => {
            if draw_label {
                surface.draw_text(&frame.label, &TIME_LABEL);
            }
            surface.draw_image(&frame.image, native, content);
        }
        None => warn!("frame {} out of range ({} frames)", index, frames.len()),
    }

    surface.draw_image(&layers.range, native, content);
    surface.draw_image(&layers.locations, native, content);
}

// Monospace fonts tried when none is configured, closest to Courier New first.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/msttcorefonts/Courier_New.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/liberation2/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/Library/Fonts/Courier New.ttf",
    "/System/Library/Fonts/Supplemental/Courier New.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// TrueType font for the time label
#[derive(Clone)]
pub struct LabelFont {
    font: Font<'static>,
}

impl LabelFont {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        let font = Font::try_from_vec(data)
            .ok_or_else(|| anyhow!("{} is not a usable TrueType font", path.display()))?;
        Ok(Self { font })
    }

    /// Load the configured font, or the first installed candidate
    pub fn discover(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            match Self::load(path) {
                Ok(font) => return Some(font),
                Err(e) => warn!("configured label font unusable: {:#}", e),
            }
        }

        let found = FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .find_map(|p| Self::load(&p).ok());

        if found.is_none() {
            warn!("no label font found, time labels will not be drawn (use --font)");
        }
        found
    }
}

/// In-memory RGBA canvas, fully transparent until filled
pub struct RgbaSurface {
    pixels: RgbaImage,
    font: Option<LabelFont>,
}

impl RgbaSurface {
    pub fn new(size: CanvasSize, font: Option<LabelFont>) -> Self {
        Self {
            pixels: RgbaImage::new(size.width, size.height),
            font,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl Surface for RgbaSurface {
    fn size(&self) -> CanvasSize {
        CanvasSize {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    fn fill(&mut self, color: Rgba<u8>) {
        self.pixels.pixels_mut().for_each(|p| *p = color);
    }

    fn draw_image(&mut self, image: &RadarImage, src: Rect, dst: Rect) {
        // Clip the source to the image and shrink the destination to match
        let src_right = src.x.saturating_add(src.width).min(image.width());
        let src_bottom = src.y.saturating_add(src.height).min(image.height());
        if src.x >= src_right || src.y >= src_bottom {
            return;
        }
        let clipped_width = src_right - src.x;
        let clipped_height = src_bottom - src.y;

        let dst_width = (u64::from(dst.width) * u64::from(clipped_width) / u64::from(src.width)) as u32;
        let dst_height = (u64::from(dst.height) * u64::from(clipped_height) / u64::from(src.height)) as u32;
        if dst_width == 0 || dst_height == 0 {
            return;
        }

        let region = imageops::crop_imm(image.pixels(), src.x, src.y, clipped_width, clipped_height).to_image();
        let scaled = if (clipped_width, clipped_height) == (dst_width, dst_height) {
            region
        } else {
            imageops::resize(&region, dst_width, dst_height, FilterType::Triangle)
        };

        imageops::overlay(&mut self.pixels, &scaled, i64::from(dst.x), i64::from(dst.y));
    }

    fn draw_text(&mut self, text: &str, style: &LabelStyle) {
        let Some(label_font) = &self.font else {
            return;
        };
        let scale = Scale::uniform(style.size);
        let ascent = label_font.font.v_metrics(scale).ascent;
        let top = style.baseline - ascent.round() as i32;
        draw_text_mut(&mut self.pixels, style.color, style.x, top, scale, &label_font.font, text);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::assembler::{Frame, FrameSequence};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        Fill,
        /// Images are told apart by their width
        Image { id: u32, src: Rect, dst: Rect },
        Text(String),
    }

    pub(crate) struct RecordingSurface {
        pub(crate) size: CanvasSize,
        pub(crate) ops: Vec<Op>,
    }

    impl RecordingSurface {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                size: CanvasSize { width, height },
                ops: Vec::new(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> CanvasSize {
            self.size
        }

        fn fill(&mut self, _color: Rgba<u8>) {
            self.ops.push(Op::Fill);
        }

        fn draw_image(&mut self, image: &RadarImage, src: Rect, dst: Rect) {
            self.ops.push(Op::Image { id: image.width(), src, dst });
        }

        fn draw_text(&mut self, text: &str, _style: &LabelStyle) {
            self.ops.push(Op::Text(text.to_string()));
        }
    }

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RadarImage {
        RadarImage::from_rgba(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    const LEGEND: u32 = 1;
    const BACKGROUND_ID: u32 = 2;
    const TOPOGRAPHY: u32 = 3;
    const RANGE: u32 = 4;
    const LOCATIONS: u32 = 5;

    /// Layers with widths 1..=5 and frames with widths 10, 11, ...
    pub(crate) fn fake_loop(frame_count: u32) -> (ReferenceLayerSet, FrameSequence) {
        let layers = ReferenceLayerSet {
            legend: solid(LEGEND, 1, [0, 0, 0, 0]),
            background: solid(BACKGROUND_ID, 1, [0, 0, 0, 0]),
            topography: solid(TOPOGRAPHY, 1, [0, 0, 0, 0]),
            range: solid(RANGE, 1, [0, 0, 0, 0]),
            locations: solid(LOCATIONS, 1, [0, 0, 0, 0]),
        };
        let frames = (0..frame_count)
            .map(|i| Frame {
                image: solid(10 + i, 1, [0, 0, 0, 0]),
                label: format!("label {}", i),
                radar_time: format!("2021081004{:02}", i * 5),
            })
            .collect();
        (layers, FrameSequence::from_frames(frames))
    }

    fn image_ids(ops: &[Op]) -> Vec<u32> {
        ops.iter()
            .filter_map(|op| match op {
                Op::Image { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_draw_order_is_fixed() {
        let (layers, frames) = fake_loop(3);
        for index in 0..3 {
            let mut surface = RecordingSurface::new(512, 557);
            draw_frame(&mut surface, &layers, &frames, index, true);

            assert_eq!(
                image_ids(&surface.ops),
                vec![LEGEND, BACKGROUND_ID, TOPOGRAPHY, 10 + index as u32, RANGE, LOCATIONS]
            );
            // label sits between topography and the loop image
            assert_eq!(surface.ops[3], Op::Text(format!("label {}", index)));
        }
    }

    #[test]
    fn test_label_can_be_disabled() {
        let (layers, frames) = fake_loop(2);
        let mut surface = RecordingSurface::new(512, 557);
        draw_frame(&mut surface, &layers, &frames, 1, false);
        assert!(surface.ops.iter().all(|op| !matches!(op, Op::Text(_))));
        assert_eq!(surface.ops.len(), 6);
    }

    #[test]
    fn test_scaling_rectangles() {
        let (layers, frames) = fake_loop(1);
        let mut surface = RecordingSurface::new(400, 300);
        draw_frame(&mut surface, &layers, &frames, 0, false);

        for op in &surface.ops {
            let Op::Image { id, src, dst } = op else { continue };
            if *id == LEGEND {
                assert_eq!(*src, Rect::new(0, 0, 512, 557));
                assert_eq!(*dst, Rect::new(0, 0, 400, 300));
            } else {
                assert_eq!(*src, Rect::new(0, 0, 512, 512));
                assert_eq!(*dst, Rect::new(0, 0, 400, 255));
            }
        }
    }

    #[test]
    fn test_out_of_range_index_draws_static_layers_only() {
        let (layers, frames) = fake_loop(2);
        let mut surface = RecordingSurface::new(512, 557);
        draw_frame(&mut surface, &layers, &frames, 5, true);
        assert_eq!(image_ids(&surface.ops), vec![LEGEND, BACKGROUND_ID, TOPOGRAPHY, RANGE, LOCATIONS]);
    }

    #[test]
    fn test_canvas_size_fit() {
        assert_eq!(CanvasSize::fit_viewport(1024, 768), CanvasSize { width: 512, height: 557 });
        assert_eq!(CanvasSize::fit_viewport(320, 480).content_height(), 435);
        assert_eq!(CanvasSize::fit_viewport(320, 20).content_height(), 0);
    }

    fn white(width: u32, height: u32) -> RgbaSurface {
        let mut surface = RgbaSurface::new(CanvasSize { width, height }, None);
        surface.fill(BACKGROUND);
        surface
    }

    #[test]
    fn test_surface_starts_transparent_and_fills() {
        let mut surface = RgbaSurface::new(CanvasSize { width: 4, height: 4 }, None);
        assert!(surface.image().pixels().all(|p| p.0[3] == 0));

        surface.fill(Rgba([1, 2, 3, 255]));
        assert!(surface.image().pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn test_draw_image_scales_into_destination() {
        let mut surface = white(8, 8);
        let red = solid(2, 2, [255, 0, 0, 255]);

        surface.draw_image(&red, Rect::new(0, 0, 2, 2), Rect::new(0, 0, 4, 4));

        let img = surface.image();
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(4, 4), BACKGROUND);
    }

    #[test]
    fn test_draw_image_clips_oversized_source() {
        let mut surface = white(10, 10);
        let blue = solid(10, 5, [0, 0, 255, 255]);

        // Asking for twice the image height only covers the top half
        surface.draw_image(&blue, Rect::new(0, 0, 10, 10), Rect::new(0, 0, 10, 10));

        let img = surface.image();
        assert_eq!(*img.get_pixel(5, 4), Rgba([0, 0, 255, 255]));
        assert_eq!(*img.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn test_transparent_layers_keep_what_is_below() {
        let mut surface = white(2, 2);
        let red = solid(2, 2, [255, 0, 0, 255]);
        let clear = solid(2, 2, [0, 255, 0, 0]);

        surface.draw_image(&red, Rect::new(0, 0, 2, 2), Rect::new(0, 0, 2, 2));
        surface.draw_image(&clear, Rect::new(0, 0, 2, 2), Rect::new(0, 0, 2, 2));

        assert_eq!(*surface.image().get_pixel(1, 1), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let mut surface = white(64, 64);
        surface.draw_text("4:55:00 AM", &TIME_LABEL);
        assert!(surface.image().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    #[ignore = "needs DejaVu Sans Mono installed"]
    fn test_label_drawn_with_installed_font() {
        let path = Path::new("/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf");
        let font = LabelFont::load(path).unwrap();
        let mut surface = RgbaSurface::new(CanvasSize { width: 200, height: 60 }, Some(font));
        surface.fill(BACKGROUND);
        surface.draw_text("4:55:00 AM", &TIME_LABEL);
        assert!(surface.image().pixels().any(|p| *p != BACKGROUND));
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        assert!(LabelFont::load(Path::new("/nonexistent/font.ttf")).is_err());
    }
}
