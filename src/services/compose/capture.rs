use super::background::encode_png;
use super::theme::{blend, Rgb, PANEL_FILL, PANEL_HATCH};
use crate::core::model::GeneratedPanel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, warn};

/// Raster snapshot of one panel cell, PNG encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPanel {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// False when the cell shows the placeholder instead of artwork.
    pub available: bool,
}

/// Turns a generated panel into the square raster placed in its grid cell.
#[async_trait]
pub trait PanelCapture: Send + Sync {
    async fn capture(&self, panel: &GeneratedPanel, side_pt: f32) -> Result<CapturedPanel>;
}

/// Default capture: artwork cropped to a square over the panel background,
/// supersampled by `scale` pixels per point.
#[derive(Debug, Clone)]
pub struct RasterCapture {
    pub scale: f32,
    pub background: Rgb,
}

impl Default for RasterCapture {
    fn default() -> Self {
        Self {
            scale: 2.0,
            background: PANEL_FILL,
        }
    }
}

impl RasterCapture {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            ..Default::default()
        }
    }

    pub fn side_pixels(&self, side_pt: f32) -> u32 {
        (side_pt * self.scale).round().max(1.0) as u32
    }

    pub fn render(&self, image_data: Option<&[u8]>, side: u32) -> (RgbImage, bool) {
        let decoded = image_data.and_then(|data| match image::load_from_memory(data) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Panel artwork could not be decoded: {}", e);
                None
            }
        });

        match decoded {
            Some(img) => {
                let rgba = img.resize_to_fill(side, side, FilterType::Triangle).to_rgba8();
                let flat = RgbImage::from_fn(side, side, |x, y| {
                    let p = rgba.get_pixel(x, y).0;
                    image::Rgb(blend(self.background, [p[0], p[1], p[2]], p[3] as f32 / 255.0))
                });
                (flat, true)
            }
            None => (placeholder(side, self.background), false),
        }
    }
}

/// Diagonal hatch shown where a panel has no artwork.
fn placeholder(side: u32, background: Rgb) -> RgbImage {
    let stripe = (side / 16).max(4);
    RgbImage::from_fn(side, side, |x, y| {
        if (x + y) % (stripe * 4) < stripe {
            image::Rgb(PANEL_HATCH)
        } else {
            image::Rgb(background)
        }
    })
}

#[async_trait]
impl PanelCapture for RasterCapture {
    async fn capture(&self, panel: &GeneratedPanel, side_pt: f32) -> Result<CapturedPanel> {
        let side = self.side_pixels(side_pt);
        debug!("Capturing panel {} at {}px", panel.id(), side);

        // Rasterized on the calling task; exports run one panel at a time.
        let (raster, available) = self.render(panel.image().map(|img| img.data.as_slice()), side);
        let png = encode_png(&raster).context("Failed to encode panel capture")?;

        Ok(CapturedPanel {
            png,
            width: side,
            height: side,
            available,
        })
    }
}
