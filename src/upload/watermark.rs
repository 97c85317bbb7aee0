use crate::error::PanelError;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, imageops};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Post-processing applied to image uploads before they are stored.
pub trait Watermarker: Send + Sync {
    /// Whether images with extension `ext` can be marked. Others are stored as uploaded.
    fn supports(&self, ext: &str) -> bool;

    /// Return `bytes` (an image with extension `ext`) marked with `mark_file`.
    fn apply(&self, bytes: &[u8], ext: &str, mark_file: &Path) -> Result<Vec<u8>, PanelError>;
}

/// Overlays the mark image in the bottom-right corner.
///
/// Handles PNG, JPEG, WebP and still GIFs. Animated GIFs are returned
/// unchanged since re-encoding a single frame would drop the animation.
#[derive(Debug, Clone, Copy)]
pub struct OverlayWatermarker {
    /// Gap between the mark and the image edges, in pixels.
    pub padding: u32,
}

impl Default for OverlayWatermarker {
    fn default() -> Self {
        Self { padding: 10 }
    }
}

fn overlay_format(ext: &str) -> Option<ImageFormat> {
    match ImageFormat::from_extension(ext.trim_start_matches('.'))? {
        format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP) => {
            Some(format)
        }
        _ => None,
    }
}

fn is_animated_gif(bytes: &[u8]) -> Result<bool, PanelError> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    Ok(decoder.into_frames().take(2).count() > 1)
}

impl Watermarker for OverlayWatermarker {
    fn supports(&self, ext: &str) -> bool {
        overlay_format(ext).is_some()
    }

    fn apply(&self, bytes: &[u8], ext: &str, mark_file: &Path) -> Result<Vec<u8>, PanelError> {
        let format = overlay_format(ext)
            .ok_or_else(|| PanelError::UnsupportedImage(ext.trim_start_matches('.').to_string()))?;
        if format == ImageFormat::Gif && is_animated_gif(bytes)? {
            debug!("animated gif stored unmarked");
            return Ok(bytes.to_vec());
        }

        let mut base = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
        let mark = image::open(mark_file)?.to_rgba8();

        let (bw, bh) = base.dimensions();
        let (mw, mh) = mark.dimensions();
        if mw + self.padding > bw || mh + self.padding > bh {
            debug!(bw, bh, mw, mh, "image smaller than watermark; stored unmarked");
            return Ok(bytes.to_vec());
        }

        let x = i64::from(bw - mw - self.padding);
        let y = i64::from(bh - mh - self.padding);
        imageops::overlay(&mut base, &mark, x, y);

        let marked = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(base).to_rgb8()),
            _ => DynamicImage::ImageRgba8(base),
        };
        let mut out = Cursor::new(Vec::with_capacity(bytes.len()));
        marked.write_to(&mut out, format)?;
        Ok(out.into_inner())
    }
}
