//
// render.rs
// Tag2Dcm-rs
//
// Renders windowed grayscale and composite RGB arrays as axis-free PNG snapshots.
//

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::{ArrayD, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::composite::CompositeImage;
use crate::error::{Result, Tag2DcmError};
use crate::window::WindowSpec;
use crate::{loader, paths};

/// Pixels per figure inch.
pub const DPI: f64 = 100.0;

/// Snapshot size in inches; the image is fitted inside `width x height` at [`DPI`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FigureSize {
    pub width: f64,
    pub height: f64,
}

impl Default for FigureSize {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 10.0,
        }
    }
}

impl FigureSize {
    fn pixel_bounds(&self) -> (u32, u32) {
        let to_px = |inches: f64| (inches * DPI).round().max(1.0) as u32;
        (to_px(self.width), to_px(self.height))
    }

    /// Largest size with the image's aspect ratio that fits the figure.
    pub fn fit(&self, width: u32, height: u32) -> (u32, u32) {
        let (max_w, max_h) = self.pixel_bounds();
        if width == 0 || height == 0 {
            return (max_w, max_h);
        }
        let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }
}

// Multi-frame arrays are rendered from their first frame.
fn first_frame<T>(array: &ArrayD<T>, spatial_dims: usize) -> ArrayViewD<'_, T> {
    let mut view = array.view();
    while view.ndim() > spatial_dims {
        view = view.index_axis_move(Axis(0), 0);
    }
    view
}

/// Maps [0, 1] intensities to 8-bit gray.
pub fn grayscale_image(normalized: &ArrayD<f64>) -> GrayImage {
    let frame = first_frame(normalized, 2);
    let (rows, cols) = (frame.shape()[0], frame.shape()[1]);
    ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
        let v = frame[[y as usize, x as usize]];
        Luma([(v.clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

pub fn rgb_image(composite: &CompositeImage) -> RgbImage {
    let frame = first_frame(composite.pixels(), 3);
    let (rows, cols) = (frame.shape()[0], frame.shape()[1]);
    ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
        let (r, c) = (y as usize, x as usize);
        Rgb([frame[[r, c, 0]], frame[[r, c, 1]], frame[[r, c, 2]]])
    })
}

/// Scale to the figure and encode as PNG in memory.
pub fn png_bytes(image: DynamicImage, figure: FigureSize) -> Result<Vec<u8>> {
    let (w, h) = figure.fit(image.width(), image.height());
    let fitted = match image {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(imageops::resize(&gray, w, h, FilterType::Nearest))
        }
        other => DynamicImage::ImageRgb8(imageops::resize(
            &other.to_rgb8(),
            w,
            h,
            FilterType::Nearest,
        )),
    };
    encode_image(&fitted, ImageFormat::Png)
}

fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format)?;
    Ok(buffer)
}

/// Render a CT image with the soft-tissue window to `<output_dir>/<file name>.png`.
pub fn render_png(input: &Path, output_dir: &Path, figure: FigureSize) -> Result<PathBuf> {
    let source = loader::load(input)?;
    let gray = grayscale_image(&source.normalized(WindowSpec::SOFT_TISSUE));
    let bytes = png_bytes(DynamicImage::ImageLuma8(gray), figure)?;

    paths::ensure_output_dir(output_dir)?;
    let output = paths::png_path(output_dir, input);
    std::fs::write(&output, bytes).map_err(|e| Tag2DcmError::io(&output, e))?;
    info!(?output, "Rendered PNG");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelMap;
    use crate::palette::PALETTE;
    use ndarray::{array, IxDyn};

    #[test]
    fn figure_fit_preserves_aspect() {
        let figure = FigureSize::default();
        assert_eq!(figure.fit(512, 512), (1000, 1000));
        assert_eq!(figure.fit(512, 256), (1000, 500));
        let small = FigureSize {
            width: 2.0,
            height: 4.0,
        };
        assert_eq!(small.fit(100, 100), (200, 200));
    }

    #[test]
    fn grayscale_maps_unit_range_to_bytes() {
        let img = grayscale_image(&array![[0.0, 0.5], [1.0, 0.25]].into_dyn());
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [128]);
        assert_eq!(img.get_pixel(0, 1).0, [255]);
    }

    #[test]
    fn multi_frame_renders_first_frame() {
        let mut stack = ArrayD::<f64>::zeros(IxDyn(&[3, 2, 4]));
        stack[[0, 1, 3]] = 1.0;
        stack[[1, 0, 0]] = 1.0;
        let img = grayscale_image(&stack);
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(3, 1).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn composite_png_has_png_signature() {
        let labels = LabelMap::new(array![[1u16, 2], [5, 7]].into_dyn());
        let composite = crate::composite::composite(&labels, &PALETTE);
        let rgb = rgb_image(&composite);
        assert_eq!(rgb.get_pixel(1, 1).0, [0, 255, 255]);

        let png = png_bytes(DynamicImage::ImageRgb8(rgb), FigureSize::default()).expect("png");
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
