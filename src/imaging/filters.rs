/// In-memory image transforms
///
/// Pure functions from one `DynamicImage` to another. Nothing here touches
/// the filesystem; see `pipeline.rs` for the read-transform-write cycle.

use image::{imageops, DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::color;
use crate::state::edit::FilterKind;

/// Laplacian-style edge kernel: strong response on edges, zero on flat areas
const EDGE_KERNEL: [f32; 9] = [
    -1.0, -1.0, -1.0,
    -1.0, 8.0, -1.0,
    -1.0, -1.0, -1.0,
];

/// Apply one of the fixed filters
pub fn apply(img: DynamicImage, kind: FilterKind) -> DynamicImage {
    match kind {
        FilterKind::None => img,
        FilterKind::Greyscale => DynamicImage::ImageLuma8(greyscale(&img)),
        FilterKind::Sepia => DynamicImage::ImageRgb8(sepia(&img)),
        FilterKind::Sketch => DynamicImage::ImageLuma8(sketch(&img)),
        FilterKind::Invert => invert(img),
    }
}

/// Collapse to a single luma channel
pub fn greyscale(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(buf) = img {
        return buf.clone();
    }

    let rgb = img.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([color::luma(r, g, b)])
    })
}

/// Greyscale, then recolour along the shadow -> highlight sepia gradient
pub fn sepia(img: &DynamicImage) -> RgbImage {
    let grey = greyscale(img);
    RgbImage::from_fn(grey.width(), grey.height(), |x, y| {
        let level = grey.get_pixel(x, y).0[0];
        Rgb(color::gradient(color::SEPIA_SHADOW, color::SEPIA_HIGHLIGHT, level))
    })
}

/// Greyscale, edge detection, then invert so edges read as dark strokes on white
pub fn sketch(img: &DynamicImage) -> GrayImage {
    let grey = greyscale(img);
    let mut edges: GrayImage = imageops::filter3x3(&grey, &EDGE_KERNEL);
    imageops::invert(&mut edges);
    edges
}

/// 255 - v on every colour channel; alpha is left alone
pub fn invert(mut img: DynamicImage) -> DynamicImage {
    img.invert();
    img
}

/// Multiply every colour channel by `factor`
pub fn brighten(img: DynamicImage, factor: f32) -> DynamicImage {
    map_colour_channels(img, |value| color::scale_channel(value, factor))
}

/// Scale distance from the mean grey level by `factor`
pub fn contrast(img: DynamicImage, factor: f32) -> DynamicImage {
    let mean = mean_luma(&img);
    map_colour_channels(img, |value| color::stretch_channel(value, mean, factor))
}

/// Mean grey level, rounded to a whole level
fn mean_luma(img: &DynamicImage) -> f32 {
    let grey = greyscale(img);
    let pixel_count = u64::from(grey.width()) * u64::from(grey.height());
    if pixel_count == 0 {
        return 0.0;
    }
    let total: u64 = grey.pixels().map(|p| u64::from(p.0[0])).sum();
    (total as f64 / pixel_count as f64).round() as f32
}

/// Run `f` over colour channels only, keeping the buffer layout when it is
/// one of the common 8-bit layouts
fn map_colour_channels(img: DynamicImage, f: impl Fn(u8) -> u8) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(mut buf) => {
            for pixel in buf.pixels_mut() {
                pixel.0[0] = f(pixel.0[0]);
            }
            DynamicImage::ImageLuma8(buf)
        }
        DynamicImage::ImageLumaA8(mut buf) => {
            for pixel in buf.pixels_mut() {
                pixel.0[0] = f(pixel.0[0]);
            }
            DynamicImage::ImageLumaA8(buf)
        }
        DynamicImage::ImageRgb8(mut buf) => {
            for pixel in buf.pixels_mut() {
                for channel in pixel.0.iter_mut() {
                    *channel = f(*channel);
                }
            }
            DynamicImage::ImageRgb8(buf)
        }
        other => {
            let mut buf = other.to_rgba8();
            for pixel in buf.pixels_mut() {
                for channel in pixel.0[..3].iter_mut() {
                    *channel = f(*channel);
                }
            }
            DynamicImage::ImageRgba8(buf)
        }
    }
}
