//! Structural similarity (mean SSIM) between two grayscale rasters
//!
//! Uniform 7x7 window with sample covariance, K1 = 0.01, K2 = 0.03 and an
//! 8-bit data range. Window statistics come from summed-area tables so each
//! window costs O(1); only windows lying fully inside the image contribute
//! to the mean.

use image::GrayImage;
use ndarray::Array2;
use thiserror::Error;

pub const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

#[derive(Debug, Error, PartialEq)]
pub enum SimilarityError {
    #[error("Dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        a_width: u32,
        a_height: u32,
        b_width: u32,
        b_height: u32,
    },

    #[error("Image {width}x{height} is smaller than the {window}x{window} window")]
    TooSmall { width: u32, height: u32, window: usize },
}

/// Capability: similarity score of two equal-dimension grayscale rasters.
pub trait SimilarityMetric: Send + Sync {
    fn score(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ssim;

impl SimilarityMetric for Ssim {
    fn score(&self, a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
        mean_ssim(a, b)
    }
}

pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> Result<f64, SimilarityError> {
    if a.dimensions() != b.dimensions() {
        return Err(SimilarityError::DimensionMismatch {
            a_width: a.width(),
            a_height: a.height(),
            b_width: b.width(),
            b_height: b.height(),
        });
    }

    let (width, height) = a.dimensions();
    if (width as usize) < WINDOW || (height as usize) < WINDOW {
        return Err(SimilarityError::TooSmall { width, height, window: WINDOW });
    }

    let x = to_array(a);
    let y = to_array(b);

    let sx = summed_area(&x, |p, _| p);
    let sy = summed_area(&y, |_, q| q);
    let sxx = summed_area_pair(&x, &y, |p, _| p * p);
    let syy = summed_area_pair(&x, &y, |_, q| q * q);
    let sxy = summed_area_pair(&x, &y, |p, q| p * q);

    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let (rows, cols) = x.dim();
    let mut total = 0.0;
    let mut count = 0usize;

    for top in 0..=(rows - WINDOW) {
        for left in 0..=(cols - WINDOW) {
            let ux = window_sum(&sx, top, left) / n;
            let uy = window_sum(&sy, top, left) / n;
            let uxx = window_sum(&sxx, top, left) / n;
            let uyy = window_sum(&syy, top, left) / n;
            let uxy = window_sum(&sxy, top, left) / n;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);

            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

fn to_array(img: &GrayImage) -> Array2<f64> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        img.get_pixel(c as u32, r as u32)[0] as f64
    })
}

fn summed_area(src: &Array2<f64>, f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
    summed_area_pair(src, src, f)
}

/// Summed-area table of `f(x, y)` with a zero row and column prepended
fn summed_area_pair(x: &Array2<f64>, y: &Array2<f64>, f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let mut table = Array2::<f64>::zeros((rows + 1, cols + 1));
    for r in 0..rows {
        let mut row_sum = 0.0;
        for c in 0..cols {
            row_sum += f(x[[r, c]], y[[r, c]]);
            table[[r + 1, c + 1]] = table[[r, c + 1]] + row_sum;
        }
    }
    table
}

fn window_sum(table: &Array2<f64>, top: usize, left: usize) -> f64 {
    let bottom = top + WINDOW;
    let right = left + WINDOW;
    table[[bottom, right]] - table[[top, right]] - table[[bottom, left]] + table[[top, left]]
}
