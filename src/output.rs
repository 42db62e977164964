//! Rendering of scan tallies to grayscale count maps.
//!
//! A count map is the detected-ray image of the scan: one pixel per scan
//! position, brightness proportional to counts, normalised to the brightest
//! pixel. Anything richer (plotting, persistence of the raw tallies) belongs
//! to downstream tooling.

use std::path::Path;

use image::{GrayImage, Luma};
use log::{info, warn};

use crate::scan::ScanResult;

/// Build a grayscale image from per-pixel counts laid out row-major (z, x).
fn to_image(counts: &[u32], nx: usize, nz: usize) -> GrayImage {
    let max = counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    GrayImage::from_fn(nx as u32, nz as u32, |x, y| {
        let c = counts[y as usize * nx + x as usize] as f64;
        Luma([(c / max * 255.0).round() as u8])
    })
}

/// Save the total detected-count map (all detectors, all scatter counts).
pub fn save_total_map(result: &ScanResult, path: &Path) {
    let counts: Vec<u32> = (0..result.nz)
        .flat_map(|j| (0..result.nx).map(move |i| (j, i)))
        .map(|(j, i)| result.detected_total(j, i))
        .collect();
    save(to_image(&counts, result.nx, result.nz), path);
}

/// Save the count map of a single detector (0-based).
pub fn save_detector_map(result: &ScanResult, detector: usize, path: &Path) {
    save(
        to_image(result.detector_map(detector), result.nx, result.nz),
        path,
    );
}

/// Save the effuse-beam detection map.
pub fn save_effuse_map(result: &ScanResult, path: &Path) {
    save(to_image(&result.effuse, result.nx, result.nz), path);
}

fn save(image: GrayImage, path: &Path) {
    match image.save(path) {
        Ok(_) => info!("Count map saved as {}", path.display()),
        Err(e) => warn!("Failed to save count map {}: {e}", path.display()),
    }
}
