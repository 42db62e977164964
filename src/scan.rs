//! The Monte Carlo driver: a data-parallel map over scan pixels.
//!
//! Every pixel is an independent task owning its RNG and accumulator; the
//! scene is shared read-only and the final reduction writes disjoint cells,
//! so nothing on the hot path synchronises.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::prelude::*;

use crate::diagnostics::Diagnostics;
use crate::error::ScanError;
use crate::random::RayRng;
use crate::scene::Scene;
use crate::source::Source;
use crate::trace::{trace_ray, RayFate};

/// Geometry and budget of one rectangular scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    /// Scan range along x (low, high).
    pub x_range: (f64, f64),
    /// Scan range along z (low, high).
    pub z_range: (f64, f64),
    /// Pixel separation.
    pub step: f64,
    /// Rays per pixel from the main beam.
    pub n_rays: u32,
    /// Rays per pixel from the effusive beam (0 disables it).
    pub n_effuse: u32,
    /// Scatter budget per ray.
    pub max_scatter: u32,
    /// Run seed; per-pixel streams derive from this and the pixel index.
    pub seed: u64,
    /// Whether the plate participates in the first intersection test.
    pub plate_first: bool,
}

impl ScanParams {
    /// Pixels along x.
    pub fn nx(&self) -> usize {
        ((self.x_range.1 - self.x_range.0) / self.step).round() as usize + 1
    }

    /// Pixels along z.
    pub fn nz(&self) -> usize {
        ((self.z_range.1 - self.z_range.0) / self.step).round() as usize + 1
    }

    fn validate(&self) -> Result<(), ScanError> {
        if !(self.step > 0.0) {
            return Err(ScanError::InvalidGrid(format!(
                "pixel separation must be positive, got {}",
                self.step
            )));
        }
        if self.x_range.1 < self.x_range.0 || self.z_range.1 < self.z_range.0 {
            return Err(ScanError::InvalidGrid(
                "scan range upper bound below lower bound".into(),
            ));
        }
        if self.max_scatter == 0 {
            return Err(ScanError::InvalidGrid(
                "scatter budget must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Accumulator for one pixel.
#[derive(Debug, Clone)]
struct PixelTally {
    /// Entry k: rays detected after exactly k + 1 sample scatters.
    by_scatter: Vec<u32>,
    /// Detections per aperture (main beam only).
    by_aperture: Vec<u32>,
    killed: u32,
    effuse: u32,
    diagnostics: Diagnostics,
}

impl PixelTally {
    fn new(max_scatter: u32, n_detectors: usize) -> Self {
        Self {
            by_scatter: vec![0; max_scatter as usize],
            by_aperture: vec![0; n_detectors],
            killed: 0,
            effuse: 0,
            diagnostics: Diagnostics::default(),
        }
    }
}

/// Complete tallies of one rectangular scan, plus provenance.
///
/// The count arrays are stored flat and row-major over (z, x); the scatter
/// histogram and per-detector maps add a leading axis.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Pixels along x.
    pub nx: usize,
    /// Pixels along z.
    pub nz: usize,
    /// Scatter budget the histogram axis corresponds to.
    pub max_scatter: u32,
    /// Number of detectors.
    pub n_detectors: usize,
    /// `[max_scatter][nz][nx]`: detections binned by scatter count.
    pub counters: Vec<u32>,
    /// `[n_detectors][nz][nx]`: detections binned by aperture.
    pub detected: Vec<u32>,
    /// `[nz][nx]`: rays that exhausted the scatter budget.
    pub killed: Vec<u32>,
    /// `[nz][nx]`: detected rays of the effusive beam.
    pub effuse: Vec<u32>,
    /// `[nz][nx]`: locally-handled numerical anomalies.
    pub anomalies: Vec<u32>,
    /// Scan-wide anomaly counters, broken down by kind.
    pub diagnostics: Diagnostics,
    /// Scan range along x.
    pub x_range: (f64, f64),
    /// Scan range along z.
    pub z_range: (f64, f64),
    /// Pixel separation.
    pub step: f64,
    /// Main-beam rays per pixel.
    pub n_rays: u32,
    /// Wall-clock time of the tracing loop.
    pub elapsed: Duration,
}

impl ScanResult {
    /// Detections after exactly `k + 1` scatters at pixel (i, j).
    pub fn counter(&self, k: usize, j: usize, i: usize) -> u32 {
        self.counters[(k * self.nz + j) * self.nx + i]
    }

    /// Total detections (all scatter counts) at pixel (i, j).
    pub fn detected_total(&self, j: usize, i: usize) -> u32 {
        (0..self.max_scatter as usize)
            .map(|k| self.counter(k, j, i))
            .sum()
    }

    /// Per-pixel detection map of one detector (0-based).
    pub fn detector_map(&self, det: usize) -> &[u32] {
        let npix = self.nx * self.nz;
        &self.detected[det * npix..(det + 1) * npix]
    }

    /// Sum of a detector's map over all pixels.
    pub fn detector_total(&self, det: usize) -> u32 {
        self.detector_map(det).iter().sum()
    }
}

/// One configured scan, holding its cancellation flag.
#[derive(Debug)]
pub struct Scan {
    /// Scan geometry and budgets.
    pub params: ScanParams,
    cancel: Arc<AtomicBool>,
}

impl Scan {
    /// New scan with a fresh (unset) cancel flag.
    pub fn new(params: ScanParams) -> Self {
        Self {
            params,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that cancels the scan when set. Observed between pixel tasks;
    /// a pixel already tracing runs to completion.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Trace every pixel of the scan.
    ///
    /// `effuse` supplies the effusive population when `n_effuse > 0`.
    pub fn run(
        &self,
        scene: &Scene,
        source: &Source,
        effuse: Option<&Source>,
    ) -> Result<ScanResult, ScanError> {
        let p = &self.params;
        p.validate()?;
        let (nx, nz) = (p.nx(), p.nz());
        let npix = nx * nz;
        let n_detectors = scene.detector_count();

        info!(
            "Tracing {} pixels ({}x{}) with {} rays each on {} CPU cores...",
            npix,
            nx,
            nz,
            p.n_rays,
            rayon::current_num_threads()
        );
        let start = std::time::Instant::now();
        let pb = ProgressBar::new(npix as u64);
        pb.set_style(ProgressStyle::default_bar().template("{bar:40} {pos}/{len} ETA: {eta}").unwrap());

        let tallies: Vec<PixelTally> = (0..npix)
            .into_par_iter()
            .map(|idx| {
                let mut tally = PixelTally::new(p.max_scatter, n_detectors);
                if self.cancel.load(Ordering::Relaxed) {
                    return tally;
                }
                let i = idx % nx;
                let j = idx / nx;
                let offset = DVec3::new(
                    p.x_range.0 + i as f64 * p.step,
                    0.0,
                    p.z_range.0 + j as f64 * p.step,
                );
                let view = scene.at_offset(offset);
                let mut rng = RayRng::for_pixel(p.seed, idx as u64);

                for _ in 0..p.n_rays {
                    let mut ray = source.sample_ray(&mut rng);
                    match trace_ray(
                        &mut ray,
                        &view,
                        p.max_scatter,
                        p.plate_first,
                        &mut rng,
                        &mut tally.diagnostics,
                    ) {
                        RayFate::Detected { aperture, scatters } => {
                            tally.by_scatter[(scatters - 1) as usize] += 1;
                            tally.by_aperture[(aperture - 1) as usize] += 1;
                        }
                        RayFate::Killed => tally.killed += 1,
                        RayFate::Escaped => {}
                    }
                }

                if let Some(effuse_source) = effuse {
                    for _ in 0..p.n_effuse {
                        let mut ray = effuse_source.sample_ray(&mut rng);
                        if let RayFate::Detected { .. } = trace_ray(
                            &mut ray,
                            &view,
                            p.max_scatter,
                            p.plate_first,
                            &mut rng,
                            &mut tally.diagnostics,
                        ) {
                            tally.effuse += 1;
                        }
                    }
                }

                pb.inc(1);
                tally
            })
            .collect();

        pb.finish();
        if self.cancel.load(Ordering::Relaxed) {
            return Err(ScanError::Cancelled);
        }

        let elapsed = start.elapsed();
        info!("Scan traced in {:.2?}", elapsed);

        // Reduce the per-pixel tallies into the output arrays; every write
        // lands in a distinct cell.
        let mut result = ScanResult {
            nx,
            nz,
            max_scatter: p.max_scatter,
            n_detectors,
            counters: vec![0; p.max_scatter as usize * npix],
            detected: vec![0; n_detectors * npix],
            killed: vec![0; npix],
            effuse: vec![0; npix],
            anomalies: vec![0; npix],
            diagnostics: Diagnostics::default(),
            x_range: p.x_range,
            z_range: p.z_range,
            step: p.step,
            n_rays: p.n_rays,
            elapsed,
        };
        for (idx, tally) in tallies.iter().enumerate() {
            for (k, &count) in tally.by_scatter.iter().enumerate() {
                result.counters[k * npix + idx] = count;
            }
            for (det, &count) in tally.by_aperture.iter().enumerate() {
                result.detected[det * npix + idx] = count;
            }
            result.killed[idx] = tally.killed;
            result.effuse[idx] = tally.effuse;
            result.anomalies[idx] = tally.diagnostics.total();
            result.diagnostics.merge(&tally.diagnostics);
        }
        Ok(result)
    }
}
