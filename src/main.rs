use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::info;

mod cli;

use cli::Args;
use shem_trace::config::{ScanType, SimulationParams};
use shem_trace::output::{save_detector_map, save_effuse_map, save_total_map};
use shem_trace::scan::{Scan, ScanResult};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(args.debug_level.into())
        .init();
    info!("shem-trace {}", env!("CARGO_PKG_VERSION"));

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure the worker pool")?;
    }

    let mut params = SimulationParams::load(Path::new(&args.config))
        .with_context(|| format!("invalid parameter file `{}`", args.config))?;
    if let Some(rays) = args.rays {
        params.n_rays = rays;
    }
    if !params.sample_description.is_empty() {
        info!("Sample: {}", params.sample_description);
    }

    let scene = params.build_scene().context("cannot build the scene")?;
    let source = params.build_source();
    let effuse = params.effuse_source();
    let scan_params = params.scan_params(args.seed)?;

    let out_dir = PathBuf::from(&args.output_dir);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("cannot create output directory `{}`", out_dir.display()))?;

    if params.scan_type == ScanType::Rotations {
        for &angle in &params.rot_angles_deg {
            info!("Scanning at sample rotation {angle} degrees");
            let mut rotated = scene.clone();
            rotated.sample = scene.sample.rotated_about_y(angle.to_radians());
            let result = Scan::new(scan_params).run(&rotated, &source, effuse.as_ref())?;
            let label = format!("{}_rot{angle:.0}", params.output_label);
            report(&result, &params, &out_dir, &label);
        }
    } else {
        let result = Scan::new(scan_params).run(&scene, &source, effuse.as_ref())?;
        report(&result, &params, &out_dir, &params.output_label);
    }

    Ok(())
}

/// Log the run totals and write the count maps.
fn report(result: &ScanResult, params: &SimulationParams, out_dir: &Path, label: &str) {
    let npix = result.nx * result.nz;
    let detected: u32 = (0..result.n_detectors)
        .map(|d| result.detector_total(d))
        .sum();
    let killed: u32 = result.killed.iter().sum();
    let effused: u32 = result.effuse.iter().sum();
    let anomalies = result.diagnostics.total();
    info!(
        "{} pixels, {} rays each: {} detected, {} killed, {} effuse detections in {:.2?}",
        npix, result.n_rays, detected, killed, effused, result.elapsed
    );
    if anomalies > 0 {
        info!("{anomalies} rays hit locally-handled numerical anomalies");
    }

    save_total_map(result, &out_dir.join(format!("{label}.png")));
    if result.n_detectors > 1 {
        for d in 0..result.n_detectors {
            save_detector_map(result, d, &out_dir.join(format!("{label}_det{}.png", d + 1)));
        }
    }
    if params.effuse {
        save_effuse_map(result, &out_dir.join(format!("{label}_effuse.png")));
    }
}
