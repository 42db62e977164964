//! Parameter-file parsing and scene assembly.
//!
//! The input is a line-oriented `Key: Value` text file; `%` starts a comment
//! line. Unknown keys are ignored with a warning, malformed lines and
//! invalid values abort before any tracing starts.

use std::path::Path;

use glam::{DVec2, DVec3};
use log::warn;

use crate::error::ConfigError;
use crate::material::Scattering;
use crate::plate::{Aperture, BackWall};
use crate::scan::ScanParams;
use crate::scene::{Plate, Scene};
use crate::source::{Source, SourceModel};
use crate::sphere::AnalytSphere;
use crate::surface::TriangleSurface;

/// Raster pattern of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// 2D raster over the configured x and z ranges.
    Rectangular,
    /// One rectangular scan per configured rotation angle.
    Rotations,
    /// A single pixel at the scan origin.
    SinglePixel,
    /// 1D scan along x.
    Line,
}

/// What stands in for the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Generated flat square.
    Flat,
    /// Flat square with the analytic sphere resting on it.
    Sphere,
    /// Caller-supplied mesh (library API only).
    Custom,
    /// Flat sample imaged by four symmetric detectors.
    PhotoStereo,
}

/// Which scattering law the whole sample uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScatterKind {
    Specular,
    Cosine,
    Uniform,
    Broadened,
    Mixed,
}

/// Everything the parameter file can configure, with defaults filled in.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    /// Pinhole-plate to sample working distance (mm).
    pub working_dist: f64,
    /// Beam incidence angle (degrees).
    pub incidence_deg: f64,
    /// Raster pattern.
    pub scan_type: ScanType,
    /// Number of detector apertures.
    pub detector_count: usize,
    /// Aperture centres on the plate plane.
    pub det_centres: Vec<DVec2>,
    /// Aperture full axes; a single entry is shared by all detectors.
    pub det_axes: Vec<DVec2>,
    /// Rotation angles (degrees) for `rotations` scans.
    pub rot_angles_deg: Vec<f64>,
    /// Pinhole plate model name; informational, the back-wall model is used.
    pub pinhole_model: String,
    /// Rays per pixel.
    pub n_rays: u32,
    /// Pinhole radius (mm).
    pub pinhole_radius: f64,
    /// Main-beam angular model.
    pub source_model: ConfiguredSource,
    /// Angular size for the uniform source (radians).
    pub angular_size: f64,
    /// Stddev for the Gaussian source (radians).
    pub source_stddev: f64,
    /// Whether the effusive beam is traced.
    pub effuse: bool,
    /// Effusive beam size relative to the main beam.
    pub effuse_size: f64,
    /// Sample model.
    pub sample_type: SampleType,
    scattering: ScatterKind,
    /// Specular share for the mixed law.
    pub reflectivity: f64,
    /// Stddev (radians) for the broadened-specular law.
    pub scattering_stddev: f64,
    /// Free-text description carried into logs.
    pub sample_description: String,
    /// Plate-sample distance when it differs from the working distance.
    pub dist_to_sample: Option<f64>,
    /// Sphere radius; required by the `sphere` sample type.
    pub sphere_radius: Option<f64>,
    /// Side length of the generated flat sample.
    pub flat_side: f64,
    /// Path of a custom STL; rejected here, meshes enter via the library.
    pub custom_stl: Option<String>,
    /// Pixel separation (mm).
    pub step: f64,
    /// Scan range along x (mm).
    pub x_range: Option<(f64, f64)>,
    /// Scan range along z (mm); the file calls this axis y.
    pub z_range: Option<(f64, f64)>,
    /// Launch the beam vertically from the origin instead of the tilted
    /// pinhole position.
    pub ignore_incidence: bool,
    /// Label used for output file names.
    pub output_label: String,
    /// Scatter budget per ray.
    pub max_scatter: u32,
    /// Radius of the back-wall plate disc.
    pub plate_radius: f64,
    /// Whether the plate disc absorbs rays that miss every aperture.
    pub plate_represent: bool,
    /// Whether the plate participates in the first intersection test.
    pub plate_first: bool,
}

/// Main-beam source model named in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguredSource {
    /// Uniform pencil.
    Uniform,
    /// Gaussian spread.
    Gaussian,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            working_dist: 2.1,
            incidence_deg: 45.0,
            scan_type: ScanType::SinglePixel,
            detector_count: 1,
            det_centres: vec![DVec2::new(2.1, 0.0)],
            det_axes: vec![DVec2::new(1.4, 1.0)],
            rot_angles_deg: Vec::new(),
            pinhole_model: "new".into(),
            n_rays: 5000,
            pinhole_radius: 0.25,
            source_model: ConfiguredSource::Uniform,
            angular_size: 1e-3,
            source_stddev: 1e-3,
            effuse: false,
            effuse_size: 0.0,
            sample_type: SampleType::Flat,
            scattering: ScatterKind::Cosine,
            reflectivity: 0.5,
            scattering_stddev: 0.1,
            sample_description: String::new(),
            dist_to_sample: None,
            sphere_radius: None,
            flat_side: 8.0,
            custom_stl: None,
            step: 0.01,
            x_range: None,
            z_range: None,
            ignore_incidence: false,
            output_label: "scan".into(),
            max_scatter: 20,
            plate_radius: 4.0,
            plate_represent: true,
            plate_first: false,
        }
    }
}

impl SimulationParams {
    /// Read and parse a parameter file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse parameter text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut p = Self::default();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(ConfigError::MalformedLine {
                    line: n + 1,
                    text: line.to_string(),
                });
            };
            p.apply(key.trim(), value.trim())?;
        }
        p.check()?;
        Ok(p)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key.to_lowercase().as_str() {
            "working distance" => self.working_dist = float("Working distance", value)?,
            "incidence angle" => self.incidence_deg = float("Incidence angle", value)?,
            "scan type" => {
                self.scan_type = match value.to_lowercase().as_str() {
                    "rectangular" => ScanType::Rectangular,
                    "rotations" => ScanType::Rotations,
                    "single pixel" => ScanType::SinglePixel,
                    "line" => ScanType::Line,
                    _ => return Err(invalid("Scan type", value, "unknown scan type")),
                }
            }
            "detector count" => {
                self.detector_count = float("Detector count", value)? as usize;
            }
            "detector full axes" => self.det_axes = pairs("Detector full axes", value)?,
            "detector centres" => self.det_centres = pairs("Detector centres", value)?,
            "rotation angles" => self.rot_angles_deg = numbers("Rotation angles", value)?,
            "stl pinhole model" => self.pinhole_model = value.to_string(),
            "ray count" => self.n_rays = float("Ray count", value)? as u32,
            "pinhole radius" => self.pinhole_radius = float("Pinhole radius", value)?,
            "source model" => {
                self.source_model = match value.to_lowercase().as_str() {
                    "uniform" => ConfiguredSource::Uniform,
                    "gaussian" => ConfiguredSource::Gaussian,
                    _ => return Err(invalid("Source model", value, "unknown source model")),
                }
            }
            "angular source size" => self.angular_size = float("Angular source size", value)?,
            "source standard deviation" => {
                self.source_stddev = float("Source standard deviation", value)?
            }
            "effuse beam" => self.effuse = switch("Effuse beam", value)?,
            "effuse size" => self.effuse_size = float("Effuse size", value)?,
            "sample type" => {
                self.sample_type = match value.to_lowercase().as_str() {
                    "flat" => SampleType::Flat,
                    "sphere" => SampleType::Sphere,
                    "custom" => SampleType::Custom,
                    "photostereo" => SampleType::PhotoStereo,
                    _ => return Err(invalid("Sample type", value, "unknown sample type")),
                }
            }
            "scattering" => {
                self.scattering = match value.to_lowercase().as_str() {
                    "specular" => ScatterKind::Specular,
                    "cosine" => ScatterKind::Cosine,
                    "uniform" => ScatterKind::Uniform,
                    "broadened" => ScatterKind::Broadened,
                    "mixed" => ScatterKind::Mixed,
                    _ => return Err(invalid("Scattering", value, "unknown scattering law")),
                }
            }
            "reflectivity" => self.reflectivity = float("Reflectivity", value)?,
            "scattering standard deviation" => {
                self.scattering_stddev = float("Scattering standard deviation", value)?
            }
            "sample description" => self.sample_description = value.to_string(),
            "distance to sample" => {
                self.dist_to_sample = Some(float("Distance to sample", value)?)
            }
            "sphere radius" => self.sphere_radius = Some(float("Sphere radius", value)?),
            "flat side length" => self.flat_side = float("Flat side length", value)?,
            "custom stl path" => self.custom_stl = Some(value.to_string()),
            "manual alignment" => {
                if switch("Manual alignment", value)? {
                    warn!("Manual alignment is not supported; using the computed beam geometry");
                }
            }
            "pixel separation" => self.step = float("Pixel separation", value)?,
            "scan range x" => self.x_range = Some(pair("Scan range x", value)?),
            "scan range y" => self.z_range = Some(pair("Scan range y", value)?),
            "ignore incidence angle" => {
                self.ignore_incidence = switch("Ignore incidence angle", value)?
            }
            "output label" => self.output_label = value.to_string(),
            "recompile" => {
                // Meaningful only for the MATLAB/mex tooling this replaces.
                let _ = switch("Recompile", value)?;
            }
            "maximum scattering events" => {
                self.max_scatter = float("Maximum scattering events", value)? as u32
            }
            "plate radius" => self.plate_radius = float("Plate radius", value)?,
            "plate representation" => self.plate_represent = switch("Plate representation", value)?,
            "pinhole plate in first scatter" => {
                self.plate_first = switch("Pinhole plate in first scatter", value)?
            }
            _ => warn!("ignoring unknown parameter `{key}`"),
        }
        Ok(())
    }

    /// Cross-field validation, run once after parsing.
    fn check(&mut self) -> Result<(), ConfigError> {
        if self.det_centres.len() != self.detector_count {
            return Err(ConfigError::Contradiction(format!(
                "detector count is {} but {} centres are given",
                self.detector_count,
                self.det_centres.len()
            )));
        }
        if self.det_axes.len() == 1 && self.detector_count > 1 {
            self.det_axes = vec![self.det_axes[0]; self.detector_count];
        }
        if self.det_axes.len() != self.detector_count {
            return Err(ConfigError::Contradiction(format!(
                "detector count is {} but {} axes pairs are given",
                self.detector_count,
                self.det_axes.len()
            )));
        }
        if self.scan_type == ScanType::Rotations && self.rot_angles_deg.is_empty() {
            return Err(ConfigError::Contradiction(
                "scan type `rotations` needs at least one rotation angle".into(),
            ));
        }
        if self.sample_type == SampleType::PhotoStereo && self.detector_count != 4 {
            return Err(ConfigError::Contradiction(format!(
                "photoStereo imaging needs 4 detectors, got {}",
                self.detector_count
            )));
        }
        if self.effuse && self.effuse_size <= 0.0 {
            return Err(ConfigError::Contradiction(
                "effuse beam is on but its relative size is not positive".into(),
            ));
        }
        if self.n_rays == 0 {
            return Err(ConfigError::InvalidValue {
                key: "Ray count",
                value: "0".into(),
                reason: "at least one ray per pixel is required".into(),
            });
        }
        Ok(())
    }

    /// Plate-sample distance in effect.
    pub fn sample_distance(&self) -> f64 {
        self.dist_to_sample.unwrap_or(self.working_dist)
    }

    /// The sample scattering law the file asked for.
    pub fn sample_scattering(&self) -> Result<Scattering, ConfigError> {
        match self.scattering {
            ScatterKind::Specular => Ok(Scattering::Specular),
            ScatterKind::Cosine => Ok(Scattering::Cosine),
            ScatterKind::Uniform => Ok(Scattering::Uniform),
            ScatterKind::Broadened => {
                if self.scattering_stddev < 0.0 {
                    Err(invalid(
                        "Scattering standard deviation",
                        &self.scattering_stddev.to_string(),
                        "must be non-negative",
                    ))
                } else {
                    Ok(Scattering::Broadened {
                        sigma: self.scattering_stddev,
                    })
                }
            }
            ScatterKind::Mixed => {
                if self.reflectivity <= 0.0 || self.reflectivity >= 1.0 {
                    Err(invalid(
                        "Reflectivity",
                        &self.reflectivity.to_string(),
                        "mixed scattering needs a reflectivity strictly inside (0, 1)",
                    ))
                } else {
                    // Reflectivity is the specular share.
                    Ok(Scattering::Mixed {
                        diffuse: 1.0 - self.reflectivity,
                    })
                }
            }
        }
    }

    /// Assemble the scene the file describes.
    pub fn build_scene(&self) -> Result<Scene, ConfigError> {
        let scattering = self.sample_scattering()?;
        let dist = self.sample_distance();

        let (sample, sphere) = match self.sample_type {
            SampleType::Flat | SampleType::PhotoStereo => (
                TriangleSurface::flat_square(self.flat_side, -dist, scattering),
                None,
            ),
            SampleType::Sphere => {
                let radius = self
                    .sphere_radius
                    .ok_or(ConfigError::MissingKey("Sphere radius"))?;
                let sphere = AnalytSphere::new(
                    DVec3::new(0.0, -dist + radius, 0.0),
                    radius,
                    scattering,
                )?;
                (
                    TriangleSurface::flat_square(self.flat_side, -dist, scattering),
                    Some(sphere),
                )
            }
            SampleType::Custom => {
                return Err(ConfigError::Unsupported(
                    "sample type `custom` takes its mesh through the library interface \
                     (TriangleSurface::new with V, F, N, C, P arrays), not an STL path"
                        .into(),
                ));
            }
        };

        let apertures = self
            .det_centres
            .iter()
            .zip(&self.det_axes)
            .enumerate()
            .map(|(i, (&centre, &axes))| Aperture::new(centre, axes, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Scene {
            sample,
            plate: Plate::BackWall(BackWall {
                radius: self.plate_radius,
                plate_represent: self.plate_represent,
            }),
            sphere,
            apertures,
        })
    }

    /// The main-beam source implied by the geometry settings.
    ///
    /// The pinhole sits in the plate plane, positioned so the mean beam
    /// strikes the sample at the scan origin.
    pub fn build_source(&self) -> Source {
        let model = match self.source_model {
            ConfiguredSource::Uniform => SourceModel::Uniform {
                angular_size: self.angular_size,
            },
            ConfiguredSource::Gaussian => SourceModel::Gaussian {
                stddev: self.source_stddev,
            },
        };
        let (centre, direction) = if self.ignore_incidence {
            (DVec3::ZERO, DVec3::new(0.0, -1.0, 0.0))
        } else {
            let theta = self.incidence_deg.to_radians();
            (
                DVec3::new(-self.sample_distance() * theta.tan(), 0.0, 0.0),
                DVec3::new(theta.sin(), -theta.cos(), 0.0),
            )
        };
        Source::new(centre, direction, self.pinhole_radius, model)
    }

    /// The effusive source, when enabled.
    pub fn effuse_source(&self) -> Option<Source> {
        self.effuse.then(|| {
            let main = self.build_source();
            Source::new(main.centre, main.direction, main.radius, SourceModel::Effuse)
        })
    }

    /// Effusive rays per pixel.
    pub fn n_effuse(&self) -> u32 {
        if self.effuse {
            (self.effuse_size * self.n_rays as f64).round() as u32
        } else {
            0
        }
    }

    /// Driver parameters for this configuration.
    pub fn scan_params(&self, seed: u64) -> Result<ScanParams, ConfigError> {
        let (x_range, z_range) = match self.scan_type {
            ScanType::Rectangular | ScanType::Rotations => (
                self.x_range.ok_or(ConfigError::MissingKey("Scan range x"))?,
                self.z_range.ok_or(ConfigError::MissingKey("Scan range y"))?,
            ),
            ScanType::Line => {
                let x = self.x_range.ok_or(ConfigError::MissingKey("Scan range x"))?;
                let z = self.z_range.map_or(0.0, |r| r.0);
                (x, (z, z))
            }
            ScanType::SinglePixel => ((0.0, 0.0), (0.0, 0.0)),
        };
        Ok(ScanParams {
            x_range,
            z_range,
            step: self.step,
            n_rays: self.n_rays,
            n_effuse: self.n_effuse(),
            max_scatter: self.max_scatter,
            seed,
            plate_first: self.plate_first,
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn float(key: &'static str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|e: std::num::ParseFloatError| invalid(key, value, &e.to_string()))
}

/// On/Off, yes/no, true/false and 1/0 are all accepted.
fn switch(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Ok(true),
        "off" | "no" | "false" | "0" => Ok(false),
        _ => Err(invalid(key, value, "expected On/Off")),
    }
}

/// All numbers in the value, ignoring parentheses and separators.
fn numbers(key: &'static str, value: &str) -> Result<Vec<f64>, ConfigError> {
    value
        .split(|c: char| c == '(' || c == ')' || c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|e: std::num::ParseFloatError| invalid(key, value, &e.to_string()))
        })
        .collect()
}

fn pair(key: &'static str, value: &str) -> Result<(f64, f64), ConfigError> {
    match numbers(key, value)?.as_slice() {
        [a, b] => Ok((*a, *b)),
        other => Err(invalid(
            key,
            value,
            &format!("expected a pair, got {} values", other.len()),
        )),
    }
}

fn pairs(key: &'static str, value: &str) -> Result<Vec<DVec2>, ConfigError> {
    let nums = numbers(key, value)?;
    if nums.is_empty() || nums.len() % 2 != 0 {
        return Err(invalid(
            key,
            value,
            &format!("expected pairs of values, got {}", nums.len()),
        ));
    }
    Ok(nums.chunks(2).map(|c| DVec2::new(c[0], c[1])).collect())
}
