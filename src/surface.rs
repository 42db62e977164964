//! Triangulated surfaces with per-facet scattering.

use glam::DVec3;

use crate::error::GeometryError;
use crate::geometry::NORMAL_TOL;
use crate::material::Scattering;

/// Squared-area floor below which a face counts as degenerate.
const AREA_EPS: f64 = 1e-24;

/// An immutable triangle mesh: vertices, faces, outward unit normals and a
/// scattering law per face.
///
/// Construction copies the caller's raw arrays into owned storage and
/// validates them; every later access is read-only, so a surface can be
/// shared freely across workers. Faces, normals and scattering are stored
/// face-contiguous; vertices keep their xyz components together.
#[derive(Debug, Clone)]
pub struct TriangleSurface {
    vertices: Vec<DVec3>,
    faces: Vec<[usize; 3]>,
    normals: Vec<DVec3>,
    scattering: Vec<Scattering>,
}

impl TriangleSurface {
    /// Build a surface from raw (V, F, N, C, P) views.
    ///
    /// `composition` holds material ids, `parameters` their per-face
    /// parameter. Fails on mismatched lengths, out-of-range indices,
    /// non-unit normals, zero-area faces, or unknown material ids; normals
    /// within tolerance are renormalised to machine precision.
    pub fn new(
        vertices: Vec<DVec3>,
        faces: Vec<[usize; 3]>,
        normals: Vec<DVec3>,
        composition: &[u32],
        parameters: &[f64],
    ) -> Result<Self, GeometryError> {
        if faces.len() != normals.len()
            || faces.len() != composition.len()
            || faces.len() != parameters.len()
        {
            return Err(GeometryError::MismatchedArrays {
                faces: faces.len(),
                normals: normals.len(),
                materials: composition.len().min(parameters.len()),
            });
        }

        for (j, face) in faces.iter().enumerate() {
            for &index in face {
                if index >= vertices.len() {
                    return Err(GeometryError::IndexOutOfRange {
                        face: j,
                        index,
                        n_vertices: vertices.len(),
                    });
                }
            }
            let [ia, ib, ic] = *face;
            let ab = vertices[ib] - vertices[ia];
            let ac = vertices[ic] - vertices[ia];
            if ab.cross(ac).length_squared() < AREA_EPS {
                return Err(GeometryError::ZeroAreaFace { face: j });
            }
        }

        let mut unit_normals = Vec::with_capacity(normals.len());
        for (j, n) in normals.iter().enumerate() {
            let len = n.length();
            if (len - 1.0).abs() > NORMAL_TOL {
                return Err(GeometryError::NonUnitNormal { face: j, len });
            }
            unit_normals.push(*n / len);
        }

        let scattering = composition
            .iter()
            .zip(parameters)
            .map(|(&id, &p)| Scattering::from_id(id, p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vertices,
            faces,
            normals: unit_normals,
            scattering,
        })
    }

    /// A horizontal square of the given side length at height `y`, made of
    /// two triangles with upward normals and a single scattering law.
    ///
    /// This is the generated sample used by the `flat` and `sphere` sample
    /// types.
    pub fn flat_square(side: f64, y: f64, scattering: Scattering) -> Self {
        let h = side / 2.0;
        let vertices = vec![
            DVec3::new(-h, y, -h),
            DVec3::new(h, y, -h),
            DVec3::new(h, y, h),
            DVec3::new(-h, y, h),
        ];
        // Counter-clockwise seen from above.
        let faces = vec![[0, 2, 1], [0, 3, 2]];
        let normals = vec![DVec3::Y, DVec3::Y];
        Self {
            vertices,
            faces,
            normals,
            scattering: vec![scattering; 2],
        }
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Vertices and outward normal of face `j`.
    #[inline]
    pub fn element(&self, j: usize) -> (DVec3, DVec3, DVec3, DVec3) {
        let [ia, ib, ic] = self.faces[j];
        (
            self.vertices[ia],
            self.vertices[ib],
            self.vertices[ic],
            self.normals[j],
        )
    }

    /// Scattering law of face `j`.
    #[inline]
    pub fn scattering(&self, j: usize) -> Scattering {
        self.scattering[j]
    }

    /// Copy of the surface with every vertex shifted by `offset`.
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| *v + offset).collect(),
            faces: self.faces.clone(),
            normals: self.normals.clone(),
            scattering: self.scattering.clone(),
        }
    }

    /// Copy of the surface rotated by `angle` radians about the y axis
    /// through the origin. Normals rotate with the vertices.
    pub fn rotated_about_y(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let rot = |v: DVec3| DVec3::new(cos * v.x + sin * v.z, v.y, -sin * v.x + cos * v.z);
        Self {
            vertices: self.vertices.iter().map(|v| rot(*v)).collect(),
            faces: self.faces.clone(),
            normals: self.normals.iter().map(|n| rot(*n)).collect(),
            scattering: self.scattering.clone(),
        }
    }
}
