//! Voxel-index to patient-space affine derivation.

use std::fmt;

use lin_alg::f64::Vec3;

use crate::error::PrepError;
use crate::stack::SliceStack;

/// A 4x4 homogeneous transform from voxel indices (row, col, slice, 1) to
/// patient-space millimetre coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Affine4([[f64; 4]; 4]);

impl Affine4 {
    pub(crate) fn rows(&self) -> &[[f64; 4]; 4] {
        &self.0
    }

    /// Transform a homogeneous voxel coordinate into patient space.
    pub(crate) fn apply(&self, v: [f64; 4]) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (row, out) in self.0.iter().zip(&mut out) {
            *out = row.iter().zip(v).map(|(m, x)| m * x).sum();
        }
        out
    }
}

impl fmt::Display for Affine4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(
                f,
                "[ {:>10.4} {:>10.4} {:>10.4} {:>10.4} ]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}

/// Derive the voxel-to-patient affine from an ordered slice stack.
///
/// The in-plane columns come from the direction cosines of the first slice
/// scaled by its pixel spacing. The through-plane column is the plane
/// normal scaled by the spacing between the first two slices, so at least
/// two slices are required. The translation is the position of the first
/// (lowest-z) slice.
pub(crate) fn build_affine(stack: &SliceStack) -> Result<Affine4, PrepError> {
    let slices = stack.slices();
    if slices.len() < 2 {
        return Err(PrepError::NotEnoughSlices(slices.len()));
    }

    let first = &slices[0];
    let [cx, cy, cz, rx, ry, rz] = first.orientation;
    let col_dir = Vec3::new(cx, cy, cz);
    let row_dir = Vec3::new(rx, ry, rz);
    let normal = row_dir.cross(col_dir);

    let [dr, dc] = first.pixel_spacing;
    let ds = (slices[0].position[2] - slices[1].position[2]).abs();
    let [sx, sy, sz] = first.position;

    Ok(Affine4([
        [row_dir.x * dr, col_dir.x * dc, normal.x * ds, sx],
        [row_dir.y * dr, col_dir.y * dc, normal.y * ds, sy],
        [row_dir.z * dr, col_dir.z * dc, normal.z * ds, sz],
        [0.0, 0.0, 0.0, 1.0],
    ]))
}
