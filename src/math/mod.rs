mod vector;
mod matrix;
mod transform;
mod aabb;

pub use aabb::Aabb;
pub use matrix::Matrix3;
pub use transform::Transform;
pub use vector::Vector3;

/// Constant for a very small number, used for comparisons
pub const EPSILON: f32 = 1.0e-6;

/// Squared-length threshold below which a direction is treated as degenerate
/// and replaced by a deterministic fallback axis instead of being normalized.
pub const DEGENERATE_LENGTH2: f32 = 1.0e-3;

/// Returns true if the two floating point values are approximately equal
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Returns true if the value is approximately zero
#[inline]
pub fn approx_zero(a: f32) -> bool {
    a.abs() < EPSILON
}

/// Clamps a value between a minimum and maximum value
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}
