use std::fmt::Display;

use auto_ops::{impl_op_ex, impl_op_ex_commutative};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::Float;

/// A three-vector used for positions, production points, and displacements.
///
/// Coordinates are in the input distance unit (millimeters for detector
/// positions throughout this crate).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vec3(Vector3<Float>);

impl Default for Vec3 {
    fn default() -> Self {
        Self(Vector3::zeros())
    }
}

impl Vec3 {
    /// Create a new [`Vec3`] from Cartesian components.
    pub fn new(x: Float, y: Float, z: Float) -> Self {
        Self(Vector3::new(x, y, z))
    }
    /// The x-component.
    pub fn x(&self) -> Float {
        self.0.x
    }
    /// The y-component.
    pub fn y(&self) -> Float {
        self.0.y
    }
    /// The z-component.
    pub fn z(&self) -> Float {
        self.0.z
    }
    /// The dot product.
    pub fn dot(&self, other: &Self) -> Float {
        self.0.dot(&other.0)
    }
    /// The squared magnitude.
    pub fn mag2(&self) -> Float {
        self.dot(self)
    }
    /// The magnitude (Euclidean norm).
    pub fn mag(&self) -> Float {
        self.0.norm()
    }
    /// The Euclidean distance to another point.
    pub fn distance(&self, other: &Self) -> Float {
        (self - other).mag()
    }
    /// The cosine of the polar angle.
    pub fn costheta(&self) -> Float {
        self.z() / self.mag()
    }
    /// The azimuthal angle.
    pub fn phi(&self) -> Float {
        self.y().atan2(self.x())
    }
}

impl_op_ex!(+ |a: &Vec3, b: &Vec3| -> Vec3 { Vec3(a.0 + b.0) });
impl_op_ex!(-|a: &Vec3, b: &Vec3| -> Vec3 { Vec3(a.0 - b.0) });
impl_op_ex!(-|a: &Vec3| -> Vec3 { Vec3(-a.0) });
impl_op_ex_commutative!(*|a: &Vec3, b: &Float| -> Vec3 { Vec3(a.0 * *b) });

impl Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x(), self.y(), self.z())
    }
}
