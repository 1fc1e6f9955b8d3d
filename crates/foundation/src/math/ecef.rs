use serde::{Deserialize, Serialize};

use super::Vec3;

/// Earth-centered, Earth-fixed Cartesian coordinates (meters).
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn as_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn magnitude(self) -> f64 {
        self.to_vec3().length()
    }

    pub fn is_finite(self) -> bool {
        self.to_vec3().is_finite()
    }
}

impl From<Vec3> for Ecef {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}
