use super::{Ecef, Geodetic, Mat3, Vec3, geodetic_to_ecef};

/// Local East-North-Up coordinates (meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl Enu {
    pub fn new(east: f64, north: f64, up: f64) -> Self {
        Self { east, north, up }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.east, self.north, self.up)
    }
}

/// Rotation taking ENU components at `origin` into ECEF components.
///
/// Columns are the east, north and up unit vectors expressed in ECEF.
pub fn enu_basis(origin: Geodetic) -> Mat3 {
    let (sin_lat, cos_lat) = origin.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = origin.lon_rad.sin_cos();

    let east = Vec3::new(-sin_lon, cos_lon, 0.0);
    let north = Vec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
    let up = Vec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
    Mat3::from_columns(east, north, up)
}

pub fn ecef_to_enu(point: Ecef, origin: Geodetic) -> Enu {
    let origin_ecef = geodetic_to_ecef(origin);
    let d = point.to_vec3() - origin_ecef.to_vec3();
    let local = enu_basis(origin).transpose().mul_vec(d);
    Enu::new(local.x, local.y, local.z)
}

pub fn enu_to_ecef(enu: Enu, origin: Geodetic) -> Ecef {
    let origin_ecef = geodetic_to_ecef(origin);
    let d = enu_basis(origin).mul_vec(enu.to_vec3());
    Ecef::from(origin_ecef.to_vec3() + d)
}

#[cfg(test)]
mod tests {
    use super::{Enu, ecef_to_enu, enu_basis, enu_to_ecef};
    use crate::math::{Geodetic, Vec3, geodetic_to_ecef};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn enu_round_trip_at_equator() {
        let origin = Geodetic::new(0.0, 0.0, 0.0);
        let enu = Enu::new(15.0, -8.0, 2.5);
        let ecef = enu_to_ecef(enu, origin);
        let enu_rt = ecef_to_enu(ecef, origin);

        assert_close(enu_rt.east, enu.east, 1e-9);
        assert_close(enu_rt.north, enu.north, 1e-9);
        assert_close(enu_rt.up, enu.up, 1e-9);
    }

    #[test]
    fn enu_zero_at_origin() {
        let origin = Geodetic::new(0.1, -0.2, 35.0);
        let origin_ecef = geodetic_to_ecef(origin);
        let enu = ecef_to_enu(origin_ecef, origin);
        assert_close(enu.east, 0.0, 1e-9);
        assert_close(enu.north, 0.0, 1e-9);
        assert_close(enu.up, 0.0, 1e-9);
    }

    #[test]
    fn basis_is_right_handed() {
        let m = enu_basis(Geodetic::from_degrees(47.0, 8.5, 0.0));
        let (east, north, up) = (m.column(0), m.column(1), m.column(2));
        let cross = east.cross(north) - up;
        assert!(cross.length() < 1e-12);
        assert_close(up.dot(Vec3::Z), 47f64.to_radians().sin(), 1e-12);
    }
}
