use serde::{Deserialize, Serialize};

use super::Ecef;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);
/// WGS84 second eccentricity squared.
pub const WGS84_EP2: f64 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);

/// Reference ellipsoid given by semi-major axis and flattening.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ellipsoid {
    pub a: f64,
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Self = Self {
        a: WGS84_A,
        f: WGS84_F,
    };

    /// Bessel 1841, the datum ellipsoid of the Swiss CH1903 frames.
    pub const BESSEL_1841: Self = Self {
        a: 6_377_397.155,
        f: 1.0 / 299.152_812_8,
    };

    pub fn b(&self) -> f64 {
        self.a * (1.0 - self.f)
    }

    pub fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    pub fn ep2(&self) -> f64 {
        let b = self.b();
        (self.a * self.a - b * b) / (b * b)
    }

    /// Prime vertical radius of curvature at `lat_rad`.
    pub fn prime_vertical_radius(&self, lat_rad: f64) -> f64 {
        let s = lat_rad.sin();
        self.a / (1.0 - self.e2() * s * s).sqrt()
    }

    pub fn geodetic_to_ecef(&self, geo: Geodetic) -> Ecef {
        let sin_lat = geo.lat_rad.sin();
        let cos_lat = geo.lat_rad.cos();
        let sin_lon = geo.lon_rad.sin();
        let cos_lon = geo.lon_rad.cos();

        let n = self.prime_vertical_radius(geo.lat_rad);
        let x = (n + geo.alt_m) * cos_lat * cos_lon;
        let y = (n + geo.alt_m) * cos_lat * sin_lon;
        let z = (n * (1.0 - self.e2()) + geo.alt_m) * sin_lat;

        Ecef::new(x, y, z)
    }

    /// Bowring's closed-form inversion.
    ///
    /// Height uses the projection onto the normal so it stays well-conditioned at the poles.
    pub fn ecef_to_geodetic(&self, ecef: Ecef) -> Geodetic {
        let a = self.a;
        let b = self.b();
        let e2 = self.e2();
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
        let lon = ecef.y.atan2(ecef.x);

        let theta = (ecef.z * a).atan2(p * b);
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        let lat = (ecef.z + self.ep2() * b * sin_theta * sin_theta * sin_theta)
            .atan2(p - e2 * a * cos_theta * cos_theta * cos_theta);

        let sin_lat = lat.sin();
        let alt = p * lat.cos() + ecef.z * sin_lat - a * (1.0 - e2 * sin_lat * sin_lat).sqrt();

        Geodetic::new(lat, lon, alt)
    }
}

/// Geodetic coordinates in radians and meters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self {
            lat_rad,
            lon_rad,
            alt_m,
        }
    }

    pub fn from_degrees(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self::new(lat_deg.to_radians(), lon_deg.to_radians(), alt_m)
    }
}

pub fn geodetic_to_ecef(geo: Geodetic) -> Ecef {
    Ellipsoid::WGS84.geodetic_to_ecef(geo)
}

pub fn ecef_to_geodetic(ecef: Ecef) -> Geodetic {
    Ellipsoid::WGS84.ecef_to_geodetic(ecef)
}

#[cfg(test)]
mod tests {
    use super::{Ellipsoid, Geodetic, WGS84_A, WGS84_B, ecef_to_geodetic, geodetic_to_ecef};
    use crate::math::Ecef;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn geodetic_to_ecef_equator_prime_meridian() {
        let geo = Geodetic::new(0.0, 0.0, 0.0);
        let ecef = geodetic_to_ecef(geo);
        assert_close(ecef.x, WGS84_A, 1e-6);
        assert_close(ecef.y, 0.0, 1e-6);
        assert_close(ecef.z, 0.0, 1e-6);
    }

    #[test]
    fn geodetic_to_ecef_equator_90e() {
        let geo = Geodetic::new(0.0, std::f64::consts::FRAC_PI_2, 0.0);
        let ecef = geodetic_to_ecef(geo);
        assert_close(ecef.x, 0.0, 1e-6);
        assert_close(ecef.y, WGS84_A, 1e-6);
        assert_close(ecef.z, 0.0, 1e-6);
    }

    #[test]
    fn round_trip_geodetic_ecef() {
        let geo = Geodetic::new(
            std::f64::consts::FRAC_PI_6,
            -std::f64::consts::FRAC_PI_3,
            120.0,
        );
        let ecef = geodetic_to_ecef(geo);
        let geo_rt = ecef_to_geodetic(ecef);
        assert_close(geo_rt.lat_rad, geo.lat_rad, 1e-9);
        assert_close(geo_rt.lon_rad, geo.lon_rad, 1e-9);
        assert_close(geo_rt.alt_m, geo.alt_m, 1e-6);
    }

    #[test]
    fn pole_height_is_measured_along_the_axis() {
        let geo = ecef_to_geodetic(Ecef::new(0.0, 0.0, WGS84_B + 250.0));
        assert_close(geo.lat_rad, std::f64::consts::FRAC_PI_2, 1e-12);
        assert_close(geo.alt_m, 250.0, 1e-6);
    }

    #[test]
    fn bessel_round_trip() {
        let bessel = Ellipsoid::BESSEL_1841;
        let geo = Geodetic::from_degrees(46.95, 7.44, 540.0);
        let rt = bessel.ecef_to_geodetic(bessel.geodetic_to_ecef(geo));
        assert_close(rt.lat_rad, geo.lat_rad, 1e-11);
        assert_close(rt.lon_rad, geo.lon_rad, 1e-11);
        assert_close(rt.alt_m, geo.alt_m, 1e-5);
    }
}
