//! Swiss oblique Mercator (CH1903 / CH1903+) on the Bessel 1841 ellipsoid.

use super::{Ecef, Ellipsoid, Geodetic, Vec3};

const FRAC_PI_4: f64 = std::f64::consts::FRAC_PI_4;

/// Projection center: the old observatory in Bern.
const LAT0_DEG: f64 = 46.952_405_555_555_6;
const LON0_DEG: f64 = 7.439_583_333_333_33;

/// CH1903 → WGS84 geocentric translation (meters).
pub const CH1903_TO_WGS84: Vec3 = Vec3::new(674.374, 15.056, 405.346);

#[derive(Debug, Clone, PartialEq)]
pub struct SwissObliqueMercator {
    pub false_easting: f64,
    pub false_northing: f64,
    lon0_rad: f64,
    e: f64,
    radius: f64,
    alpha: f64,
    b0: f64,
    k: f64,
}

impl SwissObliqueMercator {
    pub fn new(false_easting: f64, false_northing: f64) -> Self {
        let ellipsoid = Ellipsoid::BESSEL_1841;
        let phi0 = LAT0_DEG.to_radians();
        let sin_phi0 = phi0.sin();
        let e2 = ellipsoid.e2();
        let e = e2.sqrt();

        let radius = ellipsoid.a * (1.0 - e2).sqrt() / (1.0 - e2 * sin_phi0 * sin_phi0);
        let alpha = (1.0 + e2 / (1.0 - e2) * phi0.cos().powi(4)).sqrt();
        let b0 = (sin_phi0 / alpha).asin();
        let k1 = (FRAC_PI_4 + b0 / 2.0).tan().ln();
        let k2 = (FRAC_PI_4 + phi0 / 2.0).tan().ln();
        let k3 = ((1.0 + e * sin_phi0) / (1.0 - e * sin_phi0)).ln();
        let k = k1 - alpha * k2 + alpha * e / 2.0 * k3;

        Self {
            false_easting,
            false_northing,
            lon0_rad: LON0_DEG.to_radians(),
            e,
            radius,
            alpha,
            b0,
            k,
        }
    }

    /// CH1903+ / LV95 (EPSG:2056).
    pub fn lv95() -> Self {
        Self::new(2_600_000.0, 1_200_000.0)
    }

    /// CH1903 / LV03 (EPSG:21781).
    pub fn lv03() -> Self {
        Self::new(600_000.0, 200_000.0)
    }

    /// Longitude of the projection center (radians).
    pub fn lon0_rad(&self) -> f64 {
        self.lon0_rad
    }

    /// Bessel latitude/longitude (radians) to easting/northing.
    pub fn forward(&self, lat_rad: f64, lon_rad: f64) -> (f64, f64) {
        let e = self.e;
        let sin_lat = lat_rad.sin();
        let sa1 = (FRAC_PI_4 - lat_rad / 2.0).tan().ln();
        let sa2 = e / 2.0 * ((1.0 + e * sin_lat) / (1.0 - e * sin_lat)).ln();
        let s = -self.alpha * (sa1 + sa2) + self.k;
        let b = 2.0 * (s.exp().atan() - FRAC_PI_4);
        let i = self.alpha * (lon_rad - self.lon0_rad);

        let rot_i = (i.sin() / (self.b0.sin() * b.tan() + self.b0.cos() * i.cos())).atan();
        let rot_b = (self.b0.cos() * b.sin() - self.b0.sin() * b.cos() * i.cos()).asin();

        let northing =
            self.radius / 2.0 * ((1.0 + rot_b.sin()) / (1.0 - rot_b.sin())).ln() + self.false_northing;
        let easting = self.radius * rot_i + self.false_easting;
        (easting, northing)
    }

    /// Easting/northing to Bessel latitude/longitude (radians).
    ///
    /// Returns `None` if the latitude iteration does not converge.
    pub fn inverse(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        let y = easting - self.false_easting;
        let x = northing - self.false_northing;
        let rot_i = y / self.radius;
        let rot_b = 2.0 * ((x / self.radius).exp().atan() - FRAC_PI_4);

        let b = (self.b0.cos() * rot_b.sin() + self.b0.sin() * rot_b.cos() * rot_i.cos()).asin();
        let i = (rot_i.sin() / (self.b0.cos() * rot_i.cos() - self.b0.sin() * rot_b.tan())).atan();
        let lon = self.lon0_rad + i / self.alpha;

        let e = self.e;
        let base = ((FRAC_PI_4 + b / 2.0).tan().ln() - self.k) / self.alpha;
        let mut phi = b;
        for _ in 0..30 {
            let s = base + e * (FRAC_PI_4 + (e * phi.sin()).asin() / 2.0).tan().ln();
            let next = 2.0 * s.exp().atan() - std::f64::consts::FRAC_PI_2;
            let done = (next - phi).abs() < 1e-14;
            phi = next;
            if done {
                return Some((phi, lon));
            }
        }
        None
    }
}

/// CH1903 (Bessel) geodetic position to WGS84 ECEF.
pub fn ch1903_to_wgs84_ecef(geo: Geodetic) -> Ecef {
    let local = Ellipsoid::BESSEL_1841.geodetic_to_ecef(geo);
    Ecef::from(local.to_vec3() + CH1903_TO_WGS84)
}

/// WGS84 ECEF to CH1903 (Bessel) geodetic position.
pub fn wgs84_ecef_to_ch1903(ecef: Ecef) -> Geodetic {
    let local = Ecef::from(ecef.to_vec3() - CH1903_TO_WGS84);
    Ellipsoid::BESSEL_1841.ecef_to_geodetic(local)
}

#[cfg(test)]
mod tests {
    use super::{LAT0_DEG, LON0_DEG, SwissObliqueMercator};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn projection_center_maps_to_false_origin() {
        let lv95 = SwissObliqueMercator::lv95();
        let (e, n) = lv95.forward(LAT0_DEG.to_radians(), LON0_DEG.to_radians());
        assert_close(e, 2_600_000.0, 1e-6);
        assert_close(n, 1_200_000.0, 1e-6);
    }

    #[test]
    fn inverse_recovers_forward() {
        let lv03 = SwissObliqueMercator::lv03();
        let (lat, lon) = (47.3769f64.to_radians(), 8.5417f64.to_radians());
        let (e, n) = lv03.forward(lat, lon);
        let (lat_rt, lon_rt) = lv03.inverse(e, n).unwrap();
        assert_close(lat_rt, lat, 1e-12);
        assert_close(lon_rt, lon, 1e-12);
        // Zurich lies north-east of Bern.
        assert!(e > 600_000.0 && n > 200_000.0);
    }
}
