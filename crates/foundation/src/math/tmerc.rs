//! Transverse Mercator via Krüger's series to sixth order in `n`.
//!
//! Accurate to well below a millimeter within a few thousand kilometers of
//! the central meridian, which covers every UTM zone.

use super::Ellipsoid;

#[derive(Debug, Clone, PartialEq)]
pub struct TransverseMercator {
    pub lon0_rad: f64,
    pub k0: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    e: f64,
    e2: f64,
    /// Rectifying radius.
    big_a: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

impl TransverseMercator {
    pub fn new(
        ellipsoid: Ellipsoid,
        lon0_rad: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = ellipsoid.f;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let big_a = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0 - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1983433.0 * n6 / 1935360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0 + 15061.0 * n5 / 26880.0
                + 167603.0 * n6 / 181440.0,
            49561.0 * n4 / 161280.0 - 179.0 * n5 / 168.0 + 6601661.0 * n6 / 7257600.0,
            34729.0 * n5 / 80640.0 - 3418889.0 * n6 / 1995840.0,
            212378941.0 * n6 / 319334400.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1118711.0 * n6 / 3870720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0 + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161280.0 - 11.0 * n5 / 504.0 - 830251.0 * n6 / 7257600.0,
            4583.0 * n5 / 161280.0 - 108847.0 * n6 / 3991680.0,
            20648693.0 * n6 / 638668800.0,
        ];

        let e2 = ellipsoid.e2();
        Self {
            lon0_rad,
            k0,
            false_easting,
            false_northing,
            e: e2.sqrt(),
            e2,
            big_a,
            alpha,
            beta,
        }
    }

    /// UTM zone on WGS84. `zone` must be in `1..=60`.
    pub fn utm(zone: u8, north: bool) -> Self {
        let lon0 = (f64::from(zone) * 6.0 - 183.0).to_radians();
        let false_northing = if north { 0.0 } else { 10_000_000.0 };
        Self::new(Ellipsoid::WGS84, lon0, 0.9996, 500_000.0, false_northing)
    }

    /// Geodetic latitude/longitude (radians) to easting/northing (meters).
    pub fn forward(&self, lat_rad: f64, lon_rad: f64) -> (f64, f64) {
        let dlon = lon_rad - self.lon0_rad;
        let e = self.e;

        let tau = lat_rad.tan();
        let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        let tau_p = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();

        let (sin_dlon, cos_dlon) = dlon.sin_cos();
        let xi_p = tau_p.atan2(cos_dlon);
        let eta_p = (sin_dlon / (tau_p * tau_p + cos_dlon * cos_dlon).sqrt()).asinh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let scale = self.k0 * self.big_a;
        (
            self.false_easting + scale * eta,
            self.false_northing + scale * xi,
        )
    }

    /// Easting/northing (meters) to geodetic latitude/longitude (radians).
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let scale = self.k0 * self.big_a;
        let xi = (northing - self.false_northing) / scale;
        let eta = (easting - self.false_easting) / scale;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let sinh_eta_p = eta_p.sinh();
        let (sin_xi_p, cos_xi_p) = xi_p.sin_cos();
        let tau_p = sin_xi_p / (sinh_eta_p * sinh_eta_p + cos_xi_p * cos_xi_p).sqrt();

        let e = self.e;
        let e2 = self.e2;
        let mut tau = tau_p;
        for _ in 0..16 {
            let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
            let tau_i_p = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();
            let delta = (tau_p - tau_i_p) / (1.0 + tau_i_p * tau_i_p).sqrt()
                * (1.0 + (1.0 - e2) * tau * tau)
                / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
            tau += delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }

        let lat = tau.atan();
        let lon = self.lon0_rad + sinh_eta_p.atan2(cos_xi_p);
        (lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::TransverseMercator;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn central_meridian_on_equator_is_false_origin() {
        let tm = TransverseMercator::utm(31, true);
        let (e, n) = tm.forward(0.0, 3f64.to_radians());
        assert_close(e, 500_000.0, 1e-6);
        assert_close(n, 0.0, 1e-6);
    }

    #[test]
    fn easting_is_symmetric_about_central_meridian() {
        let tm = TransverseMercator::utm(32, true);
        let lat = 47f64.to_radians();
        let (e_west, n_west) = tm.forward(lat, 6f64.to_radians());
        let (e_east, n_east) = tm.forward(lat, 12f64.to_radians());
        assert_close(e_west - 500_000.0, -(e_east - 500_000.0), 1e-6);
        assert_close(n_west, n_east, 1e-6);
    }

    #[test]
    fn scale_on_central_meridian_is_k0() {
        // Meridian arc from the equator to 1° north at the central meridian, scaled by k0.
        let tm = TransverseMercator::utm(33, true);
        let (_, n) = tm.forward(1f64.to_radians(), 15f64.to_radians());
        assert_close(n, 0.9996 * 110_574.4, 1.0);
    }

    #[test]
    fn inverse_recovers_forward() {
        let tm = TransverseMercator::utm(18, false);
        let (lat, lon) = (-12.05f64.to_radians(), -77.04f64.to_radians());
        let (e, n) = tm.forward(lat, lon);
        let (lat_rt, lon_rt) = tm.inverse(e, n);
        assert_close(lat_rt, lat, 1e-12);
        assert_close(lon_rt, lon, 1e-12);
    }
}
