use std::fmt;
use std::future::Future;
use std::pin::Pin;

use foundation::math::{Ecef, Ellipsoid, Geodetic};
use tracing::{debug, trace};

use crate::ray::{Camera, Ray, intersect_ellipsoid};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Coarsest fixed level tried by the fallback.
pub const COARSEST_LEVEL: u32 = 0;

#[derive(Debug, Clone, PartialEq)]
pub enum TerrainError {
    /// No tile covering the location is loaded at this level.
    NotLoaded { level: Option<u32> },
    /// The provider returned a non-finite height.
    InvalidHeight,
    Provider(String),
}

impl fmt::Display for TerrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainError::NotLoaded { level: Some(level) } => {
                write!(f, "no terrain tile loaded at level {level}")
            }
            TerrainError::NotLoaded { level: None } => write!(f, "no detailed terrain tile loaded"),
            TerrainError::InvalidHeight => write!(f, "terrain provider returned a non-finite height"),
            TerrainError::Provider(msg) => write!(f, "terrain provider error: {msg}"),
        }
    }
}

impl std::error::Error for TerrainError {}

/// Globe surface the picking tools sample.
pub trait TerrainSurface: Send + Sync {
    fn ellipsoid(&self) -> Ellipsoid {
        Ellipsoid::WGS84
    }

    /// Approximate surface point hit by `ray`.
    fn intersect(&self, ray: &Ray) -> Option<Ecef> {
        intersect_ellipsoid(ray, self.ellipsoid())
    }

    /// Height above the ellipsoid from the most detailed data available.
    fn sample_most_detailed(&self, at: Geodetic) -> BoxFuture<'_, Result<f64, TerrainError>>;

    /// Height above the ellipsoid from tiles at a fixed `level`.
    fn sample_at_level(&self, at: Geodetic, level: u32) -> BoxFuture<'_, Result<f64, TerrainError>>;
}

/// Bare ellipsoid with a constant height. Always resolves.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct EllipsoidTerrain {
    pub height_m: f64,
}

impl TerrainSurface for EllipsoidTerrain {
    fn sample_most_detailed(&self, _at: Geodetic) -> BoxFuture<'_, Result<f64, TerrainError>> {
        let h = self.height_m;
        Box::pin(async move { Ok(h) })
    }

    fn sample_at_level(&self, _at: Geodetic, _level: u32) -> BoxFuture<'_, Result<f64, TerrainError>> {
        let h = self.height_m;
        Box::pin(async move { Ok(h) })
    }
}

fn finite(height: Result<f64, TerrainError>) -> Result<f64, TerrainError> {
    match height {
        Ok(h) if h.is_finite() => Ok(h),
        Ok(_) => Err(TerrainError::InvalidHeight),
        Err(e) => Err(e),
    }
}

/// Height at `at`: most detailed first, then fixed levels from `max_level`
/// down to [`COARSEST_LEVEL`]. `None` if every level fails.
pub async fn sample_height(terrain: &dyn TerrainSurface, at: Geodetic, max_level: u32) -> Option<f64> {
    match finite(terrain.sample_most_detailed(at).await) {
        Ok(h) => return Some(h),
        Err(e) => debug!(error = %e, "terrain: detailed sample failed, falling back"),
    }
    for level in (COARSEST_LEVEL..=max_level).rev() {
        match finite(terrain.sample_at_level(at, level).await) {
            Ok(h) => {
                debug!(level, "terrain: resolved at fixed level");
                return Some(h);
            }
            Err(e) => trace!(level, error = %e, "terrain: level failed"),
        }
    }
    None
}

/// World point under the pixel `(x, y)`, clamped to the terrain.
///
/// `None` means the pick is unresolved for this frame: the ray missed the
/// globe or no terrain level could be sampled.
pub async fn sample_terrain(
    camera: &dyn Camera,
    terrain: &dyn TerrainSurface,
    x: f64,
    y: f64,
    max_level: u32,
) -> Option<Ecef> {
    let ray = camera.ray_from_pixel(x, y)?;
    let approx = terrain.intersect(&ray)?;
    let ellipsoid = terrain.ellipsoid();
    let mut geo = ellipsoid.ecef_to_geodetic(approx);
    geo.alt_m = sample_height(terrain, geo, max_level).await?;
    let point = ellipsoid.geodetic_to_ecef(geo);
    point.is_finite().then_some(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray::PerspectiveCamera;
    use foundation::math::WGS84_A;
    use parking_lot::Mutex;

    /// Fails detailed sampling and every level above `loaded_level`.
    struct SparseTerrain {
        loaded_level: Option<u32>,
        height: f64,
        tried: Mutex<Vec<Option<u32>>>,
    }

    impl SparseTerrain {
        fn new(loaded_level: Option<u32>) -> Self {
            Self {
                loaded_level,
                height: 250.0,
                tried: Mutex::new(Vec::new()),
            }
        }
    }

    impl TerrainSurface for SparseTerrain {
        fn sample_most_detailed(&self, _at: Geodetic) -> BoxFuture<'_, Result<f64, TerrainError>> {
            self.tried.lock().push(None);
            Box::pin(async { Err(TerrainError::NotLoaded { level: None }) })
        }

        fn sample_at_level(&self, _at: Geodetic, level: u32) -> BoxFuture<'_, Result<f64, TerrainError>> {
            self.tried.lock().push(Some(level));
            let result = match self.loaded_level {
                Some(l) if level <= l => Ok(self.height),
                _ => Err(TerrainError::NotLoaded { level: Some(level) }),
            };
            Box::pin(async move { result })
        }
    }

    fn at() -> Geodetic {
        Geodetic::from_degrees(46.0, 7.0, 0.0)
    }

    #[tokio::test]
    async fn falls_back_level_by_level() {
        let terrain = SparseTerrain::new(Some(2));
        assert_eq!(sample_height(&terrain, at(), 4).await, Some(250.0));
        assert_eq!(
            *terrain.tried.lock(),
            vec![None, Some(4), Some(3), Some(2)]
        );
    }

    #[tokio::test]
    async fn unresolved_when_every_level_fails() {
        let terrain = SparseTerrain::new(None);
        assert_eq!(sample_height(&terrain, at(), 3).await, None);
        assert_eq!(terrain.tried.lock().len(), 1 + 4);
    }

    #[tokio::test]
    async fn nan_height_counts_as_failure() {
        let terrain = EllipsoidTerrain { height_m: f64::NAN };
        assert_eq!(sample_height(&terrain, at(), 0).await, None);
    }

    #[tokio::test]
    async fn pixel_sample_lands_on_terrain_height() {
        let cam = PerspectiveCamera::looking_at(
            Ecef::new(WGS84_A + 10_000.0, 0.0, 0.0),
            Ecef::new(WGS84_A, 0.0, 0.0),
            800.0,
            600.0,
        )
        .unwrap();
        let terrain = EllipsoidTerrain { height_m: 120.0 };
        let p = sample_terrain(&cam, &terrain, 400.0, 300.0, 14).await.unwrap();
        assert!((p.x - (WGS84_A + 120.0)).abs() < 1e-6);

        let sky = PerspectiveCamera::looking_at(
            Ecef::new(WGS84_A + 10_000.0, 0.0, 0.0),
            Ecef::new(WGS84_A + 20_000.0, 0.0, 0.0),
            800.0,
            600.0,
        )
        .unwrap();
        assert_eq!(sample_terrain(&sky, &terrain, 400.0, 300.0, 14).await, None);
    }
}
