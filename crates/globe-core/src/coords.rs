//! Geographic coordinates and the lat/lon <-> Cartesian projection.
//!
//! One axis convention is used everywhere (globe texture, markers, camera):
//! Y is up, `(0, 0)` lies on `+X`, `(0, 90)` on `-Z` and the north pole on
//! `+Y`. The globe texture is sampled equirectangularly with
//! `u = theta / 2π` and `v = phi / π` where `phi = 90° - lat` and
//! `theta = lon + 180°`.

use glam::Vec3;

use crate::error::GlobeError;

/// Cartesian position in world space.
pub type Position = Vec3;

/// A validated `(latitude, longitude)` pair in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GlobeError> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
        if !lat_ok || !lon_ok {
            return Err(GlobeError::InvalidCoordinates { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// For in-range constants only; bypasses validation.
    pub(crate) const fn from_const(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl TryFrom<[f64; 2]> for Coordinates {
    type Error = GlobeError;

    fn try_from(value: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(value[0], value[1])
    }
}

/// Project coordinates onto a sphere of `radius` centered at the origin.
pub fn project(coordinates: Coordinates, radius: f32) -> Position {
    let phi = (90.0 - coordinates.lat).to_radians();
    let theta = (coordinates.lon + 180.0).to_radians();
    let r = radius as f64;
    let x = -(r * phi.sin() * theta.cos());
    let y = r * phi.cos();
    let z = r * phi.sin() * theta.sin();
    Vec3::new(x as f32, y as f32, z as f32)
}

/// Inverse of [`project`]: the coordinates under `position`.
///
/// The origin has no direction and maps to `(0, 0)`.
pub fn unproject(position: Position) -> Coordinates {
    let p = position.as_dvec3();
    let r = p.length();
    if r <= f64::EPSILON {
        return Coordinates { lat: 0.0, lon: 0.0 };
    }
    let phi = (p.y / r).clamp(-1.0, 1.0).acos();
    let mut theta = p.z.atan2(-p.x);
    if theta < 0.0 {
        theta += std::f64::consts::TAU;
    }
    let lat = (90.0 - phi.to_degrees()).clamp(-90.0, 90.0);
    let mut lon = theta.to_degrees() - 180.0;
    if lon < -180.0 {
        lon += 360.0;
    }
    Coordinates {
        lat,
        lon: lon.clamp(-180.0, 180.0),
    }
}
