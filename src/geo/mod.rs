use serde::Serialize;
use std::f64::consts::PI;
use std::ops::{Div, Mul, Sub};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Length of one degree of latitude on the mean-radius sphere.
pub const DEG_LEN_M: f64 = EARTH_RADIUS_M * PI / 180.0;
pub const GRAVITY_M_S2: f64 = 9.81;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl GeoPoint {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }
}

/// Vector in the local east-north tangent plane, meters or m/s.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnVector {
    pub east: f64,
    pub north: f64,
}

impl EnVector {
    pub fn new(east: f64, north: f64) -> Self {
        Self { east, north }
    }

    /// Unit vector for a compass track (degrees clockwise from north).
    pub fn from_track_deg(track_deg: f64) -> Self {
        let rad = track_deg.to_radians();
        Self {
            east: rad.sin(),
            north: rad.cos(),
        }
    }

    pub fn dot(&self, other: &EnVector) -> f64 {
        self.east * other.east + self.north * other.north
    }

    pub fn norm(&self) -> f64 {
        self.east.hypot(self.north)
    }
}

impl Sub for EnVector {
    type Output = EnVector;

    fn sub(self, rhs: EnVector) -> EnVector {
        EnVector::new(self.east - rhs.east, self.north - rhs.north)
    }
}

impl Mul<f64> for EnVector {
    type Output = EnVector;

    fn mul(self, rhs: f64) -> EnVector {
        EnVector::new(self.east * rhs, self.north * rhs)
    }
}

impl Div<f64> for EnVector {
    type Output = EnVector;

    fn div(self, rhs: f64) -> EnVector {
        EnVector::new(self.east / rhs, self.north / rhs)
    }
}

/// Equirectangular displacement from `from` to `to`.
///
/// Only valid over local distances. No wrapping is applied at the +/-180
/// degree meridian, so a pair straddling it yields a bogus east component.
pub fn displacement(from: GeoPoint, to: GeoPoint) -> EnVector {
    let mid_lat = (from.latitude_deg + to.latitude_deg) / 2.0;
    EnVector {
        east: DEG_LEN_M * (to.longitude_deg - from.longitude_deg) * mid_lat.to_radians().cos(),
        north: DEG_LEN_M * (to.latitude_deg - from.latitude_deg),
    }
}

/// Shortest time to fly a full circle at `groundspeed` m/s, assuming a
/// 45 degree bank (tan = 1). A lower bound, not an estimate.
pub fn min_orbit_time(groundspeed: f64) -> f64 {
    2.0 * PI * groundspeed / GRAVITY_M_S2
}
