mod window;

use serde::Deserialize;

pub use window::OrbitWindow;

/// Which start to pick when several earlier photos close the orbit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClosurePolicy {
    /// Most recent qualifying photo: smallest orbit, earliest dispatch.
    #[default]
    Nearest,
    /// Oldest qualifying photo: more photos per dataset.
    Longest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub closure_policy: ClosurePolicy,
    /// Minimum dot product between start and closing headings.
    pub heading_alignment: f64,
    /// Closing photo must be strictly nearer than this to the start.
    pub closure_radius_m: f64,
    /// Exclusive bounds on the neighbour gap used to estimate velocity.
    pub backfill_min_gap_s: f64,
    pub backfill_max_gap_s: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            closure_policy: ClosurePolicy::Nearest,
            heading_alignment: 0.7,
            closure_radius_m: 1000.0,
            backfill_min_gap_s: 2.0,
            backfill_max_gap_s: 20.0,
        }
    }
}
