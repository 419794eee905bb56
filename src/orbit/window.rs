use crate::geo::{displacement, min_orbit_time};
use crate::orbit::{ClosurePolicy, OrbitConfig};
use crate::photo::{GroundVelocity, PhotoRecord};

/// Time-ordered photos not yet assigned to a dataset.
///
/// Owned by a single task; nothing here is synchronized.
pub struct OrbitWindow {
    config: OrbitConfig,
    photos: Vec<PhotoRecord>,
}

impl OrbitWindow {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            config,
            photos: Vec::new(),
        }
    }

    pub fn photos(&self) -> &[PhotoRecord] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Inserts a photo in capture order and checks whether the latest photo
    /// closes an orbit. On closure the window is emptied and the closed
    /// batch, start through latest, is returned.
    pub fn insert(&mut self, record: PhotoRecord) -> Option<Vec<PhotoRecord>> {
        let pos = self
            .photos
            .partition_point(|p| p.captured_at <= record.captured_at);
        self.photos.insert(pos, record);

        let start = self.closure_start()?;
        let mut photos = std::mem::take(&mut self.photos);
        if start > 0 {
            log::debug!("Discarding {} photos preceding the orbit", start);
        }
        Some(photos.split_off(start))
    }

    fn closure_start(&mut self) -> Option<usize> {
        let last = self.photos.len().checked_sub(1)?;
        if self.photos[last].velocity.is_none() {
            self.backfill_velocity(last);
        }

        let cur = &self.photos[last];
        let Some(velocity) = cur.velocity else {
            log::debug!(
                "{}: no velocity available, cannot close an orbit",
                cur.filename.display()
            );
            return None;
        };
        let min_orbit = min_orbit_time(velocity.groundspeed);

        let mut start = None;
        for i in (0..last).rev() {
            if !self.closes_orbit(cur, &velocity, min_orbit, &self.photos[i]) {
                continue;
            }
            start = Some(i);
            if self.config.closure_policy == ClosurePolicy::Nearest {
                break;
            }
        }

        if let Some(i) = start {
            log::info!(
                "Orbit closed by {} ({} photos, {:.1}s)",
                cur.filename.display(),
                last - i + 1,
                cur.captured_at - self.photos[i].captured_at
            );
        }
        start
    }

    fn closes_orbit(
        &self,
        cur: &PhotoRecord,
        velocity: &GroundVelocity,
        min_orbit: f64,
        other: &PhotoRecord,
    ) -> bool {
        let Some(other_velocity) = other.velocity else {
            return false;
        };
        if cur.captured_at - other.captured_at < min_orbit {
            return false;
        }
        if velocity.direction.dot(&other_velocity.direction) < self.config.heading_alignment {
            return false;
        }
        let d = displacement(other.position(), cur.position());
        if velocity.direction.dot(&d) <= 0.0 {
            return false;
        }
        d.norm() < self.config.closure_radius_m
    }

    /// Estimates velocity of `self.photos[idx]` from the nearest earlier
    /// photo whose gap lies strictly inside the configured bounds.
    fn backfill_velocity(&mut self, idx: usize) {
        let cur = &self.photos[idx];
        let mut estimate = None;

        for other in self.photos[..idx].iter().rev() {
            let gap = cur.captured_at - other.captured_at;
            if gap >= self.config.backfill_max_gap_s {
                break;
            }
            if gap > self.config.backfill_min_gap_s {
                estimate = Some(
                    GroundVelocity::from_vector(
                        displacement(other.position(), cur.position()) / gap,
                    ),
                );
                break;
            }
        }

        match estimate {
            Some(Some(velocity)) => {
                log::debug!(
                    "{}: estimated groundspeed {:.1} m/s from neighbour",
                    cur.filename.display(),
                    velocity.groundspeed
                );
                self.photos[idx].velocity = Some(velocity);
            }
            Some(None) => log::debug!(
                "{}: neighbour at same position, velocity stays unknown",
                cur.filename.display()
            ),
            None => {}
        }
    }
}
