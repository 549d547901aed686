//! # Poisson-Disk Placement
//!
//! Spreads structure sites across a disk so that no two sites are closer
//! than a minimum distance.
//!
//! ## Algorithm
//!
//! An active list starts with one random point inside the disk. Each round
//! picks a random active point and tries up to `max_attempts` candidates at
//! a random angle and a distance in `[min_distance, 2 * min_distance)`. The
//! first candidate inside the disk and far enough from every accepted point
//! is accepted and becomes active. A point whose trials all fail is retired
//! from the active list (it stays accepted). Sampling stops when the active
//! list is empty or `cap` points were accepted.
//!
//! Neighbour checks go through a hash grid with cell size `min_distance`,
//! so only the 3x3 block of cells around a candidate is inspected.

use std::collections::HashMap;
use std::f32::consts::TAU;

use bastion_shared::Vec2;
use rand::Rng;

/// Default trials per active point.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Poisson-disk sampler over a disk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoissonSampler {
    center: Vec2,
    radius: f32,
    min_distance: f32,
    max_attempts: u32,
    cap: usize,
}

impl PoissonSampler {
    /// Creates a sampler with the default trial count and no cap.
    #[must_use]
    pub const fn new(center: Vec2, radius: f32, min_distance: f32) -> Self {
        Self {
            center,
            radius,
            min_distance,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cap: usize::MAX,
        }
    }

    /// Sets the trials per active point.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the maximum number of accepted points.
    #[must_use]
    pub const fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    /// Samples the disk.
    ///
    /// A non-positive `min_distance` cannot space anything apart, so it falls
    /// back to uniform sampling of `cap` points (bounded by a sane limit).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec2> {
        if self.cap == 0 || self.radius.is_nan() || self.radius < 0.0 {
            return Vec::new();
        }
        if self.min_distance.is_nan() || self.min_distance <= 0.0 {
            let count = self.cap.min(usize::from(u16::MAX));
            return uniform_in_disk(rng, self.center, self.radius, count);
        }
        // Past f32::MAX / 2 the annulus bound overflows; nothing could be
        // placed next to the seed anyway.
        if !(2.0 * self.min_distance).is_finite() {
            return vec![random_in_disk(rng, self.center, self.radius)];
        }

        let mut grid = SpatialHash::new(self.center, self.min_distance);
        let mut accepted = Vec::new();
        let mut active = Vec::new();

        let seed = random_in_disk(rng, self.center, self.radius);
        grid.insert(seed, 0);
        accepted.push(seed);
        active.push(0usize);

        let min_sq = self.min_distance * self.min_distance;
        while !active.is_empty() && accepted.len() < self.cap {
            let slot = rng.gen_range(0..active.len());
            let source = accepted[active[slot]];

            let mut placed = false;
            for _ in 0..self.max_attempts {
                let angle = rng.gen_range(0.0..TAU);
                let distance = rng.gen_range(self.min_distance..2.0 * self.min_distance);
                let candidate = source + Vec2::from_angle(angle) * distance;
                if candidate.distance(self.center) > self.radius {
                    continue;
                }
                if grid.any_within(candidate, min_sq, &accepted) {
                    continue;
                }
                let index = accepted.len();
                grid.insert(candidate, index);
                accepted.push(candidate);
                active.push(index);
                placed = true;
                break;
            }

            if !placed {
                active.swap_remove(slot);
            }
        }

        accepted
    }
}

/// Hash grid of accepted point indices.
struct SpatialHash {
    origin: Vec2,
    cell: f32,
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialHash {
    fn new(origin: Vec2, cell: f32) -> Self {
        Self {
            origin,
            cell,
            buckets: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, point: Vec2) -> (i32, i32) {
        let local = point - self.origin;
        ((local.x / self.cell).floor() as i32, (local.y / self.cell).floor() as i32)
    }

    fn insert(&mut self, point: Vec2, index: usize) {
        let key = self.key(point);
        self.buckets.entry(key).or_default().push(index);
    }

    fn any_within(&self, point: Vec2, min_sq: f32, points: &[Vec2]) -> bool {
        let (kx, ky) = self.key(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.buckets.get(&(kx + dx, ky + dy)) else {
                    continue;
                };
                if bucket
                    .iter()
                    .any(|&i| points[i].distance_squared(point) < min_sq)
                {
                    return true;
                }
            }
        }
        false
    }
}

fn random_in_disk<R: Rng + ?Sized>(rng: &mut R, center: Vec2, radius: f32) -> Vec2 {
    let r = radius * rng.gen::<f32>().sqrt();
    let angle = rng.gen_range(0.0..TAU);
    center + Vec2::from_angle(angle) * r
}

/// `count` independent uniform points inside the disk, spacing ignored.
pub fn uniform_in_disk<R: Rng + ?Sized>(rng: &mut R, center: Vec2, radius: f32, count: usize) -> Vec<Vec2> {
    if radius.is_nan() || radius < 0.0 {
        return Vec::new();
    }
    (0..count).map(|_| random_in_disk(rng, center, radius)).collect()
}
