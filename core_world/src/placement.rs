use bevy::prelude::*;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::warn;

use crate::{config::PlacementRules, terrain::GroundProbe};

/// Preferred center for placement sampling. Hosts point it at their tracked
/// agent; `None` falls back to the world origin.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SpawnAnchor(pub Option<Vec3>);

impl SpawnAnchor {
    pub fn center(&self) -> Vec2 {
        self.0.map(|position| position.truncate()).unwrap_or(Vec2::ZERO)
    }
}

/// Result of a placement search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedSpot {
    pub position: Vec3,
    /// Set when the attempt budget ran out and the spacing guarantee was
    /// waived for this spot.
    pub degraded: bool,
}

/// Bounded rejection sampler for landmark positions.
#[derive(Resource)]
pub struct PlacementPlanner {
    rng: SmallRng,
}

impl PlacementPlanner {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// First-fit search: up to `rules.max_attempts` uniform samples in the
    /// square of half-width `rules.spawn_radius` around `center`, each
    /// projected onto the ground (plus `rules.height_offset`). A candidate is
    /// accepted when every occupied position is at least
    /// `rules.min_spawn_distance` away in the plane. Exhaustion returns one
    /// final unchecked sample marked degraded.
    pub fn find_spot(
        &mut self,
        center: Vec2,
        occupied: &[Vec3],
        ground: &dyn GroundProbe,
        rules: &PlacementRules,
    ) -> PlannedSpot {
        for _ in 0..rules.max_attempts {
            let candidate = self.sample(center, ground, rules);
            if is_clear(candidate, occupied, rules.min_spawn_distance) {
                return PlannedSpot {
                    position: candidate,
                    degraded: false,
                };
            }
        }
        let fallback = self.sample(center, ground, rules);
        warn!(
            target: "worldloom::placement",
            attempts = rules.max_attempts,
            x = f64::from(fallback.x),
            y = f64::from(fallback.y),
            "placement.degraded=spacing_waived"
        );
        PlannedSpot {
            position: fallback,
            degraded: true,
        }
    }

    fn sample(&mut self, center: Vec2, ground: &dyn GroundProbe, rules: &PlacementRules) -> Vec3 {
        let x = self
            .rng
            .gen_range(center.x - rules.spawn_radius..=center.x + rules.spawn_radius);
        let y = self
            .rng
            .gen_range(center.y - rules.spawn_radius..=center.y + rules.spawn_radius);
        let z = ground.ground_height(x, y).unwrap_or(0.0) + rules.height_offset;
        Vec3::new(x, y, z)
    }
}

fn is_clear(candidate: Vec3, occupied: &[Vec3], min_distance: f32) -> bool {
    occupied
        .iter()
        .all(|existing| existing.truncate().distance(candidate.truncate()) >= min_distance)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FlatGround {
        height: Option<f32>,
        queries: Cell<u32>,
    }

    impl FlatGround {
        fn new(height: Option<f32>) -> Self {
            Self {
                height,
                queries: Cell::new(0),
            }
        }
    }

    impl GroundProbe for FlatGround {
        fn ground_height(&self, _x: f32, _y: f32) -> Option<f32> {
            self.queries.set(self.queries.get() + 1);
            self.height
        }
    }

    fn rules() -> PlacementRules {
        PlacementRules {
            spawn_radius: 2000.0,
            min_spawn_distance: 500.0,
            max_attempts: 50,
            height_offset: 50.0,
        }
    }

    #[test]
    fn accepted_spots_respect_the_minimum_spacing() {
        let mut planner = PlacementPlanner::seeded(77);
        let ground = FlatGround::new(Some(0.0));
        let rules = rules();
        let occupied = vec![Vec3::ZERO, Vec3::new(900.0, -300.0, 50.0)];

        for _ in 0..16 {
            let spot = planner.find_spot(Vec2::ZERO, &occupied, &ground, &rules);
            assert!(!spot.degraded);
            for existing in &occupied {
                let gap = existing.truncate().distance(spot.position.truncate());
                assert!(gap >= rules.min_spawn_distance, "gap {gap} too small");
            }
        }
    }

    #[test]
    fn exhaustion_stops_after_the_attempt_budget_and_degrades() {
        let mut planner = PlacementPlanner::seeded(5);
        let ground = FlatGround::new(Some(12.0));
        let rules = PlacementRules {
            spawn_radius: 100.0,
            // Larger than the sampling square's diagonal, so no candidate
            // can ever clear the occupied center.
            min_spawn_distance: 1000.0,
            max_attempts: 50,
            height_offset: 50.0,
        };
        let occupied = vec![Vec3::ZERO];

        let spot = planner.find_spot(Vec2::ZERO, &occupied, &ground, &rules);
        assert!(spot.degraded);
        assert_eq!(
            ground.queries.get(),
            rules.max_attempts + 1,
            "one query per attempt plus the fallback"
        );
        assert_eq!(spot.position.z, 62.0);
    }

    #[test]
    fn missing_ground_falls_back_to_the_height_offset_alone() {
        let mut planner = PlacementPlanner::seeded(9);
        let ground = FlatGround::new(None);
        let spot = planner.find_spot(Vec2::ZERO, &[], &ground, &rules());
        assert!(!spot.degraded);
        assert_eq!(spot.position.z, 50.0);
    }

    #[test]
    fn sampling_stays_inside_the_square_around_the_anchor() {
        let mut planner = PlacementPlanner::seeded(123);
        let ground = FlatGround::new(Some(0.0));
        let rules = rules();
        let center = Vec2::new(10_000.0, -4_000.0);
        for _ in 0..32 {
            let spot = planner.find_spot(center, &[], &ground, &rules);
            assert!((spot.position.x - center.x).abs() <= rules.spawn_radius);
            assert!((spot.position.y - center.y).abs() <= rules.spawn_radius);
        }
    }

    #[test]
    fn identical_seeds_reproduce_identical_searches() {
        let ground = FlatGround::new(Some(3.0));
        let rules = rules();
        let mut first = PlacementPlanner::seeded(41);
        let mut second = PlacementPlanner::seeded(41);
        let a = first.find_spot(Vec2::ZERO, &[], &ground, &rules);
        let b = second.find_spot(Vec2::ZERO, &[], &ground, &rules);
        assert_eq!(a, b);
    }
}
