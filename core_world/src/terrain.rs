use std::sync::Arc;

use bevy::prelude::*;

use crate::config::TerrainSettings;

/// Answers ground-height queries for the placement search. `None` means
/// there is no ground at that point and callers fall back to their own
/// baseline.
pub trait GroundProbe {
    fn ground_height(&self, x: f32, y: f32) -> Option<f32>;
}

/// Square heightfield centered on the world origin, sampled bilinearly at
/// continuous coordinates. Heights are world units around zero, spanning
/// roughly the configured amplitude.
#[derive(Resource, Debug, Clone)]
pub struct TerrainField {
    cells: u32,
    cell_size: f32,
    heights: Arc<Vec<f32>>,
}

impl TerrainField {
    /// Generate a deterministic field from the settings' seed.
    pub fn generate(settings: &TerrainSettings) -> Self {
        let cells = settings.cells.max(2);
        let seed = fold_seed(settings.seed);
        let mut heights = Vec::with_capacity((cells * cells) as usize);
        for row in 0..cells {
            for col in 0..cells {
                let nx = col as f32 / (cells - 1) as f32;
                let ny = row as f32 / (cells - 1) as f32;
                let relief = layered_noise(nx * 4.0, ny * 4.0, seed);
                heights.push((relief - 0.5) * settings.amplitude);
            }
        }
        Self {
            cells,
            cell_size: settings.cell_size,
            heights: Arc::new(heights),
        }
    }

    /// Half-width of the field in world units.
    pub fn half_extent(&self) -> f32 {
        (self.cells - 1) as f32 * self.cell_size * 0.5
    }

    pub fn sample(&self, x: f32, y: f32) -> Option<f32> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let half = self.half_extent();
        if x < -half || x > half || y < -half || y > half {
            return None;
        }
        let gx = (x + half) / self.cell_size;
        let gy = (y + half) / self.cell_size;
        let col = (gx.floor() as u32).min(self.cells - 2);
        let row = (gy.floor() as u32).min(self.cells - 2);
        let fx = gx - col as f32;
        let fy = gy - row as f32;
        let h00 = self.height_at(col, row);
        let h10 = self.height_at(col + 1, row);
        let h01 = self.height_at(col, row + 1);
        let h11 = self.height_at(col + 1, row + 1);
        Some(lerp(lerp(h00, h10, fx), lerp(h01, h11, fx), fy))
    }

    fn height_at(&self, col: u32, row: u32) -> f32 {
        self.heights[(row * self.cells + col) as usize]
    }
}

impl GroundProbe for TerrainField {
    fn ground_height(&self, x: f32, y: f32) -> Option<f32> {
        self.sample(x, y)
    }
}

fn fold_seed(seed: u64) -> u32 {
    (seed as u32) ^ ((seed >> 32) as u32).rotate_left(9)
}

fn layered_noise(x: f32, y: f32, seed: u32) -> f32 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut total = 0.0;
    for octave in 0..3u32 {
        let octave_seed = seed.wrapping_add(octave.wrapping_mul(0x9E37_79B9));
        sum += value_noise(x * frequency, y * frequency, octave_seed) * amplitude;
        total += amplitude;
        frequency *= 2.0;
        amplitude *= 0.5;
    }
    sum / total
}

fn value_noise(x: f32, y: f32, seed: u32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = fade(x - x0);
    let fy = fade(y - y0);
    let xi = x0 as i32;
    let yi = y0 as i32;
    let a = lattice(xi, yi, seed);
    let b = lattice(xi + 1, yi, seed);
    let c = lattice(xi, yi + 1, seed);
    let d = lattice(xi + 1, yi + 1, seed);
    lerp(lerp(a, b, fx), lerp(c, d, fx), fy)
}

fn fade(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn lattice(x: i32, y: i32, seed: u32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x85EB_CA6B) ^ (y as u32).wrapping_mul(0xC2B2_AE35) ^ seed;
    h ^= h >> 15;
    h = h.wrapping_mul(0x2545_F491);
    h ^= h >> 13;
    (h & 0x00FF_FFFF) as f32 / 16_777_215.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(seed: u64) -> TerrainSettings {
        TerrainSettings {
            cells: 32,
            cell_size: 100.0,
            amplitude: 400.0,
            seed,
        }
    }

    #[test]
    fn same_seed_generates_identical_fields() {
        let a = TerrainField::generate(&settings(9));
        let b = TerrainField::generate(&settings(9));
        for probe in [(0.0, 0.0), (250.0, -480.0), (-1200.0, 733.0)] {
            assert_eq!(a.sample(probe.0, probe.1), b.sample(probe.0, probe.1));
        }
    }

    #[test]
    fn different_seeds_change_the_relief() {
        let a = TerrainField::generate(&settings(1));
        let b = TerrainField::generate(&settings(2));
        let points = [(0.0, 0.0), (130.0, 420.0), (-900.0, -333.0), (777.0, -41.0)];
        assert!(
            points
                .iter()
                .any(|&(x, y)| a.sample(x, y) != b.sample(x, y)),
            "distinct seeds should disagree somewhere"
        );
    }

    #[test]
    fn samples_outside_the_extent_report_no_ground() {
        let field = TerrainField::generate(&settings(3));
        let half = field.half_extent();
        assert!(field.sample(0.0, 0.0).is_some());
        assert!(field.sample(half, half).is_some());
        assert!(field.sample(half + 1.0, 0.0).is_none());
        assert!(field.sample(0.0, -half - 0.5).is_none());
        assert!(field.sample(f32::NAN, 0.0).is_none());
    }

    #[test]
    fn heights_stay_within_the_amplitude_envelope() {
        let field = TerrainField::generate(&settings(4));
        let half = field.half_extent();
        let mut y = -half;
        while y <= half {
            let mut x = -half;
            while x <= half {
                let height = field.sample(x, y).expect("inside the extent");
                assert!(height.abs() <= 200.0 + f32::EPSILON);
                x += 170.0;
            }
            y += 170.0;
        }
    }
}
