use crate::detection::Detection;
use crate::utils::bbox::BoundingBox;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Box moving with a constant velocity, optionally with a seeded position jitter
///
pub struct BoxGen {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    vx: f32,
    vy: f32,
    gen: StdRng,
    jitter: Option<Uniform<f32>>,
}

impl BoxGen {
    /// Creates the generator, `(x, y)` is the left-top corner of the first box
    ///
    pub fn new(x: f32, y: f32, width: f32, height: f32, vx: f32, vy: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            vx,
            vy,
            gen: StdRng::seed_from_u64(0),
            jitter: None,
        }
    }

    /// Adds a uniform `[-jitter, jitter)` noise to the observed position
    ///
    pub fn with_jitter(mut self, jitter: f32, seed: u64) -> Self {
        if jitter > 0.0 {
            self.jitter = Some(Uniform::new(-jitter, jitter));
            self.gen = StdRng::seed_from_u64(seed);
        }
        self
    }

    /// The current box, the generator moves one step afterwards
    ///
    pub fn next_box(&mut self) -> BoundingBox {
        let (dx, dy) = match self.jitter {
            Some(d) => (self.gen.sample(d), self.gen.sample(d)),
            None => (0.0, 0.0),
        };
        let bbox = BoundingBox::ltwh(self.x + dx, self.y + dy, self.width, self.height);
        self.x += self.vx;
        self.y += self.vy;
        bbox
    }
}

impl Iterator for BoxGen {
    type Item = BoundingBox;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_box())
    }
}

/// Scene of objects laid out on a lattice, all moving right
///
pub struct SceneGen {
    objects: Vec<BoxGen>,
}

impl SceneGen {
    pub fn new(count: usize, spacing: f32, size: f32, seed: u64) -> Self {
        let side = (count as f32).sqrt().ceil().max(1.0) as usize;
        let objects = (0..count)
            .map(|i| {
                let (row, column) = (i / side, i % side);
                BoxGen::new(
                    column as f32 * spacing,
                    row as f32 * spacing,
                    size,
                    size,
                    1.0,
                    0.0,
                )
                .with_jitter(0.5, seed.wrapping_add(i as u64))
            })
            .collect();
        Self { objects }
    }

    pub fn next_detections(&mut self) -> Vec<Detection> {
        self.objects
            .iter_mut()
            .map(|o| Detection::new(o.next_box(), 0.9, 0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::examples::{BoxGen, SceneGen};

    #[test]
    fn constant_velocity() {
        let mut g = BoxGen::new(10.0, 10.0, 20.0, 20.0, 5.0, 0.0);
        assert_eq!(g.next_box().x_min, 10.0);
        let b = g.nth(1).unwrap();
        assert_eq!(b.x_min, 20.0);
        assert_eq!(b.width(), 20.0);
    }

    #[test]
    fn jitter_is_reproducible() {
        let a = BoxGen::new(0.0, 0.0, 5.0, 5.0, 1.0, 1.0)
            .with_jitter(2.0, 3)
            .take(5)
            .collect::<Vec<_>>();
        let b = BoxGen::new(0.0, 0.0, 5.0, 5.0, 1.0, 1.0)
            .with_jitter(2.0, 3)
            .take(5)
            .collect::<Vec<_>>();
        assert_eq!(a, b);
    }

    #[test]
    fn scene() {
        let mut s = SceneGen::new(10, 50.0, 20.0, 1);
        assert_eq!(s.next_detections().len(), 10);
    }
}
