use crate::detection::Detection;
use crate::filters::SingleObjectFilter;
use crate::utils::bbox::BoundingBox;
use crate::utils::stats::ErrorStats;
use anyhow::Result;
use log::debug;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use std::f64::consts::{FRAC_PI_4, PI};

/// Guards the weights against underflow when all particles are far from the observation
const WEIGHT_FLOOR: f64 = 1e-300;

/// Parameters of the particle filter
///
#[derive(Debug, Clone)]
pub struct ParticleOptions {
    /// number of particles, constant for the filter lifetime
    pub particles: usize,
    /// standard deviation of the initial spread: x, y, heading
    pub init_std: (f64, f64, f64),
    /// mean of the initial heading
    pub heading_mean: f64,
    /// heading change per step and its noise
    pub turn: f64,
    pub turn_std: f64,
    /// travelled distance per time unit and its noise
    pub speed: f64,
    pub speed_std: f64,
    /// standard deviation of the measured center
    pub measurement_std: f64,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self {
            particles: 500,
            init_std: (5.0, 5.0, FRAC_PI_4),
            heading_mean: FRAC_PI_4,
            turn: 0.0,
            turn_std: 0.2,
            speed: 1.0,
            speed_std: 0.05,
            measurement_std: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Particle {
    x: f64,
    y: f64,
    heading: f64,
}

/// Sequential importance resampling filter over the box center.
/// The box size follows the last observation.
///
#[derive(Debug)]
pub struct ParticleTracker {
    opts: ParticleOptions,
    dt: f64,
    particles: Vec<Particle>,
    weights: Vec<f64>,
    rng: StdRng,
    center: Point2<f64>,
    width: f32,
    height: f32,
    last_error: Option<ErrorStats>,
}

impl ParticleTracker {
    pub fn new(dt: f32, opts: ParticleOptions, bbox: &BoundingBox, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let c = bbox.center();
        let center = Point2::new(f64::from(c.x), f64::from(c.y));
        let n = opts.particles.max(1);
        let (sx, sy, sh) = opts.init_std;

        let particles = (0..n)
            .map(|_| {
                let nx: f64 = rng.sample(StandardNormal);
                let ny: f64 = rng.sample(StandardNormal);
                let nh: f64 = rng.sample(StandardNormal);
                Particle {
                    x: center.x + nx * sx,
                    y: center.y + ny * sy,
                    heading: (opts.heading_mean + nh * sh).rem_euclid(2.0 * PI),
                }
            })
            .collect::<Vec<_>>();

        Self {
            dt: f64::from(dt),
            weights: vec![1.0 / n as f64; n],
            particles,
            rng,
            center,
            width: bbox.width(),
            height: bbox.height(),
            last_error: None,
            opts,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Effective sample size of the current weights
    ///
    pub fn neff(&self) -> f64 {
        1.0 / self.weights.iter().map(|w| w * w).sum::<f64>()
    }

    fn weighted_mean(&self) -> Point2<f64> {
        let total = self.weights.iter().sum::<f64>();
        let (x, y) = self
            .particles
            .iter()
            .zip(&self.weights)
            .fold((0.0, 0.0), |(x, y), (p, w)| (x + p.x * w, y + p.y * w));
        Point2::new(x / total, y / total)
    }

    fn resample(&mut self) {
        let indexes = systematic_resample(&self.weights, &mut self.rng);
        self.particles = indexes.into_iter().map(|i| self.particles[i]).collect();
        let n = self.particles.len();
        self.weights = vec![1.0 / n as f64; n];
    }
}

/// Systematic resampling: one uniform offset, `N` evenly spaced positions over the
/// cumulative weights. Returns the indexes of the surviving particles.
///
pub fn systematic_resample<R: Rng>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::default();
    }
    let total = weights.iter().sum::<f64>();
    let mut cumulative = weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w / total;
            Some(*acc)
        })
        .collect::<Vec<_>>();
    cumulative[n - 1] = 1.0;

    let offset: f64 = rng.gen();
    let mut indexes = Vec::with_capacity(n);
    let (mut i, mut j) = (0, 0);
    while i < n {
        let position = (i as f64 + offset) / n as f64;
        if position < cumulative[j] {
            indexes.push(j);
            i += 1;
        } else {
            j += 1;
        }
    }
    indexes
}

fn normal_pdf(d: f64, std: f64) -> f64 {
    (-0.5 * (d / std).powi(2)).exp() / (std * (2.0 * PI).sqrt())
}

impl SingleObjectFilter for ParticleTracker {
    fn predict(&mut self) -> Point2<f32> {
        let turn = Normal::new(self.opts.turn, self.opts.turn_std.max(0.0));
        let step = Normal::new(self.opts.speed * self.dt, self.opts.speed_std.max(0.0));
        if let (Ok(turn), Ok(step)) = (turn, step) {
            for p in self.particles.iter_mut() {
                p.heading = (p.heading + turn.sample(&mut self.rng)).rem_euclid(2.0 * PI);
                let distance = step.sample(&mut self.rng);
                p.x += p.heading.cos() * distance;
                p.y += p.heading.sin() * distance;
            }
        }
        self.center = self.weighted_mean();
        self.center()
    }

    fn correct(&mut self, detection: &Detection) -> Result<()> {
        let c = detection.bbox.center();
        let observed = Point2::new(f64::from(c.x), f64::from(c.y));
        let error = self.center - observed;
        self.last_error = ErrorStats::from_error([error.x as f32, error.y as f32]);

        for (p, w) in self.particles.iter().zip(self.weights.iter_mut()) {
            let distance = ((p.x - observed.x).powi(2) + (p.y - observed.y).powi(2)).sqrt();
            *w = *w * normal_pdf(distance, self.opts.measurement_std) + WEIGHT_FLOOR;
        }
        let total = self.weights.iter().sum::<f64>();
        self.weights.iter_mut().for_each(|w| *w /= total);

        let neff = self.neff();
        if neff < self.len() as f64 / 2.0 {
            debug!("Particle filter resampling, neff={:.1}", neff);
            self.resample();
        }

        self.center = observed;
        self.width = detection.bbox.width();
        self.height = detection.bbox.height();
        Ok(())
    }

    fn error(&self) -> Option<ErrorStats> {
        self.last_error
    }

    fn bbox(&self) -> BoundingBox {
        let c = self.center();
        BoundingBox::from_center(c.x, c.y, self.width, self.height)
    }

    fn center(&self) -> Point2<f32> {
        Point2::new(self.center.x as f32, self.center.y as f32)
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::Detection;
    use crate::filters::particle::{systematic_resample, ParticleOptions, ParticleTracker};
    use crate::filters::SingleObjectFilter;
    use crate::utils::bbox::BoundingBox;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tracker(seed: u64) -> ParticleTracker {
        ParticleTracker::new(
            1.0,
            ParticleOptions::default(),
            &BoundingBox::new(90.0, 90.0, 110.0, 110.0),
            seed,
        )
    }

    #[test]
    fn initial_cloud() {
        let t = tracker(1);
        assert_eq!(t.len(), 500);
        assert!((t.weights().iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((t.neff() - 500.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_with_seed() {
        let mut a = tracker(42);
        let mut b = tracker(42);
        for _ in 0..3 {
            assert_eq!(a.predict(), b.predict());
        }
    }

    #[test]
    fn resampling_keeps_population() {
        let mut t = tracker(3);
        t.predict();
        // far away observation collapses the weights
        t.correct(&Detection::new(BoundingBox::new(130.0, 130.0, 150.0, 150.0), 1.0, 0))
            .unwrap();
        assert_eq!(t.len(), 500);
        let w = 1.0 / 500.0;
        assert!(t.weights().iter().all(|x| (x - w).abs() < 1e-12));
        assert_eq!(t.center().x, 140.0);
    }

    #[test]
    fn systematic() {
        let mut rng = StdRng::seed_from_u64(0);
        let idx = systematic_resample(&[0.0, 1.0, 0.0, 0.0], &mut rng);
        assert_eq!(idx, vec![1, 1, 1, 1]);

        let idx = systematic_resample(&[0.25, 0.25, 0.25, 0.25], &mut rng);
        assert_eq!(idx, vec![0, 1, 2, 3]);
        assert!(systematic_resample(&[], &mut rng).is_empty());
    }

    #[test]
    fn stays_near_static_object() {
        let mut t = tracker(5);
        let bbox = BoundingBox::new(90.0, 90.0, 110.0, 110.0);
        for _ in 0..20 {
            t.predict();
            t.correct(&Detection::new(bbox, 1.0, 0)).unwrap();
        }
        let c = t.predict();
        assert!((c.x - 100.0).abs() < 15.0, "c = {:?}", c);
        assert!((c.y - 100.0).abs() < 15.0, "c = {:?}", c);
    }
}
