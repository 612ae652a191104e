use itertools::Itertools;
use itertools::MinMaxResult;
use serde::{Deserialize, Serialize};

/// Distribution of an estimation error vector: (min, mean, max, mean of squares)
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub min: f32,
    pub mean: f32,
    pub max: f32,
    pub mean_sq: f32,
}

impl ErrorStats {
    /// Summarizes the components of one error vector (estimate minus observation)
    ///
    pub fn from_error<I>(error: I) -> Option<Self>
    where
        I: IntoIterator<Item = f32>,
    {
        let values = error.into_iter().collect::<Vec<_>>();
        let (min, max) = match values.iter().copied().minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let n = values.len() as f32;
        Some(Self {
            min,
            mean: values.iter().sum::<f32>() / n,
            max,
            mean_sq: values.iter().map(|v| v * v).sum::<f32>() / n,
        })
    }

    /// Aggregates per-filter stats: min of mins, mean of means, max of maxes and
    /// mean of mean squares
    ///
    pub fn aggregate<'a, I>(stats: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ErrorStats>,
    {
        let stats = stats.into_iter().collect::<Vec<_>>();
        if stats.is_empty() {
            return None;
        }
        let n = stats.len() as f32;
        Some(Self {
            min: stats.iter().map(|s| s.min).fold(f32::INFINITY, f32::min),
            mean: stats.iter().map(|s| s.mean).sum::<f32>() / n,
            max: stats.iter().map(|s| s.max).fold(f32::NEG_INFINITY, f32::max),
            mean_sq: stats.iter().map(|s| s.mean_sq).sum::<f32>() / n,
        })
    }

    pub fn as_tuple(&self) -> (f32, f32, f32, f32) {
        (self.min, self.mean, self.max, self.mean_sq)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::stats::ErrorStats;

    #[test]
    fn from_error() {
        let s = ErrorStats::from_error([-1.0, 1.0, 3.0]).unwrap();
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 1.0);
        assert!((s.mean_sq - 11.0 / 3.0).abs() < 1e-6);
        assert!(ErrorStats::from_error([]).is_none());
    }

    #[test]
    fn aggregate() {
        let a = ErrorStats::from_error([0.0, 2.0]).unwrap();
        let b = ErrorStats::from_error([-4.0, 0.0]).unwrap();
        let s = ErrorStats::aggregate([&a, &b]).unwrap();
        assert_eq!(s.as_tuple(), (-4.0, -0.5, 2.0, 5.0));
        assert!(ErrorStats::aggregate([]).is_none());
    }
}
