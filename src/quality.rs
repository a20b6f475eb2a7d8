// ABOUTME: Quality tier classification for throughput and latency samples
// ABOUTME: Maps values onto Good/Acceptable/Poor and splits series per tier for colored plotting

/// Which end of the scale is the good one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Latency: smaller values are better.
    LowerIsBetter,
    /// Throughput: larger values are better.
    HigherIsBetter,
}

/// A pair of bounds where `good` is the stricter one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub good: f64,
    pub ok: f64,
}

impl Thresholds {
    pub fn new(good: f64, ok: f64) -> Self {
        Self { good, ok }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Good,
    Acceptable,
    Poor,
}

impl QualityTier {
    pub fn symbol(&self) -> &'static str {
        match self {
            QualityTier::Good => "●",
            QualityTier::Acceptable => "◐",
            QualityTier::Poor => "○",
        }
    }
}

/// Classify a sample. Absent, NaN and infinite values are always `Poor`.
pub fn classify(value: Option<f64>, thresholds: Thresholds, direction: Direction) -> QualityTier {
    let v = match value {
        Some(v) if v.is_finite() => v,
        _ => return QualityTier::Poor,
    };

    match direction {
        Direction::LowerIsBetter => {
            if v <= thresholds.good {
                QualityTier::Good
            } else if v <= thresholds.ok {
                QualityTier::Acceptable
            } else {
                QualityTier::Poor
            }
        }
        Direction::HigherIsBetter => {
            if v >= thresholds.good {
                QualityTier::Good
            } else if v >= thresholds.ok {
                QualityTier::Acceptable
            } else {
                QualityTier::Poor
            }
        }
    }
}

/// Three parallel series sharing the input's x axis.
///
/// At every index exactly one series carries the original y value and the
/// other two carry `f64::NAN`. Renderers are expected to treat non-finite
/// points as gaps so each tier can be drawn in its own color without
/// reordering or dropping samples.
#[derive(Debug, Clone, Default)]
pub struct TierSeries {
    pub xs: Vec<f64>,
    pub good: Vec<f64>,
    pub acceptable: Vec<f64>,
    pub poor: Vec<f64>,
}

impl TierSeries {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn series(&self, tier: QualityTier) -> &[f64] {
        match tier {
            QualityTier::Good => &self.good,
            QualityTier::Acceptable => &self.acceptable,
            QualityTier::Poor => &self.poor,
        }
    }

    /// Contiguous finite runs of one tier as `(x, y)` points.
    pub fn segments(&self, tier: QualityTier) -> Vec<Vec<(f64, f64)>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();

        for (x, y) in self.xs.iter().zip(self.series(tier)) {
            if y.is_finite() {
                current.push((*x, *y));
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        runs
    }
}

pub fn split_by_tier(
    xs: &[f64],
    ys: &[Option<f64>],
    thresholds: Thresholds,
    direction: Direction,
) -> TierSeries {
    let len = xs.len().min(ys.len());
    let mut out = TierSeries {
        xs: xs[..len].to_vec(),
        good: Vec::with_capacity(len),
        acceptable: Vec::with_capacity(len),
        poor: Vec::with_capacity(len),
    };

    for y in &ys[..len] {
        let original = y.unwrap_or(f64::NAN);
        let tier = classify(*y, thresholds, direction);

        out.good.push(if tier == QualityTier::Good { original } else { f64::NAN });
        out.acceptable
            .push(if tier == QualityTier::Acceptable { original } else { f64::NAN });
        out.poor.push(if tier == QualityTier::Poor { original } else { f64::NAN });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING: Thresholds = Thresholds { good: 60.0, ok: 150.0 };
    const MBPS: Thresholds = Thresholds { good: 5.0, ok: 0.5 };

    #[test]
    fn test_latency_threshold_crossings() {
        let lib = Direction::LowerIsBetter;
        assert_eq!(classify(Some(59.0), PING, lib), QualityTier::Good);
        assert_eq!(classify(Some(60.0), PING, lib), QualityTier::Good);
        assert_eq!(classify(Some(150.0), PING, lib), QualityTier::Acceptable);
        assert_eq!(classify(Some(151.0), PING, lib), QualityTier::Poor);
    }

    #[test]
    fn test_throughput_tiers() {
        let hib = Direction::HigherIsBetter;
        assert_eq!(classify(Some(3.0), MBPS, hib), QualityTier::Acceptable);
        assert_eq!(classify(Some(6.0), MBPS, hib), QualityTier::Good);
        assert_eq!(classify(Some(0.1), MBPS, hib), QualityTier::Poor);
        assert_eq!(classify(Some(0.5), MBPS, hib), QualityTier::Acceptable);
    }

    #[test]
    fn test_non_finite_is_poor() {
        for direction in [Direction::LowerIsBetter, Direction::HigherIsBetter] {
            assert_eq!(classify(None, PING, direction), QualityTier::Poor);
            assert_eq!(classify(Some(f64::NAN), PING, direction), QualityTier::Poor);
            assert_eq!(classify(Some(f64::INFINITY), MBPS, direction), QualityTier::Poor);
            assert_eq!(
                classify(Some(f64::NEG_INFINITY), MBPS, direction),
                QualityTier::Poor
            );
        }
    }

    #[test]
    fn test_split_exactly_one_series_holds_value() {
        let xs: Vec<f64> = (0..6).map(f64::from).collect();
        let ys = vec![Some(10.0), Some(100.0), Some(400.0), None, Some(60.0), Some(150.0)];
        let split = split_by_tier(&xs, &ys, PING, Direction::LowerIsBetter);

        assert_eq!(split.len(), ys.len());
        assert_eq!(split.good.len(), ys.len());
        assert_eq!(split.acceptable.len(), ys.len());
        assert_eq!(split.poor.len(), ys.len());
        assert_eq!(split.xs, xs);

        for (i, y) in ys.iter().enumerate() {
            let Some(y) = y else {
                assert!(split.good[i].is_nan());
                assert!(split.acceptable[i].is_nan());
                continue;
            };
            let holders: Vec<f64> = [split.good[i], split.acceptable[i], split.poor[i]]
                .into_iter()
                .filter(|v| !v.is_nan())
                .collect();
            assert_eq!(holders, vec![*y], "index {i}");
        }

        assert_eq!(split.good[0], 10.0);
        assert_eq!(split.acceptable[1], 100.0);
        assert_eq!(split.poor[2], 400.0);
    }

    #[test]
    fn test_segments_break_on_gaps() {
        let xs: Vec<f64> = (0..5).map(f64::from).collect();
        let ys = vec![Some(6.0), Some(7.0), Some(1.0), Some(8.0), Some(0.0)];
        let split = split_by_tier(&xs, &ys, MBPS, Direction::HigherIsBetter);

        let good = split.segments(QualityTier::Good);
        assert_eq!(good, vec![vec![(0.0, 6.0), (1.0, 7.0)], vec![(3.0, 8.0)]]);
        assert_eq!(split.segments(QualityTier::Acceptable), vec![vec![(2.0, 1.0)]]);
        assert_eq!(split.segments(QualityTier::Poor), vec![vec![(4.0, 0.0)]]);
    }

    #[test]
    fn test_tier_symbols_distinct() {
        assert_ne!(QualityTier::Good.symbol(), QualityTier::Poor.symbol());
        assert_ne!(QualityTier::Acceptable.symbol(), QualityTier::Poor.symbol());
    }
}
