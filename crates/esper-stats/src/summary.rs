/// Condensed view of one generation's fitness sample.
///
/// Built once per generation from the trial networks' fitness values. The
/// extrema and mean track convergence; `spread` (standard deviation as a
/// fraction of the range) tracks how much diversity the sample still has,
/// independent of the fitness scale.
#[derive(Debug, Clone)]
pub struct SampleSummary {
    /// Sample size.
    pub count: usize,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median; the midpoint of the two central values for even-sized
    /// samples.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// `std_dev / (max - min)`, or zero when the sample has no spread.
    pub spread: f64,
}

impl SampleSummary {
    /// Summarizes a sample, or returns `None` for an empty one.
    ///
    /// Non-finite values are assumed filtered out by the caller; the
    /// evaluator scores failed trials as zero before they reach a report.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        let mean = sum / n;

        let squared_error: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let std_dev = (squared_error / n).sqrt();
        let spread = if max > min { std_dev / (max - min) } else { 0.0 };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count: values.len(),
            min,
            max,
            mean,
            median,
            std_dev,
            spread,
        })
    }
}
