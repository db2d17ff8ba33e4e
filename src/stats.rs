//! Summary statistics and prediction error metrics.
//!
//! Aggregates over an empty slice return `None`. The scalar helpers
//! [`mean`] and [`pct`] return `0.0` instead so they can be used inline.

use serde::Serialize;

use crate::record::Record;

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Median of an already sorted slice; 0.0 when empty.
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(median_of_sorted(&sorted(values)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

/// Median-of-halves quartiles.
///
/// `q1` is the median of `sorted[..n/2]` and `q3` the median of
/// `sorted[(n+1)/2..]`, so for odd `n` the middle element belongs to neither
/// half. A half with no elements has median 0.0.
pub fn quartiles(values: &[f64]) -> Option<Quartiles> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let n = s.len();
    Some(Quartiles {
        q1: median_of_sorted(&s[..n / 2]),
        q2: median_of_sorted(&s),
        q3: median_of_sorted(&s[(n + 1) / 2..]),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
}

pub fn summary_statistics(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let m = mean(&s);
    Some(Summary {
        min: s[0],
        max: s[s.len() - 1],
        mean: m,
        median: median_of_sorted(&s),
        std: population_std(&s, m),
    })
}

/// `error / actual * 100`, or 0 when `actual` is 0.
///
/// The zero fallback pulls mean percentage error slightly toward zero for
/// records with a zero wait.
pub fn percentage_error(error: f64, actual: f64) -> f64 {
    if actual > 0.0 {
        error / actual * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    pub mean_error: f64,
    pub mae: f64,
    pub rmse: f64,
    pub median_error: f64,
    pub median_abs_error: f64,
    pub mean_pct_error: f64,
    pub std_error: f64,
}

/// Builds [`ErrorMetrics`] from signed, absolute and percentage errors.
/// Returns `None` if `errors` is empty.
pub fn error_metrics(errors: &[f64], abs_errors: &[f64], pct_errors: &[f64]) -> Option<ErrorMetrics> {
    let summary = summary_statistics(errors)?;
    let squared: Vec<f64> = errors.iter().map(|e| e * e).collect();
    Some(ErrorMetrics {
        mean_error: summary.mean,
        mae: mean(abs_errors),
        rmse: mean(&squared).sqrt(),
        median_error: summary.median,
        median_abs_error: median(abs_errors).unwrap_or(0.0),
        mean_pct_error: mean(pct_errors),
        std_error: summary.std,
    })
}

/// The three predictions carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    Lidar,
    Throughput,
    Final,
}

impl Estimator {
    pub const ALL: [Estimator; 3] = [Estimator::Lidar, Estimator::Throughput, Estimator::Final];

    pub fn estimate(self, record: &Record) -> f64 {
        let obs = record.observation();
        match self {
            Estimator::Lidar => obs.lidar_est_time,
            Estimator::Throughput => obs.throughput_est_time,
            Estimator::Final => obs.final_est_time,
        }
    }

    /// Signed error in seconds; positive means the prediction was too long.
    pub fn error(self, record: &Record) -> f64 {
        self.estimate(record) - f64::from(record.actual_pass_time())
    }

    pub fn pct_error(self, record: &Record) -> f64 {
        percentage_error(self.error(record), f64::from(record.actual_pass_time()))
    }
}

/// Error metrics of one estimator over a set of records.
pub fn accuracy<'a, I>(records: I, estimator: Estimator) -> Option<ErrorMetrics>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut errors = Vec::new();
    let mut abs_errors = Vec::new();
    let mut pct_errors = Vec::new();
    for r in records {
        let e = estimator.error(r);
        errors.push(e);
        abs_errors.push(e.abs());
        pct_errors.push(estimator.pct_error(r));
    }
    error_metrics(&errors, &abs_errors, &pct_errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::record;

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(pct(50, 100), 50.0);
        assert_eq!(pct(1, 4), 25.0);
    }

    #[test]
    fn test_quartiles_odd_excludes_median() {
        let q = quartiles(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(q.q2, 3.0);
        // halves are [1, 2] and [4, 5]
        assert_eq!(q.q1, 1.5);
        assert_eq!(q.q3, 4.5);
    }

    #[test]
    fn test_quartiles_even_disjoint_halves() {
        let q = quartiles(&[8.0, 1.0, 6.0, 3.0, 2.0, 7.0]).unwrap();
        // sorted [1, 2, 3, 6, 7, 8]
        assert_eq!(q.q1, 2.0);
        assert_eq!(q.q2, 4.5);
        assert_eq!(q.q3, 7.0);
    }

    #[test]
    fn test_quartiles_single_and_empty() {
        assert_eq!(quartiles(&[]), None);
        assert_eq!(
            quartiles(&[4.0]),
            Some(Quartiles {
                q1: 0.0,
                q2: 4.0,
                q3: 0.0
            })
        );
    }

    #[test]
    fn test_summary_statistics() {
        let s = summary_statistics(&[5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.median, 3.0);
        assert!((s.std - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary_statistics(&[]), None);
    }

    #[test]
    fn test_population_std_is_stable_for_large_offsets() {
        let values = [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0];
        let s = summary_statistics(&values).unwrap();
        // variance of [4, 7, 13, 16] is 22.5
        assert!((s.std - 22.5_f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_percentage_error_zero_actual() {
        assert_eq!(percentage_error(30.0, 0.0), 0.0);
        assert_eq!(percentage_error(-30.0, 120.0), -25.0);
    }

    #[test]
    fn test_error_metrics() {
        let errors = [-10.0, 20.0, 30.0, -40.0];
        let abs: Vec<f64> = errors.iter().map(|e: &f64| e.abs()).collect();
        let pcts = [10.0, 20.0];
        let m = error_metrics(&errors, &abs, &pcts).unwrap();

        assert_eq!(m.mean_error, 0.0);
        assert_eq!(m.mae, 25.0);
        assert!((m.rmse - 750.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(m.median_error, 5.0);
        assert_eq!(m.median_abs_error, 25.0);
        assert_eq!(m.mean_pct_error, 15.0);
        assert_eq!(error_metrics(&[], &[], &[]), None);
    }

    #[test]
    fn test_accuracy_per_estimator() {
        // estimates are lidar 100, throughput 120, final 110
        let records = vec![record(5, 1, 100), record(5, 1, 0)];
        let lidar = accuracy(&records, Estimator::Lidar).unwrap();
        assert_eq!(lidar.mean_error, 50.0);
        assert_eq!(lidar.mae, 50.0);
        assert_eq!(lidar.mean_pct_error, 0.0);

        let throughput = accuracy(&records, Estimator::Throughput).unwrap();
        assert_eq!(throughput.mean_error, 70.0);
        // 20% for the first record, 0 for the zero-wait one
        assert_eq!(throughput.mean_pct_error, 10.0);
    }
}
