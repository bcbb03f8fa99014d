use serde::Serialize;

/// Min/max/mean/success-rate over one cohort, for one subject or globally.
/// `average` is the plain arithmetic mean of the students' averages, not a
/// coefficient-weighted one; weighting only happens inside a single report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStatistic {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    pub success_rate: f64,
    pub graded_count: usize,
}

/// Computes the cohort statistic over the non-null averages only. Returns
/// `None` when nobody has a value; callers must treat that as "no data"
/// rather than folding it into zeros or infinities.
pub fn cohort_statistic(averages: &[Option<f64>], success_mark: f64) -> Option<CohortStatistic> {
    let graded: Vec<f64> = averages.iter().flatten().copied().collect();
    if graded.is_empty() {
        return None;
    }
    let mut min = graded[0];
    let mut max = graded[0];
    let mut sum = 0.0;
    let mut successes = 0usize;
    for &value in &graded {
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
        sum += value;
        if value >= success_mark {
            successes += 1;
        }
    }
    Some(CohortStatistic {
        min,
        max,
        average: sum / graded.len() as f64,
        success_rate: successes as f64 / graded.len() as f64,
        graded_count: graded.len(),
    })
}
