use serde_json::json;

use crate::calc::CalcError;
use crate::model::AppreciationBand;

const BAND_EPSILON: f64 = 1e-9;

/// Validated, ordered appreciation bands for one school. Built once per
/// snapshot; lookups during report generation are read-only.
#[derive(Debug, Clone)]
pub struct AppreciationTable {
    bands: Vec<AppreciationBand>,
}

impl AppreciationTable {
    /// Validates that the bands are well-formed, contiguous and cover the
    /// whole `0..scale` range. A broken configuration fails here so numeric
    /// results can still be produced with labels marked unavailable.
    pub fn new(bands: &[AppreciationBand], scale: f64) -> Result<Self, CalcError> {
        if bands.is_empty() {
            return Err(CalcError::new("no_bands", "no appreciation bands configured"));
        }
        let mut sorted = bands.to_vec();
        sorted.sort_by(|a, b| {
            a.min_grade
                .partial_cmp(&b.min_grade)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for band in &sorted {
            if !(band.max_grade > band.min_grade) {
                return Err(CalcError::new(
                    "empty_band",
                    format!("band '{}' has no width", band.appreciation),
                )
                .with_details(json!({ "minGrade": band.min_grade, "maxGrade": band.max_grade })));
            }
        }
        if sorted[0].min_grade.abs() > BAND_EPSILON {
            return Err(CalcError::new(
                "bands_gap",
                format!("bands start at {} instead of 0", sorted[0].min_grade),
            ));
        }
        for pair in sorted.windows(2) {
            let gap = pair[1].min_grade - pair[0].max_grade;
            if gap > BAND_EPSILON {
                return Err(CalcError::new(
                    "bands_gap",
                    format!(
                        "no band covers {} to {}",
                        pair[0].max_grade, pair[1].min_grade
                    ),
                ));
            }
            if gap < -BAND_EPSILON {
                return Err(CalcError::new(
                    "bands_overlap",
                    format!(
                        "band '{}' overlaps band '{}'",
                        pair[0].appreciation, pair[1].appreciation
                    ),
                ));
            }
        }
        let top = &sorted[sorted.len() - 1];
        if (top.max_grade - scale).abs() > BAND_EPSILON {
            return Err(CalcError::new(
                "bands_gap",
                format!("bands stop at {} instead of {}", top.max_grade, scale),
            ));
        }

        Ok(Self { bands: sorted })
    }

    /// First band where `min <= average < max`; the top band also accepts its
    /// own upper bound so a perfect score still gets a label.
    pub fn label(&self, average: f64) -> Option<&str> {
        for (idx, band) in self.bands.iter().enumerate() {
            let top = idx + 1 == self.bands.len();
            if average >= band.min_grade
                && (average < band.max_grade || (top && average <= band.max_grade))
            {
                return Some(&band.appreciation);
            }
        }
        None
    }
}
