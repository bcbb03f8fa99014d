use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::calc::CalcError;

pub const DEFAULT_SCALE: f64 = 20.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        match (self.last_name.as_deref(), self.first_name.as_deref()) {
            (Some(last), Some(first)) => format!("{}, {}", last, first),
            (Some(last), None) => last.to_string(),
            (None, Some(first)) => first.to_string(),
            (None, None) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub coefficient: f64,
    pub subject_group_id: i64,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i64,
}

/// One grade cell as entered on a gradesheet. `scale` and `weight` come from
/// the sheet itself; `value` is on the sheet's scale, not the report scale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: String,
    pub subject_id: i64,
    pub grade_sheet_id: i64,
    pub term_id: String,
    #[serde(default)]
    pub value: f64,
    pub scale: f64,
    #[serde(default)]
    pub is_absent: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppreciationBand {
    pub min_grade: f64,
    pub max_grade: f64,
    pub appreciation: String,
}

/// The full in-memory input set for one cohort: roster, reference data and
/// raw grade entries for every term of the school year. Pure data; the caller
/// owns fetching and any caching.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default = "default_scale")]
    pub scale: f64,
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub subject_groups: Vec<SubjectGroup>,
    pub terms: Vec<Term>,
    #[serde(default)]
    pub grade_entries: Vec<GradeEntry>,
    #[serde(default)]
    pub appreciation_bands: Vec<AppreciationBand>,
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

impl Snapshot {
    /// Fatal precondition checks. A snapshot that fails here is rejected as a
    /// whole before any computation starts; per-entry problems are handled by
    /// `normalize_entries` instead.
    pub fn check_preconditions(&self) -> Result<(), CalcError> {
        if !(self.scale > 0.0) {
            return Err(CalcError::new("bad_scale", "report scale must be > 0"));
        }
        if self.students.is_empty() {
            return Err(CalcError::new("empty_roster", "snapshot has no students"));
        }
        if self.subjects.is_empty() {
            return Err(CalcError::new("no_subjects", "snapshot has no subjects"));
        }
        if self.terms.is_empty() {
            return Err(CalcError::new("no_terms", "snapshot has no terms"));
        }

        let mut student_ids = HashSet::new();
        for s in &self.students {
            if !student_ids.insert(s.id.as_str()) {
                return Err(CalcError::new(
                    "duplicate_student",
                    format!("duplicate student id: {}", s.id),
                ));
            }
        }
        let mut term_ids = HashSet::new();
        for t in &self.terms {
            if !term_ids.insert(t.id.as_str()) {
                return Err(CalcError::new(
                    "duplicate_term",
                    format!("duplicate term id: {}", t.id),
                ));
            }
        }
        let group_ids: HashSet<i64> = self.subject_groups.iter().map(|g| g.id).collect();
        if group_ids.len() != self.subject_groups.len() {
            return Err(CalcError::new("duplicate_group", "duplicate subject group id"));
        }

        let mut subject_ids = HashSet::new();
        for subject in &self.subjects {
            if !subject_ids.insert(subject.id) {
                return Err(CalcError::new(
                    "duplicate_subject",
                    format!("duplicate subject id: {}", subject.id),
                ));
            }
            if !(subject.coefficient > 0.0) {
                return Err(CalcError::new(
                    "bad_coefficient",
                    format!("subject {} has non-positive coefficient", subject.id),
                ));
            }
            if !group_ids.contains(&subject.subject_group_id) {
                return Err(CalcError::new(
                    "unknown_group",
                    format!(
                        "subject {} references unknown subject group {}",
                        subject.id, subject.subject_group_id
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn term(&self, term_id: &str) -> Option<&Term> {
        self.terms.iter().find(|t| t.id == term_id)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn ordered_terms(&self) -> Vec<&Term> {
        let mut terms: Vec<&Term> = self.terms.iter().collect();
        terms.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        terms
    }

    pub fn ordered_subjects(&self) -> Vec<&Subject> {
        let mut subjects: Vec<&Subject> = self.subjects.iter().collect();
        subjects.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        subjects
    }

    pub fn ordered_groups(&self) -> Vec<&SubjectGroup> {
        let mut groups: Vec<&SubjectGroup> = self.subject_groups.iter().collect();
        groups.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        groups
    }
}

/// A grade entry that passed validation, rescaled to the report scale.
/// Absent entries are kept so "absent on every sheet" can be told apart from
/// "no entry at all", but they never contribute points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedGrade<'a> {
    pub student_id: &'a str,
    pub subject_id: i64,
    pub term_id: &'a str,
    pub points: f64,
    pub weight: f64,
    pub is_absent: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEntry {
    pub index: usize,
    pub student_id: String,
    pub subject_id: i64,
    pub grade_sheet_id: i64,
    pub term_id: String,
    pub code: String,
    pub message: String,
}

/// Validates every raw entry against the snapshot's reference data and
/// rescales accepted values to the report scale. One bad entry never aborts
/// the run; it lands in the rejected list and the rest keep going.
pub fn normalize_entries<'a>(
    snapshot: &'a Snapshot,
) -> (Vec<NormalizedGrade<'a>>, Vec<RejectedEntry>) {
    let student_ids: HashSet<&str> = snapshot.students.iter().map(|s| s.id.as_str()).collect();
    let subject_ids: HashSet<i64> = snapshot.subjects.iter().map(|s| s.id).collect();
    let term_ids: HashSet<&str> = snapshot.terms.iter().map(|t| t.id.as_str()).collect();

    let mut accepted = Vec::with_capacity(snapshot.grade_entries.len());
    let mut rejected = Vec::new();

    for (index, entry) in snapshot.grade_entries.iter().enumerate() {
        let reject = |code: &str, message: String| RejectedEntry {
            index,
            student_id: entry.student_id.clone(),
            subject_id: entry.subject_id,
            grade_sheet_id: entry.grade_sheet_id,
            term_id: entry.term_id.clone(),
            code: code.to_string(),
            message,
        };

        if !(entry.scale > 0.0) {
            rejected.push(reject(
                "bad_scale",
                format!("gradesheet scale must be > 0, got {}", entry.scale),
            ));
            continue;
        }
        if !student_ids.contains(entry.student_id.as_str()) {
            rejected.push(reject(
                "unknown_student",
                format!("student {} is not in the roster", entry.student_id),
            ));
            continue;
        }
        if !subject_ids.contains(&entry.subject_id) {
            rejected.push(reject(
                "unknown_subject",
                format!("unknown subject {}", entry.subject_id),
            ));
            continue;
        }
        if !term_ids.contains(entry.term_id.as_str()) {
            rejected.push(reject(
                "unknown_term",
                format!("unknown term {}", entry.term_id),
            ));
            continue;
        }
        if entry.weight < 0.0 {
            rejected.push(reject(
                "bad_weight",
                format!("negative gradesheet weight {}", entry.weight),
            ));
            continue;
        }
        if !entry.is_absent {
            if entry.value < 0.0 {
                rejected.push(reject(
                    "negative_value",
                    format!("grade value {} is negative", entry.value),
                ));
                continue;
            }
            if entry.value > entry.scale {
                rejected.push(reject(
                    "value_above_scale",
                    format!("grade value {} exceeds scale {}", entry.value, entry.scale),
                ));
                continue;
            }
        }

        let points = if entry.is_absent {
            0.0
        } else {
            entry.value / entry.scale * snapshot.scale
        };
        accepted.push(NormalizedGrade {
            student_id: &entry.student_id,
            subject_id: entry.subject_id,
            term_id: &entry.term_id,
            points,
            weight: entry.weight,
            is_absent: entry.is_absent,
        });
    }

    (accepted, rejected)
}
