use serde::Serialize;
use std::collections::HashMap;

use crate::appreciation::AppreciationTable;
use crate::model::{normalize_entries, NormalizedGrade, RejectedEntry, Snapshot};
use crate::rank::competition_ranks;
use crate::stats::{cohort_statistic, CohortStatistic};

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Two-decimal rounding used on every figure that lands on a printed report.
pub fn round_to_two(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round2_opt(value: Option<f64>) -> Option<f64> {
    value.map(round_to_two)
}

/// Reduces one student's entries for one (subject, term) to a single average
/// on the report scale. Absent entries are excluded, never counted as zero;
/// no remaining entry means no average at all. Weighted by gradesheet weight,
/// falling back to a plain mean when the weights sum to zero.
pub fn subject_average(grades: &[NormalizedGrade<'_>]) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut plain_sum = 0.0;
    let mut scored = 0usize;
    for grade in grades {
        if grade.is_absent {
            continue;
        }
        weighted_sum += grade.points * grade.weight;
        weight_sum += grade.weight;
        plain_sum += grade.points;
        scored += 1;
    }
    if scored == 0 {
        return None;
    }
    if weight_sum > 0.0 {
        Some(weighted_sum / weight_sum)
    } else {
        Some(plain_sum / scored as f64)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_id: i64,
    pub subject_name: String,
    pub coefficient: f64,
    pub average: Option<f64>,
    pub total: Option<f64>,
    pub rank: Option<usize>,
    pub appreciation: Option<String>,
    /// Annual reports only: this subject's average per term, in term order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_averages: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLine {
    pub subject_group_id: i64,
    pub name: String,
    pub points: f64,
    pub coefficient: f64,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub display_name: String,
    pub subjects: Vec<SubjectLine>,
    pub groups: Vec<GroupLine>,
    pub total_points: f64,
    pub total_coefficient: f64,
    pub overall_average: Option<f64>,
    pub rank: Option<usize>,
    pub appreciation: Option<String>,
    /// Annual reports only: the overall average of each term, in term order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_overalls: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject_id: i64,
    pub subject_name: String,
    pub statistic: Option<CohortStatistic>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    /// Set for a term report; a null term with several termIds is an annual.
    pub term_id: Option<String>,
    pub term_ids: Vec<String>,
    pub scale: f64,
    pub students: Vec<StudentReport>,
    pub per_subject: Vec<SubjectStat>,
    pub global: Option<CohortStatistic>,
    pub global_appreciation: Option<String>,
    pub rejected: Vec<RejectedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appreciation_error: Option<CalcError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentViewLine {
    pub subject_id: i64,
    pub subject_name: String,
    pub coefficient: f64,
    pub average: Option<f64>,
    pub rank: Option<usize>,
    pub appreciation: Option<String>,
    pub graded_count: usize,
    pub cohort: Option<CohortStatistic>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentViewModel {
    pub student_id: String,
    pub display_name: String,
    pub term_id: String,
    pub subjects: Vec<StudentViewLine>,
    pub total_points: f64,
    pub total_coefficient: f64,
    pub overall_average: Option<f64>,
    pub rank: Option<usize>,
    pub appreciation: Option<String>,
    pub global: Option<CohortStatistic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appreciation_error: Option<CalcError>,
}

enum Scope<'a> {
    Term(&'a str),
    Annual,
}

/// Raw (unrounded) per-student figures, kept internal so every reduction runs
/// at full precision and rounding happens exactly once, at the edge.
struct RawReport {
    /// Parallel to the ordered subject list.
    subject_averages: Vec<Option<f64>>,
    /// [subject][term] averages, term order; only used by annual reports.
    per_term: Vec<Vec<Option<f64>>>,
    total_points: f64,
    total_coefficient: f64,
    overall: Option<f64>,
    term_overalls: Vec<Option<f64>>,
}

struct Labeler {
    table: Option<AppreciationTable>,
    error: Option<CalcError>,
}

impl Labeler {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        if snapshot.appreciation_bands.is_empty() {
            return Self {
                table: None,
                error: None,
            };
        }
        match AppreciationTable::new(&snapshot.appreciation_bands, snapshot.scale) {
            Ok(table) => Self {
                table: Some(table),
                error: None,
            },
            Err(e) => Self {
                table: None,
                error: Some(e),
            },
        }
    }

    fn label(&mut self, average: Option<f64>) -> Option<String> {
        let table = self.table.as_ref()?;
        let value = average?;
        match table.label(value) {
            Some(label) => Some(label.to_string()),
            None => {
                // Validation guarantees coverage, so a miss is a config bug.
                if self.error.is_none() {
                    self.error = Some(CalcError::new(
                        "appreciation_gap",
                        format!("no appreciation band matches average {}", value),
                    ));
                }
                None
            }
        }
    }
}

/// Report for one classroom and one term.
pub fn term_report(snapshot: &Snapshot, term_id: &str) -> Result<ReportModel, CalcError> {
    build_report(snapshot, Scope::Term(term_id))
}

/// Annualized report across every term of the snapshot: each subject's annual
/// average is the plain mean of its graded term averages, and the usual
/// group/overall reduction is re-applied on top of those.
pub fn annual_report(snapshot: &Snapshot) -> Result<ReportModel, CalcError> {
    build_report(snapshot, Scope::Annual)
}

fn build_report(snapshot: &Snapshot, scope: Scope<'_>) -> Result<ReportModel, CalcError> {
    snapshot.check_preconditions()?;

    let scope_terms: Vec<&str> = match scope {
        Scope::Term(term_id) => {
            let term = snapshot
                .term(term_id)
                .ok_or_else(|| CalcError::new("not_found", format!("unknown term {}", term_id)))?;
            vec![term.id.as_str()]
        }
        Scope::Annual => snapshot
            .ordered_terms()
            .iter()
            .map(|t| t.id.as_str())
            .collect(),
    };
    let annual = matches!(scope, Scope::Annual);

    let (grades, mut rejected) = normalize_entries(snapshot);
    // A report only carries the rejections for its own terms; unknown_term
    // rejections belong to no term and ride along on every report.
    rejected.retain(|r| r.code == "unknown_term" || scope_terms.contains(&r.term_id.as_str()));

    // (student, subject, term) buckets over the in-scope terms.
    let mut buckets: HashMap<(&str, i64, &str), Vec<NormalizedGrade<'_>>> = HashMap::new();
    for grade in &grades {
        if !scope_terms.contains(&grade.term_id) {
            continue;
        }
        buckets
            .entry((grade.student_id, grade.subject_id, grade.term_id))
            .or_default()
            .push(*grade);
    }

    let subjects = snapshot.ordered_subjects();
    let groups = snapshot.ordered_groups();

    let mut raw_reports: Vec<RawReport> = Vec::with_capacity(snapshot.students.len());
    for student in &snapshot.students {
        let mut subject_averages = Vec::with_capacity(subjects.len());
        let mut per_term = Vec::with_capacity(subjects.len());
        for subject in &subjects {
            let term_averages: Vec<Option<f64>> = scope_terms
                .iter()
                .map(|term_id| {
                    buckets
                        .get(&(student.id.as_str(), subject.id, *term_id))
                        .and_then(|entries| subject_average(entries))
                })
                .collect();
            let average = if annual {
                let graded: Vec<f64> = term_averages.iter().flatten().copied().collect();
                if graded.is_empty() {
                    None
                } else {
                    Some(graded.iter().sum::<f64>() / graded.len() as f64)
                }
            } else {
                term_averages.first().copied().flatten()
            };
            subject_averages.push(average);
            per_term.push(term_averages);
        }

        let mut total_points = 0.0;
        let mut total_coefficient = 0.0;
        for (subject, average) in subjects.iter().zip(&subject_averages) {
            if let Some(avg) = average {
                total_points += avg * subject.coefficient;
                total_coefficient += subject.coefficient;
            }
        }
        let overall = if total_coefficient > 0.0 {
            Some(total_points / total_coefficient)
        } else {
            None
        };

        let term_overalls: Vec<Option<f64>> = (0..scope_terms.len())
            .map(|term_idx| {
                let mut points = 0.0;
                let mut coefficient = 0.0;
                for (subject, term_averages) in subjects.iter().zip(&per_term) {
                    if let Some(avg) = term_averages[term_idx] {
                        points += avg * subject.coefficient;
                        coefficient += subject.coefficient;
                    }
                }
                if coefficient > 0.0 {
                    Some(points / coefficient)
                } else {
                    None
                }
            })
            .collect();

        raw_reports.push(RawReport {
            subject_averages,
            per_term,
            total_points,
            total_coefficient,
            overall,
            term_overalls,
        });
    }

    // Ranks and statistics work on the rounded figures so two students whose
    // printed averages are equal always share a rank.
    let overall_rounded: Vec<Option<f64>> =
        raw_reports.iter().map(|r| round2_opt(r.overall)).collect();
    let overall_ranks = competition_ranks(&overall_rounded);

    let success_mark = snapshot.scale / 2.0;
    let mut subject_ranks: Vec<Vec<Option<usize>>> = Vec::with_capacity(subjects.len());
    let mut per_subject: Vec<SubjectStat> = Vec::with_capacity(subjects.len());
    for (subject_idx, subject) in subjects.iter().enumerate() {
        let rounded: Vec<Option<f64>> = raw_reports
            .iter()
            .map(|r| round2_opt(r.subject_averages[subject_idx]))
            .collect();
        subject_ranks.push(competition_ranks(&rounded));
        per_subject.push(SubjectStat {
            subject_id: subject.id,
            subject_name: subject.name.clone(),
            statistic: cohort_statistic(&rounded, success_mark).map(rounded_statistic),
        });
    }
    let global = cohort_statistic(&overall_rounded, success_mark).map(rounded_statistic);

    let mut labeler = Labeler::from_snapshot(snapshot);
    let global_appreciation = labeler.label(global.map(|g| g.average));

    let mut students: Vec<StudentReport> = Vec::with_capacity(snapshot.students.len());
    for (student_idx, (student, raw)) in snapshot.students.iter().zip(&raw_reports).enumerate() {
        let mut subject_lines = Vec::with_capacity(subjects.len());
        for (subject_idx, subject) in subjects.iter().enumerate() {
            let average = round2_opt(raw.subject_averages[subject_idx]);
            subject_lines.push(SubjectLine {
                subject_id: subject.id,
                subject_name: subject.name.clone(),
                coefficient: subject.coefficient,
                average,
                total: round2_opt(
                    raw.subject_averages[subject_idx].map(|avg| avg * subject.coefficient),
                ),
                rank: subject_ranks[subject_idx][student_idx],
                appreciation: labeler.label(average),
                term_averages: if annual {
                    Some(
                        raw.per_term[subject_idx]
                            .iter()
                            .map(|v| round2_opt(*v))
                            .collect(),
                    )
                } else {
                    None
                },
            });
        }

        let group_lines = groups
            .iter()
            .map(|group| {
                let mut points = 0.0;
                let mut coefficient = 0.0;
                for (subject, average) in subjects.iter().zip(&raw.subject_averages) {
                    if subject.subject_group_id != group.id {
                        continue;
                    }
                    if let Some(avg) = average {
                        points += avg * subject.coefficient;
                        coefficient += subject.coefficient;
                    }
                }
                GroupLine {
                    subject_group_id: group.id,
                    name: group.name.clone(),
                    points: round_to_two(points),
                    coefficient,
                    average: if coefficient > 0.0 {
                        Some(round_to_two(points / coefficient))
                    } else {
                        None
                    },
                }
            })
            .collect();

        let overall_average = overall_rounded[student_idx];
        students.push(StudentReport {
            student_id: student.id.clone(),
            display_name: student.display_name(),
            subjects: subject_lines,
            groups: group_lines,
            total_points: round_to_two(raw.total_points),
            total_coefficient: raw.total_coefficient,
            overall_average,
            rank: overall_ranks[student_idx],
            appreciation: labeler.label(overall_average),
            term_overalls: if annual {
                Some(raw.term_overalls.iter().map(|v| round2_opt(*v)).collect())
            } else {
                None
            },
        });
    }

    Ok(ReportModel {
        term_id: match scope {
            Scope::Term(term_id) => Some(term_id.to_string()),
            Scope::Annual => None,
        },
        term_ids: scope_terms.iter().map(|t| t.to_string()).collect(),
        scale: snapshot.scale,
        students,
        per_subject,
        global,
        global_appreciation,
        rejected,
        appreciation_error: labeler.error,
    })
}

/// One student's view of a term report, with the cohort's per-subject spread
/// attached to each line the way the printed report cards show it.
pub fn student_term_view(
    snapshot: &Snapshot,
    student_id: &str,
    term_id: &str,
) -> Result<StudentViewModel, CalcError> {
    if snapshot.student(student_id).is_none() {
        return Err(CalcError::new(
            "not_found",
            format!("student {} is not in the roster", student_id),
        ));
    }
    let report = term_report(snapshot, term_id)?;
    let student = report
        .students
        .into_iter()
        .find(|s| s.student_id == student_id)
        .ok_or_else(|| {
            CalcError::new("not_found", format!("student {} not reported", student_id))
        })?;

    let subjects = student
        .subjects
        .into_iter()
        .zip(&report.per_subject)
        .map(|(line, stat)| StudentViewLine {
            subject_id: line.subject_id,
            subject_name: line.subject_name,
            coefficient: line.coefficient,
            average: line.average,
            rank: line.rank,
            appreciation: line.appreciation,
            graded_count: stat.statistic.map(|s| s.graded_count).unwrap_or(0),
            cohort: stat.statistic,
        })
        .collect();

    Ok(StudentViewModel {
        student_id: student.student_id,
        display_name: student.display_name,
        term_id: term_id.to_string(),
        subjects,
        total_points: student.total_points,
        total_coefficient: student.total_coefficient,
        overall_average: student.overall_average,
        rank: student.rank,
        appreciation: student.appreciation,
        global: report.global,
        appreciation_error: report.appreciation_error,
    })
}

fn rounded_statistic(stat: CohortStatistic) -> CohortStatistic {
    CohortStatistic {
        min: round_to_two(stat.min),
        max: round_to_two(stat.max),
        average: round_to_two(stat.average),
        success_rate: round_to_two(stat.success_rate),
        graded_count: stat.graded_count,
    }
}
