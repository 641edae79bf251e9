use crate::calc::{self, DetailedReport, FinalStatus, SubjectOutcome, TermOutcome};
use crate::model::{Grade, GradeRecord, Student, Subject, Term};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

const RANK_WORDS: [&str; 10] = [
    "الأول", "الثاني", "الثالث", "الرابع", "الخامس", "السادس", "السابع", "الثامن", "التاسع", "العاشر",
];

const TOP_VIEW_LIMIT: usize = 10;

/// Which percentage a cohort view is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportTerm {
    Term1,
    Term2,
    Final,
}

impl ReportTerm {
    /// Accepts `1`, `2` or `"final"`, the same shapes the reports screen sends.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        if let Some(n) = v.as_i64() {
            return match Term::from_number(n)? {
                Term::First => Some(ReportTerm::Term1),
                Term::Second => Some(ReportTerm::Term2),
            };
        }
        match v.as_str()?.trim().to_ascii_lowercase().as_str() {
            "1" => Some(ReportTerm::Term1),
            "2" => Some(ReportTerm::Term2),
            "final" => Some(ReportTerm::Final),
            _ => None,
        }
    }

    pub fn metric(self, report: &DetailedReport) -> f64 {
        match self {
            ReportTerm::Term1 => report.term1_percentage,
            ReportTerm::Term2 => report.term2_percentage,
            ReportTerm::Final => report.final_percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    All,
    Top,
    Failed,
}

impl ViewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(ViewMode::All),
            "top" => Some(ViewMode::Top),
            "failed" => Some(ViewMode::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    T1,
    T2,
    Both,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub subject_id: String,
    pub subject: String,
    pub reason: &'static str,
    #[serde(rename = "type")]
    pub kind: FailureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedReport {
    #[serde(flatten)]
    pub report: DetailedReport,
    pub metric: f64,
    pub rank: usize,
    pub rank_label: String,
    pub term_status: FinalStatus,
    pub failures: Vec<FailureDetail>,
}

pub fn rank_label(rank: usize) -> String {
    rank.checked_sub(1)
        .and_then(|i| RANK_WORDS.get(i))
        .map(|w| w.to_string())
        .unwrap_or_else(|| rank.to_string())
}

// -0.0 and 0.0 compare equal, so they must share a key.
fn metric_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0_f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Competition ranks for `metrics`, in input order.
///
/// Rank is one plus the position of the first equal value in the
/// descending order, so ties share a rank and the next value skips ahead.
/// NaN equals nothing and gets rank 0.
pub fn competition_ranks(metrics: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = metrics.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let mut first_index: HashMap<u64, usize> = HashMap::new();
    for (i, v) in sorted.iter().enumerate() {
        first_index.entry(metric_key(*v)).or_insert(i);
    }

    metrics
        .iter()
        .map(|v| {
            if v.is_nan() {
                0
            } else {
                first_index.get(&metric_key(*v)).map(|i| i + 1).unwrap_or(0)
            }
        })
        .collect()
}

/// Term-specific pass/retake: a term view fails on any failed or absent term.
pub fn term_status(report: &DetailedReport, term: ReportTerm) -> FinalStatus {
    let single = match term {
        ReportTerm::Term1 => Term::First,
        ReportTerm::Term2 => Term::Second,
        ReportTerm::Final => return report.final_status,
    };
    let failed = report
        .term_results(single)
        .any(|t| matches!(t.status, TermOutcome::Fail | TermOutcome::Absent));
    if failed {
        FinalStatus::Retake
    } else {
        FinalStatus::Passed
    }
}

pub fn failure_details(report: &DetailedReport) -> Vec<FailureDetail> {
    report
        .subjects
        .iter()
        .filter_map(|s| {
            let (reason, kind) = match s.status {
                SubjectOutcome::FailT1 => ("فصل أول", FailureKind::T1),
                SubjectOutcome::FailT2 => ("فصل ثاني", FailureKind::T2),
                SubjectOutcome::FailBoth => ("الفصلين", FailureKind::Both),
                SubjectOutcome::FailAbsent => ("غياب", FailureKind::Absent),
                SubjectOutcome::Pass | SubjectOutcome::Exempt => return None,
            };
            Some(FailureDetail {
                subject_id: s.subject_id.clone(),
                subject: s.subject_name.clone(),
                reason,
                kind,
            })
        })
        .collect()
}

pub fn rank_cohort(reports: Vec<DetailedReport>, term: ReportTerm) -> Vec<RankedReport> {
    let metrics: Vec<f64> = reports.iter().map(|r| term.metric(r)).collect();
    let ranks = competition_ranks(&metrics);
    reports
        .into_iter()
        .zip(metrics)
        .zip(ranks)
        .map(|((report, metric), rank)| RankedReport {
            term_status: term_status(&report, term),
            failures: failure_details(&report),
            report,
            metric,
            rank,
            rank_label: rank_label(rank),
        })
        .collect()
}

pub fn apply_view(ranked: Vec<RankedReport>, view: ViewMode) -> Vec<RankedReport> {
    match view {
        ViewMode::All => ranked,
        ViewMode::Top => {
            let mut passing: Vec<RankedReport> = ranked
                .into_iter()
                .filter(|r| r.term_status == FinalStatus::Passed)
                .collect();
            passing.sort_by_key(|r| r.rank);
            passing.truncate(TOP_VIEW_LIMIT);
            passing
        }
        ViewMode::Failed => ranked
            .into_iter()
            .filter(|r| r.term_status == FinalStatus::Retake)
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub level_counts: Vec<calc::LevelBucket>,
}

pub fn cohort_stats(ranked: &[RankedReport]) -> CohortStats {
    let mut level_counts: Vec<calc::LevelBucket> = calc::default_tier_names()
        .map(|name| calc::LevelBucket {
            name: name.to_string(),
            count: 0,
        })
        .collect();

    for r in ranked {
        let level = calc::classify_level(r.metric, 100.0, None);
        let idx = level_counts
            .iter()
            .position(|b| b.name == level.name)
            .unwrap_or(level_counts.len() - 1);
        level_counts[idx].count += 1;
    }

    let total = ranked.len();
    let passed = ranked
        .iter()
        .filter(|r| r.term_status == FinalStatus::Passed)
        .count();
    CohortStats {
        total,
        passed,
        failed: total - passed,
        pass_rate: if total > 0 {
            100.0 * passed as f64 / total as f64
        } else {
            0.0
        },
        level_counts,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeCount {
    pub grade: Grade,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    pub total: usize,
    pub grade_counts: Vec<GradeCount>,
    pub passed: usize,
    pub retake: usize,
    /// Whole percent.
    pub pass_rate: f64,
}

/// School-wide totals. Each student is judged on the subjects of their own grade.
pub fn school_summary(
    students: &[Student],
    subjects: &[Subject],
    records: &[GradeRecord],
) -> SchoolSummary {
    let mut grade_counts = Vec::new();
    let mut passed = 0;
    for grade in Grade::ALL {
        let count = students.iter().filter(|s| s.grade == grade).count();
        if count == 0 {
            continue;
        }
        grade_counts.push(GradeCount { grade, count });
        passed += calc::compile_cohort(grade, students, subjects, records)
            .iter()
            .filter(|r| r.final_status == FinalStatus::Passed)
            .count();
    }

    let total = students.len();
    SchoolSummary {
        total,
        grade_counts,
        passed,
        retake: total - passed,
        pass_rate: if total > 0 {
            (100.0 * passed as f64 / total as f64).round()
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{compile_report, SubjectOutcome};
    use crate::model::{Grade, GradeRecord, Student, Subject};

    fn student(id: &str) -> Student {
        Student {
            id: id.to_string(),
            name: id.to_string(),
            grade: Grade::G5,
            section: String::new(),
            religion: None,
            seating_number: None,
            photo_url: None,
        }
    }

    fn report_with(id: &str, t1: f64, t2: f64) -> DetailedReport {
        let sub = Subject {
            id: "m".into(),
            name: "الرياضيات".into(),
            grade: Grade::G5,
            max_continuous: 0.0,
            max_exam: 100.0,
            pass_percentage: None,
            level_scale: None,
        };
        let records = vec![
            GradeRecord {
                exam: t1,
                ..GradeRecord::blank(id, "m", Term::First)
            },
            GradeRecord {
                exam: t2,
                ..GradeRecord::blank(id, "m", Term::Second)
            },
        ];
        compile_report(&student(id), &[sub], &records)
    }

    #[test]
    fn ties_share_rank_and_skip_next() {
        let cohort = vec![
            report_with("a", 90.0, 90.0),
            report_with("b", 70.0, 70.0),
            report_with("c", 90.0, 90.0),
        ];
        let ranked = rank_cohort(cohort, ReportTerm::Final);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 3, 1]);
        let labels: Vec<&str> = ranked.iter().map(|r| r.rank_label.as_str()).collect();
        assert_eq!(labels, vec!["الأول", "3", "الأول"]);
        // Input order is kept.
        assert_eq!(ranked[1].report.student.id, "b");
    }

    #[test]
    fn ninety_ninety_seventy_ranks_one_one_three() {
        assert_eq!(competition_ranks(&[90.0, 90.0, 70.0]), vec![1, 1, 3]);
    }

    #[test]
    fn rank_gaps_never_exceed_tie_group_size() {
        let metrics = [55.0, 80.0, 80.0, 80.0, 61.5, 61.5, 99.0, 10.0];
        let ranks = competition_ranks(&metrics);
        let mut distinct: Vec<usize> = ranks.clone();
        distinct.sort_unstable();
        distinct.dedup();
        for w in distinct.windows(2) {
            let tied = ranks.iter().filter(|r| **r == w[0]).count();
            assert_eq!(w[1] - w[0], tied);
        }
        for (i, a) in metrics.iter().enumerate() {
            for (j, b) in metrics.iter().enumerate() {
                if a == b {
                    assert_eq!(ranks[i], ranks[j]);
                }
            }
        }
    }

    #[test]
    fn nan_and_signed_zero_ranking() {
        assert_eq!(competition_ranks(&[0.0, -0.0, f64::NAN, 5.0]), vec![2, 2, 0, 1]);
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn labels_cover_first_ten_then_numerals() {
        assert_eq!(rank_label(1), "الأول");
        assert_eq!(rank_label(2), "الثاني");
        assert_eq!(rank_label(10), "العاشر");
        assert_eq!(rank_label(11), "11");
        assert_eq!(rank_label(0), "0");
    }

    #[test]
    fn term_view_uses_selected_term_statuses() {
        let r = report_with("a", 80.0, 20.0);
        assert_eq!(r.subjects[0].status, SubjectOutcome::FailT2);
        assert_eq!(term_status(&r, ReportTerm::Term1), FinalStatus::Passed);
        assert_eq!(term_status(&r, ReportTerm::Term2), FinalStatus::Retake);
        assert_eq!(term_status(&r, ReportTerm::Final), FinalStatus::Retake);

        let details = failure_details(&r);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].kind, FailureKind::T2);
        assert_eq!(details[0].reason, "فصل ثاني");
    }

    #[test]
    fn term_metric_selects_percentage() {
        let cohort = vec![report_with("a", 40.0, 95.0), report_with("b", 60.0, 50.0)];
        let ranked = rank_cohort(cohort.clone(), ReportTerm::Term1);
        assert_eq!(ranked[0].rank, 2);
        assert_eq!(ranked[1].rank, 1);
        let ranked = rank_cohort(cohort, ReportTerm::Term2);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].metric, 95.0);
    }

    #[test]
    fn views_filter_top_and_failed() {
        let mut cohort = Vec::new();
        for i in 0..12 {
            let score = 50.0 + i as f64;
            cohort.push(report_with(&format!("s{}", i), score, score));
        }
        cohort.push(report_with("weak", 10.0, 10.0));
        let ranked = rank_cohort(cohort, ReportTerm::Final);

        let top = apply_view(ranked.clone(), ViewMode::Top);
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].report.student.id, "s11");
        assert!(top.windows(2).all(|w| w[0].rank <= w[1].rank));

        let failed = apply_view(ranked.clone(), ViewMode::Failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].report.student.id, "weak");

        assert_eq!(apply_view(ranked, ViewMode::All).len(), 13);
    }

    #[test]
    fn stats_count_passes_and_levels() {
        let cohort = vec![
            report_with("a", 95.0, 95.0),
            report_with("b", 70.0, 70.0),
            report_with("c", 30.0, 30.0),
            report_with("d", -20.0, -20.0),
        ];
        let stats = cohort_stats(&rank_cohort(cohort, ReportTerm::Final));
        assert_eq!(stats.total, 4);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.pass_rate, 50.0);
        let counts: Vec<usize> = stats.level_counts.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 0, 1, 0, 2]);

        let empty = cohort_stats(&[]);
        assert_eq!(empty.pass_rate, 0.0);
        assert_eq!(empty.level_counts.len(), 5);
    }

    #[test]
    fn school_summary_counts_non_empty_grades_and_rounds_rate() {
        let mut g2 = student("g2");
        g2.grade = Grade::G2;
        let students = vec![student("a"), student("b"), student("c"), g2];
        let math = Subject {
            id: "m".into(),
            name: "الرياضيات".into(),
            grade: Grade::G5,
            max_continuous: 0.0,
            max_exam: 100.0,
            pass_percentage: None,
            level_scale: None,
        };
        let passing = |id: &str| {
            [Term::First, Term::Second].map(|t| GradeRecord {
                exam: 80.0,
                ..GradeRecord::blank(id, "m", t)
            })
        };
        let mut records: Vec<GradeRecord> = passing("a").into_iter().chain(passing("b")).collect();
        // A G5 subject never counts against a G2 student.
        records.extend(passing("g2"));

        let summary = school_summary(&students, &[math], &records);
        assert_eq!(summary.total, 4);
        let counts: Vec<(Grade, usize)> = summary.grade_counts.iter().map(|g| (g.grade, g.count)).collect();
        assert_eq!(counts, vec![(Grade::G2, 1), (Grade::G5, 3)]);
        // a and b pass; c has no scores; g2 has no subjects, a degenerate pass.
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.retake, 1);
        assert_eq!(summary.pass_rate, 75.0);

        let empty = school_summary(&[], &[], &[]);
        assert_eq!(empty.pass_rate, 0.0);
        assert!(empty.grade_counts.is_empty());
    }

    #[test]
    fn report_term_parses_json_shapes() {
        use serde_json::json;
        assert_eq!(ReportTerm::from_json(&json!(1)), Some(ReportTerm::Term1));
        assert_eq!(ReportTerm::from_json(&json!(2)), Some(ReportTerm::Term2));
        assert_eq!(ReportTerm::from_json(&json!("final")), Some(ReportTerm::Final));
        assert_eq!(ReportTerm::from_json(&json!("FINAL")), Some(ReportTerm::Final));
        assert_eq!(ReportTerm::from_json(&json!(3)), None);
        assert_eq!(ReportTerm::from_json(&json!(null)), None);
    }
}
