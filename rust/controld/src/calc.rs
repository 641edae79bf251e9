use crate::model::{Grade, GradeRecord, LevelRange, Religion, Student, Subject, Term};
use serde::Serialize;
use std::collections::HashMap;

/// Level name when the maximum score is zero (nothing to classify against).
pub const LEVEL_UNDEFINED: &str = "---";
/// Level name when a custom scale has no tier low enough for the percentage.
pub const LEVEL_UNSPECIFIED: &str = "غير محدد";
pub const LEVEL_EXEMPT: &str = "معفى";

struct DefaultTier {
    name: &'static str,
    min_percent: f64,
    color: &'static str,
}

// Ordered by descending min_percent; the last tier is the 0 floor.
const DEFAULT_SCALE: [DefaultTier; 5] = [
    DefaultTier {
        name: "ممتاز",
        min_percent: 90.0,
        color: "text-emerald-600",
    },
    DefaultTier {
        name: "جيد جداً",
        min_percent: 80.0,
        color: "text-blue-600",
    },
    DefaultTier {
        name: "جيد",
        min_percent: 65.0,
        color: "text-indigo-600",
    },
    DefaultTier {
        name: "مقبول",
        min_percent: 50.0,
        color: "text-amber-600",
    },
    DefaultTier {
        name: "ضعيف",
        min_percent: 0.0,
        color: "text-red-600",
    },
];

const ISLAMIC_KEYWORDS: [&str; 4] = ["إسلامية", "الدين الإسلامي", "التربية الإسلامية", "القرآن"];

pub fn default_scale() -> Vec<LevelRange> {
    DEFAULT_SCALE
        .iter()
        .map(|t| LevelRange {
            name: t.name.to_string(),
            min_percent: t.min_percent,
            color: Some(t.color.to_string()),
        })
        .collect()
}

/// Tier names of the default scale, best first.
pub fn default_tier_names() -> impl Iterator<Item = &'static str> {
    DEFAULT_SCALE.iter().map(|t| t.name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Level {
    fn sentinel(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: None,
        }
    }
}

/// Custom scale sorted best tier first. An empty or missing scale yields the default.
pub fn active_scale(scale: Option<&[LevelRange]>) -> Vec<LevelRange> {
    match scale.filter(|s| !s.is_empty()) {
        Some(custom) => {
            let mut sorted = custom.to_vec();
            sorted.sort_by(|a, b| b.min_percent.total_cmp(&a.min_percent));
            sorted
        }
        None => default_scale(),
    }
}

pub fn classify_level(score: f64, max_score: f64, scale: Option<&[LevelRange]>) -> Level {
    if max_score <= 0.0 {
        return Level::sentinel(LEVEL_UNDEFINED);
    }
    let percent = 100.0 * score / max_score;
    active_scale(scale)
        .into_iter()
        .find(|r| percent >= r.min_percent)
        .map(|r| Level {
            name: r.name,
            color: r.color,
        })
        .unwrap_or_else(|| Level::sentinel(LEVEL_UNSPECIFIED))
}

pub fn is_islamic_subject(name: &str) -> bool {
    ISLAMIC_KEYWORDS.iter().any(|k| name.contains(k))
}

pub fn is_exempt(student: &Student, subject: &Subject) -> bool {
    student.religion == Some(Religion::Christian) && is_islamic_subject(&subject.name)
}

/// Absence flags of one term entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Absence {
    pub whole: bool,
    pub continuous: bool,
    pub exam: bool,
}

impl Absence {
    pub fn of(record: &GradeRecord) -> Self {
        Self {
            whole: record.absent,
            continuous: record.continuous_absent,
            exam: record.exam_absent,
        }
    }

    pub fn any(self) -> bool {
        self.whole || self.continuous || self.exam
    }

    pub fn is_partial(self) -> bool {
        self.continuous || self.exam
    }

    /// Whole-term absence wins, then any component absence fails the term,
    /// and only a fully present term is judged against the threshold.
    pub fn resolve(self, score: f64, pass_threshold: f64) -> TermOutcome {
        if self.whole {
            TermOutcome::Absent
        } else if self.is_partial() {
            TermOutcome::Fail
        } else if score >= pass_threshold {
            TermOutcome::Pass
        } else {
            TermOutcome::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermOutcome {
    Pass,
    Fail,
    Absent,
    Exempt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermStatus {
    pub subject_id: String,
    pub subject_name: String,
    pub score: f64,
    pub max_score: f64,
    pub status: TermOutcome,
    pub is_absent: bool,
    pub percentage: f64,
    pub level: String,
}

pub fn evaluate_term(student: &Student, subject: &Subject, record: Option<&GradeRecord>) -> TermStatus {
    if is_exempt(student, subject) {
        return TermStatus {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            score: 0.0,
            max_score: 0.0,
            status: TermOutcome::Exempt,
            is_absent: false,
            percentage: 0.0,
            level: LEVEL_EXEMPT.to_string(),
        };
    }

    let absence = record.map(Absence::of).unwrap_or_default();
    let (continuous, exam) = record.map(|r| (r.continuous, r.exam)).unwrap_or((0.0, 0.0));
    let score = (if absence.continuous { 0.0 } else { continuous })
        + (if absence.exam { 0.0 } else { exam });
    let max_score = subject.max_term_total();
    let pass_threshold = max_score * subject.pass_percentage() / 100.0;

    TermStatus {
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        score,
        max_score,
        status: absence.resolve(score, pass_threshold),
        is_absent: absence.any(),
        percentage: if max_score > 0.0 {
            100.0 * score / max_score
        } else {
            0.0
        },
        level: classify_level(score, max_score, subject.level_scale.as_deref()).name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectOutcome {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "fail_t1")]
    FailT1,
    #[serde(rename = "fail_t2")]
    FailT2,
    #[serde(rename = "fail_both")]
    FailBoth,
    #[serde(rename = "fail_absent")]
    FailAbsent,
    #[serde(rename = "exempt")]
    Exempt,
}

impl SubjectOutcome {
    pub fn is_clear(self) -> bool {
        matches!(self, SubjectOutcome::Pass | SubjectOutcome::Exempt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub subject_name: String,
    /// Entries actually evaluated (blank stand-ins when nothing was recorded).
    pub t1: GradeRecord,
    pub t2: GradeRecord,
    pub term1: TermStatus,
    pub term2: TermStatus,
    pub total: f64,
    pub status: SubjectOutcome,
}

impl SubjectResult {
    pub fn term(&self, term: Term) -> &TermStatus {
        match term {
            Term::First => &self.term1,
            Term::Second => &self.term2,
        }
    }
}

pub fn aggregate_subject(
    student: &Student,
    subject: &Subject,
    t1: Option<&GradeRecord>,
    t2: Option<&GradeRecord>,
) -> SubjectResult {
    let t1 = t1
        .cloned()
        .unwrap_or_else(|| GradeRecord::blank(&student.id, &subject.id, Term::First));
    let t2 = t2
        .cloned()
        .unwrap_or_else(|| GradeRecord::blank(&student.id, &subject.id, Term::Second));
    let term1 = evaluate_term(student, subject, Some(&t1));
    let term2 = evaluate_term(student, subject, Some(&t2));
    let exempt = is_exempt(student, subject);

    let status = if exempt {
        SubjectOutcome::Exempt
    } else if Absence::of(&t1).any() || Absence::of(&t2).any() {
        SubjectOutcome::FailAbsent
    } else {
        let t1_fail = term1.status == TermOutcome::Fail;
        let t2_fail = term2.status == TermOutcome::Fail;
        match (t1_fail, t2_fail) {
            (true, true) => SubjectOutcome::FailBoth,
            (true, false) => SubjectOutcome::FailT1,
            (false, true) => SubjectOutcome::FailT2,
            (false, false) => SubjectOutcome::Pass,
        }
    };
    let total = if exempt {
        0.0
    } else {
        (term1.score + term2.score) / 2.0
    };

    SubjectResult {
        subject_id: subject.id.clone(),
        subject_name: subject.name.clone(),
        t1,
        t2,
        term1,
        term2,
        total,
        status,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinalStatus {
    #[serde(rename = "ناجح")]
    Passed,
    #[serde(rename = "دور ثاني")]
    Retake,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedReport {
    pub student: Student,
    pub subjects: Vec<SubjectResult>,
    pub term1_percentage: f64,
    pub term2_percentage: f64,
    pub final_percentage: f64,
    pub final_status: FinalStatus,
    pub final_level: String,
}

impl DetailedReport {
    pub fn term_results(&self, term: Term) -> impl Iterator<Item = &TermStatus> + '_ {
        self.subjects.iter().map(move |s| s.term(term))
    }
}

/// Aggregate percentage of one term; exempt subjects add nothing to either side.
fn aggregate_percentage<'a, I>(results: I) -> f64
where
    I: IntoIterator<Item = &'a TermStatus>,
{
    let mut total_score = 0.0_f64;
    let mut total_max = 0.0_f64;
    for r in results {
        if r.status == TermOutcome::Exempt {
            continue;
        }
        total_score += r.score;
        total_max += r.max_score;
    }
    if total_max > 0.0 {
        100.0 * total_score / total_max
    } else {
        0.0
    }
}

pub fn compile_report(student: &Student, subjects: &[Subject], records: &[GradeRecord]) -> DetailedReport {
    let own: Vec<&GradeRecord> = records.iter().filter(|r| r.student_id == student.id).collect();
    compile_with(student, subjects, &own)
}

fn compile_with(student: &Student, subjects: &[Subject], own: &[&GradeRecord]) -> DetailedReport {
    let find = |subject_id: &str, term: Term| {
        own.iter()
            .copied()
            .find(|r| r.subject_id == subject_id && r.term == term)
    };

    let results: Vec<SubjectResult> = subjects
        .iter()
        .map(|sub| {
            aggregate_subject(
                student,
                sub,
                find(&sub.id, Term::First),
                find(&sub.id, Term::Second),
            )
        })
        .collect();

    let term1_percentage = aggregate_percentage(results.iter().map(|r| &r.term1));
    let term2_percentage = aggregate_percentage(results.iter().map(|r| &r.term2));
    let final_percentage = (term1_percentage + term2_percentage) / 2.0;
    let final_status = if results.iter().all(|r| r.status.is_clear()) {
        FinalStatus::Passed
    } else {
        FinalStatus::Retake
    };
    let final_level = classify_level(final_percentage, 100.0, None).name;

    DetailedReport {
        student: student.clone(),
        subjects: results,
        term1_percentage,
        term2_percentage,
        final_percentage,
        final_status,
        final_level,
    }
}

/// Reports for every student of `grade`, scored against that grade's subjects.
pub fn compile_cohort(
    grade: Grade,
    students: &[Student],
    subjects: &[Subject],
    records: &[GradeRecord],
) -> Vec<DetailedReport> {
    let grade_subjects: Vec<Subject> = subjects.iter().filter(|s| s.grade == grade).cloned().collect();
    let mut by_student: HashMap<&str, Vec<&GradeRecord>> = HashMap::new();
    for r in records {
        by_student.entry(r.student_id.as_str()).or_default().push(r);
    }
    students
        .iter()
        .filter(|s| s.grade == grade)
        .map(|s| {
            let own = by_student.get(s.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            compile_with(s, &grade_subjects, own)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelBucket {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDistribution {
    pub subject_id: String,
    pub term: Term,
    pub tiers: Vec<LevelBucket>,
    pub unspecified: usize,
    pub exempt: usize,
}

/// Tier counts for one subject and term across the students of the subject's grade.
pub fn subject_level_distribution(
    subject: &Subject,
    students: &[Student],
    records: &[GradeRecord],
    term: Term,
) -> LevelDistribution {
    let mut tiers: Vec<LevelBucket> = active_scale(subject.level_scale.as_deref())
        .into_iter()
        .map(|r| LevelBucket {
            name: r.name,
            count: 0,
        })
        .collect();
    let mut unspecified = 0;
    let mut exempt = 0;

    for student in students.iter().filter(|s| s.grade == subject.grade) {
        let record = records
            .iter()
            .find(|r| r.student_id == student.id && r.subject_id == subject.id && r.term == term);
        let status = evaluate_term(student, subject, record);
        if status.status == TermOutcome::Exempt {
            exempt += 1;
            continue;
        }
        match tiers.iter_mut().find(|b| b.name == status.level) {
            Some(bucket) => bucket.count += 1,
            None => unspecified += 1,
        }
    }

    LevelDistribution {
        subject_id: subject.id.clone(),
        term,
        tiers,
        unspecified,
        exempt,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryField {
    Continuous,
    Exam,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryIssue {
    pub student_id: String,
    pub subject_id: String,
    pub term: Term,
    pub field: EntryField,
    pub value: f64,
    pub max: f64,
}

/// Component scores above their caps, skipping exempt students and whole-term absences.
pub fn validate_entries(students: &[Student], subject: &Subject, records: &[GradeRecord]) -> Vec<EntryIssue> {
    let mut issues = Vec::new();
    for r in records.iter().filter(|r| r.subject_id == subject.id) {
        let exempt = students
            .iter()
            .find(|s| s.id == r.student_id)
            .map(|s| is_exempt(s, subject))
            .unwrap_or(false);
        if exempt || r.absent {
            continue;
        }
        let mut push = |field: EntryField, value: f64, max: f64| {
            issues.push(EntryIssue {
                student_id: r.student_id.clone(),
                subject_id: r.subject_id.clone(),
                term: r.term,
                field,
                value,
                max,
            })
        };
        if !r.continuous_absent && r.continuous > subject.max_continuous {
            push(EntryField::Continuous, r.continuous, subject.max_continuous);
        }
        if !r.exam_absent && r.exam > subject.max_exam {
            push(EntryField::Exam, r.exam, subject.max_exam);
        }
    }
    issues
}
