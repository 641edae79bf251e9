use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "الصف الأول", alias = "G1")]
    G1,
    #[serde(rename = "الصف الثاني", alias = "G2")]
    G2,
    #[serde(rename = "الصف الثالث", alias = "G3")]
    G3,
    #[serde(rename = "الصف الرابع", alias = "G4")]
    G4,
    #[serde(rename = "الصف الخامس", alias = "G5")]
    G5,
    #[serde(rename = "الصف السادس", alias = "G6")]
    G6,
    #[serde(rename = "الصف السابع", alias = "G7")]
    G7,
    #[serde(rename = "الصف الثامن", alias = "G8")]
    G8,
    #[serde(rename = "الصف التاسع", alias = "G9")]
    G9,
    #[serde(rename = "الصف العاشر", alias = "G10")]
    G10,
    #[serde(rename = "الصف الحادي عشر", alias = "G11")]
    G11,
    #[serde(rename = "الصف الثاني عشر", alias = "G12")]
    G12,
}

impl Grade {
    pub const ALL: [Grade; 12] = [
        Grade::G1,
        Grade::G2,
        Grade::G3,
        Grade::G4,
        Grade::G5,
        Grade::G6,
        Grade::G7,
        Grade::G8,
        Grade::G9,
        Grade::G10,
        Grade::G11,
        Grade::G12,
    ];

    /// Display label, also the stored and wire form.
    pub fn label(self) -> &'static str {
        match self {
            Grade::G1 => "الصف الأول",
            Grade::G2 => "الصف الثاني",
            Grade::G3 => "الصف الثالث",
            Grade::G4 => "الصف الرابع",
            Grade::G5 => "الصف الخامس",
            Grade::G6 => "الصف السادس",
            Grade::G7 => "الصف السابع",
            Grade::G8 => "الصف الثامن",
            Grade::G9 => "الصف التاسع",
            Grade::G10 => "الصف العاشر",
            Grade::G11 => "الصف الحادي عشر",
            Grade::G12 => "الصف الثاني عشر",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Grade::G1 => "G1",
            Grade::G2 => "G2",
            Grade::G3 => "G3",
            Grade::G4 => "G4",
            Grade::G5 => "G5",
            Grade::G6 => "G6",
            Grade::G7 => "G7",
            Grade::G8 => "G8",
            Grade::G9 => "G9",
            Grade::G10 => "G10",
            Grade::G11 => "G11",
            Grade::G12 => "G12",
        }
    }

    /// Accepts either the label or the short `G1`..`G12` code.
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.label() == t || g.code().eq_ignore_ascii_case(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Religion {
    Muslim,
    Christian,
}

impl Religion {
    pub fn as_str(self) -> &'static str {
        match self {
            Religion::Muslim => "muslim",
            Religion::Christian => "christian",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "muslim" => Some(Religion::Muslim),
            "christian" => Some(Religion::Christian),
            _ => None,
        }
    }
}

/// Grading period. Serialized as the bare number `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    First,
    Second,
}

impl Term {
    pub fn number(self) -> u8 {
        match self {
            Term::First => 1,
            Term::Second => 2,
        }
    }

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Term::First),
            2 => Some(Term::Second),
            _ => None,
        }
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for Term {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = i64::deserialize(deserializer)?;
        Term::from_number(n).ok_or_else(|| D::Error::custom(format!("term must be 1 or 2, got {n}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade: Grade,
    #[serde(default)]
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<Religion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seating_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRange {
    pub name: String,
    pub min_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub grade: Grade,
    #[serde(default)]
    pub max_continuous: f64,
    #[serde(default)]
    pub max_exam: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_scale: Option<Vec<LevelRange>>,
}

impl Subject {
    pub const DEFAULT_PASS_PERCENTAGE: f64 = 50.0;

    /// Per-term maximum: continuous cap plus exam cap.
    pub fn max_term_total(&self) -> f64 {
        self.max_continuous + self.max_exam
    }

    pub fn pass_percentage(&self) -> f64 {
        self.pass_percentage.unwrap_or(Self::DEFAULT_PASS_PERCENTAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub student_id: String,
    pub subject_id: String,
    pub term: Term,
    #[serde(default)]
    pub continuous: f64,
    #[serde(default)]
    pub exam: f64,
    #[serde(default)]
    pub absent: bool,
    #[serde(default)]
    pub continuous_absent: bool,
    #[serde(default)]
    pub exam_absent: bool,
}

impl GradeRecord {
    /// Stand-in for a missing entry: 0/0 and present.
    pub fn blank(student_id: &str, subject_id: &str, term: Term) -> Self {
        Self {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            term,
            continuous: 0.0,
            exam: 0.0,
            absent: false,
            continuous_absent: false,
            exam_absent: false,
        }
    }
}
