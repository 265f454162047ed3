// schoolcanon-core/src/domain/schema/vocabulary.rs

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// A closed vocabulary a categorical field is harmonized into.
///
/// Labels that match nothing are carried through as an explicit `unmapped`
/// value instead of being dropped, so new source vocabulary stays visible.
pub trait Vocabulary: Sized + Clone + PartialEq {
    /// Canonical column holding this vocabulary.
    const FIELD: &'static str;

    /// Case-insensitive lookup of a canonical label.
    fn from_label(label: &str) -> Option<Self>;

    fn unmapped(raw: &str) -> Self;

    fn is_unmapped(&self) -> bool;
}

// =============================================================================
//  STUDENT CATEGORIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalCategory {
    AllStudents,
    Female,
    Male,
    NonBinary,
    Asian,
    Black,
    Hispanic,
    White,
    MultiRacial,
    NativeAmerican,
    Swd,
    NotSwd,
    CurrentEll,
    EverEll,
    NeverEll,
    EconDisadv,
    NotEconDisadv,
    Unmapped(String),
}

impl CanonicalCategory {
    pub const KNOWN: [CanonicalCategory; 17] = [
        Self::AllStudents,
        Self::Female,
        Self::Male,
        Self::NonBinary,
        Self::Asian,
        Self::Black,
        Self::Hispanic,
        Self::White,
        Self::MultiRacial,
        Self::NativeAmerican,
        Self::Swd,
        Self::NotSwd,
        Self::CurrentEll,
        Self::EverEll,
        Self::NeverEll,
        Self::EconDisadv,
        Self::NotEconDisadv,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::AllStudents => "All Students",
            Self::Female => "Female",
            Self::Male => "Male",
            Self::NonBinary => "Non-Binary",
            Self::Asian => "Asian",
            Self::Black => "Black",
            Self::Hispanic => "Hispanic",
            Self::White => "White",
            Self::MultiRacial => "Multi-Racial",
            Self::NativeAmerican => "Native American",
            Self::Swd => "SWD",
            Self::NotSwd => "Not SWD",
            Self::CurrentEll => "Current ELL",
            Self::EverEll => "Ever ELL",
            Self::NeverEll => "Never ELL",
            Self::EconDisadv => "Econ Disadv",
            Self::NotEconDisadv => "Not Econ Disadv",
            Self::Unmapped(raw) => raw,
        }
    }
}

impl Vocabulary for CanonicalCategory {
    const FIELD: &'static str = "category";

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::KNOWN
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
            .cloned()
    }

    fn unmapped(raw: &str) -> Self {
        Self::Unmapped(raw.trim().to_string())
    }

    fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped(_))
    }
}

impl fmt::Display for CanonicalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
//  EXAM SUBJECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExamSubject {
    Ela,
    Math,
    Unmapped(String),
}

impl ExamSubject {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ela => "ela",
            Self::Math => "math",
            Self::Unmapped(raw) => raw,
        }
    }
}

impl Vocabulary for ExamSubject {
    const FIELD: &'static str = "exam";

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "ela" => Some(Self::Ela),
            "math" => Some(Self::Math),
            _ => None,
        }
    }

    fn unmapped(raw: &str) -> Self {
        Self::Unmapped(raw.trim().to_string())
    }

    fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped(_))
    }
}

impl fmt::Display for ExamSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
//  EXAM GRADES
// =============================================================================

pub const ALL_GRADES: &str = "All Grades";

// "3", "03", "3.0", "Grade 3", "Grade 3 ELA"
#[allow(clippy::expect_used)]
static GRADE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:grade\s*)?0*(\d{1,2})(?:\.0+)?(?:\s|$)").expect("static grade regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExamGrade {
    Grade(u8),
    AllGrades,
}

impl ExamGrade {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(ALL_GRADES) || raw.eq_ignore_ascii_case("all") {
            return Some(Self::AllGrades);
        }
        let caps = GRADE_PATTERN.captures(raw)?;
        let grade: u8 = caps.get(1)?.as_str().parse().ok()?;
        (1..=12).contains(&grade).then_some(Self::Grade(grade))
    }
}

impl fmt::Display for ExamGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grade(g) => write!(f, "{}", g),
            Self::AllGrades => write!(f, "{}", ALL_GRADES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip() {
        for cat in CanonicalCategory::KNOWN {
            assert_eq!(CanonicalCategory::from_label(cat.as_str()), Some(cat.clone()));
        }
        assert_eq!(
            CanonicalCategory::from_label("  not swd "),
            Some(CanonicalCategory::NotSwd)
        );
        assert_eq!(CanonicalCategory::from_label("Homeless"), None);
    }

    #[test]
    fn test_subject_lookup() {
        assert_eq!(ExamSubject::from_label("ELA"), Some(ExamSubject::Ela));
        assert_eq!(ExamSubject::from_label("Mathematics"), None);
        assert!(ExamSubject::unmapped("Science").is_unmapped());
    }

    #[test]
    fn test_grade_parsing() {
        assert_eq!(ExamGrade::parse("3"), Some(ExamGrade::Grade(3)));
        assert_eq!(ExamGrade::parse("08"), Some(ExamGrade::Grade(8)));
        assert_eq!(ExamGrade::parse("4.0"), Some(ExamGrade::Grade(4)));
        assert_eq!(ExamGrade::parse("Grade 5 ELA"), Some(ExamGrade::Grade(5)));
        assert_eq!(ExamGrade::parse("All Grades"), Some(ExamGrade::AllGrades));
        assert_eq!(ExamGrade::parse("Grade K"), None);
        assert_eq!(ExamGrade::parse("13"), None);
        assert_eq!(ExamGrade::Grade(7).to_string(), "7");
    }
}
