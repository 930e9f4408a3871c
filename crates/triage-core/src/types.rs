//! Core types for incident triage
//!
//! Defines the domain values the loop works with:
//! - Responder departments
//! - Urgency scores
//! - Classification results and their persisted (flattened) form

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator used when flattening list fields into a single cell
pub const LIST_SEPARATOR: &str = ", ";

/// City department responsible for an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Department {
    /// Police
    Police,
    /// Fire Department
    FireDepartment,
    /// Sanitation
    Sanitation,
    /// Public Works
    PublicWorks,
    /// Social Services
    SocialServices,
}

impl Department {
    /// Every department, in the order they are offered to the model
    pub const ALL: [Department; 5] = [
        Department::Police,
        Department::FireDepartment,
        Department::Sanitation,
        Department::PublicWorks,
        Department::SocialServices,
    ];

    /// Canonical spelling as persisted in the sheet
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Department::Police => "Police",
            Department::FireDepartment => "Fire Department",
            Department::Sanitation => "Sanitation",
            Department::PublicWorks => "Public Works",
            Department::SocialServices => "Social Services",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown department name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown department: '{0}'")]
pub struct UnknownDepartment(pub String);

impl FromStr for Department {
    type Err = UnknownDepartment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Department::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownDepartment(wanted.to_string()))
    }
}

/// Urgency score in `1..=10`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Urgency(u8);

impl Urgency {
    /// Lowest urgency
    pub const MIN: Urgency = Urgency(1);
    /// Highest urgency
    pub const MAX: Urgency = Urgency(10);

    /// Create urgency, rejecting values outside `1..=10`
    #[inline]
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Create urgency, clamping into `1..=10`
    #[inline]
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        let clamped = value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        // In range after the clamp above.
        Self(u8::try_from(clamped).unwrap_or(Self::MIN.0))
    }

    /// Parse a numeric cell such as `"4"`, `"4.0"` or `" 7 "`
    ///
    /// Returns `None` for empty or non-numeric text. Numeric values outside
    /// the range are clamped.
    #[must_use]
    pub fn parse_lenient(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(whole) = text.parse::<i64>() {
            return Some(Self::clamped(whole));
        }
        let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
        #[allow(clippy::cast_possible_truncation)]
        Some(Self::clamped(float.round() as i64))
    }

    /// Numeric value
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured fields extracted from one incident message
///
/// Transient: only ever persisted through the four output cells of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    /// Place names mentioned in the message
    pub place: Vec<String>,
    /// One or two keywords describing the incident
    pub keywords: Vec<String>,
    /// Response urgency
    pub urgency: Option<Urgency>,
    /// Responsible department.
    ///
    /// `None` means the reply carried no department at all; `Some("")` means
    /// the model decided no department needs to respond.
    pub department: Option<String>,
}

impl ClassificationResult {
    /// The safe default for an unparseable reply
    #[inline]
    #[must_use]
    pub fn malformed() -> Self {
        Self::default()
    }

    /// Check if this is the unparseable-reply default
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.department.is_none()
    }

    /// Department parsed against the fixed enumeration
    #[must_use]
    pub fn known_department(&self) -> Option<Department> {
        self.department.as_deref().and_then(|d| d.parse().ok())
    }

    /// Place list flattened for a text cell
    #[inline]
    #[must_use]
    pub fn place_text(&self) -> String {
        flatten_list(&self.place)
    }

    /// Keyword list flattened for a text cell
    #[inline]
    #[must_use]
    pub fn keywords_text(&self) -> String {
        flatten_list(&self.keywords)
    }

    /// Convert into the four persisted cell values
    #[must_use]
    pub fn to_outputs(&self) -> RowOutputs {
        RowOutputs {
            place: self.place_text(),
            keywords: self.keywords_text(),
            urgency: self.urgency.map(|u| u.to_string()).unwrap_or_default(),
            department: self.department.clone().unwrap_or_default(),
        }
    }
}

/// Join list items into one cell, dropping blank entries
#[must_use]
pub fn flatten_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// The four output cells of a row, in their flat text form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOutputs {
    /// Comma-joined places
    pub place: String,
    /// Comma-joined keywords
    pub keywords: String,
    /// Urgency as a decimal string, or empty
    pub urgency: String,
    /// Department name, or empty
    pub department: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_parse_is_case_insensitive() {
        assert_eq!("public works".parse::<Department>(), Ok(Department::PublicWorks));
        assert_eq!(" FIRE DEPARTMENT ".parse::<Department>(), Ok(Department::FireDepartment));
        assert!("Parks".parse::<Department>().is_err());
        assert!("".parse::<Department>().is_err());
    }

    #[test]
    fn department_display_roundtrip() {
        for dept in Department::ALL {
            assert_eq!(dept.to_string().parse::<Department>(), Ok(dept));
        }
    }

    #[test]
    fn urgency_bounds() {
        assert!(Urgency::new(0).is_none());
        assert!(Urgency::new(11).is_none());
        assert_eq!(Urgency::new(7).map(|u| u.value()), Some(7));
        assert_eq!(Urgency::clamped(-3), Urgency::MIN);
        assert_eq!(Urgency::clamped(42), Urgency::MAX);
    }

    #[test]
    fn urgency_lenient_parse() {
        assert_eq!(Urgency::parse_lenient("4"), Urgency::new(4));
        assert_eq!(Urgency::parse_lenient(" 4.0 "), Urgency::new(4));
        assert_eq!(Urgency::parse_lenient("15"), Some(Urgency::MAX));
        assert_eq!(Urgency::parse_lenient("high"), None);
        assert_eq!(Urgency::parse_lenient(""), None);
        assert_eq!(Urgency::parse_lenient("NaN"), None);
    }

    #[test]
    fn outputs_flatten_lists() {
        let result = ClassificationResult {
            place: vec!["Main St".into(), "5th Ave".into()],
            keywords: vec!["pothole".into()],
            urgency: Urgency::new(4),
            department: Some("Public Works".into()),
        };

        let out = result.to_outputs();
        assert_eq!(out.place, "Main St, 5th Ave");
        assert_eq!(out.keywords, "pothole");
        assert_eq!(out.urgency, "4");
        assert_eq!(out.department, "Public Works");
        assert_eq!(result.known_department(), Some(Department::PublicWorks));
    }

    #[test]
    fn malformed_result_is_empty() {
        let result = ClassificationResult::malformed();
        assert!(result.is_malformed());
        assert_eq!(result.to_outputs(), RowOutputs::default());

        let nothing_applies = ClassificationResult {
            department: Some(String::new()),
            ..ClassificationResult::default()
        };
        assert!(!nothing_applies.is_malformed());
    }

    #[test]
    fn flatten_skips_blank_items() {
        let items = vec![" a ".to_string(), String::new(), "b".to_string()];
        assert_eq!(flatten_list(&items), "a, b");
        assert_eq!(flatten_list(&[]), "");
    }
}
