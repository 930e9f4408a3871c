//! Department board
//!
//! Read-only projection of the persisted sheet for display: one lane per
//! department, cards sorted by urgency, each card tinted from yellow (1) to
//! red (10). The board reads the sheet independently of the poll loop and
//! never writes.

use crate::config::SchemaConfig;
use crate::table::{column_matches, Table, DEPARTMENT_COLUMN, KEYWORDS_COLUMN, PLACE_COLUMN, URGENCY_COLUMN};
use crate::types::{Department, Urgency};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write as _;

/// Lane order on the board
pub const LANE_ORDER: [Department; 5] = [
    Department::Police,
    Department::FireDepartment,
    Department::PublicWorks,
    Department::Sanitation,
    Department::SocialServices,
];

/// Numeric value of a raw urgency cell, if it has one
fn numeric_urgency(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Map a raw urgency cell onto the 1..=10 display scale
///
/// Empty or non-numeric cells show as 1. Fractions are truncated (7.9 shows
/// as 7) and out-of-range values are clamped.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn display_urgency(raw: &str) -> u8 {
    numeric_urgency(raw).map_or(Urgency::MIN, |v| Urgency::clamped(v.trunc() as i64)).value()
}

/// Card color for a display urgency, from `#ffff00` (1) to `#ff0000` (10)
#[must_use]
pub fn urgency_color(urgency: u8) -> String {
    let urgency = u32::from(urgency.clamp(Urgency::MIN.value(), Urgency::MAX.value()));
    let green = 255 * (10 - urgency) / 9;
    format!("#ff{green:02x}00")
}

/// One incident on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    /// Place cell
    pub place: String,
    /// Keywords cell
    pub keywords: String,
    /// Message cell
    pub message: String,
    /// Display urgency (1..=10)
    pub urgency: u8,
    /// Hex card color
    pub color: String,
}

/// All incidents for one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lane {
    /// Department
    pub department: Department,
    /// Cards, most urgent first
    pub cards: Vec<Card>,
}

impl Lane {
    /// Header line such as `Police (2 incidents)`
    #[must_use]
    pub fn title(&self) -> String {
        let n = self.cards.len();
        format!("{} ({n} incident{})", self.department, if n == 1 { "" } else { "s" })
    }
}

/// Incidents grouped by department
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    /// Lanes in [`LANE_ORDER`]
    pub lanes: Vec<Lane>,
}

impl Board {
    /// Project a sheet onto the board
    ///
    /// Rows whose department is not in the enumeration are left off. A sheet
    /// without a department column yields empty lanes.
    #[must_use]
    pub fn from_table(table: &Table, schema: &SchemaConfig) -> Self {
        let find = |name: &str| table.columns().iter().position(|c| column_matches(c, name));
        let department = find(DEPARTMENT_COLUMN);
        let place = find(PLACE_COLUMN);
        let keywords = find(KEYWORDS_COLUMN);
        let urgency = find(URGENCY_COLUMN);
        let message = find(&schema.message_column);

        let cell = |row: usize, col: Option<usize>| col.map_or("", |c| table.cell(row, c)).to_string();

        // Cards are ranked by the raw numeric urgency, not the clamped
        // display value; cells without a number sort last.
        let mut ranked: Vec<(Department, Vec<(Option<f64>, Card)>)> =
            LANE_ORDER.iter().map(|&d| (d, Vec::new())).collect();

        if let Some(department) = department {
            for row in 0..table.len() {
                let Ok(dept) = table.cell(row, department).parse::<Department>() else {
                    continue;
                };
                let raw = cell(row, urgency);
                let level = display_urgency(&raw);
                let card = Card {
                    place: cell(row, place),
                    keywords: cell(row, keywords),
                    message: cell(row, message),
                    urgency: level,
                    color: urgency_color(level),
                };
                if let Some((_, cards)) = ranked.iter_mut().find(|(d, _)| *d == dept) {
                    cards.push((numeric_urgency(&raw), card));
                }
            }
        }

        let lanes = ranked
            .into_iter()
            .map(|(department, mut cards)| {
                cards.sort_by(|(a, _), (b, _)| match (a, b) {
                    (Some(a), Some(b)) => b.total_cmp(a),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                });
                Lane {
                    department,
                    cards: cards.into_iter().map(|(_, card)| card).collect(),
                }
            })
            .collect();
        Self { lanes }
    }

    /// Total cards on the board
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.iter().map(|l| l.cards.len()).sum()
    }

    /// Check if no incident is on the board
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain-text rendering, one block per lane
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for lane in &self.lanes {
            let _ = writeln!(out, "{}", lane.title());
            for card in &lane.cards {
                let _ = writeln!(
                    out,
                    "  [{:>2}] {} | {} | {}",
                    card.urgency,
                    or_na(&card.place),
                    or_na(&card.keywords),
                    or_na(&card.message)
                );
            }
            out.push('\n');
        }
        out
    }
}

fn or_na(text: &str) -> &str {
    if text.trim().is_empty() {
        "N/A"
    } else {
        text
    }
}
