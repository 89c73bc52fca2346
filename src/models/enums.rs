//! Shared domain enums

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Genre
// ---------------------------------------------------------------------------

/// Book genre classification.
///
/// Persisted as its `i16` code. `Unknown` is reserved for books whose
/// catalog category could not be mapped and is never reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum Genre {
    Unknown = 0,
    Fiction = 1,
    Mystery = 2,
    Fantasy = 3,
    #[serde(rename = "SCI_FI")]
    ScienceFiction = 4,
    Romance = 5,
    Horror = 6,
    Essay = 7,
    Humanities = 8,
    History = 9,
    Science = 10,
    SelfHelp = 11,
    Economics = 12,
}

impl Genre {
    /// Every genre, in declaration order
    pub const ALL: [Genre; 13] = [
        Genre::Unknown,
        Genre::Fiction,
        Genre::Mystery,
        Genre::Fantasy,
        Genre::ScienceFiction,
        Genre::Romance,
        Genre::Horror,
        Genre::Essay,
        Genre::Humanities,
        Genre::History,
        Genre::Science,
        Genre::SelfHelp,
        Genre::Economics,
    ];

    /// Genres that take part in bestseller reconciliation
    pub fn reconcilable() -> impl Iterator<Item = Genre> {
        Self::ALL.into_iter().filter(|g| *g != Genre::Unknown)
    }

    /// Aladin category id of the genre's bestseller list (0 for `Unknown`)
    pub fn category_id(&self) -> i32 {
        match self {
            Genre::Unknown => 0,
            Genre::Fiction => 1,
            Genre::Mystery => 50926,
            Genre::Fantasy => 50928,
            Genre::ScienceFiction => 89481,
            Genre::Romance => 50929,
            Genre::Horror => 50930,
            Genre::Essay => 55889,
            Genre::Humanities => 656,
            Genre::History => 74,
            Genre::Science => 987,
            Genre::SelfHelp => 336,
            Genre::Economics => 170,
        }
    }

    /// Stable configuration key, matching the serde name
    pub fn key(&self) -> &'static str {
        match self {
            Genre::Unknown => "UNKNOWN",
            Genre::Fiction => "FICTION",
            Genre::Mystery => "MYSTERY",
            Genre::Fantasy => "FANTASY",
            Genre::ScienceFiction => "SCI_FI",
            Genre::Romance => "ROMANCE",
            Genre::Horror => "HORROR",
            Genre::Essay => "ESSAY",
            Genre::Humanities => "HUMANITIES",
            Genre::History => "HISTORY",
            Genre::Science => "SCIENCE",
            Genre::SelfHelp => "SELF_HELP",
            Genre::Economics => "ECONOMICS",
        }
    }
}

impl From<i16> for Genre {
    fn from(v: i16) -> Self {
        match v {
            1 => Genre::Fiction,
            2 => Genre::Mystery,
            3 => Genre::Fantasy,
            4 => Genre::ScienceFiction,
            5 => Genre::Romance,
            6 => Genre::Horror,
            7 => Genre::Essay,
            8 => Genre::Humanities,
            9 => Genre::History,
            10 => Genre::Science,
            11 => Genre::SelfHelp,
            12 => Genre::Economics,
            _ => Genre::Unknown,
        }
    }
}

impl From<Genre> for i16 {
    fn from(g: Genre) -> Self {
        g as i16
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
