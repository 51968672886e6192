//! Validated newtypes for the harness domain
//!
//! Identifiers, counts and addresses are wrapped so that an empty session id
//! or a malformed base URL cannot reach the engine.

use nutype::nutype;
use uuid::Uuid;

/// Base address of the ingestion service, without a trailing slash
#[nutype(
    sanitize(with = |s: String| s.trim().trim_end_matches('/').to_string()),
    validate(predicate = |s: &str| {
        (s.starts_with("http://") && s.len() > "http://".len())
            || (s.starts_with("https://") && s.len() > "https://".len())
    }),
    derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize, AsRef, TryFrom)
)]
pub struct BaseUrl(String);

/// Session identifier assigned by the service at registration
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize, AsRef)
)]
pub struct ServerSessionId(String);

/// Locally assigned position of a session within a run
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
    From
))]
pub struct SessionOrdinal(usize);

/// Position of an event within its session, also its submission order
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Serialize,
    Deserialize,
    From
))]
pub struct EventIndex(u32);

/// Number of events each session submits
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
    From
))]
pub struct EventCount(u32);

impl EventCount {
    /// Event indexes in submission order
    pub fn indexes(self) -> impl Iterator<Item = EventIndex> {
        (0..self.into_inner()).map(EventIndex::from)
    }
}

/// Number of sessions run concurrently
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
    From
))]
pub struct SessionCount(usize);

/// Confirmation budget: how many responses a poll may consume, at most 10
#[nutype(
    validate(greater = 0, less_or_equal = 10),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Display,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct MaxAttempts(u32);

/// Default confirmation budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

impl MaxAttempts {
    pub fn standard() -> Self {
        match Self::try_new(DEFAULT_MAX_ATTEMPTS) {
            Ok(attempts) => attempts,
            Err(_) => unreachable!("default attempt budget is within bounds"),
        }
    }
}

/// Correlation id for one harness run, carried in log spans
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version_num() == 7),
    derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize, AsRef)
)]
pub struct RunId(Uuid);

impl RunId {
    pub fn generate() -> Self {
        match Self::try_new(Uuid::now_v7()) {
            Ok(id) => id,
            Err(_) => unreachable!("Uuid::now_v7 always yields a v7 uuid"),
        }
    }
}
