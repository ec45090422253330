use serde::{Deserialize, Serialize};

/// How long a fetched bulletin stays fresh before the view flags it.
pub const BULLETIN_STALE_AFTER_MS: u64 = 15 * 60 * 1000;

/// City-wide traffic notices from the advisory endpoint
/// (`GET /api/traffic-updates`): immediate disruptions, planned events,
/// and general announcements.
///
/// The endpoint is scraped-and-summarised upstream, so every field is
/// tolerated as missing; a malformed payload parses to an empty bulletin
/// rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrafficBulletin {
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub news: Vec<String>,
}

impl TrafficBulletin {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.events.is_empty() && self.news.is_empty()
    }

    #[must_use]
    pub fn notice_count(&self) -> usize {
        self.alerts.len() + self.events.len() + self.news.len()
    }

    #[must_use]
    pub fn is_stale(fetched_at_ms: Option<u64>, now_ms: u64) -> bool {
        match fetched_at_ms {
            Some(fetched) => now_ms.saturating_sub(fetched) > BULLETIN_STALE_AFTER_MS,
            None => true,
        }
    }
}
