use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{UnixTimeMs, ValidatedCoordinate};

pub const MAX_FEED_REPORTS: usize = 500;
pub const DESCRIPTION_PREVIEW_LENGTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl ReportId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structured category chosen at creation time. Classification never
/// falls back to keyword matching on the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    #[default]
    Traffic,
    Accident,
    Waterlogging,
    Construction,
    Emergency,
    Other,
}

impl ReportCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Accident => "accident",
            Self::Waterlogging => "waterlogging",
            Self::Construction => "construction",
            Self::Emergency => "emergency",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Traffic => "Traffic Jam",
            Self::Accident => "Accident",
            Self::Waterlogging => "Waterlogging",
            Self::Construction => "Road Work",
            Self::Emergency => "Emergency",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "traffic" | "traffic_jam" | "traffic jam" => Some(Self::Traffic),
            "accident" => Some(Self::Accident),
            "waterlogging" => Some(Self::Waterlogging),
            "construction" | "road_work" | "road work" => Some(Self::Construction),
            "emergency" => Some(Self::Emergency),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReportSeverity {
    Low,
    #[default]
    Medium,
    High,
}

impl ReportSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    Verified,
    Resolved,
}

impl ReportStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Resolved => "resolved",
        }
    }
}

/// Where a feed entry came from: submitted in this session, or hydrated
/// from the backing document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOrigin {
    Local,
    Remote,
}

/// A finalized report. Immutable once created; the feed only ever appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub category: ReportCategory,
    pub description: String,
    /// Resolved coordinates; absent when the location was free text and
    /// resolution stayed with the collaborator.
    pub location: Option<ValidatedCoordinate>,
    pub location_text: Option<String>,
    pub photo_url: Option<String>,
    pub severity: ReportSeverity,
    pub status: ReportStatus,
    pub created_at: UnixTimeMs,
    pub origin: ReportOrigin,
}

impl Report {
    #[must_use]
    pub fn description_preview(&self, max_len: usize) -> String {
        if self.description.chars().count() <= max_len {
            self.description.clone()
        } else {
            let mut preview: String = self
                .description
                .chars()
                .take(max_len.saturating_sub(3))
                .collect();
            preview.push_str("...");
            preview
        }
    }

    #[must_use]
    pub const fn has_photo(&self) -> bool {
        self.photo_url.is_some()
    }
}

/// Newest-first sequence of finalized reports.
///
/// Insertion order defines feed order: `append` always prepends,
/// regardless of the entry's timestamp. Ids are not unique-enforced;
/// deduplication is the backing service's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportFeed {
    reports: Vec<Report>,
}

impl ReportFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a finalized report. The tail is truncated once the feed
    /// exceeds `MAX_FEED_REPORTS`.
    pub fn append(&mut self, report: Report) {
        self.reports.insert(0, report);
        self.reports.truncate(MAX_FEED_REPORTS);
    }

    /// Look up by id for map-pan purposes. A miss is a normal outcome.
    #[must_use]
    pub fn focus(&self, id: &ReportId) -> Option<&Report> {
        self.reports.iter().find(|r| &r.id == id)
    }

    /// Replace the remote portion of the feed with a fresh snapshot,
    /// keeping locally submitted reports at the front in their original
    /// order.
    pub fn hydrate(&mut self, remote: Vec<Report>) {
        self.reports.retain(|r| r.origin == ReportOrigin::Local);
        self.reports
            .extend(remote.into_iter().filter(|r| r.origin == ReportOrigin::Remote));
        self.reports.truncate(MAX_FEED_REPORTS);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    #[must_use]
    pub fn front(&self) -> Option<&Report> {
        self.reports.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.status != ReportStatus::Resolved)
            .count()
    }
}
