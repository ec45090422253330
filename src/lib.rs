#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod feed;
pub mod media;
pub mod traffic;
pub mod wizard;

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::capabilities::PlaceSuggestion;
use crate::feed::{
    Report, ReportCategory, ReportFeed, ReportId, ReportOrigin, ReportSeverity, ReportStatus,
    DESCRIPTION_PREVIEW_LENGTH,
};
use crate::traffic::TrafficBulletin;
use crate::wizard::{
    DraftLocation, ReportDraft, ReportPayload, SubmissionState, WizardPolicy, WizardStep,
};

#[cfg(feature = "insights")]
use crate::capabilities::PredictiveAlert;

pub use app::App;
pub use capabilities::{Capabilities, Effect};

/// Bengaluru city centre, the dashboard's home position.
pub const CITY_CENTER_LAT: f64 = 12.9716;
pub const CITY_CENTER_LNG: f64 = 77.5946;

pub const DEFAULT_MAP_ZOOM: f64 = 11.0;
pub const MIN_ZOOM: f64 = 5.0;
pub const MAX_ZOOM: f64 = 20.0;
pub const FOCUS_ZOOM: f64 = 15.0;

pub const SUGGEST_DEBOUNCE_MS: u64 = 300;
pub const MIN_SUGGEST_QUERY_CHARS: usize = 3;
pub const MAX_DESCRIPTION_CHARS: usize = 4096;
pub const DEFAULT_FEED_FETCH_LIMIT: u32 = 50;

pub const DEFAULT_API_BASE: &str = "https://api.citypulse.example.com";
pub const TRAFFIC_UPDATES_PATH: &str = "/api/traffic-updates";
pub const FEED_CACHE_KEY: &str = "citypulse:feed:v1";

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const SUGGEST_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(32) {
    Some(n) => n,
    None => panic!("cache capacity must be non-zero"),
};

#[cfg(feature = "mood-map")]
const MOOD_STRAINED_THRESHOLD: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    NotFound,
    Storage,
    Serialization,
    Deserialization,
    ImageProcessing,
    ImageTooLarge,
    ImageFormatUnsupported,
    Geocoding,
    MediaPicker,
    Submission,
    Configuration,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::ImageProcessing => "IMAGE_PROCESSING_ERROR",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::ImageFormatUnsupported => "IMAGE_FORMAT_UNSUPPORTED",
            Self::Geocoding => "GEOCODING_ERROR",
            Self::MediaPicker => "MEDIA_PICKER_ERROR",
            Self::Submission => "SUBMISSION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Storage | Self::Geocoding | Self::Submission => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::Deserialization | Self::Internal => ErrorSeverity::Fatal,

            Self::Validation
            | Self::NotFound
            | Self::ImageProcessing
            | Self::ImageTooLarge
            | Self::ImageFormatUnsupported
            | Self::MediaPicker
            | Self::Configuration
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Storage | Self::Geocoding | Self::Submission
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Storage => "Unable to save data. Please try again.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "A data error occurred. Please contact support if this persists.".into()
            }
            ErrorKind::ImageProcessing => {
                "Unable to process the image. Please try a different photo.".into()
            }
            ErrorKind::ImageTooLarge => {
                format!(
                    "The image is too large. Please use an image smaller than {} MB.",
                    media::MAX_IMAGE_BYTES / 1_000_000
                )
            }
            ErrorKind::ImageFormatUnsupported => {
                "This image format is not supported. Please use JPEG, PNG, or WebP.".into()
            }
            ErrorKind::Geocoding => {
                "Location suggestions are unavailable right now. You can keep typing.".into()
            }
            ErrorKind::MediaPicker => {
                "Could not read the selected file. Please pick a different one.".into()
            }
            ErrorKind::Submission => "Your report could not be submitted. Please try again.".into(),
            ErrorKind::Configuration => "The app is misconfigured. Please contact support.".into(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<media::MediaError> for AppError {
    fn from(e: media::MediaError) -> Self {
        let kind = match &e {
            media::MediaError::TooLarge { .. } => ErrorKind::ImageTooLarge,
            media::MediaError::UnsupportedFormat => ErrorKind::ImageFormatUnsupported,
            media::MediaError::EmptyInput
            | media::MediaError::DimensionsTooLarge { .. }
            | media::MediaError::Decode(_) => ErrorKind::ImageProcessing,
        };
        Self::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

impl From<CoordinateError> for AppError {
    fn from(e: CoordinateError) -> Self {
        Self::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatedCoordinate {
    lat: f64,
    lng: f64,
}

impl ValidatedCoordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        haversine_distance(self, other)
    }
}

impl Default for ValidatedCoordinate {
    fn default() -> Self {
        Self { lat: 0.0, lng: 0.0 }
    }
}

impl TryFrom<(f64, f64)> for ValidatedCoordinate {
    type Error = CoordinateError;

    fn try_from((lat, lng): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lng)
    }
}

/// Explicit timestamp unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    #[must_use]
    pub fn now() -> Self {
        Self(get_current_time_ms())
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl Default for UnixTimeMs {
    fn default() -> Self {
        Self::now()
    }
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[must_use]
pub fn haversine_distance(p1: ValidatedCoordinate, p2: ValidatedCoordinate) -> f64 {
    const EPSILON: f64 = 1e-10;

    if (p1.lat - p2.lat).abs() < EPSILON && (p1.lng - p2.lng).abs() < EPSILON {
        return 0.0;
    }

    let lat1_rad = p1.lat.to_radians();
    let lat2_rad = p2.lat.to_radians();
    let delta_lat = (p2.lat - p1.lat).to_radians();
    let delta_lng = (p2.lng - p1.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().asin();

    let result = EARTH_RADIUS_M * c;
    if result.is_finite() {
        result
    } else {
        f64::MAX
    }
}

#[must_use]
pub fn format_distance(meters: f64) -> String {
    if !meters.is_finite() || meters < 0.0 {
        return "Unknown".to_string();
    }

    if meters < 1000.0 {
        format!("{meters:.0} m")
    } else if meters < 10_000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{:.0} km", meters / 1000.0)
    }
}

#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    if timestamp_ms > now_ms {
        return "Just now".into();
    }

    let diff_secs = now_ms.saturating_sub(timestamp_ms) / 1000;

    if diff_secs < 5 {
        return "Just now".into();
    }
    if diff_secs < 60 {
        return format!("{diff_secs}s ago");
    }

    let diff_mins = diff_secs / 60;
    if diff_mins < 60 {
        return format!("{diff_mins}m ago");
    }

    let diff_hours = diff_mins / 60;
    if diff_hours < 24 {
        return format!("{diff_hours}h ago");
    }

    let diff_days = diff_hours / 24;
    if diff_days < 7 {
        return format!("{diff_days}d ago");
    }
    if diff_days < 30 {
        return format!("{}w ago", diff_days / 7);
    }
    if diff_days < 365 {
        return format!("{}mo ago", diff_days / 30);
    }

    format!("{}y ago", diff_days / 365)
}

/// Configuration consumed from the shell at startup. The core never
/// hardcodes the wizard policy or the debounce pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub wizard_policy: WizardPolicy,
    pub suggest_debounce_ms: u64,
    pub min_suggest_chars: usize,
    pub api_base: String,
    pub feed_fetch_limit: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wizard_policy: WizardPolicy::default(),
            suggest_debounce_ms: SUGGEST_DEBOUNCE_MS,
            min_suggest_chars: MIN_SUGGEST_QUERY_CHARS,
            api_base: DEFAULT_API_BASE.into(),
            feed_fetch_limit: DEFAULT_FEED_FETCH_LIMIT,
        }
    }
}

impl AppConfig {
    /// Clamp shell-provided values into sane operating ranges.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.suggest_debounce_ms = self.suggest_debounce_ms.clamp(50, 5_000);
        self.min_suggest_chars = self.min_suggest_chars.clamp(1, 10);
        self.feed_fetch_limit = self.feed_fetch_limit.clamp(1, capabilities::MAX_FETCH_LIMIT);
        if self.api_base.trim().is_empty() {
            self.api_base = DEFAULT_API_BASE.into();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

/// Wire shape of a report document in the backing document store.
/// Field names follow the service's camelCase convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub category: ReportCategory,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub severity: ReportSeverity,
    pub status: ReportStatus,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl ReportDocument {
    #[must_use]
    pub fn from_payload(
        payload: &ReportPayload,
        image_url: Option<&str>,
        created_at: UnixTimeMs,
    ) -> Self {
        Self {
            category: payload.category,
            description: payload.description.clone(),
            location: payload.location.map(|c| GeoPoint {
                latitude: c.lat(),
                longitude: c.lng(),
            }),
            location_text: payload.location_text.clone(),
            image_url: image_url.map(str::to_string),
            severity: ReportSeverity::default(),
            status: ReportStatus::default(),
            created_at_ms: created_at.as_millis(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Documents with out-of-range coordinates keep their text location
    /// and lose the pin rather than being dropped.
    #[must_use]
    pub fn into_report(self, id: ReportId, origin: ReportOrigin) -> Report {
        let location = self
            .location
            .and_then(|p| ValidatedCoordinate::new(p.latitude, p.longitude).ok());

        Report {
            id,
            category: self.category,
            description: self.description,
            location,
            location_text: self.location_text,
            photo_url: self.image_url,
            severity: self.severity,
            status: self.status,
            created_at: UnixTimeMs(self.created_at_ms),
            origin,
        }
    }
}

pub struct Model {
    pub state: AppState,
    pub config: AppConfig,
    pub feed: ReportFeed,
    pub wizard: Option<ReportDraft>,
    pub map_center: ValidatedCoordinate,
    pub map_zoom: f64,
    pub focused_report_id: Option<ReportId>,
    pub bulletin: TrafficBulletin,
    pub bulletin_fetched_at_ms: Option<u64>,
    #[cfg(feature = "insights")]
    pub insight_alerts: Vec<PredictiveAlert>,
    pub suggestion_cache: LruCache<String, Vec<PlaceSuggestion>>,
    pub network_online: bool,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
    pub view_timestamp_ms: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            state: AppState::Loading,
            config: AppConfig::default(),
            feed: ReportFeed::new(),
            wizard: None,
            map_center: ValidatedCoordinate::new(CITY_CENTER_LAT, CITY_CENTER_LNG)
                .unwrap_or_default(),
            map_zoom: DEFAULT_MAP_ZOOM,
            focused_report_id: None,
            bulletin: TrafficBulletin::default(),
            bulletin_fetched_at_ms: None,
            #[cfg(feature = "insights")]
            insight_alerts: Vec::new(),
            suggestion_cache: LruCache::new(SUGGEST_CACHE_CAPACITY),
            network_online: true,
            active_error: None,
            active_toast: None,
            view_timestamp_ms: get_current_time_ms(),
        }
    }
}

impl Model {
    pub fn update_timestamp(&mut self) {
        self.view_timestamp_ms = get_current_time_ms();
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }
}

pub enum Event {
    AppStarted,
    ConfigLoaded(Box<AppConfig>),
    NetworkStatusChanged {
        online: bool,
    },

    // Feed
    FeedCacheLoaded(crux_kv::KeyValueOutput),
    FeedCacheWritten(crux_kv::KeyValueOutput),
    FeedRefreshRequested,
    FeedSnapshotFetched(Box<capabilities::StoreResult>),
    ReportFocusRequested {
        id: String,
    },
    ReportDismissed,
    MapMoved {
        lat: f64,
        lng: f64,
        zoom: f64,
    },

    // Wizard
    WizardOpened {
        lat: f64,
        lng: f64,
    },
    WizardOpenedBlank,
    WizardCancelled,
    StepAdvanceRequested,
    StepRetreatRequested,
    LocationModeToggled,
    ManualLocationEdited {
        text: String,
    },
    SuggestDebounceElapsed {
        generation: u64,
    },
    SuggestionsReceived {
        generation: u64,
        result: Box<capabilities::GeocoderResult>,
    },
    SuggestionChosen {
        index: usize,
    },
    DescriptionEdited {
        text: String,
    },
    CategoryChosen {
        category: ReportCategory,
    },
    PhotoAttachRequested,
    GalleryResult(Box<capabilities::GalleryResult>),
    PhotoCleared,
    SubmitRequested,
    PhotoUploadResult(Box<capabilities::StoreResult>),
    SubmitResult(Box<capabilities::StoreResult>),

    // Traffic bulletin & insights
    BulletinRefreshRequested,
    BulletinFetched(crux_http::Result<crux_http::Response<TrafficBulletin>>),
    #[cfg(feature = "insights")]
    InsightsRefreshRequested,
    #[cfg(feature = "insights")]
    InsightsReceived(Box<capabilities::InsightsResult>),

    // Chrome
    DismissError,
    DismissToast,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::ConfigLoaded(_) => "config_loaded",
            Self::NetworkStatusChanged { .. } => "network_status_changed",
            Self::FeedCacheLoaded(_) => "feed_cache_loaded",
            Self::FeedCacheWritten(_) => "feed_cache_written",
            Self::FeedRefreshRequested => "feed_refresh_requested",
            Self::FeedSnapshotFetched(_) => "feed_snapshot_fetched",
            Self::ReportFocusRequested { .. } => "report_focus_requested",
            Self::ReportDismissed => "report_dismissed",
            Self::MapMoved { .. } => "map_moved",
            Self::WizardOpened { .. } => "wizard_opened",
            Self::WizardOpenedBlank => "wizard_opened_blank",
            Self::WizardCancelled => "wizard_cancelled",
            Self::StepAdvanceRequested => "step_advance_requested",
            Self::StepRetreatRequested => "step_retreat_requested",
            Self::LocationModeToggled => "location_mode_toggled",
            Self::ManualLocationEdited { .. } => "manual_location_edited",
            Self::SuggestDebounceElapsed { .. } => "suggest_debounce_elapsed",
            Self::SuggestionsReceived { .. } => "suggestions_received",
            Self::SuggestionChosen { .. } => "suggestion_chosen",
            Self::DescriptionEdited { .. } => "description_edited",
            Self::CategoryChosen { .. } => "category_chosen",
            Self::PhotoAttachRequested => "photo_attach_requested",
            Self::GalleryResult(_) => "gallery_result",
            Self::PhotoCleared => "photo_cleared",
            Self::SubmitRequested => "submit_requested",
            Self::PhotoUploadResult(_) => "photo_upload_result",
            Self::SubmitResult(_) => "submit_result",
            Self::BulletinRefreshRequested => "bulletin_refresh_requested",
            Self::BulletinFetched(_) => "bulletin_fetched",
            #[cfg(feature = "insights")]
            Self::InsightsRefreshRequested => "insights_refresh_requested",
            #[cfg(feature = "insights")]
            Self::InsightsReceived(_) => "insights_received",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
        }
    }
}

// --- View model ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedItemView {
    pub id: String,
    pub title: String,
    pub category: ReportCategory,
    pub severity: ReportSeverity,
    pub status: ReportStatus,
    pub time_ago: String,
    pub has_photo: bool,
    pub location_label: String,
    pub distance_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportPin {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub category: ReportCategory,
    pub severity: ReportSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDetailView {
    pub id: String,
    pub category: ReportCategory,
    pub description: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_text: Option<String>,
    pub photo_url: Option<String>,
    pub severity: ReportSeverity,
    pub status: ReportStatus,
    pub time_ago: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Active,
    Upcoming,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepIndicatorView {
    pub key: String,
    pub title: String,
    pub state: StepState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardLocationView {
    pub manual: bool,
    pub coordinates_text: Option<String>,
    pub manual_text: Option<String>,
    pub suggestions: Vec<PlaceSuggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoView {
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
    pub has_preview: bool,
    pub preview_jpeg: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardView {
    pub step: WizardStep,
    pub steps: Vec<StepIndicatorView>,
    pub can_advance: bool,
    pub can_retreat: bool,
    pub can_submit: bool,
    pub submit_in_flight: bool,
    pub submission_error: Option<String>,
    pub location: WizardLocationView,
    pub category: ReportCategory,
    pub description: String,
    pub photo: Option<PhotoView>,
    pub photo_required_hint: bool,
    pub description_required_hint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulletinView {
    pub alerts: Vec<String>,
    pub events: Vec<String>,
    pub news: Vec<String>,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: AppState,
    pub feed: Vec<FeedItemView>,
    pub pins: Vec<ReportPin>,
    pub focused: Option<ReportDetailView>,
    pub wizard: Option<WizardView>,
    pub bulletin: BulletinView,
    #[cfg(feature = "insights")]
    pub insight_cards: Vec<PredictiveAlert>,
    #[cfg(feature = "mood-map")]
    pub mood_overlay: Option<geojson::FeatureCollection>,
    pub map_center_lat: f64,
    pub map_center_lng: f64,
    pub map_zoom: f64,
    pub online: bool,
    pub active_report_count: usize,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
}

pub mod app {
    use super::*;
    use crate::capabilities::{
        GalleryOutput, GalleryResult, GeocoderResult, PickConfig, StoreOutput, StoreResult,
        StoredDocument, MAX_SUGGESTIONS, REPORTS_COLLECTION, UPLOADS_PATH_PREFIX,
    };
    use tracing::{debug, error, info, warn};
    use url::Url;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn validate_coordinates(lat: f64, lng: f64) -> Result<ValidatedCoordinate, AppError> {
            ValidatedCoordinate::new(lat, lng).map_err(AppError::from)
        }

        fn extension_for_mime(mime: &str) -> &'static str {
            match mime {
                "image/png" => "png",
                "image/webp" => "webp",
                _ => "jpg",
            }
        }

        fn persist_feed(model: &Model, caps: &Capabilities) {
            let mut buffer = Vec::new();
            match ciborium::ser::into_writer(&model.feed, &mut buffer) {
                Ok(()) => caps.kv.write(FEED_CACHE_KEY, buffer, Event::FeedCacheWritten),
                Err(e) => error!(error = %e, "feed cache encode failed"),
            }
        }

        fn request_feed_snapshot(model: &Model, caps: &Capabilities) {
            caps.store
                .fetch_recent(REPORTS_COLLECTION, model.config.feed_fetch_limit, |result| {
                    Event::FeedSnapshotFetched(Box::new(result))
                });
        }

        fn request_bulletin(model: &mut Model, caps: &Capabilities) {
            let url =
                Url::parse(&model.config.api_base).and_then(|base| base.join(TRAFFIC_UPDATES_PATH));

            match url {
                Ok(url) => {
                    caps.http.get(url).expect_json().send(Event::BulletinFetched);
                }
                Err(e) => {
                    error!(error = %e, api_base = %model.config.api_base, "invalid API base");
                    model.set_error(
                        AppError::new(ErrorKind::Configuration, "Invalid API base URL")
                            .with_internal(e.to_string()),
                    );
                }
            }
        }

        /// Serialize the draft into a report document and hand it to the
        /// document store. Called directly (no photo) or after the blob
        /// upload completed.
        fn send_insert_document(model: &mut Model, caps: &Capabilities) {
            let Some(draft) = model.wizard.as_ref() else {
                return;
            };

            let payload = draft.finalize();
            let document = ReportDocument::from_payload(
                &payload,
                draft.uploaded_photo_url(),
                UnixTimeMs::now(),
            );

            match serde_json::to_vec(&document) {
                Ok(bytes) => {
                    caps.store.insert_document(REPORTS_COLLECTION, bytes, |result| {
                        Event::SubmitResult(Box::new(result))
                    });
                }
                Err(e) => {
                    error!(error = %e, "report document encode failed");
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.submission_failed("could not encode report");
                    }
                    model.set_error(
                        AppError::new(ErrorKind::Serialization, "Could not encode report")
                            .with_internal(e.to_string()),
                    );
                }
            }
        }

        fn handle_snapshot(documents: Vec<StoredDocument>, model: &mut Model) {
            let mut reports = Vec::with_capacity(documents.len());
            let mut skipped = 0usize;

            for doc in documents {
                match ReportDocument::parse(&doc.data) {
                    Ok(parsed) => {
                        reports
                            .push(parsed.into_report(ReportId::new(doc.id), ReportOrigin::Remote));
                    }
                    Err(e) => {
                        skipped += 1;
                        debug!(id = %doc.id, error = %e, "skipping malformed report document");
                    }
                }
            }

            if skipped > 0 {
                warn!(skipped, "some report documents were malformed");
            }

            model.feed.hydrate(reports);
        }

        fn handle_gallery_result(result: GalleryResult, model: &mut Model) {
            match result {
                Ok(GalleryOutput::Image { data, mime_type }) => match media::stage_photo(data) {
                    Ok(photo) => {
                        debug!(
                            declared_mime = mime_type.as_deref().unwrap_or("unknown"),
                            sniffed_mime = %photo.mime_type,
                            size = photo.size_bytes(),
                            "photo attached"
                        );
                        if let Some(draft) = model.wizard.as_mut() {
                            draft.attach_photo(photo);
                        }
                    }
                    Err(e) => {
                        // Unreadable bytes degrade to "no image attached".
                        warn!(error = %e, "picked image rejected");
                        if let Some(draft) = model.wizard.as_mut() {
                            draft.clear_photo();
                        }
                        model.set_error(AppError::from(e));
                    }
                },
                Ok(GalleryOutput::Cancelled) => {
                    debug!("image pick cancelled");
                }
                Err(e) => {
                    warn!(error = %e, "media picker failed");
                    model.set_error(
                        AppError::new(ErrorKind::MediaPicker, "Could not read the selected file")
                            .with_internal(e.to_string()),
                    );
                }
            }
        }

        fn handle_submit_result(result: StoreResult, model: &mut Model, caps: &Capabilities) {
            match result {
                Ok(StoreOutput::Inserted { id }) => {
                    let Some(draft) = model.wizard.take() else {
                        warn!("submit result arrived with no open wizard");
                        return;
                    };

                    let payload = draft.finalize();
                    let report = Report {
                        id: ReportId::new(&id),
                        category: payload.category,
                        description: payload.description,
                        location: payload.location,
                        location_text: payload.location_text,
                        photo_url: draft.uploaded_photo_url().map(str::to_string),
                        severity: ReportSeverity::default(),
                        status: ReportStatus::default(),
                        created_at: UnixTimeMs::now(),
                        origin: ReportOrigin::Local,
                    };

                    info!(report_id = %id, "report submitted");
                    model.feed.append(report);
                    model.show_toast("Report submitted", ToastKind::Success);
                    Self::persist_feed(model, caps);
                }
                Ok(other) => {
                    warn!(?other, "unexpected store output for document insert");
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.submission_failed("unexpected storage response");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "report submission failed");
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.submission_failed(e.to_string());
                    }
                    model.show_toast("Submission failed. Tap submit to retry.", ToastKind::Error);
                }
            }
        }

        fn handle_suggestions(generation: u64, result: GeocoderResult, model: &mut Model) {
            let Some(draft) = model.wizard.as_ref() else {
                return;
            };
            if generation != draft.suggest_generation() {
                debug!(
                    generation,
                    current = draft.suggest_generation(),
                    "stale suggestions discarded"
                );
                return;
            }

            match result {
                Ok(output) => {
                    let mut suggestions = output.into_suggestions();
                    suggestions.truncate(MAX_SUGGESTIONS);

                    if let Some(query) = draft.manual_text().map(|t| t.trim().to_string()) {
                        model.suggestion_cache.put(query, suggestions.clone());
                    }
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.set_suggestions(suggestions);
                    }
                }
                Err(e) => {
                    // Lookup failures never block typing or progression.
                    warn!(error = %e, "suggestion lookup failed");
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.set_suggestions(Vec::new());
                    }
                }
            }
        }

        // --- view helpers ---

        fn build_feed_items(model: &Model, now_ms: u64) -> Vec<FeedItemView> {
            model
                .feed
                .iter()
                .map(|report| {
                    let title = if report.description.trim().is_empty() {
                        report.category.display_name().to_string()
                    } else {
                        report.description_preview(DESCRIPTION_PREVIEW_LENGTH)
                    };

                    let location_label = report
                        .location_text
                        .clone()
                        .or_else(|| {
                            report
                                .location
                                .map(|c| format!("{:.6}, {:.6}", c.lat(), c.lng()))
                        })
                        .unwrap_or_else(|| "Bengaluru".to_string());

                    let distance_text = report
                        .location
                        .map(|c| format_distance(haversine_distance(model.map_center, c)));

                    FeedItemView {
                        id: report.id.as_str().to_string(),
                        title,
                        category: report.category,
                        severity: report.severity,
                        status: report.status,
                        time_ago: format_time_ago(report.created_at.as_millis(), now_ms),
                        has_photo: report.has_photo(),
                        location_label,
                        distance_text,
                    }
                })
                .collect()
        }

        fn build_pins(model: &Model) -> Vec<ReportPin> {
            model
                .feed
                .iter()
                .filter_map(|report| {
                    report.location.map(|c| ReportPin {
                        id: report.id.as_str().to_string(),
                        lat: c.lat(),
                        lng: c.lng(),
                        category: report.category,
                        severity: report.severity,
                    })
                })
                .collect()
        }

        fn build_detail(report: &Report, now_ms: u64) -> ReportDetailView {
            ReportDetailView {
                id: report.id.as_str().to_string(),
                category: report.category,
                description: report.description.clone(),
                lat: report.location.map(ValidatedCoordinate::lat),
                lng: report.location.map(ValidatedCoordinate::lng),
                location_text: report.location_text.clone(),
                photo_url: report.photo_url.clone(),
                severity: report.severity,
                status: report.status,
                time_ago: format_time_ago(report.created_at.as_millis(), now_ms),
            }
        }

        fn build_wizard_view(draft: &ReportDraft) -> WizardView {
            let step = draft.step();
            let step_index = draft.step_index();

            let steps = draft
                .policy()
                .steps()
                .iter()
                .enumerate()
                .map(|(i, s)| StepIndicatorView {
                    key: s.as_str().to_string(),
                    title: s.title().to_string(),
                    state: match i.cmp(&step_index) {
                        std::cmp::Ordering::Less => StepState::Completed,
                        std::cmp::Ordering::Equal => StepState::Active,
                        std::cmp::Ordering::Greater => StepState::Upcoming,
                    },
                })
                .collect();

            let location = match draft.location() {
                DraftLocation::Coordinates(c) => WizardLocationView {
                    manual: false,
                    coordinates_text: Some(format!("{:.6}, {:.6}", c.lat(), c.lng())),
                    manual_text: None,
                    suggestions: Vec::new(),
                },
                DraftLocation::ManualText { text, .. } => WizardLocationView {
                    manual: true,
                    coordinates_text: None,
                    manual_text: Some(text.clone()),
                    suggestions: draft.suggestions().to_vec(),
                },
            };

            let photo = draft.photo().map(|p| PhotoView {
                size_bytes: p.size_bytes(),
                width: p.width,
                height: p.height,
                has_preview: p.has_preview(),
                preview_jpeg: p.preview_jpeg.clone(),
            });

            let submission_error = match draft.submission() {
                SubmissionState::Failed { message } => Some(message.clone()),
                SubmissionState::Idle | SubmissionState::InFlight => None,
            };

            WizardView {
                step,
                steps,
                can_advance: draft.can_advance(),
                can_retreat: !draft.is_first_step() && !draft.submission().is_in_flight(),
                can_submit: draft.can_submit(),
                submit_in_flight: draft.submission().is_in_flight(),
                submission_error,
                location,
                category: draft.category(),
                description: draft.description().to_string(),
                photo_required_hint: step == WizardStep::Details && photo.is_none(),
                description_required_hint: step == WizardStep::Description
                    && draft.description().trim().is_empty(),
                photo,
            }
        }

        #[cfg(feature = "mood-map")]
        fn build_mood_overlay(model: &Model) -> Option<geojson::FeatureCollection> {
            use geojson::{Feature, FeatureCollection, Geometry, Value};

            if model.feed.is_empty() {
                return None;
            }

            let strained = model
                .feed
                .iter()
                .filter(|r| r.severity == ReportSeverity::High && r.status != ReportStatus::Resolved)
                .count()
                >= MOOD_STRAINED_THRESHOLD;

            // City-bounds ring, lng/lat order.
            let ring = vec![
                vec![77.4, 12.8],
                vec![77.8, 12.8],
                vec![77.8, 13.2],
                vec![77.4, 13.2],
                vec![77.4, 12.8],
            ];

            let mut properties = geojson::JsonObject::new();
            properties.insert(
                "mood".to_string(),
                serde_json::Value::String(if strained { "strained" } else { "calm" }.to_string()),
            );

            Some(FeatureCollection {
                bbox: None,
                features: vec![Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }],
                foreign_members: None,
            })
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            model.update_timestamp();
            debug!(event = event.name(), "handling event");

            match event {
                Event::AppStarted => {
                    model.state = AppState::Loading;
                    caps.kv.read(FEED_CACHE_KEY, Event::FeedCacheLoaded);

                    Self::request_feed_snapshot(model, caps);
                    Self::request_bulletin(model, caps);

                    #[cfg(feature = "insights")]
                    caps.insights
                        .fetch_alerts(capabilities::DEFAULT_ALERT_LIMIT, |result| {
                            Event::InsightsReceived(Box::new(result))
                        });

                    caps.render.render();
                }

                Event::ConfigLoaded(config) => {
                    model.config = config.validated();
                    caps.render.render();
                }

                Event::NetworkStatusChanged { online } => {
                    let was_offline = !model.network_online;
                    model.network_online = online;

                    if online && was_offline {
                        Self::request_feed_snapshot(model, caps);
                        Self::request_bulletin(model, caps);
                    }

                    caps.render.render();
                }

                Event::FeedCacheLoaded(output) => {
                    model.state = AppState::Ready;

                    match output {
                        crux_kv::KeyValueOutput::Read(Some(bytes)) => {
                            match ciborium::de::from_reader::<ReportFeed, _>(bytes.as_slice()) {
                                Ok(cached) if model.feed.is_empty() => {
                                    debug!(reports = cached.len(), "feed cache restored");
                                    model.feed = cached;
                                }
                                Ok(_) => {
                                    // A live snapshot already arrived; the cache lost the race.
                                }
                                Err(e) => {
                                    warn!(error = %e, "feed cache corrupt, starting empty");
                                }
                            }
                        }
                        crux_kv::KeyValueOutput::Read(None) => {}
                        crux_kv::KeyValueOutput::Write(_) => {
                            warn!("unexpected write output for feed cache read");
                        }
                    }

                    caps.render.render();
                }

                Event::FeedCacheWritten(output) => {
                    if let crux_kv::KeyValueOutput::Write(false) = output {
                        warn!("feed cache write failed");
                    }
                }

                Event::FeedRefreshRequested => {
                    Self::request_feed_snapshot(model, caps);
                }

                Event::FeedSnapshotFetched(result) => {
                    match *result {
                        Ok(StoreOutput::Documents { documents }) => {
                            Self::handle_snapshot(documents, model);
                            model.state = AppState::Ready;
                            Self::persist_feed(model, caps);
                        }
                        Ok(other) => {
                            warn!(?other, "unexpected store output for feed fetch");
                        }
                        Err(e) => {
                            // Keep whatever the cache gave us.
                            warn!(error = %e, "feed snapshot fetch failed");
                        }
                    }
                    caps.render.render();
                }

                Event::ReportFocusRequested { id } => {
                    let id = ReportId::new(id);
                    match model.feed.focus(&id) {
                        Some(report) => {
                            if let Some(coordinates) = report.location {
                                model.map_center = coordinates;
                                model.map_zoom = FOCUS_ZOOM;
                            }
                            model.focused_report_id = Some(id);
                        }
                        None => {
                            // A miss is a normal outcome, e.g. a stale link.
                            debug!(id = %id, "focus target not in feed");
                        }
                    }
                    caps.render.render();
                }

                Event::ReportDismissed => {
                    model.focused_report_id = None;
                    caps.render.render();
                }

                Event::MapMoved { lat, lng, zoom } => {
                    match Self::validate_coordinates(lat, lng) {
                        Ok(coordinates) => {
                            model.map_center = coordinates;
                            model.map_zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
                        }
                        Err(_) => {
                            warn!(lat, lng, "ignoring map move to invalid coordinates");
                        }
                    }
                    caps.render.render();
                }

                Event::WizardOpened { lat, lng } => {
                    match Self::validate_coordinates(lat, lng) {
                        Ok(coordinates) => {
                            if model.wizard.is_some() {
                                warn!("wizard reopened, discarding previous draft");
                            }
                            model.wizard = Some(ReportDraft::at_location(
                                coordinates,
                                model.config.wizard_policy,
                            ));
                        }
                        Err(e) => {
                            model.set_error(e);
                        }
                    }
                    caps.render.render();
                }

                Event::WizardOpenedBlank => {
                    if model.wizard.is_some() {
                        warn!("wizard reopened, discarding previous draft");
                    }
                    model.wizard = Some(ReportDraft::blank(model.config.wizard_policy));
                    caps.render.render();
                }

                Event::WizardCancelled => {
                    let in_flight = model
                        .wizard
                        .as_ref()
                        .is_some_and(|draft| draft.submission().is_in_flight());

                    if in_flight {
                        // Mirror the disabled close button during upload.
                        debug!("cancel refused while submission in flight");
                    } else {
                        model.wizard = None;
                    }
                    caps.render.render();
                }

                Event::StepAdvanceRequested => {
                    if let Some(draft) = model.wizard.as_mut() {
                        if !draft.advance() {
                            debug!(step = draft.step().as_str(), "advance refused");
                        }
                    }
                    caps.render.render();
                }

                Event::StepRetreatRequested => {
                    if let Some(draft) = model.wizard.as_mut() {
                        if !draft.retreat() {
                            debug!(step = draft.step().as_str(), "retreat refused");
                        }
                    }
                    caps.render.render();
                }

                Event::LocationModeToggled => {
                    if let Some(draft) = model.wizard.as_mut() {
                        if !draft.toggle_location_mode() {
                            debug!("location mode toggle refused");
                        }
                    }
                    caps.render.render();
                }

                Event::ManualLocationEdited { text } => {
                    let min_chars = model.config.min_suggest_chars;
                    let debounce_ms = model.config.suggest_debounce_ms;

                    if let Some(draft) = model.wizard.as_mut() {
                        if let Some(generation) = draft.set_manual_text(text) {
                            let query_len =
                                draft.manual_text().map_or(0, |t| t.trim().chars().count());

                            // Short queries never go out; the bumped
                            // generation alone invalidates older lookups.
                            if query_len >= min_chars {
                                caps.timer.start(generation, debounce_ms, move |_| {
                                    Event::SuggestDebounceElapsed { generation }
                                });
                            }
                        }
                    }
                    caps.render.render();
                }

                Event::SuggestDebounceElapsed { generation } => {
                    let Some(draft) = model.wizard.as_ref() else {
                        return;
                    };
                    if generation != draft.suggest_generation() {
                        debug!(generation, "stale debounce ignored");
                        return;
                    }
                    let Some(query) = draft.manual_text().map(|t| t.trim().to_string()) else {
                        return;
                    };
                    if query.chars().count() < model.config.min_suggest_chars {
                        return;
                    }

                    if let Some(cached) = model.suggestion_cache.get(&query).cloned() {
                        debug!(query = %query, "suggestion cache hit");
                        if let Some(draft) = model.wizard.as_mut() {
                            draft.set_suggestions(cached);
                        }
                        caps.render.render();
                        return;
                    }

                    caps.geocoder.suggest(query, move |result| Event::SuggestionsReceived {
                        generation,
                        result: Box::new(result),
                    });
                }

                Event::SuggestionsReceived { generation, result } => {
                    Self::handle_suggestions(generation, *result, model);
                    caps.render.render();
                }

                Event::SuggestionChosen { index } => {
                    if let Some(draft) = model.wizard.as_mut() {
                        if !draft.choose_suggestion(index) {
                            debug!(index, "suggestion choice refused");
                        }
                    }
                    caps.render.render();
                }

                Event::DescriptionEdited { mut text } => {
                    if text.chars().count() > MAX_DESCRIPTION_CHARS {
                        text = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
                    }
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.set_description(text);
                    }
                    caps.render.render();
                }

                Event::CategoryChosen { category } => {
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.set_category(category);
                    }
                    caps.render.render();
                }

                Event::PhotoAttachRequested => {
                    if model.wizard.is_none() {
                        return;
                    }
                    caps.gallery.pick_image(PickConfig::default(), |result| {
                        Event::GalleryResult(Box::new(result))
                    });
                }

                Event::GalleryResult(result) => {
                    Self::handle_gallery_result(*result, model);
                    caps.render.render();
                }

                Event::PhotoCleared => {
                    if let Some(draft) = model.wizard.as_mut() {
                        draft.clear_photo();
                    }
                    caps.render.render();
                }

                Event::SubmitRequested => {
                    let Some(draft) = model.wizard.as_mut() else {
                        return;
                    };
                    if !draft.begin_submission() {
                        // Either a mandatory field is missing or a
                        // submission is already in flight.
                        debug!("submit refused");
                        caps.render.render();
                        return;
                    }

                    info!(category = draft.category().as_str(), "report submission started");

                    let pending_upload = if draft.uploaded_photo_url().is_none() {
                        draft.photo().cloned()
                    } else {
                        None
                    };

                    match pending_upload {
                        Some(photo) => {
                            let path = format!(
                                "{}/{}.{}",
                                UPLOADS_PATH_PREFIX,
                                Uuid::new_v4(),
                                Self::extension_for_mime(&photo.mime_type)
                            );
                            caps.store.upload_blob(path, photo.data, photo.mime_type, |result| {
                                Event::PhotoUploadResult(Box::new(result))
                            });
                        }
                        None => {
                            Self::send_insert_document(model, caps);
                        }
                    }

                    caps.render.render();
                }

                Event::PhotoUploadResult(result) => {
                    match *result {
                        Ok(StoreOutput::BlobStored { url }) => {
                            if let Some(draft) = model.wizard.as_mut() {
                                draft.set_uploaded_photo_url(url);
                            }
                            Self::send_insert_document(model, caps);
                        }
                        Ok(other) => {
                            warn!(?other, "unexpected store output for blob upload");
                            if let Some(draft) = model.wizard.as_mut() {
                                draft.submission_failed("unexpected storage response");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "photo upload failed");
                            if let Some(draft) = model.wizard.as_mut() {
                                draft.submission_failed(e.to_string());
                            }
                            model.show_toast("Upload failed. Tap submit to retry.", ToastKind::Error);
                        }
                    }
                    caps.render.render();
                }

                Event::SubmitResult(result) => {
                    Self::handle_submit_result(*result, model, caps);
                    caps.render.render();
                }

                Event::BulletinRefreshRequested => {
                    Self::request_bulletin(model, caps);
                    caps.render.render();
                }

                Event::BulletinFetched(Ok(mut response)) => {
                    match response.take_body() {
                        Some(bulletin) => {
                            model.bulletin = bulletin;
                            model.bulletin_fetched_at_ms = Some(get_current_time_ms());
                        }
                        None => {
                            warn!("bulletin response had no body");
                        }
                    }
                    caps.render.render();
                }

                Event::BulletinFetched(Err(e)) => {
                    // Degrade: keep showing the previous bulletin.
                    warn!(error = %e, "bulletin fetch failed");
                }

                #[cfg(feature = "insights")]
                Event::InsightsRefreshRequested => {
                    caps.insights
                        .fetch_alerts(capabilities::DEFAULT_ALERT_LIMIT, |result| {
                            Event::InsightsReceived(Box::new(result))
                        });
                }

                #[cfg(feature = "insights")]
                Event::InsightsReceived(result) => {
                    match *result {
                        Ok(mut alerts) => {
                            let now_ms = get_current_time_ms();
                            alerts.retain(|a| !a.is_expired(now_ms));
                            model.insight_alerts = alerts;
                        }
                        Err(e) => {
                            warn!(error = %e, "insights fetch failed");
                        }
                    }
                    caps.render.render();
                }

                Event::DismissError => {
                    model.clear_error();
                    caps.render.render();
                }

                Event::DismissToast => {
                    model.clear_toast();
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let now_ms = model.view_timestamp_ms;

            let focused = model
                .focused_report_id
                .as_ref()
                .and_then(|id| model.feed.focus(id))
                .map(|report| Self::build_detail(report, now_ms));

            ViewModel {
                state: model.state,
                feed: Self::build_feed_items(model, now_ms),
                pins: Self::build_pins(model),
                focused,
                wizard: model.wizard.as_ref().map(Self::build_wizard_view),
                bulletin: BulletinView {
                    alerts: model.bulletin.alerts.clone(),
                    events: model.bulletin.events.clone(),
                    news: model.bulletin.news.clone(),
                    stale: TrafficBulletin::is_stale(model.bulletin_fetched_at_ms, now_ms),
                },
                #[cfg(feature = "insights")]
                insight_cards: model.insight_alerts.clone(),
                #[cfg(feature = "mood-map")]
                mood_overlay: Self::build_mood_overlay(model),
                map_center_lat: model.map_center.lat(),
                map_center_lng: model.map_center.lng(),
                map_zoom: model.map_zoom,
                online: model.network_online,
                active_report_count: model.feed.active_count(),
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.as_ref().map(ToastView::from),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod coordinate_tests {
        use super::*;

        #[test]
        fn valid_coordinates_accepted() {
            assert!(ValidatedCoordinate::new(0.0, 0.0).is_ok());
            assert!(ValidatedCoordinate::new(90.0, 180.0).is_ok());
            assert!(ValidatedCoordinate::new(-90.0, -180.0).is_ok());
            assert!(ValidatedCoordinate::new(CITY_CENTER_LAT, CITY_CENTER_LNG).is_ok());
        }

        #[test]
        fn out_of_range_rejected() {
            assert!(matches!(
                ValidatedCoordinate::new(91.0, 0.0),
                Err(CoordinateError::LatitudeOutOfRange(_))
            ));
            assert!(matches!(
                ValidatedCoordinate::new(0.0, -181.0),
                Err(CoordinateError::LongitudeOutOfRange(_))
            ));
        }

        #[test]
        fn non_finite_rejected() {
            assert!(matches!(
                ValidatedCoordinate::new(f64::NAN, 0.0),
                Err(CoordinateError::NonFinite)
            ));
            assert!(matches!(
                ValidatedCoordinate::new(0.0, f64::INFINITY),
                Err(CoordinateError::NonFinite)
            ));
        }
    }

    mod distance_tests {
        use super::*;

        #[test]
        fn same_point_is_zero() {
            let p = ValidatedCoordinate::new(CITY_CENTER_LAT, CITY_CENTER_LNG).unwrap();
            assert_eq!(haversine_distance(p, p), 0.0);
        }

        #[test]
        fn city_scale_distance_is_plausible() {
            // City centre to Electronic City, roughly 17 km.
            let centre = ValidatedCoordinate::new(12.9716, 77.5946).unwrap();
            let e_city = ValidatedCoordinate::new(12.8452, 77.6602).unwrap();
            let d = haversine_distance(centre, e_city);
            assert!(d > 10_000.0 && d < 25_000.0, "got {d}");
        }

        #[test]
        fn distance_formatting() {
            assert_eq!(format_distance(500.0), "500 m");
            assert_eq!(format_distance(1500.0), "1.5 km");
            assert_eq!(format_distance(15000.0), "15 km");
            assert_eq!(format_distance(f64::NAN), "Unknown");
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn time_ago_buckets() {
            assert_eq!(format_time_ago(1000, 1000), "Just now");
            assert_eq!(format_time_ago(0, 10_000), "10s ago");
            assert_eq!(format_time_ago(0, 300_000), "5m ago");
            assert_eq!(format_time_ago(0, 7_200_000), "2h ago");
            assert_eq!(format_time_ago(0, 172_800_000), "2d ago");
        }

        #[test]
        fn future_timestamps_read_as_just_now() {
            assert_eq!(format_time_ago(2_000, 1_000), "Just now");
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn default_config_matches_constants() {
            let config = AppConfig::default();
            assert_eq!(config.wizard_policy, WizardPolicy::FourStep);
            assert_eq!(config.suggest_debounce_ms, SUGGEST_DEBOUNCE_MS);
            assert_eq!(config.min_suggest_chars, MIN_SUGGEST_QUERY_CHARS);
            assert_eq!(config.feed_fetch_limit, DEFAULT_FEED_FETCH_LIMIT);
        }

        #[test]
        fn validated_clamps_extremes() {
            let config = AppConfig {
                suggest_debounce_ms: 0,
                min_suggest_chars: 100,
                feed_fetch_limit: 0,
                api_base: "  ".into(),
                ..AppConfig::default()
            }
            .validated();

            assert_eq!(config.suggest_debounce_ms, 50);
            assert_eq!(config.min_suggest_chars, 10);
            assert_eq!(config.feed_fetch_limit, 1);
            assert_eq!(config.api_base, DEFAULT_API_BASE);
        }
    }

    mod document_tests {
        use super::*;

        #[test]
        fn document_round_trips_with_camel_case_fields() {
            let payload = ReportPayload {
                category: ReportCategory::Accident,
                description: "Two-wheeler collision".into(),
                location: Some(ValidatedCoordinate::new(12.9716, 77.5946).unwrap()),
                location_text: None,
                has_photo: true,
            };

            let document = ReportDocument::from_payload(
                &payload,
                Some("https://cdn.example/p.jpg"),
                UnixTimeMs(1_700_000_000_000),
            );

            let json = serde_json::to_string(&document).unwrap();
            assert!(json.contains("\"createdAtMs\""));
            assert!(json.contains("\"imageUrl\""));
            assert!(json.contains("\"latitude\""));

            let parsed = ReportDocument::parse(json.as_bytes()).unwrap();
            assert_eq!(parsed, document);

            let report = parsed.into_report(ReportId::new("doc-1"), ReportOrigin::Remote);
            assert_eq!(report.category, ReportCategory::Accident);
            assert_eq!(report.photo_url.as_deref(), Some("https://cdn.example/p.jpg"));
            assert!(report.location.is_some());
        }

        #[test]
        fn invalid_document_coordinates_drop_the_pin_not_the_report() {
            let document = ReportDocument {
                category: ReportCategory::Traffic,
                description: "jam".into(),
                location: Some(GeoPoint {
                    latitude: 200.0,
                    longitude: 0.0,
                }),
                location_text: Some("Silk Board".into()),
                image_url: None,
                severity: ReportSeverity::Medium,
                status: ReportStatus::Pending,
                created_at_ms: 1,
            };

            let report = document.into_report(ReportId::new("doc-2"), ReportOrigin::Remote);
            assert!(report.location.is_none());
            assert_eq!(report.location_text.as_deref(), Some("Silk Board"));
        }
    }

    mod toast_tests {
        use super::*;

        #[test]
        fn toast_expires_after_its_duration() {
            let toast = ToastMessage {
                message: "hi".into(),
                kind: ToastKind::Info,
                created_at_ms: 1_000,
                duration_ms: 3_000,
            };
            assert!(!toast.is_expired(4_000));
            assert!(toast.is_expired(4_001));
        }
    }

    #[cfg(feature = "mood-map")]
    mod mood_tests {
        use super::*;
        use crux_core::App as _;

        fn high_severity_report(i: usize) -> Report {
            Report {
                id: ReportId::new(format!("r{i}")),
                category: ReportCategory::Emergency,
                description: "flooding".into(),
                location: Some(ValidatedCoordinate::new(12.9, 77.6).unwrap()),
                location_text: None,
                photo_url: None,
                severity: ReportSeverity::High,
                status: ReportStatus::Pending,
                created_at: UnixTimeMs(1),
                origin: ReportOrigin::Remote,
            }
        }

        #[test]
        fn mood_overlay_reflects_feed_pressure() {
            let app = App;
            let mut model = Model::default();

            assert!(app.view(&model).mood_overlay.is_none());

            for i in 0..MOOD_STRAINED_THRESHOLD {
                model.feed.append(high_severity_report(i));
            }

            let overlay = app.view(&model).mood_overlay.unwrap();
            let feature = &overlay.features[0];
            let mood = feature
                .properties
                .as_ref()
                .and_then(|p| p.get("mood"))
                .and_then(|v| v.as_str())
                .unwrap();
            assert_eq!(mood, "strained");
        }
    }
}
