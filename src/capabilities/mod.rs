mod gallery;
mod geocoder;
mod store;
mod timer;

#[cfg(feature = "insights")]
mod insights;

pub use self::gallery::{
    GalleryError, GalleryOperation, GalleryOutput, GalleryResult, MediaGallery, PickConfig,
    MAX_PICK_BYTES,
};
pub use self::geocoder::{
    Geocoder, GeocoderError, GeocoderOperation, GeocoderOutput, GeocoderResult, PlaceSuggestion,
    MAX_SUGGESTIONS, REGION_BIAS,
};
pub use self::store::{
    ReportStore, StoreError, StoreOperation, StoreOutput, StoreResult, StoredDocument,
    MAX_FETCH_LIMIT, REPORTS_COLLECTION, UPLOADS_PATH_PREFIX,
};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

#[cfg(feature = "insights")]
pub use self::insights::{
    AlertKind, AlertSeverity, InsightsError, InsightsOperation, InsightsProvider, InsightsResult,
    PredictiveAlert, DEFAULT_ALERT_LIMIT, MAX_ALERT_LIMIT,
};

// Built-in Crux capabilities used as-is: Render drives view invalidation,
// Http carries the traffic-bulletin fetch, KeyValue backs the local feed
// cache.
pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crate::app::App;
use crate::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub geocoder: Geocoder<Event>,
    pub gallery: MediaGallery<Event>,
    pub store: ReportStore<Event>,
    pub timer: Timer<Event>,

    #[cfg(feature = "insights")]
    pub insights: InsightsProvider<Event>,
}
