use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PICK_BYTES: usize = 10 * 1024 * 1024;

/// Image acquisition through the shell's file picker / drag-and-drop zone.
///
/// Returns raw bytes; decoding, validation and preview derivation happen in
/// the core (`crate::media`). Video payloads are rejected shell-side.
#[derive(Debug, Clone)]
pub struct MediaGallery<Ev> {
    context: CapabilityContext<GalleryOperation, Ev>,
}

impl<Ev> Capability<Ev> for MediaGallery<Ev> {
    type Operation = GalleryOperation;
    type MappedSelf<MappedEv> = MediaGallery<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        MediaGallery::new(self.context.map_event(f))
    }
}

impl<Ev> MediaGallery<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GalleryOperation, Ev>) -> Self {
        Self { context }
    }

    /// Open the picker for a single image.
    pub fn pick_image<F>(&self, config: PickConfig, make_event: F)
    where
        F: FnOnce(GalleryResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let config = config.validated();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(GalleryOperation::PickImage { config })
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GalleryOperation {
    PickImage { config: PickConfig },
}

impl Operation for GalleryOperation {
    type Output = GalleryResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickConfig {
    /// MIME prefix the picker should accept, e.g. "image/".
    pub accept: String,
    pub max_bytes: usize,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            accept: "image/".into(),
            max_bytes: MAX_PICK_BYTES,
        }
    }
}

impl PickConfig {
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use]
    pub fn validated(mut self) -> Self {
        self.max_bytes = self.max_bytes.clamp(1, MAX_PICK_BYTES);
        if self.accept.is_empty() {
            self.accept = "image/".into();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GalleryOutput {
    Image {
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
        mime_type: Option<String>,
    },
    Cancelled,
}

impl GalleryOutput {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GalleryError {
    #[error("picker unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("selected file could not be read: {reason}")]
    ReadFailed { reason: String },

    #[error("selected file too large: {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("selected file is not an image")]
    NotAnImage,
}

pub type GalleryResult = Result<GalleryOutput, GalleryError>;
