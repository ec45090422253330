use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REPORTS_COLLECTION: &str = "user_reports";
pub const UPLOADS_PATH_PREFIX: &str = "user-uploads/anonymous";
pub const MAX_FETCH_LIMIT: u32 = 200;

/// The hosted document database / object storage service the dashboard
/// delegates persistence to.
///
/// Documents cross this boundary as opaque JSON bytes; the typed report
/// schema lives in the core and is serialized at the call site. Blob
/// uploads return a public download URL which is then written into the
/// report document, mirroring the upload-then-insert sequence of the
/// hosted SDK.
#[derive(Debug, Clone)]
pub struct ReportStore<Ev> {
    context: CapabilityContext<StoreOperation, Ev>,
}

impl<Ev> Capability<Ev> for ReportStore<Ev> {
    type Operation = StoreOperation;
    type MappedSelf<MappedEv> = ReportStore<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        ReportStore::new(self.context.map_event(f))
    }
}

impl<Ev> ReportStore<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<StoreOperation, Ev>) -> Self {
        Self { context }
    }

    /// Insert one document into `collection`.
    pub fn insert_document<F>(
        &self,
        collection: impl Into<String>,
        document: Vec<u8>,
        make_event: F,
    ) where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let collection = collection.into();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StoreOperation::InsertDocument {
                    collection,
                    document,
                })
                .await;
            context.update_app(make_event(result));
        });
    }

    /// Upload a binary blob and obtain its download URL.
    pub fn upload_blob<F>(
        &self,
        path: impl Into<String>,
        data: Vec<u8>,
        content_type: impl Into<String>,
        make_event: F,
    ) where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let path = path.into();
        let content_type = content_type.into();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StoreOperation::UploadBlob {
                    path,
                    data,
                    content_type,
                })
                .await;
            context.update_app(make_event(result));
        });
    }

    /// Fetch the newest documents of `collection`, newest first.
    pub fn fetch_recent<F>(&self, collection: impl Into<String>, limit: u32, make_event: F)
    where
        F: FnOnce(StoreResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let collection = collection.into();
        let limit = limit.min(MAX_FETCH_LIMIT);
        self.context.spawn(async move {
            let result = context
                .request_from_shell(StoreOperation::FetchRecent { collection, limit })
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreOperation {
    InsertDocument {
        collection: String,
        #[serde(with = "serde_bytes")]
        document: Vec<u8>,
    },
    UploadBlob {
        path: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
        content_type: String,
    },
    FetchRecent {
        collection: String,
        limit: u32,
    },
}

impl Operation for StoreOperation {
    type Output = StoreResult;
}

/// One fetched document: service-assigned id plus raw JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreOutput {
    Inserted { id: String },
    BlobStored { url: String },
    Documents { documents: Vec<StoredDocument> },
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreError {
    #[error("network error: {reason}")]
    Network { reason: String },

    #[error("request timed out")]
    Timeout,

    #[error("permission denied by the storage service")]
    PermissionDenied,

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("document rejected: {reason}")]
    InvalidDocument { reason: String },

    #[error("storage operation failed: {reason}")]
    Failed { reason: String },
}

impl StoreError {
    /// Whether a user-initiated retry is worth offering. Matches the retry
    /// semantics of the submission flow: transient transport failures are,
    /// service-side rejections are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout | Self::Failed { .. }
        )
    }
}

pub type StoreResult = Result<StoreOutput, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(StoreError::Timeout.is_retryable());
        assert!(StoreError::Network {
            reason: "offline".into()
        }
        .is_retryable());

        assert!(!StoreError::PermissionDenied.is_retryable());
        assert!(!StoreError::InvalidDocument {
            reason: "schema".into()
        }
        .is_retryable());
        assert!(!StoreError::QuotaExceeded.is_retryable());
    }

    #[test]
    fn operations_round_trip_through_serde() {
        let op = StoreOperation::UploadBlob {
            path: format!("{UPLOADS_PATH_PREFIX}/123_pothole.jpg"),
            data: vec![0xFF, 0xD8, 0xFF],
            content_type: "image/jpeg".into(),
        };

        let bytes = serde_json::to_vec(&op).unwrap();
        let parsed: StoreOperation = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(op, parsed);
    }
}
