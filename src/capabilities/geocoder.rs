use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Country bias passed to the shell's autocomplete service.
pub const REGION_BIAS: &str = "in";
pub const MAX_SUGGESTIONS: usize = 5;

/// Place autocomplete, backed by the maps SDK on the shell side.
///
/// The core only ever sees ranked `(id, label)` candidates; resolving a
/// label to coordinates stays with the shell's geocoding service.
#[derive(Debug, Clone)]
pub struct Geocoder<Ev> {
    context: CapabilityContext<GeocoderOperation, Ev>,
}

impl<Ev> Capability<Ev> for Geocoder<Ev> {
    type Operation = GeocoderOperation;
    type MappedSelf<MappedEv> = Geocoder<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Geocoder::new(self.context.map_event(f))
    }
}

impl<Ev> Geocoder<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<GeocoderOperation, Ev>) -> Self {
        Self { context }
    }

    /// Ask the shell for place suggestions matching `query`.
    ///
    /// At most one call per debounce window is expected from the caller;
    /// this capability does no rate limiting of its own.
    pub fn suggest<F>(&self, query: impl Into<String>, make_event: F)
    where
        F: FnOnce(GeocoderResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let query = query.into();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(GeocoderOperation::Suggest {
                    query,
                    region: REGION_BIAS.to_string(),
                })
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeocoderOperation {
    Suggest { query: String, region: String },
}

impl Operation for GeocoderOperation {
    type Output = GeocoderResult;
}

/// One ranked autocomplete candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaceSuggestion {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeocoderOutput {
    Suggestions(Vec<PlaceSuggestion>),
}

impl GeocoderOutput {
    #[must_use]
    pub fn into_suggestions(self) -> Vec<PlaceSuggestion> {
        match self {
            Self::Suggestions(suggestions) => suggestions,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeocoderError {
    #[error("autocomplete service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("autocomplete request timed out")]
    Timeout,

    #[error("autocomplete quota exceeded")]
    QuotaExceeded,

    #[error("autocomplete failed: {reason}")]
    Failed { reason: String },
}

pub type GeocoderResult = Result<GeocoderOutput, GeocoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_unwraps_to_suggestions() {
        let output = GeocoderOutput::Suggestions(vec![PlaceSuggestion {
            id: "p1".into(),
            label: "MG Road, Bengaluru".into(),
        }]);

        let suggestions = output.into_suggestions();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].label, "MG Road, Bengaluru");
    }

    #[test]
    fn operation_round_trips_through_serde() {
        let op = GeocoderOperation::Suggest {
            query: "Koramangala".into(),
            region: REGION_BIAS.into(),
        };

        let bytes = serde_json::to_vec(&op).unwrap();
        let parsed: GeocoderOperation = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(op, parsed);
    }
}
