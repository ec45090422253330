use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ALERT_LIMIT: u32 = 10;
pub const MAX_ALERT_LIMIT: u32 = 50;

/// External predictive-insights provider.
///
/// The core treats city-scale forecasting as an opaque service that
/// returns structured alert records; the scoring model behind them is
/// replaceable and out of scope.
#[derive(Debug, Clone)]
pub struct InsightsProvider<Ev> {
    context: CapabilityContext<InsightsOperation, Ev>,
}

impl<Ev> Capability<Ev> for InsightsProvider<Ev> {
    type Operation = InsightsOperation;
    type MappedSelf<MappedEv> = InsightsProvider<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        InsightsProvider::new(self.context.map_event(f))
    }
}

impl<Ev> InsightsProvider<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<InsightsOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn fetch_alerts<F>(&self, limit: u32, make_event: F)
    where
        F: FnOnce(InsightsResult) -> Ev + Send + 'static,
    {
        let context = self.context.clone();
        let limit = limit.clamp(1, MAX_ALERT_LIMIT);
        self.context.spawn(async move {
            let result = context
                .request_from_shell(InsightsOperation::FetchPredictiveAlerts { limit })
                .await;
            context.update_app(make_event(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum InsightsOperation {
    FetchPredictiveAlerts { limit: u32 },
}

impl Operation for InsightsOperation {
    type Output = InsightsResult;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Traffic,
    Weather,
    Infrastructure,
    Event,
    Emergency,
}

impl AlertKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Weather => "weather",
            Self::Infrastructure => "infrastructure",
            Self::Event => "event",
            Self::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One structured prediction record, as delivered by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictiveAlert {
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    /// Confidence in percent, 0..=100.
    pub probability_pct: u8,
    /// Human-readable onset, e.g. "In 3 hours".
    pub timeframe: String,
    pub estimated_duration: String,
    pub affected_areas: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub expires_at_ms: u64,
}

impl PredictiveAlert {
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum InsightsError {
    #[error("insights provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("insights request timed out")]
    Timeout,

    #[error("insights request failed: {reason}")]
    Failed { reason: String },
}

pub type InsightsResult = Result<Vec<PredictiveAlert>, InsightsError>;
