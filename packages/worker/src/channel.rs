//! Debounced compute channel.
//!
//! Every [`ComputeChannel::submit`] bumps a generation counter and schedules
//! a task that sleeps through the quiescence window. A task that wakes to
//! find a newer generation was superseded and exits without computing.
//! Otherwise the composition starts and always runs to completion; its
//! response is sent even if newer requests arrive in the meantime, and the
//! receiver decides whether it still matters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use geojson::FeatureCollection;
use parking_map_compositor::compose_catalog;
use parking_map_lots::LotCatalog;
use parking_map_lots_models::LotId;
use parking_map_records_models::ViewKey;
use parking_map_status_models::LotStatus;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Quiet period a request must survive before it is computed.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(300);

/// Tuning for a [`ComputeChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// How long a request waits for a newer one before it starts.
    pub quiescence: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

/// A request to compose regions for one view date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    /// Key of the view date the statuses were gathered for.
    pub target_key: ViewKey,
    /// Representative status per lot id. Lots left out count as unknown.
    #[serde(rename = "perLotStatusMap")]
    pub statuses: BTreeMap<LotId, LotStatus>,
}

/// Regions composed for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResponse {
    /// The `target_key` of the request this answers.
    pub originating_key: ViewKey,
    /// Status regions as a `GeoJSON` `FeatureCollection`.
    #[serde(rename = "computedFeatureCollection")]
    pub collection: FeatureCollection,
    /// Geometry problems encountered while composing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Debounced, non-blocking front end to the region compositor.
pub struct ComputeChannel {
    catalog: Arc<LotCatalog>,
    config: ChannelConfig,
    runtime: Handle,
    generation: Arc<AtomicU64>,
    executed: Arc<AtomicUsize>,
    responses: mpsc::UnboundedSender<ComputeResponse>,
}

impl ComputeChannel {
    /// Creates a channel composing over `catalog` on `runtime`.
    ///
    /// Responses arrive on the returned receiver in completion order, which
    /// need not match submission order.
    #[must_use]
    pub fn new(
        catalog: Arc<LotCatalog>,
        config: ChannelConfig,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<ComputeResponse>) {
        let (responses, receiver) = mpsc::unbounded_channel();
        let channel = Self {
            catalog,
            config,
            runtime,
            generation: Arc::new(AtomicU64::new(0)),
            executed: Arc::new(AtomicUsize::new(0)),
            responses,
        };
        (channel, receiver)
    }

    /// The tuning this channel was created with.
    #[must_use]
    pub const fn config(&self) -> ChannelConfig {
        self.config
    }

    /// Number of compositions that actually started.
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Schedules `request`, superseding any request still in its quiet
    /// period. Returns immediately and may be called outside the runtime.
    pub fn submit(&self, request: ComputeRequest) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!(
            "Queued request {generation} for {}",
            request.target_key
        );

        let latest = Arc::clone(&self.generation);
        let executed = Arc::clone(&self.executed);
        let catalog = Arc::clone(&self.catalog);
        let responses = self.responses.clone();
        let quiescence = self.config.quiescence;

        self.runtime.spawn(async move {
            tokio::time::sleep(quiescence).await;

            if latest.load(Ordering::SeqCst) != generation {
                log::debug!(
                    "Request {generation} for {} superseded",
                    request.target_key
                );
                return;
            }

            executed.fetch_add(1, Ordering::SeqCst);
            let ComputeRequest {
                target_key,
                statuses,
            } = request;

            let composed =
                tokio::task::spawn_blocking(move || compose_catalog(&catalog, &statuses)).await;

            let composition = match composed {
                Ok(composition) => composition,
                Err(e) => {
                    log::error!("Composition for {target_key} did not finish: {e}");
                    return;
                }
            };

            log::debug!(
                "Composed {} regions for {target_key}",
                composition.regions.len()
            );

            let response = ComputeResponse {
                originating_key: target_key,
                collection: composition.to_feature_collection(),
                errors: composition.errors.iter().map(ToString::to_string).collect(),
            };
            if responses.send(response).is_err() {
                log::debug!("Response receiver dropped; discarding composition");
            }
        });
    }
}
