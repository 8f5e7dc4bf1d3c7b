//! The interactive view session.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDate;
use geojson::FeatureCollection;
use parking_map_lots::{LotCatalog, lot_points, status_map};
use parking_map_lots_models::LotSummary;
use parking_map_records::{Direction, TemporalIndex};
use parking_map_records_models::{ViewDate, ViewDateParseError, ViewKey};

use crate::channel::{ComputeChannel, ComputeRequest, ComputeResponse};

/// The key of the view date currently on screen.
///
/// Written only by the session on navigation and read whenever a response
/// arrives.
#[derive(Debug, Clone, Default)]
pub struct ActiveKey(Arc<RwLock<Option<ViewKey>>>);

impl ActiveKey {
    /// Replaces the active key.
    pub fn set(&self, key: ViewKey) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
    }

    /// The active key, if any view date has been navigated to.
    #[must_use]
    pub fn get(&self) -> Option<ViewKey> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether `key` is the active key.
    #[must_use]
    pub fn is_active(&self, key: &ViewKey) -> bool {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| active == key)
    }
}

/// Current view date, its lot summaries, and the last applied regions.
///
/// Lot summaries are cheap and recomputed synchronously on every
/// navigation. Regions go through the [`ComputeChannel`] and are only
/// applied by [`ViewSession::receive`] when they match the active key.
pub struct ViewSession {
    index: Arc<TemporalIndex>,
    catalog: Arc<LotCatalog>,
    channel: ComputeChannel,
    active: ActiveKey,
    view: ViewDate,
    summaries: Vec<LotSummary>,
    regions: Option<FeatureCollection>,
    regions_key: Option<ViewKey>,
    region_errors: Vec<String>,
}

impl ViewSession {
    /// Creates a session showing `initial`. Nothing is submitted until the
    /// first navigation.
    #[must_use]
    pub fn new(
        index: Arc<TemporalIndex>,
        catalog: Arc<LotCatalog>,
        channel: ComputeChannel,
        initial: ViewDate,
    ) -> Self {
        Self {
            index,
            catalog,
            channel,
            active: ActiveKey::default(),
            view: initial,
            summaries: Vec::new(),
            regions: None,
            regions_key: None,
            region_errors: Vec::new(),
        }
    }

    /// The current view date.
    #[must_use]
    pub const fn view(&self) -> &ViewDate {
        &self.view
    }

    /// Key of the current view date, once it has been navigated to.
    #[must_use]
    pub fn active_key(&self) -> Option<ViewKey> {
        self.active.get()
    }

    /// The shared temporal index.
    #[must_use]
    pub const fn index(&self) -> &Arc<TemporalIndex> {
        &self.index
    }

    /// The channel compositions are submitted to.
    #[must_use]
    pub const fn channel(&self) -> &ComputeChannel {
        &self.channel
    }

    /// Lot summaries for the current view date, ascending by grade.
    #[must_use]
    pub fn summaries(&self) -> &[LotSummary] {
        &self.summaries
    }

    /// Lot marker features for the current view date.
    #[must_use]
    pub fn lot_points(&self) -> FeatureCollection {
        lot_points(&self.catalog, &self.summaries)
    }

    /// The most recently applied regions. These may belong to an earlier
    /// view date until the current composition arrives.
    #[must_use]
    pub const fn regions(&self) -> Option<&FeatureCollection> {
        self.regions.as_ref()
    }

    /// Whether the applied regions were computed for the current view date.
    #[must_use]
    pub fn regions_current(&self) -> bool {
        self.regions_key
            .as_ref()
            .is_some_and(|key| self.active.is_active(key))
    }

    /// Geometry problems reported with the applied regions.
    #[must_use]
    pub fn region_errors(&self) -> &[String] {
        &self.region_errors
    }

    /// Makes `view` the current view date and submits its composition.
    ///
    /// Returns the new active key.
    pub fn navigate(&mut self, view: ViewDate) -> ViewKey {
        let histories = self.index.statuses_for_view_date(&view);
        self.summaries = self.catalog.summaries(&histories);

        let key = view.key();
        self.view = view;
        self.active.set(key.clone());

        log::info!("Viewing {view} ({} lots with data)", histories.len());

        self.channel.submit(ComputeRequest {
            target_key: key.clone(),
            statuses: status_map(&self.summaries),
        });

        key
    }

    /// Navigates to an encoded view date, keeping the current time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ViewDateParseError`] if `encoded` cannot be decoded. The
    /// current view date is left unchanged.
    pub fn navigate_encoded(&mut self, encoded: &str) -> Result<ViewKey, ViewDateParseError> {
        let view = ViewDate::decode(encoded, &self.view)?;
        Ok(self.navigate(view))
    }

    /// Moves half an hour in `direction`. Returns `None`, without
    /// navigating, at the edge of the recorded range.
    pub fn step(&mut self, direction: Direction) -> Option<ViewKey> {
        let next = self.index.step(&self.view, direction)?;
        Some(self.navigate(next))
    }

    /// Moves an instant to `day`, clamped into the recorded range.
    pub fn select_day(&mut self, day: NaiveDate) -> ViewKey {
        let next = self.index.with_day(&self.view, day);
        self.navigate(next)
    }

    /// Applies `response` if it was computed for the active view date.
    ///
    /// Returns `false`, leaving the session untouched, for stale responses.
    pub fn receive(&mut self, response: ComputeResponse) -> bool {
        if !self.active.is_active(&response.originating_key) {
            log::debug!("Discarding stale regions for {}", response.originating_key);
            return false;
        }

        for error in &response.errors {
            log::warn!("{error}");
        }
        self.regions = Some(response.collection);
        self.regions_key = Some(response.originating_key);
        self.region_errors = response.errors;
        true
    }
}
