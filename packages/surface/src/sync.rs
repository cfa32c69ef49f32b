//! Feature-state synchronizer.
//!
//! [`FeatureStateSync`] is the only writer of per-feature interaction state
//! on the rendering surface. It keeps a shadow table of every non-default
//! [`FeatureFlags`] entry so that:
//!
//! - at most one feature is selected and at most one is hovered, and the
//!   previous holder is always cleared before the new one is set;
//! - compare membership is bounded by [`CompareSet`] capacity;
//! - the whole table can be re-applied after the source data is replaced.
//!
//! Ids outside the current feature set are ignored with a log line, since
//! late events from a previous data snapshot are expected.

use std::collections::{BTreeMap, BTreeSet};

use realty_map_area_models::AreaId;

use crate::{FeatureFlags, FeatureStatePatch, FeatureStateSurface};

/// Rejected compare-set mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("Compare set is full ({capacity} areas), cannot add {id}")]
    CompareSetFull { capacity: usize, id: AreaId },
}

/// Bounded, insertion-ordered set of compared areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareSet {
    capacity: usize,
    members: Vec<AreaId>,
}

impl CompareSet {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::new(),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn members(&self) -> &[AreaId] {
        &self.members
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    #[must_use]
    pub fn contains(&self, id: &AreaId) -> bool {
        self.members.contains(id)
    }

    /// Appends `id`. Returns `Ok(false)` if it was already a member.
    ///
    /// # Errors
    ///
    /// * If the set is full; the set is left unchanged.
    pub fn insert(&mut self, id: AreaId) -> Result<bool, CapacityError> {
        if self.contains(&id) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(CapacityError::CompareSetFull {
                capacity: self.capacity,
                id,
            });
        }
        self.members.push(id);
        Ok(true)
    }

    /// Removes `id`, keeping the order of the others.
    pub fn remove(&mut self, id: &AreaId) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member != id);
        self.members.len() != before
    }

    fn take(&mut self) -> Vec<AreaId> {
        std::mem::take(&mut self.members)
    }
}

/// Sole writer of feature state for one source.
#[derive(Debug, Clone)]
pub struct FeatureStateSync {
    source: String,
    known: BTreeSet<AreaId>,
    shadow: BTreeMap<AreaId, FeatureFlags>,
    selected: Option<AreaId>,
    hovered: Option<AreaId>,
    compare: CompareSet,
}

impl FeatureStateSync {
    #[must_use]
    pub fn new(source: impl Into<String>, compare_capacity: usize) -> Self {
        Self {
            source: source.into(),
            known: BTreeSet::new(),
            shadow: BTreeMap::new(),
            selected: None,
            hovered: None,
            compare: CompareSet::new(compare_capacity),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn selected(&self) -> Option<&AreaId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub const fn hovered(&self) -> Option<&AreaId> {
        self.hovered.as_ref()
    }

    #[must_use]
    pub const fn compare_set(&self) -> &CompareSet {
        &self.compare
    }

    #[must_use]
    pub fn is_known(&self, id: &AreaId) -> bool {
        self.known.contains(id)
    }

    /// Shadow flags for `id`.
    #[must_use]
    pub fn flags(&self, id: &AreaId) -> FeatureFlags {
        self.shadow.get(id).copied().unwrap_or_default()
    }

    /// Replaces the set of addressable feature ids after a data refresh.
    ///
    /// Interaction state on ids that disappeared is dropped; state on
    /// surviving ids is re-applied to the surface.
    pub fn set_feature_ids(
        &mut self,
        ids: impl IntoIterator<Item = AreaId>,
        surface: &mut dyn FeatureStateSurface,
    ) {
        self.known = ids.into_iter().collect();

        let stale: Vec<AreaId> = self
            .shadow
            .keys()
            .filter(|id| !self.known.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            log::debug!("Dropping interaction state for vanished area {id}");
            self.shadow.remove(id);
            self.compare.remove(id);
        }
        if self.selected.as_ref().is_some_and(|id| !self.known.contains(id)) {
            self.selected = None;
        }
        if self.hovered.as_ref().is_some_and(|id| !self.known.contains(id)) {
            self.hovered = None;
        }

        self.reapply(surface);
    }

    /// Writes every shadow entry to the surface again.
    pub fn reapply(&self, surface: &mut dyn FeatureStateSurface) {
        for (id, flags) in &self.shadow {
            surface.set_feature_state(&self.source, id, FeatureStatePatch::full(*flags));
        }
    }

    /// Sets or clears the exclusive selection.
    ///
    /// Selecting a new id clears the previous one first. Returns whether
    /// anything changed.
    pub fn set_selected(
        &mut self,
        id: &AreaId,
        selected: bool,
        surface: &mut dyn FeatureStateSurface,
    ) -> bool {
        if !self.check_known(id) {
            return false;
        }

        if selected {
            if self.selected.as_ref() == Some(id) {
                return false;
            }
            if let Some(previous) = self.selected.take() {
                self.write(&previous, FeatureStatePatch::selected(false), surface);
            }
            self.write(id, FeatureStatePatch::selected(true), surface);
            self.selected = Some(id.clone());
            true
        } else if self.selected.as_ref() == Some(id) {
            self.selected = None;
            self.write(id, FeatureStatePatch::selected(false), surface);
            true
        } else {
            false
        }
    }

    /// Clears the selection, returning the previously selected id.
    pub fn clear_selection(&mut self, surface: &mut dyn FeatureStateSurface) -> Option<AreaId> {
        let previous = self.selected.take()?;
        self.write(&previous, FeatureStatePatch::selected(false), surface);
        Some(previous)
    }

    /// Adds or removes `id` from the compare set.
    ///
    /// # Errors
    ///
    /// * [`CapacityError::CompareSetFull`] when adding to a full set. No
    ///   state changes in that case.
    pub fn set_compared(
        &mut self,
        id: &AreaId,
        compared: bool,
        surface: &mut dyn FeatureStateSurface,
    ) -> Result<bool, CapacityError> {
        if !self.check_known(id) {
            return Ok(false);
        }

        let changed = if compared {
            self.compare.insert(id.clone())?
        } else {
            self.compare.remove(id)
        };
        if changed {
            self.write(id, FeatureStatePatch::compared(compared), surface);
        }
        Ok(changed)
    }

    /// Flips compare membership. Returns whether `id` is now a member.
    ///
    /// # Errors
    ///
    /// * [`CapacityError::CompareSetFull`] when adding to a full set.
    pub fn toggle_compare(
        &mut self,
        id: &AreaId,
        surface: &mut dyn FeatureStateSurface,
    ) -> Result<bool, CapacityError> {
        let add = !self.compare.contains(id);
        self.set_compared(id, add, surface)?;
        Ok(self.compare.contains(id))
    }

    /// Empties the compare set, returning the former members in order.
    pub fn clear_compare(&mut self, surface: &mut dyn FeatureStateSurface) -> Vec<AreaId> {
        let members = self.compare.take();
        for id in &members {
            self.write(id, FeatureStatePatch::compared(false), surface);
        }
        members
    }

    /// Moves or clears the hover. The previous hover is always cleared
    /// before a new one is set.
    pub fn set_hovered(
        &mut self,
        id: &AreaId,
        hovered: bool,
        surface: &mut dyn FeatureStateSurface,
    ) -> bool {
        if !self.check_known(id) {
            return false;
        }

        if hovered {
            if self.hovered.as_ref() == Some(id) {
                return false;
            }
            self.clear_hover(surface);
            self.write(id, FeatureStatePatch::hovered(true), surface);
            self.hovered = Some(id.clone());
            true
        } else if self.hovered.as_ref() == Some(id) {
            self.clear_hover(surface);
            true
        } else {
            false
        }
    }

    /// Clears the hover unconditionally (pointer left the surface).
    pub fn clear_hover(&mut self, surface: &mut dyn FeatureStateSurface) {
        if let Some(previous) = self.hovered.take() {
            self.write(&previous, FeatureStatePatch::hovered(false), surface);
        }
    }

    /// Resets every flag on every feature.
    pub fn clear_all(&mut self, surface: &mut dyn FeatureStateSurface) {
        let entries = std::mem::take(&mut self.shadow);
        for id in entries.keys() {
            surface.set_feature_state(
                &self.source,
                id,
                FeatureStatePatch::full(FeatureFlags::default()),
            );
        }
        self.selected = None;
        self.hovered = None;
        self.compare.take();
    }

    fn check_known(&self, id: &AreaId) -> bool {
        let known = self.known.contains(id);
        if !known {
            log::debug!("Ignoring feature state for unknown area {id}");
        }
        known
    }

    fn write(
        &mut self,
        id: &AreaId,
        patch: FeatureStatePatch,
        surface: &mut dyn FeatureStateSurface,
    ) {
        let mut flags = self.flags(id);
        patch.apply(&mut flags);
        if flags.is_clear() {
            self.shadow.remove(id);
        } else {
            self.shadow.insert(id.clone(), flags);
        }
        surface.set_feature_state(&self.source, id, patch);
    }
}
