// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    CatalogEntry, CatalogSet, Indicator, Level, RelationDraft, RelationKind, ScalarField,
};

/// The levels a form exposes, plus whether inactive entities may be picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSpec {
    levels: Vec<Level>,
    active_only: bool,
}

impl CascadeSpec {
    /// Levels are kept in hierarchy order. The instrument is always included.
    pub fn new(levels: &[Level]) -> Self {
        let mut levels = levels.to_vec();
        if !levels.contains(&Level::Instrument) {
            levels.push(Level::Instrument);
        }
        levels.sort();
        levels.dedup();
        Self {
            levels,
            active_only: true,
        }
    }

    pub fn for_relation(kind: RelationKind) -> Self {
        Self::new(kind.levels())
    }

    pub fn include_inactive(mut self) -> Self {
        self.active_only = false;
        self
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn contains(&self, level: Level) -> bool {
        self.levels.contains(&level)
    }

    pub fn active_only(&self) -> bool {
        self.active_only
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerGate {
    Open,
    Blocked(String),
    Unsupported,
}

/// What a single level selection did to the draft.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectOutcome {
    pub changed: bool,
    pub cleared: Vec<Level>,
    pub backfilled: Vec<Level>,
    /// Ancestor slots left as they were although the picked entity disagrees.
    pub conflicts: Vec<Level>,
}

/// Owns the relation draft and keeps its hierarchy slots consistent.
#[derive(Debug, Clone)]
pub struct CascadeController {
    catalogs: Arc<CatalogSet>,
    spec: CascadeSpec,
    draft: RelationDraft,
}

impl CascadeController {
    pub fn new(catalogs: Arc<CatalogSet>, spec: CascadeSpec, draft: RelationDraft) -> Self {
        Self {
            catalogs,
            spec,
            draft,
        }
    }

    pub fn for_new(catalogs: Arc<CatalogSet>, kind: RelationKind) -> Self {
        Self::new(catalogs, CascadeSpec::for_relation(kind), RelationDraft::new(kind))
    }

    pub fn spec(&self) -> &CascadeSpec {
        &self.spec
    }

    pub fn catalogs(&self) -> &CatalogSet {
        &self.catalogs
    }

    pub fn draft(&self) -> &RelationDraft {
        &self.draft
    }

    pub fn into_draft(self) -> RelationDraft {
        self.draft
    }

    /// Starts over with an empty draft of the same kind, keeping the catalogs.
    pub fn reset(&mut self) {
        self.draft = RelationDraft::new(self.draft.kind());
    }

    /// Entities at `level` that agree with every non-empty ancestor slot.
    pub fn candidates_for(&self, level: Level) -> Vec<&CatalogEntry> {
        self.catalogs
            .entries(level)
            .iter()
            .filter(|entry| !self.spec.active_only() || entry.active)
            .filter(|entry| self.is_consistent(entry))
            .collect()
    }

    fn is_consistent(&self, entry: &CatalogEntry) -> bool {
        let lineage = self.catalogs.resolved_lineage(entry);
        entry.level.ancestors().iter().all(|ancestor| {
            match (self.draft.slot(*ancestor), lineage.get(*ancestor)) {
                (Some(chosen), Some(stored)) => chosen == stored,
                _ => true,
            }
        })
    }

    pub fn picker_gate(&self, level: Level) -> PickerGate {
        if !self.spec.contains(level) {
            return PickerGate::Unsupported;
        }
        if level != Level::Instrument && self.draft.slot(Level::Instrument).is_none() {
            return PickerGate::Blocked(format!(
                "choose an instrument first -- the {} list depends on it",
                level.label()
            ));
        }
        PickerGate::Open
    }

    /// Sets or clears `level`, clearing stale descendants and filling empty
    /// ancestors from the picked entity's lineage.
    pub fn select_level(&mut self, level: Level, entity: Option<&CatalogEntry>) -> SelectOutcome {
        if !self.spec.contains(level) {
            warn!(level = level.label(), "selection ignored for level outside the form");
            return SelectOutcome::default();
        }
        if let Some(entity) = entity
            && entity.level != level
        {
            warn!(
                level = level.label(),
                entity_level = entity.level.label(),
                "selection ignored for entity from another level"
            );
            return SelectOutcome::default();
        }

        let next = entity.map(|entity| entity.id);
        if self.draft.slot(level) == next {
            return SelectOutcome::default();
        }

        let mut outcome = SelectOutcome {
            changed: true,
            ..SelectOutcome::default()
        };
        self.draft.set_slot(level, next);

        for descendant in level.descendants() {
            if self.spec.contains(*descendant) && self.draft.slot(*descendant).is_some() {
                self.draft.set_slot(*descendant, None);
                outcome.cleared.push(*descendant);
            }
        }

        if let Some(entity) = entity {
            let lineage = self.catalogs.resolved_lineage(entity);
            for ancestor in level.ancestors() {
                if !self.spec.contains(*ancestor) {
                    continue;
                }
                match (self.draft.slot(*ancestor), lineage.get(*ancestor)) {
                    (None, Some(stored)) => {
                        self.draft.set_slot(*ancestor, Some(stored));
                        outcome.backfilled.push(*ancestor);
                    }
                    (Some(chosen), Some(stored)) if chosen != stored => {
                        outcome.conflicts.push(*ancestor);
                    }
                    _ => {}
                }
            }
        }

        // A back-filled instrument invalidates picks made before it existed.
        if outcome.backfilled.contains(&Level::Instrument) {
            for stale in Level::Instrument.descendants() {
                if *stale == level || level.ancestors().contains(stale) {
                    continue;
                }
                if self.spec.contains(*stale) && self.draft.slot(*stale).is_some() {
                    self.draft.set_slot(*stale, None);
                    outcome.cleared.push(*stale);
                }
            }
        }

        debug!(
            level = level.label(),
            id = ?next,
            cleared = outcome.cleared.len(),
            backfilled = outcome.backfilled.len(),
            conflicts = outcome.conflicts.len(),
            "cascade selection applied"
        );
        outcome
    }

    /// Human-readable value of a slot, resolved even for inactive entities.
    pub fn display_label(&self, level: Level) -> Option<String> {
        self.draft
            .slot(level)
            .map(|id| self.catalogs.label_for(level, id))
    }

    pub fn indicator_candidates(&self) -> Vec<&Indicator> {
        self.catalogs
            .indicators()
            .iter()
            .filter(|indicator| !self.spec.active_only() || indicator.status.is_active())
            .collect()
    }

    pub fn set_indicator(&mut self, indicator: Option<&Indicator>) {
        self.draft.scalars_mut().indicator_id = indicator.map(|indicator| indicator.id);
    }

    pub fn indicator_label(&self) -> Option<String> {
        self.draft
            .scalars()
            .indicator_id
            .map(|id| self.catalogs.indicator_label(id))
    }

    pub fn set_scalar(&mut self, field: ScalarField, raw: &str) -> Result<()> {
        field.apply(self.draft.scalars_mut(), raw)
    }

    /// The draft's own checks, plus agreement between every filled slot and
    /// its filled ancestors.
    pub fn validate(&self) -> Result<()> {
        self.draft.validate()?;
        let conflicts = self.conflicting_levels();
        if !conflicts.is_empty() {
            let labels = conflicts
                .iter()
                .map(|level| level.label())
                .collect::<Vec<_>>()
                .join(", ");
            bail!("{labels} does not belong to the chosen parents -- pick again and retry");
        }
        Ok(())
    }

    /// Filled slots whose value no longer agrees with a filled ancestor.
    pub fn conflicting_levels(&self) -> Vec<Level> {
        self.spec
            .levels()
            .iter()
            .copied()
            .filter(|level| {
                let Some(id) = self.draft.slot(*level) else {
                    return false;
                };
                match self.catalogs.entry(*level, id) {
                    Some(entry) => !self.is_consistent(entry),
                    None => false,
                }
            })
            .collect()
    }
}
