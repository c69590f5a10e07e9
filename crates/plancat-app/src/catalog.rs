// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

use crate::{
    Action, Axis, Dimension, EntityKind, Indicator, IndicatorId, Instrument, Intervention, Level,
    Objective, OrgUnit, PlanResult, Policy, Relation,
};

/// Ancestor ids of a catalog entity, one nullable slot per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Lineage([Option<i64>; Level::COUNT]);

impl Lineage {
    pub const EMPTY: Self = Self([None; Level::COUNT]);

    pub fn get(&self, level: Level) -> Option<i64> {
        self.0[level.index()]
    }

    pub fn set(&mut self, level: Level, id: Option<i64>) {
        self.0[level.index()] = id;
    }

    pub fn with(mut self, level: Level, id: Option<i64>) -> Self {
        self.set(level, id);
        self
    }

    fn fill_missing(&mut self, other: &Self, levels: &[Level]) {
        for level in levels {
            if self.get(*level).is_none() {
                self.set(*level, other.get(*level));
            }
        }
    }
}

/// Uniform projection of a hierarchy entity used by the cascade and by pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub level: Level,
    pub id: i64,
    pub code: String,
    pub label: String,
    pub active: bool,
    pub lineage: Lineage,
}

impl CatalogEntry {
    pub fn display(&self) -> String {
        if self.code.is_empty() {
            self.label.clone()
        } else {
            format!("{} {}", self.code, self.label)
        }
    }
}

pub trait Cascadable {
    fn catalog_entry(&self) -> CatalogEntry;
}

impl Cascadable for Instrument {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Instrument,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.name.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY,
        }
    }
}

impl Cascadable for Axis {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Axis,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.name.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY.with(Level::Instrument, Some(self.instrument_id.get())),
        }
    }
}

impl Cascadable for Policy {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Policy,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.name.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, Some(self.instrument_id.get()))
                .with(Level::Axis, self.axis_id.map(|id| id.get())),
        }
    }
}

impl Cascadable for Objective {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Objective,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.text.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, Some(self.instrument_id.get()))
                .with(Level::Axis, self.axis_id.map(|id| id.get()))
                .with(Level::Policy, self.policy_id.map(|id| id.get())),
        }
    }
}

impl Cascadable for Action {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Action,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.text.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, self.instrument_id.map(|id| id.get()))
                .with(Level::Axis, self.axis_id.map(|id| id.get()))
                .with(Level::Policy, self.policy_id.map(|id| id.get()))
                .with(Level::Objective, Some(self.objective_id.get())),
        }
    }
}

impl Cascadable for Intervention {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Intervention,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.text.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, self.instrument_id.map(|id| id.get()))
                .with(Level::Policy, self.policy_id.map(|id| id.get()))
                .with(Level::Objective, self.objective_id.map(|id| id.get()))
                .with(Level::Action, Some(self.action_id.get())),
        }
    }
}

impl Cascadable for PlanResult {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Result,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.text.clone(),
            active: true,
            lineage: Lineage::EMPTY
                .with(Level::Instrument, Some(self.instrument_id.get()))
                .with(Level::Policy, self.policy_id.map(|id| id.get()))
                .with(Level::Objective, self.objective_id.map(|id| id.get()))
                .with(Level::Action, self.action_id.map(|id| id.get())),
        }
    }
}

impl Cascadable for Dimension {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::Dimension,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.name.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, self.instrument_id.map(|id| id.get())),
        }
    }
}

impl Cascadable for OrgUnit {
    fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            level: Level::OrgUnit,
            id: self.id.get(),
            code: self.code.clone(),
            label: self.name.clone(),
            active: self.status.is_active(),
            lineage: Lineage::EMPTY
                .with(Level::Instrument, self.instrument_id.map(|id| id.get())),
        }
    }
}

/// A record as exchanged with a [`CatalogSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Instrument(Instrument),
    Axis(Axis),
    Policy(Policy),
    Objective(Objective),
    Action(Action),
    Intervention(Intervention),
    Result(PlanResult),
    Dimension(Dimension),
    OrgUnit(OrgUnit),
    Indicator(Indicator),
    Relation(Box<Relation>),
}

impl CatalogRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Instrument(_) => EntityKind::Instrument,
            Self::Axis(_) => EntityKind::Axis,
            Self::Policy(_) => EntityKind::Policy,
            Self::Objective(_) => EntityKind::Objective,
            Self::Action(_) => EntityKind::Action,
            Self::Intervention(_) => EntityKind::Intervention,
            Self::Result(_) => EntityKind::Result,
            Self::Dimension(_) => EntityKind::Dimension,
            Self::OrgUnit(_) => EntityKind::OrgUnit,
            Self::Indicator(_) => EntityKind::Indicator,
            Self::Relation(_) => EntityKind::Relation,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Instrument(record) => record.id.get(),
            Self::Axis(record) => record.id.get(),
            Self::Policy(record) => record.id.get(),
            Self::Objective(record) => record.id.get(),
            Self::Action(record) => record.id.get(),
            Self::Intervention(record) => record.id.get(),
            Self::Result(record) => record.id.get(),
            Self::Dimension(record) => record.id.get(),
            Self::OrgUnit(record) => record.id.get(),
            Self::Indicator(record) => record.id.get(),
            Self::Relation(record) => record.id.get(),
        }
    }

    /// Id of the record's required parent, the value `ListFilter::ancestor_id` matches.
    pub fn parent_id(&self) -> Option<i64> {
        match self {
            Self::Axis(record) => Some(record.instrument_id.get()),
            Self::Policy(record) => Some(record.instrument_id.get()),
            Self::Objective(record) => Some(record.instrument_id.get()),
            Self::Action(record) => Some(record.objective_id.get()),
            Self::Intervention(record) => Some(record.action_id.get()),
            Self::Result(record) => Some(record.instrument_id.get()),
            Self::Dimension(record) => record.instrument_id.map(|id| id.get()),
            Self::OrgUnit(record) => record.instrument_id.map(|id| id.get()),
            Self::Relation(record) => Some(record.instrument_id.get()),
            Self::Instrument(_) | Self::Indicator(_) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Self::Instrument(record) => record.status.is_active(),
            Self::Axis(record) => record.status.is_active(),
            Self::Policy(record) => record.status.is_active(),
            Self::Objective(record) => record.status.is_active(),
            Self::Action(record) => record.status.is_active(),
            Self::Intervention(record) => record.status.is_active(),
            Self::Result(_) => true,
            Self::Dimension(record) => record.status.is_active(),
            Self::OrgUnit(record) => record.status.is_active(),
            Self::Indicator(record) => record.status.is_active(),
            Self::Relation(record) => record.scalars.status.is_active(),
        }
    }

    pub fn catalog_entry(&self) -> Option<CatalogEntry> {
        match self {
            Self::Instrument(record) => Some(record.catalog_entry()),
            Self::Axis(record) => Some(record.catalog_entry()),
            Self::Policy(record) => Some(record.catalog_entry()),
            Self::Objective(record) => Some(record.catalog_entry()),
            Self::Action(record) => Some(record.catalog_entry()),
            Self::Intervention(record) => Some(record.catalog_entry()),
            Self::Result(record) => Some(record.catalog_entry()),
            Self::Dimension(record) => Some(record.catalog_entry()),
            Self::OrgUnit(record) => Some(record.catalog_entry()),
            Self::Indicator(_) | Self::Relation(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListFilter {
    /// Restricts results to children of this parent id.
    pub ancestor_id: Option<i64>,
    pub active_only: bool,
}

impl ListFilter {
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        if self.active_only && !record.is_active() {
            return false;
        }
        match self.ancestor_id {
            Some(ancestor_id) => record.parent_id() == Some(ancestor_id),
            None => true,
        }
    }
}

/// Read/write access to the remote catalog service.
///
/// `create` ignores the id carried by the payload and returns the id the
/// service assigned.
pub trait CatalogSource {
    fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<CatalogRecord>>;
    fn get_by_id(&self, kind: EntityKind, id: i64) -> Result<CatalogRecord>;
    fn create(&self, kind: EntityKind, payload: &CatalogRecord) -> Result<i64>;
    fn update(&self, kind: EntityKind, id: i64, payload: &CatalogRecord) -> Result<()>;
    fn delete(&self, kind: EntityKind, id: i64) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: EntityKind,
    pub message: String,
}

/// In-memory copy of every catalog a screen needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSet {
    entries: BTreeMap<Level, Vec<CatalogEntry>>,
    indicators: Vec<Indicator>,
}

impl CatalogSet {
    /// Fetches every catalog concurrently. Catalogs that fail stay empty and
    /// are reported in the returned failure list.
    pub fn load<S>(source: &S) -> (Self, Vec<LoadFailure>)
    where
        S: CatalogSource + Sync + ?Sized,
    {
        let mut catalogs = Self::default();
        let failures = catalogs.reload(source, &EntityKind::CATALOGS);
        (catalogs, failures)
    }

    /// Refetches `kinds` concurrently, replacing only the catalogs whose fetch
    /// succeeded.
    pub fn reload<S>(&mut self, source: &S, kinds: &[EntityKind]) -> Vec<LoadFailure>
    where
        S: CatalogSource + Sync + ?Sized,
    {
        let started = Instant::now();
        let results = thread::scope(|scope| {
            let handles = kinds
                .iter()
                .copied()
                .map(|kind| {
                    let handle = scope.spawn(move || source.list(kind, &ListFilter::default()));
                    (kind, handle)
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|(kind, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("{} loader panicked", kind.as_str())));
                    (kind, result)
                })
                .collect::<Vec<_>>()
        });

        let mut failures = Vec::new();
        for (kind, result) in results {
            match result {
                Ok(records) => {
                    debug!(kind = kind.as_str(), count = records.len(), "catalog loaded");
                    self.replace(kind, records);
                }
                Err(error) => {
                    warn!(kind = kind.as_str(), error = %error, "catalog load failed");
                    failures.push(LoadFailure {
                        kind,
                        message: format!("{error:#}"),
                    });
                }
            }
        }
        debug!(
            kinds = kinds.len(),
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog fan-out finished"
        );
        failures
    }

    pub fn replace(&mut self, kind: EntityKind, records: Vec<CatalogRecord>) {
        if kind == EntityKind::Indicator {
            self.indicators = records
                .into_iter()
                .filter_map(|record| match record {
                    CatalogRecord::Indicator(indicator) => Some(indicator),
                    _ => None,
                })
                .collect();
            return;
        }

        let Some(level) = kind.level() else {
            return;
        };
        let entries = records
            .iter()
            .filter_map(CatalogRecord::catalog_entry)
            .filter(|entry| entry.level == level)
            .collect();
        self.entries.insert(level, entries);
    }

    /// Takes the `kind` catalog from `other`, leaving every other catalog as it
    /// was.
    pub fn adopt(&mut self, kind: EntityKind, other: &CatalogSet) {
        if kind == EntityKind::Indicator {
            self.indicators = other.indicators.clone();
            return;
        }
        if let Some(level) = kind.level() {
            self.entries.insert(level, other.entries(level).to_vec());
        }
    }

    pub fn entries(&self, level: Level) -> &[CatalogEntry] {
        self.entries.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entry(&self, level: Level, id: i64) -> Option<&CatalogEntry> {
        self.entries(level).iter().find(|entry| entry.id == id)
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn indicator(&self, id: IndicatorId) -> Option<&Indicator> {
        self.indicators.iter().find(|indicator| indicator.id == id)
    }

    /// The entry's ancestor ids, completed through the stored parents of its
    /// nearest known ancestors.
    pub fn resolved_lineage(&self, entry: &CatalogEntry) -> Lineage {
        let mut lineage = entry.lineage;
        let ancestors = entry.level.ancestors();
        for level in ancestors.iter().rev() {
            let Some(id) = lineage.get(*level) else {
                continue;
            };
            if let Some(parent) = self.entry(*level, id) {
                lineage.fill_missing(&parent.lineage, level.ancestors());
            }
        }
        lineage
    }

    /// Display text for a stored id, whether or not the entity is still active
    /// or even still present in the catalog.
    pub fn label_for(&self, level: Level, id: i64) -> String {
        match self.entry(level, id) {
            Some(entry) if entry.active => entry.display(),
            Some(entry) => format!("{} (inactive)", entry.display()),
            None => format!("#{id} (missing)"),
        }
    }

    pub fn code_for(&self, level: Level, id: i64) -> String {
        match self.entry(level, id) {
            Some(entry) if !entry.code.is_empty() => entry.code.clone(),
            _ => format!("#{id}"),
        }
    }

    pub fn indicator_label(&self, id: IndicatorId) -> String {
        match self.indicator(id) {
            Some(indicator) => format!("{} {}", indicator.code, indicator.name),
            None => format!("#{} (missing)", id.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogEntry, CatalogRecord, CatalogSet, CatalogSource, Lineage, ListFilter};
    use crate::{
        Action, ActionId, Axis, AxisId, EntityKind, Instrument, InstrumentId, Level, Objective,
        ObjectiveId, OrgUnitId, Policy, PolicyId, RecordStatus,
    };
    use anyhow::{Result, bail};

    struct FixedSource;

    impl CatalogSource for FixedSource {
        fn list(&self, kind: EntityKind, _filter: &ListFilter) -> Result<Vec<CatalogRecord>> {
            match kind {
                EntityKind::Instrument => Ok(vec![CatalogRecord::Instrument(Instrument {
                    id: InstrumentId::new(1),
                    code: "PDR".to_owned(),
                    name: "Regional plan".to_owned(),
                    status: RecordStatus::Active,
                })]),
                EntityKind::Axis => bail!("axes endpoint down"),
                _ => Ok(Vec::new()),
            }
        }

        fn get_by_id(&self, kind: EntityKind, id: i64) -> Result<CatalogRecord> {
            bail!("{} {id} not found", kind.as_str())
        }

        fn create(&self, _kind: EntityKind, _payload: &CatalogRecord) -> Result<i64> {
            Ok(1)
        }

        fn update(&self, _kind: EntityKind, _id: i64, _payload: &CatalogRecord) -> Result<()> {
            Ok(())
        }

        fn delete(&self, _kind: EntityKind, _id: i64) -> Result<()> {
            Ok(())
        }
    }

    fn chain_set() -> CatalogSet {
        let mut set = CatalogSet::default();
        set.replace(
            EntityKind::Axis,
            vec![CatalogRecord::Axis(Axis {
                id: AxisId::new(10),
                instrument_id: InstrumentId::new(1),
                code: "A1".to_owned(),
                name: "Axis one".to_owned(),
                status: RecordStatus::Active,
            })],
        );
        set.replace(
            EntityKind::Policy,
            vec![CatalogRecord::Policy(Policy {
                id: PolicyId::new(20),
                instrument_id: InstrumentId::new(1),
                axis_id: Some(AxisId::new(10)),
                code: "P1".to_owned(),
                name: "Policy one".to_owned(),
                status: RecordStatus::Inactive,
            })],
        );
        set.replace(
            EntityKind::Objective,
            vec![CatalogRecord::Objective(Objective {
                id: ObjectiveId::new(30),
                instrument_id: InstrumentId::new(1),
                axis_id: None,
                policy_id: Some(PolicyId::new(20)),
                org_unit_id: None,
                code: "O1".to_owned(),
                text: "Objective one".to_owned(),
                status: RecordStatus::Active,
            })],
        );
        set.replace(
            EntityKind::Action,
            vec![CatalogRecord::Action(Action {
                id: ActionId::new(40),
                objective_id: ObjectiveId::new(30),
                instrument_id: None,
                policy_id: None,
                axis_id: None,
                org_unit_id: None,
                code: "AC1".to_owned(),
                text: "Action one".to_owned(),
                status: RecordStatus::Active,
            })],
        );
        set
    }

    #[test]
    fn resolved_lineage_walks_stored_parents() {
        let set = chain_set();
        let action = set.entry(Level::Action, 40).cloned().expect("action entry");
        let lineage = set.resolved_lineage(&action);
        assert_eq!(lineage.get(Level::Objective), Some(30));
        assert_eq!(lineage.get(Level::Policy), Some(20));
        assert_eq!(lineage.get(Level::Axis), Some(10));
        assert_eq!(lineage.get(Level::Instrument), Some(1));
    }

    #[test]
    fn responsible_org_unit_is_not_part_of_lineage() {
        let objective = CatalogRecord::Objective(Objective {
            id: ObjectiveId::new(31),
            instrument_id: InstrumentId::new(1),
            axis_id: None,
            policy_id: Some(PolicyId::new(20)),
            org_unit_id: Some(OrgUnitId::new(80)),
            code: "O2".to_owned(),
            text: "Objective two".to_owned(),
            status: RecordStatus::Active,
        });
        let entry = objective.catalog_entry().expect("objective entry");
        assert_eq!(entry.lineage.get(Level::OrgUnit), None);
        assert_eq!(entry.lineage.get(Level::Policy), Some(20));
    }

    #[test]
    fn labels_flag_inactive_and_missing_ids() {
        let set = chain_set();
        assert_eq!(set.label_for(Level::Axis, 10), "A1 Axis one");
        assert_eq!(set.label_for(Level::Policy, 20), "P1 Policy one (inactive)");
        assert_eq!(set.label_for(Level::Axis, 99), "#99 (missing)");
    }

    #[test]
    fn load_keeps_successful_catalogs_when_one_fails() {
        let (set, failures) = CatalogSet::load(&FixedSource);
        assert_eq!(set.entries(Level::Instrument).len(), 1);
        assert!(set.entries(Level::Axis).is_empty());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, EntityKind::Axis);
        assert!(failures[0].message.contains("axes endpoint down"));
    }

    #[test]
    fn reload_does_not_clobber_catalog_on_failure() {
        let mut set = chain_set();
        let failures = set.reload(&FixedSource, &[EntityKind::Axis]);
        assert_eq!(failures.len(), 1);
        assert_eq!(set.entries(Level::Axis).len(), 1);
    }

    #[test]
    fn adopt_replaces_one_catalog_only() {
        let mut set = chain_set();
        let (loaded, _) = CatalogSet::load(&FixedSource);
        set.adopt(EntityKind::Instrument, &loaded);
        set.adopt(EntityKind::Axis, &CatalogSet::default());
        assert_eq!(set.entries(Level::Instrument).len(), 1);
        assert!(set.entries(Level::Axis).is_empty());
        assert_eq!(set.entries(Level::Policy).len(), 1);
    }

    #[test]
    fn list_filter_matches_parent_and_status() {
        let record = CatalogRecord::Policy(Policy {
            id: PolicyId::new(2),
            instrument_id: InstrumentId::new(1),
            axis_id: None,
            code: "P".to_owned(),
            name: "P".to_owned(),
            status: RecordStatus::Inactive,
        });
        assert!(ListFilter::default().matches(&record));
        assert!(
            ListFilter {
                ancestor_id: Some(1),
                active_only: false,
            }
            .matches(&record)
        );
        assert!(
            !ListFilter {
                ancestor_id: Some(1),
                active_only: true,
            }
            .matches(&record)
        );
    }

    #[test]
    fn entry_display_omits_blank_code() {
        let entry = CatalogEntry {
            level: Level::Dimension,
            id: 1,
            code: String::new(),
            label: "Gender".to_owned(),
            active: true,
            lineage: Lineage::EMPTY,
        };
        assert_eq!(entry.display(), "Gender");
    }
}
