// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use plancat_app::{
    Action, ActionId, Axis, AxisId, CatalogRecord, CatalogSource, Dimension, DimensionId,
    EntityKind, Indicator, IndicatorId, Instrument, InstrumentId, Intervention, InterventionId,
    ListFilter, Objective, ObjectiveId, OrgUnit, OrgUnitId, PlanResult, Policy, PolicyId,
    RecordStatus, Relation, RelationId, RelationKind, RelationScalars, ResultId,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use time::{Date, Month, OffsetDateTime, Time};

const AXIS_THEMES: [&str; 8] = [
    "Social development",
    "Economic growth",
    "Environment",
    "Security",
    "Governance",
    "Infrastructure",
    "Health",
    "Education",
];

const POLICY_VERBS: [&str; 8] = [
    "Strengthen",
    "Expand",
    "Modernize",
    "Protect",
    "Promote",
    "Consolidate",
    "Improve",
    "Guarantee",
];

const POLICY_SUBJECTS: [&str; 10] = [
    "primary care coverage",
    "rural road network",
    "water supply",
    "public transparency",
    "small business credit",
    "school infrastructure",
    "forest cover",
    "emergency response",
    "digital services",
    "housing access",
];

const UNIT_NAMES: [&str; 8] = [
    "Planning Office",
    "Finance Secretariat",
    "Health Secretariat",
    "Education Secretariat",
    "Public Works",
    "Environment Agency",
    "Interior Ministry",
    "Statistics Institute",
];

const DIMENSIONS: [&str; 5] = ["Gender", "Territory", "Age group", "Ethnicity", "Disability"];

const INDICATORS: [(&str, &str); 8] = [
    ("Coverage rate", "%"),
    ("Kilometers paved", "km"),
    ("Households served", "households"),
    ("Enrollment rate", "%"),
    ("Response time", "minutes"),
    ("Hectares restored", "ha"),
    ("Loans granted", "loans"),
    ("Satisfaction index", "points"),
];

/// Thread-safe in-memory catalog service.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<EntityKind, Vec<CatalogRecord>>,
    next_id: i64,
    failures: BTreeMap<EntityKind, String>,
    list_calls: BTreeMap<EntityKind, usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        let catalog = Self::new();
        if let Ok(mut state) = catalog.inner.lock() {
            for record in records {
                state.next_id = state.next_id.max(record.id());
                state.records.entry(record.kind()).or_default().push(record);
            }
        }
        catalog
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory catalog lock poisoned"))
    }

    /// Makes every `list` of `kind` fail until cleared.
    pub fn fail_list(&self, kind: EntityKind, message: &str) -> Result<()> {
        self.state()?.failures.insert(kind, message.to_owned());
        Ok(())
    }

    pub fn clear_failure(&self, kind: EntityKind) -> Result<()> {
        self.state()?.failures.remove(&kind);
        Ok(())
    }

    pub fn list_calls(&self, kind: EntityKind) -> usize {
        self.state()
            .map(|state| state.list_calls.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn records(&self, kind: EntityKind) -> Vec<CatalogRecord> {
        self.state()
            .map(|state| state.records.get(&kind).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn relations(&self) -> Vec<Relation> {
        self.records(EntityKind::Relation)
            .into_iter()
            .filter_map(|record| match record {
                CatalogRecord::Relation(relation) => Some(*relation),
                _ => None,
            })
            .collect()
    }
}

fn with_id(record: &CatalogRecord, id: i64) -> CatalogRecord {
    let mut record = record.clone();
    match &mut record {
        CatalogRecord::Instrument(value) => value.id = InstrumentId::new(id),
        CatalogRecord::Axis(value) => value.id = AxisId::new(id),
        CatalogRecord::Policy(value) => value.id = PolicyId::new(id),
        CatalogRecord::Objective(value) => value.id = ObjectiveId::new(id),
        CatalogRecord::Action(value) => value.id = ActionId::new(id),
        CatalogRecord::Intervention(value) => value.id = InterventionId::new(id),
        CatalogRecord::Result(value) => value.id = ResultId::new(id),
        CatalogRecord::Dimension(value) => value.id = DimensionId::new(id),
        CatalogRecord::OrgUnit(value) => value.id = OrgUnitId::new(id),
        CatalogRecord::Indicator(value) => value.id = IndicatorId::new(id),
        CatalogRecord::Relation(value) => {
            value.id = RelationId::new(id);
            value.updated_at = Some(fixture_now());
        }
    }
    record
}

fn check_kind(kind: EntityKind, payload: &CatalogRecord) -> Result<()> {
    if payload.kind() != kind {
        bail!(
            "payload is a {} record, not {}",
            payload.kind().as_str(),
            kind.as_str()
        );
    }
    Ok(())
}

impl CatalogSource for MemoryCatalog {
    fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<CatalogRecord>> {
        let mut state = self.state()?;
        *state.list_calls.entry(kind).or_default() += 1;
        if let Some(message) = state.failures.get(&kind) {
            bail!("{}: {message}", kind.as_str());
        }
        Ok(state
            .records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_by_id(&self, kind: EntityKind, id: i64) -> Result<CatalogRecord> {
        let state = self.state()?;
        state
            .records
            .get(&kind)
            .and_then(|records| records.iter().find(|record| record.id() == id))
            .cloned()
            .ok_or_else(|| anyhow!("{} {id} not found", kind.as_str()))
    }

    fn create(&self, kind: EntityKind, payload: &CatalogRecord) -> Result<i64> {
        check_kind(kind, payload)?;
        let mut state = self.state()?;
        state.next_id += 1;
        let id = state.next_id;
        state
            .records
            .entry(kind)
            .or_default()
            .push(with_id(payload, id));
        Ok(id)
    }

    fn update(&self, kind: EntityKind, id: i64, payload: &CatalogRecord) -> Result<()> {
        check_kind(kind, payload)?;
        let mut state = self.state()?;
        let slot = state
            .records
            .get_mut(&kind)
            .and_then(|records| records.iter_mut().find(|record| record.id() == id))
            .ok_or_else(|| anyhow!("{} {id} not found", kind.as_str()))?;
        *slot = with_id(payload, id);
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        let mut state = self.state()?;
        let records = state.records.entry(kind).or_default();
        let before = records.len();
        records.retain(|record| record.id() != id);
        if records.len() == before {
            bail!("{} {id} not found", kind.as_str());
        }
        Ok(())
    }
}

/// Ids of the fixed scenario catalog.
pub mod scenario {
    pub const I1: i64 = 1;
    pub const I2: i64 = 2;
    pub const A1: i64 = 10;
    pub const A2: i64 = 11;
    pub const P1: i64 = 20;
    pub const P2: i64 = 21;
    pub const O1: i64 = 30;
    pub const AC1: i64 = 40;
    pub const IV1: i64 = 50;
    pub const R1: i64 = 60;
    pub const D_GLOBAL: i64 = 70;
    pub const D_I2: i64 = 71;
    pub const U1: i64 = 80;
    pub const IN1: i64 = 90;
    pub const REL1: i64 = 100;
}

/// I1 > A1 > P1 > O1 > AC1 > IV1 > R1, a sibling axis A2 with policy P2, a second
/// instrument I2, global and I2-scoped dimensions, one org unit, one indicator and
/// one stored alignment.
pub fn scenario_records() -> Vec<CatalogRecord> {
    use scenario::*;

    let instrument = |id: i64, code: &str| {
        CatalogRecord::Instrument(Instrument {
            id: InstrumentId::new(id),
            code: code.to_owned(),
            name: format!("Instrument {code}"),
            status: RecordStatus::Active,
        })
    };
    let axis = |id: i64, code: &str| {
        CatalogRecord::Axis(Axis {
            id: AxisId::new(id),
            instrument_id: InstrumentId::new(I1),
            code: code.to_owned(),
            name: format!("Axis {code}"),
            status: RecordStatus::Active,
        })
    };
    let policy = |id: i64, axis_id: i64, code: &str| {
        CatalogRecord::Policy(Policy {
            id: PolicyId::new(id),
            instrument_id: InstrumentId::new(I1),
            axis_id: Some(AxisId::new(axis_id)),
            code: code.to_owned(),
            name: format!("Policy {code}"),
            status: RecordStatus::Active,
        })
    };

    vec![
        instrument(I1, "I1"),
        instrument(I2, "I2"),
        axis(A1, "A1"),
        axis(A2, "A2"),
        policy(P1, A1, "P1"),
        policy(P2, A2, "P2"),
        CatalogRecord::Objective(Objective {
            id: ObjectiveId::new(O1),
            instrument_id: InstrumentId::new(I1),
            axis_id: None,
            policy_id: Some(PolicyId::new(P1)),
            org_unit_id: Some(OrgUnitId::new(U1)),
            code: "O1".to_owned(),
            text: "Objective O1".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Action(Action {
            id: ActionId::new(AC1),
            objective_id: ObjectiveId::new(O1),
            instrument_id: None,
            policy_id: None,
            axis_id: None,
            org_unit_id: None,
            code: "AC1".to_owned(),
            text: "Action AC1".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Intervention(Intervention {
            id: InterventionId::new(IV1),
            action_id: ActionId::new(AC1),
            objective_id: Some(ObjectiveId::new(O1)),
            policy_id: None,
            instrument_id: None,
            org_unit_id: None,
            code: "IV1".to_owned(),
            text: "Intervention IV1".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Result(PlanResult {
            id: ResultId::new(R1),
            action_id: Some(ActionId::new(AC1)),
            instrument_id: InstrumentId::new(I1),
            policy_id: None,
            objective_id: None,
            code: "R1".to_owned(),
            text: "Result R1".to_owned(),
        }),
        CatalogRecord::Dimension(Dimension {
            id: DimensionId::new(D_GLOBAL),
            instrument_id: None,
            code: "DG".to_owned(),
            name: "Gender".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Dimension(Dimension {
            id: DimensionId::new(D_I2),
            instrument_id: Some(InstrumentId::new(I2)),
            code: "DT".to_owned(),
            name: "Territory".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::OrgUnit(OrgUnit {
            id: OrgUnitId::new(U1),
            instrument_id: Some(InstrumentId::new(I1)),
            code: "U1".to_owned(),
            name: "Planning Office".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Indicator(Indicator {
            id: IndicatorId::new(IN1),
            code: "IN1".to_owned(),
            name: "Coverage rate".to_owned(),
            unit: "%".to_owned(),
            status: RecordStatus::Active,
        }),
        CatalogRecord::Relation(Box::new(Relation {
            id: RelationId::new(REL1),
            kind: RelationKind::Alignment,
            instrument_id: InstrumentId::new(I1),
            axis_id: Some(AxisId::new(A1)),
            policy_id: Some(PolicyId::new(P1)),
            objective_id: Some(ObjectiveId::new(O1)),
            action_id: None,
            intervention_id: None,
            result_id: None,
            dimension_id: Some(DimensionId::new(D_GLOBAL)),
            org_unit_id: Some(OrgUnitId::new(U1)),
            scalars: RelationScalars {
                notes: "seeded alignment".to_owned(),
                ..RelationScalars::default()
            },
            updated_at: Some(fixture_now()),
        })),
    ]
}

pub fn scenario_catalog() -> MemoryCatalog {
    MemoryCatalog::with_records(scenario_records())
}

pub fn fixture_now() -> OffsetDateTime {
    Date::from_calendar_date(2026, Month::March, 2)
        .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % n as u64) as usize
    }
}

/// Seeded generator of plausible planning catalogs.
pub struct PlanFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl PlanFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            next_id: 0,
        }
    }

    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn status(&mut self) -> RecordStatus {
        if self.rng.int_n(10) == 0 {
            RecordStatus::Inactive
        } else {
            RecordStatus::Active
        }
    }

    fn statement(&mut self) -> String {
        format!(
            "{} {}",
            self.pick(&POLICY_VERBS),
            self.pick(&POLICY_SUBJECTS)
        )
    }

    /// A full catalog: instruments with their chains, branch catalogs,
    /// indicators and a handful of relations.
    pub fn records(&mut self) -> Vec<CatalogRecord> {
        let mut records = Vec::new();
        let mut units = Vec::new();
        let mut indicators = Vec::new();

        for (index, name) in UNIT_NAMES.iter().enumerate() {
            let id = self.id();
            units.push(OrgUnitId::new(id));
            records.push(CatalogRecord::OrgUnit(OrgUnit {
                id: OrgUnitId::new(id),
                instrument_id: None,
                code: format!("U{:02}", index + 1),
                name: (*name).to_owned(),
                status: RecordStatus::Active,
            }));
        }
        for (index, name) in DIMENSIONS.iter().enumerate() {
            let id = self.id();
            records.push(CatalogRecord::Dimension(Dimension {
                id: DimensionId::new(id),
                instrument_id: None,
                code: format!("D{}", index + 1),
                name: (*name).to_owned(),
                status: RecordStatus::Active,
            }));
        }
        for (index, (name, unit)) in INDICATORS.iter().enumerate() {
            let id = self.id();
            indicators.push(IndicatorId::new(id));
            records.push(CatalogRecord::Indicator(Indicator {
                id: IndicatorId::new(id),
                code: format!("IND-{:02}", index + 1),
                name: (*name).to_owned(),
                unit: (*unit).to_owned(),
                status: RecordStatus::Active,
            }));
        }

        for (year_index, start_year) in [2022, 2026].into_iter().enumerate() {
            let instrument_id = InstrumentId::new(self.id());
            records.push(CatalogRecord::Instrument(Instrument {
                id: instrument_id,
                code: format!("PDR-{start_year}"),
                name: format!("Development plan {start_year}-{}", start_year + 3),
                status: if year_index == 0 {
                    RecordStatus::Inactive
                } else {
                    RecordStatus::Active
                },
            }));
            let axis_count = 3 + self.rng.int_n(2);
            for axis_index in 0..axis_count {
                self.generate_axis(
                    &mut records,
                    instrument_id,
                    axis_index,
                    &units,
                    &indicators,
                );
            }
        }
        records
    }

    fn generate_axis(
        &mut self,
        records: &mut Vec<CatalogRecord>,
        instrument_id: InstrumentId,
        axis_index: usize,
        units: &[OrgUnitId],
        indicators: &[IndicatorId],
    ) {
        let axis_id = AxisId::new(self.id());
        let axis_code = format!("{}", axis_index + 1);
        records.push(CatalogRecord::Axis(Axis {
            id: axis_id,
            instrument_id,
            code: axis_code.clone(),
            name: AXIS_THEMES[(axis_index + self.rng.int_n(AXIS_THEMES.len())) % AXIS_THEMES.len()]
                .to_owned(),
            status: RecordStatus::Active,
        }));

        for policy_index in 0..2 + self.rng.int_n(2) {
            let policy_id = PolicyId::new(self.id());
            let policy_code = format!("{axis_code}.{}", policy_index + 1);
            let status = self.status();
            let name = self.statement();
            records.push(CatalogRecord::Policy(Policy {
                id: policy_id,
                instrument_id,
                axis_id: Some(axis_id),
                code: policy_code.clone(),
                name,
                status,
            }));

            let objective_id = ObjectiveId::new(self.id());
            let objective_code = format!("{policy_code}.1");
            let unit = units[self.rng.int_n(units.len())];
            let text = self.statement();
            records.push(CatalogRecord::Objective(Objective {
                id: objective_id,
                instrument_id,
                axis_id: Some(axis_id),
                policy_id: Some(policy_id),
                org_unit_id: Some(unit),
                code: objective_code.clone(),
                text,
                status: RecordStatus::Active,
            }));

            for action_index in 0..1 + self.rng.int_n(3) {
                let action_id = ActionId::new(self.id());
                let action_code = format!("{objective_code}.{}", action_index + 1);
                let text = self.statement();
                let status = self.status();
                records.push(CatalogRecord::Action(Action {
                    id: action_id,
                    objective_id,
                    instrument_id: Some(instrument_id),
                    policy_id: Some(policy_id),
                    axis_id: Some(axis_id),
                    org_unit_id: Some(unit),
                    code: action_code.clone(),
                    text,
                    status,
                }));

                let intervention_id = InterventionId::new(self.id());
                let text = self.statement();
                records.push(CatalogRecord::Intervention(Intervention {
                    id: intervention_id,
                    action_id,
                    objective_id: Some(objective_id),
                    policy_id: Some(policy_id),
                    instrument_id: Some(instrument_id),
                    org_unit_id: Some(unit),
                    code: format!("{action_code}.1"),
                    text,
                    status: RecordStatus::Active,
                }));

                let result_id = ResultId::new(self.id());
                let text = self.statement();
                records.push(CatalogRecord::Result(PlanResult {
                    id: result_id,
                    action_id: Some(action_id),
                    instrument_id,
                    policy_id: Some(policy_id),
                    objective_id: Some(objective_id),
                    code: format!("R{action_code}"),
                    text,
                }));

                if self.rng.int_n(2) == 0 {
                    let indicator = indicators[self.rng.int_n(indicators.len())];
                    let baseline_year = 2020 + self.rng.int_n(4) as i32;
                    let id = self.id();
                    records.push(CatalogRecord::Relation(Box::new(Relation {
                        id: RelationId::new(id),
                        kind: RelationKind::IndicatorLink,
                        instrument_id,
                        axis_id: Some(axis_id),
                        policy_id: Some(policy_id),
                        objective_id: Some(objective_id),
                        action_id: None,
                        intervention_id: None,
                        result_id: None,
                        dimension_id: None,
                        org_unit_id: Some(unit),
                        scalars: RelationScalars {
                            indicator_id: Some(indicator),
                            baseline_value: Some(self.rng.int_n(60) as f64),
                            baseline_year: Some(baseline_year),
                            target_value: Some(60.0 + self.rng.int_n(40) as f64),
                            target_year: Some(baseline_year + 4),
                            ..RelationScalars::default()
                        },
                        updated_at: Some(fixture_now()),
                    })));
                }
                if self.rng.int_n(3) == 0 {
                    let id = self.id();
                    records.push(CatalogRecord::Relation(Box::new(Relation {
                        id: RelationId::new(id),
                        kind: RelationKind::Alignment,
                        instrument_id,
                        axis_id: Some(axis_id),
                        policy_id: Some(policy_id),
                        objective_id: Some(objective_id),
                        action_id: Some(action_id),
                        intervention_id: Some(intervention_id),
                        result_id: Some(result_id),
                        dimension_id: None,
                        org_unit_id: Some(unit),
                        scalars: RelationScalars::default(),
                        updated_at: Some(fixture_now()),
                    })));
                }
            }
        }
    }

    pub fn catalog(&mut self) -> MemoryCatalog {
        MemoryCatalog::with_records(self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryCatalog, PlanFaker, scenario, scenario_catalog};
    use anyhow::Result;
    use plancat_app::{CatalogRecord, CatalogSet, CatalogSource, EntityKind, Level, ListFilter};

    #[test]
    fn scenario_lineage_resolves_through_policy() {
        let (set, failures) = CatalogSet::load(&scenario_catalog());
        assert!(failures.is_empty());
        let objective = set
            .entry(Level::Objective, scenario::O1)
            .cloned()
            .expect("objective O1");
        let lineage = set.resolved_lineage(&objective);
        assert_eq!(lineage.get(Level::Axis), Some(scenario::A1));
        assert_eq!(lineage.get(Level::Policy), Some(scenario::P1));
    }

    #[test]
    fn list_filters_by_parent() -> Result<()> {
        let catalog = scenario_catalog();
        let filter = ListFilter {
            ancestor_id: Some(scenario::I2),
            active_only: false,
        };
        assert!(catalog.list(EntityKind::Axis, &filter)?.is_empty());
        assert_eq!(catalog.list(EntityKind::Dimension, &filter)?.len(), 1);
        Ok(())
    }

    #[test]
    fn create_assigns_fresh_ids() -> Result<()> {
        let catalog = scenario_catalog();
        let existing = catalog.get_by_id(EntityKind::Relation, scenario::REL1)?;
        let id = catalog.create(EntityKind::Relation, &existing)?;
        assert!(id > scenario::REL1);
        assert_eq!(catalog.relations().len(), 2);
        assert!(catalog.create(EntityKind::Axis, &existing).is_err());
        Ok(())
    }

    #[test]
    fn delete_missing_record_fails() -> Result<()> {
        let catalog = scenario_catalog();
        catalog.delete(EntityKind::Relation, scenario::REL1)?;
        assert!(catalog.delete(EntityKind::Relation, scenario::REL1).is_err());
        Ok(())
    }

    #[test]
    fn injected_failures_apply_until_cleared() -> Result<()> {
        let catalog = MemoryCatalog::new();
        catalog.fail_list(EntityKind::Axis, "timed out")?;
        assert!(catalog.list(EntityKind::Axis, &ListFilter::default()).is_err());
        catalog.clear_failure(EntityKind::Axis)?;
        assert!(catalog.list(EntityKind::Axis, &ListFilter::default()).is_ok());
        assert_eq!(catalog.list_calls(EntityKind::Axis), 2);
        Ok(())
    }

    #[test]
    fn faker_is_deterministic_per_seed() {
        let first = PlanFaker::new(7).records();
        let second = PlanFaker::new(7).records();
        assert_eq!(first, second);
        assert_ne!(first, PlanFaker::new(8).records());
    }

    #[test]
    fn faker_output_has_consistent_lineage() {
        let records = PlanFaker::new(42).records();
        let mut set = CatalogSet::default();
        for kind in EntityKind::CATALOGS {
            let of_kind = records
                .iter()
                .filter(|record| record.kind() == kind)
                .cloned()
                .collect::<Vec<CatalogRecord>>();
            set.replace(kind, of_kind);
        }
        for entry in set.entries(Level::Action) {
            let lineage = set.resolved_lineage(entry);
            let objective = lineage
                .get(Level::Objective)
                .and_then(|id| set.entry(Level::Objective, id))
                .expect("action objective");
            assert_eq!(
                set.resolved_lineage(objective).get(Level::Policy),
                lineage.get(Level::Policy)
            );
        }
        assert!(!set.entries(Level::Instrument).is_empty());
        assert!(!set.indicators().is_empty());
    }
}
