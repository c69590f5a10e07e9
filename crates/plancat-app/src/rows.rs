// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::table::{CellValue, TableRow};
use crate::{CatalogEntry, CatalogSet, Indicator, Level, Relation};

fn status_text(active: bool) -> CellValue {
    CellValue::Text(if active { "active" } else { "inactive" }.to_owned())
}

impl TableRow for CatalogEntry {
    fn row_id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> CellValue {
        match key {
            "id" => CellValue::Integer(self.id),
            "code" => CellValue::Text(self.code.clone()),
            "label" => CellValue::Text(self.label.clone()),
            "status" => status_text(self.active),
            _ => CellValue::Empty,
        }
    }
}

impl TableRow for Indicator {
    fn row_id(&self) -> i64 {
        self.id.get()
    }

    fn field(&self, key: &str) -> CellValue {
        match key {
            "id" => CellValue::Integer(self.id.get()),
            "code" => CellValue::Text(self.code.clone()),
            "name" | "label" => CellValue::Text(self.name.clone()),
            "unit" => CellValue::Text(self.unit.clone()),
            "status" => CellValue::Text(self.status.as_str().to_owned()),
            _ => CellValue::Empty,
        }
    }
}

/// A catalog entity with its ancestors resolved to codes.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub entry: CatalogEntry,
    ancestor_codes: [Option<String>; Level::COUNT],
}

impl CatalogRow {
    pub fn ancestor_code(&self, level: Level) -> Option<&str> {
        self.ancestor_codes[level.index()].as_deref()
    }
}

impl TableRow for CatalogRow {
    fn row_id(&self) -> i64 {
        self.entry.id
    }

    fn field(&self, key: &str) -> CellValue {
        if let Some(level) = Level::ALL.into_iter().find(|level| level.key() == key) {
            return self.ancestor_codes[level.index()].clone().into();
        }
        self.entry.field(key)
    }
}

/// A stored relation with its foreign keys resolved to codes.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
    pub relation: Relation,
    codes: [Option<String>; Level::COUNT],
    indicator: Option<String>,
}

impl RelationRow {
    pub fn code(&self, level: Level) -> Option<&str> {
        self.codes[level.index()].as_deref()
    }

    pub fn indicator(&self) -> Option<&str> {
        self.indicator.as_deref()
    }
}

impl TableRow for RelationRow {
    fn row_id(&self) -> i64 {
        self.relation.id.get()
    }

    fn field(&self, key: &str) -> CellValue {
        if let Some(level) = Level::ALL.into_iter().find(|level| level.key() == key) {
            return self.codes[level.index()].clone().into();
        }
        let scalars = &self.relation.scalars;
        match key {
            "id" => CellValue::Integer(self.relation.id.get()),
            "kind" => CellValue::Text(self.relation.kind.label().to_owned()),
            "indicator" => self.indicator.clone().into(),
            "baseline" => scalars.baseline_value.into(),
            "baseline_year" => scalars.baseline_year.map(i64::from).into(),
            "target" => scalars.target_value.into(),
            "target_year" => scalars.target_year.map(i64::from).into(),
            "measured_on" => scalars.measured_on.map_or(CellValue::Empty, CellValue::Date),
            "notes" => CellValue::Text(scalars.notes.clone()),
            "status" => CellValue::Text(scalars.status.as_str().to_owned()),
            "updated" => self
                .relation
                .updated_at
                .map_or(CellValue::Empty, |updated| CellValue::Date(updated.date())),
            "raw" => serde_json::to_value(&self.relation).map_or(CellValue::Empty, CellValue::Json),
            _ => CellValue::Empty,
        }
    }
}

impl CatalogSet {
    pub fn catalog_rows(&self, level: Level) -> Vec<CatalogRow> {
        self.entries(level)
            .iter()
            .map(|entry| {
                let lineage = self.resolved_lineage(entry);
                let mut ancestor_codes: [Option<String>; Level::COUNT] = Default::default();
                for ancestor in Level::ALL {
                    if ancestor == level {
                        continue;
                    }
                    ancestor_codes[ancestor.index()] =
                        lineage.get(ancestor).map(|id| self.code_for(ancestor, id));
                }
                CatalogRow {
                    entry: entry.clone(),
                    ancestor_codes,
                }
            })
            .collect()
    }

    pub fn relation_rows(&self, relations: Vec<Relation>) -> Vec<RelationRow> {
        relations
            .into_iter()
            .map(|relation| {
                let mut codes: [Option<String>; Level::COUNT] = Default::default();
                for level in Level::ALL {
                    codes[level.index()] =
                        relation.level_id(level).map(|id| self.code_for(level, id));
                }
                let indicator = relation
                    .scalars
                    .indicator_id
                    .map(|id| match self.indicator(id) {
                        Some(indicator) => indicator.code.clone(),
                        None => format!("#{}", id.get()),
                    });
                RelationRow {
                    relation,
                    codes,
                    indicator,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::table::{CellValue, TableRow};
    use crate::{
        Axis, AxisId, CatalogRecord, CatalogSet, EntityKind, Instrument, InstrumentId,
        IndicatorId, Level, RecordStatus, Relation, RelationId, RelationKind, RelationScalars,
    };

    fn set() -> CatalogSet {
        let mut set = CatalogSet::default();
        set.replace(
            EntityKind::Instrument,
            vec![CatalogRecord::Instrument(Instrument {
                id: InstrumentId::new(1),
                code: "PDR".to_owned(),
                name: "Plan".to_owned(),
                status: RecordStatus::Active,
            })],
        );
        set.replace(
            EntityKind::Axis,
            vec![CatalogRecord::Axis(Axis {
                id: AxisId::new(2),
                instrument_id: InstrumentId::new(1),
                code: "AX".to_owned(),
                name: "Axis".to_owned(),
                status: RecordStatus::Active,
            })],
        );
        set
    }

    #[test]
    fn catalog_rows_expose_ancestor_codes() {
        let rows = set().catalog_rows(Level::Axis);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("instrument"), CellValue::Text("PDR".to_owned()));
        assert_eq!(rows[0].field("axis"), CellValue::Empty);
        assert_eq!(rows[0].field("code"), CellValue::Text("AX".to_owned()));
    }

    #[test]
    fn relation_rows_mark_missing_references() {
        let relation = Relation {
            id: RelationId::new(5),
            kind: RelationKind::IndicatorLink,
            instrument_id: InstrumentId::new(1),
            axis_id: Some(AxisId::new(99)),
            policy_id: None,
            objective_id: None,
            action_id: None,
            intervention_id: None,
            result_id: None,
            dimension_id: None,
            org_unit_id: None,
            scalars: RelationScalars {
                indicator_id: Some(IndicatorId::new(4)),
                baseline_year: Some(2020),
                ..RelationScalars::default()
            },
            updated_at: None,
        };
        let rows = set().relation_rows(vec![relation]);
        let row = &rows[0];
        assert_eq!(row.code(Level::Instrument), Some("PDR"));
        assert_eq!(row.code(Level::Axis), Some("#99"));
        assert_eq!(row.indicator(), Some("#4"));
        assert_eq!(row.field("baseline_year"), CellValue::Integer(2020));
        assert_eq!(row.field("kind").display(), "indicator link");
        assert!(matches!(row.field("raw"), CellValue::Json(_)));
    }
}
