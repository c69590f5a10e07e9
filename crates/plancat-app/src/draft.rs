// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;
use tracing::info;

use crate::ids::*;
use crate::{
    CatalogRecord, CatalogSource, EntityKind, Level, RecordStatus, Relation, RelationKind,
};

/// Non-hierarchical fields of a relation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationScalars {
    #[serde(default)]
    pub indicator_id: Option<IndicatorId>,
    #[serde(default)]
    pub baseline_value: Option<f64>,
    #[serde(default)]
    pub baseline_year: Option<i32>,
    #[serde(default)]
    pub target_value: Option<f64>,
    #[serde(default)]
    pub target_year: Option<i32>,
    #[serde(default, with = "iso_date_opt")]
    pub measured_on: Option<Date>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: RecordStatus,
}

mod iso_date_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;
    use time::macros::format_description;

    pub fn serialize<S: Serializer>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => {
                let text = value
                    .format(format_description!("[year]-[month]-[day]"))
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => Date::parse(text, format_description!("[year]-[month]-[day]"))
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Editable scalar inputs of the relation form, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarField {
    BaselineValue,
    BaselineYear,
    TargetValue,
    TargetYear,
    MeasuredOn,
    Notes,
    Status,
}

impl ScalarField {
    pub const ALL: [Self; 7] = [
        Self::BaselineValue,
        Self::BaselineYear,
        Self::TargetValue,
        Self::TargetYear,
        Self::MeasuredOn,
        Self::Notes,
        Self::Status,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::BaselineValue => "baseline",
            Self::BaselineYear => "baseline year",
            Self::TargetValue => "target",
            Self::TargetYear => "target year",
            Self::MeasuredOn => "measured on",
            Self::Notes => "notes",
            Self::Status => "status",
        }
    }

    /// Current value rendered as editable text.
    pub fn text(self, scalars: &RelationScalars) -> String {
        match self {
            Self::BaselineValue => scalars.baseline_value.map(|v| v.to_string()).unwrap_or_default(),
            Self::BaselineYear => scalars.baseline_year.map(|v| v.to_string()).unwrap_or_default(),
            Self::TargetValue => scalars.target_value.map(|v| v.to_string()).unwrap_or_default(),
            Self::TargetYear => scalars.target_year.map(|v| v.to_string()).unwrap_or_default(),
            Self::MeasuredOn => scalars.measured_on.map(|v| v.to_string()).unwrap_or_default(),
            Self::Notes => scalars.notes.clone(),
            Self::Status => scalars.status.as_str().to_owned(),
        }
    }

    /// Parses `raw` into the field. Blank input clears optional fields.
    pub fn apply(self, scalars: &mut RelationScalars, raw: &str) -> Result<()> {
        let trimmed = raw.trim();
        match self {
            Self::BaselineValue => scalars.baseline_value = parse_number(self, trimmed)?,
            Self::BaselineYear => scalars.baseline_year = parse_year(self, trimmed)?,
            Self::TargetValue => scalars.target_value = parse_number(self, trimmed)?,
            Self::TargetYear => scalars.target_year = parse_year(self, trimmed)?,
            Self::MeasuredOn => {
                scalars.measured_on = if trimmed.is_empty() {
                    None
                } else {
                    Some(
                        Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
                            .with_context(|| {
                                format!("measured on date {trimmed:?} must look like 2026-01-31")
                            })?,
                    )
                };
            }
            Self::Notes => scalars.notes = raw.to_owned(),
            Self::Status => {
                scalars.status = RecordStatus::parse(trimmed).with_context(|| {
                    format!("status {trimmed:?} is invalid -- use active or inactive")
                })?;
            }
        }
        Ok(())
    }
}

fn parse_number(field: ScalarField, raw: &str) -> Result<Option<f64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .with_context(|| format!("{} {raw:?} is not a number", field.label()))?;
    if !value.is_finite() {
        bail!("{} must be a finite number", field.label());
    }
    Ok(Some(value))
}

fn parse_year(field: ScalarField, raw: &str) -> Result<Option<i32>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value: i32 = raw
        .parse()
        .with_context(|| format!("{} {raw:?} is not a year", field.label()))?;
    if !(1900..=2200).contains(&value) {
        bail!("{} must be between 1900 and 2200", field.label());
    }
    Ok(Some(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOrigin {
    New,
    Edit(RelationId),
}

/// The in-progress relation edited by the form.
///
/// Hierarchy slots can only be written through the cascade controller, which
/// keeps them mutually consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDraft {
    origin: DraftOrigin,
    kind: RelationKind,
    slots: [Option<i64>; Level::COUNT],
    scalars: RelationScalars,
}

impl RelationDraft {
    pub fn new(kind: RelationKind) -> Self {
        Self {
            origin: DraftOrigin::New,
            kind,
            slots: [None; Level::COUNT],
            scalars: RelationScalars::default(),
        }
    }

    /// Seeds a draft with the stored values of `relation`, unvalidated.
    pub fn from_relation(relation: &Relation) -> Self {
        let mut slots = [None; Level::COUNT];
        for level in Level::ALL {
            slots[level.index()] = relation.level_id(level);
        }
        Self {
            origin: DraftOrigin::Edit(relation.id),
            kind: relation.kind,
            slots,
            scalars: relation.scalars.clone(),
        }
    }

    pub fn origin(&self) -> DraftOrigin {
        self.origin
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn slot(&self, level: Level) -> Option<i64> {
        self.slots[level.index()]
    }

    pub(crate) fn set_slot(&mut self, level: Level, id: Option<i64>) {
        self.slots[level.index()] = id;
    }

    pub fn scalars(&self) -> &RelationScalars {
        &self.scalars
    }

    pub(crate) fn scalars_mut(&mut self) -> &mut RelationScalars {
        &mut self.scalars
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot(Level::Instrument).is_none() {
            bail!("relation instrument is required -- choose an instrument and retry");
        }
        if self.kind == RelationKind::IndicatorLink && self.scalars.indicator_id.is_none() {
            bail!("indicator link needs an indicator -- choose an indicator and retry");
        }
        for level in Level::ALL {
            if self.slot(level).is_some() && !self.kind.levels().contains(&level) {
                bail!("{} does not reference a {}", self.kind.label(), level.label());
            }
        }
        for value in [self.scalars.baseline_value, self.scalars.target_value]
            .into_iter()
            .flatten()
        {
            if !value.is_finite() {
                bail!("relation values must be finite numbers");
            }
        }
        if let (Some(baseline), Some(target)) = (self.scalars.baseline_year, self.scalars.target_year)
            && target < baseline
        {
            bail!("target year must be on/after baseline year");
        }
        Ok(())
    }

    /// Builds the record sent to the catalog service. New drafts carry id 0.
    pub fn to_relation(&self) -> Result<Relation> {
        self.validate()?;
        let instrument_id = self
            .slot(Level::Instrument)
            .context("relation instrument is required -- choose an instrument and retry")?;
        let id = match self.origin {
            DraftOrigin::New => RelationId::new(0),
            DraftOrigin::Edit(id) => id,
        };
        Ok(Relation {
            id,
            kind: self.kind,
            instrument_id: InstrumentId::new(instrument_id),
            axis_id: self.slot(Level::Axis).map(AxisId::new),
            policy_id: self.slot(Level::Policy).map(PolicyId::new),
            objective_id: self.slot(Level::Objective).map(ObjectiveId::new),
            action_id: self.slot(Level::Action).map(ActionId::new),
            intervention_id: self.slot(Level::Intervention).map(InterventionId::new),
            result_id: self.slot(Level::Result).map(ResultId::new),
            dimension_id: self.slot(Level::Dimension).map(DimensionId::new),
            org_unit_id: self.slot(Level::OrgUnit).map(OrgUnitId::new),
            scalars: self.scalars.clone(),
            updated_at: None,
        })
    }

    /// Creates or updates the relation in `source` and returns its id.
    pub fn submit<S: CatalogSource + ?Sized>(&self, source: &S) -> Result<i64> {
        let payload = CatalogRecord::Relation(Box::new(self.to_relation()?));
        match self.origin {
            DraftOrigin::New => {
                let id = source
                    .create(EntityKind::Relation, &payload)
                    .context("create relation")?;
                info!(id, kind = self.kind.as_str(), "relation created");
                Ok(id)
            }
            DraftOrigin::Edit(id) => {
                source
                    .update(EntityKind::Relation, id.get(), &payload)
                    .with_context(|| format!("update relation {}", id.get()))?;
                info!(id = id.get(), kind = self.kind.as_str(), "relation updated");
                Ok(id.get())
            }
        }
    }
}
