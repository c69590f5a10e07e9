// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::RelationScalars;
use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One slot of a relation's foreign-key set.
///
/// The first seven variants form the planning chain in root-to-leaf order;
/// `Dimension` and `OrgUnit` are branches scoped only by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Instrument,
    Axis,
    Policy,
    Objective,
    Action,
    Intervention,
    Result,
    Dimension,
    OrgUnit,
}

impl Level {
    pub const COUNT: usize = 9;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Instrument,
        Self::Axis,
        Self::Policy,
        Self::Objective,
        Self::Action,
        Self::Intervention,
        Self::Result,
        Self::Dimension,
        Self::OrgUnit,
    ];

    pub const CHAIN: [Self; 7] = [
        Self::Instrument,
        Self::Axis,
        Self::Policy,
        Self::Objective,
        Self::Action,
        Self::Intervention,
        Self::Result,
    ];

    pub const BRANCHES: [Self; 2] = [Self::Dimension, Self::OrgUnit];

    pub const fn index(self) -> usize {
        match self {
            Self::Instrument => 0,
            Self::Axis => 1,
            Self::Policy => 2,
            Self::Objective => 3,
            Self::Action => 4,
            Self::Intervention => 5,
            Self::Result => 6,
            Self::Dimension => 7,
            Self::OrgUnit => 8,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Instrument => "instrument",
            Self::Axis => "axis",
            Self::Policy => "policy",
            Self::Objective => "objective",
            Self::Action => "action",
            Self::Intervention => "intervention",
            Self::Result => "result",
            Self::Dimension => "dimension",
            Self::OrgUnit => "org unit",
        }
    }

    /// Field name used by table rows and config keys.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Instrument => "instrument",
            Self::Axis => "axis",
            Self::Policy => "policy",
            Self::Objective => "objective",
            Self::Action => "action",
            Self::Intervention => "intervention",
            Self::Result => "result",
            Self::Dimension => "dimension",
            Self::OrgUnit => "org_unit",
        }
    }

    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Dimension | Self::OrgUnit)
    }

    /// Levels whose draft values constrain this level's candidates, root first.
    pub fn ancestors(self) -> &'static [Self] {
        match self {
            Self::Instrument => &[],
            Self::Axis | Self::Dimension | Self::OrgUnit => &[Self::Instrument],
            Self::Policy => &[Self::Instrument, Self::Axis],
            Self::Objective => &[Self::Instrument, Self::Axis, Self::Policy],
            Self::Action => &[Self::Instrument, Self::Axis, Self::Policy, Self::Objective],
            Self::Intervention => &[
                Self::Instrument,
                Self::Axis,
                Self::Policy,
                Self::Objective,
                Self::Action,
            ],
            Self::Result => &[
                Self::Instrument,
                Self::Axis,
                Self::Policy,
                Self::Objective,
                Self::Action,
                Self::Intervention,
            ],
        }
    }

    /// Levels invalidated when the value at this level changes.
    pub fn descendants(self) -> &'static [Self] {
        match self {
            Self::Instrument => &[
                Self::Axis,
                Self::Policy,
                Self::Objective,
                Self::Action,
                Self::Intervention,
                Self::Result,
                Self::Dimension,
                Self::OrgUnit,
            ],
            Self::Axis => &[
                Self::Policy,
                Self::Objective,
                Self::Action,
                Self::Intervention,
                Self::Result,
            ],
            Self::Policy => &[Self::Objective, Self::Action, Self::Intervention, Self::Result],
            Self::Objective => &[Self::Action, Self::Intervention, Self::Result],
            Self::Action => &[Self::Intervention, Self::Result],
            Self::Intervention => &[Self::Result],
            Self::Result | Self::Dimension | Self::OrgUnit => &[],
        }
    }

    pub fn is_ancestor_of(self, other: Self) -> bool {
        other.ancestors().contains(&self)
    }

    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::Instrument => EntityKind::Instrument,
            Self::Axis => EntityKind::Axis,
            Self::Policy => EntityKind::Policy,
            Self::Objective => EntityKind::Objective,
            Self::Action => EntityKind::Action,
            Self::Intervention => EntityKind::Intervention,
            Self::Result => EntityKind::Result,
            Self::Dimension => EntityKind::Dimension,
            Self::OrgUnit => EntityKind::OrgUnit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Instrument,
    Axis,
    Policy,
    Objective,
    Action,
    Intervention,
    Result,
    Dimension,
    OrgUnit,
    Indicator,
    Relation,
}

impl EntityKind {
    pub const CATALOGS: [Self; 10] = [
        Self::Instrument,
        Self::Axis,
        Self::Policy,
        Self::Objective,
        Self::Action,
        Self::Intervention,
        Self::Result,
        Self::Dimension,
        Self::OrgUnit,
        Self::Indicator,
    ];

    /// Collection name used by the catalog service.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instrument => "instruments",
            Self::Axis => "axes",
            Self::Policy => "policies",
            Self::Objective => "objectives",
            Self::Action => "actions",
            Self::Intervention => "interventions",
            Self::Result => "results",
            Self::Dimension => "dimensions",
            Self::OrgUnit => "org-units",
            Self::Indicator => "indicators",
            Self::Relation => "relations",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "instruments" => Some(Self::Instrument),
            "axes" => Some(Self::Axis),
            "policies" => Some(Self::Policy),
            "objectives" => Some(Self::Objective),
            "actions" => Some(Self::Action),
            "interventions" => Some(Self::Intervention),
            "results" => Some(Self::Result),
            "dimensions" => Some(Self::Dimension),
            "org-units" => Some(Self::OrgUnit),
            "indicators" => Some(Self::Indicator),
            "relations" => Some(Self::Relation),
            _ => None,
        }
    }

    pub const fn level(self) -> Option<Level> {
        match self {
            Self::Instrument => Some(Level::Instrument),
            Self::Axis => Some(Level::Axis),
            Self::Policy => Some(Level::Policy),
            Self::Objective => Some(Level::Objective),
            Self::Action => Some(Level::Action),
            Self::Intervention => Some(Level::Intervention),
            Self::Result => Some(Level::Result),
            Self::Dimension => Some(Level::Dimension),
            Self::OrgUnit => Some(Level::OrgUnit),
            Self::Indicator | Self::Relation => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: InstrumentId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub id: AxisId,
    pub instrument_id: InstrumentId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub axis_id: Option<AxisId>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub id: ObjectiveId,
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub axis_id: Option<AxisId>,
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub org_unit_id: Option<OrgUnitId>,
    pub code: String,
    pub text: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: ActionId,
    pub objective_id: ObjectiveId,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub axis_id: Option<AxisId>,
    #[serde(default)]
    pub org_unit_id: Option<OrgUnitId>,
    pub code: String,
    pub text: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub id: InterventionId,
    pub action_id: ActionId,
    #[serde(default)]
    pub objective_id: Option<ObjectiveId>,
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    #[serde(default)]
    pub org_unit_id: Option<OrgUnitId>,
    pub code: String,
    pub text: String,
    #[serde(default)]
    pub status: RecordStatus,
}

/// A planning result. Results carry no status of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub id: ResultId,
    #[serde(default)]
    pub action_id: Option<ActionId>,
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub objective_id: Option<ObjectiveId>,
    pub code: String,
    pub text: String,
}

/// `instrument_id: None` makes the dimension available under every instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub id: DimensionId,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUnit {
    pub id: OrgUnitId,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub id: IndicatorId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    IndicatorLink,
    #[default]
    Alignment,
}

impl RelationKind {
    pub const ALL: [Self; 2] = [Self::IndicatorLink, Self::Alignment];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IndicatorLink => "indicator_link",
            Self::Alignment => "alignment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "indicator_link" => Some(Self::IndicatorLink),
            "alignment" => Some(Self::Alignment),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IndicatorLink => "indicator link",
            Self::Alignment => "alignment",
        }
    }

    /// Levels a relation of this kind references.
    pub fn levels(self) -> &'static [Level] {
        match self {
            Self::IndicatorLink => &[
                Level::Instrument,
                Level::Axis,
                Level::Policy,
                Level::Objective,
                Level::Dimension,
                Level::OrgUnit,
            ],
            Self::Alignment => &Level::ALL,
        }
    }
}

/// A stored relation record as returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: RelationId,
    pub kind: RelationKind,
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub axis_id: Option<AxisId>,
    #[serde(default)]
    pub policy_id: Option<PolicyId>,
    #[serde(default)]
    pub objective_id: Option<ObjectiveId>,
    #[serde(default)]
    pub action_id: Option<ActionId>,
    #[serde(default)]
    pub intervention_id: Option<InterventionId>,
    #[serde(default)]
    pub result_id: Option<ResultId>,
    #[serde(default)]
    pub dimension_id: Option<DimensionId>,
    #[serde(default)]
    pub org_unit_id: Option<OrgUnitId>,
    #[serde(flatten)]
    pub scalars: RelationScalars,
    #[serde(default, with = "rfc3339_opt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Relation {
    pub fn level_id(&self, level: Level) -> Option<i64> {
        match level {
            Level::Instrument => Some(self.instrument_id.get()),
            Level::Axis => self.axis_id.map(AxisId::get),
            Level::Policy => self.policy_id.map(PolicyId::get),
            Level::Objective => self.objective_id.map(ObjectiveId::get),
            Level::Action => self.action_id.map(ActionId::get),
            Level::Intervention => self.intervention_id.map(InterventionId::get),
            Level::Result => self.result_id.map(ResultId::get),
            Level::Dimension => self.dimension_id.map(DimensionId::get),
            Level::OrgUnit => self.org_unit_id.map(OrgUnitId::get),
        }
    }
}

mod rfc3339_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => {
                let text = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => OffsetDateTime::parse(text, &Rfc3339)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenKind {
    Instruments,
    Axes,
    Policies,
    Objectives,
    Actions,
    Interventions,
    Results,
    Dimensions,
    OrgUnits,
    Indicators,
    IndicatorLinks,
    Alignments,
}

impl ScreenKind {
    pub const ALL: [Self; 12] = [
        Self::Instruments,
        Self::Axes,
        Self::Policies,
        Self::Objectives,
        Self::Actions,
        Self::Interventions,
        Self::Results,
        Self::Dimensions,
        Self::OrgUnits,
        Self::Indicators,
        Self::IndicatorLinks,
        Self::Alignments,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Instruments => "instruments",
            Self::Axes => "axes",
            Self::Policies => "policies",
            Self::Objectives => "objectives",
            Self::Actions => "actions",
            Self::Interventions => "interventions",
            Self::Results => "results",
            Self::Dimensions => "dimensions",
            Self::OrgUnits => "units",
            Self::Indicators => "indicators",
            Self::IndicatorLinks => "links",
            Self::Alignments => "alignments",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|screen| screen.label() == value)
    }

    /// Catalog level listed by this screen, for catalog screens.
    pub const fn level(self) -> Option<Level> {
        match self {
            Self::Instruments => Some(Level::Instrument),
            Self::Axes => Some(Level::Axis),
            Self::Policies => Some(Level::Policy),
            Self::Objectives => Some(Level::Objective),
            Self::Actions => Some(Level::Action),
            Self::Interventions => Some(Level::Intervention),
            Self::Results => Some(Level::Result),
            Self::Dimensions => Some(Level::Dimension),
            Self::OrgUnits => Some(Level::OrgUnit),
            Self::Indicators | Self::IndicatorLinks | Self::Alignments => None,
        }
    }

    pub const fn relation_kind(self) -> Option<RelationKind> {
        match self {
            Self::IndicatorLinks => Some(RelationKind::IndicatorLink),
            Self::Alignments => Some(RelationKind::Alignment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Browse,
    Filter,
    Form(RelationKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, Level, Relation, RelationKind, ScreenKind};
    use anyhow::Result;

    #[test]
    fn chain_descendants_stop_before_branches() {
        assert_eq!(
            Level::Axis.descendants(),
            &[
                Level::Policy,
                Level::Objective,
                Level::Action,
                Level::Intervention,
                Level::Result,
            ]
        );
        assert!(Level::Result.descendants().is_empty());
        assert!(Level::OrgUnit.descendants().is_empty());
    }

    #[test]
    fn instrument_invalidates_branches() {
        let descendants = Level::Instrument.descendants();
        assert!(descendants.contains(&Level::Dimension));
        assert!(descendants.contains(&Level::OrgUnit));
        assert_eq!(descendants.len(), Level::COUNT - 1);
    }

    #[test]
    fn branches_are_scoped_by_instrument_only() {
        assert_eq!(Level::Dimension.ancestors(), &[Level::Instrument]);
        assert_eq!(Level::OrgUnit.ancestors(), &[Level::Instrument]);
        assert!(Level::Instrument.ancestors().is_empty());
        assert!(Level::Policy.is_ancestor_of(Level::Action));
        assert!(!Level::Action.is_ancestor_of(Level::Dimension));
    }

    #[test]
    fn entity_kind_round_trips_through_collection_name() {
        for kind in EntityKind::CATALOGS {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("relations"), Some(EntityKind::Relation));
        assert_eq!(EntityKind::parse("widgets"), None);
    }

    #[test]
    fn screen_parse_uses_labels() {
        assert_eq!(ScreenKind::parse("alignments"), Some(ScreenKind::Alignments));
        assert_eq!(ScreenKind::parse("units"), Some(ScreenKind::OrgUnits));
        assert_eq!(
            ScreenKind::IndicatorLinks.relation_kind(),
            Some(RelationKind::IndicatorLink)
        );
    }

    #[test]
    fn relation_decodes_camel_case_payload() -> Result<()> {
        let relation: Relation = serde_json::from_str(
            r#"{
                "id": 4,
                "kind": "indicator_link",
                "instrumentId": 1,
                "axisId": 2,
                "indicatorId": 9,
                "baselineYear": 2020,
                "notes": "x",
                "updatedAt": "2026-01-05T10:00:00Z"
            }"#,
        )?;
        assert_eq!(relation.level_id(Level::Axis), Some(2));
        assert_eq!(relation.level_id(Level::Policy), None);
        assert_eq!(relation.scalars.baseline_year, Some(2020));
        assert!(relation.updated_at.is_some());
        Ok(())
    }
}
