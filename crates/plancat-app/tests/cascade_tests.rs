// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use plancat_app::{
    CascadeController, CascadeSpec, CatalogEntry, CatalogSet, Level, PickerGate, RelationDraft,
    RelationKind, ScalarField,
};
use plancat_testkit::{PlanFaker, scenario, scenario_catalog};
use proptest::prelude::*;
use std::sync::Arc;

fn scenario_set() -> Arc<CatalogSet> {
    let (set, failures) = CatalogSet::load(&scenario_catalog());
    assert!(failures.is_empty(), "scenario load failed: {failures:?}");
    Arc::new(set)
}

fn entry(set: &CatalogSet, level: Level, id: i64) -> CatalogEntry {
    set.entry(level, id)
        .cloned()
        .unwrap_or_else(|| panic!("missing {} {id}", level.label()))
}

fn alignment(set: Arc<CatalogSet>) -> CascadeController {
    CascadeController::for_new(set, RelationKind::Alignment)
}

fn select(controller: &mut CascadeController, level: Level, id: i64) {
    let picked = entry(controller.catalogs(), level, id);
    controller.select_level(level, Some(&picked));
}

#[test]
fn picking_objective_backfills_policy_and_keeps_axis() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Axis, scenario::A1);

    let objective = entry(controller.catalogs(), Level::Objective, scenario::O1);
    let outcome = controller.select_level(Level::Objective, Some(&objective));

    let draft = controller.draft();
    assert_eq!(draft.slot(Level::Policy), Some(scenario::P1));
    assert_eq!(draft.slot(Level::Axis), Some(scenario::A1));
    assert_eq!(outcome.backfilled, vec![Level::Policy]);
    assert!(outcome.conflicts.is_empty());
}

#[test]
fn changing_axis_clears_chain_but_not_branches() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Axis, scenario::A1);
    select(&mut controller, Level::Objective, scenario::O1);
    select(&mut controller, Level::Action, scenario::AC1);
    select(&mut controller, Level::Intervention, scenario::IV1);
    select(&mut controller, Level::Result, scenario::R1);
    select(&mut controller, Level::Dimension, scenario::D_GLOBAL);
    select(&mut controller, Level::OrgUnit, scenario::U1);

    let axis = entry(controller.catalogs(), Level::Axis, scenario::A2);
    let outcome = controller.select_level(Level::Axis, Some(&axis));

    let draft = controller.draft();
    for level in [
        Level::Policy,
        Level::Objective,
        Level::Action,
        Level::Intervention,
        Level::Result,
    ] {
        assert_eq!(draft.slot(level), None, "{} should be cleared", level.label());
    }
    assert_eq!(draft.slot(Level::Dimension), Some(scenario::D_GLOBAL));
    assert_eq!(draft.slot(Level::OrgUnit), Some(scenario::U1));
    assert_eq!(outcome.cleared.len(), 5);
}

#[test]
fn new_instrument_clears_every_other_level() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Result, scenario::R1);
    select(&mut controller, Level::Dimension, scenario::D_GLOBAL);
    assert_eq!(controller.draft().slot(Level::Action), Some(scenario::AC1));

    select(&mut controller, Level::Instrument, scenario::I2);
    for level in Level::ALL.into_iter().skip(1) {
        assert_eq!(controller.draft().slot(level), None);
    }
}

#[test]
fn reselecting_current_value_changes_nothing() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Objective, scenario::O1);
    select(&mut controller, Level::Action, scenario::AC1);
    let before = controller.draft().clone();

    let objective = entry(controller.catalogs(), Level::Objective, scenario::O1);
    let outcome = controller.select_level(Level::Objective, Some(&objective));
    assert!(!outcome.changed);
    assert_eq!(controller.draft(), &before);
}

#[test]
fn conflicting_ancestor_is_kept_and_reported() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Axis, scenario::A2);

    // P1 belongs to A1; forced picks are accepted but flagged.
    let policy = entry(controller.catalogs(), Level::Policy, scenario::P1);
    let outcome = controller.select_level(Level::Policy, Some(&policy));
    assert_eq!(controller.draft().slot(Level::Policy), Some(scenario::P1));
    assert_eq!(controller.draft().slot(Level::Axis), Some(scenario::A2));
    assert_eq!(outcome.conflicts, vec![Level::Axis]);
    assert_eq!(controller.conflicting_levels(), vec![Level::Policy]);
}

#[test]
fn conflicting_draft_fails_validation() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Axis, scenario::A2);
    select(&mut controller, Level::Policy, scenario::P1);

    assert!(controller.draft().validate().is_ok());
    let error = controller
        .validate()
        .expect_err("policy from another axis should not validate");
    let message = error.to_string();
    assert!(message.contains("policy"), "{message}");
    assert!(message.contains("pick again"), "{message}");

    select(&mut controller, Level::Policy, scenario::P2);
    assert!(controller.validate().is_ok());
}

#[test]
fn candidates_follow_chosen_ancestors() {
    let mut controller = alignment(scenario_set());
    select(&mut controller, Level::Instrument, scenario::I1);
    let ids = |controller: &CascadeController, level| {
        controller
            .candidates_for(level)
            .iter()
            .map(|entry| entry.id)
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&controller, Level::Policy), vec![scenario::P1, scenario::P2]);

    select(&mut controller, Level::Axis, scenario::A2);
    assert_eq!(ids(&controller, Level::Policy), vec![scenario::P2]);
    assert!(ids(&controller, Level::Objective).is_empty());
    assert_eq!(ids(&controller, Level::Dimension), vec![scenario::D_GLOBAL]);
}

#[test]
fn edit_draft_shows_inactive_values_by_id() {
    let set = scenario_set();
    let catalog = scenario_catalog();
    let relation = catalog
        .relations()
        .into_iter()
        .next()
        .expect("seeded relation");
    let controller = CascadeController::new(
        set,
        CascadeSpec::for_relation(relation.kind),
        RelationDraft::from_relation(&relation),
    );
    assert_eq!(
        controller.display_label(Level::Objective).as_deref(),
        Some("O1 Objective O1")
    );
    assert_eq!(controller.display_label(Level::Action), None);
}

#[test]
fn instrument_gate_blocks_other_pickers() {
    let controller = CascadeController::for_new(scenario_set(), RelationKind::IndicatorLink);
    match controller.picker_gate(Level::OrgUnit) {
        PickerGate::Blocked(message) => assert!(message.contains("instrument")),
        other => panic!("expected blocked gate, got {other:?}"),
    }
}

#[test]
fn submit_creates_new_and_updates_edited_relations() -> anyhow::Result<()> {
    let catalog = scenario_catalog();
    let set = scenario_set();

    let mut controller = alignment(set.clone());
    select(&mut controller, Level::Instrument, scenario::I1);
    select(&mut controller, Level::Objective, scenario::O1);
    let id = controller.draft().submit(&catalog)?;
    assert!(id > scenario::REL1);
    let created = catalog
        .relations()
        .into_iter()
        .find(|relation| relation.id.get() == id)
        .expect("created relation");
    assert_eq!(created.kind, RelationKind::Alignment);
    assert_eq!(created.policy_id.map(|policy| policy.get()), Some(scenario::P1));

    let mut editor = CascadeController::new(
        set,
        CascadeSpec::for_relation(created.kind),
        RelationDraft::from_relation(&created),
    );
    editor.set_scalar(ScalarField::Notes, "revised")?;
    assert_eq!(editor.draft().submit(&catalog)?, id);
    let updated = catalog
        .relations()
        .into_iter()
        .find(|relation| relation.id.get() == id)
        .expect("updated relation");
    assert_eq!(updated.scalars.notes, "revised");
    assert_eq!(catalog.relations().len(), 2);
    Ok(())
}

#[test]
fn submit_rejects_invalid_draft_without_calling_service() {
    let catalog = scenario_catalog();
    let error = RelationDraft::new(RelationKind::IndicatorLink)
        .submit(&catalog)
        .expect_err("draft without instrument should fail");
    assert!(error.to_string().contains("instrument"));
    assert_eq!(catalog.relations().len(), 1);
}

fn faker_set(seed: u64) -> Arc<CatalogSet> {
    let (set, _) = CatalogSet::load(&PlanFaker::new(seed).catalog());
    Arc::new(set)
}

fn open_controller(seed: u64) -> CascadeController {
    CascadeController::new(
        faker_set(seed),
        CascadeSpec::for_relation(RelationKind::Alignment).include_inactive(),
        RelationDraft::new(RelationKind::Alignment),
    )
}

/// Applies a step the way the form does: only through an open picker and only
/// with a row the picker offered.
fn apply_step(controller: &mut CascadeController, level: Level, pick: Option<usize>) {
    if controller.picker_gate(level) != PickerGate::Open {
        return;
    }
    let candidates = controller
        .candidates_for(level)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    let chosen = match pick {
        Some(index) if !candidates.is_empty() => Some(&candidates[index % candidates.len()]),
        _ => None,
    };
    controller.select_level(level, chosen);
}

fn steps() -> impl Strategy<Value = Vec<(usize, Option<usize>)>> {
    prop::collection::vec(
        (0..Level::COUNT, prop::option::weighted(0.85, 0usize..64)),
        1..40,
    )
}

proptest! {
    #[test]
    fn picks_from_candidates_never_orphan(seed in 0u64..16, steps in steps()) {
        let mut controller = open_controller(seed);
        for (level_index, pick) in steps {
            apply_step(&mut controller, Level::ALL[level_index], pick);
            prop_assert!(
                controller.conflicting_levels().is_empty(),
                "orphaned levels {:?} in {:?}",
                controller.conflicting_levels(),
                controller.draft()
            );
        }
    }

    #[test]
    fn reselect_is_idempotent(seed in 0u64..16, steps in steps(), level_index in 0..Level::COUNT) {
        let mut controller = open_controller(seed);
        for (index, pick) in steps {
            apply_step(&mut controller, Level::ALL[index], pick);
        }
        let level = Level::ALL[level_index];
        let current = controller
            .draft()
            .slot(level)
            .and_then(|id| controller.catalogs().entry(level, id).cloned());
        let before = controller.draft().clone();
        let outcome = controller.select_level(level, current.as_ref());
        prop_assert!(!outcome.changed);
        prop_assert_eq!(controller.draft(), &before);
    }

    #[test]
    fn backfill_only_fills_empty_ancestors(seed in 0u64..16, steps in steps(), pick in 0usize..64) {
        let mut controller = open_controller(seed);
        for (index, step_pick) in steps {
            apply_step(&mut controller, Level::ALL[index], step_pick);
        }
        let level = Level::Result;
        if controller.picker_gate(level) != PickerGate::Open {
            return Ok(());
        }
        let candidates = controller
            .candidates_for(level)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Ok(());
        }
        let before = controller.draft().clone();
        let chosen = candidates[pick % candidates.len()].clone();
        let outcome = controller.select_level(level, Some(&chosen));
        for ancestor in level.ancestors() {
            match before.slot(*ancestor) {
                Some(id) => prop_assert_eq!(controller.draft().slot(*ancestor), Some(id)),
                None => prop_assert_eq!(
                    outcome.backfilled.contains(ancestor),
                    controller.draft().slot(*ancestor).is_some()
                ),
            }
        }
    }

    #[test]
    fn empty_draft_offers_every_entry(seed in 0u64..16, level_index in 0..Level::COUNT) {
        let controller = open_controller(seed);
        let level = Level::ALL[level_index];
        prop_assert_eq!(
            controller.candidates_for(level).len(),
            controller.catalogs().entries(level).len()
        );
    }
}
