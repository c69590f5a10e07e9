// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use plancat_app::{
    CatalogRecord, CatalogSet, CatalogSource, EntityKind, ListFilter, LoadFailure, Relation,
    RelationDraft, RelationId, RelationKind,
};
use plancat_tui::{InternalEvent, LoadEvent, LoadRequest, SaveEvent};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

pub type SharedSource = Arc<dyn CatalogSource + Send + Sync>;

/// Bridges the console to a catalog service, remote or in-memory.
pub struct CatalogRuntime {
    source: SharedSource,
}

impl CatalogRuntime {
    pub fn new(source: SharedSource) -> Self {
        Self { source }
    }
}

fn list_relations(source: &SharedSource, kind: RelationKind) -> Result<Vec<Relation>> {
    let records = source
        .list(EntityKind::Relation, &ListFilter::default())
        .context("load relations")?;
    Ok(records
        .into_iter()
        .filter_map(|record| match record {
            CatalogRecord::Relation(relation) if relation.kind == kind => Some(*relation),
            _ => None,
        })
        .collect())
}

fn run_load(source: &SharedSource, request_id: u64, request: LoadRequest) -> LoadEvent {
    match request {
        LoadRequest::Catalogs(kinds) => {
            let mut catalogs = CatalogSet::default();
            let failures = catalogs.reload(source.as_ref(), &kinds);
            LoadEvent::Catalogs {
                request_id,
                kinds,
                catalogs,
                failures,
            }
        }
        LoadRequest::Relations(kind) => LoadEvent::Relations {
            request_id,
            kind,
            result: list_relations(source, kind).map_err(|error| format!("{error:#}")),
        },
    }
}

impl plancat_tui::AppRuntime for CatalogRuntime {
    fn load_catalogs(
        &mut self,
        catalogs: &mut CatalogSet,
        kinds: &[EntityKind],
    ) -> Vec<LoadFailure> {
        catalogs.reload(self.source.as_ref(), kinds)
    }

    fn load_relations(&mut self, kind: RelationKind) -> Result<Vec<Relation>> {
        list_relations(&self.source, kind)
    }

    fn save_relation(&mut self, draft: &RelationDraft) -> Result<i64> {
        draft.submit(self.source.as_ref())
    }

    /// Saves off the UI thread; the result comes back as a [`SaveEvent`].
    fn spawn_save(
        &mut self,
        request_id: u64,
        draft: RelationDraft,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let source = Arc::clone(&self.source);
        thread::Builder::new()
            .name(format!("plancat-save-{request_id}"))
            .spawn(move || {
                let event = match draft.submit(source.as_ref()) {
                    Ok(relation_id) => SaveEvent::Completed {
                        request_id,
                        relation_id,
                    },
                    Err(error) => SaveEvent::Failed {
                        request_id,
                        error: format!("{error:#}"),
                    },
                };
                if tx.send(InternalEvent::Save(event)).is_err() {
                    warn!(request_id, "save finished after the console closed");
                }
            })
            .context("spawn save worker")?;
        Ok(())
    }

    /// Loads off the UI thread; the result comes back as a [`LoadEvent`].
    fn spawn_load(
        &mut self,
        request_id: u64,
        request: LoadRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let source = Arc::clone(&self.source);
        thread::Builder::new()
            .name(format!("plancat-load-{request_id}"))
            .spawn(move || {
                let event = run_load(&source, request_id, request);
                debug!(request_id, "load finished");
                if tx.send(InternalEvent::Loaded(event)).is_err() {
                    warn!(request_id, "load finished after the console closed");
                }
            })
            .context("spawn load worker")?;
        Ok(())
    }

    fn delete_relation(&mut self, id: RelationId) -> Result<()> {
        self.source
            .delete(EntityKind::Relation, id.get())
            .with_context(|| format!("delete relation {}", id.get()))
    }
}
