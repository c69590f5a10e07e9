// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use plancat_app::{
    AppCommand, AppEvent, AppMode, AppState, CascadeController, CascadeSpec, CatalogEntry,
    CatalogRow, CatalogSet, Column, DraftOrigin, EntityKind, EntityPicker, Indicator, Level,
    LoadFailure, LoadStatus, PickerGate, Presentation, Relation, RelationDraft, RelationId,
    RelationKind, RelationRow, ScalarField, ScreenKind, SelectOutcome, SortChange,
    SortDirection, SortSpec, TableAction, TableActions, TableRow, TabularView,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const NOTES_PREVIEW_CHARS: usize = 24;

/// Everything the console needs from the outside world.
pub trait AppRuntime {
    /// Refetches `kinds` into `catalogs`, keeping the previous copy of any
    /// catalog that fails.
    fn load_catalogs(&mut self, catalogs: &mut CatalogSet, kinds: &[EntityKind])
    -> Vec<LoadFailure>;
    fn load_relations(&mut self, kind: RelationKind) -> Result<Vec<Relation>>;
    fn save_relation(&mut self, draft: &RelationDraft) -> Result<i64>;
    fn spawn_save(
        &mut self,
        request_id: u64,
        draft: RelationDraft,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.save_relation(&draft) {
            Ok(relation_id) => SaveEvent::Completed {
                request_id,
                relation_id,
            },
            Err(error) => SaveEvent::Failed {
                request_id,
                error: format!("{error:#}"),
            },
        };
        tx.send(InternalEvent::Save(event))
            .map_err(|_| anyhow!("save event channel closed"))?;
        Ok(())
    }
    /// Runs `request` and reports it as [`InternalEvent::Loaded`]. The event
    /// always travels through `tx`, so the screen shows its loading state
    /// until the event is processed.
    fn spawn_load(
        &mut self,
        request_id: u64,
        request: LoadRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match request {
            LoadRequest::Catalogs(kinds) => {
                let mut catalogs = CatalogSet::default();
                let failures = self.load_catalogs(&mut catalogs, &kinds);
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
                result: self
                    .load_relations(kind)
                    .map_err(|error| format!("{error:#}")),
            },
        };
        tx.send(InternalEvent::Loaded(event))
            .map_err(|_| anyhow!("load event channel closed"))?;
        Ok(())
    }
    fn delete_relation(&mut self, id: RelationId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOptions {
    pub rows_per_page: usize,
    pub session_user: String,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            rows_per_page: 10,
            session_user: "anonymous".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    Completed { request_id: u64, relation_id: i64 },
    Failed { request_id: u64, error: String },
}

impl SaveEvent {
    fn request_id(&self) -> u64 {
        match self {
            Self::Completed { request_id, .. } | Self::Failed { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    Catalogs(Vec<EntityKind>),
    Relations(RelationKind),
}

/// Result of a [`LoadRequest`]. `catalogs` holds only the kinds that loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Catalogs {
        request_id: u64,
        kinds: Vec<EntityKind>,
        catalogs: CatalogSet,
        failures: Vec<LoadFailure>,
    },
    Relations {
        request_id: u64,
        kind: RelationKind,
        result: Result<Vec<Relation>, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Save(SaveEvent),
    Loaded(LoadEvent),
}

/// The table behind the active screen.
#[derive(Debug, Clone)]
enum ScreenTable {
    Catalog(TabularView<CatalogRow>),
    Indicators(TabularView<Indicator>),
    Relations(TabularView<RelationRow>),
}

macro_rules! each_table {
    ($table:expr, $view:ident => $body:expr) => {
        match $table {
            ScreenTable::Catalog($view) => $body,
            ScreenTable::Indicators($view) => $body,
            ScreenTable::Relations($view) => $body,
        }
    };
}

impl ScreenTable {
    fn for_screen(screen: ScreenKind, rows_per_page: usize) -> Self {
        if let Some(level) = screen.level() {
            let mut search_keys = vec!["code", "label"];
            search_keys.extend(level.ancestors().iter().map(|ancestor| ancestor.key()));
            return Self::Catalog(TabularView::new(
                catalog_columns(level),
                search_keys,
                rows_per_page,
            ));
        }
        match screen.relation_kind() {
            Some(kind) => {
                let mut search_keys = kind
                    .levels()
                    .iter()
                    .map(|level| level.key())
                    .collect::<Vec<_>>();
                search_keys.extend(["indicator", "notes", "status"]);
                Self::Relations(TabularView::new(
                    relation_columns(kind),
                    search_keys,
                    rows_per_page,
                ))
            }
            None => Self::Indicators(TabularView::new(
                vec![
                    Column::new("id", "id"),
                    Column::new("code", "code"),
                    Column::new("name", "name"),
                    Column::new("unit", "unit"),
                    Column::new("status", "status"),
                ],
                vec!["code", "name", "unit"],
                rows_per_page,
            )),
        }
    }

    fn projection(&self, title: &str, selected_col: usize) -> TableProjection {
        each_table!(self, view => project_view(title, view, selected_col))
    }

    fn column_count(&self) -> usize {
        each_table!(self, view => view.columns().len())
    }

    fn column_key(&self, index: usize) -> Option<&'static str> {
        each_table!(self, view => view.columns().get(index).map(|column| column.key))
    }

    fn set_query(&mut self, query: &str) {
        each_table!(self, view => view.set_query(query))
    }

    fn push_query_char(&mut self, ch: char) {
        each_table!(self, view => view.push_query_char(ch))
    }

    fn pop_query_char(&mut self) {
        each_table!(self, view => view.pop_query_char())
    }

    fn toggle_sort(&mut self, key: &str) -> SortChange {
        each_table!(self, view => view.toggle_sort(key))
    }

    fn next_page(&mut self) -> bool {
        each_table!(self, view => view.next_page())
    }

    fn prev_page(&mut self) -> bool {
        each_table!(self, view => view.prev_page())
    }

    fn cycle_rows_per_page(&mut self) -> usize {
        each_table!(self, view => {
            view.cycle_rows_per_page();
            view.pager().rows_per_page()
        })
    }

    fn move_cursor(&mut self, delta: isize) {
        each_table!(self, view => view.move_cursor(delta))
    }

    fn selected_id(&self) -> Option<i64> {
        each_table!(self, view => view.selected().map(|row| row.row_id()))
    }

    fn select_row_id(&mut self, row_id: i64) -> bool {
        each_table!(self, view => view.select_row_id(row_id))
    }

    fn dispatch(&self, action: TableAction, requests: &mut RowRequests) -> bool {
        each_table!(self, view => view.dispatch(action, requests))
    }

    fn detail(&self, row_id: i64) -> Option<Vec<(String, String)>> {
        match self {
            Self::Catalog(view) => detail_fields(view, row_id, &[]),
            Self::Indicators(view) => detail_fields(view, row_id, &[]),
            Self::Relations(view) => {
                detail_fields(view, row_id, &["kind", "measured_on", "raw"])
            }
        }
    }

    fn relation(&self, row_id: i64) -> Option<Relation> {
        match self {
            Self::Relations(view) => view
                .rows()
                .iter()
                .find(|row| row.row_id() == row_id)
                .map(|row| row.relation.clone()),
            Self::Catalog(_) | Self::Indicators(_) => None,
        }
    }
}

fn uses_text_label(level: Level) -> bool {
    matches!(
        level,
        Level::Objective | Level::Action | Level::Intervention | Level::Result
    )
}

fn catalog_columns(level: Level) -> Vec<Column<CatalogRow>> {
    let mut columns = vec![
        Column::new("id", "id"),
        Column::new("code", "code"),
        Column::new("label", if uses_text_label(level) { "text" } else { "name" }),
    ];
    columns.extend(
        level
            .ancestors()
            .iter()
            .map(|ancestor| Column::new(ancestor.key(), ancestor.label())),
    );
    columns.push(Column::new("status", "status"));
    columns
}

fn relation_columns(kind: RelationKind) -> Vec<Column<RelationRow>> {
    let mut columns = vec![Column::new("id", "id")];
    columns.extend(
        kind.levels()
            .iter()
            .map(|level| Column::new(level.key(), level.label())),
    );
    if kind == RelationKind::IndicatorLink {
        columns.extend([
            Column::new("indicator", "indicator"),
            Column::new("baseline", "baseline"),
            Column::new("baseline_year", "base yr"),
            Column::new("target", "target"),
            Column::new("target_year", "target yr"),
        ]);
    }
    columns.extend([
        Column::new("notes", "notes")
            .unsortable()
            .with_render(notes_preview),
        Column::new("status", "status"),
        Column::new("updated", "updated"),
    ]);
    columns
}

fn notes_preview(row: &RelationRow) -> String {
    let notes = row.relation.scalars.notes.trim();
    if notes.chars().count() <= NOTES_PREVIEW_CHARS {
        return notes.to_owned();
    }
    let mut preview = notes.chars().take(NOTES_PREVIEW_CHARS).collect::<String>();
    preview.push_str("...");
    preview
}

fn entry_picker_columns() -> Vec<Column<CatalogEntry>> {
    vec![
        Column::new("code", "code"),
        Column::new("label", "name"),
        Column::new("status", "status"),
    ]
}

fn indicator_picker_columns() -> Vec<Column<Indicator>> {
    vec![
        Column::new("code", "code"),
        Column::new("name", "name"),
        Column::new("unit", "unit"),
    ]
}

fn detail_fields<T: TableRow>(
    view: &TabularView<T>,
    row_id: i64,
    extra_keys: &[&str],
) -> Option<Vec<(String, String)>> {
    let row = view.rows().iter().find(|row| row.row_id() == row_id)?;
    let mut fields = view
        .columns()
        .iter()
        .map(|column| (column.header.to_owned(), row.field(column.key).display()))
        .collect::<Vec<_>>();
    fields.extend(
        extra_keys
            .iter()
            .map(|key| ((*key).replace('_', " "), row.field(key).display())),
    );
    Some(fields)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableProjection {
    title: String,
    headers: Vec<String>,
    body: ProjectionBody,
    cursor: usize,
    footer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProjectionBody {
    Loading,
    Failed(String),
    Empty(String),
    Rows(Vec<Vec<String>>),
}

fn projection_body<T: TableRow>(
    presentation: Presentation<'_, T>,
    columns: &[Column<T>],
) -> ProjectionBody {
    match presentation {
        Presentation::Loading => ProjectionBody::Loading,
        Presentation::Failed(message) => ProjectionBody::Failed(message.to_owned()),
        Presentation::Empty(message) => ProjectionBody::Empty(message),
        Presentation::Rows(rows) => ProjectionBody::Rows(
            rows.iter()
                .map(|row| columns.iter().map(|column| column.cell_text(row)).collect())
                .collect(),
        ),
    }
}

fn header_label<T>(column: &Column<T>, sort: Option<SortSpec>, selected: bool) -> String {
    let mut label = column.header.to_owned();
    if let Some(sort) = sort
        && sort.key == column.key
    {
        label.push_str(match sort.direction {
            SortDirection::Asc => " ▲",
            SortDirection::Desc => " ▼",
        });
    }
    if selected {
        label = format!("[{label}]");
    }
    label
}

fn pager_footer(page: usize, page_count: usize, rows: usize, rows_per_page: usize) -> String {
    format!(
        "page {}/{page_count} | {rows} rows | {rows_per_page}/page",
        page + 1
    )
}

fn project_view<T: TableRow>(
    title: &str,
    view: &TabularView<T>,
    selected_col: usize,
) -> TableProjection {
    let pager = view.pager();
    let total = view.filtered_len();
    TableProjection {
        title: if view.query().is_empty() {
            title.to_owned()
        } else {
            format!("{title} /{}", view.query())
        },
        headers: view
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| header_label(column, view.sort(), index == selected_col))
            .collect(),
        body: projection_body(view.presentation(), view.columns()),
        cursor: view.cursor(),
        footer: pager_footer(
            pager.page(),
            pager.page_count(total),
            total,
            pager.rows_per_page(),
        ),
    }
}

fn project_picker<T: TableRow + Clone>(picker: &EntityPicker<T>) -> TableProjection {
    let pager = picker.pager();
    let total = picker.filtered_len();
    TableProjection {
        title: picker.title().to_owned(),
        headers: picker
            .columns()
            .iter()
            .map(|column| column.header.to_owned())
            .collect(),
        body: projection_body(picker.presentation(), picker.columns()),
        cursor: picker.cursor(),
        footer: format!(
            "filter: {} | {}",
            picker.query(),
            pager_footer(
                pager.page(),
                pager.page_count(total),
                total,
                pager.rows_per_page(),
            )
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowRequest {
    View(i64),
    Edit(i64),
    New,
    Refresh,
}

#[derive(Debug, Default)]
struct RowRequests(Option<RowRequest>);

impl<T: TableRow> TableActions<T> for RowRequests {
    fn on_view(&mut self, row: &T) {
        self.0 = Some(RowRequest::View(row.row_id()));
    }

    fn on_edit(&mut self, row: &T) {
        self.0 = Some(RowRequest::Edit(row.row_id()));
    }

    fn on_new(&mut self) {
        self.0 = Some(RowRequest::New);
    }

    fn on_refresh(&mut self) {
        self.0 = Some(RowRequest::Refresh);
    }
}

#[derive(Debug, Clone)]
enum PickerUiState {
    Level {
        level: Level,
        picker: EntityPicker<CatalogEntry>,
    },
    Indicator(EntityPicker<Indicator>),
}

impl PickerUiState {
    fn projection(&self) -> TableProjection {
        match self {
            Self::Level { picker, .. } => project_picker(picker),
            Self::Indicator(picker) => project_picker(picker),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Level(Level),
    Indicator,
    Scalar(ScalarField),
}

#[derive(Debug, Clone)]
struct FormUiState {
    controller: CascadeController,
    field_index: usize,
    input: Option<String>,
    saving: Option<u64>,
    notice: Option<String>,
    error: Option<String>,
}

impl FormUiState {
    fn new(controller: CascadeController) -> Self {
        Self {
            controller,
            field_index: 0,
            input: None,
            saving: None,
            notice: None,
            error: None,
        }
    }

    fn fields(&self) -> Vec<FormField> {
        let mut fields = self
            .controller
            .spec()
            .levels()
            .iter()
            .copied()
            .map(FormField::Level)
            .collect::<Vec<_>>();
        match self.controller.draft().kind() {
            RelationKind::IndicatorLink => {
                fields.push(FormField::Indicator);
                fields.extend(ScalarField::ALL.map(FormField::Scalar));
            }
            RelationKind::Alignment => fields.extend([
                FormField::Scalar(ScalarField::Notes),
                FormField::Scalar(ScalarField::Status),
            ]),
        }
        fields
    }

    fn current_field(&self) -> Option<FormField> {
        self.fields().get(self.field_index).copied()
    }

    fn move_field(&mut self, delta: isize) {
        let len = self.fields().len() as isize;
        if len == 0 {
            return;
        }
        self.field_index = (self.field_index as isize + delta).rem_euclid(len) as usize;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DetailUiState {
    title: String,
    fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCatalogLoad {
    request_id: u64,
    kinds: Vec<EntityKind>,
    retry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRelationLoad {
    request_id: u64,
    kind: RelationKind,
    select: Option<i64>,
    announce: bool,
}

#[derive(Debug, Clone)]
struct ViewData {
    catalogs: Arc<CatalogSet>,
    failures: Vec<LoadFailure>,
    catalog_load: Option<PendingCatalogLoad>,
    relation_load: Option<PendingRelationLoad>,
    table: Option<ScreenTable>,
    table_screen: Option<ScreenKind>,
    selected_col: usize,
    rows_per_page: usize,
    picker: Option<PickerUiState>,
    form: Option<FormUiState>,
    detail: Option<DetailUiState>,
    pending_delete: Option<i64>,
    help_visible: bool,
    session_user: String,
    status_token: u64,
    next_request_id: u64,
}

impl ViewData {
    fn new(options: &UiOptions) -> Self {
        Self {
            catalogs: Arc::default(),
            failures: Vec::new(),
            catalog_load: None,
            relation_load: None,
            table: None,
            table_screen: None,
            selected_col: 0,
            rows_per_page: options.rows_per_page,
            picker: None,
            form: None,
            detail: None,
            pending_delete: None,
            help_visible: false,
            session_user: options.session_user.clone(),
            status_token: 0,
            next_request_id: 0,
        }
    }

    fn next_request(&mut self) -> u64 {
        self.next_request_id = self.next_request_id.saturating_add(1);
        self.next_request_id
    }

    fn catalog_pending(&self, kind: EntityKind) -> bool {
        self.catalog_load
            .as_ref()
            .is_some_and(|pending| pending.kinds.contains(&kind))
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: &UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(options);
    let (internal_tx, internal_rx) = mpsc::channel();

    initial_load(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn initial_load<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    start_catalog_load(
        state,
        runtime,
        view_data,
        internal_tx,
        &EntityKind::CATALOGS,
        false,
    );
    refresh_view_data(state, runtime, view_data, internal_tx);
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Save(event) => handle_save_event(state, runtime, view_data, tx, event),
            InternalEvent::Loaded(event) => handle_load_event(state, view_data, tx, event),
        }
    }
}

fn handle_load_event(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: LoadEvent,
) {
    match event {
        LoadEvent::Catalogs {
            request_id,
            kinds,
            catalogs,
            failures,
        } => {
            let Some(pending) = view_data
                .catalog_load
                .take_if(|pending| pending.request_id == request_id)
            else {
                debug!(request_id, "stale catalog load ignored");
                return;
            };
            let merged = Arc::make_mut(&mut view_data.catalogs);
            for kind in &kinds {
                if !failures.iter().any(|failure| failure.kind == *kind) {
                    merged.adopt(*kind, &catalogs);
                }
            }
            view_data
                .failures
                .retain(|failure| !kinds.contains(&failure.kind));
            view_data.failures.extend(failures);
            info!(
                request_id,
                kinds = kinds.len(),
                failed = view_data.failures.len(),
                "catalogs loaded"
            );
            show_active_screen(state, view_data);

            let failed = view_data.failures.len();
            let message = match (pending.retry, failed) {
                (true, 0) => Some("reloaded".to_owned()),
                (true, _) => Some(format!("{failed} catalogs still failing -- press r to retry")),
                (false, 0) => None,
                (false, _) => Some(format!("{failed} catalogs failed to load -- press r to retry")),
            };
            if let Some(message) = message {
                emit_status(state, view_data, tx, message);
            }
        }
        LoadEvent::Relations {
            request_id,
            kind,
            result,
        } => {
            let Some(pending) = view_data
                .relation_load
                .take_if(|pending| pending.request_id == request_id && pending.kind == kind)
            else {
                debug!(request_id, "stale relation load ignored");
                return;
            };
            let catalogs = Arc::clone(&view_data.catalogs);
            let Some(ScreenTable::Relations(view)) = view_data.table.as_mut() else {
                return;
            };
            match result {
                Ok(relations) => {
                    debug!(kind = kind.as_str(), count = relations.len(), "relations loaded");
                    view.set_rows(catalogs.relation_rows(relations));
                    if let Some(row_id) = pending.select {
                        view.select_row_id(row_id);
                    }
                    if pending.announce {
                        emit_status(state, view_data, tx, "reloaded");
                    }
                }
                Err(error) => {
                    warn!(kind = kind.as_str(), error = %error, "relation load failed");
                    view.fail(error);
                }
            }
        }
    }
}

fn handle_save_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: SaveEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    if form.saving != Some(event.request_id()) {
        return;
    }

    match event {
        SaveEvent::Completed { relation_id, .. } => {
            info!(relation_id, "relation saved");
            view_data.form = None;
            state.dispatch(AppCommand::ExitToBrowse);
            start_relation_load(state, runtime, view_data, tx, Some(relation_id), false);
            emit_status(
                state,
                view_data,
                tx,
                format!("saved relation #{relation_id}"),
            );
        }
        SaveEvent::Failed { error, .. } => {
            warn!(error = %error, "relation save failed");
            form.saving = None;
            form.error = Some(format!("save failed: {error}"));
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.picker.is_some() {
        handle_picker_key(view_data, key);
        return false;
    }

    if view_data.detail.is_some() {
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
            view_data.detail = None;
        }
        return false;
    }

    match state.mode {
        AppMode::Form(_) => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            return false;
        }
        AppMode::Filter => {
            handle_filter_key(state, view_data, key);
            return false;
        }
        AppMode::Browse => {}
    }

    let armed_delete = view_data.pending_delete.take();
    match (key.code, key.modifiers) {
        (KeyCode::Tab, _) => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextScreen, internal_tx);
        }
        (KeyCode::BackTab, _) => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevScreen, internal_tx);
        }
        (KeyCode::Char('?'), _) => view_data.help_visible = true,
        (KeyCode::Char('/'), _) => {
            state.dispatch(AppCommand::EnterFilter);
        }
        (KeyCode::Char('i'), KeyModifiers::NONE) => {
            dispatch_and_refresh(
                state,
                runtime,
                view_data,
                AppCommand::ToggleInactive,
                internal_tx,
            );
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            request_delete(state, runtime, view_data, internal_tx, armed_delete);
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            run_table_action(state, runtime, view_data, internal_tx, TableAction::Refresh);
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            run_table_action(state, runtime, view_data, internal_tx, TableAction::New);
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) => {
            run_table_action(state, runtime, view_data, internal_tx, TableAction::Edit);
        }
        (KeyCode::Enter, _) => {
            run_table_action(state, runtime, view_data, internal_tx, TableAction::View);
        }
        _ => {
            if let Some(status) = handle_table_key(view_data, key) {
                emit_status(state, view_data, internal_tx, status);
            }
        }
    }
    false
}

/// Cursor, column, sort and paging keys. Returns a status message when the
/// key produced one.
fn handle_table_key(view_data: &mut ViewData, key: KeyEvent) -> Option<String> {
    let selected_col = view_data.selected_col;
    let table = view_data.table.as_mut()?;
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => table.move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => table.move_cursor(-1),
        KeyCode::Char('h') | KeyCode::Left => {
            view_data.selected_col = selected_col.saturating_sub(1);
        }
        KeyCode::Char('l') | KeyCode::Right => {
            let last = table.column_count().saturating_sub(1);
            view_data.selected_col = (selected_col + 1).min(last);
        }
        KeyCode::Char('s') => {
            let key = table.column_key(selected_col)?;
            return Some(match table.toggle_sort(key) {
                SortChange::Sorted(sort) => format!(
                    "sorted by {key} {}",
                    match sort.direction {
                        SortDirection::Asc => "ascending",
                        SortDirection::Desc => "descending",
                    }
                ),
                SortChange::Unsortable => format!("{key} is not sortable"),
                SortChange::UnknownColumn => format!("unknown column {key}"),
            });
        }
        KeyCode::Char(']') | KeyCode::PageDown => {
            if !table.next_page() {
                return Some("last page".to_owned());
            }
        }
        KeyCode::Char('[') | KeyCode::PageUp => {
            if !table.prev_page() {
                return Some("first page".to_owned());
            }
        }
        KeyCode::Char('p') => {
            let rows_per_page = table.cycle_rows_per_page();
            view_data.rows_per_page = rows_per_page;
            return Some(format!("{rows_per_page} rows per page"));
        }
        _ => {}
    }
    None
}

fn handle_filter_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    let Some(table) = view_data.table.as_mut() else {
        state.dispatch(AppCommand::ExitToBrowse);
        return;
    };
    match key.code {
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToBrowse);
        }
        KeyCode::Esc => {
            table.set_query("");
            state.dispatch(AppCommand::ExitToBrowse);
        }
        KeyCode::Backspace => table.pop_query_char(),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            table.push_query_char(ch);
        }
        _ => {}
    }
}

fn run_table_action<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: TableAction,
) {
    let mut requests = RowRequests::default();
    let handled = view_data
        .table
        .as_ref()
        .is_some_and(|table| table.dispatch(action, &mut requests));
    let request = match requests.0 {
        Some(request) if handled => request,
        _ => {
            let message = match action {
                TableAction::View | TableAction::Edit => "no row selected",
                TableAction::New | TableAction::Refresh => "table is still loading",
            };
            emit_status(state, view_data, internal_tx, message);
            return;
        }
    };

    match request {
        RowRequest::View(row_id) => open_detail(state, view_data, row_id),
        RowRequest::Edit(row_id) => open_edit_form(state, view_data, internal_tx, row_id),
        RowRequest::New => open_new_form(state, view_data, internal_tx),
        RowRequest::Refresh => retry_and_reload(state, runtime, view_data, internal_tx),
    }
}

fn open_detail(state: &AppState, view_data: &mut ViewData, row_id: i64) {
    let fields = view_data
        .table
        .as_ref()
        .and_then(|table| table.detail(row_id));
    if let Some(fields) = fields {
        view_data.detail = Some(DetailUiState {
            title: format!("{} #{row_id}", state.active_screen.label()),
            fields,
        });
    }
}

fn form_spec(state: &AppState, kind: RelationKind) -> CascadeSpec {
    let spec = CascadeSpec::for_relation(kind);
    if state.include_inactive {
        spec.include_inactive()
    } else {
        spec
    }
}

fn read_only_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    emit_status(
        state,
        view_data,
        internal_tx,
        "catalog screens are read-only -- switch to links or alignments to edit",
    );
}

/// Forms snapshot the catalogs, so they wait for loads in flight.
fn catalogs_still_loading(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> bool {
    if view_data.catalog_load.is_none() {
        return false;
    }
    emit_status(
        state,
        view_data,
        internal_tx,
        "catalogs are still loading -- try again in a moment",
    );
    true
}

fn open_new_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(kind) = state.active_screen.relation_kind() else {
        read_only_status(state, view_data, internal_tx);
        return;
    };
    if catalogs_still_loading(state, view_data, internal_tx) {
        return;
    }
    let controller = CascadeController::new(
        Arc::clone(&view_data.catalogs),
        form_spec(state, kind),
        RelationDraft::new(kind),
    );
    view_data.form = Some(FormUiState::new(controller));
    state.dispatch(AppCommand::OpenForm(kind));
}

fn open_edit_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    row_id: i64,
) {
    let Some(kind) = state.active_screen.relation_kind() else {
        read_only_status(state, view_data, internal_tx);
        return;
    };
    let Some(relation) = view_data
        .table
        .as_ref()
        .and_then(|table| table.relation(row_id))
    else {
        emit_status(state, view_data, internal_tx, "no row selected");
        return;
    };
    if catalogs_still_loading(state, view_data, internal_tx) {
        return;
    }
    let controller = CascadeController::new(
        Arc::clone(&view_data.catalogs),
        form_spec(state, kind),
        RelationDraft::from_relation(&relation),
    );
    view_data.form = Some(FormUiState::new(controller));
    state.dispatch(AppCommand::OpenForm(kind));
}

fn request_delete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    armed: Option<i64>,
) {
    if state.active_screen.relation_kind().is_none() {
        read_only_status(state, view_data, internal_tx);
        return;
    }
    let Some(row_id) = view_data.table.as_ref().and_then(ScreenTable::selected_id) else {
        emit_status(state, view_data, internal_tx, "no row selected");
        return;
    };
    if armed != Some(row_id) {
        view_data.pending_delete = Some(row_id);
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("press d again to delete relation #{row_id}"),
        );
        return;
    }

    match runtime.delete_relation(RelationId::new(row_id)) {
        Ok(()) => {
            info!(relation_id = row_id, "relation deleted");
            reload_active_screen(state, runtime, view_data, internal_tx);
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("deleted relation #{row_id}"),
            );
        }
        Err(error) => {
            warn!(relation_id = row_id, error = %error, "relation delete failed");
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("delete failed: {error:#}"),
            );
        }
    }
}

/// Refetches the catalogs that failed plus the active screen's own data.
fn retry_and_reload<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let mut kinds = view_data
        .failures
        .iter()
        .map(|failure| failure.kind)
        .collect::<Vec<_>>();
    let active = screen_entity_kind(state.active_screen);
    if active != EntityKind::Relation && !kinds.contains(&active) {
        kinds.push(active);
    }
    let catalogs_requested = !kinds.is_empty();
    if catalogs_requested {
        start_catalog_load(state, runtime, view_data, internal_tx, &kinds, true);
    }
    if state.active_screen.relation_kind().is_some() {
        start_relation_load(
            state,
            runtime,
            view_data,
            internal_tx,
            None,
            !catalogs_requested,
        );
    }
}

fn handle_picker_key(view_data: &mut ViewData, key: KeyEvent) {
    let Some(picker_state) = view_data.picker.as_mut() else {
        return;
    };

    if key.code == KeyCode::Esc {
        view_data.picker = None;
        return;
    }

    if key.code == KeyCode::Enter {
        let notice = match picker_state {
            PickerUiState::Level { level, picker } => {
                let level = *level;
                let chosen = picker.select_cursor();
                match (chosen, view_data.form.as_mut()) {
                    (Some(entry), Some(form)) => {
                        let outcome = form.controller.select_level(level, Some(&entry));
                        Some(outcome_notice(level, &outcome))
                    }
                    _ => None,
                }
            }
            PickerUiState::Indicator(picker) => {
                let chosen = picker.select_cursor();
                match (chosen, view_data.form.as_mut()) {
                    (Some(indicator), Some(form)) => {
                        form.controller.set_indicator(Some(&indicator));
                        Some(None)
                    }
                    _ => None,
                }
            }
        };
        // An empty page keeps the picker open.
        if let Some(notice) = notice {
            view_data.picker = None;
            if let Some(form) = view_data.form.as_mut() {
                form.notice = notice;
            }
        }
        return;
    }

    match picker_state {
        PickerUiState::Level { picker, .. } => picker_navigation(picker, key),
        PickerUiState::Indicator(picker) => picker_navigation(picker, key),
    }
}

fn picker_navigation<T: TableRow + Clone>(picker: &mut EntityPicker<T>, key: KeyEvent) {
    match key.code {
        KeyCode::Down => picker.move_cursor(1),
        KeyCode::Up => picker.move_cursor(-1),
        KeyCode::PageDown => {
            picker.next_page();
        }
        KeyCode::PageUp => {
            picker.prev_page();
        }
        KeyCode::Backspace => picker.pop_query_char(),
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            picker.cycle_rows_per_page();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            picker.push_query_char(ch);
        }
        _ => {}
    }
}

fn level_list(levels: &[Level]) -> String {
    levels
        .iter()
        .map(|level| level.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn outcome_notice(level: Level, outcome: &SelectOutcome) -> Option<String> {
    let mut parts = Vec::new();
    if !outcome.backfilled.is_empty() {
        parts.push(format!(
            "filled {} from {}",
            level_list(&outcome.backfilled),
            level.label()
        ));
    }
    if !outcome.cleared.is_empty() {
        parts.push(format!("cleared {}", level_list(&outcome.cleared)));
    }
    if !outcome.conflicts.is_empty() {
        parts.push(format!(
            "{} kept although {} disagrees",
            level.label(),
            level_list(&outcome.conflicts)
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToBrowse);
        return;
    };

    if form.input.is_some() {
        handle_form_input(form, key);
        return;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Esc, _) => {
            if form.saving.is_some() {
                emit_status(state, view_data, internal_tx, "save in progress");
                return;
            }
            view_data.form = None;
            state.dispatch(AppCommand::ExitToBrowse);
            emit_status(state, view_data, internal_tx, "form closed");
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) | (KeyCode::Tab, _) => form.move_field(1),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) | (KeyCode::BackTab, _) => {
            form.move_field(-1);
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) | (KeyCode::Backspace, _) => {
            clear_form_field(form);
        }
        (KeyCode::Enter, _) => {
            let rows_per_page = view_data.rows_per_page;
            match form.current_field() {
                Some(FormField::Level(level)) => match form.controller.picker_gate(level) {
                    PickerGate::Open => {
                        let rows = form
                            .controller
                            .candidates_for(level)
                            .into_iter()
                            .cloned()
                            .collect::<Vec<_>>();
                        let mut picker = EntityPicker::new(
                            entry_picker_columns(),
                            vec!["code", "label"],
                            rows_per_page,
                        );
                        picker.open(format!("choose {}", level.label()), rows);
                        form.notice = None;
                        view_data.picker = Some(PickerUiState::Level { level, picker });
                    }
                    PickerGate::Blocked(message) => form.notice = Some(message),
                    PickerGate::Unsupported => {
                        form.notice = Some(format!("{} is not part of this form", level.label()));
                    }
                },
                Some(FormField::Indicator) => {
                    let rows = form
                        .controller
                        .indicator_candidates()
                        .into_iter()
                        .cloned()
                        .collect::<Vec<_>>();
                    let mut picker = EntityPicker::new(
                        indicator_picker_columns(),
                        vec!["code", "name", "unit"],
                        rows_per_page,
                    );
                    picker.open("choose indicator", rows);
                    form.notice = None;
                    view_data.picker = Some(PickerUiState::Indicator(picker));
                }
                Some(FormField::Scalar(field)) => {
                    form.input = Some(field.text(form.controller.draft().scalars()));
                }
                None => {}
            }
        }
        _ => {}
    }
}

fn handle_form_input(form: &mut FormUiState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            form.input = None;
            form.error = None;
        }
        KeyCode::Enter => {
            let Some(FormField::Scalar(field)) = form.current_field() else {
                form.input = None;
                return;
            };
            let raw = form.input.clone().unwrap_or_default();
            match form.controller.set_scalar(field, &raw) {
                Ok(()) => {
                    form.input = None;
                    form.error = None;
                }
                Err(error) => form.error = Some(format!("{error:#}")),
            }
        }
        KeyCode::Backspace => {
            if let Some(input) = form.input.as_mut() {
                input.pop();
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(input) = form.input.as_mut() {
                input.push(ch);
            }
        }
        _ => {}
    }
}

fn clear_form_field(form: &mut FormUiState) {
    match form.current_field() {
        Some(FormField::Level(level)) => {
            let outcome = form.controller.select_level(level, None);
            form.notice = outcome_notice(level, &outcome);
        }
        Some(FormField::Indicator) => form.controller.set_indicator(None),
        Some(FormField::Scalar(field)) => {
            if let Err(error) = form.controller.set_scalar(field, "") {
                form.error = Some(format!("{error:#}"));
            }
        }
        None => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    if form.saving.is_some() {
        emit_status(state, view_data, internal_tx, "save already in progress");
        return;
    }
    if let Err(error) = form.controller.validate() {
        form.error = Some(format!("{error:#}"));
        return;
    }

    view_data.next_request_id = view_data.next_request_id.saturating_add(1);
    let request_id = view_data.next_request_id;
    form.saving = Some(request_id);
    form.error = None;
    let draft = form.controller.draft().clone();
    if let Err(error) = runtime.spawn_save(request_id, draft, internal_tx.clone())
        && let Some(form) = view_data.form.as_mut()
    {
        form.saving = None;
        form.error = Some(format!("{error:#}"));
    }
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = state.dispatch(command);
    if should_refresh_view(&events) {
        refresh_view_data(state, runtime, view_data, internal_tx);
    }
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn should_refresh_view(events: &[AppEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, AppEvent::ScreenChanged(_)))
}

fn screen_entity_kind(screen: ScreenKind) -> EntityKind {
    match (screen.level(), screen.relation_kind()) {
        (Some(level), _) => level.entity_kind(),
        (None, Some(_)) => EntityKind::Relation,
        (None, None) => EntityKind::Indicator,
    }
}

fn refresh_view_data<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let screen = state.active_screen;
    if view_data.table_screen != Some(screen) || view_data.table.is_none() {
        view_data.table = Some(ScreenTable::for_screen(screen, view_data.rows_per_page));
        view_data.table_screen = Some(screen);
        view_data.selected_col = 0;
        view_data.pending_delete = None;
        view_data.relation_load = None;
    }
    reload_active_screen(state, runtime, view_data, internal_tx);
}

/// Catalog screens render from the cached catalogs; relation screens refetch.
fn reload_active_screen<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_screen.relation_kind().is_some() {
        start_relation_load(state, runtime, view_data, internal_tx, None, false);
    } else {
        show_active_screen(state, view_data);
    }
}

/// Fills the active table from what is already in memory. Relation rows that
/// are on screen get their codes re-resolved against the current catalogs.
fn show_active_screen(state: &AppState, view_data: &mut ViewData) {
    let screen = state.active_screen;
    let kind = screen_entity_kind(screen);
    let pending = view_data.catalog_pending(kind);
    let failure = view_data
        .failures
        .iter()
        .find(|failure| failure.kind == kind)
        .map(|failure| failure.message.clone());
    let catalogs = Arc::clone(&view_data.catalogs);
    let Some(table) = view_data.table.as_mut() else {
        return;
    };

    match table {
        ScreenTable::Catalog(view) => match (pending, failure, screen.level()) {
            (true, _, _) => view.begin_loading(),
            (false, Some(message), _) => view.fail(message),
            (false, None, Some(level)) => view.set_rows(catalogs.catalog_rows(level)),
            (false, None, None) => {
                view.fail(format!("{} is not a catalog screen", screen.label()));
            }
        },
        ScreenTable::Indicators(view) => match (pending, failure) {
            (true, _) => view.begin_loading(),
            (false, Some(message)) => view.fail(message),
            (false, None) => view.set_rows(catalogs.indicators().to_vec()),
        },
        ScreenTable::Relations(view) => {
            if *view.status() == LoadStatus::Ready {
                let relations = view
                    .rows()
                    .iter()
                    .map(|row| row.relation.clone())
                    .collect();
                let selected = view.selected().map(|row| row.row_id());
                view.set_rows(catalogs.relation_rows(relations));
                if let Some(row_id) = selected {
                    view.select_row_id(row_id);
                }
            }
        }
    }
}

/// Starts a background fetch of `kinds`, folding in any catalogs that are
/// still in flight so their results are not lost.
fn start_catalog_load<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kinds: &[EntityKind],
    retry: bool,
) {
    let mut pending = view_data
        .catalog_load
        .take()
        .map(|pending| pending.kinds)
        .unwrap_or_default();
    for kind in kinds {
        if !pending.contains(kind) {
            pending.push(*kind);
        }
    }
    let request_id = view_data.next_request();
    view_data.catalog_load = Some(PendingCatalogLoad {
        request_id,
        kinds: pending.clone(),
        retry,
    });
    show_active_screen(state, view_data);
    debug!(request_id, kinds = pending.len(), "catalog load started");

    let request = LoadRequest::Catalogs(pending.clone());
    if let Err(error) = runtime.spawn_load(request_id, request, internal_tx.clone()) {
        warn!(request_id, error = %error, "catalog load could not start");
        view_data.catalog_load = None;
        let message = format!("{error:#}");
        view_data
            .failures
            .retain(|failure| !pending.contains(&failure.kind));
        view_data
            .failures
            .extend(pending.iter().map(|kind| LoadFailure {
                kind: *kind,
                message: message.clone(),
            }));
        show_active_screen(state, view_data);
        emit_status(state, view_data, internal_tx, format!("load failed: {message}"));
    }
}

/// Puts the relation table into its loading state and fetches its rows.
/// `select` moves the cursor to that row once the rows arrive.
fn start_relation_load<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    select: Option<i64>,
    announce: bool,
) {
    let Some(kind) = state.active_screen.relation_kind() else {
        return;
    };
    let Some(ScreenTable::Relations(view)) = view_data.table.as_mut() else {
        return;
    };
    view.begin_loading();
    let request_id = view_data.next_request();
    view_data.relation_load = Some(PendingRelationLoad {
        request_id,
        kind,
        select,
        announce,
    });
    debug!(request_id, kind = kind.as_str(), "relation load started");

    if let Err(error) =
        runtime.spawn_load(request_id, LoadRequest::Relations(kind), internal_tx.clone())
    {
        warn!(request_id, error = %error, "relation load could not start");
        view_data.relation_load = None;
        if let Some(ScreenTable::Relations(view)) = view_data.table.as_mut() {
            view.fail(format!("{error:#}"));
        }
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = ScreenKind::ALL
        .iter()
        .position(|screen| *screen == state.active_screen)
        .unwrap_or(0);
    let titles = ScreenKind::ALL
        .iter()
        .map(|screen| screen.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(format!("plancat | {}", view_data.session_user))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    if let Some(table) = &view_data.table {
        let projection = table.projection(state.active_screen.label(), view_data.selected_col);
        render_projection(frame, layout[1], &projection);
    } else {
        let empty = Paragraph::new(String::new()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(state.active_screen.label()),
        );
        frame.render_widget(empty, layout[1]);
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(72, 80, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_form_text(form)).block(
            Block::default()
                .title(form_title(form))
                .borders(Borders::ALL),
        );
        frame.render_widget(widget, area);
    }

    if let Some(picker) = &view_data.picker {
        let area = centered_rect(60, 60, frame.area());
        frame.render_widget(Clear, area);
        render_projection(frame, area, &picker.projection());
    }

    if let Some(detail) = &view_data.detail {
        let area = centered_rect(64, 70, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_detail_text(detail)).block(
            Block::default()
                .title(detail.title.as_str())
                .borders(Borders::ALL),
        );
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_projection(frame: &mut ratatui::Frame<'_>, area: Rect, projection: &TableProjection) {
    let block = Block::default()
        .title(format!("{} | {}", projection.title, projection.footer))
        .borders(Borders::ALL);

    let rows = match &projection.body {
        ProjectionBody::Rows(rows) => rows,
        ProjectionBody::Loading => {
            frame.render_widget(Paragraph::new("loading...").block(block), area);
            return;
        }
        ProjectionBody::Failed(message) => {
            let text = format!("load failed: {message}\npress r to retry");
            frame.render_widget(
                Paragraph::new(text)
                    .style(Style::default().fg(Color::Red))
                    .block(block),
                area,
            );
            return;
        }
        ProjectionBody::Empty(message) => {
            frame.render_widget(Paragraph::new(message.as_str()).block(block), area);
            return;
        }
    };

    let header = Row::new(projection.headers.iter().map(|label| {
        Cell::from(label.as_str()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let widths = vec![Constraint::Min(6); projection.headers.len().max(1)];
    let body = rows.iter().enumerate().map(|(index, cells)| {
        let style = if index == projection.cursor {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        Row::new(cells.iter().map(|cell| Cell::from(cell.as_str()))).style(style)
    });
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn form_title(form: &FormUiState) -> String {
    let draft = form.controller.draft();
    match draft.origin() {
        DraftOrigin::New => format!("new {}", draft.kind().label()),
        DraftOrigin::Edit(id) => format!("edit {} #{}", draft.kind().label(), id.get()),
    }
}

fn field_label(field: FormField) -> &'static str {
    match field {
        FormField::Level(level) => level.label(),
        FormField::Indicator => "indicator",
        FormField::Scalar(field) => field.label(),
    }
}

fn render_form_text(form: &FormUiState) -> String {
    let conflicts = form.controller.conflicting_levels();
    let mut lines = form
        .fields()
        .into_iter()
        .enumerate()
        .map(|(index, field)| {
            let selected = index == form.field_index;
            let value = match field {
                FormField::Level(level) => {
                    let mut value = form
                        .controller
                        .display_label(level)
                        .unwrap_or_else(|| "-".to_owned());
                    if let PickerGate::Blocked(_) = form.controller.picker_gate(level) {
                        value.push_str(" (locked)");
                    }
                    if conflicts.contains(&level) {
                        value.push_str(" !");
                    }
                    value
                }
                FormField::Indicator => form
                    .controller
                    .indicator_label()
                    .unwrap_or_else(|| "-".to_owned()),
                FormField::Scalar(scalar) => match (&form.input, selected) {
                    (Some(input), true) => format!("[{input}_]"),
                    _ => {
                        let text = scalar.text(form.controller.draft().scalars());
                        if text.is_empty() { "-".to_owned() } else { text }
                    }
                },
            };
            let marker = if selected { ">" } else { " " };
            format!("{marker} {:<14} {value}", field_label(field))
        })
        .collect::<Vec<_>>();

    lines.push(String::new());
    if form.saving.is_some() {
        lines.push("saving...".to_owned());
    }
    if let Some(notice) = &form.notice {
        lines.push(notice.clone());
    }
    if let Some(error) = &form.error {
        lines.push(format!("error: {error}"));
    }
    lines.join("\n")
}

fn render_detail_text(detail: &DetailUiState) -> String {
    detail
        .fields
        .iter()
        .map(|(label, value)| format!("{label:<14} {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible || view_data.detail.is_some() {
        return String::new();
    }

    let (mode, keys) = if view_data.picker.is_some() {
        (
            "PICK",
            "type to filter | up/down | pgup/pgdn | ctrl+p size | enter choose | esc cancel",
        )
    } else {
        match state.mode {
            AppMode::Browse => (
                "BROWSE",
                "tab screens | j/k h/l | s sort | [/] page | p size | / filter | enter view | a/e/d | r refresh | i inactive | ? help | ctrl+q",
            ),
            AppMode::Filter => ("FILTER", "type to filter | enter keep | esc clear"),
            AppMode::Form(_) => (
                "FORM",
                "j/k field | enter pick/edit | x clear | ctrl+s save | esc close",
            ),
        }
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {keys}"),
        None => format!("{mode} | {keys}"),
    }
}

fn help_overlay_text() -> String {
    [
        "tab / shift+tab   next / previous screen",
        "j k / up down     move row",
        "h l / left right  choose column",
        "s                 sort by column (again to reverse)",
        "[ ] / pgup pgdn   previous / next page",
        "p                 cycle rows per page (5, 10, 25, 50)",
        "/                 filter rows",
        "enter             view row",
        "a                 new relation",
        "e                 edit relation",
        "d d               delete relation",
        "r                 reload screen and retry failed catalogs",
        "i                 show or hide inactive entries in pickers",
        "ctrl+s            save form",
        "esc               close overlay",
        "ctrl+q            quit",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
