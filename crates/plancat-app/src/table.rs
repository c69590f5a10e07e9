// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::ops::Range;
use time::Date;

use crate::SortDirection;

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [5, 10, 25, 50];
const JSON_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Flag(bool),
    Date(Date),
    Json(serde_json::Value),
}

impl CellValue {
    /// String form used for display, filtering and sorting.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Flag(true) => "yes".to_owned(),
            Self::Flag(false) => "no".to_owned(),
            Self::Date(value) => value.to_string(),
            Self::Json(value) => {
                let text = value.to_string();
                if text.chars().count() <= JSON_PREVIEW_CHARS {
                    text
                } else {
                    let mut preview = text.chars().take(JSON_PREVIEW_CHARS).collect::<String>();
                    preview.push_str("...");
                    preview
                }
            }
        }
    }
}

impl From<Option<i64>> for CellValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Empty, Self::Integer)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Empty, Self::Decimal)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Empty, Self::Text)
    }
}

pub trait TableRow {
    fn row_id(&self) -> i64;
    /// Value of the field named `key`, or `CellValue::Empty` when unknown.
    fn field(&self, key: &str) -> CellValue;
}

pub struct Column<T> {
    pub key: &'static str,
    pub header: &'static str,
    pub sortable: bool,
    pub render: Option<fn(&T) -> String>,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            header: self.header,
            sortable: self.sortable,
            render: self.render,
        }
    }
}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("sortable", &self.sortable)
            .finish()
    }
}

impl<T: TableRow> Column<T> {
    pub fn new(key: &'static str, header: &'static str) -> Self {
        Self {
            key,
            header,
            sortable: true,
            render: None,
        }
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn with_render(mut self, render: fn(&T) -> String) -> Self {
        self.render = Some(render);
        self
    }

    pub fn cell_text(&self, row: &T) -> String {
        match self.render {
            Some(render) => render(row),
            None => row.field(self.key).display(),
        }
    }
}

/// Indices of `rows` whose search fields contain `query`, case-insensitively.
pub fn filter_indices<T: TableRow>(rows: &[T], search_keys: &[&str], query: &str) -> Vec<usize> {
    let needle = query.to_lowercase();
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            needle.is_empty()
                || search_keys
                    .iter()
                    .any(|key| row.field(key).display().to_lowercase().contains(&needle))
        })
        .map(|(index, _)| index)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    rows_per_page: usize,
}

impl Pager {
    pub fn new(rows_per_page: usize) -> Self {
        Self {
            page: 0,
            rows_per_page: rows_per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.rows_per_page).max(1)
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    pub fn set_rows_per_page(&mut self, rows_per_page: usize) {
        self.rows_per_page = rows_per_page.max(1);
        self.page = 0;
    }

    /// Advances to the next entry of `PAGE_SIZE_OPTIONS`, wrapping around.
    pub fn cycle_rows_per_page(&mut self) {
        let next = PAGE_SIZE_OPTIONS
            .iter()
            .copied()
            .find(|size| *size > self.rows_per_page)
            .unwrap_or(PAGE_SIZE_OPTIONS[0]);
        self.set_rows_per_page(next);
    }

    pub fn next(&mut self, total: usize) -> bool {
        if self.page + 1 < self.page_count(total) {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Pulls the page back inside range after the row count shrinks.
    pub fn clamp(&mut self, total: usize) {
        let last = self.page_count(total) - 1;
        if self.page > last {
            self.page = last;
        }
    }

    pub fn range(&self, total: usize) -> Range<usize> {
        let start = (self.page * self.rows_per_page).min(total);
        let end = (start + self.rows_per_page).min(total);
        start..end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Failed(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: &'static str,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortChange {
    Sorted(SortSpec),
    Unsortable,
    UnknownColumn,
}

#[derive(Debug, PartialEq)]
pub enum Presentation<'a, T> {
    Loading,
    Failed(&'a str),
    Empty(String),
    Rows(Vec<&'a T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    View,
    Edit,
    New,
    Refresh,
}

/// Receiver for row-level actions raised by a [`TabularView`].
pub trait TableActions<T> {
    fn on_view(&mut self, row: &T);
    fn on_edit(&mut self, row: &T);
    fn on_new(&mut self);
    fn on_refresh(&mut self);
}

pub fn empty_message(query: &str) -> String {
    if query.is_empty() {
        "no records".to_owned()
    } else {
        format!("no records match {query:?}")
    }
}

/// Filterable, sortable, paginated list of rows.
#[derive(Debug, Clone)]
pub struct TabularView<T> {
    rows: Vec<T>,
    columns: Vec<Column<T>>,
    search_keys: Vec<&'static str>,
    query: String,
    sort: Option<SortSpec>,
    pager: Pager,
    cursor: usize,
    status: LoadStatus,
}

impl<T: TableRow> TabularView<T> {
    pub fn new(
        columns: Vec<Column<T>>,
        search_keys: Vec<&'static str>,
        rows_per_page: usize,
    ) -> Self {
        Self {
            rows: Vec::new(),
            columns,
            search_keys,
            query: String::new(),
            sort: None,
            pager: Pager::new(rows_per_page),
            cursor: 0,
            status: LoadStatus::Loading,
        }
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn begin_loading(&mut self) {
        self.status = LoadStatus::Loading;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = LoadStatus::Failed(message.into());
    }

    pub fn set_rows(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.status = LoadStatus::Ready;
        let total = self.filtered_len();
        self.pager.clamp(total);
        self.clamp_cursor();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.pager.reset();
        self.cursor = 0;
    }

    pub fn push_query_char(&mut self, ch: char) {
        let mut query = self.query.clone();
        query.push(ch);
        self.set_query(query);
    }

    pub fn pop_query_char(&mut self) {
        let mut query = self.query.clone();
        query.pop();
        self.set_query(query);
    }

    pub fn sort(&self) -> Option<SortSpec> {
        self.sort
    }

    /// Header selection: the active column flips direction, any other sortable
    /// column becomes active ascending.
    pub fn toggle_sort(&mut self, key: &str) -> SortChange {
        let Some(column) = self.columns.iter().find(|column| column.key == key) else {
            return SortChange::UnknownColumn;
        };
        if !column.sortable {
            return SortChange::Unsortable;
        }
        let next = match self.sort {
            Some(current) if current.key == column.key => SortSpec {
                key: current.key,
                direction: current.direction.flipped(),
            },
            _ => SortSpec {
                key: column.key,
                direction: SortDirection::Asc,
            },
        };
        self.sort = Some(next);
        SortChange::Sorted(next)
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn set_rows_per_page(&mut self, rows_per_page: usize) {
        self.pager.set_rows_per_page(rows_per_page);
        self.cursor = 0;
    }

    pub fn cycle_rows_per_page(&mut self) {
        self.pager.cycle_rows_per_page();
        self.cursor = 0;
    }

    pub fn next_page(&mut self) -> bool {
        let moved = self.pager.next(self.filtered_len());
        if moved {
            self.cursor = 0;
        }
        moved
    }

    pub fn prev_page(&mut self) -> bool {
        let moved = self.pager.prev();
        if moved {
            self.cursor = 0;
        }
        moved
    }

    /// Row order after filtering and sorting, before pagination.
    pub fn visible_indices(&self) -> Vec<usize> {
        let mut indices = filter_indices(&self.rows, &self.search_keys, &self.query);
        if let Some(sort) = self.sort {
            let keyed = |index: &usize| self.rows[*index].field(sort.key).display();
            indices.sort_by(|left, right| {
                let ordering = keyed(left).cmp(&keyed(right));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }
        indices
    }

    pub fn filtered_len(&self) -> usize {
        filter_indices(&self.rows, &self.search_keys, &self.query).len()
    }

    pub fn page_rows(&self) -> Vec<&T> {
        let indices = self.visible_indices();
        let range = self.pager.range(indices.len());
        indices[range]
            .iter()
            .map(|index| &self.rows[*index])
            .collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.page_rows().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_cursor(&mut self) {
        let len = self.page_rows().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }

    pub fn selected(&self) -> Option<&T> {
        if self.status != LoadStatus::Ready {
            return None;
        }
        self.page_rows().get(self.cursor).copied()
    }

    pub fn select_row_id(&mut self, row_id: i64) -> bool {
        let position = self
            .page_rows()
            .iter()
            .position(|row| row.row_id() == row_id);
        match position {
            Some(position) => {
                self.cursor = position;
                true
            }
            None => false,
        }
    }

    pub fn presentation(&self) -> Presentation<'_, T> {
        match &self.status {
            LoadStatus::Loading => Presentation::Loading,
            LoadStatus::Failed(message) => Presentation::Failed(message),
            LoadStatus::Ready => {
                let rows = self.page_rows();
                if rows.is_empty() {
                    Presentation::Empty(empty_message(&self.query))
                } else {
                    Presentation::Rows(rows)
                }
            }
        }
    }

    /// Routes `action` to `handler`. Returns false when the action does not
    /// apply to the current state.
    pub fn dispatch<H: TableActions<T>>(&self, action: TableAction, handler: &mut H) -> bool {
        match action {
            TableAction::Refresh => {
                if self.status == LoadStatus::Loading {
                    return false;
                }
                handler.on_refresh();
                true
            }
            TableAction::New => {
                if self.status == LoadStatus::Loading {
                    return false;
                }
                handler.on_new();
                true
            }
            TableAction::View | TableAction::Edit => {
                let Some(row) = self.selected() else {
                    return false;
                };
                if action == TableAction::View {
                    handler.on_view(row);
                } else {
                    handler.on_edit(row);
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CellValue, Column, LoadStatus, Pager, Presentation, SortChange, TableAction, TableActions,
        TableRow, TabularView,
    };
    use crate::SortDirection;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        code: &'static str,
        name: &'static str,
        weight: i64,
    }

    impl TableRow for Row {
        fn row_id(&self) -> i64 {
            self.id
        }

        fn field(&self, key: &str) -> CellValue {
            match key {
                "id" => CellValue::Integer(self.id),
                "code" => CellValue::Text(self.code.to_owned()),
                "name" => CellValue::Text(self.name.to_owned()),
                "weight" => CellValue::Integer(self.weight),
                _ => CellValue::Empty,
            }
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 1, code: "B", name: "Water", weight: 9 },
            Row { id: 2, code: "A", name: "Roads", weight: 10 },
            Row { id: 3, code: "C", name: "Health water", weight: 2 },
            Row { id: 4, code: "A", name: "Schools", weight: 7 },
        ]
    }

    fn view(rows_per_page: usize) -> TabularView<Row> {
        let mut view = TabularView::new(
            vec![
                Column::new("code", "Code"),
                Column::new("name", "Name"),
                Column::new("weight", "Weight"),
                Column::new("id", "ID").unsortable(),
            ],
            vec!["code", "name"],
            rows_per_page,
        );
        view.set_rows(rows());
        view
    }

    fn ids(view: &TabularView<Row>) -> Vec<i64> {
        view.page_rows().iter().map(|row| row.id).collect()
    }

    #[test]
    fn filter_matches_any_search_key_case_insensitively() {
        let mut view = view(10);
        view.set_query("WATER");
        assert_eq!(ids(&view), vec![1, 3]);
        view.set_query("a");
        assert_eq!(ids(&view), vec![1, 2, 3, 4]);
        view.set_query("9");
        assert!(ids(&view).is_empty(), "weight is not a search key");
    }

    #[test]
    fn toggling_active_column_flips_direction() {
        let mut view = view(10);
        assert_eq!(
            view.toggle_sort("code"),
            SortChange::Sorted(super::SortSpec {
                key: "code",
                direction: SortDirection::Asc,
            })
        );
        assert_eq!(ids(&view), vec![2, 4, 1, 3]);
        view.toggle_sort("code");
        assert_eq!(view.sort().map(|sort| sort.direction), Some(SortDirection::Desc));
        assert_eq!(ids(&view), vec![3, 1, 2, 4], "ties keep original order");
        view.toggle_sort("name");
        assert_eq!(view.sort().map(|sort| sort.direction), Some(SortDirection::Asc));
    }

    #[test]
    fn sort_compares_string_forms() {
        let mut view = view(10);
        view.toggle_sort("weight");
        assert_eq!(ids(&view), vec![2, 3, 4, 1], "\"10\" sorts before \"2\"");
    }

    #[test]
    fn unsortable_and_unknown_columns_leave_sort_alone() {
        let mut view = view(10);
        assert_eq!(view.toggle_sort("id"), SortChange::Unsortable);
        assert_eq!(view.toggle_sort("missing"), SortChange::UnknownColumn);
        assert_eq!(view.sort(), None);
    }

    #[test]
    fn query_and_page_size_changes_reset_page() {
        let mut view = view(2);
        assert!(view.next_page());
        assert_eq!(view.pager().page(), 1);
        assert!(!view.next_page());
        view.set_query("s");
        assert_eq!(view.pager().page(), 0);
        view.set_query("");
        assert!(view.next_page());
        view.set_rows_per_page(3);
        assert_eq!(view.pager().page(), 0);
    }

    #[test]
    fn pager_cycles_through_size_options() {
        let mut pager = Pager::new(10);
        pager.cycle_rows_per_page();
        assert_eq!(pager.rows_per_page(), 25);
        pager.cycle_rows_per_page();
        pager.cycle_rows_per_page();
        assert_eq!(pager.rows_per_page(), 5);
        assert_eq!(pager.page_count(0), 1);
        assert_eq!(pager.page_count(11), 3);
        assert_eq!(pager.range(7), 0..5);
    }

    #[test]
    fn set_rows_clamps_page_after_shrink() {
        let mut view = view(2);
        view.next_page();
        view.set_rows(rows().into_iter().take(1).collect());
        assert_eq!(view.pager().page(), 0);
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn presentation_tracks_status() {
        let mut view = view(10);
        view.begin_loading();
        assert_eq!(view.presentation(), Presentation::Loading);
        view.fail("catalog offline");
        assert_eq!(view.presentation(), Presentation::Failed("catalog offline"));
        view.set_rows(Vec::new());
        assert_eq!(view.presentation(), Presentation::Empty("no records".to_owned()));
        view.set_rows(rows());
        view.set_query("zzz");
        assert_eq!(
            view.presentation(),
            Presentation::Empty("no records match \"zzz\"".to_owned())
        );
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl TableActions<Row> for Recorder {
        fn on_view(&mut self, row: &Row) {
            self.calls.push(format!("view {}", row.id));
        }

        fn on_edit(&mut self, row: &Row) {
            self.calls.push(format!("edit {}", row.id));
        }

        fn on_new(&mut self) {
            self.calls.push("new".to_owned());
        }

        fn on_refresh(&mut self) {
            self.calls.push("refresh".to_owned());
        }
    }

    #[test]
    fn dispatch_routes_actions_to_selected_row() {
        let mut view = view(10);
        let mut recorder = Recorder::default();
        view.move_cursor(1);
        assert!(view.dispatch(TableAction::View, &mut recorder));
        assert!(view.dispatch(TableAction::Edit, &mut recorder));
        assert!(view.dispatch(TableAction::New, &mut recorder));

        view.fail("down");
        assert_eq!(view.status(), &LoadStatus::Failed("down".to_owned()));
        assert!(!view.dispatch(TableAction::Edit, &mut recorder));
        assert!(view.dispatch(TableAction::Refresh, &mut recorder));
        assert_eq!(recorder.calls, vec!["view 2", "edit 2", "new", "refresh"]);
    }

    #[test]
    fn cursor_stays_within_page() {
        let mut view = view(2);
        view.move_cursor(5);
        assert_eq!(view.cursor(), 1);
        view.move_cursor(-9);
        assert_eq!(view.cursor(), 0);
        assert!(view.select_row_id(2));
        assert_eq!(view.selected().map(|row| row.id), Some(2));
        assert!(!view.select_row_id(4));
    }

    #[test]
    fn json_cells_are_truncated() {
        let value = serde_json::json!({"notes": "a long payload that keeps going and going"});
        let text = CellValue::Json(value).display();
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), 43);
    }
}
