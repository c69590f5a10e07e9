// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::table::{Column, Pager, Presentation, TableRow, empty_message, filter_indices};

/// Modal chooser over a list of rows with search and pagination.
///
/// Selecting or cancelling closes the picker and clears its query and page.
#[derive(Debug, Clone)]
pub struct EntityPicker<T> {
    title: String,
    rows: Vec<T>,
    columns: Vec<Column<T>>,
    search_keys: Vec<&'static str>,
    query: String,
    pager: Pager,
    cursor: usize,
    open: bool,
}

impl<T: TableRow + Clone> EntityPicker<T> {
    pub fn new(
        columns: Vec<Column<T>>,
        search_keys: Vec<&'static str>,
        rows_per_page: usize,
    ) -> Self {
        Self {
            title: String::new(),
            rows: Vec::new(),
            columns,
            search_keys,
            query: String::new(),
            pager: Pager::new(rows_per_page),
            cursor: 0,
            open: false,
        }
    }

    pub fn open(&mut self, title: impl Into<String>, rows: Vec<T>) {
        self.title = title.into();
        self.rows = rows;
        self.reset();
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
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

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn filtered_len(&self) -> usize {
        filter_indices(&self.rows, &self.search_keys, &self.query).len()
    }

    pub fn page_rows(&self) -> Vec<&T> {
        let indices = filter_indices(&self.rows, &self.search_keys, &self.query);
        let range = self.pager.range(indices.len());
        indices[range]
            .iter()
            .map(|index| &self.rows[*index])
            .collect()
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

    pub fn cycle_rows_per_page(&mut self) {
        self.pager.cycle_rows_per_page();
        self.cursor = 0;
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

    pub fn presentation(&self) -> Presentation<'_, T> {
        let rows = self.page_rows();
        if rows.is_empty() {
            Presentation::Empty(empty_message(&self.query))
        } else {
            Presentation::Rows(rows)
        }
    }

    /// Returns the row under the cursor and closes the picker.
    pub fn select_cursor(&mut self) -> Option<T> {
        if !self.open {
            return None;
        }
        let chosen = self.page_rows().get(self.cursor).map(|row| (*row).clone())?;
        self.close();
        Some(chosen)
    }

    /// Returns the row with `row_id` among the filtered rows and closes the picker.
    pub fn select(&mut self, row_id: i64) -> Option<T> {
        if !self.open {
            return None;
        }
        let chosen = filter_indices(&self.rows, &self.search_keys, &self.query)
            .into_iter()
            .map(|index| &self.rows[index])
            .find(|row| row.row_id() == row_id)
            .cloned()?;
        self.close();
        Some(chosen)
    }

    pub fn close(&mut self) {
        self.open = false;
        self.reset();
    }

    fn reset(&mut self) {
        self.query.clear();
        self.pager.reset();
        self.cursor = 0;
    }
}
