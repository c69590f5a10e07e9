// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use plancat_app::{CellValue, Column, SortDirection, TableRow, TabularView};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: i64,
    code: String,
    name: String,
}

impl TableRow for Item {
    fn row_id(&self) -> i64 {
        self.id
    }

    fn field(&self, key: &str) -> CellValue {
        match key {
            "code" => CellValue::Text(self.code.clone()),
            "name" => CellValue::Text(self.name.clone()),
            "id" => CellValue::Integer(self.id),
            _ => CellValue::Empty,
        }
    }
}

fn view(items: Vec<Item>, rows_per_page: usize) -> TabularView<Item> {
    let mut view = TabularView::new(
        vec![Column::new("code", "Code"), Column::new("name", "Name")],
        vec!["code", "name"],
        rows_per_page,
    );
    view.set_rows(items);
    view
}

fn codes(view: &TabularView<Item>) -> Vec<String> {
    view.page_rows().iter().map(|item| item.code.clone()).collect()
}

#[test]
fn code_header_toggles_between_orders() {
    let mut view = view(
        vec![
            Item {
                id: 1,
                code: "B".to_owned(),
                name: "Beta".to_owned(),
            },
            Item {
                id: 2,
                code: "A".to_owned(),
                name: "Alpha".to_owned(),
            },
        ],
        10,
    );
    view.toggle_sort("code");
    assert_eq!(codes(&view), vec!["A", "B"]);
    view.toggle_sort("code");
    assert_eq!(codes(&view), vec!["B", "A"]);
    view.toggle_sort("code");
    assert_eq!(view.sort().map(|sort| sort.direction), Some(SortDirection::Asc));
}

fn items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(("[a-dA-D]{0,3}", "[a-dA-D ]{0,6}"), 0..30).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(index, (code, name))| Item {
                id: index as i64,
                code,
                name,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn filter_matches_lowercase_substring(items in items(), query in "[a-dA-D]{0,2}") {
        let mut view = view(items.clone(), 5);
        view.set_query(query.clone());
        let needle = query.to_lowercase();
        let expected = items
            .iter()
            .filter(|item| {
                item.code.to_lowercase().contains(&needle) || item.name.to_lowercase().contains(&needle)
            })
            .map(|item| item.id)
            .collect::<Vec<_>>();
        let mut actual = view
            .visible_indices()
            .into_iter()
            .map(|index| view.rows()[index].id)
            .collect::<Vec<_>>();
        prop_assert_eq!(&actual, &expected);

        view.toggle_sort("name");
        view.next_page();
        actual = view
            .visible_indices()
            .into_iter()
            .map(|index| view.rows()[index].id)
            .collect();
        actual.sort_unstable();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn rows_per_page_change_resets_page(items in items(), pages in 0usize..4, size in 1usize..12) {
        let mut view = view(items, 3);
        for _ in 0..pages {
            view.next_page();
        }
        view.set_rows_per_page(size);
        prop_assert_eq!(view.pager().page(), 0);
    }

    #[test]
    fn double_toggle_returns_to_ascending(items in items()) {
        let mut view = view(items, 10);
        view.toggle_sort("name");
        view.toggle_sort("name");
        view.toggle_sort("name");
        prop_assert_eq!(view.sort().map(|sort| sort.direction), Some(SortDirection::Asc));
    }
}
