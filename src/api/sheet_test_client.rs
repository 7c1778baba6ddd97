//! Implements the `Sheet` trait using in-memory data for testing purposes.

use crate::api::{Sheet, SheetRange};
use crate::error::Res;
use crate::model::A1Range;
use anyhow::bail;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// The observable state of a `TestSheet`. Tests hold on to a clone of the `Arc` so that they can
/// inspect the grid and the call log after handing the sheet to the code under test.
#[derive(Debug, Default, Clone)]
pub(crate) struct TestSheetState {
    /// Grid per tab. The default tab is keyed by the empty string. Rows and columns are 0-indexed.
    pub(crate) tabs: BTreeMap<String, Vec<Vec<String>>>,
    /// Every range read, in call order.
    pub(crate) reads: Vec<String>,
    /// Every range successfully written, in call order.
    pub(crate) writes: Vec<String>,
    /// Number of write calls attempted, including failed ones.
    pub(crate) write_attempts: usize,
    /// When set, the write attempt with this 1-based number fails.
    pub(crate) fail_on_write: Option<usize>,
    /// When set, every read fails.
    pub(crate) fail_reads: bool,
}

impl TestSheetState {
    /// The grid of the default tab.
    pub(crate) fn grid(&self) -> Vec<Vec<String>> {
        self.tabs.get("").cloned().unwrap_or_default()
    }

    /// The value of a cell on the default tab, using a 1-indexed row and a 0-indexed column.
    pub(crate) fn cell(&self, row: u32, col: u32) -> Option<String> {
        self.tabs
            .get("")
            .and_then(|g| g.get(row as usize - 1))
            .and_then(|r| r.get(col as usize))
            .filter(|v| !v.is_empty())
            .cloned()
    }
}

/// An implementation of the `Sheet` trait that does not use Google sheets. Its reads follow the
/// Sheets API in trimming trailing empty rows and cells.
pub(crate) struct TestSheet {
    state: Arc<Mutex<TestSheetState>>,
}

impl TestSheet {
    pub(crate) fn new() -> Self {
        Self::with_state(Arc::new(Mutex::new(TestSheetState::default())))
    }

    /// Creates a sheet whose default tab starts out holding `rows`.
    pub(crate) fn with_rows(rows: Vec<Vec<&str>>) -> Self {
        let sheet = Self::new();
        let grid = rows
            .into_iter()
            .map(|r| r.into_iter().map(str::to_string).collect())
            .collect();
        sheet.state().lock().unwrap().tabs.insert(String::new(), grid);
        sheet
    }

    pub(crate) fn with_state(state: Arc<Mutex<TestSheetState>>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> Arc<Mutex<TestSheetState>> {
        self.state.clone()
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, range: &A1Range) -> Res<Vec<Vec<String>>> {
        let mut state = self.state.lock().unwrap();
        state.reads.push(range.to_string());
        if state.fail_reads {
            bail!("Simulated read failure for {range}");
        }
        let grid = state
            .tabs
            .get(range.tab().unwrap_or_default())
            .cloned()
            .unwrap_or_default();
        Ok(slice(&grid, range))
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        let mut state = self.state.lock().unwrap();
        state.write_attempts += 1;
        if state.fail_on_write == Some(state.write_attempts) {
            bail!("Simulated write failure on attempt {}", state.write_attempts);
        }
        for sr in data {
            let start = sr.range.start();
            let (Some(first_row), first_col) = (start.row(), start.col()) else {
                bail!("Whole-column writes are not supported: {}", sr.range);
            };
            let grid = state
                .tabs
                .entry(sr.range.tab().unwrap_or_default().to_string())
                .or_default();
            for (r, row) in sr.values.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    set(grid, first_row as usize - 1 + r, first_col as usize + c, value);
                }
            }
            state.writes.push(sr.range.to_string());
        }
        Ok(())
    }
}

fn set(grid: &mut Vec<Vec<String>>, row: usize, col: usize, value: &str) {
    if grid.len() <= row {
        grid.resize(row + 1, Vec::new());
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value.to_string();
}

/// Extracts `range` from `grid`, dropping trailing empty cells and rows like the Sheets API does.
fn slice(grid: &[Vec<String>], range: &A1Range) -> Vec<Vec<String>> {
    let first_col = range.start().col() as usize;
    let last_col = range.end().col() as usize;
    let first_row = range.start().row().map(|r| r as usize - 1).unwrap_or(0);
    let last_row = range
        .end()
        .row()
        .map(|r| r as usize - 1)
        .unwrap_or(usize::MAX);

    let mut rows: Vec<Vec<String>> = grid
        .iter()
        .enumerate()
        .filter(|(ix, _)| *ix >= first_row && *ix <= last_row)
        .map(|(_, row)| {
            let mut cells: Vec<String> = (first_col..=last_col)
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            cells
        })
        .collect();
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> A1Range {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_get_trims_like_the_api() {
        let mut sheet = TestSheet::with_rows(vec![
            vec!["Date", "Item", "Amount", "Category", "TOTAL:", "=SUM(C:C)"],
            vec!["Today", "lunch", "200", "Food"],
            vec![],
        ]);
        let column = sheet.get(&range("A:A")).await.unwrap();
        assert_eq!(column, vec![vec!["Date"], vec!["Today"]]);

        let header = sheet.get(&range("A1:F1")).await.unwrap();
        assert_eq!(header[0].len(), 6);

        let empty = sheet.get(&range("A5:D5")).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_write_and_fail() {
        let mut sheet = TestSheet::new();
        sheet.state().lock().unwrap().fail_on_write = Some(2);
        let data = [SheetRange::new(range("B2:C2"), vec![vec!["x".into(), "y".into()]])];

        sheet.write_ranges(&data).await.unwrap();
        assert!(sheet.write_ranges(&data).await.is_err());

        let state = sheet.state();
        let state = state.lock().unwrap();
        assert_eq!(state.write_attempts, 2);
        assert_eq!(state.writes, vec!["B2:C2"]);
        assert_eq!(state.cell(2, 1).as_deref(), Some("x"));
        assert_eq!(state.cell(2, 0), None);
    }

    #[tokio::test]
    async fn test_tabs_are_separate() {
        let mut sheet = TestSheet::new();
        let data = [SheetRange::new(
            range("'Trip'!A1:A1"),
            vec![vec!["Date".into()]],
        )];
        sheet.write_ranges(&data).await.unwrap();
        assert!(sheet.get(&range("A:A")).await.unwrap().is_empty());
        assert_eq!(sheet.get(&range("Trip!A:A")).await.unwrap().len(), 1);
    }
}
