//! Appends extracted expenses to the spreadsheet.
//!
//! The sheet layout is fixed: row 1 holds the header (with a running total in E1:F1) and every
//! following row holds one expense in columns A to D. Rows are only ever added beneath the last
//! populated row of column A; existing rows are never read back or modified.

use crate::api::{Sheet, SheetRange};
use crate::error::{ErrorType, IntoResult};
use crate::model::{A1Range, Amount, ExpenseRecord, ExtractionBatch, HEADER};
use crate::Result;
use anyhow::Context;
use tracing::{debug, info};

/// Column A, the Date column, is used to find the next free row.
const DATE_COL: u32 = 0;
/// Column D, the Category column, is the last column of an expense row.
const CATEGORY_COL: u32 = 3;

/// Writes expense rows to a `Sheet`, one remote call per row.
pub struct Ledger {
    sheet: Box<dyn Sheet + Send>,
    tab: Option<String>,
}

impl Ledger {
    /// Creates a ledger writing to `tab`, or to the spreadsheet's first tab when `tab` is `None`.
    pub(crate) fn new(sheet: Box<dyn Sheet + Send>, tab: Option<String>) -> Self {
        Self { sheet, tab }
    }

    fn range(&self, range: A1Range) -> A1Range {
        range.on_tab(self.tab.as_deref())
    }

    /// Writes the header row if `A1:F1` is empty. Returns `true` if it was written.
    ///
    /// An existing header is never validated or rewritten; only its presence matters.
    pub async fn ensure_header(&mut self) -> Result<bool> {
        let header_range = self.range(A1Range::row_span(1, 0, HEADER.len() as u32 - 1));
        let existing = self
            .sheet
            .get(&header_range)
            .await
            .context("Unable to check for the header row")
            .pub_result(ErrorType::RemoteStore)?;
        if existing.iter().any(|row| !row.is_empty()) {
            return Ok(false);
        }

        let values = vec![HEADER.iter().map(|s| s.to_string()).collect()];
        self.sheet
            .write_ranges(&[SheetRange::new(header_range, values)])
            .await
            .context("Unable to write the header row")
            .pub_result(ErrorType::RemoteStore)?;
        info!("Added headers with total formula");
        Ok(true)
    }

    /// The 1-indexed row that the next expense will be written to.
    ///
    /// The Sheets API returns column A up to its last populated cell, so this is one past the last
    /// populated row. For a column without gaps that is the populated-cell count plus one.
    pub async fn next_row(&mut self) -> Result<u32> {
        let column = self.range(A1Range::whole_column(DATE_COL));
        let values = self
            .sheet
            .get(&column)
            .await
            .context("Unable to read the Date column")
            .pub_result(ErrorType::RemoteStore)?;
        Ok(values.len() as u32 + 1)
    }

    /// Appends every record of `batch` in order beneath the existing rows and returns the batch
    /// total.
    ///
    /// A failed write stops the batch. Rows written before the failure stay in the sheet.
    pub async fn append(&mut self, batch: &ExtractionBatch) -> Result<Amount> {
        self.append_with(batch, |_, _| Ok(())).await
    }

    /// Like `append`, but calls `on_written` with each record and its row as soon as that row is
    /// in the sheet. An error from `on_written` stops the batch as an `Io` error.
    pub async fn append_with<F>(
        &mut self,
        batch: &ExtractionBatch,
        mut on_written: F,
    ) -> Result<Amount>
    where
        F: FnMut(&ExpenseRecord, u32) -> std::io::Result<()>,
    {
        self.ensure_header().await?;
        let mut row = self.next_row().await?;
        debug!("Appending {} expense(s) starting at row {row}", batch.len());

        for record in batch {
            let range = self.range(A1Range::row_span(row, DATE_COL, CATEGORY_COL));
            let values = record.sheet_row().into_values();
            self.sheet
                .write_ranges(&[SheetRange::new(range.clone(), values)])
                .await
                .with_context(|| format!("Unable to write '{}' to {range}", record.item()))
                .pub_result(ErrorType::RemoteStore)?;
            info!("Added: {} - {} at row {row}", record.item(), record.amount());
            on_written(record, row).pub_result(ErrorType::Io)?;
            row += 1;
        }

        Ok(batch.total())
    }
}
