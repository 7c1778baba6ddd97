//! Types that represent the core data model, such as `ExpenseRecord` and `ExtractionBatch`.
mod a1;
mod amount;
mod expense;

pub use a1::{column_index, column_letters, A1Range, Cell};
pub use amount::{Amount, AmountError};
pub use expense::{Category, ExpenseRecord, ExtractionBatch, SheetRow, HEADER, TODAY};
