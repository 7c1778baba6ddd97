//! expense-sheet: turn free-text expense notes into rows in a Google sheet.
//!
//! A line such as "lunch 200, cab 150" is sent to a Gemini model, which answers with JSON. The
//! answer is decoded into an `ExtractionBatch` by the `Extractor` and each record is appended
//! beneath the existing rows of the sheet by the `Ledger`.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod extract;
mod ledger;
pub mod model;
mod utils;

pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use extract::Extractor;
pub use ledger::Ledger;
