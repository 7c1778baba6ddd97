//! The seams between this program and the services it talks to: a spreadsheet (`Sheet`), a
//! language model (`Completion`) and an OAuth credential source (`Credentials`). Each has a Google
//! implementation and, under test, an in-memory one.

mod files;
mod gemini;
mod oauth;
mod sheet;

#[cfg(test)]
mod model_test_client;
#[cfg(test)]
mod sheet_test_client;

use crate::error::Res;
use crate::model::A1Range;

pub(crate) use gemini::{GeminiModel, GeminiSettings, DEFAULT_MODEL};
pub(crate) use oauth::TokenProvider;
pub(crate) use sheet::GoogleSheet;

#[cfg(test)]
pub(crate) use model_test_client::TestModel;
#[cfg(test)]
pub(crate) use sheet_test_client::TestSheet;

/// OAuth scopes required for reading and writing spreadsheet values.
pub(crate) const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Values destined for one range of the sheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SheetRange {
    pub(crate) range: A1Range,
    pub(crate) values: Vec<Vec<String>>,
}

impl SheetRange {
    pub(crate) fn new(range: A1Range, values: Vec<Vec<String>>) -> Self {
        Self { range, values }
    }
}

/// The spreadsheet operations this program needs.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Reads `range`. Trailing empty rows and cells are omitted, so an empty range reads as an
    /// empty `Vec`.
    async fn get(&mut self, range: &A1Range) -> Res<Vec<Vec<String>>>;

    /// Writes each range, letting the sheet interpret values as if typed by a user (numbers and
    /// formulas are parsed).
    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()>;
}

/// A text completion service. One prompt in, the full text response out.
#[async_trait::async_trait]
pub(crate) trait Completion {
    async fn complete(&mut self, prompt: &str) -> Res<String>;
}

/// A source of valid, refreshable OAuth access tokens.
#[async_trait::async_trait]
pub(crate) trait Credentials {
    /// Returns an access token, refreshing it first if it is expired or about to expire.
    async fn token_with_refresh(&mut self) -> Res<String>;

    /// Refreshes the access token unconditionally and persists the result.
    async fn refresh(&mut self) -> Res<()>;

    /// Saves the current tokens so that later runs can reuse them.
    async fn persist(&self) -> Res<()>;
}
