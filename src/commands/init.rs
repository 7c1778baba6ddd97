use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;
use tracing::debug;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet` along with default settings
/// - Copies `secret_file` into its default location in the data dir.
///
/// # Arguments
/// - `expense_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/expense-sheet`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow. This will be copied from the `secret_file` path to its default location and
///   name in the data directory.
/// - `sheet` - The URL or ID of the Google Sheet that expenses are written to.
///   e.g. https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
///
/// # Errors
/// - Returns a `Config` error if `sheet` is empty or a placeholder.
/// - Returns an `Io` error if any file operations fail.
pub async fn init(expense_home: &Path, secret_file: &Path, sheet: &str) -> Result<Out<()>> {
    let config = Config::create(expense_home, secret_file, sheet).await?;
    debug!("Wrote {}", config.config_path().display());
    Ok(format!(
        "Successfully created {}. Next, run 'expense auth'",
        config.root().display()
    )
    .into())
}
