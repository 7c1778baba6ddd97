//! These structs provide the CLI interface for the expense CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// expense: Track expenses in a Google sheet by describing them in plain words.
///
/// Type something like "lunch 200, cab 150" and each expense is extracted by a Gemini model and
/// appended as a row to your sheet, below a header row that keeps a running total.
///
/// You will need a Google OAuth client for the Sheets API and a Gemini API key. Run `expense init`
/// and then `expense auth` once before `expense track`.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run. You need two things beforehand:
    ///
    /// - The URL (or ID) of the Google Sheet that expenses should go to, passed as --sheet.
    ///
    /// - A downloaded OAuth 2.0 client for a desktop app with the Google Sheets API enabled,
    ///   passed as --client-secret. It is copied into the data directory.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Read expenses from the console and append them to the sheet until 'quit'.
    Track(TrackArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and OAuth tokens are held. Defaults to ~/expense-sheet
    #[arg(long, env = "EXPENSE_HOME", default_value_t = default_expense_home())]
    expense_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, expense_home: PathBuf) -> Self {
        Self {
            log_level,
            expense_home: expense_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn expense_home(&self) -> &DisplayPath {
        &self.expense_home
    }
}

/// (Not shown): Args for the `expense init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to your Google sheet, or just its ID. The URL looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet: String,

    /// The path to your downloaded OAuth client credentials. This file will be copied to the
    /// default secrets location in the main data directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(sheet: impl Into<String>, client_secret: impl Into<PathBuf>) -> Self {
        Self {
            sheet: sheet.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// (Not shown): Args for the `expense auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// (Not shown): Args for the `expense track` command.
#[derive(Debug, Parser, Clone)]
pub struct TrackArgs {
    /// The Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// The Gemini model to use instead of the one in config.json, e.g. gemini-2.5-flash
    #[arg(long)]
    model: Option<String>,
}

impl TrackArgs {
    pub fn new(gemini_api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            gemini_api_key,
            model,
        }
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        self.gemini_api_key.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

fn default_expense_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("expense-sheet"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --expense-home or EXPENSE_HOME instead of relying on the \
                default home directory. If you continue using the program right now, you may \
                have problems!",
            );
            PathBuf::from("expense-sheet")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
