//! Configuration file handling.
//!
//! The configuration file is stored at `$EXPENSE_HOME/config.json` and names the Google Sheet that
//! expenses are appended to, the model used for extraction, and the locations of the OAuth files.

use crate::api::DEFAULT_MODEL;
use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "expense-sheet";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";

/// Values people leave in place when copying an example configuration.
pub(crate) const SHEET_PLACEHOLDER: &str = "your_sheet_id_here";
pub(crate) const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$EXPENSE_HOME` and from there it loads `$EXPENSE_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the data directory, its secrets subdirectory and:
    /// - Creates an initial `config.json` file using `sheet` along with default settings
    /// - Copies `secret_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g.
    ///   `$HOME/expense-sheet`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
    ///   OAuth workflow.
    /// - `sheet` - The URL or the ID of the Google Sheet that expenses will be appended to.
    ///
    /// # Errors
    /// - Returns a `Config` error if `sheet` is missing or a placeholder.
    /// - Returns an `Io` error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, secret_file: &Path, sheet: &str) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet)
            .pub_result(ErrorType::Config)?
            .to_string();

        let root = create_dirs(dir.into()).await.pub_result(ErrorType::Io)?;
        let secrets_dir = root.join(SECRETS);
        utils::copy(secret_file, secrets_dir.join(CLIENT_SECRET_JSON))
            .await
            .pub_result(ErrorType::Io)?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            sheet: sheet.to_string(),
            ..ConfigFile::default()
        };
        config_file
            .save(&config_path)
            .await
            .pub_result(ErrorType::Io)?;

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that `expense_home` and its config file exist
    /// - load the config file and validate the spreadsheet identifier
    /// - validate that the secrets directory exists
    pub async fn load(expense_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = expense_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The expense home directory is missing, run 'expense init' first")
            .pub_result(ErrorType::Config)?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            return Err(anyhow::anyhow!(
                "The config file is missing '{}', run 'expense init' first",
                config_path.display()
            ))
            .pub_result(ErrorType::Config);
        }
        let config_file = ConfigFile::load(&config_path)
            .await
            .pub_result(ErrorType::Config)?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet)
            .with_context(|| format!("Please set 'sheet' in {}", config_path.display()))
            .pub_result(ErrorType::Config)?
            .to_string();

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            spreadsheet_id,
        };
        if !config.secrets.is_dir() {
            return Err(anyhow::anyhow!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            ))
            .pub_result(ErrorType::Config);
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet(&self) -> &str {
        &self.config_file.sheet
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The tab expenses are written to. `None` means the spreadsheet's first tab.
    pub fn tab(&self) -> Option<&str> {
        self.config_file.tab.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// The Gemini model used for extraction.
    pub fn model(&self) -> &str {
        &self.config_file.model
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Creates the home directory and its subdirectories, returning the canonical home path.
async fn create_dirs(maybe_relative: PathBuf) -> Res<PathBuf> {
    utils::make_dir(&maybe_relative)
        .await
        .context("Unable to create the expense home directory")?;
    let root = utils::canonicalize(&maybe_relative).await?;
    utils::make_dir(&root.join(SECRETS)).await?;
    Ok(root)
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "expense-sheet",
///   "config_version": 1,
///   "sheet": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "tab": "Expenses",
///   "model": "gemini-2.5-flash-lite",
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "expense-sheet"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL or ID of the Google Sheet
    sheet: String,

    /// Tab to write to. Defaults to the first tab of the spreadsheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tab: Option<String>,

    /// The Gemini model used to extract expenses
    #[serde(default = "default_model")]
    model: String,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to config.json or absolute)
    /// Defaults to $EXPENSE_HOME/.secrets/client_secret.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to config.json or absolute)
    /// Defaults to $EXPENSE_HOME/.secrets/token.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet: String::new(),
            tab: None,
            model: default_model(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// If the path is relative, it should be interpreted as relative to the config.json file.
    fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// If the path is relative, it should be interpreted as relative to the config.json file.
    fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL, or accepts a bare ID as-is.
///
/// # Arguments
/// * `sheet` - e.g. "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit" or "SPREADSHEET_ID"
///
/// # Errors
/// Returns an error if `sheet` is empty, is the placeholder value, or is a URL of the wrong shape.
fn extract_spreadsheet_id(sheet: &str) -> Res<&str> {
    let sheet = sheet.trim();
    if sheet.is_empty() || sheet == SHEET_PLACEHOLDER {
        bail!(
            "No spreadsheet is configured. Create a Google Sheet and copy its URL or the ID \
            from its URL"
        );
    }
    if !sheet.contains('/') {
        return Ok(sheet);
    }

    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = sheet.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    bail!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("expense_home");
        let secret_source_file = dir.path().join("x.txt");
        let secret_content = "12345";
        let sheet_url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        utils::write(&secret_source_file, secret_content)
            .await
            .unwrap();

        let config = Config::create(&home_dir, &secret_source_file, sheet_url)
            .await
            .unwrap();

        assert_eq!(sheet_url, config.sheet());
        assert_eq!(
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
            config.spreadsheet_id()
        );
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.tab(), None);

        let found_secret_content = utils::read(&config.client_secret_path()).await.unwrap();
        assert_eq!(secret_content, found_secret_content);
        // The original is copied, not moved.
        assert!(secret_source_file.is_file());
        assert!(config.secrets().is_dir());
        assert_eq!(
            config.token_path(),
            config.root().join(".secrets").join("token.json")
        );
    }

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let secret_file = dir.path().join("foo.json");
        utils::write(&secret_file, "{}").await.unwrap();
        let sheet_id = uuid::Uuid::new_v4().simple().to_string();
        let created = Config::create(dir.path().join("home"), &secret_file, &sheet_id)
            .await
            .unwrap();

        let loaded = Config::load(dir.path().join("home")).await.unwrap();
        assert_eq!(loaded.spreadsheet_id(), sheet_id);
        assert_eq!(loaded.config_path(), created.config_path());
    }

    #[tokio::test]
    async fn test_config_create_rejects_placeholder() {
        let dir = TempDir::new().unwrap();
        let secret_file = dir.path().join("foo.json");
        utils::write(&secret_file, "{}").await.unwrap();
        let err = Config::create(dir.path().join("home"), &secret_file, SHEET_PLACEHOLDER)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        // Nothing is created for a bad configuration.
        assert!(!dir.path().join("home").exists());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("expense init"));
    }

    #[tokio::test]
    async fn test_config_load_placeholder_sheet() {
        let dir = TempDir::new().unwrap();
        utils::make_dir(&dir.path().join(SECRETS)).await.unwrap();
        let json = format!(
            r#"{{"app_name": "expense-sheet", "config_version": 1, "sheet": "{SHEET_PLACEHOLDER}"}}"#
        );
        utils::write(dir.path().join(CONFIG_JSON), json).await.unwrap();

        let err = Config::load(dir.path()).await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
        assert!(err.to_string().contains("No spreadsheet is configured"));
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "expense-sheet",
            "config_version": 1,
            "sheet": "https://docs.google.com/spreadsheets/d/minimal"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let config = ConfigFile::load(&config_path).await.unwrap();
        assert_eq!(config.sheet, "https://docs.google.com/spreadsheets/d/minimal");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.tab, None);
        assert_eq!(
            config.client_secret_path(),
            PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON)
        );
        assert_eq!(config.token_path(), PathBuf::from(SECRETS).join(TOKEN_JSON));
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "sheet": "https://docs.google.com/spreadsheets/d/test"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let t = TempDir::new().unwrap();
        let path = t.path().join("file.json");
        let original = ConfigFile {
            sheet: "abc".to_string(),
            tab: Some("Expenses".to_string()),
            model: "gemini-2.5-flash".to_string(),
            token_path: Some(PathBuf::from("/tmp/token.json")),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        let read = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, read);
        assert_eq!(read.token_path(), PathBuf::from("/tmp/token.json"));
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("client_secret_path"));
        assert!(!json.contains("token_path"));
        assert!(!json.contains("tab"));
    }

    #[test]
    fn test_extract_spreadsheet_id() {
        let url = "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL/edit";
        assert_eq!(
            extract_spreadsheet_id(url).unwrap(),
            "7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL"
        );

        let url = "https://docs.google.com/spreadsheets/d/ABC123?foo=bar";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        let url = "https://docs.google.com/spreadsheets/d/ABC123#gid=0";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "ABC123");

        assert_eq!(extract_spreadsheet_id("  ABC123 ").unwrap(), "ABC123");

        assert!(extract_spreadsheet_id("https://example.com/invalid").is_err());
        assert!(extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/").is_err());
        assert!(extract_spreadsheet_id("").is_err());
        assert!(extract_spreadsheet_id(SHEET_PLACEHOLDER).is_err());
    }
}
