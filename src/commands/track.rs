//! The `expense track` console loop.

use crate::api::{GeminiModel, GeminiSettings, GoogleSheet, TokenProvider};
use crate::commands::Out;
use crate::config::API_KEY_PLACEHOLDER;
use crate::error::{ErrorType, IntoResult};
use crate::model::Amount;
use crate::{Config, Extractor, Ledger, Result};
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const PROMPT: &str = "\nExpense (or 'quit'): ";
const QUIT: &str = "quit";

/// A summary of one `track` session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Non-blank input lines processed, not counting `quit`.
    pub lines: usize,
    /// Expense rows written by successful batches.
    pub records: usize,
    /// Input lines that ended with an error.
    pub failures: usize,
    /// The sum of all successfully written batches.
    pub total: Amount,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            lines: 0,
            records: 0,
            failures: 0,
            total: Amount::ZERO,
        }
    }
}

/// Handles the `expense track` command.
///
/// Every setup failure (missing API key, missing or invalid OAuth tokens) is returned before the
/// first prompt is shown. After that, errors for a single line are printed and the loop continues.
///
/// # Arguments
/// - `config` - The loaded configuration
/// - `api_key` - The Gemini API key
/// - `model` - Overrides the model named in the configuration
pub async fn track(
    config: Config,
    api_key: Option<&str>,
    model: Option<&str>,
) -> Result<Out<Session>> {
    let api_key = validate_api_key(api_key)?;
    let model = model.unwrap_or(config.model());
    let settings = GeminiSettings::new(api_key, model);
    let mut extractor = Extractor::new(Box::new(
        GeminiModel::new(settings).pub_result(ErrorType::Config)?,
    ));

    let token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context("Unable to load the OAuth token, run 'expense auth' first")
        .pub_result(ErrorType::Auth)?;
    let sheet = GoogleSheet::new(config.spreadsheet_id(), Box::new(token_provider))
        .await
        .pub_result(ErrorType::Auth)?;
    let mut ledger = Ledger::new(Box::new(sheet), config.tab().map(str::to_string));

    info!("Tracking expenses in {} with {model}", config.sheet());
    let input = BufReader::new(tokio::io::stdin());
    run_loop(&mut extractor, &mut ledger, input, std::io::stdout()).await
}

fn validate_api_key(api_key: Option<&str>) -> Result<&str> {
    match api_key.map(str::trim) {
        Some(key) if !key.is_empty() && key != API_KEY_PLACEHOLDER => Ok(key),
        _ => Err(anyhow!(
            "A Gemini API key is required, pass --gemini-api-key or set GEMINI_API_KEY"
        ))
        .pub_result(ErrorType::Config),
    }
}

/// Reads lines from `input` until `quit` or end of input. Each line is extracted and appended;
/// what was added, or the error, is written to `output`.
pub(crate) async fn run_loop<R, W>(
    extractor: &mut Extractor,
    ledger: &mut Ledger,
    mut input: R,
    mut output: W,
) -> Result<Out<Session>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut session = Session::default();
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")
            .and_then(|_| output.flush())
            .pub_result(ErrorType::Io)?;

        line.clear();
        let read = input
            .read_line(&mut line)
            .await
            .context("Unable to read from the console")
            .pub_result(ErrorType::Io)?;
        if read == 0 {
            debug!("End of input");
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case(QUIT) {
            break;
        }

        session.lines += 1;
        match process(extractor, ledger, text, &mut output).await {
            Ok((records, total)) => {
                session.records += records;
                session.total = session.total.saturating_add(total);
            }
            Err(e) if e.error_type().is_recoverable() => {
                session.failures += 1;
                writeln!(output, "Error: {e}").pub_result(ErrorType::Io)?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Out::new(
        format!(
            "Added {} expense(s) totalling {} from {} line(s), {} failed",
            session.records, session.total, session.lines, session.failures
        ),
        session,
    ))
}

/// Extracts and appends one line, returning the number of records written and their total.
async fn process<W: Write>(
    extractor: &mut Extractor,
    ledger: &mut Ledger,
    text: &str,
    output: &mut W,
) -> Result<(usize, Amount)> {
    let batch = extractor.extract(text).await?;
    let total = ledger
        .append_with(&batch, |record, _| {
            writeln!(output, "Added: {} - {}", record.item(), record.amount())
        })
        .await?;
    writeln!(output, "Added total: {total}").pub_result(ErrorType::Io)?;
    Ok((batch.len(), total))
}
