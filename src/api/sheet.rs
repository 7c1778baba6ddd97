//! Implements the `Sheet` trait using the `sheets::Client` to interact with a Google sheet.

use crate::api::{Credentials, Sheet, SheetRange};
use crate::error::Res;
use crate::model::A1Range;
use anyhow::Context;
use sheets::types::{
    BatchUpdateValuesRequest, DateTimeRenderOption, Dimension, ValueInputOption, ValueRange,
    ValueRenderOption,
};
use sheets::ClientError;
use tracing::trace;

/// Implements the `Sheet` trait using the `sheets::Client`. It takes a `Credentials` provider, from
/// which it gets a fresh access token before each call.
pub(crate) struct GoogleSheet {
    spreadsheet_id: String,
    credentials: Box<dyn Credentials + Send>,
    client: sheets::Client,
}

impl GoogleSheet {
    pub(crate) async fn new(
        spreadsheet_id: impl Into<String>,
        mut credentials: Box<dyn Credentials + Send>,
    ) -> Res<Self> {
        let client = create_sheets_client(credentials.as_mut()).await?;
        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            credentials,
            client,
        })
    }

    /// Refreshes the sheets client with a new access token if needed
    async fn refresh_client(&mut self) -> Res<()> {
        self.client = create_sheets_client(self.credentials.as_mut()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, range: &A1Range) -> Res<Vec<Vec<String>>> {
        trace!("get for {range}");
        self.refresh_client().await?;
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                &range.to_string(),
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to read range {range}"))?;
        Ok(response.body.values)
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        trace!("write_ranges for {} range(s)", data.len());
        self.refresh_client().await?;
        let value_ranges: Vec<ValueRange> = data
            .iter()
            .map(|sr| ValueRange {
                major_dimension: Some(Dimension::Rows),
                range: sr.range.to_string(),
                values: sr.values.clone(),
            })
            .collect();

        let request = BatchUpdateValuesRequest {
            data: value_ranges,
            include_values_in_response: Some(false),
            response_date_time_render_option: None,
            response_value_render_option: None,
            // Lets the sheet parse numbers and formulas as if they were typed in.
            value_input_option: Some(ValueInputOption::UserEntered),
        };

        let ranges: Vec<String> = data.iter().map(|sr| sr.range.to_string()).collect();
        self.client
            .spreadsheets()
            .values_batch_update(&self.spreadsheet_id, &request)
            .await
            .map_err(map_client_error)
            .with_context(|| format!("Failed to write {}", ranges.join(", ")))?;
        Ok(())
    }
}

/// Creates a new sheets client with a refreshed access token.
async fn create_sheets_client(credentials: &mut (dyn Credentials + Send)) -> Res<sheets::Client> {
    let access_token = credentials.token_with_refresh().await?;

    // The client id, secret, redirect and refresh token are only used by the sheets crate for its
    // own refresh logic, which we do not use.
    Ok(sheets::Client::new(
        String::new(),
        String::new(),
        String::new(),
        access_token,
        String::new(),
    ))
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::from(e).context(error_name)
}
