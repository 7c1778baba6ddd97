//! Authentication command handlers for OAuth flow.
//!
//! This module implements the CLI commands for:
//! - `expense auth` - Initial OAuth consent flow
//! - `expense auth --verify` - Verify and refresh authentication

use crate::api::{Credentials, TokenProvider};
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;

/// Handles the `expense auth` command - runs the OAuth consent flow
///
/// This is the ONLY command that involves a browser.
///
/// This guides the user through setting up Google Sheets authentication:
/// 1. Loads client_secret.json
/// 2. Prints the OAuth consent URL and waits for the redirect
/// 3. Saves tokens to token.json with required scopes
///
/// # Errors
/// Returns an `Auth` error if the OAuth flow fails or if client_secret.json is missing or invalid.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    let _ = TokenProvider::initialize(config.client_secret_path(), config.token_path())
        .await
        .pub_result(ErrorType::Auth)?;
    Ok("Authorization complete. You can now run 'expense track'".into())
}

/// Handles the `expense auth --verify` command - verifies authentication
///
/// This command NEVER starts an interactive OAuth flow. It only verifies that the existing cached
/// tokens are valid by refreshing them.
///
/// If the token is missing, invalid, or has the wrong scopes, this command will fail with an error
/// message telling the user to run `expense auth`.
///
/// # Errors
/// Returns an `Auth` error if verification fails, credentials are missing, or tokens are invalid.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let mut token_provider = TokenProvider::load(config.client_secret_path(), config.token_path())
        .await
        .context(
            "Unable to use the existing tokens found in the token JSON file. \n\n\
            You should run 'expense auth' (without the --verify flag).",
        )
        .pub_result(ErrorType::Auth)?;
    token_provider
        .refresh()
        .await
        .context("Unable to refresh the token")
        .pub_result(ErrorType::Auth)?;
    Ok("Your OAuth token is valid!".into())
}
