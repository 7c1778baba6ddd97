//! OAuth 2.0 for the Google Sheets API.
//!
//! `TokenProvider` owns the cached token file and knows how to refresh it. The interactive consent
//! flow, which opens a browser and receives the authorization code on a loopback HTTP server, is
//! only run by `TokenProvider::initialize`.

use crate::api::files::{File, SecretFile, TokenFile};
use crate::api::{Credentials, OAUTH_SCOPES};
use crate::error::Res;
use anyhow::{bail, Context};
use chrono::Utc;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The OAuth client type once the authorization and token endpoints have been set.
type OAuthClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Used when Google omits `expires_in`, which it does not normally do.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Provides valid access tokens for the Sheets API, refreshing and persisting them as needed.
pub(crate) struct TokenProvider {
    client: OAuthClient,
    http: reqwest::Client,
    token: File<TokenFile>,
}

impl TokenProvider {
    /// Runs the interactive consent flow and saves the resulting tokens to `token_path`.
    ///
    /// This is the only place where a browser is involved. It:
    /// 1. Loads the OAuth client credentials from `secret_path`
    /// 2. Starts a one-shot HTTP server on an ephemeral loopback port
    /// 3. Prints the Google consent URL for the user to open
    /// 4. Waits for the redirect carrying the authorization code
    /// 5. Exchanges the code for access and refresh tokens and saves them
    pub(crate) async fn initialize(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Res<Self> {
        let secret_path = secret_path.into();
        info!("Loading OAuth credentials from {}", secret_path.display());
        let secret = SecretFile::load(&secret_path).await?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback server")?;
        let port = listener
            .local_addr()
            .context("Unable to read the OAuth callback server address")?
            .port();
        let redirect = format!("http://localhost:{port}");
        let client = oauth_client(&secret)?.set_redirect_uri(
            RedirectUrl::new(redirect.clone()).context("Invalid OAuth redirect URL")?,
        );

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut auth_request = client.authorize_url(CsrfToken::new_random);
        for scope in OAUTH_SCOPES {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }
        let (auth_url, csrf) = auth_request
            // Ask for a refresh token every time so the cached file is always refreshable.
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        info!("Open this URL in your browser to authorize access to your sheet:\n\n{auth_url}\n");
        info!("Waiting for the authorization callback on {redirect}");
        let code = receive_code(listener, csrf.secret().to_string()).await?;

        let http = http_client()?;
        let response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http)
            .await
            .context("Failed to exchange the authorization code for tokens")?;

        let refresh_token = response
            .refresh_token()
            .context("Google did not return a refresh token")?
            .secret()
            .to_string();
        let token = TokenFile::new(
            granted_scopes(&response),
            response.access_token().secret().to_string(),
            refresh_token,
            expires_at(&response),
        );
        let token = File::new(token_path, token);
        token.save().await?;
        info!("Authorization successful, tokens saved to {}", token.path().display());

        Ok(Self {
            client,
            http,
            token,
        })
    }

    /// Loads previously saved tokens. Never opens a browser.
    pub(crate) async fn load(
        secret_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
    ) -> Res<Self> {
        let secret_path = secret_path.into();
        let secret = SecretFile::load(&secret_path).await?;
        let token: File<TokenFile> = File::load(token_path)
            .await
            .context("Unable to load the OAuth token file")?;
        token.data().validate_scopes()?;
        debug!("Loaded OAuth token valid until {}", token.data().expires_at());
        Ok(Self {
            client: oauth_client(&secret)?,
            http: http_client()?,
            token,
        })
    }
}

#[async_trait::async_trait]
impl Credentials for TokenProvider {
    async fn token_with_refresh(&mut self) -> Res<String> {
        if self.token.data().is_expired() {
            debug!("Access token is expired or about to expire, refreshing");
            self.refresh().await?;
        }
        Ok(self.token.data().access_token().to_string())
    }

    async fn refresh(&mut self) -> Res<()> {
        let refresh_token = RefreshToken::new(self.token.data().refresh_token().to_string());
        let response = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .context("Failed to refresh the OAuth access token")?;
        self.token.data_mut().update(
            response.access_token().secret().to_string(),
            expires_at(&response),
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        self.persist().await?;
        debug!(
            "Refreshed access token, valid until {}",
            self.token.data().expires_at()
        );
        Ok(())
    }

    async fn persist(&self) -> Res<()> {
        self.token
            .save()
            .await
            .context("Unable to save the refreshed OAuth token")
    }
}

fn oauth_client(secret: &SecretFile) -> Res<OAuthClient> {
    Ok(BasicClient::new(ClientId::new(secret.client_id().to_string()))
        .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
        .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string()).context("Invalid auth_uri")?)
        .set_token_uri(TokenUrl::new(secret.token_uri().to_string()).context("Invalid token_uri")?))
}

/// OAuth token endpoints must not be followed through redirects.
fn http_client() -> Res<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the OAuth HTTP client")
}

fn expires_at(response: &BasicTokenResponse) -> chrono::DateTime<Utc> {
    let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
    let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::hours(1));
    Utc::now() + lifetime
}

fn granted_scopes(response: &BasicTokenResponse) -> Vec<String> {
    match response.scopes() {
        Some(scopes) => scopes.iter().map(|s| s.to_string()).collect(),
        None => OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Serves loopback connections until one of them carries the OAuth redirect, then returns the
/// authorization code from it.
async fn receive_code(listener: TcpListener, expected_state: String) -> Res<String> {
    let (tx, mut rx) = mpsc::channel::<Res<String>>(1);
    loop {
        let (stream, _) = listener
            .accept()
            .await
            .context("The OAuth callback server failed to accept a connection")?;
        let tx = tx.clone();
        let expected_state = expected_state.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let tx = tx.clone();
            let outcome = parse_callback(req.uri().query(), &expected_state);
            async move {
                let response = match outcome {
                    None => Response::builder()
                        .status(StatusCode::NOT_FOUND)
                        .body(String::new()),
                    Some(outcome) => {
                        let body = match &outcome {
                            Ok(_) => "Authorization complete. You can close this window.",
                            Err(_) => "Authorization failed. Check the terminal for details.",
                        };
                        let _ = tx.send(outcome).await;
                        Response::builder().body(body.to_string())
                    }
                };
                Ok::<_, Infallible>(response.unwrap_or_default())
            }
        });
        if let Err(e) = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service)
            .await
        {
            warn!("OAuth callback connection error: {e}");
        }
        if let Ok(outcome) = rx.try_recv() {
            return outcome;
        }
    }
}

/// Returns `None` when the request is not an OAuth redirect (e.g. a favicon request).
fn parse_callback(query: Option<&str>, expected_state: &str) -> Option<Res<String>> {
    let query = query?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Some(Err(anyhow::anyhow!("Authorization was denied: {error}")));
    }
    let code = code?;
    Some(match state {
        Some(state) if state == expected_state => Ok(code),
        _ => {
            let message = "The OAuth callback state did not match, refusing the authorization code";
            Err(anyhow::anyhow!(message))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_code() {
        let code = parse_callback(Some("state=abc&code=4%2F0Ab&scope=x"), "abc")
            .unwrap()
            .unwrap();
        assert_eq!(code, "4/0Ab");
    }

    #[test]
    fn test_parse_callback_state_mismatch() {
        let outcome = parse_callback(Some("state=evil&code=123"), "abc").unwrap();
        assert!(outcome.unwrap_err().to_string().contains("state did not match"));
    }

    #[test]
    fn test_parse_callback_denied() {
        let outcome = parse_callback(Some("error=access_denied&state=abc"), "abc").unwrap();
        assert!(outcome.unwrap_err().to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_not_a_redirect() {
        assert!(parse_callback(None, "abc").is_none());
        assert!(parse_callback(Some("foo=bar"), "abc").is_none());
    }
}
