//! Raw OAuth 2.0 calls against the authorization server.
//!
//! These functions only speak HTTP. Token persistence and state transitions
//! belong to [`crate::spotify::auth::AuthSession`].

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::{
    config::OAuthConfig,
    error::{Error, Result},
    types::Token,
};

/// Builds the authorization URL the user agent is sent to.
///
/// The `code_challenge` is derived from the verifier with SHA-256; the
/// verifier itself never appears here and is only sent later, inside the
/// code exchange.
///
/// # Errors
///
/// Returns [`Error::AuthExchange`] if the configured authorization endpoint
/// is not a valid URL.
pub fn authorization_url(config: &OAuthConfig, code_challenge: &str, state: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &config.auth_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_challenge", code_challenge),
            ("code_challenge_method", "S256"),
            ("scope", config.scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| Error::AuthExchange(format!("invalid authorization endpoint: {}", e)))?;

    Ok(url.into())
}

/// Exchanges an authorization code for an access token using PKCE.
///
/// Completes the OAuth 2.0 PKCE flow by exchanging the authorization code
/// received from the callback for an access token. The code verifier proves
/// that the same client that initiated the auth flow is completing it.
///
/// # Errors
///
/// - [`Error::Network`] when the token endpoint cannot be reached
/// - [`Error::AuthExchange`] when the server rejects the code or verifier
/// - [`Error::Decode`] when the response is not a token document
pub async fn exchange_code_pkce(
    client: &Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<Token> {
    let res = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    read_token(res).await
}

/// Refreshes an expired access token using a refresh token.
///
/// The returned token carries a `refresh_token` only when the server rotated
/// it; callers must keep the old one otherwise.
///
/// # Errors
///
/// Same as [`exchange_code_pkce`]; a revoked refresh token surfaces as
/// [`Error::AuthExchange`].
pub async fn refresh_token(client: &Client, config: &OAuthConfig, refresh_token: &str) -> Result<Token> {
    let res = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
        ])
        .send()
        .await?;

    read_token(res).await
}

async fn read_token(res: reqwest::Response) -> Result<Token> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(Error::AuthExchange(format!("{}: {}", status, body.trim())));
    }

    let token: Token = serde_json::from_str(&body)?;
    if token.access_token.is_empty() {
        return Err(Error::AuthExchange(
            "token response did not contain an access token".to_string(),
        ));
    }
    debug!(rotated = token.refresh_token.is_some(), "token grant succeeded");
    Ok(token)
}
