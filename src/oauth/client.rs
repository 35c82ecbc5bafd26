//! QQ Connect OAuth client.
//!
//! Drives the three-legged login flow against the QQ Connect (QQ互联) API:
//! authorize URL, authorization-code exchange, token refresh, openid lookup,
//! and profile fetch. The `state` parameter is the stateless anti-replay
//! token from [`super::state`].

use chrono::{Duration, Utc};
use log::*;
use serde::Deserialize;

use super::state;
use super::token::{de_opt_i64, Identity, TokenSet, UserProfile};
use crate::config::Config;
use crate::error::{oauth_error, Error, ErrorKind, OAuthErrorKind};

/// Freshness window for the state parameter during code exchange, in seconds.
const STATE_TIMEOUT_SECS: i64 = 600;

/// Authorization URL plus the state token embedded in it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL to redirect the end user to.
    pub url: String,
    /// State token carried in the URL, returned to the callback.
    pub state: String,
}

/// Raw token-endpoint response; error and success fields share one body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    code: Option<i64>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Raw openid-endpoint response.
#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    openid: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64")]
    code: Option<i64>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the QQ Connect login flow.
pub struct QqOAuthClient {
    client: reqwest::Client,
    config: Config,
}

impl QqOAuthClient {
    /// Create a new client from application credentials.
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if config.danger_accept_invalid_certs {
            warn!("TLS certificate verification disabled for QQ Connect endpoints");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Build the authorization URL the end user is redirected to.
    ///
    /// Generates a fresh state token; the caller passes the provider's
    /// callback parameters back to [`exchange_code`](Self::exchange_code).
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = state::generate();
        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.config.urls.authorize_url,
            urlencoding::encode(&self.config.app_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&state)
        );

        AuthorizationRequest { url, state }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The state returned by the provider callback must validate against a
    /// 600-second freshness window before any network call is made; a state
    /// failure is returned as-is.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<TokenSet, Error> {
        state::validate(state, STATE_TIMEOUT_SECS)?;

        debug!("Exchanging QQ Connect authorization code for tokens");

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_key.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("fmt", "json"),
        ];
        let body = self.get_text(&self.config.urls.token_url, &params).await?;
        let tokens = self.parse_token_response(&body)?;
        info!("Successfully exchanged QQ Connect authorization code for tokens");
        Ok(tokens)
    }

    /// Obtain fresh tokens from a refresh token.
    ///
    /// No state validation happens on this path: possession of a valid
    /// refresh token is the credential. QQ Connect refresh tokens are
    /// single-use; keep the one in the returned set.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, Error> {
        debug!("Refreshing QQ Connect access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_key.as_str()),
            ("refresh_token", refresh_token),
            ("fmt", "json"),
        ];
        let body = self.get_text(&self.config.urls.token_url, &params).await?;
        let tokens = self.parse_token_response(&body)?;
        info!("Successfully refreshed QQ Connect access token");
        Ok(tokens)
    }

    /// Resolve the openid of the user behind an access token.
    pub async fn resolve_identity(&self, access_token: &str) -> Result<Identity, Error> {
        let params = [("access_token", access_token), ("fmt", "json")];
        let body = self.get_text(&self.config.urls.me_url, &params).await?;
        let data: MeResponse = parse_json(&body, "openid endpoint")?;

        if data.code.unwrap_or(0) != 0 || has_text(&data.error_description) {
            warn!("QQ Connect openid lookup error: {:?}", data.error_description);
            return Err(oauth_error(
                OAuthErrorKind::ProviderError,
                "openid endpoint returned an error",
            ));
        }

        let client_id = non_empty(data.client_id)
            .ok_or_else(|| oauth_error(OAuthErrorKind::MalformedResponse, "missing client_id"))?;
        let openid = non_empty(data.openid)
            .ok_or_else(|| oauth_error(OAuthErrorKind::MalformedResponse, "missing openid"))?;

        Ok(Identity { client_id, openid })
    }

    /// Fetch the user's profile fields.
    ///
    /// `client_id` and `openid` come from [`resolve_identity`](Self::resolve_identity).
    pub async fn fetch_profile(
        &self,
        access_token: &str,
        client_id: &str,
        openid: &str,
    ) -> Result<UserProfile, Error> {
        let params = [
            ("access_token", access_token),
            ("oauth_consumer_key", client_id),
            ("openid", openid),
        ];
        let body = self
            .get_text(&self.config.urls.user_info_url, &params)
            .await?;
        let profile: UserProfile = parse_json(&body, "profile endpoint")?;

        match profile.ret {
            None => Err(oauth_error(
                OAuthErrorKind::MalformedResponse,
                "profile response carries no ret field",
            )),
            Some(ret) if ret != 0 || has_text(&profile.msg) => {
                warn!("QQ Connect profile error: ret={}, msg={:?}", ret, profile.msg);
                Err(oauth_error(
                    OAuthErrorKind::ProviderError,
                    "profile endpoint returned an error",
                ))
            }
            Some(_) => Ok(profile),
        }
    }

    fn parse_token_response(&self, body: &str) -> Result<TokenSet, Error> {
        let data: TokenResponse = parse_json(body, "token endpoint")?;

        if data.code.unwrap_or(0) != 0 || has_text(&data.error_description) {
            warn!("QQ Connect token endpoint error: {:?}", data.error_description);
            return Err(oauth_error(
                OAuthErrorKind::ProviderError,
                "token endpoint returned an error",
            ));
        }

        let access_token = non_empty(data.access_token)
            .ok_or_else(|| oauth_error(OAuthErrorKind::MalformedResponse, "missing access_token"))?;
        let expires_in = data
            .expires_in
            .filter(|secs| *secs != 0)
            .ok_or_else(|| oauth_error(OAuthErrorKind::MalformedResponse, "missing expires_in"))?;
        let refresh_token = non_empty(data.refresh_token)
            .ok_or_else(|| oauth_error(OAuthErrorKind::MalformedResponse, "missing refresh_token"))?;
        let ttl = Duration::try_seconds(expires_in).ok_or_else(|| {
            oauth_error(OAuthErrorKind::MalformedResponse, "expires_in out of range")
        })?;

        Ok(TokenSet {
            access_token,
            expires_at: Utc::now() + ttl,
            refresh_token,
        })
    }

    /// Plain GET with query parameters, body returned as text.
    ///
    /// The provider signals failures inside the body, so the HTTP status is
    /// not inspected here.
    async fn get_text(&self, url: &str, params: &[(&str, &str)]) -> Result<String, Error> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                warn!("QQ Connect request to {} failed: {:?}", url, e);
                Error::from(e)
            })?;

        Ok(response.text().await?)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str, what: &str) -> Result<T, Error> {
    if body.trim().is_empty() {
        return Err(oauth_error(
            OAuthErrorKind::MalformedResponse,
            &format!("empty response from {}", what),
        ));
    }
    serde_json::from_str(body).map_err(|e| {
        warn!("Failed to parse {} response: {:?}", what, e);
        Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::OAuth(OAuthErrorKind::MalformedResponse),
        }
    })
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}
