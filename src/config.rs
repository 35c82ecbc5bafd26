//! Client configuration: application credentials and provider endpoints.

/// QQ Connect endpoint URLs.
///
/// Configurable so tests can point the client at a local mock server.
#[derive(Debug, Clone)]
pub struct QqOAuthUrls {
    /// Authorization page the end user is redirected to.
    pub authorize_url: String,
    /// Token endpoint (code exchange and refresh).
    pub token_url: String,
    /// OpenID lookup endpoint.
    pub me_url: String,
    /// Profile endpoint.
    pub user_info_url: String,
}

impl Default for QqOAuthUrls {
    fn default() -> Self {
        Self {
            authorize_url: "https://graph.qq.com/oauth2.0/authorize".to_string(),
            token_url: "https://graph.qq.com/oauth2.0/token".to_string(),
            me_url: "https://graph.qq.com/oauth2.0/me".to_string(),
            user_info_url: "https://graph.qq.com/user/get_user_info".to_string(),
        }
    }
}

/// Application credentials and transport settings.
///
/// Supplied by the embedding application at construction; never mutated by
/// this crate.
#[derive(Debug, Clone)]
pub struct Config {
    /// QQ Connect APPID (the OAuth client_id).
    pub app_id: String,
    /// QQ Connect APPKEY (the OAuth client_secret).
    pub app_key: String,
    /// Registered callback URL.
    pub redirect_uri: String,
    /// Skip TLS certificate verification on outbound calls.
    ///
    /// The upstream graph.qq.com endpoints have historically served
    /// certificate chains some trust stores reject. Off by default; turning
    /// it on disables certificate validation for every request this client
    /// makes.
    pub danger_accept_invalid_certs: bool,
    /// Provider endpoints.
    pub urls: QqOAuthUrls,
}

impl Config {
    /// Create a configuration with default endpoints and TLS verification on.
    pub fn new(app_id: &str, app_key: &str, redirect_uri: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_key: app_key.to_string(),
            redirect_uri: redirect_uri.to_string(),
            danger_accept_invalid_certs: false,
            urls: QqOAuthUrls::default(),
        }
    }
}
