//! # qq-connect
//!
//! Thin client for the QQ Connect (QQ互联) OAuth login flow:
//! - Authorization URL construction with an anti-replay `state` parameter
//! - Authorization-code exchange and token refresh
//! - Openid resolution and profile retrieval
//!
//! The `state` parameter is a stateless, self-verifying token: a checksummed,
//! timestamped nonce that expires on its own, so no server-side session store
//! is needed (see [`oauth::state`]).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qq_connect::{Config, QqOAuthClient};
//!
//! let client = QqOAuthClient::new(Config::new(appid, appkey, redirect_uri))?;
//! let request = client.authorization_url();
//! // redirect the user to request.url; then, in the callback:
//! let tokens = client.exchange_code(&code, &state).await?;
//! let identity = client.resolve_identity(&tokens.access_token).await?;
//! let profile = client
//!     .fetch_profile(&tokens.access_token, &identity.client_id, &identity.openid)
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod oauth;

// Re-export commonly used types
pub use config::{Config, QqOAuthUrls};
pub use error::{Error, ErrorKind};
pub use oauth::{AuthorizationRequest, Identity, QqOAuthClient, TokenSet, UserProfile};
