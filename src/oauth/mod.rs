//! QQ Connect OAuth flow: client, state-token codec, and token types.

mod client;
mod token;

pub mod state;

pub use client::{AuthorizationRequest, QqOAuthClient};
pub use token::{Identity, TokenSet, UserProfile};
