//! Token and identity types returned by the QQ Connect endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Tokens from a code exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenSet {
    /// Access token for subsequent API requests.
    pub access_token: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    /// Refresh token; QQ Connect refresh tokens are single-use.
    pub refresh_token: String,
}

impl TokenSet {
    /// Check if the access token has passed its absolute expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// The authenticated user within the application's namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Application identifier the openid is scoped to.
    pub client_id: String,
    /// Opaque per-application user identifier.
    pub openid: String,
}

/// Profile fields from the user-info endpoint, returned verbatim.
///
/// Well-known fields get their own members; everything else the provider
/// sends lands in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    /// Provider status code; zero means success.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub ret: Option<i64>,
    /// Provider error message, present on failure.
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub figureurl: Option<String>,
    #[serde(default)]
    pub figureurl_qq_1: Option<String>,
    #[serde(default)]
    pub figureurl_qq_2: Option<String>,
    /// Remaining provider-defined fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// QQ Connect renders some numeric fields as JSON strings depending on the
/// endpoint version; accept either form.
pub(crate) fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as DeError;
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| DeError::custom("expected an integer")),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| DeError::custom("expected a numeric string")),
        Some(other) => Err(DeError::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_not_expired() {
        let tokens = TokenSet {
            access_token: "test".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
            refresh_token: "refresh".to_string(),
        };
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_token_expired() {
        let tokens = TokenSet {
            access_token: "test".to_string(),
            expires_at: Utc::now() - Duration::hours(1),
            refresh_token: "refresh".to_string(),
        };
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_profile_flattens_unknown_fields() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"ret":0,"nickname":"Peter","gender":"男","vip":"1","level":"7"}"#,
        )
        .unwrap();
        assert_eq!(profile.ret, Some(0));
        assert_eq!(profile.nickname.as_deref(), Some("Peter"));
        assert_eq!(profile.extra["vip"], "1");
        assert_eq!(profile.extra["level"], "7");
    }

    #[test]
    fn test_profile_ret_accepts_string() {
        let profile: UserProfile = serde_json::from_str(r#"{"ret":"100030"}"#).unwrap();
        assert_eq!(profile.ret, Some(100030));
    }
}
