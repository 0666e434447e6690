//! Signed access and refresh tokens.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use pollhub_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which half of a token pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer token.
    Access,
    /// Long-lived token exchanged for a new pair.
    Refresh,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub sub: String,
    pub typ: TokenKind,
    /// Unique per token, so two tokens issued in the same second differ.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A signed token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a token failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFailure {
    Expired,
    Invalid,
}

/// HS256 token encoder and decoder.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    id_gen: IdGenerator,
}

impl TokenCodec {
    /// Create a codec from a shared secret and lifetimes in seconds.
    #[must_use]
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a codec from the `auth` config section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    /// Sign a token of `kind` for `user_id`, valid from `now`.
    pub fn issue(
        &self,
        user_id: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedToken> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let expires_at = now + ttl;

        let claims = Claims {
            user_id: user_id.to_string(),
            sub: user_id.to_string(),
            typ: kind,
            jti: self.id_gen.generate(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, expiry and kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenFailure> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenFailure::Expired,
                _ => TokenFailure::Invalid,
            }
        })?;

        let claims = data.claims;
        if claims.typ != expected || claims.sub != claims.user_id {
            return Err(TokenFailure::Invalid);
        }
        Ok(claims)
    }
}

/// Digest stored in place of a refresh token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", 900, 604_800)
    }

    #[test]
    fn test_issue_and_decode() {
        let codec = codec();
        let now = Utc::now();
        let issued = codec.issue("u1", TokenKind::Access, now).unwrap();

        assert_eq!(issued.expires_at.timestamp(), now.timestamp() + 900);

        let claims = codec.decode(&issued.token, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let codec = codec();
        let refresh = codec.issue("u1", TokenKind::Refresh, Utc::now()).unwrap();
        assert_eq!(
            codec.decode(&refresh.token, TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let issued = codec
            .issue("u1", TokenKind::Access, Utc::now() - Duration::hours(1))
            .unwrap();
        assert_eq!(
            codec.decode(&issued.token, TokenKind::Access),
            Err(TokenFailure::Expired)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let issued = codec().issue("u1", TokenKind::Access, Utc::now()).unwrap();
        let other = TokenCodec::new("other-secret", 900, 604_800);
        assert_eq!(
            other.decode(&issued.token, TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
        assert_eq!(
            other.decode("not.a.token", TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
    }

    #[test]
    fn test_tokens_are_unique_within_a_second() {
        let codec = codec();
        let now = Utc::now();
        let a = codec.issue("u1", TokenKind::Refresh, now).unwrap();
        let b = codec.issue("u1", TokenKind::Refresh, now).unwrap();
        assert_ne!(a.token, b.token);
        assert_ne!(hash_token(&a.token), hash_token(&b.token));
    }
}
