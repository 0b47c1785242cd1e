/// Token Authority: signs and verifies access and refresh tokens.
///
/// Tokens are RS256 JWTs carrying `sub` (user id), `jti` (token id), `iat`,
/// `nbf` and `exp`. This module knows nothing about revocation; whether a
/// token id is still alive is decided by the session cache.
///
/// ## Security Design
///
/// - **RS256 ONLY**: tokens whose header names any other algorithm are rejected
/// - **Explicit keys**: callers pass the `KeyPair` for every call, so access and
///   refresh tokens are signed with distinct keys and never share a global
/// - **Zero leeway**: expiry and not-before are checked against the exact clock
///
/// ## Usage
///
/// ```rust,no_run
/// use crypto_core::jwt::{issue_token, verify_token, KeyPair};
/// use std::time::Duration;
/// use uuid::Uuid;
///
/// # fn main() -> Result<(), crypto_core::jwt::TokenError> {
/// let keys = KeyPair::from_encoded(
///     &std::env::var("ACCESS_TOKEN_PRIVATE_KEY").unwrap_or_default(),
///     &std::env::var("ACCESS_TOKEN_PUBLIC_KEY").unwrap_or_default(),
/// )?;
///
/// let issued = issue_token(Uuid::new_v4(), Duration::from_secs(900), &keys)?;
/// let verified = verify_token(&issued.token, &keys)?;
/// assert_eq!(verified.token_id, issued.token_id);
/// # Ok(())
/// # }
/// ```
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// The only algorithm accepted for signing and verification
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::RS256;

const PEM_PREFIX: &str = "-----BEGIN";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Key material could not be decoded or parsed
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The claims could not be signed (missing private key, encoder failure)
    #[error("token signing failed: {0}")]
    Signing(String),

    /// The token is past its `exp`
    #[error("token has expired")]
    Expired,

    /// Bad signature, wrong algorithm, or malformed claims
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidToken("unexpected signing algorithm".to_string())
            }
            _ => TokenError::InvalidToken(err.to_string()),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Claim set carried by every token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Output of a successful signing call
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Claims extracted from a token whose signature and lifetime checked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub token_id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Key Material
// ============================================================================

/// An RSA key pair used for one token kind.
///
/// A pair built with [`KeyPair::verification_only`] can verify but not sign.
#[derive(Clone)]
pub struct KeyPair {
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
}

impl KeyPair {
    /// Build from PEM strings
    ///
    /// ## Arguments
    ///
    /// * `private_key_pem` - RSA private key (PKCS#1 or PKCS#8)
    /// * `public_key_pem` - matching RSA public key
    pub fn from_pem(private_key_pem: &str, public_key_pem: &str) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("failed to parse RSA private key: {e}")))?;

        Ok(Self {
            encoding: Some(encoding),
            decoding: parse_public_key(public_key_pem)?,
        })
    }

    /// Build from configuration values, which are base64-encoded PEM.
    ///
    /// Raw PEM is accepted as well so local `.env` files can hold keys directly.
    pub fn from_encoded(private_key: &str, public_key: &str) -> Result<Self, TokenError> {
        let private_pem = decode_key_material(private_key)?;
        let public_pem = decode_key_material(public_key)?;
        Self::from_pem(&private_pem, &public_pem)
    }

    /// Build a pair for services that only validate tokens
    pub fn verification_only(public_key_pem: &str) -> Result<Self, TokenError> {
        Ok(Self {
            encoding: None,
            decoding: parse_public_key(public_key_pem)?,
        })
    }

    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn parse_public_key(public_key_pem: &str) -> Result<DecodingKey, TokenError> {
    DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
        .map_err(|e| TokenError::InvalidKey(format!("failed to parse RSA public key: {e}")))
}

fn decode_key_material(value: &str) -> Result<String, TokenError> {
    let trimmed = value.trim();
    if trimmed.starts_with(PEM_PREFIX) {
        return Ok(trimmed.to_string());
    }

    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| TokenError::InvalidKey(format!("key is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TokenError::InvalidKey(format!("decoded key is not UTF-8 PEM: {e}")))
}

// ============================================================================
// Token Generation
// ============================================================================

/// Sign a token for `user_id` with a freshly generated random token id
///
/// ## Returns
///
/// The signed token, its id and its absolute expiry
///
/// ## Errors
///
/// `TokenError::Signing` if `keys` cannot sign or the encoder fails
pub fn issue_token(user_id: Uuid, ttl: Duration, keys: &KeyPair) -> Result<IssuedToken, TokenError> {
    issue_token_with_id(user_id, Uuid::new_v4().to_string(), ttl, keys)
}

/// Sign a token with a caller-chosen token id.
///
/// Used for refresh tokens, whose id is derived from the paired access token id.
pub fn issue_token_with_id(
    user_id: Uuid,
    token_id: String,
    ttl: Duration,
    keys: &KeyPair,
) -> Result<IssuedToken, TokenError> {
    let encoding_key = keys
        .encoding
        .as_ref()
        .ok_or_else(|| TokenError::Signing("key pair has no private key".to_string()))?;

    let ttl_secs = i64::try_from(ttl.as_secs())
        .map_err(|_| TokenError::Signing("token lifetime out of range".to_string()))?;
    let now = Utc::now().timestamp();
    let exp = now
        .checked_add(ttl_secs)
        .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))?;
    let expires_at =
        timestamp_to_datetime(exp).map_err(|e| TokenError::Signing(e.to_string()))?;

    let claims = Claims {
        sub: user_id.to_string(),
        jti: token_id,
        iat: now,
        nbf: now,
        exp,
    };

    let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, encoding_key)
        .map_err(|e| TokenError::Signing(e.to_string()))?;

    Ok(IssuedToken {
        token,
        token_id: claims.jti,
        expires_at,
    })
}

// ============================================================================
// Token Validation
// ============================================================================

/// Verify signature, algorithm and lifetime, then extract the token id and subject.
///
/// ## Errors
///
/// - `TokenError::Expired` when `exp` has passed
/// - `TokenError::InvalidToken` for a bad signature, a non-RS256 header, a
///   not-yet-valid token, missing claims or a subject that is not a UUID
pub fn verify_token(token: &str, keys: &KeyPair) -> Result<VerifiedToken, TokenError> {
    let data = decode::<Claims>(token, &keys.decoding, &strict_validation())?;
    let claims = data.claims;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| TokenError::InvalidToken(format!("subject is not a user id: {e}")))?;

    if claims.jti.is_empty() {
        return Err(TokenError::InvalidToken("token id is empty".to_string()));
    }

    Ok(VerifiedToken {
        token_id: claims.jti,
        user_id,
        expires_at: timestamp_to_datetime(claims.exp)?,
    })
}

fn strict_validation() -> Validation {
    let mut validation = Validation::new(TOKEN_ALGORITHM);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "nbf", "sub"]);
    validation
}

fn timestamp_to_datetime(ts: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| TokenError::InvalidToken(format!("timestamp {ts} out of range")))
}
