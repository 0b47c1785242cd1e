/// Integration tests for the token authority
///
/// This test module covers:
/// - Issue/verify round trips with distinct access and refresh key pairs
/// - Expiry and not-before enforcement
/// - Algorithm substitution and tampering rejection
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use crypto_core::jwt::{
    issue_token, issue_token_with_id, verify_token, Claims, KeyPair, TokenError,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::time::Duration;
use uuid::Uuid;

// Test RSA key pairs - FOR TESTING ONLY
const ACCESS_PRIVATE_KEY: &str = include_str!("fixtures/access_private.pem");
const ACCESS_PUBLIC_KEY: &str = include_str!("fixtures/access_public.pem");
const REFRESH_PRIVATE_KEY: &str = include_str!("fixtures/refresh_private.pem");
const REFRESH_PUBLIC_KEY: &str = include_str!("fixtures/refresh_public.pem");

fn access_keys() -> KeyPair {
    KeyPair::from_pem(ACCESS_PRIVATE_KEY, ACCESS_PUBLIC_KEY).expect("access keys")
}

fn refresh_keys() -> KeyPair {
    KeyPair::from_pem(REFRESH_PRIVATE_KEY, REFRESH_PUBLIC_KEY).expect("refresh keys")
}

fn sign_raw(claims: &Claims) -> String {
    let key = EncodingKey::from_rsa_pem(ACCESS_PRIVATE_KEY.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

#[test]
fn test_round_trip_returns_subject_and_token_id() {
    let keys = access_keys();
    let user_id = Uuid::new_v4();

    let issued = issue_token(user_id, Duration::from_secs(300), &keys).unwrap();
    let verified = verify_token(&issued.token, &keys).unwrap();

    assert_eq!(verified.user_id, user_id);
    assert_eq!(verified.token_id, issued.token_id);
    assert_eq!(verified.expires_at, issued.expires_at);
}

#[test]
fn test_access_token_is_rejected_by_refresh_keys() {
    let issued = issue_token(Uuid::new_v4(), Duration::from_secs(300), &access_keys()).unwrap();

    let result = verify_token(&issued.token, &refresh_keys());
    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}

#[test]
fn test_refresh_token_with_derived_id() {
    let keys = refresh_keys();
    let user_id = Uuid::new_v4();
    let derived = format!("{}++{}", Uuid::new_v4(), user_id);

    let issued =
        issue_token_with_id(user_id, derived.clone(), Duration::from_secs(3600), &keys).unwrap();
    let verified = verify_token(&issued.token, &keys).unwrap();

    assert_eq!(verified.token_id, derived);
}

#[test]
fn test_expired_token_is_rejected() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now - 120,
        nbf: now - 120,
        exp: now - 60,
    };

    let result = verify_token(&sign_raw(&claims), &access_keys());
    assert!(matches!(result, Err(TokenError::Expired)));
}

#[test]
fn test_not_yet_valid_token_is_rejected() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        nbf: now + 600,
        exp: now + 1200,
    };

    let result = verify_token(&sign_raw(&claims), &access_keys());
    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}

#[test]
fn test_non_uuid_subject_is_rejected() {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "42".to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        nbf: now,
        exp: now + 600,
    };

    let result = verify_token(&sign_raw(&claims), &access_keys());
    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}

#[test]
fn test_hs256_token_signed_with_public_key_is_rejected() {
    // Classic confusion attack: use the public key bytes as an HMAC secret.
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        nbf: now,
        exp: now + 600,
    };
    let forged = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(ACCESS_PUBLIC_KEY.as_bytes()),
    )
    .unwrap();

    let result = verify_token(&forged, &access_keys());
    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let keys = access_keys();
    let issued = issue_token(Uuid::new_v4(), Duration::from_secs(300), &keys).unwrap();
    let parts: Vec<&str> = issued.token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
    let mut claims: Claims = serde_json::from_slice(&payload).unwrap();
    claims.sub = Uuid::new_v4().to_string();
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    let result = verify_token(&forged, &keys);
    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}
