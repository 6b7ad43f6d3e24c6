//! Web Push protocol client
//!
//! Encrypts payloads with the `aes128gcm` content coding (RFC 8291) and
//! authorizes requests with a VAPID ES256 token (RFC 8292).

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::Sha256;

use super::{PushDelivery, PushError, PushTarget};

/// Record size advertised in the content coding header
const RECORD_SIZE: u32 = 4096;
/// Largest plaintext that fits one record (tag, delimiter and header overhead)
const MAX_PAYLOAD_LEN: usize = 3993;
const UNCOMPRESSED_POINT_LEN: usize = 65;
const VAPID_TOKEN_LIFETIME_HOURS: i64 = 12;

/// Derive the content encryption key and nonce for one message.
pub(crate) fn derive_content_keys(
    shared_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<([u8; 16], [u8; 12]), PushError> {
    let mut key_info = Vec::with_capacity(14 + ua_public.len() + as_public.len());
    key_info.extend_from_slice(b"WebPush: info\0");
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), shared_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|e| PushError::Encryption(e.to_string()))?;

    let content = Hkdf::<Sha256>::new(Some(salt), &ikm);
    let mut cek = [0u8; 16];
    content
        .expand(b"Content-Encoding: aes128gcm\0", &mut cek)
        .map_err(|e| PushError::Encryption(e.to_string()))?;
    let mut nonce = [0u8; 12];
    content
        .expand(b"Content-Encoding: nonce\0", &mut nonce)
        .map_err(|e| PushError::Encryption(e.to_string()))?;

    Ok((cek, nonce))
}

fn decode_key(value: &str, field: &str) -> Result<Vec<u8>, PushError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| PushError::InvalidSubscription(format!("{field} is not base64url: {e}")))
}

/// Encrypt `payload` for the browser identified by its `p256dh` and `auth` keys
///
/// # Returns
/// The request body: `salt || record size || key id length || sender key || ciphertext`
pub fn encrypt_payload(p256dh: &str, auth: &str, payload: &[u8]) -> Result<Vec<u8>, PushError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PushError::Encryption(format!(
            "payload of {} bytes exceeds {} bytes",
            payload.len(),
            MAX_PAYLOAD_LEN
        )));
    }

    let ua_public_bytes = decode_key(p256dh, "p256dh")?;
    let auth_secret = decode_key(auth, "auth")?;
    if auth_secret.len() != 16 {
        return Err(PushError::InvalidSubscription(format!(
            "auth must be 16 bytes, got {}",
            auth_secret.len()
        )));
    }
    let ua_public = PublicKey::from_sec1_bytes(&ua_public_bytes)
        .map_err(|_| PushError::InvalidSubscription("p256dh is not a P-256 point".to_string()))?;

    let ephemeral = SecretKey::random(&mut OsRng);
    let as_public = ephemeral.public_key().to_encoded_point(false);
    let shared = p256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), ua_public.as_affine());

    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);

    let ua_public_uncompressed = ua_public.to_encoded_point(false);
    let (cek, nonce) = derive_content_keys(
        shared.raw_secret_bytes().as_slice(),
        &auth_secret,
        ua_public_uncompressed.as_bytes(),
        as_public.as_bytes(),
        &salt,
    )?;

    let mut plaintext = Vec::with_capacity(payload.len() + 1);
    plaintext.extend_from_slice(payload);
    // Last-record delimiter
    plaintext.push(0x02);

    let cipher =
        Aes128Gcm::new_from_slice(&cek).map_err(|e| PushError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| PushError::Encryption(e.to_string()))?;

    let mut body = Vec::with_capacity(16 + 4 + 1 + UNCOMPRESSED_POINT_LEN + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(UNCOMPRESSED_POINT_LEN as u8);
    body.extend_from_slice(as_public.as_bytes());
    body.extend_from_slice(&ciphertext);
    Ok(body)
}

/// Claims of a VAPID token
#[derive(Debug, Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// VAPID application server identity
pub struct VapidSigner {
    encoding_key: EncodingKey,
    public_key: String,
    subject: String,
}

impl VapidSigner {
    /// Build a signer from a base64url 32-byte private scalar
    pub fn from_base64(private_key: &str, subject: impl Into<String>) -> Result<Self, PushError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(private_key.trim().trim_end_matches('='))
            .map_err(|e| PushError::Vapid(format!("private key is not base64url: {e}")))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| PushError::Vapid("private key is not a P-256 scalar".to_string()))?;
        let der = secret
            .to_pkcs8_der()
            .map_err(|e| PushError::Vapid(format!("private key encoding failed: {e}")))?;
        let public_key =
            URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false).as_bytes());

        Ok(Self {
            encoding_key: EncodingKey::from_ec_der(der.as_bytes()),
            public_key,
            subject: subject.into(),
        })
    }

    /// Base64url uncompressed public key, as browsers expect for `applicationServerKey`
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// `Authorization` header value for a request to `endpoint`
    pub fn authorization(&self, endpoint: &str, now: DateTime<Utc>) -> Result<String, PushError> {
        let audience = url::Url::parse(endpoint)
            .map_err(|e| PushError::InvalidSubscription(format!("endpoint is not a URL: {e}")))?
            .origin()
            .ascii_serialization();
        let claims = VapidClaims {
            aud: &audience,
            exp: (now + chrono::Duration::hours(VAPID_TOKEN_LIFETIME_HOURS)).timestamp(),
            sub: &self.subject,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &self.encoding_key)
            .map_err(|e| PushError::Vapid(e.to_string()))?;
        Ok(format!("vapid t={}, k={}", token, self.public_key))
    }
}

/// HTTP Web Push client
pub struct WebPushClient {
    http_client: Arc<reqwest::Client>,
    vapid: VapidSigner,
    ttl_seconds: u32,
}

impl WebPushClient {
    pub fn new(http_client: Arc<reqwest::Client>, vapid: VapidSigner, ttl_seconds: u32) -> Self {
        Self {
            http_client,
            vapid,
            ttl_seconds,
        }
    }

    pub fn public_key(&self) -> &str {
        self.vapid.public_key()
    }
}

#[async_trait]
impl PushDelivery for WebPushClient {
    async fn send(&self, target: &PushTarget, payload: &[u8]) -> Result<(), PushError> {
        // 1. Encrypt for this browser
        let body = encrypt_payload(&target.p256dh, &target.auth, payload)?;

        // 2. Authorize against the push service origin
        let authorization = self.vapid.authorization(&target.endpoint, Utc::now())?;

        // 3. POST to the push service
        let response = self
            .http_client
            .post(&target.endpoint)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Content-Encoding", "aes128gcm")
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", "normal")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await?;

        // 4. Handle response
        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = %target.endpoint, status = status.as_u16(), "Push delivered");
            return Ok(());
        }

        match status {
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE => {
                Err(PushError::Expired(status.as_u16()))
            }
            _ => Err(PushError::Rejected(status.as_u16())),
        }
    }
}
