//! License token encoding and Ed25519 signature verification.
//!
//! Tokens use the format: `lg1.base64url(payload).base64url(signature)`
//!
//! The payload is a JSON object containing:
//! - `email`: subject email (lower-cased)
//! - `fp`: device fingerprint captured at issuance
//! - `iat`: issued-at timestamp (seconds since epoch)
//! - `exp`: expiry timestamp, always `iat` plus six calendar months
//!
//! The signature covers `"lg1." + payload_b64` as ASCII bytes. This crate
//! only ever holds a [`VerifyingKey`]; tokens are minted by the issuer tool.

use crate::device::DeviceFingerprint;
use crate::error::{LicenseError, LicenseResult};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Months, TimeZone, Utc};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Leading version tag of the current token layout.
pub const TOKEN_VERSION: &str = "lg1";

/// Validity window of every license, in calendar months.
pub const LICENSE_VALIDITY_MONTHS: u32 = 6;

/// How far ahead of the local clock a token's issue time may be, in seconds.
pub const ISSUE_CLOCK_SKEW_SECS: i64 = 5 * 60;

/// Embedded Ed25519 public key for production token verification (32 bytes).
const LICENSE_PUBLIC_KEY: [u8; 32] = [
    68, 6, 228, 178, 71, 241, 57, 246, 230, 74, 247, 115, 15, 222, 99, 90, 136, 234, 194, 193,
    195, 218, 72, 26, 15, 100, 1, 52, 132, 216, 88, 57,
];

/// Returns the verifying key compiled into this build.
///
/// # Errors
///
/// Returns `Config` if the embedded bytes are not a valid curve point.
pub fn embedded_verifying_key() -> LicenseResult<VerifyingKey> {
    VerifyingKey::from_bytes(&LICENSE_PUBLIC_KEY)
        .map_err(|_| LicenseError::Config("embedded verifying key is invalid".to_string()))
}

/// Parses a standard-base64 encoded 32-byte Ed25519 verifying key.
///
/// # Errors
///
/// Returns `Config` if the string is not a valid key.
pub fn verifying_key_from_base64(encoded: &str) -> LicenseResult<VerifyingKey> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LicenseError::Config(format!("verifying key base64: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| LicenseError::Config("verifying key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|_| LicenseError::Config("verifying key is not a valid point".to_string()))
}

/// Adds the license validity window to an instant.
///
/// # Errors
///
/// Returns `MalformedToken` if the result is out of range.
pub fn expiry_for(issued_at: DateTime<Utc>) -> LicenseResult<DateTime<Utc>> {
    issued_at
        .checked_add_months(Months::new(LICENSE_VALIDITY_MONTHS))
        .ok_or_else(|| LicenseError::MalformedToken("expiry out of range".to_string()))
}

/// The signed fields of a license token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseClaims {
    /// Subject email.
    pub email: String,
    /// Device fingerprint captured at issuance.
    pub fp: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiry timestamp (seconds since epoch).
    pub exp: i64,
}

impl LicenseClaims {
    /// Builds claims issued at `issued_at`, expiring six months later.
    ///
    /// Sub-second precision is dropped so the claims survive encoding intact.
    ///
    /// # Errors
    ///
    /// Returns `MalformedToken` if the expiry is out of range.
    pub fn new(
        email: impl Into<String>,
        fingerprint: &DeviceFingerprint,
        issued_at: DateTime<Utc>,
    ) -> LicenseResult<Self> {
        let iat = issued_at.timestamp();
        let exp = expiry_for(secs_to_datetime(iat)?)?.timestamp();
        Ok(Self {
            email: email.into(),
            fp: fingerprint.id().to_string(),
            iat,
            exp,
        })
    }

    /// Returns the bytes a signature must cover for these claims.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the claims cannot be encoded.
    pub fn signing_input(&self) -> LicenseResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{TOKEN_VERSION}.{}", URL_SAFE_NO_PAD.encode(json)))
    }

    fn check_window(&self) -> LicenseResult<()> {
        let expected = expiry_for(secs_to_datetime(self.iat)?)?.timestamp();
        if self.exp != expected {
            return Err(LicenseError::MalformedToken(
                "expiry does not match issuance window".to_string(),
            ));
        }
        Ok(())
    }
}

/// A signed license token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseToken {
    claims: LicenseClaims,
    signature: [u8; SIGNATURE_LENGTH],
}

impl LicenseToken {
    /// Assembles a token from claims and a signature produced over
    /// [`LicenseClaims::signing_input`].
    pub fn from_parts(claims: LicenseClaims, signature: Signature) -> Self {
        Self {
            claims,
            signature: signature.to_bytes(),
        }
    }

    /// Serializes the token to its versioned text form.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the claims cannot be encoded.
    pub fn encode(&self) -> LicenseResult<String> {
        let input = self.claims.signing_input()?;
        Ok(format!("{input}.{}", URL_SAFE_NO_PAD.encode(self.signature)))
    }

    /// Decodes and verifies a token using the embedded public key.
    ///
    /// # Errors
    ///
    /// See [`decode_with_key`](Self::decode_with_key).
    pub fn decode(bytes: &[u8]) -> LicenseResult<Self> {
        Self::decode_with_key(bytes, &embedded_verifying_key()?)
    }

    /// Decodes and verifies a token using `key`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedToken` on structural corruption or an unknown version
    /// tag, and `SignatureInvalid` if the signature does not verify.
    pub fn decode_with_key(bytes: &[u8], key: &VerifyingKey) -> LicenseResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| LicenseError::MalformedToken("token is not UTF-8".to_string()))?
            .trim();

        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() != 3 {
            return Err(LicenseError::MalformedToken(
                "token must have exactly three dot-separated parts".to_string(),
            ));
        }
        let (version, payload_b64, signature_b64) = (parts[0], parts[1], parts[2]);

        if version != TOKEN_VERSION {
            return Err(LicenseError::MalformedToken(format!(
                "unsupported token version {version:?}"
            )));
        }

        let sig_bytes = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
            LicenseError::MalformedToken(format!("invalid signature base64: {e}"))
        })?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| LicenseError::MalformedToken("invalid signature length".to_string()))?;

        // Signature covers the encoded payload, so verify before parsing it.
        let signed = &text[..version.len() + 1 + payload_b64.len()];
        key.verify(signed.as_bytes(), &signature)
            .map_err(|_| LicenseError::SignatureInvalid)?;

        let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            LicenseError::MalformedToken(format!("invalid payload base64: {e}"))
        })?;
        let claims: LicenseClaims = serde_json::from_slice(&payload_json)
            .map_err(|e| LicenseError::MalformedToken(format!("invalid payload JSON: {e}")))?;
        claims.check_window()?;

        Ok(Self {
            claims,
            signature: signature.to_bytes(),
        })
    }

    /// Returns the signed claims.
    pub fn claims(&self) -> &LicenseClaims {
        &self.claims
    }

    /// Returns the subject email.
    pub fn subject_email(&self) -> &str {
        &self.claims.email
    }

    /// Returns the fingerprint the token is bound to.
    pub fn device_fingerprint(&self) -> DeviceFingerprint {
        DeviceFingerprint::from_id(self.claims.fp.clone())
    }

    /// Returns the issue instant.
    pub fn issued_at(&self) -> DateTime<Utc> {
        secs_to_datetime(self.claims.iat).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Returns the expiry instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        secs_to_datetime(self.claims.exp).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True once `now` has reached the issue instant, less
    /// [`ISSUE_CLOCK_SKEW_SECS`].
    pub fn is_issued_by(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.claims.iat - ISSUE_CLOCK_SKEW_SECS
    }

    /// True while `now` lies inside the validity window: issued (see
    /// [`is_issued_by`](Self::is_issued_by)) and strictly before expiry.
    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        self.is_issued_by(now) && now.timestamp() < self.claims.exp
    }

    /// Returns the raw signature bytes.
    pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }
}

fn secs_to_datetime(secs: i64) -> LicenseResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| LicenseError::MalformedToken(format!("timestamp {secs} out of range")))
}
