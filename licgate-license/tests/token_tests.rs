mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{encoded_token, other_keypair, sign_raw, sign_token, t0, test_keypair};
use licgate_license::{
    DeviceFingerprint, DomainPolicy, ISSUE_CLOCK_SKEW_SECS, LICENSE_VALIDITY_MONTHS, LicenseError,
    LicenseToken, TOKEN_VERSION, expiry_for, validate_token,
};
use pretty_assertions::assert_eq;

// ── Encoding ─────────────────────────────────────────────────────

#[test]
fn encoded_token_has_version_tag_and_three_parts() {
    let (sk, _) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0());
    let parts: Vec<&str> = encoded.split('.').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], TOKEN_VERSION);
}

#[test]
fn decode_roundtrip() {
    let (sk, pk) = test_keypair();
    let token = sign_token(&sk, "user@shopee.com", "fp-1", t0());
    let decoded = LicenseToken::decode_with_key(token.encode().unwrap().as_bytes(), &pk).unwrap();
    assert_eq!(decoded, token);
}

#[test]
fn decode_with_surrounding_whitespace() {
    let (sk, pk) = test_keypair();
    let encoded = format!("  {}\n", encoded_token(&sk, "user@shopee.com", "fp-1", t0()));
    assert!(LicenseToken::decode_with_key(encoded.as_bytes(), &pk).is_ok());
}

#[test]
fn accessors() {
    let (sk, pk) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0());
    let token = LicenseToken::decode_with_key(encoded.as_bytes(), &pk).unwrap();

    assert_eq!(token.subject_email(), "user@shopee.com");
    assert_eq!(token.device_fingerprint().id(), "fp-1");
    assert_eq!(token.issued_at(), t0());
    assert_eq!(
        token.expires_at(),
        Utc.with_ymd_and_hms(2026, 7, 15, 9, 0, 0).unwrap()
    );
}

// ── Validity window ──────────────────────────────────────────────

#[test]
fn expiry_is_six_calendar_months() {
    assert_eq!(LICENSE_VALIDITY_MONTHS, 6);
    let iat = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
    assert_eq!(
        expiry_for(iat).unwrap(),
        Utc.with_ymd_and_hms(2026, 9, 10, 0, 0, 0).unwrap()
    );
}

#[test]
fn current_at_issue_and_not_at_expiry() {
    let (sk, _) = test_keypair();
    let token = sign_token(&sk, "user@shopee.com", "fp-1", t0());
    assert!(token.is_current_at(t0()));
    assert!(token.is_current_at(token.expires_at() - Duration::seconds(1)));
    assert!(!token.is_current_at(token.expires_at()));
    assert!(!token.is_current_at(token.expires_at() + Duration::seconds(1)));
}

#[test]
fn not_current_before_issue() {
    let (sk, _) = test_keypair();
    let token = sign_token(&sk, "user@shopee.com", "fp-1", t0());
    let skew = Duration::seconds(ISSUE_CLOCK_SKEW_SECS);
    assert!(token.is_current_at(t0() - skew));
    assert!(!token.is_current_at(t0() - skew - Duration::seconds(1)));
    assert!(!token.is_current_at(t0() - Duration::days(30)));
}

#[test]
fn future_dated_token_is_not_yet_valid() {
    let (sk, pk) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0() + Duration::days(30));
    let result = validate_token(
        encoded.as_bytes(),
        &pk,
        &DomainPolicy::default(),
        &DeviceFingerprint::from_id("fp-1"),
        t0(),
    );
    assert!(matches!(result, Err(LicenseError::NotYetValid(_))));
    assert!(result.unwrap_err().is_check_failure());
}

#[test]
fn subsecond_issue_time_is_truncated() {
    let (sk, pk) = test_keypair();
    let iat = t0() + Duration::milliseconds(750);
    let token = sign_token(&sk, "user@shopee.com", "fp-1", iat);
    let decoded = LicenseToken::decode_with_key(token.encode().unwrap().as_bytes(), &pk).unwrap();
    assert_eq!(decoded.issued_at(), t0());
    assert_eq!(decoded, token);
}

// ── Malformed tokens ─────────────────────────────────────────────

fn assert_malformed(bytes: &[u8]) {
    let (_, pk) = test_keypair();
    match LicenseToken::decode_with_key(bytes, &pk) {
        Err(LicenseError::MalformedToken(_)) => {}
        other => panic!("expected MalformedToken, got {other:?}"),
    }
}

#[test]
fn rejects_wrong_part_count() {
    assert_malformed(b"lg1.onlytwo");
    assert_malformed(b"lg1.a.b.c");
    assert_malformed(b"");
}

#[test]
fn rejects_unknown_version() {
    let (sk, _) = test_keypair();
    let payload = r#"{"email":"user@shopee.com","fp":"fp","iat":1768467600,"exp":1784106000}"#;
    assert_malformed(sign_raw(&sk, "lg2", payload).as_bytes());
    assert_malformed(sign_raw(&sk, "LG1", payload).as_bytes());
}

#[test]
fn rejects_bad_base64() {
    assert_malformed(b"lg1.!!!.!!!");
}

#[test]
fn rejects_short_signature() {
    let (sk, _) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0());
    let truncated = &encoded[..encoded.len() - 4];
    assert_malformed(truncated.as_bytes());
}

#[test]
fn rejects_non_utf8() {
    assert_malformed(&[0xff, 0xfe, b'.', b'a', b'.', b'b']);
}

#[test]
fn rejects_signed_non_json() {
    let (sk, _) = test_keypair();
    assert_malformed(sign_raw(&sk, TOKEN_VERSION, "not json at all").as_bytes());
}

#[test]
fn rejects_signed_missing_fields() {
    let (sk, _) = test_keypair();
    assert_malformed(sign_raw(&sk, TOKEN_VERSION, r#"{"email":"user@shopee.com"}"#).as_bytes());
}

#[test]
fn rejects_signed_unknown_field() {
    let (sk, _) = test_keypair();
    let token = sign_token(&sk, "user@shopee.com", "fp", t0());
    let c = token.claims();
    let payload = format!(
        r#"{{"email":"{}","fp":"{}","iat":{},"exp":{},"plan":"perpetual"}}"#,
        c.email, c.fp, c.iat, c.exp
    );
    assert_malformed(sign_raw(&sk, TOKEN_VERSION, &payload).as_bytes());
}

#[test]
fn rejects_signed_window_longer_than_six_months() {
    let (sk, _) = test_keypair();
    let token = sign_token(&sk, "user@shopee.com", "fp", t0());
    let c = token.claims();
    let payload = format!(
        r#"{{"email":"{}","fp":"{}","iat":{},"exp":{}}}"#,
        c.email,
        c.fp,
        c.iat,
        c.exp + 365 * 24 * 60 * 60
    );
    assert_malformed(sign_raw(&sk, TOKEN_VERSION, &payload).as_bytes());
}

// ── Signature failures ───────────────────────────────────────────

#[test]
fn rejects_tampered_payload() {
    let (sk, pk) = test_keypair();
    let genuine = sign_token(&sk, "user@shopee.com", "fp-1", t0());
    let forged = sign_token(&sk, "intruder@shopee.com", "fp-1", t0());

    let genuine_enc = genuine.encode().unwrap();
    let forged_enc = forged.encode().unwrap();
    let g: Vec<&str> = genuine_enc.split('.').collect();
    let f: Vec<&str> = forged_enc.split('.').collect();
    let spliced = format!("{}.{}.{}", g[0], f[1], g[2]);

    assert!(matches!(
        LicenseToken::decode_with_key(spliced.as_bytes(), &pk),
        Err(LicenseError::SignatureInvalid)
    ));
}

#[test]
fn rejects_zeroed_signature() {
    let (sk, pk) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0());
    let parts: Vec<&str> = encoded.split('.').collect();
    let zeroed = format!("{}.{}.{}", parts[0], parts[1], "A".repeat(86));
    assert!(matches!(
        LicenseToken::decode_with_key(zeroed.as_bytes(), &pk),
        Err(LicenseError::SignatureInvalid)
    ));
}

#[test]
fn rejects_token_from_other_key() {
    let (_, pk) = test_keypair();
    let (other_sk, _) = other_keypair();
    let encoded = encoded_token(&other_sk, "user@shopee.com", "fp-1", t0());
    assert!(matches!(
        LicenseToken::decode_with_key(encoded.as_bytes(), &pk),
        Err(LicenseError::SignatureInvalid)
    ));
}

#[test]
fn test_key_tokens_fail_against_embedded_key() {
    let (sk, _) = test_keypair();
    let encoded = encoded_token(&sk, "user@shopee.com", "fp-1", t0());
    assert!(matches!(
        LicenseToken::decode(encoded.as_bytes()),
        Err(LicenseError::SignatureInvalid)
    ));
}
