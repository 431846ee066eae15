//! HMAC-SHA256 signer/verifier for short-lived opaque redirect
//! parameters that must round-trip a session id through a third-party
//! browser redirect.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::session::validate_id_shape;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_SIGNATURE_EXPIRY_MINUTES: i64 = 30;
pub const MAX_CLOCK_SKEW_MINUTES: i64 = 5;

const REDIRECT_PARAM_KEY: &str = "session_id";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("signed parameter has invalid format")]
    InvalidFormat,
    #[error("signature does not match payload")]
    InvalidSignature,
    #[error("signed session id does not match the expected shape")]
    TamperedSession,
    #[error("signature has expired")]
    ExpiredSignature,
}

/// HMAC-SHA256 signer over `"<sessionID>|<unixSeconds>"`.
pub struct RedirectSigner {
    secret: [u8; 32],
    expiry: Duration,
    max_clock_skew: Duration,
}

impl RedirectSigner {
    /// Generates a fresh 32-byte secret from a CSPRNG. Callers that need
    /// a stable secret across restarts should use
    /// [`RedirectSigner::with_secret`] with an injected key instead.
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::with_secret(secret)
    }

    pub fn with_secret(secret: [u8; 32]) -> Self {
        RedirectSigner {
            secret,
            expiry: Duration::minutes(DEFAULT_SIGNATURE_EXPIRY_MINUTES),
            max_clock_skew: Duration::minutes(MAX_CLOCK_SKEW_MINUTES),
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    #[cfg(test)]
    pub fn secret_for_test(&self) -> [u8; 32] {
        self.secret
    }

    fn mac_for(&self, payload: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// `Sign(sessionID) -> "sessionID|ts.macB64"`.
    pub fn sign(&self, session_id: &str) -> String {
        self.sign_at(session_id, Utc::now())
    }

    fn sign_at(&self, session_id: &str, now: DateTime<Utc>) -> String {
        let ts = now.timestamp();
        let payload = format!("{session_id}|{ts}");
        let mac = self.mac_for(&payload);
        let mac_b64 = URL_SAFE_NO_PAD.encode(mac);
        format!("{payload}.{mac_b64}")
    }

    /// `Verify(signed) -> (sessionID, err)`.
    pub fn verify(&self, signed: &str) -> Result<String, SignerError> {
        self.verify_at(signed, Utc::now())
    }

    fn verify_at(&self, signed: &str, now: DateTime<Utc>) -> Result<String, SignerError> {
        let (payload, mac_b64) = signed.split_once('.').ok_or(SignerError::InvalidFormat)?;
        let (session_id, ts_str) = payload.split_once('|').ok_or(SignerError::InvalidFormat)?;

        let ts: i64 = ts_str.parse().map_err(|_| SignerError::InvalidFormat)?;
        let signed_mac = URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| SignerError::InvalidFormat)?;

        let expected_mac = self.mac_for(payload);
        if expected_mac.ct_eq(&signed_mac).unwrap_u8() != 1 {
            return Err(SignerError::InvalidSignature);
        }

        let signed_at = DateTime::<Utc>::from_timestamp(ts, 0).ok_or(SignerError::InvalidFormat)?;
        let age = now - signed_at;
        if age > self.expiry + self.max_clock_skew {
            return Err(SignerError::ExpiredSignature);
        }
        if signed_at - now > self.max_clock_skew {
            return Err(SignerError::ExpiredSignature);
        }

        if validate_id_shape(session_id).is_err() {
            return Err(SignerError::TamperedSession);
        }

        Ok(session_id.to_string())
    }

    /// `SignRedirect(sessionID) -> "session_id=<signed>"`.
    pub fn sign_redirect(&self, session_id: &str) -> Result<String, SignerError> {
        validate_id_shape(session_id).map_err(|_| SignerError::TamperedSession)?;
        let signed = self.sign(session_id);
        Ok(format!("{REDIRECT_PARAM_KEY}={signed}"))
    }

    /// `VerifyRedirect(queryStringFragment) -> (sessionID, err)`.
    pub fn verify_redirect(&self, fragment: &str) -> Result<String, SignerError> {
        let prefix = format!("{REDIRECT_PARAM_KEY}=");
        let signed = fragment.strip_prefix(&prefix).ok_or(SignerError::InvalidFormat)?;
        self.verify(signed)
    }
}

impl Default for RedirectSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> RedirectSigner {
        RedirectSigner::with_secret([7u8; 32])
    }

    #[test]
    fn round_trip_within_expiry() {
        let s = signer();
        let id = crate::session::SessionId::mint();
        let signed = s.sign(id.as_str());
        assert_eq!(s.verify(&signed).unwrap(), id.as_str());
    }

    #[test]
    fn expired_signature_rejected() {
        let s = signer();
        let id = crate::session::SessionId::mint();
        let old = Utc::now() - Duration::minutes(60);
        let signed = s.sign_at(id.as_str(), old);
        assert_eq!(s.verify(&signed).unwrap_err(), SignerError::ExpiredSignature);
    }

    #[test]
    fn future_timestamp_beyond_skew_rejected() {
        let s = signer();
        let id = crate::session::SessionId::mint();
        let future = Utc::now() + Duration::minutes(10);
        let signed = s.sign_at(id.as_str(), future);
        assert_eq!(s.verify(&signed).unwrap_err(), SignerError::ExpiredSignature);
    }

    #[test]
    fn tampering_any_byte_breaks_verification() {
        let s = signer();
        let id = crate::session::SessionId::mint();
        let mut signed = s.sign(id.as_str()).into_bytes();
        // Flip a byte inside the session-id portion: the MAC was
        // computed over the original payload, so any change there
        // is guaranteed to fail the MAC comparison deterministically
        // (unlike flipping inside the base64 MAC tail, which can
        // sometimes merely fail to decode).
        signed[0] ^= 0x01;
        let signed = String::from_utf8(signed).unwrap();
        let err = s.verify(&signed).unwrap_err();
        assert!(matches!(err, SignerError::InvalidSignature | SignerError::TamperedSession));
    }

    #[test]
    fn malformed_shape_rejected() {
        let s = signer();
        assert_eq!(s.verify("garbage").unwrap_err(), SignerError::InvalidFormat);
        assert_eq!(s.verify("a|b.c").unwrap_err(), SignerError::InvalidFormat);
    }

    #[test]
    fn redirect_wrapping_round_trips() {
        let s = signer();
        let id = crate::session::SessionId::mint();
        let wrapped = s.sign_redirect(id.as_str()).unwrap();
        assert!(wrapped.starts_with("session_id="));
        assert_eq!(s.verify_redirect(&wrapped).unwrap(), id.as_str());
    }

    #[test]
    fn verify_redirect_requires_exact_key_prefix() {
        let s = signer();
        assert_eq!(
            s.verify_redirect("sessionid=foo").unwrap_err(),
            SignerError::InvalidFormat
        );
    }
}
