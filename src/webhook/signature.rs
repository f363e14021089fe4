//! Webhook sender authentication
//!
//! The vendor authenticates deliveries with two headers:
//!
//! - `User-Agent` equal to a fixed sentinel (`TermgameSeller`)
//! - `x-hash` equal to the lowercase hex MD5 digest of the shared API key
//!
//! MD5 of a static secret is a weak authenticator: the digest never changes,
//! so anyone who observes one delivery can forge the rest. It is kept only for
//! compatibility with the vendor's scheme and must not be reused for new
//! internal secrets. Comparison is constant-time.

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;

use crate::error::{WebhookError, WebhookResult};

/// Hex MD5 digest of `api_key`, as sent in `x-hash`
pub fn compute_signature(api_key: &str) -> String {
    hex::encode(Md5::digest(api_key.as_bytes()))
}

/// Verifies the `User-Agent` and `x-hash` headers of a delivery
#[derive(Clone)]
pub struct SignatureVerifier {
    expected: String,
    user_agent: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// Create a verifier for `api_key` expecting `user_agent`
    pub fn new(api_key: &str, user_agent: impl Into<String>) -> Self {
        Self {
            expected: compute_signature(api_key),
            user_agent: user_agent.into(),
        }
    }

    /// Whether `received` matches the expected digest.
    ///
    /// Missing or empty headers fail.
    pub fn verify(&self, received: Option<&str>) -> bool {
        match received {
            Some(value) if !value.is_empty() => {
                bool::from(value.as_bytes().ct_eq(self.expected.as_bytes()))
            }
            _ => false,
        }
    }

    /// Whether the User-Agent is exactly the sentinel
    pub fn verify_user_agent(&self, received: Option<&str>) -> bool {
        received == Some(self.user_agent.as_str())
    }

    /// Run both header checks in pipeline order
    pub fn check(&self, user_agent: Option<&str>, signature: Option<&str>) -> WebhookResult<()> {
        if !self.verify_user_agent(user_agent) {
            return Err(WebhookError::InvalidUserAgent);
        }
        match signature {
            None | Some("") => Err(WebhookError::MissingSignature),
            Some(_) if !self.verify(signature) => Err(WebhookError::InvalidSignature),
            Some(_) => Ok(()),
        }
    }

    /// The expected digest, for the CLI helper that prints it
    pub fn expected_signature(&self) -> &str {
        &self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WEBHOOK_USER_AGENT;

    #[test]
    fn test_known_digest() {
        // md5("abc")
        assert_eq!(compute_signature("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_verify_accepts_digest() {
        let verifier = SignatureVerifier::new("my-api-key", WEBHOOK_USER_AGENT);
        let digest = compute_signature("my-api-key");
        assert!(verifier.verify(Some(&digest)));
    }

    #[test]
    fn test_verify_fails_closed() {
        let verifier = SignatureVerifier::new("my-api-key", WEBHOOK_USER_AGENT);
        assert!(!verifier.verify(None));
        assert!(!verifier.verify(Some("")));
        assert!(!verifier.verify(Some("my-api-key")));
        assert!(!verifier.verify(Some(&compute_signature("other-key"))));
    }

    #[test]
    fn test_check_order_and_errors() {
        let verifier = SignatureVerifier::new("k", WEBHOOK_USER_AGENT);
        let good = compute_signature("k");

        assert_eq!(
            verifier.check(Some("curl/8.0"), Some(&good)),
            Err(WebhookError::InvalidUserAgent)
        );
        assert_eq!(
            verifier.check(None, Some(&good)),
            Err(WebhookError::InvalidUserAgent)
        );
        assert_eq!(
            verifier.check(Some(WEBHOOK_USER_AGENT), None),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verifier.check(Some(WEBHOOK_USER_AGENT), Some("")),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verifier.check(Some(WEBHOOK_USER_AGENT), Some("deadbeef")),
            Err(WebhookError::InvalidSignature)
        );
        assert_eq!(verifier.check(Some(WEBHOOK_USER_AGENT), Some(&good)), Ok(()));
    }

    #[test]
    fn test_user_agent_is_exact() {
        let verifier = SignatureVerifier::new("k", WEBHOOK_USER_AGENT);
        assert!(!verifier.verify_user_agent(Some("termgameseller")));
        assert!(!verifier.verify_user_agent(Some("TermgameSeller/2.0")));
    }

    #[test]
    fn test_debug_hides_digest() {
        let verifier = SignatureVerifier::new("k", WEBHOOK_USER_AGENT);
        assert!(!format!("{:?}", verifier).contains(&compute_signature("k")));
    }
}
