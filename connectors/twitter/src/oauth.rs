//! OAuth 1.0a request signing for stream connections.
//!
//! Every connection attempt is signed afresh, so reconnects never reuse a
//! nonce or a stale timestamp.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use sha1::Sha1;

use crate::config::TwitterConfig;
use crate::error::{TwitterError, TwitterResult};

/// Characters that must be percent-encoded in OAuth signatures.
/// RFC 3986 unreserved characters: ALPHA / DIGIT / "-" / "." / "_" / "~"
const OAUTH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// OAuth 1.0a signer for Twitter API requests.
#[derive(Debug)]
pub struct OAuthSigner {
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
}

impl OAuthSigner {
    /// Create a new OAuth signer from config.
    #[must_use]
    pub fn new(config: &TwitterConfig) -> Self {
        Self {
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            access_token: config.access_token.clone(),
            access_token_secret: config.access_token_secret.clone(),
        }
    }

    /// Generate the OAuth 1.0a Authorization header value.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `url` - URL without query string
    /// * `params` - Query parameters and form body parameters
    ///
    /// # Errors
    ///
    /// [`TwitterError::OAuth`] if the clock is before the Unix epoch or the
    /// HMAC key is rejected.
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> TwitterResult<String> {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| TwitterError::OAuth(format!("Failed to get timestamp: {e}")))?
            .as_secs()
            .to_string();

        self.sign_with(method, url, params, &generate_nonce(), &timestamp)
    }

    /// Sign with a caller-chosen nonce and timestamp.
    pub(crate) fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> TwitterResult<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.access_token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend(params.iter().cloned());

        // Base string parameters sort on their encoded form.
        let mut encoded: Vec<(String, String)> = all_params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&param_string)
        );

        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.access_token_secret)
        );

        let signature = hmac_sha1(&signing_key, &base_string)?;

        oauth_params.push(("oauth_signature".to_string(), signature));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {header}"))
    }
}

/// Percent-encode a string according to RFC 3986.
fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Generate a random nonce for OAuth.
fn generate_nonce() -> String {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute HMAC-SHA1 and return base64-encoded result.
fn hmac_sha1(key: &str, data: &str) -> TwitterResult<String> {
    type HmacSha1 = Hmac<Sha1>;

    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| TwitterError::OAuth(e.to_string()))?;

    mac.update(data.as_bytes());
    let result = mac.finalize();
    Ok(BASE64.encode(result.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("hello world"), "hello%20world");
        assert_eq!(percent_encode("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(percent_encode("test-value_123.txt"), "test-value_123.txt");
        assert_eq!(percent_encode("~tilde"), "~tilde");
    }

    #[test]
    fn test_generate_nonce() {
        let nonce1 = generate_nonce();
        let nonce2 = generate_nonce();

        // Nonces should be different
        assert_ne!(nonce1, nonce2);

        // Nonces should be 32 hex characters
        assert_eq!(nonce1.len(), 32);
        assert!(nonce1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    fn test_signer() -> OAuthSigner {
        OAuthSigner::new(&TwitterConfig {
            consumer_key: "consumer-key".into(),
            consumer_secret: "consumer-secret".into(),
            access_token: "token-key".into(),
            access_token_secret: "token-secret".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_oauth_signer_creates_valid_header() {
        let header = test_signer()
            .sign("GET", "https://userstream.twitter.com/1.1/user.json", &[])
            .unwrap();

        assert!(header.starts_with("OAuth "));
        for field in [
            "oauth_consumer_key=",
            "oauth_token=",
            "oauth_version=",
            "oauth_nonce=",
            "oauth_timestamp=",
            "oauth_signature=",
        ] {
            assert!(header.contains(field), "{field} missing from {header}");
        }
    }

    #[test]
    fn test_signature_is_deterministic_for_fixed_nonce() {
        let signer = test_signer();
        let params = vec![("track".to_string(), "rust,tokio".to_string())];
        let url = "https://stream.twitter.com/1.1/statuses/filter.json";

        let a = signer.sign_with("POST", url, &params, "nonce", "1234567890").unwrap();
        let b = signer.sign_with("POST", url, &params, "nonce", "1234567890").unwrap();
        assert_eq!(a, b);

        let no_params = signer.sign_with("POST", url, &[], "nonce", "1234567890").unwrap();
        assert_ne!(a, no_params);

        let other_method = signer.sign_with("GET", url, &params, "nonce", "1234567890").unwrap();
        assert_ne!(a, other_method);
    }

    #[test]
    fn test_signature_matches_documented_example() {
        let signer = OAuthSigner::new(&TwitterConfig {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
            ..Default::default()
        });
        let params = vec![
            ("include_entities".to_string(), "true".to_string()),
            (
                "status".to_string(),
                "Hello Ladies + Gentlemen, a signed OAuth request!".to_string(),
            ),
        ];

        let header = signer
            .sign_with(
                "POST",
                "https://api.twitter.com/1.1/statuses/update.json",
                &params,
                "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
                "1318622958",
            )
            .unwrap();

        // hCtSmYh+iHYCEqBWrE7C7hYmtUk= once percent-encoded for the header.
        assert!(
            header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""),
            "{header}"
        );
        assert!(header.contains("oauth_nonce=\"kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg\""));
        assert!(header.contains("oauth_timestamp=\"1318622958\""));
    }

    #[test]
    fn test_signature_independent_of_param_order() {
        let signer = test_signer();
        let url = "https://stream.twitter.com/1.1/statuses/filter.json";
        let forward = vec![
            ("follow".to_string(), "12".to_string()),
            ("track".to_string(), "rust".to_string()),
        ];
        let reversed: Vec<_> = forward.iter().rev().cloned().collect();

        assert_eq!(
            signer.sign_with("POST", url, &forward, "n", "1").unwrap(),
            signer.sign_with("POST", url, &reversed, "n", "1").unwrap()
        );
    }
}
