//! Twitter streaming client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{TwitterError, TwitterResult};

/// Configuration for the Twitter streaming client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth 1.0a Consumer Key (API Key)
    #[serde(default)]
    pub consumer_key: String,

    /// OAuth 1.0a Consumer Secret (API Secret)
    #[serde(default)]
    pub consumer_secret: String,

    /// OAuth 1.0a Access Token
    #[serde(default)]
    pub access_token: String,

    /// OAuth 1.0a Access Token Secret
    #[serde(default)]
    pub access_token_secret: String,

    /// Base URL for the public streams (default: https://stream.twitter.com/1.1/)
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Base URL for user streams (default: https://userstream.twitter.com/1.1/)
    #[serde(default = "default_userstream_url")]
    pub userstream_url: String,

    /// TCP/TLS connect timeout. Established streams have no read timeout.
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every stream request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_stream_url() -> String {
    "https://stream.twitter.com/1.1/".into()
}

fn default_userstream_url() -> String {
    "https://userstream.twitter.com/1.1/".into()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("twitter-stream/{}", env!("CARGO_PKG_VERSION"))
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_token_secret: String::new(),
            stream_url: default_stream_url(),
            userstream_url: default_userstream_url(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl TwitterConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    ///
    /// [`TwitterError::Config`] if the document is not valid JSON for this
    /// type or fails [`TwitterConfig::validate`].
    pub fn from_json(json: &str) -> TwitterResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TwitterError::Config(format!("Invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that credentials are present and the base URLs parse.
    ///
    /// # Errors
    ///
    /// [`TwitterError::Config`] naming the first offending field.
    pub fn validate(&self) -> TwitterResult<()> {
        let credentials = [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ];
        for (name, value) in credentials {
            if value.trim().is_empty() {
                return Err(TwitterError::Config(format!("{name} is required")));
            }
        }

        for (name, value) in [
            ("stream_url", &self.stream_url),
            ("userstream_url", &self.userstream_url),
        ] {
            Url::parse(value).map_err(|e| TwitterError::Config(format!("{name}: {e}")))?;
        }

        Ok(())
    }
}
