//! Streaming endpoint client.
//!
//! Builds unstarted [`StreamService`]s whose connect function issues a
//! freshly signed request to one of Twitter's streaming endpoints.

use std::sync::Arc;

use futures_util::FutureExt;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    config::TwitterConfig,
    error::{TwitterError, TwitterResult},
    oauth::OAuthSigner,
    response::{ConnectFuture, HttpStreamResponse, StreamResponse},
    service::StreamService,
};

/// Request parameters as ordered `(name, value)` pairs.
pub type Params = Vec<(String, String)>;

/// Set a boolean parameter (`true` / `false`) unless `value` is `None`.
pub fn set_bool_param(params: &mut Params, name: &str, value: Option<bool>) {
    if let Some(value) = value {
        params.push((name.to_string(), value.to_string()));
    }
}

/// Set a string parameter unless `value` is `None`.
pub fn set_str_param(params: &mut Params, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        params.push((name.to_string(), value.to_string()));
    }
}

/// Set a comma-joined list parameter unless `values` is `None`.
///
/// # Errors
///
/// [`TwitterError::InvalidParam`] if the list is empty or an item contains a
/// comma.
pub fn set_list_param(
    params: &mut Params,
    name: &str,
    values: Option<&[String]>,
) -> TwitterResult<()> {
    let Some(values) = values else {
        return Ok(());
    };

    if values.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if values.iter().any(|v| v.contains(',')) {
        return Err(invalid(name, "items must not contain ','"));
    }

    params.push((name.to_string(), values.join(",")));
    Ok(())
}

fn invalid(name: &str, reason: &str) -> TwitterError {
    TwitterError::InvalidParam {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parameters for `statuses/filter`.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    /// User IDs whose statuses to deliver.
    pub follow: Option<Vec<String>>,
    /// Keywords to track.
    pub track: Option<Vec<String>>,
    /// Location bounding boxes. Not supported yet.
    pub locations: Option<Vec<String>>,
    /// Ask for stall warnings.
    pub stall_warnings: Option<bool>,
}

impl FilterParams {
    /// Encode as request parameters.
    ///
    /// # Errors
    ///
    /// [`TwitterError::InvalidParam`] if neither `follow` nor `track` is set,
    /// or if `locations` is given.
    pub fn to_params(&self) -> TwitterResult<Params> {
        if self.locations.is_some() {
            return Err(invalid("locations", "not supported"));
        }
        if self.follow.is_none() && self.track.is_none() {
            return Err(invalid("follow", "at least one of follow or track is required"));
        }

        let mut params = Params::new();
        set_list_param(&mut params, "follow", self.follow.as_deref())?;
        set_list_param(&mut params, "track", self.track.as_deref())?;
        set_bool_param(&mut params, "stall_warnings", self.stall_warnings);
        Ok(params)
    }
}

/// Parameters for the user stream (`user.json`).
#[derive(Debug, Clone)]
pub struct UserStreamParams {
    /// Ask for stall warnings.
    pub stall_warnings: Option<bool>,
    /// `followings` (default) or `user`.
    pub with: Option<String>,
    /// `all` to include replies between users we don't both follow.
    pub replies: Option<String>,
}

impl Default for UserStreamParams {
    fn default() -> Self {
        Self {
            stall_warnings: None,
            with: Some("followings".into()),
            replies: None,
        }
    }
}

impl UserStreamParams {
    /// Encode as request parameters. Friend IDs are always stringified.
    ///
    /// # Errors
    ///
    /// [`TwitterError::InvalidParam`] if `with` is not `followings` or `user`.
    pub fn to_params(&self) -> TwitterResult<Params> {
        if let Some(with) = self.with.as_deref() {
            if with != "followings" && with != "user" {
                return Err(invalid("with", "must be 'followings' or 'user'"));
            }
        }

        let mut params = vec![("stringify_friend_ids".to_string(), "true".to_string())];
        set_bool_param(&mut params, "stall_warnings", self.stall_warnings);
        set_str_param(&mut params, "with", self.with.as_deref());
        set_str_param(&mut params, "replies", self.replies.as_deref());
        Ok(params)
    }
}

/// Client for Twitter's streaming endpoints.
#[derive(Debug, Clone)]
pub struct TwitterStreamClient {
    client: Client,
    signer: Arc<OAuthSigner>,
    stream_url: String,
    userstream_url: String,
}

impl TwitterStreamClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// [`TwitterError::Config`] if the configuration does not validate, or
    /// [`TwitterError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &TwitterConfig) -> TwitterResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            signer: Arc::new(OAuthSigner::new(config)),
            stream_url: config.stream_url.clone(),
            userstream_url: config.userstream_url.clone(),
        })
    }

    /// Stream public statuses matching `params`.
    ///
    /// The returned service is not started.
    ///
    /// # Errors
    ///
    /// [`TwitterError::InvalidParam`] if `params` are rejected.
    #[instrument(skip(self, delegate))]
    pub fn stream_filter<D>(&self, delegate: D, params: &FilterParams) -> TwitterResult<StreamService>
    where
        D: Fn(Value) + Send + Sync + 'static,
    {
        let request = StreamRequest {
            client: self.client.clone(),
            signer: Arc::clone(&self.signer),
            method: Method::POST,
            url: join_url(&self.stream_url, "statuses/filter.json"),
            params: params.to_params()?,
        };
        Ok(StreamService::new(move || request.send(), delegate))
    }

    /// Stream messages for the authenticated user.
    ///
    /// The returned service is not started.
    ///
    /// # Errors
    ///
    /// [`TwitterError::InvalidParam`] if `params` are rejected.
    #[instrument(skip(self, delegate))]
    pub fn userstream_user<D>(
        &self,
        delegate: D,
        params: &UserStreamParams,
    ) -> TwitterResult<StreamService>
    where
        D: Fn(Value) + Send + Sync + 'static,
    {
        let request = StreamRequest {
            client: self.client.clone(),
            signer: Arc::clone(&self.signer),
            method: Method::GET,
            url: join_url(&self.userstream_url, "user.json"),
            params: params.to_params()?,
        };
        Ok(StreamService::new(move || request.send(), delegate))
    }
}

fn join_url(base: &str, resource: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        resource.trim_start_matches('/')
    )
}

/// Everything needed to (re)issue one streaming request.
#[derive(Debug, Clone)]
struct StreamRequest {
    client: Client,
    signer: Arc<OAuthSigner>,
    method: Method,
    url: String,
    params: Params,
}

impl StreamRequest {
    fn send(&self) -> ConnectFuture {
        let request = self.clone();
        async move {
            let auth_header = request
                .signer
                .sign(request.method.as_str(), &request.url, &request.params)?;

            debug!(method = %request.method, url = %request.url, "Opening stream request");

            let builder = request
                .client
                .request(request.method.clone(), &request.url)
                .header("Authorization", auth_header);
            let builder = if request.method == Method::GET {
                builder.query(&request.params)
            } else {
                builder.form(&request.params)
            };

            let response = builder.send().await?;
            Ok(Box::new(HttpStreamResponse::new(response)) as Box<dyn StreamResponse>)
        }
        .boxed()
    }
}
