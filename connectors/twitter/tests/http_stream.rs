//! End-to-end tests of the streaming endpoints against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use twitter_stream::{
    DisconnectReason, FilterParams, StreamService, StreamState, TwitterConfig,
    TwitterStreamClient, UserStreamParams,
};
use twitter_testkit::{FILTER_PATH, ManualClock, MockStreamServer, USER_PATH, init_test_tracing};

fn config(base_url: &str) -> TwitterConfig {
    TwitterConfig {
        consumer_key: "consumer-key".into(),
        consumer_secret: "consumer-secret".into(),
        access_token: "token".into(),
        access_token_secret: "token-secret".into(),
        stream_url: base_url.into(),
        userstream_url: base_url.into(),
        connect_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[derive(Default, Clone)]
struct Recorder {
    messages: Arc<Mutex<Vec<Value>>>,
    disconnects: Arc<Mutex<Vec<(bool, Option<u16>)>>>,
}

impl Recorder {
    fn delegate(&self) -> impl Fn(Value) + Send + Sync + 'static {
        let messages = Arc::clone(&self.messages);
        move |message| messages.lock().push(message)
    }

    fn watch(&self, service: &StreamService) {
        let disconnects = Arc::clone(&self.disconnects);
        service.set_disconnect_callback(move |_, reason: &DisconnectReason| {
            disconnects
                .lock()
                .push((reason.is_done(), reason.status_code()));
        });
    }

    fn messages(&self) -> Vec<Value> {
        self.messages.lock().clone()
    }

    fn disconnects(&self) -> Vec<(bool, Option<u16>)> {
        self.disconnects.lock().clone()
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn tweet(id: &str, text: &str) -> Value {
    json!({
        "id_str": id,
        "text": text,
        "user": {"id_str": "1", "screen_name": "alice"},
    })
}

#[tokio::test]
async fn test_filter_stream_delivers_messages() {
    init_test_tracing();
    let server = MockStreamServer::start().await;
    server
        .serve_stream("POST", FILTER_PATH, &[tweet("1", "first"), tweet("2", "second")])
        .await;

    let client = TwitterStreamClient::new(&config(&server.base_url())).unwrap();
    let recorder = Recorder::default();
    let clock = ManualClock::new();
    let params = FilterParams {
        track: Some(vec!["rust".into(), "tokio".into()]),
        stall_warnings: Some(true),
        ..Default::default()
    };
    let mut service = client
        .stream_filter(recorder.delegate(), &params)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    recorder.watch(&service);

    service.start().unwrap();
    wait_until("clean close", || !recorder.disconnects().is_empty()).await;

    assert_eq!(
        recorder.messages(),
        vec![tweet("1", "first"), tweet("2", "second")]
    );
    assert_eq!(recorder.disconnects(), vec![(true, None)]);
    assert_eq!(service.monitor().connections(), 1);
    assert_eq!(service.state(), StreamState::AwaitingReconnect);
    assert_eq!(clock.pending_delays(), vec![Duration::from_secs(1)]);

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method.as_str(), "POST");
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("track=rust%2Ctokio"), "body was {body}");
    assert!(body.contains("stall_warnings=true"), "body was {body}");
    let auth = request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(auth.starts_with("OAuth "));
    assert!(auth.contains("oauth_signature="));

    service.stop().await;
}

#[tokio::test]
async fn test_user_stream_sends_query_params() {
    init_test_tracing();
    let server = MockStreamServer::start().await;
    server
        .serve_stream("GET", USER_PATH, &[json!({"friends_str": ["2", "3"]})])
        .await;

    let client = TwitterStreamClient::new(&config(&server.base_url())).unwrap();
    let recorder = Recorder::default();
    let params = UserStreamParams {
        replies: Some("all".into()),
        ..Default::default()
    };
    let mut service = client
        .userstream_user(recorder.delegate(), &params)
        .unwrap()
        .with_clock(Arc::new(ManualClock::new()));
    recorder.watch(&service);

    service.start().unwrap();
    wait_until("message", || !recorder.messages().is_empty()).await;

    assert_eq!(recorder.messages(), vec![json!({"friends_str": ["2", "3"]})]);

    let requests = server.requests().await;
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("stringify_friend_ids=true"), "query was {query}");
    assert!(query.contains("with=followings"), "query was {query}");
    assert!(query.contains("replies=all"), "query was {query}");

    service.stop().await;
}

#[tokio::test]
async fn test_rate_limit_then_recovery() {
    init_test_tracing();
    let server = MockStreamServer::start().await;
    server.fail_next(FILTER_PATH, 420, 1).await;
    server
        .serve_stream("POST", FILTER_PATH, &[tweet("3", "after limit")])
        .await;

    let client = TwitterStreamClient::new(&config(&server.base_url())).unwrap();
    let recorder = Recorder::default();
    let clock = ManualClock::new();
    let params = FilterParams {
        follow: Some(vec!["12".into()]),
        ..Default::default()
    };
    let mut service = client
        .stream_filter(recorder.delegate(), &params)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    recorder.watch(&service);

    service.start().unwrap();
    wait_until("rate limit", || !recorder.disconnects().is_empty()).await;

    assert_eq!(recorder.disconnects(), vec![(false, Some(420))]);
    assert_eq!(clock.pending_delays(), vec![Duration::from_secs(30)]);
    assert!(recorder.messages().is_empty());

    clock.advance_secs(30);
    wait_until("message", || !recorder.messages().is_empty()).await;

    assert_eq!(recorder.messages(), vec![tweet("3", "after limit")]);
    assert_eq!(server.request_count().await, 2);

    service.stop().await;
}

#[tokio::test]
async fn test_server_error_schedules_one_second_retry() {
    init_test_tracing();
    let server = MockStreamServer::start().await;
    server.fail_next(FILTER_PATH, 500, 10).await;

    let client = TwitterStreamClient::new(&config(&server.base_url())).unwrap();
    let recorder = Recorder::default();
    let clock = ManualClock::new();
    let params = FilterParams {
        track: Some(vec!["rust".into()]),
        ..Default::default()
    };
    let mut service = client
        .stream_filter(recorder.delegate(), &params)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    recorder.watch(&service);

    service.start().unwrap();
    wait_until("server error", || !recorder.disconnects().is_empty()).await;

    assert_eq!(recorder.disconnects(), vec![(false, Some(500))]);
    assert_eq!(service.reconnect_delay(), Duration::from_secs(1));

    service.stop().await;
    assert_eq!(clock.pending_timers(), 0);
    assert_eq!(service.reconnect_delay(), Duration::ZERO);
}

#[tokio::test]
async fn test_refused_connection_is_retried() {
    init_test_tracing();
    let client = TwitterStreamClient::new(&config("http://127.0.0.1:1/")).unwrap();
    let recorder = Recorder::default();
    let clock = ManualClock::new();
    let params = FilterParams {
        track: Some(vec!["rust".into()]),
        ..Default::default()
    };
    let mut service = client
        .stream_filter(recorder.delegate(), &params)
        .unwrap()
        .with_clock(Arc::new(clock.clone()));
    recorder.watch(&service);

    service.start().unwrap();
    wait_until("connect failure", || !recorder.disconnects().is_empty()).await;

    assert_eq!(recorder.disconnects(), vec![(false, None)]);
    assert_eq!(clock.pending_delays(), vec![Duration::from_secs(1)]);

    service.stop().await;
}

#[test]
fn test_invalid_params_rejected_before_connecting() {
    let client = TwitterStreamClient::new(&config("http://127.0.0.1:1/")).unwrap();
    let err = client
        .stream_filter(|_| {}, &FilterParams::default())
        .unwrap_err();
    assert!(err.to_string().contains("follow"));
}
