use async_trait::async_trait;
use contact_relay::server::{build_router, AppState};
use contact_relay::transport::TransportError;
use contact_relay::{
    Config, ContactProcessor, DeliveryAttempt, HoneypotInputs, MailTransport, SendReport,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy)]
enum Mode {
    Accept,
    Reject,
    ConnectionError,
}

struct SpyTransport {
    mode: Mode,
    sent: Mutex<Vec<DeliveryAttempt>>,
}

impl SpyTransport {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(SpyTransport {
            mode,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for SpyTransport {
    async fn send(&self, attempt: &DeliveryAttempt) -> Result<SendReport, TransportError> {
        self.sent.lock().unwrap().push(attempt.clone());
        match self.mode {
            Mode::Accept => Ok(SendReport {
                accepted: vec![attempt.to.clone()],
                rejected: Vec::new(),
                response: "250 2.0.0 queued".to_string(),
            }),
            Mode::Reject => Ok(SendReport {
                accepted: Vec::new(),
                rejected: vec![attempt.to.clone()],
                response: "554 5.7.1 relay denied".to_string(),
            }),
            Mode::ConnectionError => Err(TransportError::Smtp(
                "connection refused by smtp.internal.example:465".to_string(),
            )),
        }
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start(transport: Arc<SpyTransport>) -> Self {
        let mut config = Config::default();
        config.honeypot.seed = "integration-seed".to_string();
        config.mail.to = "owner@example.com".to_string();

        let processor = Arc::new(ContactProcessor::new(&config, transport));
        let router = build_router(AppState { processor }, config.server.max_body_bytes);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
        }
    }

    async fn honeypot(&self) -> HoneypotInputs {
        let body = self
            .client
            .get(format!("{}/contact/honeypot", self.base_url))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        serde_json::from_str(&body).unwrap()
    }

    async fn post(&self, form: &[(&str, &str)]) -> Value {
        let response = self
            .client
            .post(format!("{}/contact", self.base_url))
            .form(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        serde_json::from_str(&response.text().await.unwrap()).unwrap()
    }
}

#[tokio::test]
async fn test_valid_submission_is_delivered() {
    let spy = SpyTransport::new(Mode::Accept);
    let server = TestServer::start(spy.clone()).await;
    let inputs = server.honeypot().await;

    let body = server
        .post(&[
            ("name", "Jane"),
            ("email", "jane@x.com"),
            ("message", "hi"),
            (inputs.bait_field_name.as_str(), ""),
            (inputs.token_field_name.as_str(), inputs.token.as_str()),
        ])
        .await;

    assert_eq!(body, json!({"ok": true}));
    let sent = spy.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Message from Jane <jane@x.com>");
    assert_eq!(sent[0].body, "hi");
    assert_eq!(sent[0].to, "owner@example.com");
}

#[tokio::test]
async fn test_filled_bait_field_is_spam() {
    let spy = SpyTransport::new(Mode::Accept);
    let server = TestServer::start(spy.clone()).await;
    let inputs = server.honeypot().await;

    let body = server
        .post(&[
            ("name", "Jane"),
            ("email", "jane@x.com"),
            ("message", "hi"),
            (inputs.bait_field_name.as_str(), "bot"),
            (inputs.token_field_name.as_str(), inputs.token.as_str()),
        ])
        .await;

    assert_eq!(body, json!({"ok": false, "reason": "spam"}));
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn test_forged_token_is_spam() {
    let spy = SpyTransport::new(Mode::Accept);
    let server = TestServer::start(spy.clone()).await;

    let body = server
        .post(&[
            ("name", "Jane"),
            ("email", "jane@x.com"),
            ("message", "hi"),
            ("form__confirm", "v1.eyJ2YWxpZF9mcm9tIjowfQ.AAAA"),
        ])
        .await;

    assert_eq!(body, json!({"ok": false, "reason": "spam"}));
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn test_empty_name_fails_validation() {
    let spy = SpyTransport::new(Mode::Accept);
    let server = TestServer::start(spy.clone()).await;
    let inputs = server.honeypot().await;

    let body = server
        .post(&[
            ("name", ""),
            ("email", "jane@x.com"),
            ("message", "hi"),
            (inputs.token_field_name.as_str(), inputs.token.as_str()),
        ])
        .await;

    assert_eq!(
        body,
        json!({"ok": false, "reason": "validation", "detail": "name required"})
    );
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn test_connection_error_hides_transport_details() {
    let spy = SpyTransport::new(Mode::ConnectionError);
    let server = TestServer::start(spy.clone()).await;
    let inputs = server.honeypot().await;

    let body = server
        .post(&[
            ("name", "Jane"),
            ("email", "jane@x.com"),
            ("message", "hi"),
            (inputs.token_field_name.as_str(), inputs.token.as_str()),
        ])
        .await;

    assert_eq!(body, json!({"ok": false, "reason": "delivery"}));
    let rendered = body.to_string();
    assert!(!rendered.contains("smtp.internal.example"));
    assert!(!rendered.contains("refused"));
    assert_eq!(spy.calls(), 1);
}

#[tokio::test]
async fn test_rejected_message_is_delivery_failure() {
    let spy = SpyTransport::new(Mode::Reject);
    let server = TestServer::start(spy.clone()).await;
    let inputs = server.honeypot().await;

    let body = server
        .post(&[
            ("name", "Jane"),
            ("email", "jane@x.com"),
            ("message", "hi"),
            (inputs.token_field_name.as_str(), inputs.token.as_str()),
        ])
        .await;

    assert_eq!(body, json!({"ok": false, "reason": "delivery"}));
    assert!(!body.to_string().contains("relay denied"));
}

#[tokio::test]
async fn test_non_form_body_is_delivery_failure() {
    let spy = SpyTransport::new(Mode::Accept);
    let server = TestServer::start(spy.clone()).await;

    let response = server
        .client
        .post(format!("{}/contact", server.base_url))
        .header("content-type", "application/json")
        .body(r#"{"name":"Jane"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
    assert_eq!(body, json!({"ok": false, "reason": "delivery"}));
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn test_healthz() {
    let server = TestServer::start(SpyTransport::new(Mode::Accept)).await;
    let body = reqwest::get(format!("{}/healthz", server.base_url))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}
