//! Shared fixtures for router-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use nexcall_agent::{AgentError, ChatAgent, LlmConfig, ResponseGenerator};
use nexcall_db::DbPool;
use nexcall_server::{
    app,
    config::DatabaseConfig,
    conversation::{ConversationStore, InMemoryConversationStore},
    lifecycle::CallLifecycleHandler,
    persistence::SqliteCallStore,
    AppState,
};
use nexcall_telephony::{
    MarkupOptions, ProviderCall, ProviderRecording, TelephonyError, TelephonyProvider,
};
use nexcall_types::{AgentReply, CallDirection, CallStatus, Turn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const GREETING: &str = "Bonjour, NexCallAI à votre écoute.";
pub const WEBHOOK_URL: &str = "https://hooks.test/api/twiml";
pub const CALLER_ID: &str = "+33100000000";

/// Generator whose replies are queued by the test. An empty queue answers
/// with a plain acknowledgement.
#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<AgentReply, AgentError>>>,
    pub histories: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: Result<AgentReply, AgentError>) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedAgent {
    fn greeting(&self) -> String {
        GREETING.to_string()
    }

    async fn next_reply(&self, history: &[Turn]) -> Result<AgentReply, AgentError> {
        self.histories.lock().unwrap().push(history.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AgentReply::say("D'accord, je note.")))
    }

    async fn summarize(&self, history: &[Turn]) -> String {
        format!("Résumé de {} échanges", history.len())
    }
}

/// A real chat agent pointed at a port nothing listens on.
pub fn unreachable_agent() -> ChatAgent {
    let config = LlmConfig {
        base_url: "http://127.0.0.1:9/v1".to_string(),
        api_key: "test-key".to_string(),
        timeout_ms: 500,
        ..LlmConfig::default()
    };
    ChatAgent::new(Default::default(), &config).unwrap()
}

/// Telephony provider double that records what it was asked to do.
pub struct FakeTelephony {
    pub fail: bool,
    pub placed: Mutex<Vec<(String, String, String)>>,
    pub ended: Mutex<Vec<String>>,
}

impl FakeTelephony {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            placed: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
        }
    }

    fn check(&self) -> Result<(), TelephonyError> {
        if self.fail {
            return Err(TelephonyError::Provider {
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn call(sid: &str, status: CallStatus) -> ProviderCall {
        ProviderCall {
            sid: sid.to_string(),
            to: Some("+33600000000".to_string()),
            from: Some(CALLER_ID.to_string()),
            status,
            direction: Some(CallDirection::Outbound),
            start_time: None,
            end_time: None,
            duration_secs: Some(12),
        }
    }
}

#[async_trait]
impl TelephonyProvider for FakeTelephony {
    async fn initiate_call(
        &self,
        to: &str,
        from: &str,
        callback_url: &str,
    ) -> Result<ProviderCall, TelephonyError> {
        self.check()?;
        self.placed
            .lock()
            .unwrap()
            .push((to.to_string(), from.to_string(), callback_url.to_string()));
        let mut call = Self::call("CA-new", CallStatus::Queued);
        call.to = Some(to.to_string());
        call.from = Some(from.to_string());
        Ok(call)
    }

    async fn fetch_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError> {
        self.check()?;
        Ok(Self::call(call_sid, CallStatus::InProgress))
    }

    async fn end_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError> {
        self.check()?;
        self.ended.lock().unwrap().push(call_sid.to_string());
        Ok(Self::call(call_sid, CallStatus::Completed))
    }

    async fn start_recording(&self, call_sid: &str) -> Result<ProviderRecording, TelephonyError> {
        self.check()?;
        Ok(ProviderRecording {
            sid: "RE1".to_string(),
            call_sid: Some(call_sid.to_string()),
            status: Some("in-progress".to_string()),
        })
    }
}

pub struct Harness {
    pub app: Router,
    pub pool: DbPool,
    pub conversations: Arc<dyn ConversationStore>,
    pub telephony: Arc<FakeTelephony>,
    _dir: TempDir,
}

/// Builds the full router over a fresh on-disk database.
pub fn harness(agent: Arc<dyn ResponseGenerator>) -> Harness {
    harness_with(agent, FakeTelephony::new(false))
}

pub fn harness_with(agent: Arc<dyn ResponseGenerator>, telephony: FakeTelephony) -> Harness {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nexcall.db");
    let pool = nexcall_db::create_pool(
        path.to_str().unwrap(),
        DatabaseConfig::default().runtime_settings(),
    )
    .unwrap();
    nexcall_db::run_migrations(&pool.get().unwrap()).unwrap();

    let conversations: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
    let records = SqliteCallStore::new(pool.clone(), Duration::from_secs(2));
    let lifecycle = CallLifecycleHandler::new(
        agent,
        Arc::new(records),
        conversations.clone(),
        MarkupOptions::default(),
    );
    let telephony = Arc::new(telephony);

    let app = app(AppState {
        pool: pool.clone(),
        lifecycle,
        telephony: telephony.clone(),
        caller_id: CALLER_ID.to_string(),
        webhook_url: WEBHOOK_URL.to_string(),
        webhook_path: "/api/twiml".to_string(),
    });

    Harness {
        app,
        pool,
        conversations,
        telephony,
        _dir: dir,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        content_type,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

/// Posts a form-encoded webhook, as the provider does.
pub async fn post_form(app: &Router, uri: &str, form: &str) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn json_request(app: &Router, method: &str, uri: &str, body: serde_json::Value) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}
