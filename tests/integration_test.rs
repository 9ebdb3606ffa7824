//! Integration tests for campaignd
//!
//! End-to-end scenarios for the readiness poller and the assistant memory
//! manager, driven through the public API only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use campaignd::assistant::{EMPTY_INPUT_REPLY, MemoryManager, MessageWindow, estimated_tokens};
use campaignd::config::{AssistantConfig, PollerConfig};
use campaignd::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message};
use campaignd::poller::{
    GenerationPoller, JobId, JobStatus, JobStatusSource, Navigator, PollError, PollOutcome, PollPhase, PollRequest,
    StatusError,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Reports "not ready" for a fixed number of checks, then "ready"
struct CountdownSource {
    not_ready_for: Option<usize>,
    calls: AtomicUsize,
}

impl CountdownSource {
    fn ready_after(checks: usize) -> Arc<Self> {
        Arc::new(Self {
            not_ready_for: Some(checks),
            calls: AtomicUsize::new(0),
        })
    }

    fn never_ready() -> Arc<Self> {
        Arc::new(Self {
            not_ready_for: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusSource for CountdownSource {
    async fn check(&self, job_id: &JobId, _auth_token: Option<&str>) -> Result<JobStatus, StatusError> {
        let seen = self.calls.fetch_add(1, Ordering::SeqCst);
        let ready = self.not_ready_for.is_some_and(|n| seen >= n);
        Ok(JobStatus {
            job_id: job_id.to_string(),
            result_ready: ready,
            result: ready.then(|| serde_json::json!({ "campaign": "Summer collab" })),
        })
    }
}

#[derive(Default)]
struct RecordingNavigator {
    calls: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, job_id: &JobId, _result: Option<&serde_json::Value>) {
        self.calls.lock().unwrap().push(job_id.to_string());
    }
}

/// LLM stand-in that replays scripted replies and records requests
struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<CompletionResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }
}

fn request(job: &str) -> PollRequest {
    PollRequest::from_stored(Some(job), Some("bearer-token")).expect("valid job id")
}

// =============================================================================
// Poller scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_ready_after_forty_polls() {
    let source = CountdownSource::ready_after(40);
    let navigator = Arc::new(RecordingNavigator::default());
    let poller = GenerationPoller::new(source.clone(), navigator.clone(), PollerConfig::default());

    let outcome = poller.start(&request("X"), CancellationToken::new()).await.unwrap();

    match outcome {
        PollOutcome::Navigated { job_id, attempts, result } => {
            assert_eq!(job_id.as_str(), "X");
            assert_eq!(attempts, 41);
            assert_eq!(result.unwrap()["campaign"], "Summer collab");
        }
        other => panic!("expected navigation, got {:?}", other),
    }
    assert_eq!(source.calls(), 41);
    assert_eq!(navigator.count(), 1);

    let snapshot = poller.snapshot();
    assert_eq!(
        snapshot.transitions,
        vec![PollPhase::Polling, PollPhase::ReadyPendingAnimation, PollPhase::Complete]
    );
    assert_eq!(snapshot.progress, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_never_ready_times_out() {
    let source = CountdownSource::never_ready();
    let navigator = Arc::new(RecordingNavigator::default());
    let poller = GenerationPoller::new(source.clone(), navigator.clone(), PollerConfig::default());

    let result = poller.start(&request("X"), CancellationToken::new()).await;

    assert!(matches!(result, Err(PollError::TimedOut { attempts: 100 })));
    assert_eq!(source.calls(), 100);
    assert_eq!(navigator.count(), 0);
    assert_eq!(poller.snapshot().phase, PollPhase::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_missing_job_fails_before_polling() {
    let source = CountdownSource::ready_after(0);
    let navigator = Arc::new(RecordingNavigator::default());
    let poller = GenerationPoller::new(source.clone(), navigator.clone(), PollerConfig::default());

    let result = poller.start_stored(None, Some("bearer-token"), CancellationToken::new()).await;

    assert!(matches!(result, Err(PollError::MissingJob)));
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_freezes_state() {
    let source = CountdownSource::never_ready();
    let navigator = Arc::new(RecordingNavigator::default());
    let poller = Arc::new(GenerationPoller::new(source.clone(), navigator.clone(), PollerConfig::default()));
    let cancel = CancellationToken::new();

    let run = {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.start(&request("X"), cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    assert_eq!(run.await.unwrap().unwrap(), PollOutcome::Cancelled);

    let frozen = poller.snapshot();
    let calls = source.calls();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(poller.snapshot().revision, frozen.revision);
    assert_eq!(source.calls(), calls);
    assert_eq!(navigator.count(), 0);
}

// =============================================================================
// Memory manager scenarios
// =============================================================================

#[test]
fn test_scenario_fifty_messages_within_budget() {
    let preamble = "p".repeat(400);
    let acknowledgement = "a".repeat(400);
    let mut window = MessageWindow::seeded(preamble.clone(), acknowledgement.clone(), 3000);

    for i in 0..50 {
        let content = format!("{:03}{}", i, "m".repeat(397));
        assert_eq!(estimated_tokens(&content), 100);
        window.append_and_enforce_budget(Message::user(content));
    }

    let messages = window.to_vec();
    assert_eq!(messages.len(), 30);
    assert_eq!(window.total_tokens(), 3000);
    assert_eq!(messages[0].content, preamble);
    assert_eq!(messages[1].content, acknowledgement);
    assert!(messages[2].content.starts_with("022"));
    assert!(messages[29].content.starts_with("049"));
}

#[tokio::test]
async fn test_scenario_empty_message_gets_canned_reply() {
    let llm = ScriptedLlm::new(vec![Ok(CompletionResponse::text("Hello!"))]);
    let manager = MemoryManager::new(llm.clone(), AssistantConfig::default());

    assert_eq!(manager.respond("s1", "hi").await, "Hello!");
    let before = manager.sessions().history("s1").await.unwrap().messages.len();

    assert_eq!(manager.respond("s1", "").await, EMPTY_INPUT_REPLY);
    let after = manager.sessions().history("s1").await.unwrap().messages.len();

    assert_eq!(before, after);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn test_conversation_continuity_across_turns() {
    let llm = ScriptedLlm::new(vec![
        Ok(CompletionResponse::text("Which platform?")),
        Ok(CompletionResponse::text("Then short-form video works best.")),
    ]);
    let manager = MemoryManager::new(llm.clone(), AssistantConfig::default());

    manager.append_and_respond("s1", "I want to launch a campaign").await.unwrap();
    manager.append_and_respond("s1", "Instagram").await.unwrap();

    let second = llm.requests.lock().unwrap()[1].clone();
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&contents[2..], &["I want to launch a campaign", "Which platform?", "Instagram"]);
}

// =============================================================================
// HTTP surface
// =============================================================================

#[tokio::test]
async fn test_http_message_roundtrip() {
    let llm = ScriptedLlm::new(vec![Ok(CompletionResponse::text("Sure, let's plan it."))]);
    let manager = Arc::new(MemoryManager::new(llm, AssistantConfig::default()));
    let app = campaignd::server::build_router(Arc::clone(&manager));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/assistant/message")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"sessionId":"web-1","userMessage":"Help me plan"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["reply"], "Sure, let's plan it.");

    let response = app
        .oneshot(Request::builder().uri("/assistant/sessions/web-1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["turns"], 1);
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
}
