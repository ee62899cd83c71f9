use stackchat_application::{
    ChatTurnOrchestrator, ModelAvailability, ModelSetupService, TurnOutcome,
};
use stackchat_core::backend::{
    Backend, BackendError, ChatRequest, DeployRequest, ModelDescriptor, Readiness,
};
use stackchat_core::device::{Device, Platform};
use stackchat_core::retry::RetryPolicy;
use stackchat_core::session::{Message, MessageRole, Session, TurnState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted backend: each chat call pops the next reply after its delay.
#[derive(Default)]
struct MockBackend {
    replies: Mutex<VecDeque<(Duration, Result<String, BackendError>)>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    deploy_requests: Mutex<Vec<DeployRequest>>,
    registry: Vec<ModelDescriptor>,
    probes_until_ready: Mutex<u32>,
}

impl MockBackend {
    fn with_replies(replies: Vec<(Duration, Result<String, BackendError>)>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    async fn probe(&self) -> Readiness {
        let mut remaining = self.probes_until_ready.lock().unwrap();
        if *remaining == 0 {
            Readiness::Ready
        } else {
            *remaining -= 1;
            Readiness::Refused
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>, BackendError> {
        Ok(self.registry.clone())
    }

    async fn list_available_models(&self) -> Result<serde_json::Value, BackendError> {
        Ok(serde_json::json!({"data": []}))
    }

    async fn fetch_usage_metrics(&self) -> Result<serde_json::Value, BackendError> {
        Err(BackendError::Status {
            status: 404,
            body: "not found".to_string(),
        })
    }

    async fn deploy_model(&self, request: &DeployRequest) -> Result<(), BackendError> {
        self.deploy_requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn send_chat_turn(&self, request: &ChatRequest) -> Result<String, BackendError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let (delay, reply) = next.unwrap_or((Duration::ZERO, Err(BackendError::Disconnected)));
        tokio::time::sleep(delay).await;
        reply
    }
}

fn ok(text: &str) -> (Duration, Result<String, BackendError>) {
    (Duration::from_millis(100), Ok(text.to_string()))
}

fn session_with_model() -> Session {
    let mut session = Session::new();
    session.select_model("tiny");
    session
}

fn assert_usage_consistent(session: &Session) {
    let usage = session.usage();
    assert_eq!(usage.samples().len() as u64, usage.request_count());
    assert_eq!(usage.request_count() as usize, session.assistant_message_count());
    assert_eq!(
        usage.total_estimated_tokens(),
        usage.samples().iter().map(|s| s.estimated_tokens).sum::<u64>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_single_turn() {
    let backend = Arc::new(MockBackend::with_replies(vec![(
        Duration::from_millis(500),
        Ok("Hello there friend".to_string()),
    )]));
    let orchestrator = ChatTurnOrchestrator::new(backend.clone());
    let mut session = session_with_model();

    let outcome = orchestrator.run_turn(&mut session, "Hi").await.unwrap();

    let TurnOutcome::Completed(turn) = outcome else {
        panic!("expected a completed turn");
    };
    assert_eq!(turn.reply, "Hello there friend");
    assert_eq!(
        session.transcript(),
        &[Message::user("Hi"), Message::assistant("Hello there friend")]
    );
    assert_eq!(session.usage().request_count(), 1);
    assert_eq!(session.usage().total_estimated_tokens(), 3);
    let sample = &session.usage().samples()[0];
    assert_eq!(sample.estimated_tokens, 3);
    assert!((sample.elapsed_seconds - 0.5).abs() < 0.01, "{}", sample.elapsed_seconds);
    assert_eq!(session.turn_state(), TurnState::Completed);

    let request = &backend.chat_requests()[0];
    assert_eq!(request.model, "tiny");
    assert_eq!(request.max_tokens, 500);
    assert_eq!(request.temperature, 0.7);
    assert_eq!(request.top_p, Some(0.95));
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[1], Message::user("Hi"));
}

#[tokio::test(start_paused = true)]
async fn test_successive_turns_send_full_history() {
    let backend = Arc::new(MockBackend::with_replies(vec![
        ok("First answer"),
        ok("Second answer here"),
        ok("Third"),
    ]));
    let orchestrator = ChatTurnOrchestrator::new(backend.clone());
    let mut session = session_with_model();

    for input in ["one", "two", "three"] {
        let outcome = orchestrator.run_turn(&mut session, input).await.unwrap();
        assert!(outcome.is_completed());
        assert_usage_consistent(&session);
    }

    assert_eq!(session.transcript().len(), 6);
    assert_eq!(session.usage().request_count(), 3);
    // 2 words -> 2, 3 words -> 3, 1 word -> 1
    assert_eq!(session.usage().total_estimated_tokens(), 6);

    let third = &backend.chat_requests()[2];
    // system + 2 full turns + the new user message
    assert_eq!(third.messages.len(), 6);
    assert_eq!(third.messages[5], Message::user("three"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_turn_keeps_only_user_message() {
    let backend = Arc::new(MockBackend::with_replies(vec![
        ok("Hello there friend"),
        (Duration::ZERO, Err(BackendError::Disconnected)),
    ]));
    let orchestrator = ChatTurnOrchestrator::new(backend);
    let mut session = session_with_model();
    orchestrator.run_turn(&mut session, "Hi").await.unwrap();
    let usage_before = session.usage().clone();
    let len_before = session.transcript().len();

    let outcome = orchestrator.run_turn(&mut session, "Still there?").await.unwrap();

    let TurnOutcome::Failed(failure) = outcome else {
        panic!("expected a failed turn");
    };
    assert!(failure.is_disconnected());
    assert!(!failure.is_warning());
    assert_eq!(session.transcript().len(), len_before + 1);
    assert_eq!(session.transcript().last(), Some(&Message::user("Still there?")));
    assert_eq!(session.usage(), &usage_before);
    assert_eq!(session.turn_state(), TurnState::Failed);
    assert_usage_consistent(&session);
}

#[tokio::test(start_paused = true)]
async fn test_repetition_stop_is_a_warning_and_session_continues() {
    let backend = Arc::new(MockBackend::with_replies(vec![
        (
            Duration::ZERO,
            Err(BackendError::from_chat_failure("stopped: imitating loop detected")),
        ),
        ok("Better now"),
    ]));
    let orchestrator = ChatTurnOrchestrator::new(backend);
    let mut session = session_with_model();

    let first = orchestrator.run_turn(&mut session, "Repeat forever").await.unwrap();
    let TurnOutcome::Failed(failure) = first else {
        panic!("expected a failed turn");
    };
    assert!(failure.is_warning());

    let second = orchestrator.run_turn(&mut session, "Something else").await.unwrap();
    assert!(second.is_completed());
    assert_eq!(session.transcript().len(), 3);
    assert_eq!(session.usage().request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blank_reply_fails_turn_without_usage() {
    let backend = Arc::new(MockBackend::with_replies(vec![ok("  \n ")]));
    let orchestrator = ChatTurnOrchestrator::new(backend);
    let mut session = session_with_model();

    let outcome = orchestrator.run_turn(&mut session, "Hi").await.unwrap();

    let TurnOutcome::Failed(failure) = outcome else {
        panic!("expected a failed turn");
    };
    assert!(matches!(failure.error, BackendError::Decode(_)));
    assert_eq!(session.transcript(), &[Message::user("Hi")]);
    assert_eq!(session.usage().request_count(), 0);
    assert_eq!(session.turn_state(), TurnState::Failed);
    assert_usage_consistent(&session);
}

#[tokio::test]
async fn test_turn_rejected_without_model_or_input() {
    let backend = Arc::new(MockBackend::default());
    let orchestrator = ChatTurnOrchestrator::new(backend.clone());
    let mut session = Session::new();

    let err = orchestrator.run_turn(&mut session, "Hi").await.unwrap_err();
    assert!(err.is_session());

    session.select_model("tiny");
    let err = orchestrator.run_turn(&mut session, "   ").await.unwrap_err();
    assert!(err.is_session());

    assert!(session.transcript().is_empty());
    assert_eq!(session.turn_state(), TurnState::Idle);
    assert!(backend.chat_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_parameter_changes_apply_to_next_turn() {
    let backend = Arc::new(MockBackend::with_replies(vec![ok("Done")]));
    let orchestrator = ChatTurnOrchestrator::new(backend.clone());
    let mut session = session_with_model();
    session.set_temperature(0.2).unwrap();
    session.set_max_tokens(1200).unwrap();
    session.set_top_p(0.5).unwrap();
    session.set_system_prompt("Reply in one word.");

    orchestrator.run_turn(&mut session, "Go").await.unwrap();

    let request = &backend.chat_requests()[0];
    assert_eq!(request.temperature, 0.2);
    assert_eq!(request.max_tokens, 1200);
    assert_eq!(request.top_p, Some(0.5));
    assert_eq!(request.messages[0], Message::system("Reply in one word."));
}

#[tokio::test(start_paused = true)]
async fn test_setup_waits_then_reports_availability() {
    let backend = Arc::new(MockBackend {
        registry: vec![
            ModelDescriptor::new("a", "RUNNING"),
            ModelDescriptor::new("b", "STOPPED"),
        ],
        probes_until_ready: Mutex::new(1),
        ..MockBackend::default()
    });
    let service = ModelSetupService::new(backend.clone());
    let mut failures = 0;

    let ready = service
        .wait_until_ready(&RetryPolicy::interactive(), |_| failures += 1)
        .await;

    assert!(ready);
    assert_eq!(failures, 1);
    let availability = service.model_availability().await.unwrap();
    assert!(matches!(availability, ModelAvailability::Running(ref m) if m.len() == 1));
    assert!(backend.check_ready().await);
}

#[tokio::test]
async fn test_deploy_uses_platform_device() {
    let backend = Arc::new(MockBackend::default());

    let apple = ModelSetupService::new(backend.clone())
        .with_platform(Platform::new("macos", "aarch64"));
    let linux = ModelSetupService::new(backend.clone())
        .with_platform(Platform::new("linux", "x86_64"));
    let forced_cpu = ModelSetupService::new(backend.clone())
        .with_platform(Platform::new("macos", "aarch64"))
        .with_device_override(Some(Device::Cpu));

    apple.deploy("tiny").await.unwrap();
    linux.deploy("tiny").await.unwrap();
    forced_cpu.deploy("tiny").await.unwrap();

    let devices: Vec<Device> = backend
        .deploy_requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.device)
        .collect();
    assert_eq!(devices, vec![Device::Mps, Device::Cuda, Device::Cpu]);
}
