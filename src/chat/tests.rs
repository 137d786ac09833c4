use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

use super::*;
use crate::client::*;
use crate::core::error::{ChatError, TransportError, VoiceError};
use crate::core::message::{Message, Role};
use crate::core::session::SessionSummary;
use crate::core::settings::{Settings, Theme};
use crate::storage::{keys, KeyValueStore, MemoryStore};
use crate::voice::Speaker;

#[derive(Default)]
struct FakeBackend {
    chat_requests: Mutex<Vec<ChatRequest>>,
    chat_failure: Mutex<Option<TransportError>>,
    /// When set, `send_chat` waits for a notification before answering.
    gate: Option<Arc<Notify>>,
    reply_session: Mutex<Option<String>>,
    sessions: Mutex<Vec<SessionSummary>>,
    list_fails: Mutex<bool>,
    histories: Mutex<HashMap<String, Vec<Message>>>,
    deleted: Mutex<Vec<String>>,
    auth_ok: bool,
}

#[async_trait]
impl Backend for FakeBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, TransportError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = self.chat_failure.lock().unwrap().clone() {
            return Err(err);
        }
        let session_id = self
            .reply_session
            .lock()
            .unwrap()
            .clone()
            .or_else(|| request.session_id.clone())
            .unwrap();
        Ok(ChatReply {
            session_id,
            answer: format!("echo: {}", request.message),
            reasoning: crate::core::message::Reasoning::from_parts(
                Some("Analyzed your request".into()),
                Some("step one\nstep two".into()),
            ),
        })
    }

    async fn transcribe(&self, _: Vec<u8>, _: &str, _: &str) -> Result<String, TransportError> {
        Ok("transcribed".into())
    }

    async fn list_sessions(&self, _limit: u32) -> Result<Vec<SessionSummary>, TransportError> {
        if *self.list_fails.lock().unwrap() {
            return Err(TransportError::Network("connection refused".into()));
        }
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn get_session(&self, id: &str) -> Result<Vec<Message>, TransportError> {
        self.histories
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(TransportError::Api {
                status: 404,
                message: "Session not found".into(),
            })
    }

    async fn delete_session(&self, id: &str) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(id.to_string());
        self.sessions.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, TransportError> {
        Ok(AuthResponse {
            success: self.auth_ok,
            user: Some(User {
                id: Some("u1".into()),
                email: Some(req.email.clone()),
                name: Some(req.name.clone()),
                extra: Default::default(),
            }),
            token: None,
        })
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, TransportError> {
        if !self.auth_ok {
            return Err(TransportError::Api {
                status: 401,
                message: "Invalid credentials".into(),
            });
        }
        Ok(AuthResponse {
            success: true,
            user: Some(User {
                id: Some("u1".into()),
                email: Some(req.email.clone()),
                name: Some("Ada".into()),
                extra: Default::default(),
            }),
            token: Some("tok-123".into()),
        })
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        Ok(HealthStatus {
            status: "online".into(),
            message: None,
        })
    }

    async fn available_models(&self) -> Result<ModelCatalog, TransportError> {
        Ok(ModelCatalog {
            available_models: vec![],
            default_model: None,
            default_temperature: None,
        })
    }

    async fn admin_stats(&self, pin: &str) -> Result<AdminStats, TransportError> {
        if pin != "2010" {
            return Err(TransportError::Api {
                status: 401,
                message: "Invalid admin PIN".into(),
            });
        }
        Ok(AdminStats {
            status: "online".into(),
            uptime: "1h 2m".into(),
            total_requests: 3,
            active_sessions: 2,
            total_messages: 10,
            daily_messages: vec![],
        })
    }
}

#[derive(Default)]
struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) -> Result<(), VoiceError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn stop(&self) {}
}

struct Harness {
    controller: Arc<ChatController>,
    events: mpsc::UnboundedReceiver<UiEvent>,
    backend: Arc<FakeBackend>,
    store: Arc<MemoryStore>,
    speaker: Arc<RecordingSpeaker>,
}

impl Harness {
    fn drain(&mut self) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

async fn harness_with(backend: FakeBackend, store: Arc<MemoryStore>) -> Harness {
    let backend = Arc::new(backend);
    let speaker = Arc::new(RecordingSpeaker::default());
    let (controller, events) = ChatController::start(
        backend.clone(),
        store.clone(),
        speaker.clone(),
        ControllerOptions::default(),
    )
    .await
    .unwrap();
    Harness {
        controller: Arc::new(controller),
        events,
        backend,
        store,
        speaker,
    }
}

async fn harness() -> Harness {
    harness_with(FakeBackend::default(), Arc::new(MemoryStore::new())).await
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn test_fresh_start_persists_session_id() {
    let store = Arc::new(MemoryStore::new());
    let first = harness_with(FakeBackend::default(), store.clone()).await;
    let id = first.controller.session_id();
    assert_eq!(store.get(keys::SESSION_ID).await.unwrap().as_deref(), Some(id.as_str()));

    let second = harness_with(FakeBackend::default(), store).await;
    assert_eq!(second.controller.session_id(), id);
}

#[tokio::test]
async fn test_send_appends_user_then_assistant() {
    let mut h = harness().await;
    let reply = h.controller.send("hello").await.unwrap();
    assert_eq!(reply.answer, "echo: hello");

    let messages = h.controller.messages();
    assert_eq!(contents(&messages), ["hello", "echo: hello"]);
    assert_eq!(messages[0].role, Role::User);
    let reasoning = messages[1].reasoning.as_ref().unwrap();
    assert_eq!(reasoning.short, "Analyzed your request");
    assert_eq!(reasoning.full, "step one\nstep two");

    let request = h.backend.chat_requests.lock().unwrap()[0].clone();
    assert_eq!(request.session_id.as_deref(), Some(h.controller.session_id().as_str()));
    assert_eq!(request.model, Settings::default().model);
    assert!(request.image_data.is_none());

    let events = h.drain();
    let typing_start = events
        .iter()
        .position(|e| matches!(e, UiEvent::TypingStarted))
        .unwrap();
    let typing_stop = events
        .iter()
        .position(|e| matches!(e, UiEvent::TypingStopped))
        .unwrap();
    let first_append = events
        .iter()
        .position(|e| matches!(e, UiEvent::MessageAppended { .. }))
        .unwrap();
    assert!(first_append < typing_start, "user message is appended optimistically");
    assert!(typing_start < typing_stop);
    assert!(!h.controller.is_sending());
}

#[tokio::test]
async fn test_image_with_blank_text_uses_default_prompt() {
    let h = harness().await;
    h.controller
        .attach_image(ImageAttachment::from_bytes("cat.png", b"png-bytes").unwrap());
    h.controller.send("   ").await.unwrap();

    let request = h.backend.chat_requests.lock().unwrap()[0].clone();
    assert_eq!(request.message, DEFAULT_IMAGE_PROMPT);
    assert_eq!(request.image_type.as_deref(), Some("image/png"));
    assert!(request.image_data.is_some());

    let messages = h.controller.messages();
    assert_eq!(messages[0].content, DEFAULT_IMAGE_PROMPT);
    assert_eq!(messages[0].image.as_ref().unwrap().name, "cat.png");
    assert!(h.controller.pending_attachment().is_none());
}

#[tokio::test]
async fn test_blank_send_is_validation_failure() {
    let mut h = harness().await;
    h.drain();
    let err = h.controller.send("  ").await.unwrap_err();
    assert!(matches!(err, ChatError::Validation(_)));
    assert!(h.controller.messages().is_empty());
    assert!(h.backend.chat_requests.lock().unwrap().is_empty());
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::Notice { level: NoticeLevel::Error, .. })));
    assert!(!h.controller.is_sending());
}

#[tokio::test]
async fn test_second_send_rejected_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let backend = FakeBackend {
        gate: Some(gate.clone()),
        ..Default::default()
    };
    let h = harness_with(backend, Arc::new(MemoryStore::new())).await;

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.send("first").await });

    // Wait until the first request reached the backend.
    while h.backend.chat_requests.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(h.controller.is_sending());

    let second = h.controller.send("second").await;
    assert!(matches!(second, Err(ChatError::SendInFlight)));

    gate.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(contents(&h.controller.messages()), ["first", "echo: first"]);
    assert_eq!(h.backend.chat_requests.lock().unwrap().len(), 1);
    assert!(!h.controller.is_sending());

    // Idle again: the next send goes through.
    gate.notify_one();
    h.controller.send("third").await.unwrap();
    assert_eq!(h.controller.messages().len(), 4);
}

#[tokio::test]
async fn test_failed_send_keeps_user_message_and_adds_error_notice() {
    let backend = FakeBackend::default();
    *backend.chat_failure.lock().unwrap() = Some(TransportError::Api {
        status: 500,
        message: "API key not configured".into(),
    });
    let mut h = harness_with(backend, Arc::new(MemoryStore::new())).await;

    let err = h.controller.send("hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Transport(_)));

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert!(messages[1].local_only);
    assert!(messages[1].content.contains("API key not configured"));

    let events = h.drain();
    assert!(events.iter().any(|e| matches!(e, UiEvent::TypingStopped)));
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::Notice { level: NoticeLevel::Error, text } if text == "API key not configured"
    )));

    // Re-sendable after failure.
    *h.backend.chat_failure.lock().unwrap() = None;
    h.controller.send("again").await.unwrap();
    assert_eq!(h.controller.messages().len(), 4);
}

#[tokio::test]
async fn test_rate_limit_records_hint() {
    let backend = FakeBackend::default();
    *backend.chat_failure.lock().unwrap() = Some(TransportError::RateLimited(
        "Rate limit exceeded. Please wait before sending more messages.".into(),
    ));
    let h = harness_with(backend, Arc::new(MemoryStore::new())).await;
    let _ = h.controller.send("hello").await;

    let hint = h.store.get(keys::RATE_LIMIT_HINT).await.unwrap().unwrap();
    assert!(hint.starts_with("Rate limit exceeded"));
}

#[tokio::test]
async fn test_backend_session_id_is_adopted() {
    let backend = FakeBackend::default();
    *backend.reply_session.lock().unwrap() = Some("server-session".into());
    let h = harness_with(backend, Arc::new(MemoryStore::new())).await;

    h.controller.send("hello").await.unwrap();
    assert_eq!(h.controller.session_id(), "server-session");
    assert_eq!(
        h.store.get(keys::SESSION_ID).await.unwrap().as_deref(),
        Some("server-session")
    );
}

#[tokio::test]
async fn test_send_refreshes_session_list() {
    let backend = FakeBackend::default();
    backend.sessions.lock().unwrap().push(SessionSummary {
        id: "s1".into(),
        title: Some("hello".into()),
        message_count: 2,
    });
    let h = harness_with(backend, Arc::new(MemoryStore::new())).await;
    h.controller.send("hello").await.unwrap();
    assert_eq!(h.controller.sessions().len(), 1);
}

#[tokio::test]
async fn test_voice_output_speaks_assistant_messages_only() {
    let h = harness().await;
    h.controller.send("quiet").await.unwrap();
    assert!(h.speaker.spoken.lock().unwrap().is_empty());

    let settings = Settings {
        voice_output: true,
        ..h.controller.settings()
    };
    h.controller.update_settings(settings).await.unwrap();
    h.controller.send("loud").await.unwrap();
    assert_eq!(*h.speaker.spoken.lock().unwrap(), vec!["echo: loud".to_string()]);
}

#[tokio::test]
async fn test_new_chat_rotates_and_clears() {
    let mut h = harness().await;
    h.controller.send("hello").await.unwrap();
    let before = h.controller.session_id();
    h.drain();

    let after = h.controller.new_chat().await.unwrap();
    assert_ne!(before, after);
    assert!(h.controller.messages().is_empty());
    assert_eq!(h.controller.stats(), LogStats::default());
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::TranscriptCleared { session_id } if *session_id == after)));
}

#[tokio::test]
async fn test_load_session_replaces_everything() {
    let backend = FakeBackend::default();
    backend.histories.lock().unwrap().insert(
        "other".into(),
        vec![
            Message::user("old question", None),
            Message::assistant("old answer", None),
        ],
    );
    let mut h = harness_with(backend, Arc::new(MemoryStore::new())).await;
    h.controller.send("current").await.unwrap();
    h.drain();

    h.controller.load_session("other").await.unwrap();
    assert_eq!(h.controller.session_id(), "other");
    assert_eq!(contents(&h.controller.messages()), ["old question", "old answer"]);
    assert_eq!(
        h.store.get(keys::SESSION_ID).await.unwrap().as_deref(),
        Some("other")
    );

    let events = h.drain();
    match &events[0] {
        UiEvent::TranscriptReplaced {
            session_id,
            messages,
        } => {
            assert_eq!(session_id, "other");
            assert_eq!(contents(messages), ["old question", "old answer"]);
        }
        other => panic!("unexpected first event {other:?}"),
    }
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::SessionsUpdated { active, .. } if active == "other")));
}

#[tokio::test]
async fn test_failed_load_leaves_session_untouched() {
    let h = harness().await;
    h.controller.send("keep me").await.unwrap();
    let id = h.controller.session_id();

    let err = h.controller.load_session("missing").await.unwrap_err();
    assert!(err.user_message().contains("Session not found"));
    assert_eq!(h.controller.session_id(), id);
    assert_eq!(contents(&h.controller.messages()), ["keep me", "echo: keep me"]);
}

#[tokio::test]
async fn test_refresh_failure_keeps_sidebar() {
    let backend = FakeBackend::default();
    backend.sessions.lock().unwrap().push(SessionSummary {
        id: "s1".into(),
        title: None,
        message_count: 1,
    });
    let mut h = harness_with(backend, Arc::new(MemoryStore::new())).await;
    assert_eq!(h.controller.refresh_sessions().await.len(), 1);
    h.drain();

    *h.backend.list_fails.lock().unwrap() = true;
    let sessions = h.controller.refresh_sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(h.controller.sessions().len(), 1);
    assert!(h.drain().is_empty(), "silent failure emits nothing");
}

#[tokio::test]
async fn test_delete_active_session_starts_new_one() {
    let h = harness().await;
    let active = h.controller.session_id();
    h.backend.sessions.lock().unwrap().push(SessionSummary {
        id: active.clone(),
        title: None,
        message_count: 2,
    });
    h.controller.send("hello").await.unwrap();

    h.controller.delete_session(&active).await.unwrap();
    assert_eq!(*h.backend.deleted.lock().unwrap(), vec![active.clone()]);
    assert_ne!(h.controller.session_id(), active);
    assert!(h.controller.messages().is_empty());
    assert!(h.controller.sessions().is_empty());
}

#[tokio::test]
async fn test_delete_other_session_keeps_current() {
    let h = harness().await;
    h.controller.send("hello").await.unwrap();
    let active = h.controller.session_id();

    h.controller.delete_session("someone-else").await.unwrap();
    assert_eq!(h.controller.session_id(), active);
    assert_eq!(h.controller.messages().len(), 2);
}

#[tokio::test]
async fn test_export_json_has_three_messages_in_order() {
    let h = harness().await;
    h.controller.send("one").await.unwrap();
    h.controller
        .attach_image(ImageAttachment::from_bytes("a.gif", b"gif").unwrap());
    *h.backend.chat_failure.lock().unwrap() = Some(TransportError::Network("down".into()));
    let _ = h.controller.send("two").await;
    // one, echo: one, two, error notice
    let blob = h.controller.export(ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob.bytes).unwrap();
    let messages = value["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["content"], "one");
    assert_eq!(messages[2]["content"], "two");
    assert_eq!(messages[2]["image"]["media_type"], "image/gif");
    assert_eq!(value["session_id"], h.controller.session_id());
}

#[tokio::test]
async fn test_backup_then_restore_round_trip() {
    let h = harness().await;
    h.controller.send("remember me").await.unwrap();
    let backup = h.controller.backup().await.unwrap();
    let json = serde_json::to_string_pretty(&backup).unwrap();

    let other = harness().await;
    other.controller.restore(&json).await.unwrap();
    assert_eq!(other.controller.session_id(), h.controller.session_id());
    assert_eq!(
        contents(&other.controller.messages()),
        ["remember me", "echo: remember me"]
    );
    assert_eq!(
        other.store.get(keys::SESSION_ID).await.unwrap(),
        Some(h.controller.session_id())
    );
}

#[tokio::test]
async fn test_restore_without_version_changes_nothing() {
    let h = harness().await;
    h.controller.send("stay").await.unwrap();
    let settings_before = h.controller.settings();
    let session_before = h.controller.session_id();
    let snapshot_before = h.store.snapshot().await.unwrap();

    let json = r#"{"settings": {"theme": "light"}, "storage": {"session_id": "evil"}}"#;
    let err = h.controller.restore(json).await.unwrap_err();
    assert!(matches!(err, ChatError::Backup(_)));

    assert_eq!(h.controller.settings(), settings_before);
    assert_eq!(h.controller.session_id(), session_before);
    assert_eq!(h.controller.messages().len(), 2);
    assert_eq!(h.store.snapshot().await.unwrap(), snapshot_before);
}

#[tokio::test]
async fn test_restore_overwrites_storage_and_settings() {
    let mut h = harness().await;
    let json = r##"{
        "version": "1.0",
        "settings": {"theme": "light", "accent_color": "#10b981"},
        "storage": {"session_id": "restored", "max_messages": "20"}
    }"##;
    h.controller.restore(json).await.unwrap();

    let settings = h.controller.settings();
    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.accent_color, "#10b981");
    assert_eq!(h.controller.session_id(), "restored");
    assert_eq!(
        h.store.get(keys::MAX_MESSAGES).await.unwrap().as_deref(),
        Some("20")
    );
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::ThemeChanged { theme: Theme::Light, .. })));
}

#[tokio::test]
async fn test_restore_reloads_user_and_message_limit() {
    let mut h = harness().await;
    let json = r#"{
        "version": "1.0",
        "settings": {},
        "storage": {"user": "{\"name\": \"Grace\"}", "max_messages": "2"}
    }"#;
    h.controller.restore(json).await.unwrap();

    assert_eq!(h.controller.user().unwrap().display_name(), "Grace");
    assert!(h.drain().iter().any(|e| matches!(
        e,
        UiEvent::UserChanged { user: Some(u) } if u.display_name() == "Grace"
    )));

    h.controller.send("hi").await.unwrap();
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::Notice { level: NoticeLevel::Warning, .. })));
}

#[tokio::test]
async fn test_restore_with_blank_session_id_changes_nothing() {
    let h = harness().await;
    let session_before = h.controller.session_id();
    let snapshot_before = h.store.snapshot().await.unwrap();

    let json = r#"{
        "version": "1.0",
        "settings": {},
        "session": {"session_id": "", "messages": []}
    }"#;
    let err = h.controller.restore(json).await.unwrap_err();
    assert!(matches!(err, ChatError::Backup(_)));

    assert_eq!(h.controller.session_id(), session_before);
    assert_eq!(h.store.snapshot().await.unwrap(), snapshot_before);
}

#[tokio::test]
async fn test_restore_writes_settings_with_storage() {
    let h = harness().await;
    let json = r#"{
        "version": "1.0",
        "settings": {"model": "restored-model", "temperature": 0.2},
        "storage": {"model": "stale-model"}
    }"#;
    h.controller.restore(json).await.unwrap();

    assert_eq!(h.controller.settings().model, "restored-model");
    assert_eq!(
        h.store.get(keys::MODEL).await.unwrap().as_deref(),
        Some("restored-model")
    );
    assert_eq!(
        h.store.get(keys::TEMPERATURE).await.unwrap().as_deref(),
        Some("0.2")
    );
}

#[tokio::test]
async fn test_reset_settings_reapplies_default_theme() {
    let mut h = harness().await;
    let custom = Settings {
        theme: Theme::Light,
        temperature: 1.5,
        ..Settings::default()
    };
    h.controller.update_settings(custom).await.unwrap();
    h.drain();

    let reset = h.controller.reset_settings().await.unwrap();
    assert_eq!(reset, Settings::default());
    assert_eq!(h.controller.settings(), Settings::default());
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::ThemeChanged { theme: Theme::Dark, .. })));
}

#[tokio::test]
async fn test_login_persists_user_and_token() {
    let backend = FakeBackend {
        auth_ok: true,
        ..Default::default()
    };
    let h = harness_with(backend, Arc::new(MemoryStore::new())).await;
    let user = h.controller.login("ada@example.com", "secret").await.unwrap();
    assert_eq!(user.display_name(), "Ada");
    assert_eq!(
        h.store.get(keys::AUTH_TOKEN).await.unwrap().as_deref(),
        Some("tok-123")
    );
    assert!(h.store.get(keys::USER).await.unwrap().is_some());

    h.controller.logout().await.unwrap();
    assert!(h.controller.user().is_none());
    assert!(h.store.get(keys::USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_validation_and_failure() {
    let h = harness().await;
    assert!(matches!(
        h.controller.login("", "pw").await,
        Err(ChatError::Validation(_))
    ));
    let err = h.controller.login("a@b.c", "wrong").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(h.controller.user().is_none());
}

#[tokio::test]
async fn test_register_unsuccessful_response_is_rejected() {
    let h = harness().await;
    let result = h.controller.register("a@b.c", "pw", "").await;
    assert!(matches!(result, Err(ChatError::Validation(_))));
    assert!(h.store.get(keys::USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stored_user_is_restored_on_start() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(keys::USER, r#"{"id": "u9", "name": "Grace"}"#)
        .await
        .unwrap();
    let h = harness_with(FakeBackend::default(), store).await;
    assert_eq!(h.controller.user().unwrap().display_name(), "Grace");
}

#[tokio::test]
async fn test_max_messages_warning() {
    let store = Arc::new(MemoryStore::new());
    store.set(keys::MAX_MESSAGES, "2").await.unwrap();
    let mut h = harness_with(FakeBackend::default(), store).await;
    h.controller.send("hi").await.unwrap();
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, UiEvent::Notice { level: NoticeLevel::Warning, .. })));
}

#[tokio::test]
async fn test_admin_report_with_and_without_pin() {
    let h = harness().await;
    h.controller.send("count me").await.unwrap();

    let report = h.controller.admin_report(None).await;
    assert_eq!(report.stats.message_count, 2);
    assert_eq!(report.backend.as_ref().unwrap().status, "online");
    assert!(report.remote.is_none());

    let report = h.controller.admin_report(Some("2010")).await;
    assert_eq!(report.remote.unwrap().unwrap().total_messages, 10);

    let report = h.controller.admin_report(Some("0000")).await;
    assert_eq!(report.remote.unwrap().unwrap_err(), "Invalid admin PIN");
}
