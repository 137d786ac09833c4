use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tokio::sync::mpsc;

use crate::chat::backup::{parse_backup, BackupEnvelope, SessionSnapshot};
use crate::chat::export::{export, ExportBlob, ExportContext, ExportFormat};
use crate::chat::{ImageAttachment, LogStats, MessageLog, NoticeLevel, UiEvent};
use crate::client::{
    AdminStats, AuthResponse, Backend, ChatReply, ChatRequest, HealthStatus, LoginRequest,
    ModelCatalog, RegisterRequest, User,
};
use crate::core::error::{ChatError, StorageError, TransportError};
use crate::core::message::{ImageRef, Message, Role};
use crate::core::session::{SessionIdentity, SessionSummary};
use crate::core::settings::{Settings, SettingsStore};
use crate::storage::{keys, KeyValueStore};
use crate::voice::Speaker;

/// Sent in place of blank text when only an image is attached.
pub const DEFAULT_IMAGE_PROMPT: &str = "What is in this image?";

const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub session_list_limit: u32,
    /// Fallbacks for settings that are absent from the store.
    pub default_settings: Settings,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            session_list_limit: 50,
            default_settings: Settings::default(),
        }
    }
}

pub(super) struct ChatState {
    pub(super) session_id: String,
    pub(super) log: MessageLog,
    pub(super) sessions: Vec<SessionSummary>,
    pending_image: Option<ImageAttachment>,
    user: Option<User>,
    max_messages: usize,
}

/// Everything the admin overlay shows.
#[derive(Debug, Clone)]
pub struct AdminReport {
    pub session_id: String,
    pub stats: LogStats,
    pub settings: Settings,
    pub user: Option<String>,
    pub max_messages: usize,
    pub rate_limit_hint: Option<String>,
    pub known_sessions: usize,
    pub backend: Result<HealthStatus, String>,
    pub remote: Option<Result<AdminStats, String>>,
}

/// Resets the in-flight flag however the send ends.
struct SendGuard<'a>(&'a AtomicBool);

impl<'a> SendGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The active chat: session identity, message log, settings and the send
/// state machine. Shared behind `Arc`; every method takes `&self`.
pub struct ChatController {
    pub(super) backend: Arc<dyn Backend>,
    store: Arc<dyn KeyValueStore>,
    settings_store: SettingsStore,
    pub(super) identity: SessionIdentity,
    speaker: Arc<dyn Speaker>,
    events: mpsc::UnboundedSender<UiEvent>,
    settings: RwLock<Settings>,
    pub(super) state: Mutex<ChatState>,
    sending: AtomicBool,
    pub(super) session_list_limit: u32,
}

impl ChatController {
    pub async fn start(
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        speaker: Arc<dyn Speaker>,
        options: ControllerOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UiEvent>), ChatError> {
        let settings_store = SettingsStore::with_defaults(store.clone(), options.default_settings);
        let settings = settings_store.load().await?;
        backend.set_endpoint(&settings.endpoint);

        let identity = SessionIdentity::new(store.clone());
        let session_id = identity.current().await?;

        let (user, max_messages) = load_account(store.as_ref()).await?;

        tracing::debug!(%session_id, model = %settings.model, "chat controller started");

        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            backend,
            store,
            settings_store,
            identity,
            speaker,
            events: tx,
            settings: RwLock::new(settings),
            state: Mutex::new(ChatState {
                session_id,
                log: MessageLog::new(),
                sessions: Vec::new(),
                pending_image: None,
                user,
                max_messages,
            }),
            sending: AtomicBool::new(false),
            session_list_limit: options.session_list_limit,
        };
        Ok((controller, rx))
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(super) fn emit(&self, event: UiEvent) {
        // The receiver only goes away on shutdown.
        let _ = self.events.send(event);
    }

    pub(super) fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.emit(UiEvent::Notice {
            level,
            text: text.into(),
        });
    }

    /// Surfaces `error` as a notice and hands it back to the caller.
    pub(super) fn fail<T>(&self, error: impl Into<ChatError>) -> Result<T, ChatError> {
        let error = error.into();
        self.notify(NoticeLevel::Error, error.user_message());
        Err(error)
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn session_id(&self) -> String {
        self.lock_state().session_id.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock_state().log.messages().to_vec()
    }

    pub fn stats(&self) -> LogStats {
        self.lock_state().log.stats()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.lock_state().sessions.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.lock_state().user.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn attach_image(&self, image: ImageAttachment) {
        tracing::debug!(name = %image.name, media_type = %image.media_type, "image attached");
        self.lock_state().pending_image = Some(image);
    }

    pub fn clear_attachment(&self) -> bool {
        self.lock_state().pending_image.take().is_some()
    }

    pub fn pending_attachment(&self) -> Option<ImageRef> {
        self.lock_state()
            .pending_image
            .as_ref()
            .map(ImageAttachment::image_ref)
    }

    /// Appends to the tail of the log, then renders and speaks it.
    pub(super) fn append(&self, message: Message) {
        let (stats, max_messages) = {
            let mut state = self.lock_state();
            let stats = state.log.append(message.clone());
            (stats, state.max_messages)
        };
        let speak = message.role == Role::Assistant && self.settings().voice_output;
        let content = message.content.clone();

        self.emit(UiEvent::MessageAppended { message });
        self.emit(UiEvent::StatsUpdated { stats });

        if stats.message_count == max_messages {
            self.notify(
                NoticeLevel::Warning,
                format!(
                    "This conversation has {max_messages} messages; consider starting a new chat."
                ),
            );
        }
        if speak {
            if let Err(e) = self.speaker.speak(&content) {
                tracing::warn!(error = %e, "text-to-speech failed");
            }
        }
    }

    /// Sends one message. Only one send may be in flight; a second call while
    /// one is outstanding returns `ChatError::SendInFlight` without touching
    /// the transcript.
    pub async fn send(&self, text: &str) -> Result<ChatReply, ChatError> {
        let Some(_guard) = SendGuard::acquire(&self.sending) else {
            tracing::debug!("send rejected: another send is in flight");
            return Err(ChatError::SendInFlight);
        };

        let (message_text, image, session_id) = {
            let mut state = self.lock_state();
            let trimmed = text.trim();
            if trimmed.is_empty() && state.pending_image.is_none() {
                drop(state);
                return self.fail(ChatError::Validation("Please enter a message.".into()));
            }
            let message_text = if trimmed.is_empty() {
                DEFAULT_IMAGE_PROMPT.to_string()
            } else {
                trimmed.to_string()
            };
            (message_text, state.pending_image.take(), state.session_id.clone())
        };
        let settings = self.settings();

        self.append(Message::user(
            message_text.clone(),
            image.as_ref().map(ImageAttachment::image_ref),
        ));
        self.emit(UiEvent::TypingStarted);

        let (image_data, image_type) = match image {
            Some(img) => (Some(img.data), Some(img.media_type)),
            None => (None, None),
        };
        let request = ChatRequest {
            message: message_text,
            session_id: Some(session_id.clone()),
            model: settings.model,
            temperature: settings.temperature,
            image_data,
            image_type,
        };

        let result = self.backend.send_chat(&request).await;
        self.emit(UiEvent::TypingStopped);

        match result {
            Ok(reply) => {
                if reply.session_id != session_id {
                    self.adopt_session(&reply.session_id).await;
                }
                self.append(Message::assistant(
                    reply.answer.clone(),
                    reply.reasoning.clone(),
                ));
                self.refresh_sessions().await;
                Ok(reply)
            }
            Err(e) => {
                if let TransportError::RateLimited(reason) = &e {
                    self.record_rate_limit(reason).await;
                }
                self.append(Message::error_notice(e.reason()));
                self.fail(e)
            }
        }
    }

    async fn adopt_session(&self, id: &str) {
        tracing::debug!(session_id = %id, "adopting backend session id");
        if let Err(e) = self.identity.adopt(id).await {
            tracing::warn!(error = %e, "failed to persist session id");
        }
        let sessions = {
            let mut state = self.lock_state();
            state.session_id = id.to_string();
            state.sessions.clone()
        };
        self.emit(UiEvent::SessionsUpdated {
            sessions,
            active: id.to_string(),
        });
    }

    async fn record_rate_limit(&self, reason: &str) {
        let hint = format!("{} ({})", reason, chrono::Utc::now().to_rfc3339());
        if let Err(e) = self.store.set(keys::RATE_LIMIT_HINT, &hint).await {
            tracing::warn!(error = %e, "failed to store rate limit hint");
        }
    }

    /// Starts a new conversation: rotates the identifier and empties the log.
    pub async fn new_chat(&self) -> Result<String, ChatError> {
        let id = match self.identity.rotate().await {
            Ok(id) => id,
            Err(e) => return self.fail(e),
        };
        let sessions = {
            let mut state = self.lock_state();
            state.session_id = id.clone();
            state.log.clear();
            state.pending_image = None;
            state.sessions.clone()
        };
        self.emit(UiEvent::TranscriptCleared {
            session_id: id.clone(),
        });
        self.emit(UiEvent::StatsUpdated {
            stats: LogStats::default(),
        });
        self.emit(UiEvent::SessionsUpdated {
            sessions,
            active: id.clone(),
        });
        Ok(id)
    }

    pub async fn update_settings(&self, new: Settings) -> Result<(), ChatError> {
        if let Err(e) = self.settings_store.save(&new).await {
            return self.fail(e);
        }
        self.apply_settings(new, false);
        Ok(())
    }

    pub async fn reset_settings(&self) -> Result<Settings, ChatError> {
        let factory = match self.settings_store.reset_to_defaults().await {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        self.apply_settings(factory.clone(), true);
        self.notify(NoticeLevel::Info, "Settings reset to defaults.");
        Ok(factory)
    }

    fn apply_settings(&self, new: Settings, force_theme: bool) {
        let previous = self.settings();
        self.backend.set_endpoint(&new.endpoint);
        if !new.voice_output && previous.voice_output {
            self.speaker.stop();
        }
        match self.settings.write() {
            Ok(mut s) => *s = new.clone(),
            Err(p) => *p.into_inner() = new.clone(),
        }
        if force_theme || previous.theme != new.theme || previous.accent_color != new.accent_color
        {
            self.emit(UiEvent::ThemeChanged {
                theme: new.theme,
                accent: new.accent_color.clone(),
            });
        }
        self.emit(UiEvent::SettingsChanged { settings: new });
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportBlob, ChatError> {
        let settings = self.settings();
        let state = self.lock_state();
        let ctx = ExportContext {
            session_id: &state.session_id,
            settings: &settings,
            exported_at: chrono::Utc::now(),
        };
        export(format, &state.log, &ctx)
            .map_err(|e| ChatError::Storage(StorageError::Serialization(e.to_string())))
    }

    pub async fn backup(&self) -> Result<BackupEnvelope, ChatError> {
        let storage = match self.store.snapshot().await {
            Ok(s) => s,
            Err(e) => return self.fail(e),
        };
        let session = {
            let state = self.lock_state();
            SessionSnapshot {
                session_id: state.session_id.clone(),
                messages: state.log.messages().to_vec(),
            }
        };
        Ok(BackupEnvelope::new(self.settings(), session, storage))
    }

    /// Applies a backup document. Nothing changes unless the whole document
    /// validates.
    pub async fn restore(&self, json: &str) -> Result<(), ChatError> {
        let envelope = match parse_backup(json) {
            Ok(env) => env,
            Err(e) => return self.fail(e),
        };

        let restored_session = match envelope.session {
            Some(snapshot) => Some(snapshot),
            None => envelope
                .storage
                .get(keys::SESSION_ID)
                .map(|id| SessionSnapshot {
                    session_id: id.clone(),
                    messages: Vec::new(),
                }),
        };

        // One write so a failure leaves the store untouched.
        let mut entries = envelope.storage;
        entries.extend(envelope.settings.to_entries());
        if let Some(snapshot) = &restored_session {
            entries.insert(keys::SESSION_ID.to_string(), snapshot.session_id.clone());
        }
        if let Err(e) = self.store.set_many(&entries).await {
            return self.fail(e);
        }
        self.apply_settings(envelope.settings, true);

        let (user, max_messages) = match load_account(self.store.as_ref()).await {
            Ok(account) => account,
            Err(e) => return self.fail(e),
        };
        {
            let mut state = self.lock_state();
            state.user = user.clone();
            state.max_messages = max_messages;
        }
        self.emit(UiEvent::UserChanged { user });

        if let Some(snapshot) = restored_session {
            self.replace_session(snapshot.session_id, snapshot.messages);
        }

        self.notify(NoticeLevel::Info, "Backup restored.");
        Ok(())
    }

    /// Swaps identity and log together, then tells the renderer.
    pub(super) fn replace_session(&self, session_id: String, messages: Vec<Message>) {
        let (stats, sessions) = {
            let mut state = self.lock_state();
            state.session_id = session_id.clone();
            state.log = MessageLog::from_messages(messages.clone());
            state.pending_image = None;
            (state.log.stats(), state.sessions.clone())
        };
        self.emit(UiEvent::TranscriptReplaced {
            session_id: session_id.clone(),
            messages,
        });
        self.emit(UiEvent::StatsUpdated { stats });
        self.emit(UiEvent::SessionsUpdated {
            sessions,
            active: session_id,
        });
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ChatError> {
        let (email, password) = match validate_credentials(email, password) {
            Ok(c) => c,
            Err(e) => return self.fail(e),
        };
        let request = LoginRequest {
            email: email.clone(),
            password,
        };
        match self.backend.login(&request).await {
            Ok(resp) => self.complete_auth(resp, &email, "Welcome back").await,
            Err(e) => self.fail(e),
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, ChatError> {
        let (email, password) = match validate_credentials(email, password) {
            Ok(c) => c,
            Err(e) => return self.fail(e),
        };
        let name = match name.trim() {
            "" => "User".to_string(),
            n => n.to_string(),
        };
        let request = RegisterRequest {
            email: email.clone(),
            password,
            name,
        };
        match self.backend.register(&request).await {
            Ok(resp) => self.complete_auth(resp, &email, "Welcome").await,
            Err(e) => self.fail(e),
        }
    }

    async fn complete_auth(
        &self,
        resp: AuthResponse,
        email: &str,
        greeting: &str,
    ) -> Result<User, ChatError> {
        if !resp.success {
            return self.fail(ChatError::Validation("Authentication failed.".into()));
        }
        let user = resp.user.unwrap_or_else(|| User {
            id: None,
            email: Some(email.to_string()),
            name: None,
            extra: Default::default(),
        });
        let raw = serde_json::to_string(&user)
            .map_err(|e| ChatError::Storage(StorageError::Serialization(e.to_string())))?;
        if let Err(e) = self.store.set(keys::USER, &raw).await {
            return self.fail(e);
        }
        if let Some(token) = resp.token.as_deref() {
            if let Err(e) = self.store.set(keys::AUTH_TOKEN, token).await {
                return self.fail(e);
            }
        }

        self.lock_state().user = Some(user.clone());
        self.emit(UiEvent::UserChanged {
            user: Some(user.clone()),
        });
        self.notify(
            NoticeLevel::Info,
            format!("{greeting}, {}!", user.display_name()),
        );
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ChatError> {
        for key in [keys::USER, keys::AUTH_TOKEN] {
            if let Err(e) = self.store.remove(key).await {
                return self.fail(e);
            }
        }
        self.lock_state().user = None;
        self.emit(UiEvent::UserChanged { user: None });
        self.notify(NoticeLevel::Info, "Signed out.");
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus, ChatError> {
        match self.backend.health().await {
            Ok(h) => Ok(h),
            Err(e) => self.fail(e),
        }
    }

    pub async fn available_models(&self) -> Result<ModelCatalog, ChatError> {
        match self.backend.available_models().await {
            Ok(m) => Ok(m),
            Err(e) => self.fail(e),
        }
    }

    /// Local statistics, plus the backend's admin statistics when `pin` is set.
    pub async fn admin_report(&self, pin: Option<&str>) -> AdminReport {
        let backend = self.backend.health().await.map_err(|e| e.reason().to_string());
        let remote = match pin {
            Some(pin) => Some(
                self.backend
                    .admin_stats(pin)
                    .await
                    .map_err(|e| e.reason().to_string()),
            ),
            None => None,
        };
        let rate_limit_hint = self
            .store
            .get(keys::RATE_LIMIT_HINT)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to read rate limit hint");
                None
            });

        let state = self.lock_state();
        AdminReport {
            session_id: state.session_id.clone(),
            stats: state.log.stats(),
            settings: self.settings(),
            user: state.user.as_ref().map(|u| u.display_name().to_string()),
            max_messages: state.max_messages,
            rate_limit_hint,
            known_sessions: state.sessions.len(),
            backend,
            remote,
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(String, String), ChatError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ChatError::Validation("Email is required.".into()));
    }
    if password.is_empty() {
        return Err(ChatError::Validation("Password is required.".into()));
    }
    Ok((email.to_string(), password.to_string()))
}

/// Signed-in user and message limit as persisted in the store.
async fn load_account(store: &dyn KeyValueStore) -> Result<(Option<User>, usize), StorageError> {
    let user = match store.get(keys::USER).await? {
        Some(raw) => serde_json::from_str::<User>(&raw)
            .map_err(|e| tracing::warn!(error = %e, "ignoring malformed stored user"))
            .ok(),
        None => None,
    };
    let max_messages = store
        .get(keys::MAX_MESSAGES)
        .await?
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_MESSAGES);
    Ok((user, max_messages))
}
