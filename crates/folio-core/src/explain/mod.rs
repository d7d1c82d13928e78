//! Per-line explanation chat sessions.
//!
//! `ExplainChatRegistry` keeps at most one session per line (keyed by
//! `playId:act:scene:lineGlobalIndex`), at most one of them open at a time,
//! and drives the send cycle against an injected `ExplanationService`.

mod service;
mod types;

pub use service::{
    AnthropicClient, AnthropicSettings, ExplainError, ExplainRequest, ExplainResponse,
    ExplainTurn, ExplanationService, build_system_prompt,
};
pub use types::{
    ChatRole, DEFAULT_FOLLOW_UP_OPTIONS, DEFAULT_USER_TEXT, ExplainChatMessage,
    ExplainChatSession, ExplainSortMode, FALLBACK_ERROR_MESSAGE, OpenSessionArgs, SessionStatus,
    SessionVisibility, chat_identifier, default_follow_ups,
};

use crate::cache;
use crate::model::Ordinal;
use crate::text_utils::collate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use ts_rs::TS;

/// Lines of one scene currently rendered on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct VisibilitySync {
    pub play_id: String,
    #[ts(type = "number")]
    pub act: Ordinal,
    #[ts(type = "number")]
    pub scene: Ordinal,
    #[ts(type = "Array<number>")]
    pub visible_line_ids: Vec<Ordinal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExplainSnapshot {
    pub sessions: Vec<ExplainChatSession>,
    pub open_session_id: Option<String>,
    pub sort_mode: ExplainSortMode,
    pub panel_open: bool,
    pub pending_focus: Option<String>,
    pub has_api_key: bool,
}

#[derive(Debug, Clone)]
pub struct ExplainEvent {
    pub action: &'static str,
    pub session_id: Option<String>,
    pub snapshot: ExplainSnapshot,
}

/// Wall-clock milliseconds, bumped so successive stamps strictly increase.
#[derive(Debug, Default)]
struct LogicalClock {
    last: u64,
}

impl LogicalClock {
    fn tick(&mut self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        self.last = wall.max(self.last + 1);
        self.last
    }
}

pub struct ExplainChatRegistry {
    sessions: Vec<ExplainChatSession>,
    sort_mode: ExplainSortMode,
    panel_open: bool,
    pending_focus: Option<String>,
    api_key: String,
    cache_dir: Option<PathBuf>,
    clock: LogicalClock,
    next_message: u64,
    subscribers: Vec<Sender<ExplainEvent>>,
}

impl ExplainChatRegistry {
    /// Registry whose sort preference lives under `cache_dir`.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let sort_mode = cache_dir
            .as_deref()
            .map(cache::load_sort_mode)
            .unwrap_or_default();
        if let Some(dir) = cache_dir.as_deref() {
            cache::save_sort_mode(dir, sort_mode);
        }
        debug!(sort_mode = %sort_mode, "Explanation registry ready");
        Self {
            sessions: Vec::new(),
            sort_mode,
            panel_open: false,
            pending_focus: None,
            api_key: String::new(),
            cache_dir,
            clock: LogicalClock::default(),
            next_message: 1,
            subscribers: Vec::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn subscribe(&mut self) -> Receiver<ExplainEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, action: &'static str, session_id: Option<&str>) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = ExplainEvent {
            action,
            session_id: session_id.map(str::to_string),
            snapshot: self.snapshot(),
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn snapshot(&self) -> ExplainSnapshot {
        ExplainSnapshot {
            sessions: self.sorted_sessions().into_iter().cloned().collect(),
            open_session_id: self.open_session_id().map(str::to_string),
            sort_mode: self.sort_mode,
            panel_open: self.panel_open,
            pending_focus: self.pending_focus.clone(),
            has_api_key: self.has_api_key(),
        }
    }

    pub fn sessions(&self) -> &[ExplainChatSession] {
        &self.sessions
    }

    pub fn get_session(&self, session_id: &str) -> Option<&ExplainChatSession> {
        self.sessions.iter().find(|session| session.id == session_id)
    }

    fn session_mut(&mut self, session_id: &str) -> Option<&mut ExplainChatSession> {
        self.sessions
            .iter_mut()
            .find(|session| session.id == session_id)
    }

    /// The single open session, if any.
    pub fn open_session(&self) -> Option<&ExplainChatSession> {
        self.sessions.iter().find(|session| session.is_open())
    }

    pub fn open_session_id(&self) -> Option<&str> {
        self.open_session().map(|session| session.id.as_str())
    }

    pub fn sorted_sessions(&self) -> Vec<&ExplainChatSession> {
        let mut sorted: Vec<&ExplainChatSession> = self.sessions.iter().collect();
        match self.sort_mode {
            ExplainSortMode::Updated => sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            ExplainSortMode::Created => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ExplainSortMode::Play => sorted.sort_by(|a, b| {
                collate(&a.play_name, &b.play_name)
                    .then(a.act.cmp(&b.act))
                    .then(a.scene.cmp(&b.scene))
                    .then(a.line_sentence.cmp(&b.line_sentence))
            }),
        }
        sorted
    }

    /// Create or reactivate the session for a line and make it the open one.
    pub fn open_session_at_line(&mut self, args: OpenSessionArgs) -> String {
        let session_id = args.id();
        let now = self.clock.tick();

        match self.session_mut(&session_id) {
            Some(session) => {
                session.status = SessionStatus::Open;
                session.visibility = SessionVisibility::Visible;
                session.line_text = args.line_text;
                session.line_sentence = args.line_sentence;
                session.speaker = args.speaker;
                session.context = args.context;
                session.updated_at = now;
            }
            None => {
                info!(session = %session_id, "Opened explanation session");
                self.sessions.push(ExplainChatSession {
                    id: session_id.clone(),
                    play_id: args.play_id,
                    play_name: args.play_name,
                    act: args.act,
                    scene: args.scene,
                    line_global_index: args.line_global_index,
                    line_sentence: args.line_sentence,
                    speaker: args.speaker,
                    line_text: args.line_text,
                    context: args.context,
                    messages: Vec::new(),
                    pending: false,
                    error: None,
                    follow_ups: default_follow_ups(),
                    status: SessionStatus::Open,
                    visibility: SessionVisibility::Visible,
                    created_at: now,
                    updated_at: now,
                    has_history: false,
                    default_user_text: DEFAULT_USER_TEXT.to_string(),
                });
            }
        }

        for session in self.sessions.iter_mut() {
            if session.id != session_id && session.is_open() {
                session.status = SessionStatus::Collapsed;
            }
        }
        self.emit("explain_open_session", Some(&session_id));
        session_id
    }

    /// Collapse without discarding the transcript. An outstanding request
    /// keeps its pending flag and still lands when it completes.
    pub fn collapse_session(&mut self, session_id: &str) {
        let now = self.clock.tick();
        let Some(session) = self.session_mut(session_id) else {
            return;
        };
        session.status = SessionStatus::Collapsed;
        session.updated_at = now;
        self.emit("explain_collapse_session", Some(session_id));
    }

    pub fn close_session(&mut self, session_id: &str) {
        let before = self.sessions.len();
        self.sessions.retain(|session| session.id != session_id);
        if self.sessions.len() != before {
            debug!(session = session_id, "Closed explanation session");
            self.emit("explain_close_session", Some(session_id));
        }
    }

    pub fn set_error(&mut self, session_id: &str, message: Option<String>) {
        let now = self.clock.tick();
        let Some(session) = self.session_mut(session_id) else {
            return;
        };
        session.error = message;
        session.updated_at = now;
        self.emit("explain_set_error", Some(session_id));
    }

    /// Append the user's message and produce the outbound request.
    ///
    /// Returns `None` when nothing should be sent: unknown session, blank
    /// text, a request already outstanding, or no credential (recorded as the
    /// session error).
    pub fn begin_send(&mut self, session_id: &str, text: &str) -> Option<ExplainRequest> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let api_key = self.api_key.clone();
        let now = self.clock.tick();
        let message_id = self.next_message_id(now);

        let session = self.session_mut(session_id)?;
        if session.pending {
            warn!(session = session_id, "Explanation already in flight; ignoring send");
            return None;
        }
        if api_key.is_empty() {
            session.error = Some(ExplainError::MissingCredential.to_string());
            session.updated_at = now;
            self.emit("explain_missing_credential", Some(session_id));
            return None;
        }

        session.messages.push(ExplainChatMessage {
            id: message_id,
            role: ChatRole::User,
            text: trimmed.to_string(),
            created_at: now,
        });
        session.pending = true;
        session.error = None;
        session.has_history = true;
        session.updated_at = now;

        let request = ExplainRequest {
            session_id: session.id.clone(),
            api_key,
            play_name: session.play_name.clone(),
            act: session.act,
            scene: session.scene,
            line_sentence: session.line_sentence,
            speaker: session.speaker.clone(),
            line_text: session.line_text.clone(),
            context: session.context.clone(),
            messages: session
                .messages
                .iter()
                .map(|message| ExplainTurn {
                    role: message.role,
                    text: message.text.clone(),
                })
                .collect(),
            follow_ups: session.follow_ups.clone(),
        };
        self.emit("explain_send_started", Some(session_id));
        Some(request)
    }

    /// Apply the outcome of a request started with [`Self::begin_send`].
    pub fn complete_send(
        &mut self,
        session_id: &str,
        outcome: Result<ExplainResponse, ExplainError>,
    ) {
        let now = self.clock.tick();
        let message_id = self.next_message_id(now);
        let Some(session) = self.session_mut(session_id) else {
            debug!(session = session_id, "Dropping explanation for closed session");
            return;
        };

        let action = match outcome {
            Ok(response) => {
                session.messages.push(ExplainChatMessage {
                    id: message_id,
                    role: ChatRole::Assistant,
                    text: response.text,
                    created_at: now,
                });
                if !response.follow_ups.is_empty() {
                    session.follow_ups = response.follow_ups;
                }
                "explain_send_completed"
            }
            Err(err) => {
                warn!(session = session_id, "Explanation request failed: {err}");
                let message = err.to_string();
                session.error = Some(if message.trim().is_empty() {
                    FALLBACK_ERROR_MESSAGE.to_string()
                } else {
                    message
                });
                "explain_send_failed"
            }
        };
        session.pending = false;
        session.updated_at = now;
        self.emit(action, Some(session_id));
    }

    /// Send one message and wait for the service to answer.
    pub fn send_message(
        &mut self,
        session_id: &str,
        text: &str,
        service: &dyn ExplanationService,
    ) {
        let Some(request) = self.begin_send(session_id, text) else {
            return;
        };
        let outcome = service.explain(&request);
        self.complete_send(session_id, outcome);
    }

    fn next_message_id(&mut self, now: u64) -> String {
        let id = format!("msg-{now}-{}", self.next_message);
        self.next_message += 1;
        id
    }

    /// Mark sessions anchored in the given scene visible or hidden; hidden
    /// open sessions collapse.
    pub fn sync_visibility(&mut self, sync: &VisibilitySync) {
        let mut changed = false;
        for session in self.sessions.iter_mut() {
            if !session.is_anchored_in(&sync.play_id, sync.act, sync.scene) {
                continue;
            }
            let visible = sync.visible_line_ids.contains(&session.line_global_index);
            if session.is_visible() != visible {
                session.visibility = if visible {
                    SessionVisibility::Visible
                } else {
                    SessionVisibility::Hidden
                };
                changed = true;
            }
            if !visible && session.is_open() {
                session.status = SessionStatus::Collapsed;
                changed = true;
            }
        }
        if changed {
            self.emit("explain_sync_visibility", None);
        }
    }

    pub fn sort_mode(&self) -> ExplainSortMode {
        self.sort_mode
    }

    pub fn set_sort_mode(&mut self, mode: ExplainSortMode) {
        if self.sort_mode == mode {
            return;
        }
        self.sort_mode = mode;
        if let Some(dir) = self.cache_dir.as_deref() {
            cache::save_sort_mode(dir, mode);
        }
        self.emit("explain_set_sort_mode", None);
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn toggle_panel(&mut self) {
        self.panel_open = !self.panel_open;
        self.emit("explain_toggle_panel", None);
    }

    pub fn open_panel(&mut self) {
        self.panel_open = true;
        self.emit("explain_open_panel", None);
    }

    pub fn close_panel(&mut self) {
        self.panel_open = false;
        self.emit("explain_close_panel", None);
    }

    pub fn pending_focus(&self) -> Option<&str> {
        self.pending_focus.as_deref()
    }

    pub fn request_focus(&mut self, session_id: &str) {
        self.pending_focus = Some(session_id.to_string());
        self.emit("explain_request_focus", Some(session_id));
    }

    /// Clear the focus request only if it still targets `session_id`.
    pub fn clear_pending_focus(&mut self, session_id: &str) {
        if self.pending_focus.as_deref() == Some(session_id) {
            self.pending_focus = None;
            self.emit("explain_clear_focus", Some(session_id));
        }
    }

    pub fn set_api_key(&mut self, key: &str) {
        self.api_key = key.trim().to_string();
        self.emit("explain_set_api_key", None);
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}
