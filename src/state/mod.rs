//! Shared application state: connections, store handle, timer, chat fallback.

pub mod rate_limit;
pub mod timer;

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{models::ChatMessageEntity, poll_store::PollStore},
    error::ServiceError,
};

pub use self::rate_limit::SlidingWindow;
pub use self::timer::PollTimer;

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected WebSocket client.
pub struct ClientConnection {
    /// Connection identifier, also the key in the clients registry.
    pub id: Uuid,
    /// Student identity bound to this connection after a join, if any.
    pub student_key: Option<String>,
    /// Writer channel of the connection.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state storing live connections and the store handle.
pub struct AppState {
    config: Arc<AppConfig>,
    poll_store: RwLock<Option<Arc<dyn PollStore>>>,
    clients: DashMap<Uuid, ClientConnection>,
    student_conns: DashMap<String, Uuid>,
    chat_windows: DashMap<Uuid, SlidingWindow>,
    chat_buffer: Mutex<VecDeque<ChatMessageEntity>>,
    poll_timer: Mutex<Option<PollTimer>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            poll_store: RwLock::new(None),
            clients: DashMap::new(),
            student_conns: DashMap::new(),
            chat_windows: DashMap::new(),
            chat_buffer: Mutex::new(VecDeque::new()),
            poll_timer: Mutex::new(None),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current poll store, if one is installed.
    pub async fn poll_store(&self) -> Option<Arc<dyn PollStore>> {
        let guard = self.poll_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the poll store or fail with [`ServiceError::Degraded`].
    pub async fn require_poll_store(&self) -> Result<Arc<dyn PollStore>, ServiceError> {
        self.poll_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new poll store implementation and leave degraded mode.
    pub async fn install_poll_store(&self, store: Arc<dyn PollStore>) {
        let mut guard = self.poll_store.write().await;
        *guard = Some(store);
    }

    /// Remove the current poll store and enter degraded mode.
    pub async fn clear_poll_store(&self) {
        let mut guard = self.poll_store.write().await;
        guard.take();
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.poll_store.read().await;
        guard.is_none()
    }

    /// Registry of live WebSocket connections keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.clients
    }

    /// Mapping from student identity to its most recent connection.
    pub fn student_conns(&self) -> &DashMap<String, Uuid> {
        &self.student_conns
    }

    /// Per-connection chat rate-limit windows.
    pub fn chat_windows(&self) -> &DashMap<Uuid, SlidingWindow> {
        &self.chat_windows
    }

    /// In-memory chat ring used when a message cannot be persisted.
    pub fn chat_buffer(&self) -> &Mutex<VecDeque<ChatMessageEntity>> {
        &self.chat_buffer
    }

    /// Arm the countdown for `poll_id`, aborting any previous timer task.
    pub async fn arm_poll_timer(&self, timer: PollTimer) {
        let mut guard = self.poll_timer.lock().await;
        if let Some(previous) = guard.take() {
            previous.handle.abort();
        }
        *guard = Some(timer);
    }

    /// Abort and drop the current timer if it belongs to `poll_id`.
    pub async fn disarm_poll_timer(&self, poll_id: Uuid) {
        let mut guard = self.poll_timer.lock().await;
        if guard.as_ref().is_some_and(|timer| timer.poll_id == poll_id) {
            if let Some(timer) = guard.take() {
                timer.handle.abort();
            }
        }
    }

    /// Drop the current timer if it belongs to `poll_id`, without aborting.
    ///
    /// Called by the fired countdown task itself, which must not abort its
    /// own handle.
    pub async fn clear_poll_timer(&self, poll_id: Uuid) {
        let mut guard = self.poll_timer.lock().await;
        if guard.as_ref().is_some_and(|timer| timer.poll_id == poll_id) {
            guard.take();
        }
    }
}
