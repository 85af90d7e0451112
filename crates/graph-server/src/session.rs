use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique session identifier, announced to the client in the greeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl Default for SessionId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}

impl SessionId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-side state of one client connection.
///
/// The last-activity stamp is written by the connection's read loop and
/// read by its watchdog, so it is a plain atomic holding milliseconds since
/// the session started.
pub struct Session {
    id: SessionId,
    name: Mutex<Option<String>>,
    connected_at: DateTime<Utc>,
    started: Instant,
    last_activity_ms: AtomicU64,
    outbox: mpsc::UnboundedSender<String>,
}

impl Session {
    pub fn new(outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: SessionId::new(),
            name: Mutex::new(None),
            connected_at: Utc::now(),
            started: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            outbox,
        }
    }

    /// A session together with the receiving end of its output sink.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.lock() = Some(name.to_string());
    }

    /// The display name, or the session id while the client is unnamed.
    pub fn display_name(&self) -> String {
        self.name().unwrap_or_else(|| self.id.to_string())
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    /// Queues one line for the client. Lines sent after the connection side
    /// of the sink is gone are dropped.
    pub fn send(&self, line: impl Into<String>) {
        if self.outbox.send(line.into()).is_err() {
            tracing::debug!(session = %self.id, "output sink closed, reply dropped");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
