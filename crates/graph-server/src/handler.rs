//! Per-connection lifecycle: greeting, read loop, idle watchdog, teardown.

use std::fmt;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tokio_util::codec::{AnyDelimiterCodec, Framed};
use tokio_util::sync::CancellationToken;

use crate::command::{CommandDispatcher, Flow};
use crate::config::SessionConfig;
use crate::error::{GraphlineError, GraphlineResult};
use crate::registry::SessionRegistry;
use crate::replies;
use crate::session::Session;

/// Why a session ended.
#[derive(Debug)]
pub enum CloseReason {
    /// The peer closed its side of the connection.
    ClientClosed,
    /// The client sent `BYE MATE!`.
    Farewell,
    /// The watchdog saw no activity for longer than the idle timeout.
    IdleTimeout,
    /// Reading or writing the connection failed.
    Fault(GraphlineError),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed connection"),
            CloseReason::Farewell => write!(f, "farewell"),
            CloseReason::IdleTimeout => write!(f, "idle timeout"),
            CloseReason::Fault(e) => write!(f, "{e}"),
        }
    }
}

type LineStream<S> = Framed<S, AnyDelimiterCodec>;

/// Newline-framed byte chunks; replies are written with a trailing `\n`.
fn line_codec(max_length: usize) -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_length)
}

/// Decodes one inbound line, replacing invalid UTF-8 and dropping a
/// trailing carriage return.
fn decode_line(chunk: &[u8]) -> String {
    let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    String::from_utf8_lossy(chunk).into_owned()
}

/// Drives one connection from greeting to close.
#[derive(Clone)]
pub struct SessionHandler {
    dispatcher: CommandDispatcher,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
}

impl SessionHandler {
    pub fn new(
        dispatcher: CommandDispatcher,
        registry: Arc<SessionRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            config,
        }
    }

    /// Runs the session until the client leaves, says goodbye, goes idle or
    /// the connection fails. The stream is closed on return.
    pub async fn run<S>(&self, stream: S) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (session, mut outbox) = Session::channel();
        let session = Arc::new(session);
        let id = session.id();
        self.registry.register(Arc::clone(&session));

        let mut lines = Framed::new(stream, line_codec(self.config.max_line_length));

        let expired = CancellationToken::new();
        let watchdog = tokio::spawn(watch_idle(
            Arc::clone(&session),
            self.config.clone(),
            expired.clone(),
        ));

        session.send(replies::greeting(id));
        let reason = match deliver(&mut lines, &mut outbox, &expired).await {
            Ok(()) => {
                self.read_loop(&session, &mut lines, &mut outbox, &expired)
                    .await
            }
            Err(reason) => reason,
        };

        watchdog.abort();
        self.registry.unregister(&id);

        // A peer that stopped reading would hold the close open forever.
        let closing = SinkExt::<String>::close(&mut lines);
        match tokio::time::timeout(self.config.watchdog_interval(), closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(session = %id, "error while closing connection: {e}"),
            Err(_) => tracing::debug!(session = %id, "dropping connection with unsent replies"),
        }
        drop(lines);

        tracing::info!(
            session = %id,
            name = %session.display_name(),
            connected_at = %session.connected_at(),
            elapsed_ms = session.elapsed().as_millis() as u64,
            reason = %reason,
            "client disconnected"
        );
        reason
    }

    async fn read_loop<S>(
        &self,
        session: &Session,
        lines: &mut LineStream<S>,
        outbox: &mut UnboundedReceiver<String>,
        expired: &CancellationToken,
    ) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let frame = tokio::select! {
                _ = expired.cancelled() => return CloseReason::IdleTimeout,
                frame = lines.next() => frame,
            };

            let line = match frame {
                None => return CloseReason::ClientClosed,
                Some(Err(e)) => return CloseReason::Fault(e.into()),
                Some(Ok(chunk)) => decode_line(&chunk),
            };

            session.touch();
            tracing::debug!(session = %session.id(), line = %line, "received");

            let flow = self.dispatcher.dispatch(session, &line);
            if let Err(reason) = deliver(lines, outbox, expired).await {
                return reason;
            }
            if flow == Flow::Close {
                return CloseReason::Farewell;
            }
        }
    }
}

/// Flushes queued replies unless the session expires first.
async fn deliver<S>(
    lines: &mut LineStream<S>,
    outbox: &mut UnboundedReceiver<String>,
    expired: &CancellationToken,
) -> Result<(), CloseReason>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        _ = expired.cancelled() => Err(CloseReason::IdleTimeout),
        flushed = flush(lines, outbox) => flushed.map_err(CloseReason::Fault),
    }
}

/// Writes every queued reply to the connection.
async fn flush<S>(
    lines: &mut LineStream<S>,
    outbox: &mut UnboundedReceiver<String>,
) -> GraphlineResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Ok(line) = outbox.try_recv() {
        lines.feed(line).await?;
    }
    SinkExt::<String>::flush(lines).await?;
    Ok(())
}

/// Cancels `expired` once the session has been idle past the timeout.
async fn watch_idle(session: Arc<Session>, config: SessionConfig, expired: CancellationToken) {
    let mut ticker = tokio::time::interval(config.watchdog_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let idle = session.idle_for();
        if idle > config.idle_timeout() {
            tracing::info!(
                session = %session.id(),
                idle_ms = idle.as_millis() as u64,
                "idle timeout, closing connection"
            );
            expired.cancel();
            return;
        }
    }
}
