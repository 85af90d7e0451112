use crate::command::CommandDispatcher;
use crate::config::SessionConfig;
use crate::handler::{CloseReason, SessionHandler};
use crate::registry::SessionRegistry;
use crate::store::GraphStore;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// State shared by every connection: the graph, the session registry and
/// the per-session limits.
pub struct GraphServer {
    pub graph: Arc<GraphStore>,
    pub registry: Arc<SessionRegistry>,
    pub session_config: Arc<SessionConfig>,
}

impl Clone for GraphServer {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            registry: Arc::clone(&self.registry),
            session_config: Arc::clone(&self.session_config),
        }
    }
}

impl GraphServer {
    pub fn new(session_config: SessionConfig) -> Self {
        Self {
            graph: Arc::new(GraphStore::new()),
            registry: Arc::new(SessionRegistry::new()),
            session_config: Arc::new(session_config),
        }
    }

    /// A handler wired to this server's graph and registry.
    pub fn session_handler(&self) -> SessionHandler {
        let dispatcher = CommandDispatcher::new(Arc::clone(&self.graph), Arc::clone(&self.registry));
        SessionHandler::new(
            dispatcher,
            Arc::clone(&self.registry),
            self.session_config.as_ref().clone(),
        )
    }
}

/// Accepts connections until `shutdown` resolves, running each one on its
/// own task.
pub async fn serve<F>(listener: TcpListener, server: GraphServer, shutdown: F)
where
    F: Future<Output = ()>,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Graphline listening on {}", addr);
    }

    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down listener");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("could not set TCP_NODELAY for {}: {}", peer, e);
        }

        let handler = server.session_handler();
        tokio::spawn(async move {
            tracing::info!("Client connected: {}", peer);
            match handler.run(stream).await {
                CloseReason::Fault(e) if e.is_connection_fault() => {
                    tracing::warn!("connection from {} failed: {}", peer, e);
                }
                reason => tracing::debug!("connection from {} finished: {}", peer, reason),
            }
        });
    }
}
