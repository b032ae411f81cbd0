//! `CodeRoyaleServer` builder and server loop.
//!
//! This is the entry point for running a CodeRoyale match server. It
//! ties together every layer: transport → protocol → session → room,
//! plus the HTTP side channel that sits alongside the WebSocket
//! listener.

use std::sync::Arc;

use coderoyale_protocol::Problem;
use coderoyale_room::{JudgeClient, ProblemLibrary, RoomManager, SnapshotStore};
use coderoyale_session::{Authenticator, SessionConfig, SessionManager};
use coderoyale_transport::{Transport, WebSocketTransport};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::problems::seed_problems;
use crate::CodeRoyaleError;

/// The current protocol version, reserved for a future handshake
/// negotiation. Not yet enforced anywhere on the wire.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared server state passed to every connection handler task and
/// every HTTP gateway request.
pub struct ServerState<A: Authenticator, J: JudgeClient, S: SnapshotStore> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) rooms: Mutex<RoomManager<J, S>>,
    pub(crate) auth: A,
}

impl<A: Authenticator, J: JudgeClient + 'static, S: SnapshotStore + 'static> ServerState<A, J, S> {
    /// Assembles server state without binding any listener. Exposed so
    /// the HTTP gateway can be exercised directly (against an in-memory
    /// router) without standing up a real socket.
    pub fn new(auth: A, judge: J, store: S, problems: Vec<Problem>, session_config: SessionConfig) -> Self {
        let library = Arc::new(ProblemLibrary::new(problems));
        let rooms = RoomManager::new(library, Arc::new(judge), Arc::new(store));
        ServerState {
            sessions: Mutex::new(SessionManager::new(session_config)),
            rooms: Mutex::new(rooms),
            auth,
        }
    }
}

/// Builder for configuring and starting a CodeRoyale server.
///
/// # Example
///
/// ```rust,ignore
/// use coderoyale::CodeRoyaleServerBuilder;
///
/// let server = CodeRoyaleServerBuilder::new()
///     .ws_addr("0.0.0.0:8080")
///     .http_addr("0.0.0.0:8081")
///     .build(my_auth, my_judge, my_store)
///     .await?;
/// server.run().await
/// ```
pub struct CodeRoyaleServerBuilder {
    ws_addr: String,
    http_addr: String,
    session_config: SessionConfig,
    problems: Vec<Problem>,
}

impl CodeRoyaleServerBuilder {
    /// Creates a new builder with default settings and the bundled
    /// problem seed.
    pub fn new() -> Self {
        Self {
            ws_addr: "127.0.0.1:8080".to_string(),
            http_addr: "127.0.0.1:8081".to_string(),
            session_config: SessionConfig::default(),
            problems: seed_problems(),
        }
    }

    /// Sets the address the WebSocket game connection listens on.
    pub fn ws_addr(mut self, addr: &str) -> Self {
        self.ws_addr = addr.to_string();
        self
    }

    /// Sets the address the HTTP side channel listens on.
    pub fn http_addr(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Overrides the problem set dealt out by every room. Defaults to
    /// the bundled seed.
    pub fn problems(mut self, problems: Vec<Problem>) -> Self {
        self.problems = problems;
        self
    }

    /// Builds and starts the server with the given authenticator,
    /// judge adapter, and snapshot store.
    pub async fn build<A, J, S>(
        self,
        auth: A,
        judge: J,
        store: S,
    ) -> Result<CodeRoyaleServer<A, J, S>, CodeRoyaleError>
    where
        A: Authenticator,
        J: JudgeClient + 'static,
        S: SnapshotStore + 'static,
    {
        let ws_transport = WebSocketTransport::bind(&self.ws_addr).await?;
        let http_listener = TcpListener::bind(&self.http_addr).await?;

        let state = Arc::new(ServerState::new(auth, judge, store, self.problems, self.session_config));

        Ok(CodeRoyaleServer { ws_transport, http_listener, state })
    }
}

impl Default for CodeRoyaleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running CodeRoyale match server.
///
/// Call [`run()`](Self::run) to start accepting connections. Runs the
/// WebSocket accept loop and the HTTP gateway concurrently until the
/// process is terminated.
pub struct CodeRoyaleServer<A: Authenticator, J: JudgeClient, S: SnapshotStore> {
    ws_transport: WebSocketTransport,
    http_listener: TcpListener,
    state: Arc<ServerState<A, J, S>>,
}

impl<A, J, S> CodeRoyaleServer<A, J, S>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    /// Creates a new builder.
    pub fn builder() -> CodeRoyaleServerBuilder {
        CodeRoyaleServerBuilder::new()
    }

    /// Returns the local address the WebSocket listener is bound to.
    pub fn ws_local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.ws_transport.local_addr()
    }

    /// Returns the local address the HTTP gateway is bound to.
    pub fn http_local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.http_listener.local_addr()
    }

    /// Runs the WebSocket accept loop and the HTTP gateway until one
    /// of them exits (which only happens on an unrecoverable bind-time
    /// error — accept errors are logged and the loop continues).
    pub async fn run(mut self) -> Result<(), CodeRoyaleError> {
        tracing::info!("CodeRoyale server running");

        let router = crate::gateway::router(Arc::clone(&self.state));
        let http = tokio::spawn(async move {
            axum::serve(self.http_listener, router).await
        });

        loop {
            tokio::select! {
                accepted = self.ws_transport.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(conn, state).await {
                                    tracing::debug!(error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                result = &mut http => {
                    if let Ok(Err(e)) = result {
                        tracing::error!(error = %e, "HTTP gateway exited");
                    }
                    return Ok(());
                }
            }
        }
    }
}
