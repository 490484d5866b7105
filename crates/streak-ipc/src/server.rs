//! IPC server implementation

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use streak_api::{
    API_VERSION, ClientInfo, ClientRole, Command, ErrorCode, ErrorInfo, Event, Request, Response,
};
use streak_util::ClientId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{IpcError, IpcResult};

/// Capacity of the event channel; slower subscribers skip what they missed
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Message from the IPC layer to the service loop
#[derive(Debug)]
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        info: ClientInfo,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

type ClientMap = Arc<RwLock<HashMap<ClientId, ClientHandle>>>;

/// IPC Server
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: ClientMap,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>>,
}

struct ClientHandle {
    info: ClientInfo,
    response_tx: mpsc::UnboundedSender<String>,
    subscribed: bool,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Arc::new(Mutex::new(Some(message_rx))),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one left by a previous run
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Owner and group only
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o660))?;

        info!(path = %self.socket_path.display(), "IPC server listening");

        self.listener = Some(listener);

        Ok(())
    }

    /// Take the receiver for server messages. Only the first call gets it.
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self.listener.as_ref().ok_or(IpcError::NotStarted)?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let uid = get_peer_uid(&stream);
                    let role = role_for_uid(uid, nix::unistd::getuid().as_raw());

                    let info = ClientInfo::new(role);
                    let info = match uid {
                        Some(u) => info.with_uid(u),
                        None => info,
                    };

                    info!(client_id = %info.client_id, uid = ?uid, role = ?role, "Client connected");

                    self.handle_client(stream, info).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_client(&self, stream: UnixStream, info: ClientInfo) {
        let client_id = info.client_id.clone();
        let (read_half, write_half) = stream.into_split();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<String>();
        let (reader_done_tx, reader_done_rx) = oneshot::channel::<()>();

        self.clients.write().await.insert(
            client_id.clone(),
            ClientHandle {
                info: info.clone(),
                response_tx: response_tx.clone(),
                subscribed: false,
            },
        );

        let _ = self.message_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            info,
        });

        tokio::spawn(read_requests(
            read_half,
            client_id.clone(),
            self.clients.clone(),
            self.message_tx.clone(),
            response_tx,
            reader_done_tx,
        ));

        tokio::spawn(write_outgoing(
            write_half,
            client_id,
            self.clients.clone(),
            self.message_tx.clone(),
            response_rx,
            self.event_tx.subscribe(),
            reader_done_rx,
        ));
    }

    /// Send a response to a specific client. A client that already went
    /// away is not an error.
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let json = serde_json::to_string(&response)?;

        let clients = self.clients.read().await;
        match clients.get(client_id) {
            Some(handle) => handle
                .response_tx
                .send(json)
                .map_err(|_| IpcError::ConnectionClosed),
            None => {
                debug!(client_id = %client_id, "Dropping response for departed client");
                Ok(())
            }
        }
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast_event(&self, event: Event) {
        // Err only means nobody is connected
        let _ = self.event_tx.send(event);
    }

    pub async fn get_client_info(&self, client_id: &ClientId) -> Option<ClientInfo> {
        let clients = self.clients.read().await;
        clients.get(client_id).map(|h| h.info.clone())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Root and the account running the service administer it. Everyone else
/// who can open the socket may log activities; a peer whose credentials
/// cannot be read only observes.
fn role_for_uid(uid: Option<u32>, service_uid: u32) -> ClientRole {
    match uid {
        Some(0) => ClientRole::Admin,
        Some(u) if u == service_uid => ClientRole::Admin,
        Some(_) => ClientRole::Shell,
        None => ClientRole::Observer,
    }
}

async fn read_requests(
    read_half: OwnedReadHalf,
    client_id: ClientId,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    response_tx: mpsc::UnboundedSender<String>,
    _done: oneshot::Sender<()>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(client_id = %client_id, "Client disconnected (EOF)");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let request = match parse_request(line) {
                    Ok(request) => request,
                    Err((request_id, reason)) => {
                        warn!(client_id = %client_id, reason = %reason, "Invalid request");
                        let rejection =
                            Response::error(request_id, ErrorInfo::new(ErrorCode::InvalidRequest, reason));
                        if let Ok(json) = serde_json::to_string(&rejection) {
                            let _ = response_tx.send(json);
                        }
                        continue;
                    }
                };

                let subscribed = match request.command {
                    Command::SubscribeEvents => Some(true),
                    Command::UnsubscribeEvents => Some(false),
                    _ => None,
                };
                // Flip the flag before the service answers, so no event
                // sent after the answer is missed
                if let Some(subscribed) = subscribed
                    && let Some(handle) = clients.write().await.get_mut(&client_id)
                {
                    handle.subscribed = subscribed;
                }

                let _ = message_tx.send(ServerMessage::Request {
                    client_id: client_id.clone(),
                    request,
                });
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        }
    }
    // Dropping `_done` stops the writer, which unregisters the client
}

async fn write_outgoing(
    mut writer: OwnedWriteHalf,
    client_id: ClientId,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    mut response_rx: mpsc::UnboundedReceiver<String>,
    mut event_rx: broadcast::Receiver<Event>,
    mut reader_done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut reader_done => break,

            response = response_rx.recv() => {
                let Some(response) = response else {
                    break;
                };
                if let Err(e) = write_line(&mut writer, response).await {
                    debug!(client_id = %client_id, error = %e, "Write error");
                    break;
                }
            }

            event = event_rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client_id = %client_id, skipped, "Subscriber lagging, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let is_subscribed = clients
                    .read()
                    .await
                    .get(&client_id)
                    .is_some_and(|h| h.subscribed);
                if !is_subscribed {
                    continue;
                }

                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = write_line(&mut writer, json).await {
                            debug!(client_id = %client_id, error = %e, "Event write error");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }

    let _ = message_tx.send(ServerMessage::ClientDisconnected {
        client_id: client_id.clone(),
    });

    clients.write().await.remove(&client_id);
}

async fn write_line(writer: &mut OwnedWriteHalf, mut line: String) -> std::io::Result<()> {
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

/// Decode one request line. On failure, returns the request ID to answer
/// (0 when the line is not a request at all) and the reason.
fn parse_request(line: &str) -> Result<Request, (u64, String)> {
    let request: Request =
        serde_json::from_str(line).map_err(|e| (0, format!("Malformed request: {}", e)))?;

    if request.api_version != API_VERSION {
        return Err((
            request.request_id,
            format!(
                "Unsupported API version {} (expected {})",
                request.api_version, API_VERSION
            ),
        ));
    }

    Ok(request)
}

/// Get peer UID from Unix socket
fn get_peer_uid(stream: &UnixStream) -> Option<u32> {
    use std::os::unix::io::AsFd;

    let fd = stream.as_fd();

    match nix::sys::socket::getsockopt(&fd, nix::sys::socket::sockopt::PeerCredentials) {
        Ok(cred) => Some(cred.uid()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streak_api::{ResponsePayload, ResponseResult};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_server_start() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("nested").join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();

        assert!(socket_path.exists());
        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o660);

        drop(server);
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn run_requires_start() {
        let dir = tempdir().unwrap();
        let server = IpcServer::new(dir.path().join("test.sock"));
        assert!(matches!(server.run().await, Err(IpcError::NotStarted)));
    }

    #[tokio::test]
    async fn message_receiver_taken_once() {
        let server = IpcServer::new("/nonexistent/streakd.sock");
        assert!(server.take_message_receiver().await.is_some());
        assert!(server.take_message_receiver().await.is_none());
    }

    #[test]
    fn roles_follow_peer_uid() {
        assert_eq!(role_for_uid(Some(0), 1000), ClientRole::Admin);
        assert_eq!(role_for_uid(Some(1000), 1000), ClientRole::Admin);
        assert_eq!(role_for_uid(Some(1001), 1000), ClientRole::Shell);
        assert_eq!(role_for_uid(None, 1000), ClientRole::Observer);
    }

    #[test]
    fn malformed_line_rejected() {
        let (request_id, reason) = parse_request("{not json").unwrap_err();
        assert_eq!(request_id, 0);
        assert!(reason.starts_with("Malformed request"));
    }

    #[test]
    fn wrong_api_version_rejected() {
        let line = r#"{"request_id":7,"api_version":99,"command":{"type":"ping"}}"#;
        let (request_id, reason) = parse_request(line).unwrap_err();
        assert_eq!(request_id, 7);
        assert!(reason.contains("99"));

        let line = r#"{"request_id":8,"api_version":1,"command":{"type":"ping"}}"#;
        assert!(matches!(parse_request(line).unwrap().command, Command::Ping));
    }

    #[tokio::test]
    async fn request_reaches_service_loop() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut messages = server.take_message_receiver().await.unwrap();

        let runner = server.clone();
        tokio::spawn(async move { runner.run().await });

        let mut client = crate::IpcClient::connect(&socket_path).await.unwrap();
        let ask = tokio::spawn(async move { client.send(Command::Ping).await });

        let info = match messages.recv().await.unwrap() {
            ServerMessage::ClientConnected { info, .. } => info,
            other => panic!("unexpected message {:?}", other),
        };
        // Tests connect as the account running the server
        assert_eq!(info.role, ClientRole::Admin);
        assert_eq!(server.client_count().await, 1);

        match messages.recv().await.unwrap() {
            ServerMessage::Request { client_id, request } => {
                assert_eq!(client_id, info.client_id);
                assert!(matches!(request.command, Command::Ping));
                server
                    .send_response(&client_id, Response::success(request.request_id, ResponsePayload::Pong))
                    .await
                    .unwrap();
            }
            other => panic!("unexpected message {:?}", other),
        }

        let response = ask.await.unwrap().unwrap();
        assert!(matches!(response.result, ResponseResult::Ok(ResponsePayload::Pong)));

        // Client dropped with its task
        match messages.recv().await.unwrap() {
            ServerMessage::ClientDisconnected { client_id } => assert_eq!(client_id, info.client_id),
            other => panic!("unexpected message {:?}", other),
        }
    }
}
