//! WebSocket transport to the back-office updates namespace.
//!
//! Every connection runs one background task that dials
//! `<base_url><namespace>`, dispatches `UpdateFrame` text frames to the
//! registered listeners, and redials after `reconnect_delay` whenever the
//! socket drops. The task starts when the first listener is registered, so
//! nothing the server sends right after the handshake goes unheard. Events
//! emitted while disconnected are lost.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use backoffice_types::UpdateFrame;

use crate::error::TransportError;
use crate::transport::{Connection, EventHandler, Transport};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

type Listeners = Arc<RwLock<HashMap<String, Vec<EventHandler>>>>;

pub struct WebSocketTransport {
    base_url: String,
    reconnect_delay: Duration,
    runtime: Handle,
}

impl WebSocketTransport {
    /// Must be called from inside a tokio runtime; connections spawn onto it.
    pub fn new(base_url: impl Into<String>, reconnect_delay: Duration) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        Ok(Self {
            base_url: base_url.into(),
            reconnect_delay,
            runtime,
        })
    }

    pub fn endpoint(&self, namespace: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), namespace)
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &self,
        namespace: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let url = self.endpoint(namespace);
        // Validate once up front; the dial loop rebuilds it on every attempt.
        build_request(&url, token)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Box::new(WebSocketConnection {
            id: Uuid::new_v4(),
            listeners: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            state: DialState::Pending(PendingDial {
                runtime: self.runtime.clone(),
                url,
                token: token.map(str::to_string),
                reconnect_delay: self.reconnect_delay,
                shutdown: shutdown_rx,
            }),
        }))
    }
}

fn build_request(url: &str, token: Option<&str>) -> Result<Request, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        request.headers_mut().insert(header::AUTHORIZATION, value);
    }
    Ok(request)
}

async fn run_dial_loop(
    conn_id: Uuid,
    url: String,
    token: Option<String>,
    reconnect_delay: Duration,
    listeners: Listeners,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let request = match build_request(&url, token.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                warn!("connection {} giving up: {}", conn_id, e);
                return;
            }
        };

        tokio::select! {
            _ = shutdown.changed() => return,
            result = connect_async(request) => match result {
                Ok((stream, _)) => {
                    info!("connection {} connected to {}", conn_id, url);
                    if read_frames(stream, &listeners, &mut shutdown).await {
                        return;
                    }
                    warn!("connection {} lost, retrying in {:?}", conn_id, reconnect_delay);
                }
                Err(e) => {
                    warn!("connection {} failed to reach {}: {}", conn_id, url, e);
                }
            },
        }

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// Pump frames until the socket closes or shutdown is requested. Returns
/// `true` on shutdown.
async fn read_frames(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    listeners: &Listeners,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = stream.close(None).await;
                return true;
            }
            next = stream.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<UpdateFrame>(text.as_str()) {
                        Ok(frame) => {
                            match frame.entity() {
                                Some(entity) => trace!("{} update frame ({} bytes)", entity, text.len()),
                                None => trace!("{} frame ({} bytes)", frame.event, text.len()),
                            }
                            dispatch(listeners, frame);
                        }
                        Err(e) => warn!("ignoring malformed frame: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("socket error: {}", e);
                    return false;
                }
            },
        }
    }
}

fn dispatch(listeners: &Listeners, frame: UpdateFrame) {
    let handlers = listeners
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&frame.event)
        .cloned()
        .unwrap_or_default();
    for handler in handlers {
        handler(frame.data.clone());
    }
}

struct PendingDial {
    runtime: Handle,
    url: String,
    token: Option<String>,
    reconnect_delay: Duration,
    shutdown: watch::Receiver<bool>,
}

enum DialState {
    Pending(PendingDial),
    Running,
    Closed,
}

struct WebSocketConnection {
    id: Uuid,
    listeners: Listeners,
    shutdown_tx: watch::Sender<bool>,
    state: DialState,
}

impl WebSocketConnection {
    fn start(&mut self) {
        if !matches!(self.state, DialState::Pending(_)) {
            return;
        }
        let DialState::Pending(dial) = std::mem::replace(&mut self.state, DialState::Running) else {
            return;
        };
        debug!("connection {} dialing {}", self.id, dial.url);
        dial.runtime.spawn(run_dial_loop(
            self.id,
            dial.url,
            dial.token,
            dial.reconnect_delay,
            self.listeners.clone(),
            dial.shutdown,
        ));
    }
}

impl Connection for WebSocketConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn on(&mut self, event: &str, handler: EventHandler) {
        if matches!(self.state, DialState::Closed) {
            return;
        }
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(handler);
        self.start();
    }

    fn disconnect(&mut self) {
        if matches!(std::mem::replace(&mut self.state, DialState::Closed), DialState::Closed) {
            return;
        }
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let _ = self.shutdown_tx.send(true);
        info!("connection {} closed", self.id);
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures_util::SinkExt;
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response,
    };

    #[test]
    fn new_outside_runtime_fails() {
        let err = WebSocketTransport::new("ws://127.0.0.1:1", DEFAULT_RECONNECT_DELAY).err();
        assert!(matches!(err, Some(TransportError::NoRuntime)));
    }

    #[test]
    fn request_carries_bearer_token() {
        let request = build_request("ws://127.0.0.1:3000/backoffice-updates", Some("abc")).unwrap();
        assert_eq!(request.headers()[header::AUTHORIZATION], "Bearer abc");

        let request = build_request("ws://127.0.0.1:3000/backoffice-updates", None).unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());

        assert!(matches!(
            build_request("not a url", None),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn endpoint_joins_namespace() {
        let transport = WebSocketTransport::new("ws://host:3000/", DEFAULT_RECONNECT_DELAY).unwrap();
        assert_eq!(
            transport.endpoint("/backoffice-updates"),
            "ws://host:3000/backoffice-updates"
        );
    }

    #[tokio::test]
    async fn frames_reach_listeners() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen_auth: Arc<Mutex<Option<(String, String)>>> = Arc::new(Mutex::new(None));
        let server_auth = seen_auth.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &ServerRequest, resp: Response| -> Result<Response, ErrorResponse> {
                let auth = req
                    .headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *server_auth.lock().unwrap() = Some((req.uri().path().to_string(), auth));
                Ok(resp)
            };
            let mut ws = accept_hdr_async(stream, callback).await.unwrap();

            ws.send(Message::Text("not json".into())).await.unwrap();
            let frame = json!({ "event": "shipment:update", "data": { "id": "S1" } });
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            // Hold the socket open until the client hangs up.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let transport =
            WebSocketTransport::new(format!("ws://{}", addr), Duration::from_millis(50)).unwrap();
        let mut conn = transport.connect("/backoffice-updates", Some("tok")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        conn.on(
            "shipment:update",
            Arc::new(move |data: Value| {
                let _ = tx.send(data);
            }),
        );

        let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data, json!({ "id": "S1" }));
        assert_eq!(
            seen_auth.lock().unwrap().clone(),
            Some(("/backoffice-updates".to_string(), "Bearer tok".to_string()))
        );

        conn.disconnect();
    }

    #[tokio::test]
    async fn dial_waits_for_first_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicBool::new(false));
        let server_accepted = accepted.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            server_accepted.store(true, Ordering::SeqCst);
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Push immediately after the handshake.
            let frame = json!({ "event": "route:update", "data": { "id": "R1" } });
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let transport =
            WebSocketTransport::new(format!("ws://{}", addr), Duration::from_millis(50)).unwrap();
        let mut conn = transport.connect("/backoffice-updates", None).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!accepted.load(Ordering::SeqCst));

        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        conn.on(
            "route:update",
            Arc::new(move |data: Value| {
                let _ = tx.send(data);
            }),
        );

        let data = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(data, json!({ "id": "R1" }));
        conn.disconnect();
    }
}
