use std::sync::{Arc, RwLock};

use heatgrid::core_modules::utils::image_helper::image_helper;
use heatgrid::{FrameSink, RenderedFrame, StatusMessage};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Png,
}

#[derive(Debug, Clone)]
pub struct FramePacket {
    pub ts_millis: u64,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub settled: bool,
    pub data: Arc<[u8]>,
}

/// What the browser status panel shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusMeta {
    pub text: String,
    pub state: String,
    pub source: Option<String>,
    pub timestamp: Option<String>,
}

impl From<&StatusMessage> for StatusMeta {
    fn from(status: &StatusMessage) -> Self {
        let (source, timestamp) = match status {
            StatusMessage::Live { timestamp, source } => (Some(source.as_str().to_string()), Some(timestamp.clone())),
            _ => (None, None),
        };
        Self {
            text: status.to_string(),
            state: status.state().to_string(),
            source,
            timestamp,
        }
    }
}

#[derive(Default)]
struct Latest {
    frame: Option<FramePacket>,
    meta: StatusMeta,
}

#[derive(Clone)]
pub struct FrameBus {
    pub frames_tx: broadcast::Sender<FramePacket>,
    pub meta_tx: broadcast::Sender<StatusMeta>,
    latest: Arc<RwLock<Latest>>,
}

impl FrameBus {
    pub fn new(capacity: usize) -> Self {
        let (frames_tx, _) = broadcast::channel::<FramePacket>(capacity.max(1));
        let (meta_tx, _) = broadcast::channel::<StatusMeta>(capacity.max(1));
        Self {
            frames_tx,
            meta_tx,
            latest: Arc::new(RwLock::new(Latest::default())),
        }
    }

    pub fn latest_frame(&self) -> Option<FramePacket> {
        self.latest.read().unwrap_or_else(|poisoned| poisoned.into_inner()).frame.clone()
    }

    pub fn latest_meta(&self) -> StatusMeta {
        self.latest.read().unwrap_or_else(|poisoned| poisoned.into_inner()).meta.clone()
    }
}

impl FrameSink for FrameBus {
    fn publish_frame(&mut self, frame: &RenderedFrame) {
        let data = match image_helper::encode_png(&frame.canvas) {
            Ok(bytes) => Arc::<[u8]>::from(bytes),
            Err(error) => {
                tracing::warn!(%error, "failed to encode frame");
                return;
            }
        };
        let packet = FramePacket {
            ts_millis: frame.ts_millis,
            width: frame.canvas.width(),
            height: frame.canvas.height(),
            format: FrameFormat::Png,
            settled: frame.settled,
            data,
        };
        self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner()).frame = Some(packet.clone());
        // No subscribers is fine: nobody has the page open.
        let _ = self.frames_tx.send(packet);
    }

    fn publish_status(&mut self, status: &StatusMessage) {
        let meta = StatusMeta::from(status);
        self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner()).meta = meta.clone();
        let _ = self.meta_tx.send(meta);
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// A server started by `start_server`. `local_addr` is the address actually
/// bound, which differs from the configured one when port 0 was requested.
#[derive(Debug)]
pub struct RunningServer {
    pub local_addr: std::net::SocketAddr,
    pub task: tokio::task::JoinHandle<()>,
}

impl RunningServer {
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[cfg(feature = "web")]
pub async fn start_server(bus: FrameBus, cfg: ServerConfig) -> anyhow::Result<RunningServer> {
    use axum::extract::State;
    use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
    use axum::http::{StatusCode, header};
    use axum::response::{Html, IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use futures_util::{SinkExt, StreamExt};
    use tokio::sync::broadcast::error::RecvError;

    const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Heatgrid</title></head>
<body style="background:#181818;color:#ddd;font-family:sans-serif">
    <main>
        <h2>Heatgrid Live Matrix</h2>
        <div id="status" style="margin: 8px 0; font-family:monospace; font-size:13px; color:#aaa">Idle</div>
        <img id="grid" width="512" height="512" style="border:1px solid #444; image-rendering:pixelated" alt="">
        <script src="/client.js"></script>
    </main>
</body>
</html>"#;

    // Receives PNG frames as binary messages and status as JSON text messages.
    const CLIENT_JS: &str = r#"(function(){
        const statusEl = document.getElementById('status');
        const grid = document.getElementById('grid');
        let lastUrl = null;
        const connect = ()=>{
            const ws = new WebSocket((location.protocol==='https:'?'wss://':'ws://')+location.host+'/ws/frames');
            ws.binaryType = 'arraybuffer';
            ws.onmessage = (ev)=>{
                if(ev.data instanceof ArrayBuffer){
                    const url = URL.createObjectURL(new Blob([ev.data], {type:'image/png'}));
                    grid.src = url;
                    if(lastUrl) URL.revokeObjectURL(lastUrl);
                    lastUrl = url;
                } else {
                    const meta = JSON.parse(ev.data);
                    statusEl.textContent = meta.text;
                    statusEl.style.color = meta.state==='error' ? '#e66' : (meta.state==='live' ? '#6e6' : '#aaa');
                }
            };
            ws.onclose = ()=>{ statusEl.textContent = 'disconnected'; setTimeout(connect, 1000); };
        };
        connect();
    })();"#;

    async fn ws_conn(socket: WebSocket, bus: FrameBus) {
        let mut frames_rx = bus.frames_tx.subscribe();
        let mut meta_rx = bus.meta_tx.subscribe();
        let (mut ws_tx, mut ws_rx) = socket.split();

        // Bring a fresh page up to date before streaming.
        if let Ok(text) = serde_json::to_string(&bus.latest_meta()) {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        if let Some(frame) = bus.latest_frame() {
            if ws_tx.send(Message::Binary(frame.data.to_vec())).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                frame = frames_rx.recv() => match frame {
                    Ok(pkt) => {
                        if ws_tx.send(Message::Binary(pkt.data.to_vec())).await.is_err() { break; }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                meta = meta_rx.recv() => match meta {
                    Ok(meta) => {
                        let Ok(text) = serde_json::to_string(&meta) else { continue };
                        if ws_tx.send(Message::Text(text)).await.is_err() { break; }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                incoming = ws_rx.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn ws_handler(ws: WebSocketUpgrade, State(bus): State<FrameBus>) -> Response {
        ws.on_upgrade(move |socket| ws_conn(socket, bus))
    }

    async fn frame_png(State(bus): State<FrameBus>) -> Response {
        match bus.latest_frame() {
            Some(frame) => ([(header::CONTENT_TYPE, "image/png")], frame.data.to_vec()).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }

    async fn status(State(bus): State<FrameBus>) -> Json<StatusMeta> {
        Json(bus.latest_meta())
    }

    let app = Router::new()
        .route("/", get(|| async { Html(INDEX_HTML) }))
        .route(
            "/client.js",
            get(|| async { ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS) }),
        )
        .route("/ws/frames", get(ws_handler))
        .route("/frame.png", get(frame_png))
        .route("/status", get(status))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(bus);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Visualizer server listening on http://{local_addr}");

    let task = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            tracing::warn!(%error, "visualizer server exited");
        }
    });

    Ok(RunningServer { local_addr, task })
}

#[cfg(not(feature = "web"))]
pub async fn start_server(_bus: FrameBus, _cfg: ServerConfig) -> anyhow::Result<RunningServer> {
    Err(anyhow::anyhow!("web feature not enabled for heatgrid_visualizer"))
}
