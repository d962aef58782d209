use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use fender_frame::{Frame, FrameCodec, FrameConfig, FrameKind};
use fender_schema::MethodDescriptor;
use futures_util::{SinkExt, StreamExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{CorrelationId, Delivery, ResponseSink, SinkSlot, Transport};

/// Framed RPC transport over a Unix domain socket.
///
/// A writer task drains an outbound queue into the socket and a reader task
/// routes reply frames to the attached [`ResponseSink`]. Must be created
/// inside a tokio runtime.
#[derive(Debug)]
pub struct SocketTransport {
    path: PathBuf,
    config: FrameConfig,
    slot: Arc<SinkSlot>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SocketTransport {
    /// Connect with the default frame configuration.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_config(path, FrameConfig::default()).await
    }

    pub async fn connect_with_config(path: impl AsRef<Path>, config: FrameConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| TransportError::Connect {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "connected");

        let (read_half, write_half) = stream.into_split();
        let slot = Arc::new(SinkSlot::default());
        let (outbound, queue) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(
            FramedWrite::new(write_half, FrameCodec::new(config.clone())),
            queue,
            Arc::clone(&slot),
        ));
        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, FrameCodec::new(config.clone())),
            Arc::clone(&slot),
        ));

        Ok(Self {
            path,
            config,
            slot,
            outbound: Mutex::new(Some(outbound)),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// The socket path this transport connected to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop accepting sends and stop reading. Frames already queued (such
    /// as a final abandon) are still flushed before the writer closes the
    /// socket. Outstanding calls are not failed here; the client's deadlines
    /// handle them.
    pub fn shutdown(&self) {
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_some() {
            debug!(path = %self.path.display(), "transport shut down");
        }
        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
    }

    fn enqueue(&self, frame: Frame) -> Result<()> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = outbound.as_ref().ok_or(TransportError::Shutdown)?;
        sender.send(frame).map_err(|_| TransportError::Shutdown)
    }
}

impl Transport for SocketTransport {
    fn attach(&self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        self.slot.set(sink)
    }

    fn send(&self, id: CorrelationId, method: &MethodDescriptor, request: Bytes) -> Result<()> {
        if request.len() > self.config.max_payload_size {
            return Err(fender_frame::FrameError::PayloadTooLarge {
                size: request.len(),
                max: self.config.max_payload_size,
            }
            .into());
        }
        let route = method.route();
        debug!(%id, route = %route, bytes = request.len(), "sending request");
        self.enqueue(Frame::request(id.get(), route, request))
    }

    fn abandon(&self, id: CorrelationId) {
        if let Err(err) = self.enqueue(Frame::abandon(id.get())) {
            debug!(%id, error = %err, "abandon not sent");
        }
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut queue: mpsc::UnboundedReceiver<Frame>,
    slot: Arc<SinkSlot>,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(err) = sink.send(frame).await {
            warn!(error = %err, "write failed, closing transport");
            if let Some(responses) = slot.get() {
                responses.disconnected(&err.to_string());
            }
            return;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(mut stream: FramedRead<OwnedReadHalf, FrameCodec>, slot: Arc<SinkSlot>) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(frame)) => route_reply(&slot, frame),
            Some(Err(err)) => break err.to_string(),
            None => break "connection closed by peer".to_string(),
        }
    };

    debug!(reason = %reason, "reader stopped");
    match slot.get() {
        Some(responses) => responses.disconnected(&reason),
        None => warn!(reason = %reason, "disconnected with no sink attached"),
    }
}

fn route_reply(slot: &SinkSlot, frame: Frame) {
    let id = CorrelationId::new(frame.correlation_id);
    let delivery = match frame.kind {
        FrameKind::Response => Delivery::Response(frame.payload),
        FrameKind::Error => Delivery::Failure(TransportError::Remote(
            String::from_utf8_lossy(&frame.payload).into_owned(),
        )),
        FrameKind::Request | FrameKind::Abandon => {
            warn!(%id, kind = ?frame.kind, "ignoring unexpected frame from peer");
            return;
        }
    };

    match slot.get() {
        Some(responses) => responses.deliver(id, delivery),
        None => warn!(%id, "reply dropped: no sink attached"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::UnixListener;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio_util::codec::Framed;

    use super::*;

    struct Forward(UnboundedSender<String>);

    impl ResponseSink for Forward {
        fn deliver(&self, id: CorrelationId, delivery: Delivery) {
            let text = match delivery {
                Delivery::Response(body) => {
                    format!("{} {}", id.get(), String::from_utf8_lossy(&body))
                }
                Delivery::Failure(err) => format!("{} failed: {err}", id.get()),
            };
            let _ = self.0.send(text);
        }

        fn disconnected(&self, reason: &str) {
            let _ = self.0.send(format!("disconnected: {reason}"));
        }
    }

    fn socket_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fender-transport-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rpc.sock");
        let _ = std::fs::remove_file(&path);
        path
    }

    fn search() -> MethodDescriptor {
        MethodDescriptor::new("Search", "spotify.v1.TrackMetadata", "a.Req", "a.Resp")
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn request_response_over_unix_socket() {
        let path = socket_path("roundtrip");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, FrameCodec::default());

            let request = framed.next().await.unwrap().unwrap();
            assert_eq!(request.kind, FrameKind::Request);
            assert_eq!(request.route, "/spotify.v1.TrackMetadata/Search");
            framed
                .send(Frame::response(request.correlation_id, &b"{\"results\":[]}"[..]))
                .await
                .unwrap();

            let second = framed.next().await.unwrap().unwrap();
            framed
                .send(Frame::error(second.correlation_id, "no such track"))
                .await
                .unwrap();

            let abandon = framed.next().await.unwrap().unwrap();
            assert_eq!(abandon.kind, FrameKind::Abandon);
            assert_eq!(abandon.correlation_id, 3);
        });

        let transport = SocketTransport::connect(&path).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.attach(Arc::new(Forward(tx))).unwrap();

        transport
            .send(CorrelationId::new(1), &search(), Bytes::from_static(b"{\"q\":\"Hot\"}"))
            .unwrap();
        assert_eq!(recv(&mut rx).await, "1 {\"results\":[]}");

        transport
            .send(CorrelationId::new(2), &search(), Bytes::from_static(b"{}"))
            .unwrap();
        assert_eq!(recv(&mut rx).await, "2 failed: remote error: no such track");

        transport.abandon(CorrelationId::new(3));
        server.await.unwrap();
        assert_eq!(recv(&mut rx).await, "disconnected: connection closed by peer");

        transport.shutdown();
        assert!(matches!(
            transport.send(CorrelationId::new(4), &search(), Bytes::new()),
            Err(TransportError::Shutdown)
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let path = socket_path("missing");
        let result = SocketTransport::connect(&path).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[tokio::test]
    async fn oversized_request_fails_synchronously() {
        let path = socket_path("oversized");
        let listener = UnixListener::bind(&path).unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.map(|(stream, _)| stream) });

        let config = FrameConfig {
            max_payload_size: 4,
        };
        let transport = SocketTransport::connect_with_config(&path, config)
            .await
            .unwrap();
        let _peer = accept.await.unwrap().unwrap();

        let result = transport.send(CorrelationId::new(1), &search(), Bytes::from_static(b"{\"q\":1}"));
        assert!(matches!(
            result,
            Err(TransportError::Frame(fender_frame::FrameError::PayloadTooLarge { .. }))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
