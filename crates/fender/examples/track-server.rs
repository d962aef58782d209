//! Minimal Unix-socket responder for `fender call`.
//!
//! ```text
//! cargo run -p fender --example track-server -- /tmp/tracks.sock
//! fender call --bundle crates/fender/examples/proto-bundle.json \
//!     /tmp/tracks.sock spotify.v1.TrackMetadata/Search --json '{"q":"Hot"}'
//! ```

use std::path::PathBuf;

use fender::frame::{Frame, FrameCodec, FrameKind};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tracing_subscriber::filter::LevelFilter;

const SEARCH_ROUTE: &str = "/spotify.v1.TrackMetadata/Search";

fn answer(frame: &Frame) -> Frame {
    if frame.route != SEARCH_ROUTE {
        return Frame::error(frame.correlation_id, &format!("unknown route {}", frame.route));
    }
    let request: Value = match serde_json::from_slice(&frame.payload) {
        Ok(value) => value,
        Err(err) => return Frame::error(frame.correlation_id, &format!("bad request: {err}")),
    };
    let query = request["q"].as_str().unwrap_or_default();
    let limit = request["limit"].as_u64().unwrap_or(10).min(3);
    let results: Vec<Value> = (1..=limit)
        .map(|n| json!({ "title": format!("{query} #{n}"), "artist": "The Demo Band" }))
        .collect();
    Frame::response(
        frame.correlation_id,
        json!({ "results": results }).to_string().into_bytes(),
    )
}

async fn serve(stream: UnixStream) {
    let mut framed = Framed::new(stream, FrameCodec::default());
    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("dropping connection: {err}");
                return;
            }
        };
        match frame.kind {
            FrameKind::Request => {
                if let Err(err) = framed.send(answer(&frame)).await {
                    eprintln!("reply failed: {err}");
                    return;
                }
            }
            FrameKind::Abandon => eprintln!("caller gave up on #{}", frame.correlation_id),
            other => eprintln!("ignoring unexpected {other:?} frame"),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::INFO)
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp/fender-tracks.sock"));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    eprintln!("listening on {}", path.display());

    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(serve(stream));
    }
}
