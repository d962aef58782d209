//! In-process walkthrough: load a bundle, bind a scope and call a method
//! against a responder living on the other end of a `ChannelTransport`.
//!
//! Run with `cargo run -p fender --example search`.

use std::sync::Arc;

use fender::client::FenderClient;
use fender::schema::SchemaRegistry;
use fender::transport::{CallReceiver, ChannelTransport};
use serde_json::{json, Value};
use tracing_subscriber::filter::LevelFilter;

const BUNDLE: &str = include_str!("proto-bundle.json");

/// Answers every Search with a single track echoing the query.
async fn respond(mut receiver: CallReceiver) {
    while let Some(call) = receiver.next().await {
        let request: Value = serde_json::from_slice(&call.payload).unwrap_or(Value::Null);
        let query = request["q"].as_str().unwrap_or_default();
        let body = json!({
            "results": [{
                "title": format!("{query} (live)"),
                "artist": "The Demo Band",
                "duration_ms": 215_000,
                "kind": "TRACK",
                "plays": "1200345"
            }]
        });
        receiver.respond(call.id, body.to_string().into_bytes());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::DEBUG)
        .init();

    let registry = SchemaRegistry::from_bundle_str(BUNDLE)?;

    let (transport, receiver) = ChannelTransport::pair();
    let client = FenderClient::new(Arc::new(transport))?;
    tokio::spawn(respond(receiver));

    let bound = client.prepare_scope(&registry, "spotify.v1")?;
    println!("bound: {}", bound.join(", "));

    let metadata = client.service("spotify.v1.TrackMetadata")?.instantiate();
    let response = metadata.call("Search", json!({ "q": "Hot" })).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    // Missing the required query: rejected before anything is sent.
    match metadata.call("Search", json!({ "limit": 5 })).await {
        Ok(_) => println!("unexpectedly accepted"),
        Err(err) => println!("rejected: {err}"),
    }

    Ok(())
}
