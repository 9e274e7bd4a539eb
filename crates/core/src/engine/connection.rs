//! JSON-RPC correlation over the DevTools WebSocket.
//!
//! Requests carry sequential ids; responses are matched back to pending
//! oneshot channels, and everything arriving without an id fans out to
//! event subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize)]
struct Request<'a> {
	id: u32,
	method: &'a str,
	params: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ProtocolError {
	code: i64,
	message: String,
}

#[derive(Debug, Deserialize)]
struct Response {
	id: u32,
	#[serde(default)]
	result: Option<Value>,
	#[serde(default)]
	error: Option<ProtocolError>,
}

/// A protocol notification, distinguished from responses by the absence of
/// an `id` field.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
	Response(Response),
	Event(Event),
}

type Pending = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// One DevTools WebSocket connection with request/response correlation.
pub(crate) struct CdpConnection {
	last_id: AtomicU32,
	pending: Pending,
	outbound: mpsc::UnboundedSender<String>,
	events: broadcast::Sender<Event>,
}

impl CdpConnection {
	/// Connects to a DevTools endpoint and spawns the IO loops.
	pub(crate) async fn connect(ws_url: &str) -> Result<Arc<Self>> {
		let (socket, _) = connect_async(ws_url)
			.await
			.map_err(|err| Error::Launch(format!("failed to connect to {ws_url}: {err}")))?;
		let (mut sink, mut stream) = socket.split();

		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

		let connection = Arc::new(Self {
			last_id: AtomicU32::new(0),
			pending: Arc::new(Mutex::new(HashMap::new())),
			outbound,
			events: events.clone(),
		});

		tokio::spawn(async move {
			while let Some(text) = outbound_rx.recv().await {
				if let Err(err) = sink.send(WsMessage::Text(text)).await {
					error!(target = "dvc.cdp", error = %err, "websocket send failed");
					break;
				}
			}
		});

		let pending = Arc::clone(&connection.pending);
		tokio::spawn(async move {
			while let Some(frame) = stream.next().await {
				let text = match frame {
					Ok(WsMessage::Text(text)) => text,
					Ok(WsMessage::Close(_)) | Err(_) => break,
					Ok(_) => continue,
				};
				match serde_json::from_str::<Incoming>(&text) {
					Ok(incoming) => route(incoming, &pending, &events).await,
					Err(err) => {
						debug!(target = "dvc.cdp", error = %err, "unparseable frame");
					}
				}
			}
			// Socket gone: fail whatever is still waiting.
			let mut pending = pending.lock().await;
			for (_, tx) in pending.drain() {
				let _ = tx.send(Err(Error::ChannelClosed));
			}
		});

		Ok(connection)
	}

	pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.events.subscribe()
	}

	/// Sends one command and awaits its response.
	pub(crate) async fn send(&self, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().await.insert(id, tx);

		let request = serde_json::to_string(&Request { id, method, params })?;
		trace!(target = "dvc.cdp", %method, id, "send");
		self.outbound.send(request).map_err(|_| Error::ChannelClosed)?;

		rx.await.map_err(|_| Error::ChannelClosed).and_then(|result| result)
	}
}

async fn route(incoming: Incoming, pending: &Pending, events: &broadcast::Sender<Event>) {
	match incoming {
		Incoming::Response(response) => {
			let Some(tx) = pending.lock().await.remove(&response.id) else {
				debug!(
					target = "dvc.cdp",
					id = response.id,
					"response without a pending request"
				);
				return;
			};
			let result = match response.error {
				Some(err) => Err(Error::Protocol(format!("{} (code {})", err.message, err.code))),
				None => Ok(response.result.unwrap_or(Value::Null)),
			};
			let _ = tx.send(result);
		}
		Incoming::Event(event) => {
			trace!(target = "dvc.cdp", method = %event.method, params = %event.params, "event");
			// No subscribers is fine; settle waits come and go.
			let _ = events.send(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn frames_with_an_id_classify_as_responses() {
		let incoming: Incoming =
			serde_json::from_str(r#"{"id": 7, "result": {"frameId": "F1"}}"#).unwrap();
		match incoming {
			Incoming::Response(response) => {
				assert_eq!(response.id, 7);
				assert_eq!(response.result.unwrap()["frameId"], "F1");
				assert!(response.error.is_none());
			}
			Incoming::Event(_) => panic!("expected a response"),
		}
	}

	#[test]
	fn frames_without_an_id_classify_as_events() {
		let incoming: Incoming = serde_json::from_str(
			r#"{"method": "Page.loadEventFired", "params": {"timestamp": 12.5}}"#,
		)
		.unwrap();
		match incoming {
			Incoming::Event(event) => {
				assert_eq!(event.method, "Page.loadEventFired");
				assert_eq!(event.params["timestamp"], 12.5);
			}
			Incoming::Response(_) => panic!("expected an event"),
		}
	}

	#[tokio::test]
	async fn responses_correlate_back_to_their_request() {
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let (events, _) = broadcast::channel(8);

		let (tx, rx) = oneshot::channel();
		pending.lock().await.insert(3, tx);

		let incoming: Incoming =
			serde_json::from_str(r#"{"id": 3, "result": {"ok": true}}"#).unwrap();
		route(incoming, &pending, &events).await;

		let result = rx.await.unwrap().unwrap();
		assert_eq!(result["ok"], true);
		assert!(pending.lock().await.is_empty());
	}

	#[tokio::test]
	async fn protocol_errors_surface_with_code_and_message() {
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let (events, _) = broadcast::channel(8);

		let (tx, rx) = oneshot::channel();
		pending.lock().await.insert(0, tx);

		let incoming: Incoming = serde_json::from_value(json!({
			"id": 0,
			"error": {"code": -32000, "message": "No node with given id found"}
		}))
		.unwrap();
		route(incoming, &pending, &events).await;

		let err = rx.await.unwrap().unwrap_err();
		match err {
			Error::Protocol(message) => {
				assert!(message.contains("No node with given id found"));
				assert!(message.contains("-32000"));
			}
			other => panic!("expected a protocol error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn events_fan_out_to_subscribers() {
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let (events, mut rx) = broadcast::channel(8);

		let incoming: Incoming =
			serde_json::from_str(r#"{"method": "Page.loadEventFired", "params": {}}"#).unwrap();
		route(incoming, &pending, &events).await;

		let event = rx.recv().await.unwrap();
		assert_eq!(event.method, "Page.loadEventFired");
	}
}
