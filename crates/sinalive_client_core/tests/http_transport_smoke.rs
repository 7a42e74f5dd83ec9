use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use sinalive_client_core::{ClientCoreError, HttpTransport, Transport};
use sinalive_protocol::{BayeuxMessage, ClientId, EnvelopeError};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct SeenRequest {
	path: String,
	user_agent: String,
	message: Vec<Value>,
	jsonp: String,
}

type Seen = Arc<Mutex<Vec<SeenRequest>>>;

fn query_param(uri: &hyper::Uri, name: &str) -> Option<String> {
	let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
	url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

async fn handle(req: Request<Incoming>, seen: Seen) -> Result<Response<Full<Bytes>>, hyper::Error> {
	let uri = req.uri().clone();
	let user_agent = req
		.headers()
		.get(hyper::header::USER_AGENT)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("")
		.to_string();
	let message = query_param(&uri, "message")
		.and_then(|m| serde_json::from_str(&m).ok())
		.unwrap_or_default();
	let jsonp = query_param(&uri, "jsonp").unwrap_or_default();

	seen.lock().expect("seen lock").push(SeenRequest {
		path: uri.path().to_string(),
		user_agent,
		message,
		jsonp: jsonp.clone(),
	});

	let (status, body) = match uri.path() {
		"/cometd" => (
			StatusCode::OK,
			format!(r#"{jsonp}([{{"successful":true,"clientId":"abc"}},{{"data":{{"type":"msg","msgs":[{{"msg":"你好"}}]}}}}]);"#),
		),
		"/garbage" => (StatusCode::OK, "<html>maintenance</html>".to_string()),
		_ => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
	};

	Ok(Response::builder()
		.status(status)
		.header(hyper::header::CONTENT_TYPE, "text/javascript; charset=utf-8")
		.body(Full::new(Bytes::from(body)))
		.expect("response"))
}

async fn spawn_server() -> (SocketAddr, Seen) {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
	let addr = listener.local_addr().expect("local addr");
	let seen: Seen = Arc::default();

	let server_seen = seen.clone();
	tokio::spawn(async move {
		loop {
			let Ok((stream, _)) = listener.accept().await else {
				return;
			};
			let io = TokioIo::new(stream);
			let seen = server_seen.clone();
			tokio::spawn(async move {
				let service = service_fn(move |req| handle(req, seen.clone()));
				let _ = http1::Builder::new().serve_connection(io, service).await;
			});
		}
	});

	(addr, seen)
}

fn cid() -> ClientId {
	ClientId::new("abc").expect("non-empty")
}

#[tokio::test]
async fn sends_user_agent_and_increasing_ids() {
	let (addr, seen) = spawn_server().await;
	let transport = HttpTransport::new(&format!("http://{addr}/cometd"), "sinalive-test/1", None).expect("transport");

	let first = transport.send(vec![BayeuxMessage::handshake()]).await.expect("handshake");
	assert_eq!(first[0]["clientId"], "abc");
	assert_eq!(first[1]["data"]["msgs"][0]["msg"], "你好");

	transport
		.send(vec![BayeuxMessage::connect(&cid()), BayeuxMessage::subscribe(&cid(), "/chatroom/1")])
		.await
		.expect("second batch");

	let seen = seen.lock().expect("seen lock").clone();
	assert_eq!(seen.len(), 2);
	assert!(seen.iter().all(|r| r.user_agent == "sinalive-test/1"));
	assert!(seen.iter().all(|r| r.path == "/cometd"));

	assert_eq!(seen[0].jsonp, "parent.org.cometd.script._callback0");
	assert_eq!(seen[1].jsonp, "parent.org.cometd.script._callback1");

	let ids: Vec<u64> = seen
		.iter()
		.flat_map(|r| r.message.iter().map(|m| m["id"].as_u64().expect("id")))
		.collect();
	assert_eq!(ids, [1, 2, 3]);

	assert_eq!(seen[0].message[0]["channel"], "/meta/handshake");
	assert_eq!(seen[1].message[1], json!({
		"channel": "/meta/subscribe",
		"id": 3,
		"clientId": "abc",
		"subscription": "/chatroom/1",
	}));
}

#[tokio::test]
async fn keeps_existing_query_on_base_url() {
	let (addr, seen) = spawn_server().await;
	let transport = HttpTransport::new(&format!("http://{addr}/cometd?room=7"), "ua", None).expect("transport");

	transport.send(vec![BayeuxMessage::handshake()]).await.expect("send");

	let seen = seen.lock().expect("seen lock").clone();
	assert_eq!(seen[0].path, "/cometd");
	assert_eq!(seen[0].jsonp, "parent.org.cometd.script._callback0");
	assert_eq!(seen[0].message.len(), 1);
}

#[tokio::test]
async fn base_url_with_credentials_reaches_the_server() {
	let (addr, seen) = spawn_server().await;
	let transport = HttpTransport::new(&format!("http://user:pw@{addr}/cometd"), "ua", None).expect("transport");

	let resp = transport.send(vec![BayeuxMessage::handshake()]).await.expect("send");
	assert_eq!(resp[0]["clientId"], "abc");

	let seen = seen.lock().expect("seen lock").clone();
	assert_eq!(seen.len(), 1);
	assert_eq!(seen[0].path, "/cometd");
	assert_eq!(seen[0].jsonp, "parent.org.cometd.script._callback0");
}

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
	let (addr, _seen) = spawn_server().await;
	let transport = HttpTransport::new(&format!("http://{addr}/down"), "ua", None).expect("transport");

	let err = transport.send(vec![BayeuxMessage::handshake()]).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn body_without_wrapper_is_malformed() {
	let (addr, _seen) = spawn_server().await;
	let transport = HttpTransport::new(&format!("http://{addr}/garbage"), "ua", None).expect("transport");

	let err = transport.send(vec![BayeuxMessage::handshake()]).await.unwrap_err();
	assert!(
		matches!(err, ClientCoreError::Envelope(EnvelopeError::MissingWrapper)),
		"{err:?}"
	);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
	let addr = listener.local_addr().expect("local addr");
	drop(listener);

	let transport = HttpTransport::new(&format!("http://{addr}/cometd"), "ua", None).expect("transport");
	let err = transport.send(vec![BayeuxMessage::handshake()]).await.unwrap_err();
	assert!(matches!(err, ClientCoreError::Transport(_)), "{err:?}");
}
