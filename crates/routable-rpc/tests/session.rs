#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use routable_core::{Envelope, EnvelopeType, Frame, Method, Request, Response, RoutableError};
use routable_rpc::config::SessionConfig;
use routable_rpc::dispatch::{pass, reply, HandlerResult};
use routable_rpc::router::Router;
use routable_rpc::session::{SendOptions, Session, SessionState};
use routable_rpc::transport::mem::{self, MemEndpoint};
use routable_rpc::transport::{CloseInfo, Transport, TransportEvent};

type Items = Mutex<HashMap<String, Value>>;

fn short(ms: u64) -> SendOptions {
    SendOptions::timeout(Duration::from_millis(ms))
}

fn bind(end: MemEndpoint, cfg: SessionConfig) -> Session {
    Session::new(end.transport, end.events, cfg)
}

/// Two sessions over an established in-memory link.
async fn connected(server_cfg: SessionConfig) -> (Session, Session) {
    let (a, b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    let server = bind(b, server_cfg);
    link.establish().await;
    client.open().await.unwrap();
    server.open().await.unwrap();
    (client, server)
}

fn items_router() -> Router<Items> {
    let mut router: Router<Items> = Router::new();
    router
        .put("/items/:id", |req: Request, items: Arc<Items>| async move {
            let id = req.param("id").unwrap_or_default().to_owned();
            items
                .lock()
                .await
                .insert(id, req.body.unwrap_or(Value::Null));
            reply(Response::ok())
        })
        .unwrap()
        .get("/items/:id", |req: Request, items: Arc<Items>| async move {
            let id = req.param("id").unwrap_or_default();
            let found = items.lock().await.get(id).cloned();
            match found {
                Some(body) => reply(Response::ok().with_body(body)),
                None => pass(),
            }
        })
        .unwrap();
    router
}

/// Next envelope the raw peer receives.
async fn next_envelope(end: &mut MemEndpoint) -> Envelope {
    loop {
        match end.events.recv().await.unwrap() {
            TransportEvent::Message(frame) => {
                return Envelope::parse(&frame, None).unwrap().unwrap();
            }
            _ => continue,
        }
    }
}

#[tokio::test]
async fn put_then_get_round_trip() {
    let (client, server) = connected(SessionConfig::default()).await;
    server.listen(items_router());

    let put = Request::new(Method::Put, "/items/1").with_body(r#"{"name":"a"}"#);
    let res = client.send(put, SendOptions::default()).await.unwrap();
    assert_eq!(res, Response::new(200, "OK"));

    let res = client
        .send(Request::new(Method::Get, "/items/1"), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body_str(), Some(r#"{"name":"a"}"#));
    assert_eq!(client.pending().size(), 0);
}

#[tokio::test]
async fn unanswered_request_gets_not_found() {
    let (client, server) = connected(SessionConfig::default()).await;
    server.listen(items_router());

    let res = client
        .send(Request::new(Method::Get, "/items/missing"), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(res, Response::not_found());
}

#[tokio::test]
async fn invalid_request_fails_before_transport() {
    let (a, _b) = mem::pair();
    let client = bind(a, SessionConfig::default());

    let err = client
        .send_value(json!({ "url": "/x", "method": "FETCH" }), SendOptions::default())
        .await
        .unwrap_err();
    match err {
        RoutableError::InvalidRequest(errors) => assert_eq!(errors.len(), 1),
        other => panic!("unexpected {other:?}"),
    }
    // Still CONNECTING: nothing waited for open.
    assert_eq!(client.state(), SessionState::Connecting);
    assert_eq!(client.pending().size(), 0);
}

#[tokio::test]
async fn handler_failure_becomes_error_envelope() {
    let (client, server) = connected(SessionConfig::default()).await;
    server.listen(|_req: Request| async {
        let res: HandlerResult = Err(RoutableError::BadRequest("nope".into()));
        res
    });

    let err = client
        .send(Request::new(Method::Post, "/x"), SendOptions::default())
        .await
        .unwrap_err();
    match err {
        RoutableError::Remote(payload) => {
            assert_eq!(payload["code"], "BAD_REQUEST");
            assert!(payload["message"].as_str().unwrap().contains("nope"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let (client, server) = connected(SessionConfig::default()).await;
    server.listen(|req: Request| async move {
        if req.url.ends_with("/panic") {
            panic!("handler blew up");
        }
        reply(Response::ok())
    });

    let err = client
        .send(Request::new(Method::Get, "/panic"), SendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RoutableError::Remote(p) if p["code"] == "INTERNAL"));

    // The session keeps serving.
    let res = client
        .send(Request::new(Method::Get, "/fine"), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(res.status, 200);
}

#[tokio::test]
async fn no_listener_drops_request() {
    let (client, _server) = connected(SessionConfig::default()).await;
    let err = client
        .send(Request::new(Method::Get, "/x"), short(50))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutableError::Timeout(_)));
    assert_eq!(client.pending().size(), 0);
}

#[tokio::test]
async fn non_conforming_response_rejects_call() {
    let (a, mut peer) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    link.establish().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/x"), SendOptions::default()).await }
    });

    let req = next_envelope(&mut peer).await;
    assert_eq!(req.kind, EnvelopeType::Request);
    let bad = Envelope::wrap_response(req.id, json!({ "status": -1, "statusText": "?" }));
    peer.transport.send(bad.to_frame().unwrap()).await.unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, RoutableError::NonConforming(_)));
}

#[tokio::test]
async fn malformed_and_stray_frames_are_dropped() {
    let (a, mut peer) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    link.establish().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/x"), SendOptions::default()).await }
    });
    let req = next_envelope(&mut peer).await;

    let junk = [
        Frame::from("not json"),
        Frame::Binary(bytes::Bytes::from_static(b"\x00\x01")),
        Frame::from(r#"{"id":"x","type":"RESPONSE","payload":null}"#),
        Envelope::wrap_response("unknown-id", Response::ok().to_payload().unwrap())
            .to_frame()
            .unwrap(),
        Envelope::wrap_response("open", Response::ok().to_payload().unwrap())
            .to_frame()
            .unwrap(),
    ];
    for frame in junk {
        peer.transport.send(frame).await.unwrap();
    }

    let ok = Envelope::wrap_response(req.id, Response::ok().with_body("done").to_payload().unwrap());
    peer.transport.send(ok.to_frame().unwrap()).await.unwrap();

    let res = call.await.unwrap().unwrap();
    assert_eq!(res.body_str(), Some("done"));
    assert_eq!(client.state(), SessionState::Open);
}

#[tokio::test]
async fn relative_urls_are_made_absolute() {
    let (a, mut peer) = mem::pair_with_url(Some("ws://peer:8787/api/".into()));
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    link.establish().await;

    let _call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/items/1?x=1"), short(50)).await }
    });
    let req = next_envelope(&mut peer).await;
    assert_eq!(req.payload["url"], "ws://peer:8787/api/items/1?x=1");
}

#[tokio::test]
async fn configured_headers_reach_the_listener() {
    let mut cfg = SessionConfig::default();
    cfg.headers.insert("x-node".into(), "edge-1".into());
    let (client, server) = connected(cfg).await;
    server.listen(|req: Request| async move {
        let node = req
            .headers
            .as_ref()
            .and_then(|h| h.get("x-node"))
            .cloned()
            .unwrap_or_default();
        reply(Response::ok().with_body(node))
    });

    let res = client
        .send(
            Request::new(Method::Get, "/").with_header("x-node", "spoofed"),
            SendOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(res.body_str(), Some("edge-1"));
}

#[tokio::test]
async fn both_peers_can_call_each_other() {
    let (client, server) = connected(SessionConfig::default()).await;
    client.listen(|_req: Request| async { reply(Response::new(200, "from client")) });

    // The server answers by first calling back into the client.
    let back = server.clone();
    server.listen(move |_req: Request| {
        let back = back.clone();
        async move {
            let inner = back.send(Request::new(Method::Get, "/whoami"), SendOptions::default()).await?;
            reply(Response::ok().with_body(inner.status_text))
        }
    });

    let res = client
        .send(Request::new(Method::Get, "/relay"), SendOptions::default())
        .await
        .unwrap();
    assert_eq!(res.body_str(), Some("from client"));
}

#[tokio::test]
async fn open_resolves_when_transport_opens() {
    let (a, _b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    assert_eq!(client.state(), SessionState::Connecting);

    let opening = tokio::spawn({
        let client = client.clone();
        async move { client.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    link.establish().await;

    opening.await.unwrap().unwrap();
    assert_eq!(client.state(), SessionState::Open);
    assert!(!client.pending().has("open"));
    // Already open: completes immediately.
    client.open().await.unwrap();
}

#[tokio::test]
async fn open_rejects_on_transport_error() {
    let (a, _b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());

    let opening = tokio::spawn({
        let client = client.clone();
        async move { client.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    link.fail("connection refused").await;

    let err = opening.await.unwrap().unwrap_err();
    assert!(matches!(err, RoutableError::Transport(m) if m == "connection refused"));
}

#[tokio::test]
async fn open_rejects_on_close() {
    let (a, _b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());

    let opening = tokio::spawn({
        let client = client.clone();
        async move { client.open().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    link.sever("reset").await;

    let err = opening.await.unwrap().unwrap_err();
    assert!(matches!(err, RoutableError::Closed { code: 1006, .. }));
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn open_times_out() {
    let (a, _b) = mem::pair();
    let mut cfg = SessionConfig::default();
    cfg.open_timeout_ms = 30;
    let client = bind(a, cfg);

    let err = client.open().await.unwrap_err();
    assert!(matches!(err, RoutableError::Timeout(id) if id == "open"));
}

#[tokio::test]
async fn send_waits_for_open() {
    let (a, b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    let server = bind(b, SessionConfig::default());
    server.listen(|_req: Request| async { reply(Response::ok()) });

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/"), SendOptions::default()).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    link.establish().await;

    assert_eq!(call.await.unwrap().unwrap().status, 200);
}

#[tokio::test]
async fn concurrent_sends_share_the_open_wait() {
    let (a, b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    let server = bind(b, SessionConfig::default());
    server.listen(|_req: Request| async { reply(Response::ok()) });

    let calls: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .send(Request::new(Method::Get, "/"), SendOptions::default())
                    .await
            })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(client.pending().has("open"));
    link.establish().await;

    for call in calls {
        assert_eq!(call.await.unwrap().unwrap().status, 200);
    }
    assert_eq!(client.pending().size(), 0);
}

#[tokio::test]
async fn concurrent_opens_all_see_the_failure() {
    let (a, _b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());

    let opens: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.open().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    link.fail("connection refused").await;

    for open in opens {
        let err = open.await.unwrap().unwrap_err();
        assert!(matches!(err, RoutableError::Transport(m) if m == "connection refused"));
    }
}

#[tokio::test]
async fn concurrent_closes_both_complete() {
    let (client, _server) = connected(SessionConfig::default()).await;
    let (first, second) = tokio::join!(client.close(), client.close());
    first.unwrap();
    second.unwrap();
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn integral_float_status_is_accepted() {
    let (a, mut peer) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    link.establish().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/x"), SendOptions::default()).await }
    });

    let req = next_envelope(&mut peer).await;
    let res = Envelope::wrap_response(req.id, json!({ "status": 200.0, "statusText": "OK" }));
    peer.transport.send(res.to_frame().unwrap()).await.unwrap();

    assert_eq!(call.await.unwrap().unwrap(), Response::ok());
}

#[tokio::test]
async fn close_with_outstanding_calls_leaves_them_pending() {
    let (client, server) = connected(SessionConfig::default()).await;
    // Never answers.
    server.listen(|_req: Request| async {
        std::future::pending::<()>().await;
        pass()
    });

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.send(Request::new(Method::Get, "/slow"), short(150)).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.pending().size(), 1);

    client.close().await.unwrap();
    assert_eq!(client.state(), SessionState::Closed);
    assert_eq!(client.pending().size(), 1);

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, RoutableError::Timeout(_)));
    assert_eq!(client.pending().size(), 0);

    client.closed().await;
    server.closed().await;
}

#[tokio::test]
async fn close_on_closed_transport_is_immediate() {
    let (client, _server) = connected(SessionConfig::default()).await;
    client.close().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn unclean_close_rejects_close_wait() {
    let (a, _b) = mem::pair();
    let link = Arc::clone(&a.transport);
    let client = bind(a, SessionConfig::default());
    link.establish().await;
    client.open().await.unwrap();

    let closing = client.pending().set("close", None);
    link.inject(TransportEvent::Close(CloseInfo::abnormal("dropped"))).await;

    let err = closing.await.unwrap_err();
    assert!(matches!(err, RoutableError::Closed { code: 1006, reason } if reason == "dropped"));
    client.closed().await;
    assert_eq!(link.ready_state(), routable_rpc::transport::ready_state::OPEN);
}
