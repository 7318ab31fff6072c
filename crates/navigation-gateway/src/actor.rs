//! The per-connection actor.
//!
//! Each accepted `WebSocket` runs two loops sharing the client's
//! cancellation signal:
//!
//! - the **inbound** loop decodes [`ClientEnvelope`]s and applies them to
//!   the session store; when it ends the client is unregistered and
//!   closed;
//! - the **outbound** loop drains the client's mailbox in order, pings the
//!   peer every [`PING_PERIOD`], and sends a normal-closure frame when the
//!   client is closed or its mailbox is dropped.
//!
//! Any transport failure ends the connection; nothing is retried here.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use navigation_db::SessionStore;
use navigation_types::{ClientEnvelope, Position, ServerMessage, Session};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::hub::Hub;

/// Interval between liveness pings (nine tenths of a minute).
pub const PING_PERIOD: Duration = Duration::from_secs(54);

const CLOSE_REASON: &str = "bye";

/// Drive a registered client over an upgraded socket until it disconnects.
pub async fn run_client(
    socket: WebSocket,
    client: Arc<Client>,
    mailbox: mpsc::Receiver<ServerMessage>,
    hub: Arc<Hub>,
    store: SessionStore,
) {
    let (sink, stream) = socket.split();
    run_connection(sink, stream, client, mailbox, hub, store, PING_PERIOD).await;
}

/// Transport-agnostic body of [`run_client`].
///
/// Any frame sink and stream work, so a connection can be driven over
/// in-memory channels as well as over a real socket.
pub async fn run_connection<Si, St, E>(
    sink: Si,
    stream: St,
    client: Arc<Client>,
    mailbox: mpsc::Receiver<ServerMessage>,
    hub: Arc<Hub>,
    store: SessionStore,
    ping_period: Duration,
) where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    info!(
        session_id = %client.session_id(),
        connection_id = %client.connection_id(),
        "client connected"
    );

    let writer = tokio::spawn(write_loop(sink, Arc::clone(&client), mailbox, ping_period));

    read_loop(stream, &client, &store).await;
    hub.unregister(&client).await;
    client.close();

    if let Err(e) = writer.await {
        warn!(session_id = %client.session_id(), "outbound loop failed: {e}");
    }
    info!(
        session_id = %client.session_id(),
        connection_id = %client.connection_id(),
        "client disconnected"
    );
}

async fn read_loop<St, E>(mut stream: St, client: &Client, store: &SessionStore)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let frame = tokio::select! {
            () = client.closed() => break,
            frame = stream.next() => frame,
        };

        let decoded = match frame {
            Some(Ok(Message::Text(text))) => serde_json::from_str::<ClientEnvelope>(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => {
                serde_json::from_slice::<ClientEnvelope>(bytes.as_ref())
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                debug!(session_id = %client.session_id(), "peer closed the connection");
                break;
            }
            Some(Err(e)) => {
                debug!(session_id = %client.session_id(), "read failed: {e}");
                break;
            }
        };

        match decoded {
            Ok(envelope) => dispatch(client, store, envelope).await,
            Err(e) => {
                warn!(session_id = %client.session_id(), "undecodable client message: {e}");
                break;
            }
        }
    }
}

/// Apply one inbound message.
///
/// Payload problems are logged and the message ignored; they never close
/// the connection.
pub(crate) async fn dispatch(client: &Client, store: &SessionStore, envelope: ClientEnvelope) {
    match envelope.kind.as_str() {
        "init" => init_session(client, store, envelope.data).await,
        "position" => update_position(client, store, envelope.data).await,
        "route" => debug!(session_id = %client.session_id(), "route message received"),
        other => debug!(session_id = %client.session_id(), kind = other, "unknown message type"),
    }
}

async fn init_session(client: &Client, store: &SessionStore, data: Value) {
    let session: Session = match serde_json::from_value(data) {
        Ok(session) => session,
        Err(e) => {
            warn!(session_id = %client.session_id(), "invalid init payload: {e}");
            return;
        }
    };
    if session.id != *client.session_id() {
        warn!(
            session_id = %client.session_id(),
            payload_id = %session.id,
            "init payload belongs to another session, ignored"
        );
        return;
    }

    let _guard = client.lock_session().await;
    match store.set(&session).await {
        Ok(()) => debug!(session_id = %session.id, "session initialized"),
        Err(e) => warn!(session_id = %session.id, "failed to store session: {e}"),
    }
}

async fn update_position(client: &Client, store: &SessionStore, data: Value) {
    let position: Position = match serde_json::from_value(data) {
        Ok(position) => position,
        Err(e) => {
            warn!(session_id = %client.session_id(), "invalid position payload: {e}");
            return;
        }
    };

    let _guard = client.lock_session().await;
    let mut session = match store.get(client.session_id()).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            debug!(session_id = %client.session_id(), "position before init, skipped");
            return;
        }
        Err(e) => {
            warn!(session_id = %client.session_id(), "failed to load session: {e}");
            return;
        }
    };

    session.apply_position(position, Utc::now());
    if let Err(e) = store.set(&session).await {
        warn!(session_id = %client.session_id(), "failed to store position: {e}");
    }
}

async fn write_loop<Si>(
    mut sink: Si,
    client: Arc<Client>,
    mut mailbox: mpsc::Receiver<ServerMessage>,
    ping_period: Duration,
) where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let start = Instant::now()
        .checked_add(ping_period)
        .unwrap_or_else(Instant::now);
    let mut ping = interval_at(start, ping_period);

    loop {
        let frame = tokio::select! {
            biased;
            () = client.closed() => {
                send_close(&mut sink, &client).await;
                break;
            }
            next = mailbox.recv() => match next {
                Some(message) => match serde_json::to_string(&message) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        warn!(session_id = %client.session_id(), "failed to encode message: {e}");
                        continue;
                    }
                },
                None => {
                    send_close(&mut sink, &client).await;
                    break;
                }
            },
            _ = ping.tick() => Message::Ping(Default::default()),
        };

        if let Err(e) = sink.send(frame).await {
            debug!(session_id = %client.session_id(), "write failed: {e}");
            break;
        }
    }

    client.close();
}

async fn send_close<Si>(sink: &mut Si, client: &Client)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let frame = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: CLOSE_REASON.into(),
    }));
    if let Err(e) = sink.send(frame).await {
        debug!(session_id = %client.session_id(), "close frame not delivered: {e}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
    use navigation_db::MemorySessionStore;
    use navigation_geo::Point;
    use navigation_types::{
        Incident, IncidentAction, IncidentPayload, Location, Route, SessionId,
    };
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;

    type Inbound = UnboundedSender<Result<Message, String>>;
    type Outbound = UnboundedReceiver<Message>;

    struct Harness {
        hub: Arc<Hub>,
        store: SessionStore,
        client: Arc<Client>,
        inbound: Inbound,
        outbound: Outbound,
        task: tokio::task::JoinHandle<()>,
    }

    async fn connect(id: &str) -> Harness {
        let hub = Arc::new(Hub::new(CancellationToken::new()));
        let store = SessionStore::from(MemorySessionStore::new(Duration::from_secs(60)));
        let (client, mailbox) = hub.new_client(SessionId::new(id));
        hub.register(Arc::clone(&client)).await.unwrap();

        let (inbound, stream) = unbounded::<Result<Message, String>>();
        let (sink, outbound) = unbounded::<Message>();
        let task = tokio::spawn(run_connection(
            sink,
            stream,
            Arc::clone(&client),
            mailbox,
            Arc::clone(&hub),
            store.clone(),
            PING_PERIOD,
        ));

        Harness { hub, store, client, inbound, outbound, task }
    }

    fn session(id: &str) -> Session {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        Session {
            id: SessionId::new(id),
            last_position: Position { lat: 48.85, lon: 2.30, timestamp: at },
            route: Route {
                polyline: vec![Point::new(48.85, 2.30), Point::new(48.86, 2.31)],
                locations: vec![
                    Location { lat: 48.85, lon: 2.30 },
                    Location { lat: 48.86, lon: 2.31 },
                ],
            },
            updated_at: at,
        }
    }

    fn text(value: &Value) -> Result<Message, String> {
        Ok(Message::Text(value.to_string().into()))
    }

    fn incident_message(id: i64) -> ServerMessage {
        ServerMessage::Incident(IncidentPayload {
            incident: Incident {
                id,
                user_id: 1,
                kind: None,
                lat: 0.0,
                lon: 0.0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                deleted_at: None,
            },
            action: IncidentAction::Create,
        })
    }

    fn envelope(kind: &str, data: Value) -> ClientEnvelope {
        ClientEnvelope { kind: kind.to_owned(), data }
    }

    #[tokio::test]
    async fn init_stores_the_session() {
        let h = connect("s1").await;
        let s = session("s1");

        h.inbound
            .unbounded_send(text(&json!({"type": "init", "data": s})))
            .unwrap();
        drop(h.inbound);
        h.task.await.unwrap();

        assert_eq!(h.store.get(&SessionId::new("s1")).await.unwrap(), Some(s));
        assert!(h.hub.is_empty().await);
        assert!(h.client.is_closed());
    }

    #[tokio::test]
    async fn init_for_another_session_is_ignored() {
        let store = SessionStore::from(MemorySessionStore::new(Duration::from_secs(60)));
        let (client, _mailbox) =
            Client::new(SessionId::new("mine"), 4, CancellationToken::new());

        let other = serde_json::to_value(session("theirs")).unwrap();
        dispatch(&client, &store, envelope("init", other)).await;

        assert!(store.get(&SessionId::new("theirs")).await.unwrap().is_none());
        assert!(store.get(&SessionId::new("mine")).await.unwrap().is_none());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn position_updates_the_stored_session() {
        let store = SessionStore::from(MemorySessionStore::new(Duration::from_secs(60)));
        let (client, _mailbox) = Client::new(SessionId::new("s1"), 4, CancellationToken::new());
        let original = session("s1");
        store.set(&original).await.unwrap();

        let fix = json!({"lat": 48.851, "lon": 2.301, "timestamp": "2025-01-01T08:05:00Z"});
        dispatch(&client, &store, envelope("position", fix)).await;

        let stored = store.get(&SessionId::new("s1")).await.unwrap().unwrap();
        assert!((stored.last_position.lat - 48.851).abs() < 1e-9);
        assert!((stored.last_position.lon - 2.301).abs() < 1e-9);
        assert!(stored.updated_at > original.updated_at);
        assert_eq!(stored.route, original.route);
    }

    #[tokio::test]
    async fn position_without_session_is_skipped() {
        let store = SessionStore::from(MemorySessionStore::new(Duration::from_secs(60)));
        let (client, _mailbox) = Client::new(SessionId::new("s1"), 4, CancellationToken::new());

        let fix = json!({"lat": 1.0, "lon": 2.0, "timestamp": "2025-01-01T08:05:00Z"});
        dispatch(&client, &store, envelope("position", fix)).await;

        assert!(store.get(&SessionId::new("s1")).await.unwrap().is_none());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn unknown_and_route_messages_keep_the_connection() {
        let store = SessionStore::from(MemorySessionStore::new(Duration::from_secs(60)));
        let (client, _mailbox) = Client::new(SessionId::new("s1"), 4, CancellationToken::new());

        dispatch(&client, &store, envelope("route", json!({}))).await;
        dispatch(&client, &store, envelope("teleport", Value::Null)).await;
        dispatch(&client, &store, envelope("position", json!("garbage"))).await;

        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn undecodable_frame_ends_the_connection() {
        let mut h = connect("s1").await;

        h.inbound.unbounded_send(Ok(Message::Text("{not json".into()))).unwrap();
        h.task.await.unwrap();

        assert!(h.hub.is_empty().await);
        assert!(h.client.is_closed());
        // The outbound loop said goodbye.
        let mut saw_close = false;
        while let Some(frame) = h.outbound.next().await {
            if let Message::Close(Some(close)) = frame {
                assert_eq!(close.code, close_code::NORMAL);
                saw_close = true;
            }
        }
        assert!(saw_close);
    }

    #[tokio::test]
    async fn mailbox_messages_are_written_in_order() {
        let mut h = connect("s1").await;

        for id in 1..=3 {
            h.client.send(incident_message(id));
        }
        for id in 1..=3 {
            let frame = h.outbound.next().await.unwrap();
            let Message::Text(body) = frame else {
                panic!("expected a text frame, got {frame:?}");
            };
            let decoded: ServerMessage = serde_json::from_str(body.as_str()).unwrap();
            assert_eq!(decoded, incident_message(id));
        }

        h.inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        h.task.await.unwrap();
        assert!(h.hub.is_empty().await);
    }

    #[tokio::test]
    async fn hub_shutdown_closes_the_connection() {
        let h = connect("s1").await;

        h.hub.shutdown().await;
        h.task.await.unwrap();

        assert!(h.client.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_is_pinged() {
        let mut h = connect("s1").await;

        tokio::time::advance(PING_PERIOD + Duration::from_secs(1)).await;
        let frame = h.outbound.next().await.unwrap();
        assert!(matches!(frame, Message::Ping(_)));

        drop(h.inbound);
        h.task.await.unwrap();
    }
}
