//! End-to-end tests: a real server, real WebSocket clients, and the
//! full queue → join → update → broadcast flow over loopback.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use knockout::prelude::*;
use knockout_protocol::{MatchId, MatchSnapshot};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = KnockoutServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_event(ws: &mut ClientWs, event: &ClientEvent) {
    let text = serde_json::to_string(event).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Receives the next server event, skipping non-text frames.
async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("decode");
        }
    }
}

/// Receives events until one satisfies the predicate.
async fn recv_until<F>(ws: &mut ClientWs, mut pred: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    for _ in 0..20 {
        let event = recv_event(ws).await;
        if pred(&event) {
            return event;
        }
    }
    panic!("no matching server event arrived");
}

/// Queues up and returns the id of the offered match.
async fn queue_for_match(ws: &mut ClientWs) -> MatchId {
    send_event(ws, &ClientEvent::JoinQueue).await;
    let event = recv_until(ws, |ev| {
        matches!(ev, ServerEvent::MatchReady { .. })
    })
    .await;
    let ServerEvent::MatchReady { snapshot } = event else {
        unreachable!()
    };
    snapshot.id
}

async fn join_match(
    ws: &mut ClientWs,
    match_id: MatchId,
    name: &str,
) -> MatchSnapshot {
    send_event(
        ws,
        &ClientEvent::JoinMatch {
            match_id,
            display_name: Some(name.into()),
        },
    )
    .await;
    let event = recv_until(ws, |ev| {
        matches!(ev, ServerEvent::JoinResult { .. })
    })
    .await;
    let ServerEvent::JoinResult {
        success, snapshot, ..
    } = event
    else {
        unreachable!()
    };
    assert!(success, "join should succeed");
    snapshot.expect("successful join carries a snapshot")
}

// =========================================================================
// Queue flow
// =========================================================================

#[tokio::test]
async fn test_queueing_promotes_to_a_match() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, &ClientEvent::JoinQueue).await;

    let event = recv_event(&mut ws).await;
    let ServerEvent::MatchReady { snapshot } = event else {
        panic!("expected matchReady, got {event:?}");
    };
    assert_eq!(snapshot.id, MatchId(1000));
    assert!(snapshot.players.is_empty());

    let event = recv_event(&mut ws).await;
    assert!(matches!(
        event,
        ServerEvent::MatchmakingUpdate { players_in_queue: 1 }
    ));
}

#[tokio::test]
async fn test_leaving_the_queue_updates_the_count() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let _ = queue_for_match(&mut ws1).await;
    send_event(&mut ws2, &ClientEvent::JoinQueue).await;
    recv_until(&mut ws2, |ev| {
        matches!(ev, ServerEvent::MatchmakingUpdate { players_in_queue: 2 })
    })
    .await;

    send_event(&mut ws2, &ClientEvent::LeaveQueue).await;
    recv_until(&mut ws1, |ev| {
        matches!(ev, ServerEvent::MatchmakingUpdate { players_in_queue: 1 })
    })
    .await;
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_join_returns_the_committed_snapshot() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let match_id = queue_for_match(&mut ws).await;
    let snapshot = join_match(&mut ws, match_id, "ada").await;

    assert_eq!(snapshot.id, match_id);
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.players[0].display_name, "ada");
    assert_eq!(snapshot.players[0].placement, Some(1));
}

#[tokio::test]
async fn test_successful_join_is_followed_by_match_info() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let match_id = queue_for_match(&mut ws).await;
    join_match(&mut ws, match_id, "ada").await;

    // the ack is followed by the full match detail
    let event = recv_event(&mut ws).await;
    let ServerEvent::MatchInfo { snapshot } = event else {
        panic!("expected matchInfo after the join ack, got {event:?}");
    };
    assert_eq!(snapshot.id, match_id);
    assert_eq!(snapshot.players[0].display_name, "ada");
}

#[tokio::test]
async fn test_join_of_unknown_match_fails_cleanly() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::JoinMatch {
            match_id: MatchId(999),
            display_name: None,
        },
    )
    .await;

    let event = recv_event(&mut ws).await;
    let ServerEvent::JoinResult {
        success,
        message,
        snapshot,
    } = event
    else {
        panic!("expected joinResult, got {event:?}");
    };
    assert!(!success);
    assert_eq!(message.as_deref(), Some("Match does not exist."));
    assert!(snapshot.is_none());
}

// =========================================================================
// Updates and broadcasts
// =========================================================================

#[tokio::test]
async fn test_score_report_reaches_every_member() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let match_id = queue_for_match(&mut ws1).await;
    join_match(&mut ws1, match_id, "ada").await;
    join_match(&mut ws2, match_id, "mel").await;

    send_event(
        &mut ws1,
        &ClientEvent::MatchUpdate {
            match_id,
            points: 5.0,
            field: Some(serde_json::json!({ "combo": 2 })),
        },
    )
    .await;

    // the coalesced broadcast lands on both sockets
    for ws in [&mut ws1, &mut ws2] {
        let event = recv_until(ws, |ev| match ev {
            ServerEvent::MatchUpdate { snapshot } => snapshot
                .players
                .iter()
                .any(|p| p.display_name == "ada" && p.points == 5.0),
            _ => false,
        })
        .await;
        let ServerEvent::MatchUpdate { snapshot } = event else {
            unreachable!()
        };
        let ada = snapshot
            .players
            .iter()
            .find(|p| p.display_name == "ada")
            .expect("ada present");
        assert_eq!(ada.field, Some(serde_json::json!({ "combo": 2 })));
        assert_eq!(ada.placement, Some(1));
    }
}

#[tokio::test]
async fn test_update_to_unknown_match_gets_wire_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::MatchUpdate {
            match_id: MatchId(999),
            points: 1.0,
            field: None,
        },
    )
    .await;

    let event = recv_event(&mut ws).await;
    let ServerEvent::Error { code, message } = event else {
        panic!("expected error, got {event:?}");
    };
    assert_eq!(code, 404);
    assert_eq!(message, "Match does not exist.");
}

#[tokio::test]
async fn test_malformed_frame_is_skipped_not_fatal() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("not json".into())).await.expect("send");
    let event = recv_event(&mut ws).await;
    assert!(matches!(event, ServerEvent::Error { code: 400, .. }));

    // the connection still works afterwards
    send_event(&mut ws, &ClientEvent::JoinQueue).await;
    recv_until(&mut ws, |ev| {
        matches!(ev, ServerEvent::MatchReady { .. })
    })
    .await;
}

// =========================================================================
// Disconnects
// =========================================================================

#[tokio::test]
async fn test_pre_start_disconnect_removes_player_from_broadcasts() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let match_id = queue_for_match(&mut ws1).await;
    join_match(&mut ws1, match_id, "ada").await;
    join_match(&mut ws2, match_id, "mel").await;

    drop(ws1); // hard disconnect before game start

    recv_until(&mut ws2, |ev| match ev {
        ServerEvent::MatchUpdate { snapshot } => {
            snapshot.players.len() == 1
                && snapshot.players[0].display_name == "mel"
        }
        _ => false,
    })
    .await;
}
