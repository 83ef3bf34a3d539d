//! Integration tests for the WebSocket transport: a real server and a
//! real tokio-tungstenite client exchanging frames over loopback.

#[cfg(feature = "websocket")]
mod websocket {
    use knockout_transport::{Connection, Transport, WebSocketTransport};

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: std::net::SocketAddr) -> ClientWs {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    /// Binds on an ephemeral port and pairs one accepted server
    /// connection with one connected client.
    async fn server_client_pair()
    -> (knockout_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have an addr");

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client_ws = connect_client(addr).await;
        let server_conn =
            server_handle.await.expect("task should complete");
        (server_conn, client_ws)
    }

    #[tokio::test]
    async fn test_text_frames_flow_both_ways() {
        let (server_conn, mut client_ws) = server_client_pair().await;
        assert!(server_conn.id().0 > 0);

        server_conn
            .send(r#"{"type":"matchmakingUpdate","playersInQueue":1}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(
            msg.into_text().unwrap().as_str(),
            r#"{"type":"matchmakingUpdate","playersInQueue":1}"#
        );

        client_ws
            .send(Message::Text(r#"{"type":"joinQueue"}"#.into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, r#"{"type":"joinQueue"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_binary_utf8_frames_are_tolerated() {
        let (server_conn, mut client_ws) = server_client_pair().await;

        client_ws
            .send(Message::Binary(b"{\"type\":\"leaveQueue\"}".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, r#"{"type":"leaveQueue"}"#);
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = server_client_pair().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result =
            server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique_per_transport() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap();

        let server_handle = tokio::spawn(async move {
            let a = transport.accept().await.expect("first accept");
            let b = transport.accept().await.expect("second accept");
            (a, b)
        });
        let _c1 = connect_client(addr).await;
        let _c2 = connect_client(addr).await;
        let (a, b) = server_handle.await.unwrap();
        assert_ne!(a.id(), b.id());
    }
}
