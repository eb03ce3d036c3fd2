//! One live connection: a writer task draining the outbound queue and a
//! reader loop running client requests in arrival order. The reader stops
//! when the router evicts the connection for falling behind.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use gigboard_auth::Identity;
use gigboard_messaging::{ClientRequest, ConnectionHandle, MessagingService, ServerEvent};
use tracing::{debug, warn};

use crate::state::GatewayState;

pub async fn serve(socket: WebSocket, state: Arc<GatewayState>, identity: Identity) {
    let service = state.messaging.clone();
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = service.outbound_channel();

    // Ends once every sender is gone: the handle below and the router's copies.
    tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(error) => {
                    warn!(error = %error, "failed to encode outbound event");
                    continue;
                }
            };
            if let Err(error) = sink.send(WsMessage::Text(frame)).await {
                debug!(error = %error, "websocket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let connection = service.connect(identity, outbound).await;

    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            _ = connection.evicted() => {
                warn!(connection_id = %connection.id, "connection evicted for falling behind");
                break;
            }
        };
        let Some(frame) = frame else { break };
        match frame {
            Ok(WsMessage::Text(text)) => dispatch(&service, &connection, &text).await,
            Ok(WsMessage::Binary(_)) => {
                connection
                    .send(ServerEvent::Error {
                        message: "binary frames are not supported".into(),
                    })
                    .await;
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(connection_id = %connection.id, error = %error, "websocket read failed");
                break;
            }
        }
    }

    service.disconnect(&connection).await;
}

async fn dispatch(service: &MessagingService, connection: &ConnectionHandle, text: &str) {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => service.handle_request(connection, request).await,
        Err(error) => {
            debug!(connection_id = %connection.id, error = %error, "malformed client frame");
            connection
                .send(ServerEvent::Error {
                    message: format!("malformed request: {error}"),
                })
                .await;
        }
    }
}
