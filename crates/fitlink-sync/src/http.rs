//! HTTP + WebSocket implementation of [`MessageGateway`] against the
//! fitlink server.

use futures_util::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use uuid::Uuid;

use fitlink_types::api::{EditMessageRequest, MarkReadRequest, SendMessageRequest};
use fitlink_types::events::{ChatEvent, ClientCommand};
use fitlink_types::models::Message;

use crate::gateway::{GatewayError, MessageGateway};

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Network(e.to_string())
}

fn check(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(GatewayError::Rejected(resp.status().to_string()))
    }
}

impl MessageGateway for HttpGateway {
    async fn fetch_conversation(&self, peer_id: Uuid) -> Result<Vec<Message>, GatewayError> {
        let resp = self
            .http
            .get(self.url(&format!("/conversations/{peer_id}/messages")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        check(resp)?.json().await.map_err(transport)
    }

    async fn send_message(&self, receiver_id: Uuid, body: &str) -> Result<Message, GatewayError> {
        let resp = self
            .http
            .post(self.url(&format!("/conversations/{receiver_id}/messages")))
            .bearer_auth(&self.token)
            .json(&SendMessageRequest {
                body: body.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        check(resp)?.json().await.map_err(transport)
    }

    async fn edit_message(&self, message_id: Uuid, body: &str) -> Result<Message, GatewayError> {
        let resp = self
            .http
            .patch(self.url(&format!("/messages/{message_id}")))
            .bearer_auth(&self.token)
            .json(&EditMessageRequest {
                body: body.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        check(resp)?.json().await.map_err(transport)
    }

    async fn mark_read(&self, message_ids: &[Uuid]) -> Result<(), GatewayError> {
        let resp = self
            .http
            .post(self.url("/messages/read"))
            .bearer_auth(&self.token)
            .json(&MarkReadRequest {
                message_ids: message_ids.to_vec(),
            })
            .send()
            .await
            .map_err(transport)?;
        check(resp).map(|_| ())
    }
}

/// Connects to the server's `/gateway` WebSocket, identifies with the JWT,
/// and yields the push feed of chat events. The stream ends when the server
/// closes the connection or the transport fails.
pub async fn subscribe(
    ws_url: &str,
    token: &str,
) -> Result<impl Stream<Item = ChatEvent>, GatewayError> {
    let (mut ws, _) = connect_async(ws_url)
        .await
        .map_err(|e| GatewayError::Network(e.to_string()))?;

    let identify = serde_json::to_string(&ClientCommand::Identify {
        token: token.to_string(),
    })
    .map_err(|e| GatewayError::Network(e.to_string()))?;
    ws.send(WsMessage::Text(identify.into()))
        .await
        .map_err(|e| GatewayError::Network(e.to_string()))?;

    Ok(async_stream::stream! {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ChatEvent>(&text) {
                    Ok(event) => yield event,
                    Err(e) => warn!("Unparseable gateway event: {}", e),
                },
                Ok(WsMessage::Close(_)) => {
                    debug!("Gateway closed the event feed");
                    break;
                }
                // Pings are answered by tungstenite on the next flush
                Ok(_) => {}
                Err(e) => {
                    warn!("Gateway feed error: {}", e);
                    break;
                }
            }
        }
    })
}
