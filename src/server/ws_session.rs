use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use futures_util::stream;
use std::sync::Arc;

use crate::broadcast_hub::{BroadcastHub, Subscription};
use crate::ingest::LocationUpdate;
use crate::server::protocol::{self, ServerMessage};

/// One realtime client. Connects to the hub when the socket opens and
/// disconnects when the actor stops, whatever the reason.
pub struct TrackingSession {
    hub: Arc<BroadcastHub<LocationUpdate>>,
    subscription: Option<Arc<Subscription<LocationUpdate>>>,
}

impl TrackingSession {
    pub fn new(hub: Arc<BroadcastHub<LocationUpdate>>) -> Self {
        Self {
            hub,
            subscription: None,
        }
    }

    fn send(&self, message: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match message.to_json() {
            Ok(text) => ctx.text(text),
            Err(e) => error!("[ws] failed to encode message: {}", e),
        }
    }
}

impl Actor for TrackingSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let subscription = self.hub.connect();
        info!("[ws] session {} opened", subscription.session_id());
        self.subscription = Some(subscription.clone());
        // ends once the hub closes the subscription
        ctx.add_stream(stream::unfold(subscription, |subscription| async move {
            let event = subscription.recv().await;
            event.map(|event| (event, subscription))
        }));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(subscription) = self.subscription.take() {
            self.hub.disconnect(subscription.session_id());
        }
    }
}

impl StreamHandler<Arc<LocationUpdate>> for TrackingSession {
    fn handle(&mut self, update: Arc<LocationUpdate>, ctx: &mut Self::Context) {
        self.send(&ServerMessage::LocationUpdate(&update), ctx);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for TrackingSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let Some(session_id) = self.subscription.as_ref().map(|s| s.session_id()) else {
            ctx.stop();
            return;
        };
        match msg {
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Text(text)) => {
                let reply = protocol::handle_text(&self.hub, session_id, &text);
                self.send(&reply, ctx);
            }
            Ok(ws::Message::Binary(_)) => {
                let reply = ServerMessage::Error {
                    message: "binary messages are not supported".to_string(),
                };
                self.send(&reply, ctx);
            }
            Ok(ws::Message::Close(reason)) => {
                debug!("[ws] session {} closed by client", session_id);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Pong(_) | ws::Message::Continuation(_) | ws::Message::Nop) => (),
            Err(e) => {
                warn!("[ws] session {} protocol error: {}", session_id, e);
                ctx.stop();
            }
        }
    }
}
