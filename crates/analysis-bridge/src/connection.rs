//! One browser connection driving one engine session.

use crate::config::Config;
use crate::protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uci_session::{EngineLauncher, Position, Session, SessionError, Subscription};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

type Outbox = mpsc::UnboundedSender<ServerMessage>;

pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<Config>,
    launcher: Arc<dyn EngineLauncher>,
) -> Result<(), BridgeError> {
    tracing::info!("New connection from {}", peer);

    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Everything for the browser goes through one queue
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to encode message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let (session, mut events) = match open_session(&config, launcher).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!("Engine session for {} failed: {}", peer, e);
            outbox.send(ServerMessage::error(e)).ok();
            drop(outbox);
            let _ = forward_task.await;
            return Ok(());
        }
    };
    outbox
        .send(ServerMessage::Ready {
            engine: session.engine_name(),
        })
        .ok();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error from {}: {}", peer, e);
                        break;
                    }
                };

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(request) => handle_request(request, &session, &config, &outbox).await,
                    Err(e) => {
                        outbox.send(ServerMessage::error(format!("Invalid message: {}", e))).ok();
                    }
                }
            }
            event = events.recv() => match event {
                Some(event) => {
                    outbox.send(ServerMessage::from(event)).ok();
                }
                None => {
                    outbox.send(ServerMessage::error("Engine session ended")).ok();
                    break;
                }
            }
        }
    }

    if let Err(e) = session.terminate().await {
        tracing::debug!("Session for {} already closed: {}", peer, e);
    }
    drop(outbox);
    let _ = forward_task.await;

    tracing::info!("Connection closed from {}", peer);
    Ok(())
}

/// Launch an engine and bring it to Ready with the configured options.
async fn open_session(
    config: &Config,
    launcher: Arc<dyn EngineLauncher>,
) -> Result<(Arc<Session>, Subscription), SessionError> {
    let session = Session::new(launcher, config.session.clone());
    session.start().await?;
    session.configure(config.engine.options).await?;
    let events = session.subscribe()?;
    Ok((Arc::new(session), events))
}

async fn handle_request(request: ClientMessage, session: &Arc<Session>, config: &Config, outbox: &Outbox) {
    tracing::debug!("Request: {:?}", request);

    let result = match request {
        ClientMessage::Configure { config: options } => match session.configure(options).await {
            Ok(()) => {
                outbox.send(status(session)).ok();
                Ok(())
            }
            Err(e) => Err(e),
        },
        ClientMessage::Position { fen } => match Position::new(fen) {
            Ok(position) => session.set_position(position).await,
            Err(e) => Err(e),
        },
        ClientMessage::Search { depth } => session.search(depth.unwrap_or(config.engine.depth)),
        ClientMessage::Analyze { fen, depth } => match Position::new(fen) {
            Ok(position) => {
                // Runs in the background so the client can still stop it
                let session = Arc::clone(session);
                let outbox = outbox.clone();
                let depth = depth.unwrap_or(config.engine.depth);
                let limit = Duration::from_millis(config.engine.analyze_limit_ms);
                tokio::spawn(async move {
                    if let Err(e) = session.analyze(position, depth, limit).await {
                        outbox.send(ServerMessage::error(e)).ok();
                    }
                });
                Ok(())
            }
            Err(e) => Err(e),
        },
        // The best move itself arrives through the subscription
        ClientMessage::Stop => session.stop().await.map(|_| ()),
        ClientMessage::Status => {
            outbox.send(status(session)).ok();
            Ok(())
        }
    };

    if let Err(e) = result {
        outbox.send(ServerMessage::error(e)).ok();
    }
}

fn status(session: &Session) -> ServerMessage {
    ServerMessage::Status {
        state: session.state(),
        position: session.position().map(|p| p.fen().to_string()),
        lines: session.analysis(),
    }
}
