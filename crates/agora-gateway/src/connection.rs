use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use agora_chat::auth::AuthOracle;
use agora_chat::{ChatError, ChatService};
use agora_types::api::{Identity, MessageKind, SendMessageRequest};
use agora_types::events::{ChatCommand, ChatEvent, DirectCommand, Frame, RoomAddress};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh connection may stay unauthenticated before the
/// handshake is aborted.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type WsSender = futures_util::stream::SplitSink<WebSocket, Message>;
type WsReceiver = futures_util::stream::SplitStream<WebSocket>;
type Subscriptions = Arc<std::sync::RwLock<HashSet<RoomAddress>>>;

#[derive(Clone, Copy)]
enum SessionMode {
    /// The group gateway: credential arrives in the first frame, rooms are
    /// subscribed explicitly and every action is addressed.
    Chat,
    /// A per-room direct socket: authenticated and authorized at upgrade
    /// time, pinned to one room.
    Direct { room_id: i64 },
}

/// Handle a group-gateway connection. The session starts unauthenticated;
/// the first frame must be an `Identify` carrying a valid token, otherwise
/// the handshake is aborted and no session is established.
pub async fn handle_chat_connection(
    socket: WebSocket,
    chat: ChatService,
    auth: AuthOracle,
    dispatcher: Dispatcher,
) {
    let (mut sender, mut receiver) = socket.split();

    let identity = match wait_for_identify(&mut receiver, &auth).await {
        Some(identity) => identity,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!(
        "{} ({}) connected to gateway",
        identity.username, identity.user_id
    );

    if send_event(
        &mut sender,
        &ChatEvent::Ready {
            user_id: identity.user_id,
            username: identity.username.clone(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let subscriptions: Subscriptions = Arc::new(std::sync::RwLock::new(HashSet::new()));
    run_session_loop(
        sender,
        receiver,
        chat,
        dispatcher,
        identity,
        subscriptions,
        SessionMode::Chat,
    )
    .await;
}

/// Handle a pre-authorized direct-room connection. The token was validated
/// and the participant proof checked at the HTTP upgrade layer, so the
/// session goes straight to Ready and is pinned to its room's topics.
pub async fn handle_direct_connection(
    socket: WebSocket,
    chat: ChatService,
    dispatcher: Dispatcher,
    room_id: i64,
    identity: Identity,
) {
    let (mut sender, receiver) = socket.split();

    info!(
        "{} ({}) connected to direct room {} (pre-authorized)",
        identity.username, identity.user_id, room_id
    );

    if send_event(
        &mut sender,
        &ChatEvent::Ready {
            user_id: identity.user_id,
            username: identity.username.clone(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let subscriptions: Subscriptions = Arc::new(std::sync::RwLock::new(
        [RoomAddress::direct(room_id)].into_iter().collect(),
    ));
    run_session_loop(
        sender,
        receiver,
        chat,
        dispatcher,
        identity,
        subscriptions,
        SessionMode::Direct { room_id },
    )
    .await;
}

/// Shared event loop for both transport paths: relay room publications the
/// connection is subscribed to, deliver private events, heartbeat, and
/// execute inbound commands.
async fn run_session_loop(
    mut sender: WsSender,
    mut receiver: WsReceiver,
    chat: ChatService,
    dispatcher: Dispatcher,
    identity: Identity,
    subscriptions: Subscriptions,
    mode: SessionMode,
) {
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(identity.user_id).await;
    let mut broadcast_rx = dispatcher.subscribe();
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let published = match result {
                        Ok(published) => published,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    {
                        let subs = send_subscriptions.read()
                            .expect("subscription lock poisoned");
                        if !subs.contains(&published.room) {
                            continue;
                        }
                    }

                    let frame = Frame::new(published.room, published.event);
                    let text = serde_json::to_string(&frame).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping connection",
                                missed_heartbeats
                            );
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_identity = identity.clone();
    let recv_subscriptions = subscriptions.clone();
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_frame(
                        &chat,
                        &dispatcher_recv,
                        &recv_identity,
                        &recv_subscriptions,
                        mode,
                        &text,
                    )
                    .await;
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher
        .unregister_user_channel(identity.user_id, conn_id)
        .await;
    info!(
        "{} ({}) disconnected from gateway",
        identity.username, identity.user_id
    );
}

async fn wait_for_identify(receiver: &mut WsReceiver, auth: &AuthOracle) -> Option<Identity> {
    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ChatCommand::Identify { token }) =
                    serde_json::from_str::<ChatCommand>(&text)
                {
                    // Any validation failure aborts the handshake; there is
                    // no anonymous session to fall back to.
                    return auth.verify(&token).ok();
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_text_frame(
    chat: &ChatService,
    dispatcher: &Dispatcher,
    identity: &Identity,
    subscriptions: &Subscriptions,
    mode: SessionMode,
    text: &str,
) {
    match mode {
        SessionMode::Chat => match serde_json::from_str::<ChatCommand>(text) {
            Ok(cmd) => {
                handle_chat_command(chat, dispatcher, identity, subscriptions, cmd).await;
            }
            Err(e) => log_bad_command(identity, e, text),
        },
        SessionMode::Direct { room_id } => match serde_json::from_str::<DirectCommand>(text) {
            Ok(cmd) => {
                handle_direct_command(chat, dispatcher, identity, room_id, cmd).await;
            }
            Err(e) => log_bad_command(identity, e, text),
        },
    }
}

async fn handle_chat_command(
    chat: &ChatService,
    dispatcher: &Dispatcher,
    identity: &Identity,
    subscriptions: &Subscriptions,
    cmd: ChatCommand,
) {
    match cmd {
        ChatCommand::Identify { .. } => {} // Already handled

        ChatCommand::Subscribe { rooms } => {
            let mut allowed = HashSet::new();
            for room in rooms {
                let addr = RoomAddress::group(room.group_id, room.room_id);
                match chat.authorize_room_access(addr, identity.user_id) {
                    Ok(()) => {
                        allowed.insert(addr);
                    }
                    Err(e) => warn!(
                        "{} ({}) denied subscription to {}: {}",
                        identity.username,
                        identity.user_id,
                        addr.topic(),
                        e
                    ),
                }
            }

            info!(
                "{} ({}) subscribed to {} rooms",
                identity.username,
                identity.user_id,
                allowed.len()
            );
            *subscriptions.write().expect("subscription lock poisoned") = allowed;
        }

        ChatCommand::Send {
            group_id,
            room_id,
            message,
            reply_to_message_id,
        } => {
            let addr = RoomAddress::group(group_id, room_id);
            let req = text_request(message, reply_to_message_id);
            match chat.append_group(group_id, room_id, identity, &req) {
                Ok(view) => dispatcher.publish(addr, ChatEvent::GroupMessage(view)),
                Err(e) => report_send_failure(dispatcher, identity, addr, e).await,
            }
        }

        ChatCommand::TypingStart { group_id, room_id } => {
            publish_typing(
                chat,
                dispatcher,
                identity,
                RoomAddress::group(group_id, room_id),
                true,
            );
        }
        ChatCommand::TypingStop { group_id, room_id } => {
            publish_typing(
                chat,
                dispatcher,
                identity,
                RoomAddress::group(group_id, room_id),
                false,
            );
        }

        ChatCommand::Read {
            group_id,
            room_id,
            message_id,
        } => {
            let addr = RoomAddress::group(group_id, room_id);
            match chat.mark_read(addr, identity, message_id) {
                Ok(receipt) => dispatcher.publish(addr, ChatEvent::Read(receipt)),
                Err(e) => warn!(
                    "{} ({}) read ack on {} dropped: {}",
                    identity.username,
                    identity.user_id,
                    addr.topic(),
                    e
                ),
            }
        }
    }
}

async fn handle_direct_command(
    chat: &ChatService,
    dispatcher: &Dispatcher,
    identity: &Identity,
    room_id: i64,
    cmd: DirectCommand,
) {
    let addr = RoomAddress::direct(room_id);

    match cmd {
        DirectCommand::Send {
            message,
            reply_to_message_id,
        } => {
            let req = text_request(message, reply_to_message_id);
            match chat.append_direct(room_id, identity, &req) {
                Ok(view) => dispatcher.publish(addr, ChatEvent::DirectMessage(view)),
                Err(e) => report_send_failure(dispatcher, identity, addr, e).await,
            }
        }

        DirectCommand::TypingStart => publish_typing(chat, dispatcher, identity, addr, true),
        DirectCommand::TypingStop => publish_typing(chat, dispatcher, identity, addr, false),

        DirectCommand::Read { message_id } => match chat.mark_read(addr, identity, message_id) {
            Ok(receipt) => dispatcher.publish(addr, ChatEvent::Read(receipt)),
            Err(e) => warn!(
                "{} ({}) read ack on {} dropped: {}",
                identity.username,
                identity.user_id,
                addr.topic(),
                e
            ),
        },
    }
}

/// Typing is reauthorized per action like everything else, then published
/// to the room's typing sub-topic. Failures are logged and swallowed.
fn publish_typing(
    chat: &ChatService,
    dispatcher: &Dispatcher,
    identity: &Identity,
    addr: RoomAddress,
    is_typing: bool,
) {
    if let Err(e) = chat.authorize_room_access(addr, identity.user_id) {
        warn!(
            "{} ({}) typing on {} dropped: {}",
            identity.username,
            identity.user_id,
            addr.topic(),
            e
        );
        return;
    }

    dispatcher.publish(
        addr,
        ChatEvent::Typing {
            user_id: identity.user_id,
            username: identity.username.clone(),
            is_typing,
        },
    );
}

/// Send failures are the one class of action errors that get surfaced to
/// the client, on the sender's private channel; everything stays committed
/// or not as the store decided.
async fn report_send_failure(
    dispatcher: &Dispatcher,
    identity: &Identity,
    addr: RoomAddress,
    err: ChatError,
) {
    warn!(
        "{} ({}) send to {} failed: {}",
        identity.username,
        identity.user_id,
        addr.topic(),
        err
    );

    let message = match &err {
        ChatError::Internal(_) => "internal error".to_string(),
        other => other.to_string(),
    };
    dispatcher
        .send_to_user(
            identity.user_id,
            ChatEvent::Error {
                code: err.code().to_string(),
                message,
            },
        )
        .await;
}

fn text_request(message: String, reply_to_message_id: Option<i64>) -> SendMessageRequest {
    SendMessageRequest {
        kind: MessageKind::Text,
        message: Some(message),
        file_url: None,
        file_name: None,
        file_size: None,
        reply_to_message_id,
    }
}

async fn send_event(
    sender: &mut WsSender,
    event: &ChatEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).unwrap();
    sender.send(Message::Text(text.into())).await
}

fn log_bad_command(identity: &Identity, err: serde_json::Error, raw: &str) {
    warn!(
        "{} ({}) bad command: {} -- raw: {}",
        identity.username,
        identity.user_id,
        err,
        &raw[..raw.len().min(200)]
    );
}
