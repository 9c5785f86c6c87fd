use std::time::Instant;

use axum::Extension;
use axum::extract::ws::Message::{Binary, Close, Text};
use axum::extract::ws::{self, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use serde_json::from_str;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::Subject;
use super::context;
use super::model::{Command, Notification, NotificationStream};
use super::service::EventService;
use super::typing::{self, TypingTracker};
use crate::consultation::service::ConsultationService;
use crate::{auth, consultation, conversation, event, user};

const ROOM_BUFFER: usize = 256;

pub async fn ws(
    Extension(caller): Extension<auth::User>,
    ws: WebSocketUpgrade,
    State(event_service): State<event::Service>,
    State(consultation_service): State<consultation::Service>,
    State(typing): State<typing::Config>,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_socket(caller, socket, event_service, consultation_service, typing)
    })
}

async fn handle_socket(
    caller: auth::User,
    ws: WebSocket,
    event_service: event::Service,
    consultation_service: consultation::Service,
    typing: typing::Config,
) {
    let personal = match event_service
        .subscribe(&Subject::Notifications(caller.id()))
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to subscribe to notifications of {}: {e}", caller.id());
            return;
        }
    };

    let ctx = context::Ws::new(caller);
    let (rooms_tx, rooms_rx) = mpsc::channel(ROOM_BUFFER);
    let (sender, receiver) = ws.split();

    let read_task = tokio::spawn(read(
        ctx.clone(),
        receiver,
        rooms_tx,
        event_service.clone(),
        consultation_service,
    ));
    let write_task = tokio::spawn(write(ctx.clone(), sender, personal, rooms_rx, typing));

    match tokio::try_join!(read_task, write_task) {
        Ok(_) => debug!("WS of {} disconnected gracefully", caller.id()),
        Err(e) => error!("WS of {} disconnected with error: {e}", caller.id()),
    }

    release(&ctx, &event_service).await;
}

/// Stops the room forwarders and clears every indicator the session left on.
async fn release(ctx: &context::Ws, event_service: &event::Service) {
    for conversation_id in ctx.release().await {
        publish_typing_stop(event_service, &conversation_id, ctx.caller.id()).await;
    }
}

async fn read(
    ctx: context::Ws,
    mut receiver: SplitStream<WebSocket>,
    rooms_tx: mpsc::Sender<Notification>,
    event_service: event::Service,
    consultation_service: consultation::Service,
) {
    loop {
        tokio::select! {
            // close is notified => stop 'read' task
            _ = ctx.close.notified() => break,

            frame = receiver.next() => {
                let Some(message) = frame else {
                    ctx.close.notify_one();
                    break;
                };

                match message {
                    Err(e) => {
                        error!("Failed to read WS frame: {e}");
                        ctx.close.notify_one();
                        break;
                    }
                    Ok(Close(frame)) => {
                        debug!("WS connection closed by client: {frame:?}");
                        ctx.close.notify_one();
                        break;
                    }
                    Ok(Text(content)) => {
                        let res = handle_text_frame(
                            &ctx,
                            content.as_str(),
                            &rooms_tx,
                            &event_service,
                            &consultation_service,
                        )
                        .await;

                        match res {
                            Ok(()) => {}
                            Err(e @ (event::Error::NotJoined(_) | event::Error::_Consultation(_))) => {
                                warn!("Rejected command of {}: {e}", ctx.caller.id());
                            }
                            Err(e) => {
                                error!("Failed to handle text frame: {e}");
                                ctx.close.notify_one();
                                break;
                            }
                        }
                    }
                    Ok(Binary(content)) => warn!("Received binary WS frame: {content:?}"),
                    Ok(_) => {}
                }
            }
        }
    }
}

async fn handle_text_frame(
    ctx: &context::Ws,
    content: &str,
    rooms_tx: &mpsc::Sender<Notification>,
    event_service: &event::Service,
    consultation_service: &consultation::Service,
) -> super::Result<()> {
    let Ok(command) = from_str::<Command>(content) else {
        warn!("Skipping text frame, content is malformed: {content}");
        return Ok(());
    };

    let caller = ctx.caller;
    match command {
        Command::Join { conversation_id } => {
            if ctx.is_joined(&conversation_id).await {
                return Ok(());
            }

            consultation_service
                .find_membership(caller.id(), &conversation_id)
                .await?;

            let mut stream = event_service
                .subscribe(&Subject::Conversation(&conversation_id))
                .await?;
            let tx = rooms_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(noti) = stream.next().await {
                    if tx.send(noti).await.is_err() {
                        break;
                    }
                }
            });

            ctx.join(conversation_id, forwarder.abort_handle()).await;
            debug!("{} joined {conversation_id}", caller.id());
        }
        Command::Leave { conversation_id } => {
            if ctx.leave(&conversation_id).await && ctx.stop_typing(&conversation_id).await {
                publish_typing_stop(event_service, &conversation_id, caller.id()).await;
            }
        }
        Command::TypingStart { conversation_id } => {
            if !ctx.is_joined(&conversation_id).await {
                return Err(super::Error::NotJoined(conversation_id));
            }

            ctx.start_typing(conversation_id).await;
            event_service
                .publish(
                    &Subject::Conversation(&conversation_id),
                    &Notification::TypingStarted {
                        conversation_id,
                        user_id: *caller.id(),
                    },
                )
                .await?;
        }
        Command::TypingStop { conversation_id } => {
            if !ctx.is_joined(&conversation_id).await {
                return Err(super::Error::NotJoined(conversation_id));
            }

            ctx.stop_typing(&conversation_id).await;
            event_service
                .publish(
                    &Subject::Conversation(&conversation_id),
                    &Notification::TypingStopped {
                        conversation_id,
                        user_id: *caller.id(),
                    },
                )
                .await?;
        }
    }

    Ok(())
}

async fn write(
    ctx: context::Ws,
    mut sender: SplitSink<WebSocket, ws::Message>,
    mut personal: NotificationStream,
    mut rooms_rx: mpsc::Receiver<Notification>,
    typing: typing::Config,
) {
    let mut tracker = TypingTracker::new(typing.ttl());
    let mut sweep = tokio::time::interval(typing.sweep());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let outgoing: Vec<Notification> = tokio::select! {
            // close is notified => stop 'write' task
            _ = ctx.close.notified() => break,

            item = personal.next() => match item {
                Some(noti) => relay(&ctx, &mut tracker, noti).await.into_iter().collect(),
                None => break,
            },
            item = rooms_rx.recv() => match item {
                Some(noti) => relay(&ctx, &mut tracker, noti).await.into_iter().collect(),
                None => break,
            },
            now = sweep.tick() => tracker
                .expire(now.into_std())
                .into_iter()
                .map(|(conversation_id, user_id)| Notification::TypingStopped {
                    conversation_id,
                    user_id,
                })
                .collect(),
        };

        for noti in outgoing {
            if let Err(e) = send(&mut sender, &noti).await {
                error!("Failed to send notification to {}: {e}", ctx.caller.id());
                ctx.close.notify_one();
                return;
            }
        }
    }
}

/// Decides what reaches the client. Own typing echoes are dropped, a stop is
/// relayed only for an indicator still shown, and leaving a group stops its
/// room forwarder.
async fn relay(
    ctx: &context::Ws,
    tracker: &mut TypingTracker,
    noti: Notification,
) -> Option<Notification> {
    let me = ctx.caller.id();

    match &noti {
        Notification::TypingStarted {
            conversation_id,
            user_id,
        } => {
            if user_id == me {
                return None;
            }
            tracker.observe_start(conversation_id, user_id, Instant::now());
        }
        Notification::TypingStopped {
            conversation_id,
            user_id,
        } => {
            if user_id == me || !tracker.observe_stop(conversation_id, user_id) {
                return None;
            }
        }
        Notification::MemberLeft {
            conversation_id,
            user_id,
            ..
        } if user_id == me => {
            tracker.forget(conversation_id);
            ctx.leave(conversation_id).await;
            ctx.stop_typing(conversation_id).await;
        }
        _ => {}
    }

    Some(noti)
}

async fn send(
    sender: &mut SplitSink<WebSocket, ws::Message>,
    noti: &Notification,
) -> super::Result<()> {
    let json = serde_json::to_string(noti)?;
    sender.send(Text(json.into())).await?;
    Ok(())
}

async fn publish_typing_stop(
    event_service: &event::Service,
    conversation_id: &conversation::Id,
    user_id: &user::Id,
) {
    let noti = Notification::TypingStopped {
        conversation_id: *conversation_id,
        user_id: *user_id,
    };

    if let Err(e) = event_service
        .publish(&Subject::Conversation(conversation_id), &noti)
        .await
    {
        error!("Failed to publish typing stop of {user_id} in {conversation_id}: {e}");
    }
}
