//! Main loop: pull messages off a channel, route them, reply.
//!
//! Routing is done inline so each chat's transitions happen in arrival order.
//! Deliveries are spawned, so a slow mail relay only delays the reply to the
//! chat that is waiting on it.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinSet;

use super::flow::{Relay, Step};
use crate::channels::{Channel, IncomingMessage, OutgoingResponse};
use crate::error::Result;

/// Run until Ctrl+C.
pub async fn run(channel: Arc<dyn Channel>, relay: Arc<Relay>) -> Result<()> {
    run_until(channel, relay, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Interrupt received");
    })
    .await
}

/// Run until `shutdown` resolves or the channel's stream ends.
///
/// In-flight deliveries are allowed to finish before returning.
pub async fn run_until<F>(
    channel: Arc<dyn Channel>,
    relay: Arc<Relay>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let mut messages = channel.start().await?;
    let mut deliveries = JoinSet::new();
    tokio::pin!(shutdown);

    tracing::info!(channel = channel.name(), "Relay running");

    loop {
        tokio::select! {
            maybe = messages.next() => {
                let Some(msg) = maybe else {
                    tracing::info!("Message stream ended");
                    break;
                };
                handle_message(&channel, &relay, msg, &mut deliveries).await;
            }
            Some(done) = deliveries.join_next(), if !deliveries.is_empty() => {
                if let Err(e) = done {
                    tracing::error!("Delivery task panicked: {e}");
                }
            }
            () = &mut shutdown => break,
        }
    }

    while let Some(done) = deliveries.join_next().await {
        if let Err(e) = done {
            tracing::error!("Delivery task panicked: {e}");
        }
    }

    channel.shutdown().await?;
    Ok(())
}

async fn handle_message(
    channel: &Arc<dyn Channel>,
    relay: &Arc<Relay>,
    msg: IncomingMessage,
    deliveries: &mut JoinSet<()>,
) {
    tracing::debug!(
        message_id = %msg.id,
        channel = %msg.channel,
        chat_id = %msg.chat_id,
        user = msg.user_name.as_deref().unwrap_or("unknown"),
        "Incoming message"
    );

    let step = relay.route(msg.chat_id, &msg.content).await;
    match step {
        Step::Reply(text) => reply(channel.as_ref(), &msg, text).await,
        Step::Deliver(delivery) => {
            let channel = Arc::clone(channel);
            let relay = Arc::clone(relay);
            deliveries.spawn(async move {
                let text = relay.deliver(delivery).await;
                reply(channel.as_ref(), &msg, text).await;
            });
        }
        Step::Ignore => {}
    }
}

/// Send a reply; failures are logged and never stop the loop.
async fn reply(channel: &dyn Channel, msg: &IncomingMessage, text: &str) {
    if let Err(e) = channel.respond(msg, OutgoingResponse::text(text)).await {
        tracing::warn!(chat_id = %msg.chat_id, error = %e, "Failed to send reply");
    }
}
