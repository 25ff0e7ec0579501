// Session cleanup logic

use crate::server::{RtmpServerContext, RtmpServerStatus};

use super::SessionContext;

/// Performs session cleanup
///
/// Teardown is idempotent: publishers clear the channel's publisher
/// slot and detach their players, players remove themselves from
/// the channel, and empty channels are removed.
///
/// # Arguments
///
/// * `server_context` - The server context
/// * `session_context` - The session context
pub async fn do_session_cleanup(
    server_context: &RtmpServerContext,
    session_context: &SessionContext,
) {
    let session_status_v = session_context.status.lock().await;

    let channel = match &session_status_v.channel {
        Some(c) => c.clone(),
        None => {
            return; // Not connected yet, nothing to do
        }
    };

    let must_clear_player = session_status_v.is_player;
    let must_clear_publisher = session_status_v.is_publisher;

    drop(session_status_v);

    if must_clear_player {
        RtmpServerStatus::remove_player(&server_context.status, &channel, session_context.id).await;
    }

    if must_clear_publisher {
        RtmpServerStatus::remove_publisher(&server_context.status, &channel, session_context.id)
            .await;
    }

    RtmpServerStatus::try_clear_channel(&server_context.status, &channel).await;
}
