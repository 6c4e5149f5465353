//! Long-poll loop over the Telegram getUpdates endpoint.
//!
//! One update at a time, in order. A failing handler is logged and the
//! loop moves on; a failing poll backs off briefly before retrying so a
//! transport outage never busy-loops.

use std::sync::Arc;
use std::time::Duration;

use proctor_infra::telegram::{TelegramClient, normalize_update};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::Router;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub async fn run(
    telegram: Arc<TelegramClient>,
    router: Arc<Router>,
    poll_timeout_secs: u64,
    cancel: CancellationToken,
) {
    let mut offset = 0i64;
    info!("update poller started");

    while !cancel.is_cancelled() {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = telegram.get_updates(offset, poll_timeout_secs) => match result {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("getUpdates failed: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            },
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            // Acknowledge the press so the client stops its spinner,
            // whether or not the payload routes anywhere.
            if let Some(callback) = &update.callback_query {
                if let Err(e) = telegram.answer_callback_query(&callback.id).await {
                    debug!("answerCallbackQuery failed: {e}");
                }
            }

            let Some(event) = normalize_update(&update) else {
                continue;
            };
            if let Err(e) = router.route(&event).await {
                warn!(user_id = event.user_id, "update handling failed: {e}");
            }
        }
    }

    info!("update poller stopped");
}
