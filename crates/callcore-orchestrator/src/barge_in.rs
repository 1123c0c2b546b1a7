//! Barge-In Supervisor (C6, §4.6). Triggered by a user-speaking-start
//! signal from STT or receipt of a final utterance; stops whatever is
//! playing and hands control back to the Turn Orchestrator's interceptor
//! (§4.3 step 2) rather than letting a fresh LLM turn run on the barge-in
//! fragment alone.

use callcore_session::Session;
use tracing::instrument;

use crate::error::Result;
use crate::tts_player::TtsPlayer;

/// Runs steps 1-4 of §4.6. Step 5 (handing off to the turn orchestrator's
/// interceptor) is implicit: callers invoke this before feeding the
/// utterance to `TurnOrchestrator::handle_utterance`, whose own first
/// actions (webhook guard, `silence_greeting_triggered` check) pick up
/// exactly where this leaves off.
#[instrument(skip_all, fields(call_id = %session.call_id))]
pub async fn handle_barge_in(session: &Session, player: &TtsPlayer<'_>) -> Result<()> {
    player.stop_all(&session.call_id).await?;

    let mut history = session.conversation_history.lock().unwrap();
    let should_pop = history
        .last()
        .map(|t| {
            matches!(&t.role, callcore_providers::provider::Role::Assistant)
                && (t.is_silence_greeting || t.looks_like_silence_greeting())
        })
        .unwrap_or(false);
    if should_pop {
        history.pop();
    }
    drop(history);

    session
        .silence_greeting_triggered
        .store(false, std::sync::atomic::Ordering::Relaxed);

    Ok(())
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end via `call_task` integration tests; a unit test
    // here would need a full Session + mock TtsPlayer, which duplicates
    // that coverage without adding confidence.
}
