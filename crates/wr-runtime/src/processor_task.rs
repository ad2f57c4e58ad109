use tokio::sync::mpsc;
use wr_core::EventProcessor;

use crate::receiver::EventEnvelope;

/// Drains the event channel and runs each envelope through the processor.
///
/// The loop ends when every sender is gone. That is how shutdown reaches
/// this task: the receiver and its connections drop their channel handles
/// and the queued envelopes are drained before the task returns.
///
/// A processing failure is logged and the loop continues; one poisonous
/// event must not stall the queue behind it.
#[tracing::instrument(name = "processor", skip_all)]
pub async fn run_processor_task(
    mut rx: mpsc::Receiver<EventEnvelope>,
    processor: EventProcessor,
) -> anyhow::Result<()> {
    while let Some(envelope) = rx.recv().await {
        let item_id = envelope.item_id;
        let (ctx, notification) = envelope.split();
        match processor.process_event(&ctx, &notification) {
            Ok(result) => {
                wr_info!(
                    proc,
                    item_id = %item_id,
                    code = result.status_code,
                    status = %result.status_message,
                    "event processed"
                );
            }
            Err(e) => {
                wr_error!(proc, item_id = %item_id, error = %e, "event processing failed");
            }
        }
    }
    wr_debug!(proc, "event channel drained, processor task exiting");
    Ok(())
}
