//! Out-of-band analysis worker. Drains `analysis:queue` and writes each record's terminal
//! state, so review sessions started from a queued upload eventually settle.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{apply_response, AnalysisError, AnalysisQueue, AnalysisRequest, FeedbackAnalyzer};
use crate::models::resume::{ResumeRecord, ResumeStatus};
use crate::store::ResumeStore;

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq)]
pub enum JobOutcome {
    Completed(ResumeStatus),
    Skipped,
}

/// Runs until `shutdown` is cancelled.
pub async fn run(
    queue: AnalysisQueue,
    store: ResumeStore,
    analyzer: Arc<dyn FeedbackAnalyzer>,
    shutdown: CancellationToken,
) {
    info!("Analysis worker started");
    loop {
        let popped = tokio::select! {
            _ = shutdown.cancelled() => break,
            popped = queue.pop() => popped,
        };

        match popped {
            Ok(Some(job)) => {
                process_job(&store, analyzer.as_ref(), job).await;
            }
            Ok(None) => {}
            Err(AnalysisError::Encode(e)) => warn!("Dropping undecodable analysis job: {e}"),
            Err(e) => {
                error!("Analysis queue read failed: {e}");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    info!("Analysis worker stopped");
}

/// Analyzes one queued job and persists the terminal record.
pub async fn process_job(
    store: &ResumeStore,
    analyzer: &dyn FeedbackAnalyzer,
    job: AnalysisRequest,
) -> JobOutcome {
    let id = job.record_id.clone();
    let mut record = match store.fetch_raw(&id).await {
        Ok(Some(text)) => match ResumeRecord::decode(&text) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping job for {id}: stored record is corrupted ({e})");
                return JobOutcome::Skipped;
            }
        },
        Ok(None) => {
            warn!("Skipping job for {id}: record not found");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            error!("Skipping job for {id}: {e}");
            return JobOutcome::Skipped;
        }
    };

    if record.is_terminal() {
        warn!(
            "Skipping job for {id}: record is already {}",
            record.status.as_str()
        );
        return JobOutcome::Skipped;
    }

    let transition = match analyzer.feedback(&job).await {
        Ok(Some(response)) => apply_response(&mut record, response),
        Ok(None) => record.mark_error("Analysis service returned no result."),
        Err(e) => {
            error!("Analysis failed for {id}: {e}");
            record.mark_error(e.to_string())
        }
    };
    if let Err(e) = transition {
        warn!("Skipping job for {id}: {e}");
        return JobOutcome::Skipped;
    }

    if let Err(e) = store.put(&record).await {
        error!("Failed to persist analysis result for {id}: {e}");
    }
    info!("Record {id} settled as {}", record.status.as_str());
    JobOutcome::Completed(record.status)
}
