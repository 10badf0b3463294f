use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use super::{AnalysisError, AnalysisRequest, AnalysisResponse, FeedbackAnalyzer};

/// Redis list holding pending analysis jobs. Producers LPUSH, the worker BRPOPs.
pub const QUEUE_KEY: &str = "analysis:queue";

/// Seconds a single BRPOP blocks before the worker re-checks for shutdown.
const POP_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct AnalysisQueue {
    conn: MultiplexedConnection,
}

impl AnalysisQueue {
    pub async fn connect(client: &redis::Client) -> Result<Self, AnalysisError> {
        Ok(Self {
            conn: client.get_multiplexed_async_connection().await?,
        })
    }

    pub async fn push(&self, request: &AnalysisRequest) -> Result<(), AnalysisError> {
        let payload = serde_json::to_string(request)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(QUEUE_KEY, payload).await?;
        Ok(())
    }

    /// Blocks up to a few seconds for the next job. Undecodable payloads are returned as
    /// errors so the worker can log and drop them.
    pub async fn pop(&self) -> Result<Option<AnalysisRequest>, AnalysisError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(QUEUE_KEY)
            .arg(POP_TIMEOUT_SECS)
            .query_async(&mut conn)
            .await?;
        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

/// Defers analysis to the worker. Always answers `None` ("queued").
pub struct QueuedAnalyzer {
    queue: AnalysisQueue,
}

impl QueuedAnalyzer {
    pub fn new(queue: AnalysisQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl FeedbackAnalyzer for QueuedAnalyzer {
    async fn feedback(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalysisResponse>, AnalysisError> {
        self.queue.push(request).await?;
        info!("Queued analysis for record {}", request.record_id);
        Ok(None)
    }
}
