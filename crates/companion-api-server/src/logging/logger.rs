use anyhow::Result;
use flume::{bounded, Receiver, Sender};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::types::ActivityLog;
use crate::config::ActivityLogConfig;

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Queue capacity (max logs in memory before dropping)
    pub queue_capacity: usize,

    /// Batch size for database inserts
    pub batch_size: usize,

    /// Max wait time before flushing batch (milliseconds)
    pub batch_timeout_ms: u64,

    /// Number of worker tasks for database inserts
    pub worker_count: usize,
}

impl From<&ActivityLogConfig> for LoggerConfig {
    fn from(config: &ActivityLogConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            batch_size: config.batch_size.max(1),
            batch_timeout_ms: config.batch_timeout_ms,
            worker_count: config.worker_count.max(1),
        }
    }
}

#[derive(Clone)]
enum Sink {
    /// Batched inserts into companion_activity_logs
    Queue(Sender<ActivityLog>),
    /// Structured tracing events only
    Tracing,
    Disabled,
}

/// Fire-and-forget activity logger
#[derive(Clone)]
pub struct ActivityLogger {
    sink: Sink,
}

impl ActivityLogger {
    /// Initialize logger with background workers writing to Postgres
    pub fn new(pool: PgPool, config: LoggerConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);

        info!(
            "Initializing ActivityLogger: queue={}, batch={}, timeout={}ms, workers={}",
            config.queue_capacity, config.batch_size, config.batch_timeout_ms, config.worker_count
        );

        for worker_id in 0..config.worker_count {
            let pool = pool.clone();
            let receiver = receiver.clone();
            let config = config.clone();

            tokio::spawn(async move {
                Self::worker_loop(worker_id, pool, receiver, config).await;
            });
        }

        Self {
            sink: Sink::Queue(sender),
        }
    }

    /// Logger for deployments without a database
    pub fn tracing_only() -> Self {
        Self { sink: Sink::Tracing }
    }

    pub fn disabled() -> Self {
        Self { sink: Sink::Disabled }
    }

    /// Log activity (non-blocking, fire-and-forget)
    pub fn log(&self, activity: ActivityLog) {
        match &self.sink {
            Sink::Queue(sender) => {
                if let Err(e) = sender.try_send(activity) {
                    warn!("Failed to enqueue activity log (queue full?): {}", e);
                }
            }
            Sink::Tracing => Self::emit(&activity),
            Sink::Disabled => {}
        }
    }

    fn emit(log: &ActivityLog) {
        info!(
            target: "activity",
            session_id = %log.session_id,
            user_id = log.user_id,
            activity_type = log.activity_type.as_str(),
            status = log.activity_status.as_str(),
            language = log.language.as_deref().unwrap_or(""),
            processing_time_ms = log.processing_time_ms.unwrap_or_default(),
            error_type = log.error_type.as_deref().unwrap_or(""),
            details = %log.details.clone().unwrap_or_default(),
            "activity"
        );
    }

    /// Worker loop - processes logs in batches
    async fn worker_loop(
        worker_id: usize,
        pool: PgPool,
        receiver: Receiver<ActivityLog>,
        config: LoggerConfig,
    ) {
        info!("Logger worker {} started", worker_id);

        let mut batch: Vec<ActivityLog> = Vec::with_capacity(config.batch_size);
        let batch_timeout = Duration::from_millis(config.batch_timeout_ms);

        loop {
            let deadline = tokio::time::Instant::now() + batch_timeout;

            while batch.len() < config.batch_size {
                match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                    Ok(Ok(log)) => batch.push(log),
                    Ok(Err(_)) => {
                        // Channel closed, flush and exit
                        if !batch.is_empty() {
                            Self::flush_batch(&pool, &batch, worker_id).await;
                        }
                        info!("Logger worker {} shutting down (channel closed)", worker_id);
                        return;
                    }
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                Self::flush_batch(&pool, &batch, worker_id).await;
                batch.clear();
            }
        }
    }

    async fn flush_batch(pool: &PgPool, batch: &[ActivityLog], worker_id: usize) {
        let start = std::time::Instant::now();

        match Self::insert_batch(pool, batch).await {
            Ok(inserted) => {
                debug!(
                    "Worker {} inserted {} activity logs in {:?}",
                    worker_id,
                    inserted,
                    start.elapsed()
                );
            }
            Err(e) => {
                error!("Worker {} failed to insert batch of {}: {}", worker_id, batch.len(), e);
            }
        }
    }

    async fn insert_batch(pool: &PgPool, logs: &[ActivityLog]) -> Result<usize> {
        let mut query_builder = sqlx::QueryBuilder::new(
            r#"
            INSERT INTO companion_activity_logs (
                session_id, user_id, activity_type, activity_status,
                language, message_length, response_length, processing_time_ms,
                error_message, error_type, details, created_at
            )
            "#,
        );

        query_builder.push_values(logs, |mut b, log| {
            b.push_bind(&log.session_id)
                .push_bind(log.user_id)
                .push_bind(log.activity_type.as_str())
                .push_bind(log.activity_status.as_str())
                .push_bind(&log.language)
                .push_bind(log.message_length)
                .push_bind(log.response_length)
                .push_bind(log.processing_time_ms)
                .push_bind(&log.error_message)
                .push_bind(&log.error_type)
                .push_bind(&log.details)
                .push_bind(log.created_at);
        });

        let result = query_builder.build().execute(pool).await?;

        Ok(result.rows_affected() as usize)
    }

    /// Pending entries (0 unless backed by the queue)
    pub fn queue_len(&self) -> usize {
        match &self.sink {
            Sink::Queue(sender) => sender.len(),
            _ => 0,
        }
    }
}
