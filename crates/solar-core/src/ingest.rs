use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::{decode_event, decode_upload, DecodeError};
use crate::reading::normalize;
use crate::store::{StoreError, TelemetryRepository};

/// Where a request is in the pipeline. Successful requests end in
/// `Acknowledged`; failed ones report the stage they failed in through
/// [`IngestError::stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Decoding,
    Normalizing,
    Persisting,
    Acknowledged,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] DecodeError),
    /// `persisted` records were written before the failure.
    #[error("persistence failure after {persisted} records: {source}")]
    Persistence {
        persisted: usize,
        #[source]
        source: StoreError,
    },
}

impl IngestError {
    /// Stage the request was in when it failed.
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Malformed(_) => IngestStage::Decoding,
            Self::Persistence { .. } => IngestStage::Persisting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub stage: IngestStage,
    pub records: usize,
}

/// Drives decode, normalize and persist for one request at a time.
/// Holds no per-request state, so one instance serves concurrent requests.
pub struct Ingestor<R: TelemetryRepository> {
    repo: Arc<R>,
}

impl<R: TelemetryRepository> Clone for Ingestor<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: TelemetryRepository> Ingestor<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Persists readings in batch order and stops at the first failed save.
    /// Rows saved before the failure are kept.
    pub async fn ingest_readings(&self, body: &[u8]) -> Result<IngestReport, IngestError> {
        let mut stage = IngestStage::Decoding;
        let batch = decode_upload(body).map_err(reject)?;

        advance(&mut stage, IngestStage::Normalizing);
        let readings = normalize(&batch);

        advance(&mut stage, IngestStage::Persisting);
        for (persisted, reading) in readings.iter().enumerate() {
            if let Err(source) = self.repo.save_reading(reading).await {
                warn!(?stage, persisted, total = readings.len(), error = %source, "reading batch aborted");
                return Err(IngestError::Persistence { persisted, source });
            }
        }

        advance(&mut stage, IngestStage::Acknowledged);
        info!(
            start_timestamp = batch.start_timestamp,
            readings = readings.len(),
            "reading batch stored"
        );
        Ok(IngestReport {
            stage,
            records: readings.len(),
        })
    }

    pub async fn ingest_event(&self, body: &[u8]) -> Result<IngestReport, IngestError> {
        let mut stage = IngestStage::Decoding;
        let event = decode_event(body).map_err(reject)?;

        // the logged text is the stored text
        let record = event.to_record();
        info!(kind = record.kind.name(), event = %record.text, "system event");

        advance(&mut stage, IngestStage::Persisting);
        if let Err(source) = self.repo.save_event(&record).await {
            warn!(?stage, error = %source, "system event not stored");
            return Err(IngestError::Persistence {
                persisted: 0,
                source,
            });
        }

        advance(&mut stage, IngestStage::Acknowledged);
        Ok(IngestReport { stage, records: 1 })
    }
}

fn advance(stage: &mut IngestStage, next: IngestStage) {
    debug!(from = ?*stage, to = ?next, "ingest stage");
    *stage = next;
}

fn reject(err: DecodeError) -> IngestError {
    warn!(stage = ?IngestStage::Decoding, error = %err, "payload rejected");
    IngestError::Malformed(err)
}
