pub mod auth;
pub mod config;
pub mod decode;
pub mod event;
pub mod ingest;
pub mod reading;
pub mod store;
pub mod wire;

pub use auth::{AuthError, TokenGate, TOKEN_HEADER};
pub use config::ServerConfig;
pub use decode::{decode_event, decode_upload, DecodeError};
pub use event::{EventKind, EventRecord, SystemEvent};
pub use ingest::{IngestError, IngestReport, IngestStage, Ingestor};
pub use reading::{normalize, NormalizedReading, RawReading, UploadBatch, UploadEntry};
pub use store::{MemoryRepository, SqliteRepository, StoreError, TelemetryRepository};
