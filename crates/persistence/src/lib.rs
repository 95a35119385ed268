//! Transcript persistence for voice-order
//!
//! Provides fire-and-forget storage for finalized utterances:
//! - Transcript records (audit and fine-tuning export)
//! - Batched background writer
//! - JSON-lines and in-memory stores

pub mod error;
pub mod record;
pub mod store;
pub mod writer;

pub use error::PersistenceError;
pub use record::{TranscriptRecord, STATUS_NEW};
pub use store::{JsonlTranscriptStore, MemoryTranscriptStore, TranscriptStore};
pub use writer::TranscriptWriter;

use std::sync::Arc;

use voice_order_config::PersistenceConfig;

/// Start the writer configured by `config`, or `None` when disabled
pub fn init(config: &PersistenceConfig) -> Option<TranscriptWriter> {
    if !config.enabled {
        tracing::info!("Transcript persistence disabled");
        return None;
    }
    tracing::info!(path = %config.path, batch_size = config.batch_size, "Transcript persistence enabled");
    let store = Arc::new(JsonlTranscriptStore::new(&config.path));
    Some(TranscriptWriter::spawn(store, config))
}
