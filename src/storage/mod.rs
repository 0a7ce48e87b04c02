pub mod codec;
pub mod engine;
pub mod memory;
pub mod record;

pub use engine::{RecordStore, RecordStream};
pub use memory::{InMemoryRecordStore, StoreStats};
pub use record::{RecordStatus, VersionedRecord};
