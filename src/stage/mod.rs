// ============================================================================
// Stage pipeline
// ============================================================================
//
// Every collection operation is a short chain of stages sharing one
// execution context (scope + cancellation token):
//
//   load      : load
//   load_as_of: load_as_of
//   write     : verify_entity -> write_commit
//   update    : verify_entity -> update_commit
//   delete    : verify_id -> mark_deleted
//
// ============================================================================

pub mod context;
pub mod delete;
pub mod load;
pub mod pipeline;
pub mod update;
pub mod write;

pub use context::{CollectionIoEvent, IoContext};
pub use delete::{MarkDeleted, VerifyId};
pub use load::{Load, SnapshotRead};
pub use pipeline::{Pipeline, Stage};
pub use update::UpdateCommit;
pub use write::{VerifyEntity, WriteCommit};
