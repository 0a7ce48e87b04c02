pub mod entity;
pub mod error;
pub mod types;
pub mod value;
pub mod version;

pub use entity::{Entity, EntitySet};
pub use error::{CollectionError, Result};
pub use types::{CollectionScope, Id};
pub use value::Value;
pub use version::{LogicalVersionClock, SystemVersionClock, Version, VersionClock};
