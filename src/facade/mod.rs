pub mod factory;
pub mod manager;

pub use factory::CollectionManagerFactory;
pub use manager::{CollectionManager, EntityCollectionManager};
