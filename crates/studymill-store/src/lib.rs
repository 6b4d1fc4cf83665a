mod error;
mod schema;
mod store;
mod studies;

pub use error::{Result, StoreError};
pub use store::Store;
pub use studies::{StoredQuestion, Study};
