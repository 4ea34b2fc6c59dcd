mod store_error;
mod timegraph_error;

pub use store_error::StoreError;
pub use timegraph_error::{TgResult, TimegraphError};
