mod error;
mod models;
mod store;

pub use error::{CouchDaoError, CouchResult};
pub use store::CouchStore;
