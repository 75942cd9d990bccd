/// Network reachability checks.
pub mod connectivity;
/// Shared document store contract and its backends.
pub mod document_store;
/// Typed documents stored in the shared store.
pub mod models;
/// Storage abstraction layer errors.
pub mod storage;
