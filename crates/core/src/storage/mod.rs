pub mod request_store;

pub use request_store::{
    JsonlRequestStore, Outcome, RequestEntry, RequestStore, StoreError, REQUEST_LOG_FILE,
};
