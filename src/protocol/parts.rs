mod query_options;
mod record;
mod store_options;
mod stream_id;

pub use query_options::QueryOptions;
pub use record::{Record, RecordId};
pub use store_options::StoreOptions;
pub use stream_id::StreamId;
