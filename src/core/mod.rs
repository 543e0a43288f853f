pub mod batch;
pub mod csv_io;
pub mod identity;
pub mod query;
pub mod response;
pub mod router;
pub mod seed;
pub mod snapshot;

pub use crate::domain::model::{ListQuery, Page, Record, Table};
pub use crate::domain::ports::{KeyValueSubstrate, Store};
pub use crate::utils::error::Result;
pub use response::Response;
pub use router::{Adapter, Method};
