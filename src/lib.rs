pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::{connect, local::LocalStore, remote::RemoteStore};
pub use crate::config::AppConfig;
pub use crate::core::{Adapter, Response};
pub use crate::domain::model::{BatchResult, DeletePolicy, ListQuery, Page, Record, Table};
pub use crate::domain::ports::{KeyValueSubstrate, Store};
pub use crate::utils::error::{Result, StoreError};
