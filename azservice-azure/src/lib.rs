//! # azservice Azure
//!
//! Cosmos DB and Table Storage service facades. Every store call runs under
//! a [`RetryExecutor`](azservice_retry::RetryExecutor) and record updates are
//! ETag-guarded read-modify-writes that re-read the record on every attempt.
//!
//! Services are created from configuration sections and only when those
//! sections exist:
//!
//! | Section          | Settings                |
//! |------------------|-------------------------|
//! | `RetryPolicy`    | `RetryPolicySettings`   |
//! | `Azure:CosmosDb` | [`CosmosDbSettings`]    |
//! | `Azure:Storage`  | [`StorageSettings`]     |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use azservice_azure::AzureServices;
//! use azservice_config::{ConfigManager, FileFormat};
//! use azservice_store::Mutations;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigManager::builder()
//!         .add_file("appsettings.json", FileFormat::Json)
//!         .load_env()
//!         .build()?;
//!
//!     let services = AzureServices::in_memory(&config)?;
//!     let cosmos = services.cosmos()?;
//!
//!     cosmos
//!         .patch_atomic(
//!             &Mutations::new().set("status", "done").increment("counter", 1),
//!             "jobs",
//!             "tenant-a",
//!             "job-42",
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod connection;
mod cosmos;
mod error;
mod services;
mod settings;
mod table;

pub use connection::{ConnectionString, EMULATOR_TABLE_ENDPOINT};
pub use cosmos::{CosmosDbService, ID_FIELD, TTL_FIELD};
pub use error::{AzureError, Result};
pub use services::{AzureServices, AzureServicesBuilder};
pub use settings::{CosmosContainer, CosmosDbSettings, StorageSettings};
pub use table::{MAX_RECORDS_PER_PAGE, TableEntity, TableStorageService};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::cosmos::CosmosDbService;
    pub use crate::error::{AzureError, Result};
    pub use crate::services::AzureServices;
    pub use crate::settings::{CosmosContainer, CosmosDbSettings, StorageSettings};
    pub use crate::table::{TableEntity, TableStorageService};
}
