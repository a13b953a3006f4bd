//! Delivery SDK - Query and Retrieval for a Headless Content API
//!
//! Provides a typed client for published content with:
//! - Chainable entry queries (filters, projections, sorting, paging)
//! - Reference inclusion with splicing of included documents
//! - Image transform URLs for assets
//! - Pluggable transports (reqwest over HTTP, scripted mock for tests)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Stack                   │
//! │  (content types, entries, assets)       │
//! └────────────────┬────────────────────────┘
//!                  │ Query / ParameterBag
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │             FetchPipeline               │
//! │  snapshot → send → demux → materialize  │
//! └──────┬───────────────────────┬──────────┘
//!        ▼                       ▼
//! ┌─────────────┐       ┌──────────────────┐
//! │  Transport  │       │ ResultMaterializer│
//! │ (Http/Mock) │       │ (reference splice)│
//! └─────────────┘       └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use delivery_sdk::{DeliveryConfig, Query, Stack};
//!
//! # async fn run() -> delivery_sdk::Result<()> {
//! let stack = Stack::new(DeliveryConfig::from_env()?)?;
//!
//! let query = Query::new("product")
//!     .less_than("price", 150)
//!     .include_reference("brand")
//!     .include_count();
//!
//! let result = stack.find(&query).await?;
//! for entry in &result.entries {
//!     println!("{}: {:?}", entry.uid(), entry.title());
//! }
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod config;
pub mod entry;
pub mod error;
pub mod image;
pub mod materialize;
pub mod params;
pub mod pipeline;
pub mod query;
pub mod stack;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use asset::Asset;
pub use config::{DeliveryConfig, Region};
pub use entry::Entry;
pub use error::{DeliveryError, FieldError, Result};
pub use image::{ImageFormat, ImageTransform};
pub use params::ParameterBag;
pub use pipeline::{FetchPipeline, Target};
pub use query::{Order, Query};
pub use stack::{AssetLibrary, AssetRequest, ContentType, EntryRequest, Stack};
pub use transport::{HttpTransport, MockTransport, Transport, TransportError};
pub use types::{AssetQueryResult, ContentTypeSchema, QueryResult};
