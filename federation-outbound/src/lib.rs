//! Outbound delivery and remote retrieval.
//!
//! # Components
//!
//! - **Dispatcher**: turns one entity and a recipient list into delivery
//!   jobs and sends them ([`OutboundDispatcher`])
//! - **Transport**: the network seam ([`DeliveryTransport`]), with a reqwest
//!   implementation ([`HttpTransport`]) and a recording mock for tests
//! - **Fetcher**: retrieves remote entities and actor keys ([`RemoteFetcher`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use federation_outbound::{transport::mock::RecordingTransport, OutboundDispatcher};
//! use federation_protocols::ProtocolRegistry;
//!
//! let dispatcher = OutboundDispatcher::new(
//!     Arc::new(ProtocolRegistry::with_defaults()),
//!     Arc::new(RecordingTransport::new()),
//! );
//! assert_eq!(dispatcher.config().max_concurrent_deliveries, 8);
//! ```

mod config;
mod dispatcher;
mod fetcher;
mod http;
mod report;
pub mod transport;

pub use config::{DispatchConfig, HttpTransportConfig};
pub use dispatcher::{DeliveryJob, DeliveryPlan, OutboundDispatcher};
pub use fetcher::RemoteFetcher;
pub use http::HttpTransport;
pub use report::{DeliveryOutcome, DeliveryReport};
pub use transport::DeliveryTransport;
