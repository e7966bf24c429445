//! bmcsweep-redfish: Redfish crawling of BMCs
//!
//! Resolves credentials for a BMC, opens a Redfish session, and walks the
//! chassis, systems and managers trees into normalized inventory types.

pub mod client;
pub mod crawler;
pub mod credentials;
pub mod error;
pub mod probe;
pub mod schema;
pub mod types;

pub use client::{HttpConnector, HttpSession, RedfishConnector, RedfishSession, SessionTarget};
pub use crawler::{BmcCrawler, CrawlerConfig, DEFAULT_CRAWL_TIMEOUT};
pub use credentials::{CredentialSource, resolve_credentials};
pub use error::{CrawlError, Result};
pub use probe::RedfishProbe;
pub use types::{ChassisAttributes, EthernetInterface, InventoryDetail, Manager, TrustedModule};
