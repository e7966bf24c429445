//! bmcsweep-core: inventory collection
//!
//! Maps scanned BMCs to stable IDs, crawls them through `bmcsweep-redfish`,
//! and turns the results into records for output files and the inventory
//! service.

pub mod collect;
pub mod error;
pub mod idmap;
pub mod output;
pub mod record;
pub mod sink;

pub use collect::{CollectOutcome, CollectParams, Collector, HostOutcome, HostStatus};
pub use error::{CollectError, IdMapError, OutputError, SinkError};
pub use idmap::{
    BmcIdMap, GeneratedXnameMapper, IdMapper, LookupKeys, MapKey, UserIdMapper, select_mapper,
};
pub use output::{OutputFormat, OutputTargets};
pub use record::InventoryRecord;
pub use sink::{ForwardSummary, Headers, HttpInventorySink, InventorySink, forward_records};
