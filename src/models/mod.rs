pub mod amount;
pub mod registry;
pub mod tracking_event;
pub mod transaction;

pub use amount::{AmountNormalizer, DEFAULT_TOKEN_DECIMALS, NATIVE_DECIMALS};
pub use registry::{normalize_address, ChainTracking, TrackedRegistry};
pub use tracking_event::{TrackingEvent, TransferKind};
pub use transaction::{Block, ChainTransaction, RawLog, TransactionReceipt};
