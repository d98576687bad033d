pub mod block_poller;
pub mod block_processor;
pub mod rpc_client;
pub mod signer;
pub mod transfer_classifier;

pub use block_poller::{BlockPoller, PollerError, Step};
pub use block_processor::{BlockProcessor, BlockSummary};
pub use rpc_client::{ChainClient, RpcClient};
pub use signer::{EnvelopeSigner, RecoveryError, ReportedSender, SenderRecovery, SignerSet};
pub use transfer_classifier::{decode_transfer, ChainContext, ClassifyError, TransferClassifier};
