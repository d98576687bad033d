use alloy_primitives::{Address, Log};
use alloy_sol_types::{sol, SolCall, SolEvent};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::rpc_client::ChainClient;
use crate::blockchain::signer::SignerSet;
use crate::error::{RegistryError, RpcError};
use crate::logging::LogContext;
use crate::models::{
    AmountNormalizer, ChainTransaction, RawLog, TrackedRegistry, TrackingEvent, TransferKind,
    DEFAULT_TOKEN_DECIMALS,
};

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        function symbol() external view returns (string);
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Failed to fetch receipt: {0}")]
    Receipt(#[source] RpcError),
    #[error("Shutdown requested")]
    Interrupted,
}

/// Decoded ERC-20 `Transfer` log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: alloy_primitives::U256,
}

/// Per-chain facts the classifier needs
#[derive(Debug, Clone)]
pub struct ChainContext {
    pub label: String,
    pub chain_id: u64,
    pub native_symbol: String,
    /// Decimals overrides keyed by lowercase token address
    pub token_decimals: HashMap<String, u8>,
}

/// Turns transactions and their receipt logs into tracking events for one chain
pub struct TransferClassifier {
    context: ChainContext,
    registry: Arc<TrackedRegistry>,
    signers: SignerSet,
    client: Arc<dyn ChainClient>,
    shutdown: Arc<AtomicBool>,
}

impl TransferClassifier {
    /// Fails when the registry has no entry for the chain
    pub fn new(
        context: ChainContext,
        registry: Arc<TrackedRegistry>,
        signers: SignerSet,
        client: Arc<dyn ChainClient>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self, RegistryError> {
        registry.ensure_chain(&context.label)?;
        Ok(Self {
            context,
            registry,
            signers,
            client,
            shutdown,
        })
    }

    pub fn chain(&self) -> &str {
        &self.context.label
    }

    /// Native value transfer touching a tracked address
    pub fn classify_native(&self, tx: &ChainTransaction) -> Option<TrackingEvent> {
        if tx.value.is_zero() {
            return None;
        }

        let from = match self.signers.try_recover(tx, self.context.chain_id) {
            Ok(sender) => format!("{:#x}", sender),
            Err(e) => {
                LogContext::new("transfer_classifier", "recover_sender")
                    .with_chain(&self.context.label)
                    .with_transaction_hash(&tx.hash_hex())
                    .with_metadata("tx_type", json!(tx.tx_type))
                    .warn(&format!("Sender unresolved: {}", e));
                String::new()
            }
        };
        let to = tx.to.map(|a| format!("{:#x}", a)).unwrap_or_default();

        let chain = &self.context.label;
        if !self.registry.is_tracked_address(chain, &from) && !self.registry.is_tracked_address(chain, &to) {
            return None;
        }

        Some(TrackingEvent {
            transaction_hash: tx.hash_hex(),
            kind: TransferKind::Native,
            from,
            to,
            chain: chain.clone(),
            token: String::new(),
            symbol: self.context.native_symbol.clone(),
            amount: AmountNormalizer::native(tx.value),
        })
    }

    /// ERC-20 transfers of tracked tokens in the transaction's receipt, in log order
    pub async fn classify_erc20(&self, tx: &ChainTransaction) -> Result<Vec<TrackingEvent>, ClassifyError> {
        self.check_shutdown()?;
        let receipt = self
            .client
            .transaction_receipt(tx.hash)
            .await
            .map_err(ClassifyError::Receipt)?;

        let chain = &self.context.label;
        let tx_hash = tx.hash_hex();
        let mut events = Vec::new();

        for log in &receipt.logs {
            let token = format!("{:#x}", log.address);
            if !self.registry.is_tracked_token(chain, &token) {
                continue;
            }

            let transfer = match decode_transfer(log) {
                Some(transfer) => transfer,
                None => {
                    LogContext::new("transfer_classifier", "decode_transfer")
                        .with_chain(chain)
                        .with_transaction_hash(&tx_hash)
                        .with_address(&token)
                        .debug("Log is not an ERC-20 Transfer");
                    continue;
                }
            };

            let from = format!("{:#x}", transfer.from);
            let to = format!("{:#x}", transfer.to);
            if !self.registry.is_tracked_address(chain, &from) && !self.registry.is_tracked_address(chain, &to) {
                continue;
            }

            self.check_shutdown()?;
            let symbol = match self.read_symbol(transfer.token).await {
                Ok(symbol) => symbol,
                Err(e) => {
                    LogContext::new("transfer_classifier", "read_symbol")
                        .with_chain(chain)
                        .with_transaction_hash(&tx_hash)
                        .with_address(&token)
                        .warn(&format!("Skipping transfer, symbol() failed: {}", e));
                    continue;
                }
            };

            let decimals = self
                .context
                .token_decimals
                .get(&token)
                .copied()
                .unwrap_or(DEFAULT_TOKEN_DECIMALS);

            events.push(TrackingEvent {
                transaction_hash: tx_hash.clone(),
                kind: TransferKind::Erc20,
                from,
                to,
                chain: chain.clone(),
                token,
                symbol,
                amount: AmountNormalizer::normalize(transfer.value, decimals),
            });
        }

        Ok(events)
    }

    async fn read_symbol(&self, token: Address) -> Result<String, RpcError> {
        let data = IERC20::symbolCall {}.abi_encode();
        let output = self.client.call(token, data.into()).await?;
        IERC20::symbolCall::abi_decode_returns(&output)
            .map_err(|e| RpcError::InvalidResponse(format!("symbol() returned undecodable data: {}", e)))
    }

    fn check_shutdown(&self) -> Result<(), ClassifyError> {
        if self.shutdown.load(Ordering::Relaxed) {
            Err(ClassifyError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Decode a receipt log as `Transfer(address,address,uint256)`
pub fn decode_transfer(log: &RawLog) -> Option<DecodedTransfer> {
    let primitive = Log::new(log.address, log.topics.clone(), log.data.clone())?;
    let decoded = IERC20::Transfer::decode_log(&primitive).ok()?;
    Some(DecodedTransfer {
        token: decoded.address,
        from: decoded.data.from,
        to: decoded.data.to,
        value: decoded.data.value,
    })
}

/// ABI-encoded return value of `symbol()`, for tests and mocks
pub fn encode_symbol_return(symbol: &str) -> alloy_primitives::Bytes {
    IERC20::symbolCall::abi_encode_returns(&symbol.to_string()).into()
}

/// Topics and data of a `Transfer` log, for tests and mocks
pub fn encode_transfer_log(token: Address, from: Address, to: Address, value: alloy_primitives::U256) -> RawLog {
    let event = IERC20::Transfer { from, to, value };
    let data = event.encode_log_data();
    RawLog {
        address: token,
        topics: data.topics().to_vec(),
        data: data.data,
        log_index: None,
    }
}
