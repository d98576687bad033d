use alloy_consensus::transaction::SignerRecoverable;
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::ChainTransaction;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("No signing scheme for transaction type {0}")]
    UnsupportedType(u8),
    #[error("Transaction envelope could not be decoded: {0}")]
    Decode(String),
    #[error("Transaction signed for chain {actual}, expected {expected}")]
    ChainIdMismatch { expected: u64, actual: u64 },
    #[error("Signature recovery failed: {0}")]
    Signature(String),
    #[error("Node did not report a sender")]
    MissingSender,
}

/// Recovers the sender of a signed transaction for one signature version
pub trait SenderRecovery: Send + Sync {
    fn recover_sender(&self, tx: &ChainTransaction, chain_id: u64) -> Result<Address, RecoveryError>;
}

/// secp256k1 recovery over EIP-2718 envelopes (legacy, 2930, 1559, 4844, 7702).
///
/// Legacy transactions signed without EIP-155 carry no chain id and are accepted on any chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeSigner;

impl SenderRecovery for EnvelopeSigner {
    fn recover_sender(&self, tx: &ChainTransaction, chain_id: u64) -> Result<Address, RecoveryError> {
        let envelope: TxEnvelope = serde_json::from_value(tx.raw.clone())
            .map_err(|e| RecoveryError::Decode(e.to_string()))?;

        if let Some(actual) = envelope.chain_id() {
            if actual != chain_id {
                return Err(RecoveryError::ChainIdMismatch { expected: chain_id, actual });
            }
        }

        envelope
            .recover_signer()
            .map_err(|e| RecoveryError::Signature(e.to_string()))
    }
}

/// Trusts the `from` field reported by the node
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportedSender;

impl SenderRecovery for ReportedSender {
    fn recover_sender(&self, tx: &ChainTransaction, _chain_id: u64) -> Result<Address, RecoveryError> {
        tx.reported_from.ok_or(RecoveryError::MissingSender)
    }
}

/// Signing schemes keyed by transaction type, with an optional catch-all
#[derive(Clone, Default)]
pub struct SignerSet {
    schemes: HashMap<u8, Arc<dyn SenderRecovery>>,
    fallback: Option<Arc<dyn SenderRecovery>>,
}

impl SignerSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Envelope recovery registered for types 0-4
    pub fn standard() -> Self {
        let envelope: Arc<dyn SenderRecovery> = Arc::new(EnvelopeSigner);
        (0u8..=4).fold(Self::empty(), |set, version| {
            set.with_scheme(version, Arc::clone(&envelope))
        })
    }

    pub fn with_scheme(mut self, version: u8, scheme: Arc<dyn SenderRecovery>) -> Self {
        self.schemes.insert(version, scheme);
        self
    }

    /// Used for transaction types with no registered scheme
    pub fn with_fallback(mut self, scheme: Arc<dyn SenderRecovery>) -> Self {
        self.fallback = Some(scheme);
        self
    }

    pub fn try_recover(&self, tx: &ChainTransaction, chain_id: u64) -> Result<Address, RecoveryError> {
        let scheme = self
            .schemes
            .get(&tx.tx_type)
            .or(self.fallback.as_ref())
            .ok_or(RecoveryError::UnsupportedType(tx.tx_type))?;
        scheme.recover_sender(tx, chain_id)
    }
}
