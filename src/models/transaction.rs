use alloy_primitives::{Address, Bytes, B256, U256};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RpcError;

/// A transaction as returned inside `eth_getBlockByNumber(n, true)`.
///
/// The raw JSON object is kept so signature schemes can decode the full envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTransaction {
    pub hash: B256,
    /// EIP-2718 type; legacy transactions without a `type` field are 0
    pub tx_type: u8,
    pub chain_id: Option<u64>,
    pub to: Option<Address>,
    pub value: U256,
    /// Sender as reported by the node, not verified
    pub reported_from: Option<Address>,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: B256,
    #[serde(rename = "type", default)]
    tx_type: Option<String>,
    #[serde(default)]
    chain_id: Option<String>,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    value: Option<U256>,
    #[serde(default)]
    from: Option<Address>,
}

impl ChainTransaction {
    pub fn from_rpc(raw: Value) -> Result<Self, RpcError> {
        let parsed: RpcTransaction = serde_json::from_value(raw.clone())?;

        let tx_type = match parsed.tx_type.as_deref() {
            Some(hex) => {
                let value = parse_hex_to_u64(hex)?;
                u8::try_from(value).map_err(|_| {
                    RpcError::InvalidResponse(format!("Transaction type out of range: {}", hex))
                })?
            }
            None => 0,
        };
        let chain_id = parsed.chain_id.as_deref().map(parse_hex_to_u64).transpose()?;

        Ok(Self {
            hash: parsed.hash,
            tx_type,
            chain_id,
            to: parsed.to,
            value: parsed.value.unwrap_or_default(),
            reported_from: parsed.from,
            raw,
        })
    }

    /// Lowercase `0x` hash string
    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }
}

/// Block with full transaction objects
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub transactions: Vec<ChainTransaction>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    transactions: Vec<Value>,
}

impl Block {
    pub fn from_rpc(raw: Value) -> Result<Self, RpcError> {
        let parsed: RpcBlock = serde_json::from_value(raw)?;
        let transactions = parsed
            .transactions
            .into_iter()
            .map(|tx| {
                if tx.is_string() {
                    return Err(RpcError::InvalidResponse(
                        "Block contains transaction hashes instead of full objects".to_string(),
                    ));
                }
                ChainTransaction::from_rpc(tx)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            number: parse_hex_to_u64(&parsed.number)?,
            hash: parsed.hash.unwrap_or_default(),
            transactions,
        })
    }
}

/// One receipt log entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub log_index: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

pub fn parse_hex_to_u64(hex_str: &str) -> Result<u64, RpcError> {
    let hex_without_prefix = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    u64::from_str_radix(hex_without_prefix, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse hex '{}' to u64: {}", hex_str, e)))
}
