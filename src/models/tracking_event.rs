use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value movement a tracking event describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Native,
    Erc20,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Native => "native",
            TransferKind::Erc20 => "erc20",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(TransferKind::Native),
            "erc20" => Ok(TransferKind::Erc20),
            other => Err(format!("unknown transfer kind '{}'", other)),
        }
    }
}

/// A transfer that touched a tracked address, ready to be persisted and announced.
///
/// Addresses and hashes are lowercase `0x`-prefixed hex. `from` is empty when the
/// sender could not be recovered; `token` is empty for native transfers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackingEvent {
    pub transaction_hash: String,
    pub kind: TransferKind,
    pub from: String,
    pub to: String,
    pub chain: String,
    pub token: String,
    pub symbol: String,
    pub amount: String,
}

impl TrackingEvent {
    pub fn is_native(&self) -> bool {
        self.kind == TransferKind::Native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TransferKind::Native).unwrap(), "\"native\"");
        assert_eq!(serde_json::to_string(&TransferKind::Erc20).unwrap(), "\"erc20\"");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("native".parse::<TransferKind>(), Ok(TransferKind::Native));
        assert_eq!("ERC20".parse::<TransferKind>(), Ok(TransferKind::Erc20));
        assert!("nft".parse::<TransferKind>().is_err());
    }

    #[test]
    fn test_event_json_shape() {
        let event = TrackingEvent {
            transaction_hash: "0xabc".to_string(),
            kind: TransferKind::Erc20,
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: "0x2222222222222222222222222222222222222222".to_string(),
            chain: "ethereum".to_string(),
            token: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            symbol: "USDT".to_string(),
            amount: "1.5".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "erc20");
        assert_eq!(json["amount"], "1.5");
        assert!(!event.is_native());
    }
}
