use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::str::FromStr;
use std::time::Duration;

use evm_transfer_tracker::blockchain::transfer_classifier::{encode_symbol_return, encode_transfer_log};
use evm_transfer_tracker::blockchain::{
    BlockPoller, BlockProcessor, ChainClient, ChainContext, PollerError, ReportedSender, SignerSet, Step,
    TransferClassifier,
};
use evm_transfer_tracker::database::Database;
use evm_transfer_tracker::error::{NotifyError, RpcError};
use evm_transfer_tracker::models::{
    Block, ChainTracking, ChainTransaction, RawLog, TrackedRegistry, TransactionReceipt,
};
use evm_transfer_tracker::sink::{EventSink, Notifier};

const CHAIN: &str = "ethereum";

fn tracked() -> Address {
    Address::repeat_byte(0xaa)
}

fn stranger() -> Address {
    Address::repeat_byte(0xbb)
}

fn usdt() -> Address {
    Address::repeat_byte(0xcc)
}

/// Sender of the signed EIP-1559 fixture below
fn signer() -> Address {
    Address::from_str("0x2c7536e3605d9c16a7a3d7b1898e529396a65c23").unwrap()
}

/// Chain with a fixed set of produced blocks
#[derive(Default)]
struct MockChain {
    blocks: HashMap<u64, Block>,
    /// Blocks reported missing for the given number of fetches before they appear
    late_blocks: Mutex<HashMap<u64, (u32, Block)>>,
    receipts: HashMap<B256, Vec<RawLog>>,
    failing_receipts: Vec<B256>,
    broken_block: Option<u64>,
    symbol: String,
    fetched: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(1)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        self.fetched.lock().unwrap().push(number);
        if let Some((misses, block)) = self.late_blocks.lock().unwrap().get_mut(&number) {
            if *misses == 0 {
                return Ok(block.clone());
            }
            *misses -= 1;
            return Err(RpcError::BlockNotFound { block_number: number });
        }
        if self.broken_block == Some(number) {
            return Err(RpcError::Method {
                code: -32000,
                message: "header not found".to_string(),
            });
        }
        self.blocks
            .get(&number)
            .cloned()
            .ok_or(RpcError::BlockNotFound { block_number: number })
    }

    async fn transaction_receipt(&self, hash: B256) -> Result<TransactionReceipt, RpcError> {
        if self.failing_receipts.contains(&hash) {
            return Err(RpcError::Timeout { seconds: 30 });
        }
        Ok(TransactionReceipt {
            transaction_hash: hash,
            logs: self.receipts.get(&hash).cloned().unwrap_or_default(),
        })
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, RpcError> {
        Ok(encode_symbol_return(&self.symbol))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    poller: BlockPoller,
    database: Arc<Database>,
    notifier: Arc<RecordingNotifier>,
    shutdown: Arc<AtomicBool>,
}

fn harness(chain: MockChain, start_block: u64) -> Harness {
    harness_with(
        chain,
        start_block,
        Duration::from_millis(10),
        SignerSet::empty().with_fallback(Arc::new(ReportedSender)),
    )
}

fn harness_with(chain: MockChain, start_block: u64, not_found_delay: Duration, signers: SignerSet) -> Harness {
    let database = Arc::new(Database::new_in_memory().expect("Failed to create test database"));
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let registry = TrackedRegistry::default()
        .with_chain(
            CHAIN,
            ChainTracking::new(
                [format!("{:#x}", tracked()), format!("{:#x}", signer())],
                [format!("{:#x}", usdt())],
            ),
        )
        .unwrap();

    let mut decimals = HashMap::new();
    decimals.insert(format!("{:#x}", usdt()), 6u8);
    let mut overrides = HashMap::new();
    overrides.insert(format!("{:#x}", usdt()), "USDT".to_string());

    let client: Arc<dyn ChainClient> = Arc::new(chain);
    let classifier = TransferClassifier::new(
        ChainContext {
            label: CHAIN.to_string(),
            chain_id: 1,
            native_symbol: "ETH".to_string(),
            token_decimals: decimals,
        },
        Arc::new(registry),
        signers,
        client.clone(),
        shutdown.clone(),
    )
    .unwrap();

    let sink = EventSink::new(database.clone(), notifier.clone()).with_symbol_overrides(CHAIN, overrides);
    let processor = BlockProcessor::new(classifier, Arc::new(sink), shutdown.clone());
    let poller = BlockPoller::new(
        client,
        processor,
        start_block,
        not_found_delay,
        shutdown.clone(),
    );

    Harness {
        poller,
        database,
        notifier,
        shutdown,
    }
}

fn transaction(hash: u8, from: Address, to: Address, value: U256) -> ChainTransaction {
    ChainTransaction {
        hash: B256::repeat_byte(hash),
        tx_type: 2,
        chain_id: Some(1),
        to: Some(to),
        value,
        reported_from: Some(from),
        raw: serde_json::Value::Null,
    }
}

fn block(number: u64, transactions: Vec<ChainTransaction>) -> Block {
    Block {
        number,
        hash: format!("0x{:064x}", number),
        transactions,
    }
}

#[tokio::test]
async fn test_empty_block_advances_cursor() {
    let mut chain = MockChain::default();
    chain.blocks.insert(100, block(100, vec![]));
    let mut h = harness(chain, 100);

    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(101));
    assert_eq!(h.poller.cursor(), 101);
    assert_eq!(h.database.event_count().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_block_keeps_cursor() {
    let mut h = harness(MockChain::default(), 100);

    assert_eq!(h.poller.step().await.unwrap(), Step::NotFound);
    assert_eq!(h.poller.cursor(), 100);
}

#[tokio::test]
async fn test_fetch_error_is_fatal() {
    let chain = MockChain {
        broken_block: Some(100),
        ..MockChain::default()
    };
    let mut h = harness(chain, 100);

    match h.poller.step().await {
        Err(PollerError::Fetch { block, .. }) => assert_eq!(block, 100),
        other => panic!("expected fetch error, got {:?}", other),
    }
    assert!(h.poller.run().await.is_err());
    assert_eq!(h.poller.cursor(), 100);
}

#[tokio::test]
async fn test_shutdown_interrupts_without_advancing() {
    let mut chain = MockChain::default();
    chain.blocks.insert(100, block(100, vec![]));
    let mut h = harness(chain, 100);
    h.shutdown.store(true, Ordering::Relaxed);

    assert_eq!(h.poller.step().await.unwrap(), Step::Interrupted);
    assert_eq!(h.poller.cursor(), 100);
    assert!(h.poller.run().await.is_ok());
}

#[tokio::test]
async fn test_native_and_erc20_events_dispatched_in_order() {
    let native = transaction(
        0x01,
        tracked(),
        stranger(),
        U256::from(2_000_000_000_000_000_000u128),
    );
    let token_tx = transaction(0x02, stranger(), usdt(), U256::ZERO);

    let mut chain = MockChain {
        symbol: "USD₮0".to_string(),
        ..MockChain::default()
    };
    chain.receipts.insert(
        token_tx.hash,
        vec![encode_transfer_log(usdt(), stranger(), tracked(), U256::from(2_500_000u64))],
    );
    chain.blocks.insert(100, block(100, vec![native, token_tx]));
    chain.blocks.insert(101, block(101, vec![]));
    let mut h = harness(chain, 100);

    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(101));
    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(102));
    assert_eq!(h.poller.step().await.unwrap(), Step::NotFound);

    let rows = h.database.list_events(1, 10).unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].kind, "native");
    assert_eq!(rows[0].amount, "2");
    assert_eq!(rows[0].symbol, "ETH");
    assert_eq!(rows[0].from_address, format!("{:#x}", tracked()));
    assert_eq!(rows[0].token_address, "");

    assert_eq!(rows[1].kind, "erc20");
    assert_eq!(rows[1].amount, "2.5");
    assert_eq!(rows[1].symbol, "USD₮0");
    assert_eq!(rows[1].to_address, format!("{:#x}", tracked()));
    assert_eq!(rows[1].token_address, format!("{:#x}", usdt()));

    let messages = h.notifier.messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("Transferring 2 ETH"));
    assert!(messages[1].contains("Transferring 2.5 USDT"));
    assert!(messages[1].starts_with("Chain: ethereum\nTransaction: 0x0202"));
}

#[tokio::test]
async fn test_receipt_failure_skips_transaction_but_advances() {
    let native = transaction(0x03, stranger(), tracked(), U256::from(1_000_000_000_000_000u64));
    let mut chain = MockChain::default();
    chain.failing_receipts.push(native.hash);
    chain.blocks.insert(7, block(7, vec![native]));
    let mut h = harness(chain, 7);

    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(8));

    // Native transfer is dispatched before the receipt is fetched
    let rows = h.database.list_events(1, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, "0.001");
}

#[tokio::test]
async fn test_untracked_transfers_are_ignored() {
    let token_tx = transaction(0x04, stranger(), usdt(), U256::from(5u64));
    let mut chain = MockChain {
        symbol: "USDT".to_string(),
        ..MockChain::default()
    };
    chain.receipts.insert(
        token_tx.hash,
        vec![encode_transfer_log(usdt(), stranger(), Address::repeat_byte(0xee), U256::from(9u64))],
    );
    chain.blocks.insert(1, block(1, vec![token_tx]));
    let mut h = harness(chain, 1);

    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(2));
    assert_eq!(h.database.event_count().unwrap(), 0);
    assert!(h.notifier.messages.lock().unwrap().is_empty());
}

/// Polls `condition` until it holds, for at most five seconds
async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_run_retries_same_block_until_it_appears() {
    let native = transaction(0x05, tracked(), stranger(), U256::from(3_000_000_000_000_000_000u128));
    let chain = MockChain::default();
    chain.late_blocks.lock().unwrap().insert(50, (1, block(50, vec![native])));
    let fetched = Arc::clone(&chain.fetched);
    let Harness {
        mut poller,
        database,
        shutdown,
        ..
    } = harness(chain, 50);

    let handle = tokio::spawn(async move {
        let result = poller.run().await;
        (poller, result)
    });

    eventually(|| fetched.lock().unwrap().contains(&51)).await;
    shutdown.store(true, Ordering::Relaxed);
    let (poller, result) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(result.is_ok());
    assert_eq!(poller.cursor(), 51);
    assert_eq!(&fetched.lock().unwrap()[..3], &[50, 50, 51]);

    let rows = database.list_events(1, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount, "3");
}

#[tokio::test]
async fn test_shutdown_cuts_not_found_wait_short() {
    let chain = MockChain::default();
    let fetched = Arc::clone(&chain.fetched);
    let Harness {
        mut poller,
        shutdown,
        ..
    } = harness_with(
        chain,
        10,
        Duration::from_secs(300),
        SignerSet::empty().with_fallback(Arc::new(ReportedSender)),
    );

    let handle = tokio::spawn(async move { poller.run().await });

    eventually(|| !fetched.lock().unwrap().is_empty()).await;
    shutdown.store(true, Ordering::Relaxed);

    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller kept sleeping after shutdown")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(fetched.lock().unwrap().as_slice(), &[10]);
}

#[tokio::test]
async fn test_standard_signers_resolve_eip1559_sender() {
    // Node-reported block entry, including fields added by the node
    let signed = ChainTransaction::from_rpc(serde_json::json!({
        "blockHash": "0x8e38b4dbf6b11fcc3b9dee84fb7986e29ca0a02cecd8977c161ff7333329681e",
        "blockNumber": "0x112a880",
        "transactionIndex": "0x3",
        "from": "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23",
        "gasPrice": "0x4a817c800",
        "hash": "0x6f4d5244965a20ed8a05fc61f27914e85734900ee9a0c52a267657640f5c2eae",
        "type": "0x2",
        "chainId": "0x1",
        "nonce": "0x7",
        "maxPriorityFeePerGas": "0x3b9aca00",
        "maxFeePerGas": "0x6fc23ac00",
        "gas": "0x5208",
        "to": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb",
        "value": "0x14d1120d7b160000",
        "input": "0x",
        "accessList": [],
        "v": "0x1",
        "yParity": "0x1",
        "r": "0x5bc9534f3e300383cd71415c5a462adbff7aa91fb02f4787399c351bd3d93c8a",
        "s": "0x277322a8889dbda39f90eeebe542d1fdeb0a5c2c281b12bd1ccc43318e5715ab"
    }))
    .unwrap();

    let mut chain = MockChain::default();
    chain.blocks.insert(18_000_000, block(18_000_000, vec![signed]));
    let mut h = harness_with(chain, 18_000_000, Duration::from_millis(10), SignerSet::standard());

    assert_eq!(h.poller.step().await.unwrap(), Step::Advanced(18_000_001));

    let rows = h.database.list_events(1, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "native");
    assert_eq!(rows[0].from_address, format!("{:#x}", signer()));
    assert_eq!(rows[0].to_address, format!("{:#x}", stranger()));
    assert_eq!(rows[0].amount, "1.5");
    assert_eq!(
        rows[0].transaction_hash,
        "0x6f4d5244965a20ed8a05fc61f27914e85734900ee9a0c52a267657640f5c2eae"
    );
}
