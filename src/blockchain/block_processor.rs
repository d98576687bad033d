use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::blockchain::transfer_classifier::{ClassifyError, TransferClassifier};
use crate::logging::{LogContext, MetricsLogger};
use crate::models::Block;
use crate::sink::EventSink;

/// What processing one block produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub transactions: usize,
    pub events: usize,
    /// Transactions whose ERC-20 check failed and was skipped
    pub skipped: usize,
    /// Shutdown was observed before the block was finished
    pub interrupted: bool,
}

/// Classifies every transaction of a block and forwards events to the sink
pub struct BlockProcessor {
    classifier: TransferClassifier,
    sink: Arc<EventSink>,
    shutdown: Arc<AtomicBool>,
}

impl BlockProcessor {
    pub fn new(classifier: TransferClassifier, sink: Arc<EventSink>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            classifier,
            sink,
            shutdown,
        }
    }

    pub fn chain(&self) -> &str {
        self.classifier.chain()
    }

    /// Transactions in block order; native event first, then ERC-20 events in log order
    pub async fn process_block(&self, block: &Block) -> BlockSummary {
        let started = Instant::now();
        let mut summary = BlockSummary {
            transactions: block.transactions.len(),
            ..BlockSummary::default()
        };

        for tx in &block.transactions {
            if self.shutdown.load(Ordering::Relaxed) {
                summary.interrupted = true;
                break;
            }

            if let Some(event) = self.classifier.classify_native(tx) {
                self.sink.dispatch(&event).await;
                summary.events += 1;
            }

            match self.classifier.classify_erc20(tx).await {
                Ok(events) => {
                    for event in &events {
                        self.sink.dispatch(event).await;
                    }
                    summary.events += events.len();
                }
                Err(ClassifyError::Interrupted) => {
                    summary.interrupted = true;
                    break;
                }
                Err(e) => {
                    LogContext::new("block_processor", "classify_erc20")
                        .with_chain(self.chain())
                        .with_block_number(block.number)
                        .with_transaction_hash(&tx.hash_hex())
                        .warn(&format!("Skipping transaction: {}", e));
                    summary.skipped += 1;
                }
            }
        }

        if !summary.interrupted {
            MetricsLogger::log_block_processed(
                self.chain(),
                block.number,
                summary.events as u32,
                started.elapsed().as_millis() as u64,
            );
        }

        summary
    }
}
