use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::blockchain::block_processor::BlockProcessor;
use crate::blockchain::rpc_client::ChainClient;
use crate::error::RpcError;
use crate::logging::LogContext;

/// Granularity at which a not-found wait notices shutdown
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Failed to fetch block {block}: {source}")]
    Fetch {
        block: u64,
        #[source]
        source: RpcError,
    },
}

/// Result of one poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Block processed; holds the new cursor
    Advanced(u64),
    /// The chain has not produced the block yet
    NotFound,
    /// Shutdown observed; the cursor did not move
    Interrupted,
}

/// Sequential block loop for one chain.
///
/// The cursor lives only in memory and starts at the configured block on every run.
pub struct BlockPoller {
    client: Arc<dyn ChainClient>,
    processor: BlockProcessor,
    cursor: u64,
    not_found_delay: Duration,
    shutdown: Arc<AtomicBool>,
}

impl BlockPoller {
    pub fn new(
        client: Arc<dyn ChainClient>,
        processor: BlockProcessor,
        start_block: u64,
        not_found_delay: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            processor,
            cursor: start_block,
            not_found_delay,
            shutdown,
        }
    }

    /// Next block number to fetch
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn chain(&self) -> &str {
        self.processor.chain()
    }

    /// One Fetch, Classify, Advance cycle
    pub async fn step(&mut self) -> Result<Step, PollerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Ok(Step::Interrupted);
        }

        let block = match self.client.block_by_number(self.cursor).await {
            Ok(block) => block,
            Err(e) if e.is_block_not_found() => return Ok(Step::NotFound),
            Err(source) => {
                return Err(PollerError::Fetch {
                    block: self.cursor,
                    source,
                })
            }
        };

        let summary = self.processor.process_block(&block).await;
        if summary.interrupted {
            return Ok(Step::Interrupted);
        }

        self.cursor += 1;
        Ok(Step::Advanced(self.cursor))
    }

    /// Sleep the not-found delay in slices, returning early on shutdown
    async fn wait_for_block(&self) {
        let mut remaining = self.not_found_delay;
        while !remaining.is_zero() && !self.shutdown.load(Ordering::Relaxed) {
            let slice = remaining.min(SHUTDOWN_CHECK_INTERVAL);
            sleep(slice).await;
            remaining -= slice;
        }
    }

    /// Poll until shutdown or a fatal fetch error
    pub async fn run(&mut self) -> Result<(), PollerError> {
        let context = LogContext::new("block_poller", "run")
            .with_chain(self.chain())
            .with_block_number(self.cursor);
        context.info(&format!("Starting block poller at block {}", self.cursor));

        loop {
            match self.step().await {
                Ok(Step::Advanced(_)) => {}
                Ok(Step::NotFound) => {
                    LogContext::new("block_poller", "wait")
                        .with_chain(self.chain())
                        .with_block_number(self.cursor)
                        .debug("Block not produced yet, waiting");
                    self.wait_for_block().await;
                }
                Ok(Step::Interrupted) => {
                    LogContext::new("block_poller", "shutdown")
                        .with_chain(self.chain())
                        .with_block_number(self.cursor)
                        .info("Shutdown requested, stopping block poller");
                    return Ok(());
                }
                Err(e) => {
                    LogContext::new("block_poller", "fetch")
                        .with_chain(self.chain())
                        .with_block_number(self.cursor)
                        .error(&format!("Stopping block poller: {}", e));
                    return Err(e);
                }
            }
        }
    }
}
