//! Article resolution
//!
//! The read path: reload the ledger, walk it newest-first, fetch each article's
//! content through the gateways and map it into a card. A block whose content
//! cannot be fetched still yields a card built from its own payload, so gateway
//! outages degrade the output instead of failing the call.

use crate::blockchain::{Block, SharedLedger};
use crate::card::{Card, CardMapper, CONTENT_URL_KEY};
use crate::config::Config;
use crate::error::LedgerError;
use crate::gateway::{FetchOutcome, GatewayFetcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

pub const DEFAULT_LIST_LIMIT: usize = 15;
/// Blocks whose content is fetched at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Response shape of `list` and `all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardList {
    pub count: usize,
    pub items: Vec<Card>,
}

impl From<Vec<Card>> for CardList {
    fn from(items: Vec<Card>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

#[derive(Clone)]
pub struct Resolver {
    ledger: SharedLedger,
    fetcher: GatewayFetcher,
    mapper: CardMapper,
    default_limit: usize,
    concurrency: usize,
}

impl Resolver {
    pub fn new(ledger: SharedLedger, fetcher: GatewayFetcher, mapper: CardMapper) -> Self {
        Self {
            ledger,
            fetcher,
            mapper,
            default_limit: DEFAULT_LIST_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn from_config(ledger: SharedLedger, config: &Config) -> Result<Self, LedgerError> {
        let fetcher = GatewayFetcher::from_config(&config.gateway)?;
        let mapper = CardMapper::from_config(&config.resolver);
        Ok(Self::new(ledger, fetcher, mapper)
            .with_default_limit(config.resolver.default_limit)
            .with_concurrency(config.resolver.concurrency))
    }

    /// A zero limit keeps the current default.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.default_limit = limit;
        }
        self
    }

    /// A zero width keeps the current one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        if concurrency > 0 {
            self.concurrency = concurrency;
        }
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    /// Card for the newest block carrying a content identifier, or `None`
    /// when no such block exists.
    pub async fn latest(&self) -> Option<Card> {
        let mut cards = self.resolve(self.eligible_blocks(Some(1)).await).await;
        cards.pop()
    }

    /// Up to `limit` cards, newest first. `None` or zero selects the default limit.
    pub async fn list(&self, limit: Option<usize>) -> CardList {
        let limit = limit.filter(|l| *l > 0).unwrap_or(self.default_limit);
        self.resolve(self.eligible_blocks(Some(limit)).await).await.into()
    }

    /// Every eligible card, newest first.
    pub async fn all(&self) -> CardList {
        self.resolve(self.eligible_blocks(None).await).await.into()
    }

    /// Raw content object for `cid` from the configured gateways.
    pub async fn article(&self, cid: &str) -> Option<Value> {
        self.fetcher.fetch(cid, None).await.content()
    }

    /// Reloads the ledger and picks blocks with a content identifier, newest first.
    async fn eligible_blocks(&self, limit: Option<usize>) -> Vec<(Block, String)> {
        let snapshot = {
            let mut ledger = self.ledger.write().await;
            ledger.reload();
            ledger.snapshot()
        };

        let eligible = snapshot.into_iter().rev().filter_map(|block| {
            match self.mapper.content_id(&block) {
                Some(cid) => Some((block, cid)),
                None => {
                    debug!(index = block.index, "skipping block without content identifier");
                    None
                }
            }
        });

        match limit {
            Some(limit) => eligible.take(limit).collect(),
            None => eligible.collect(),
        }
    }

    /// Fetches at most `concurrency` blocks at once; output keeps the input order.
    async fn resolve(&self, blocks: Vec<(Block, String)>) -> Vec<Card> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let tasks: Vec<_> = blocks
            .into_iter()
            .map(|(block, cid)| {
                let fetcher = self.fetcher.clone();
                let mapper = self.mapper.clone();
                let permits = permits.clone();
                let fallback = block.clone();
                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    resolve_block(&fetcher, &mapper, &block, cid).await
                });
                (handle, fallback)
            })
            .collect();

        let mut cards = Vec::with_capacity(tasks.len());
        for (handle, fallback) in tasks {
            match handle.await {
                Ok(card) => cards.push(card),
                Err(e) => {
                    warn!(index = fallback.index, error = %e, "card task failed; using block data");
                    cards.push(self.mapper.from_block(&fallback));
                }
            }
        }
        cards
    }
}

async fn resolve_block(
    fetcher: &GatewayFetcher,
    mapper: &CardMapper,
    block: &Block,
    cid: String,
) -> Card {
    match fetcher.fetch(&cid, block.data_str(CONTENT_URL_KEY)).await {
        FetchOutcome::Found { content, .. } if content.is_object() => {
            let mut card = mapper.from_content(&content, Some(block));
            card.metadata_hash = Some(cid);
            card
        }
        FetchOutcome::Found { url, .. } => {
            warn!(index = block.index, url = %url, "content is not a JSON object; using block data");
            mapper.from_block(block)
        }
        FetchOutcome::Exhausted { .. } => {
            warn!(index = block.index, cid = %cid, "content unavailable; using block data");
            mapper.from_block(block)
        }
    }
}
