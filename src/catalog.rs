//! Box catalog: the contract's `numberOfBoxes`, cached after the first
//! successful read

use secretbox_contracts::{ChainAdapter, ChainResult};
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Default)]
pub struct BoxCatalog {
    number_of_boxes: AtomicU8,
}

impl BoxCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with a known box count
    pub fn with_boxes(number_of_boxes: u8) -> Self {
        Self {
            number_of_boxes: AtomicU8::new(number_of_boxes),
        }
    }

    /// Cached value; zero while unknown
    pub fn number_of_boxes(&self) -> u8 {
        self.number_of_boxes.load(Ordering::Acquire)
    }

    pub fn is_known(&self) -> bool {
        self.number_of_boxes() != 0
    }

    /// Read `numberOfBoxes` from the chain and cache it.
    ///
    /// On failure the cached value is left untouched.
    pub async fn refresh(&self, chain: &dyn ChainAdapter) -> ChainResult<u8> {
        match chain.number_of_boxes().await {
            Ok(n) => {
                self.number_of_boxes.store(n, Ordering::Release);
                tracing::debug!(number_of_boxes = n, "loaded box catalog");
                Ok(n)
            }
            Err(e) => {
                tracing::warn!(error = %e, stale = self.number_of_boxes(), "failed to load numberOfBoxes");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretbox_contracts::{ChainOp, InMemoryChain};
    use secretbox_primitives::Address;

    #[tokio::test]
    async fn test_refresh_caches() {
        let chain = InMemoryChain::new(Address([0xcc; 20]), 5);
        let catalog = BoxCatalog::new();
        assert!(!catalog.is_known());

        assert_eq!(catalog.refresh(&chain).await.unwrap(), 5);
        assert_eq!(catalog.number_of_boxes(), 5);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_value() {
        let chain = InMemoryChain::new(Address([0xcc; 20]), 5);
        chain.fail(ChainOp::NumberOfBoxes, "rpc down");

        let catalog = BoxCatalog::with_boxes(4);
        assert!(catalog.refresh(&chain).await.is_err());
        assert_eq!(catalog.number_of_boxes(), 4);
    }
}
