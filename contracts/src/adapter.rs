//! Chain submission adapter

use crate::errors::ChainResult;
use async_trait::async_trait;
use secretbox_fhe::EncryptedInput;
use secretbox_primitives::{Address, Handle, TxHash};

/// Capability the session uses to talk to the SecretBox contract.
///
/// Retry and timeout policy belongs to the implementation; callers await each
/// operation to completion.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Read `numberOfBoxes()`
    async fn number_of_boxes(&self) -> ChainResult<u8>;

    /// Simulate `openBox` from `from` and return the result handle it would
    /// produce. Never mutates chain state.
    async fn predict_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<Handle>;

    /// Send the `openBox` transaction
    async fn submit_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<TxHash>;

    /// Wait until `tx` is final; errors on revert or unknown transaction
    async fn await_confirmation(&self, tx: &TxHash) -> ChainResult<()>;
}
