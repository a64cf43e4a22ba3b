//! In-memory SecretBox chain
//!
//! Executes `openBox` calldata against a local table of transactions. Result
//! handles are derived from the sender, its nonce and the encrypted input, so
//! a prediction made before submission matches the handle the submitted
//! transaction produces.

use crate::abi::{self, ABIValue, ContractABI, OPEN_BOX};
use crate::adapter::ChainAdapter;
use crate::errors::{ChainError, ChainResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use secretbox_fhe::EncryptedInput;
use secretbox_primitives::{Address, Handle, TxHash};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::time::Duration;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainOp {
    NumberOfBoxes,
    Predict,
    Submit,
    Confirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxStatus {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone)]
struct TxRecord {
    from: Address,
    handle: Handle,
    status: TxStatus,
}

#[derive(Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    transactions: HashMap<TxHash, TxRecord>,
    opens: HashMap<Address, u32>,
    failures: HashMap<ChainOp, String>,
}

/// Local chain holding one SecretBox deployment
pub struct InMemoryChain {
    contract: Address,
    number_of_boxes: u8,
    confirm_delay: Duration,
    abi: ContractABI,
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    pub fn new(contract: Address, number_of_boxes: u8) -> Self {
        Self {
            contract,
            number_of_boxes,
            confirm_delay: Duration::ZERO,
            abi: ContractABI::secret_box(),
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Delay applied by `await_confirmation`
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    /// Make every call of `op` fail with `message` until cleared
    pub fn fail(&self, op: ChainOp, message: impl Into<String>) {
        self.state.lock().failures.insert(op, message.into());
    }

    pub fn clear_failure(&self, op: ChainOp) {
        self.state.lock().failures.remove(&op);
    }

    /// Confirmed `openBox` calls made by `from`
    pub fn opens(&self, from: &Address) -> u32 {
        self.state.lock().opens.get(from).copied().unwrap_or(0)
    }

    /// Number of submitted transactions
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    /// Handle produced by a submitted transaction
    pub fn result_handle(&self, tx: &TxHash) -> Option<Handle> {
        self.state.lock().transactions.get(tx).map(|r| r.handle)
    }

    pub fn is_confirmed(&self, tx: &TxHash) -> bool {
        self.state
            .lock()
            .transactions
            .get(tx)
            .map(|r| r.status == TxStatus::Confirmed)
            .unwrap_or(false)
    }

    fn check_failure(state: &ChainState, op: ChainOp) -> Option<String> {
        state.failures.get(&op).cloned()
    }

    /// Run `openBox` calldata through the ABI and return (choice, proof)
    fn execute_open_box(&self, input: &EncryptedInput) -> ChainResult<(Handle, Vec<u8>)> {
        let calldata = abi::encode_open_box(&self.abi, input)?;
        let (function, params) = abi::decode_function_call(&self.abi, &calldata)?;
        if function.name != OPEN_BOX {
            return Err(ChainError::CallFailed(format!("unexpected call {}", function.name)));
        }
        let choice = match &params[0] {
            ABIValue::Bytes32(bytes) => Handle(*bytes),
            other => {
                return Err(ChainError::ABIDecodingError(format!("bad choice {other:?}")));
            }
        };
        Ok((choice, params[1].as_bytes()?.to_vec()))
    }

    fn derive_handle(&self, from: &Address, nonce: u64, choice: &Handle, proof: &[u8]) -> Handle {
        let mut hasher = Keccak256::new();
        hasher.update(self.contract.as_bytes());
        hasher.update(from.as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(choice.as_bytes());
        hasher.update(proof);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Handle(out)
    }

    fn derive_tx_hash(&self, from: &Address, nonce: u64) -> TxHash {
        let mut hasher = Keccak256::new();
        hasher.update(b"tx");
        hasher.update(from.as_bytes());
        hasher.update(nonce.to_be_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        TxHash(out)
    }
}

#[async_trait]
impl ChainAdapter for InMemoryChain {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn number_of_boxes(&self) -> ChainResult<u8> {
        if let Some(message) = Self::check_failure(&self.state.lock(), ChainOp::NumberOfBoxes) {
            return Err(ChainError::CallFailed(message));
        }
        Ok(self.number_of_boxes)
    }

    async fn predict_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<Handle> {
        let (choice, proof) = self.execute_open_box(input)?;
        let state = self.state.lock();
        if let Some(message) = Self::check_failure(&state, ChainOp::Predict) {
            return Err(ChainError::CallFailed(message));
        }
        let nonce = state.nonces.get(from).copied().unwrap_or(0);
        Ok(self.derive_handle(from, nonce, &choice, &proof))
    }

    async fn submit_open_box(&self, from: &Address, input: &EncryptedInput) -> ChainResult<TxHash> {
        let (choice, proof) = self.execute_open_box(input)?;
        let mut state = self.state.lock();
        if let Some(message) = Self::check_failure(&state, ChainOp::Submit) {
            return Err(ChainError::SubmissionFailed(message));
        }

        let nonce = state.nonces.get(from).copied().unwrap_or(0);
        let handle = self.derive_handle(from, nonce, &choice, &proof);
        let tx = self.derive_tx_hash(from, nonce);
        state.nonces.insert(*from, nonce + 1);
        state.transactions.insert(
            tx,
            TxRecord {
                from: *from,
                handle,
                status: TxStatus::Pending,
            },
        );

        tracing::debug!(%from, %tx, %handle, "openBox submitted");
        Ok(tx)
    }

    async fn await_confirmation(&self, tx: &TxHash) -> ChainResult<()> {
        {
            let state = self.state.lock();
            if !state.transactions.contains_key(tx) {
                return Err(ChainError::UnknownTransaction(tx.to_hex()));
            }
            if let Some(message) = Self::check_failure(&state, ChainOp::Confirm) {
                return Err(ChainError::Reverted(format!("{tx} ({message})")));
            }
        }

        if !self.confirm_delay.is_zero() {
            tokio::time::sleep(self.confirm_delay).await;
        }

        let mut state = self.state.lock();
        let from = match state.transactions.get_mut(tx) {
            Some(record) if record.status == TxStatus::Pending => {
                record.status = TxStatus::Confirmed;
                Some(record.from)
            }
            Some(_) => None,
            None => return Err(ChainError::UnknownTransaction(tx.to_hex())),
        };
        if let Some(from) = from {
            *state.opens.entry(from).or_insert(0) += 1;
            tracing::debug!(%tx, "openBox confirmed");
        }
        Ok(())
    }
}
