//! SecretBox contract bindings
//!
//! Everything the session needs to reach the deployed SecretBox contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              openBox Submission Flow                 │
//! ├─────────────────────────────────────────────────────┤
//! │  EncryptedInput (handle + proof)                    │
//! │      ↓                                              │
//! │  ABI (selector + head/tail encoded calldata)        │
//! │      ↓                                              │
//! │  ChainAdapter: predict → submit → await_confirmation│
//! │      ↓                                              │
//! │  InMemoryChain | RpcChain                           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Contract surface
//!
//! - `openBox(bytes32 choiceEncrypted, bytes inputProof) returns (bytes32)`
//! - `numberOfBoxes() view returns (uint8)`

pub mod abi;
pub mod adapter;
pub mod errors;
pub mod memory;
pub mod rpc;

// Re-export main types
pub use abi::{ABIDecoder, ABIEncoder, ABIType, ABIValue, ContractABI, FunctionABI};
pub use adapter::ChainAdapter;
pub use errors::{ChainError, ChainResult};
pub use memory::{ChainOp, InMemoryChain};
pub use rpc::{RpcChain, RpcChainConfig};
