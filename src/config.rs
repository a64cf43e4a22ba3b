//! Deployment constants and session configuration

use secretbox_primitives::Address;

/// Sepolia
pub const CHAIN_ID: u64 = 11_155_111;

/// Deployed SecretBox contract (`0xccc5f7093d37b8cF6C2F2522E67cd59a02AD90bE`)
pub const CONTRACT_ADDRESS: Address = Address::new([
    0xcc, 0xc5, 0xf7, 0x09, 0x3d, 0x37, 0xb8, 0xcf, 0x6c, 0x2f, 0x25, 0x22, 0xe6, 0x7c, 0xd5,
    0x9a, 0x02, 0xad, 0x90, 0xbe,
]);

/// Boxes one identity may open
pub const MAX_OPENS: u32 = 3;

/// Message stored when the open limit blocks a new session
pub const LIMIT_REACHED_MESSAGE: &str = "Open limit reached";

/// Message stored when a stage fails without a description
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// What every session of one deployment shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub chain_id: u64,
    pub contract: Address,
    pub max_opens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_ID,
            contract: CONTRACT_ADDRESS,
            max_opens: MAX_OPENS,
        }
    }
}

impl SessionConfig {
    /// Same deployment, different contract address
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }
}
