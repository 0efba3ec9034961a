use crate::address::Address;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("truncated {context}: needed {needed} bytes, {available} available")]
    Truncated {
        context: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("length mismatch for {context}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unknown transaction type: {0:#06x}")]
    UnknownTransactionType(u16),

    #[error("unknown receipt type: {0:#06x}")]
    UnknownReceiptType(u16),

    #[error("unknown block type: {0:#06x}")]
    UnknownBlockType(u16),

    #[error("unknown registration type for namespace registration: {0}")]
    InvalidRegistrationType(u8),

    #[error("invalid link action: {0}")]
    InvalidLinkAction(u8),

    #[error("aggregate transaction embedded inside another aggregate at position {0}")]
    NestedAggregate(u32),

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("statement/block integrity mismatch: {0}")]
    IntegrityMismatch(String),

    #[error("unlink of {linked} by {account} at height {height} has no open {category} interval")]
    UnlinkWithoutLink {
        account: Address,
        linked: Address,
        category: &'static str,
        height: u64,
    },

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("record stream error: {0}")]
    Record(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
