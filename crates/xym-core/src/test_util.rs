//! Shared byte builders for `xym-core` tests.
//!
//! Produces wire-format transactions, blocks, receipts and statement files
//! so that unit tests, the integration tests and the binary's tests share
//! a single source of truth for synthetic chain data.

use crate::address::{Address, MAINNET};
use crate::block::{BlockType, DB_OFFSET_BYTES, HEADER_LEN};
use crate::codec::padded_size;
use crate::receipt::{ReceiptSource, ReceiptType};
use crate::transaction::TransactionType;
use crate::types::PublicKey;

/// Transfer payload of a single 99.78 XYM transfer to
/// `NAOTO55CLDBWQ4UG47RLCFMTKDZHUX2LGFZVJ7A` with an empty message.
pub const FIXTURE_TRANSFER_PAYLOAD: [u8; 48] = [
    0x68, 0x1d, 0x37, 0x77, 0xa2, 0x58, 0xc3, 0x68, 0x72, 0x86, 0xe7, 0xe2, 0xb1, 0x15, 0x93, 0x50,
    0xf2, 0x7a, 0x5f, 0x4b, 0x31, 0x73, 0x54, 0xfc, // recipient
    0x00, 0x00, // message size
    0x01, // mosaics count
    0x00, 0x00, 0x00, 0x00, 0x00, // reserved
    0xf8, 0x23, 0x02, 0xa2, 0x3f, 0x91, 0xed, 0x6b, // mosaic id
    0xa0, 0x85, 0xf2, 0x05, 0x00, 0x00, 0x00, 0x00, // amount
];

// ==============================================================================
// Key Helpers
// ==============================================================================

/// Create a deterministic public key from a single distinguishing byte.
pub fn public_key_from_byte(b: u8) -> PublicKey {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    bytes[31] = b;
    PublicKey(bytes)
}

/// Mainnet address of [`public_key_from_byte`].
pub fn address_from_byte(b: u8) -> Address {
    Address::from_public_key(&public_key_from_byte(b), MAINNET)
}

fn pad_to_eight(bytes: &mut Vec<u8>) {
    bytes.resize(padded_size(bytes.len()), 0);
}

// ==============================================================================
// Transaction Builders
// ==============================================================================

pub fn key_link_payload(linked: PublicKey, action: u8) -> Vec<u8> {
    let mut out = linked.as_bytes().to_vec();
    out.push(action);
    out
}

pub fn transfer_payload(recipient: [u8; 24], mosaics: &[(u64, u64)], message: &[u8]) -> Vec<u8> {
    let mut out = recipient.to_vec();
    out.extend_from_slice(&(message.len() as u16).to_le_bytes());
    out.push(mosaics.len() as u8);
    out.extend_from_slice(&[0; 5]);
    for &(id, amount) in mosaics {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&amount.to_le_bytes());
    }
    out.extend_from_slice(message);
    out
}

/// An embedded transaction (48-byte header + payload), unpadded.
pub fn embedded_tx(signer: PublicKey, tx_type: TransactionType, payload: &[u8]) -> Vec<u8> {
    let size = (48 + payload.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(signer.as_bytes());
    out.extend_from_slice(&[0; 4]);
    out.push(1);
    out.push(MAINNET);
    out.extend_from_slice(&tx_type.code().to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Aggregate payload wrapping `embedded` (each padded to 8 bytes) and a raw
/// cosignature blob.
pub fn aggregate_payload(embedded: &[Vec<u8>], cosignatures: &[u8]) -> Vec<u8> {
    let mut region = Vec::new();
    for tx in embedded {
        region.extend_from_slice(tx);
        pad_to_eight(&mut region);
    }
    let mut out = vec![0xAB; 32];
    out.extend_from_slice(&(region.len() as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&region);
    out.extend_from_slice(cosignatures);
    out
}

/// A top-level transaction (128-byte header + payload), unpadded.
pub fn top_level_tx(
    signer: PublicKey,
    tx_type: TransactionType,
    max_fee: u64,
    payload: &[u8],
) -> Vec<u8> {
    let size = (128 + payload.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&[0x5A; 64]);
    out.extend_from_slice(signer.as_bytes());
    out.extend_from_slice(&[0; 4]);
    out.push(1);
    out.push(MAINNET);
    out.extend_from_slice(&tx_type.code().to_le_bytes());
    out.extend_from_slice(&max_fee.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

// ==============================================================================
// Block Builders
// ==============================================================================

/// Header parameters for a synthetic block.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub height: u64,
    pub block_type: BlockType,
    pub signer: PublicKey,
    /// Defaults to the signer's own address.
    pub beneficiary: Option<Address>,
    pub fee_multiplier: u32,
    pub timestamp: u64,
    pub tx_hash_count: u32,
    pub merkle_root_count: u32,
}

impl BlockSpec {
    pub fn normal(height: u64) -> Self {
        Self {
            height,
            block_type: BlockType::Normal,
            signer: public_key_from_byte(0xB0),
            beneficiary: None,
            fee_multiplier: 0,
            timestamp: height * 30_000,
            tx_hash_count: 0,
            merkle_root_count: 0,
        }
    }
}

pub fn header_bytes(spec: &BlockSpec, footer_len: usize) -> Vec<u8> {
    let beneficiary = spec
        .beneficiary
        .unwrap_or_else(|| Address::from_public_key(&spec.signer, MAINNET));

    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(&((HEADER_LEN + footer_len) as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&[0x51; 64]);
    out.extend_from_slice(spec.signer.as_bytes());
    out.extend_from_slice(&[0; 4]);
    out.push(1);
    out.push(MAINNET);
    out.extend_from_slice(&spec.block_type.code().to_le_bytes());
    out.extend_from_slice(&spec.height.to_le_bytes());
    out.extend_from_slice(&spec.timestamp.to_le_bytes());
    out.extend_from_slice(&100_000_000_000_000u64.to_le_bytes());
    out.extend_from_slice(&[0x47; 80]);
    for fill in [0x01u8, 0x02, 0x03, 0x04] {
        out.extend_from_slice(&[fill; 32]);
    }
    out.extend_from_slice(beneficiary.as_bytes());
    out.extend_from_slice(&spec.fee_multiplier.to_le_bytes());
    out
}

/// A full block element: header, footer with the given (unpadded)
/// top-level transactions, and trailer.
pub fn block_bytes(spec: &BlockSpec, transactions: &[Vec<u8>]) -> Vec<u8> {
    let mut footer = if spec.block_type == BlockType::Normal {
        vec![0; 4]
    } else {
        let mut prefix = Vec::with_capacity(52);
        prefix.extend_from_slice(&0u32.to_le_bytes());
        prefix.extend_from_slice(&0u64.to_le_bytes());
        prefix.extend_from_slice(&0u64.to_le_bytes());
        prefix.extend_from_slice(&[0x11; 32]);
        prefix
    };
    for tx in transactions {
        footer.extend_from_slice(tx);
        pad_to_eight(&mut footer);
    }

    let mut out = header_bytes(spec, footer.len());
    out.extend_from_slice(&footer);
    out.extend_from_slice(&[spec.height as u8; 32]);
    out.extend_from_slice(&[0x66; 32]);
    out.extend_from_slice(&spec.tx_hash_count.to_le_bytes());
    out.extend(std::iter::repeat(0x77).take(spec.tx_hash_count as usize * 64));
    out.extend_from_slice(&spec.merkle_root_count.to_le_bytes());
    out.extend(std::iter::repeat(0x88).take(spec.merkle_root_count as usize * 32));
    out
}

/// A block file: the store offset pad followed by `blocks`.
pub fn block_file(blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0; DB_OFFSET_BYTES];
    for block in blocks {
        out.extend_from_slice(block);
    }
    out
}

// ==============================================================================
// Receipt Builders
// ==============================================================================

pub fn receipt_bytes(receipt_type: ReceiptType, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&((8 + payload.len()) as u32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&receipt_type.code().to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn balance_change_receipt(
    receipt_type: ReceiptType,
    mosaic_id: u64,
    amount: u64,
    target: [u8; 24],
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(40);
    payload.extend_from_slice(&mosaic_id.to_le_bytes());
    payload.extend_from_slice(&amount.to_le_bytes());
    payload.extend_from_slice(&target);
    receipt_bytes(receipt_type, &payload)
}

pub fn balance_transfer_receipt(
    receipt_type: ReceiptType,
    mosaic_id: u64,
    amount: u64,
    sender: [u8; 24],
    recipient: [u8; 24],
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64);
    payload.extend_from_slice(&mosaic_id.to_le_bytes());
    payload.extend_from_slice(&amount.to_le_bytes());
    payload.extend_from_slice(&sender);
    payload.extend_from_slice(&recipient);
    receipt_bytes(receipt_type, &payload)
}

pub fn transaction_group_receipt(source: ReceiptSource, receipts: &[Vec<u8>]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&source.primary_id.to_le_bytes());
    payload.extend_from_slice(&source.secondary_id.to_le_bytes());
    payload.extend_from_slice(&(receipts.len() as u32).to_le_bytes());
    for receipt in receipts {
        payload.extend_from_slice(receipt);
    }
    receipt_bytes(ReceiptType::TransactionGroup, &payload)
}

// ==============================================================================
// Statement Builders
// ==============================================================================

/// Contents of one statement triple. Receipts are pre-encoded bytes.
#[derive(Debug, Clone, Default)]
pub struct StatementSpec {
    pub transaction_statements: Vec<(ReceiptSource, Vec<Vec<u8>>)>,
    pub address_resolutions: Vec<([u8; 24], Vec<(ReceiptSource, [u8; 24])>)>,
    pub mosaic_resolutions: Vec<(u64, Vec<(ReceiptSource, u64)>)>,
}

impl StatementSpec {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A group holding one transaction statement with `receipts`.
    pub fn with_receipts(receipts: Vec<Vec<u8>>) -> Self {
        Self {
            transaction_statements: vec![(
                ReceiptSource {
                    primary_id: 0,
                    secondary_id: 0,
                },
                receipts,
            )],
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let push_source = |out: &mut Vec<u8>, source: &ReceiptSource| {
            out.extend_from_slice(&source.primary_id.to_le_bytes());
            out.extend_from_slice(&source.secondary_id.to_le_bytes());
        };

        out.extend_from_slice(&(self.transaction_statements.len() as u32).to_le_bytes());
        for (source, receipts) in &self.transaction_statements {
            push_source(&mut out, source);
            out.extend_from_slice(&(receipts.len() as u32).to_le_bytes());
            for receipt in receipts {
                out.extend_from_slice(receipt);
            }
        }

        out.extend_from_slice(&(self.address_resolutions.len() as u32).to_le_bytes());
        for (unresolved, entries) in &self.address_resolutions {
            out.extend_from_slice(unresolved);
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            for (source, resolved) in entries {
                push_source(&mut out, source);
                out.extend_from_slice(resolved);
            }
        }

        out.extend_from_slice(&(self.mosaic_resolutions.len() as u32).to_le_bytes());
        for (unresolved, entries) in &self.mosaic_resolutions {
            out.extend_from_slice(&unresolved.to_le_bytes());
            out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
            for (source, resolved) in entries {
                push_source(&mut out, source);
                out.extend_from_slice(&resolved.to_le_bytes());
            }
        }
        out
    }
}

/// A statement file: the store offset pad followed by `groups`.
pub fn statement_file(groups: &[StatementSpec]) -> Vec<u8> {
    let mut out = vec![0; DB_OFFSET_BYTES];
    for group in groups {
        out.extend_from_slice(&group.to_bytes());
    }
    out
}
