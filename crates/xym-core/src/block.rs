//! Block decoding.
//!
//! A block file is an 800-byte pad followed by consecutive block elements.
//! Each element is a 372-byte header, a footer (importance prefix plus
//! top-level transactions) sized by the header's `size` field, and a
//! trailer carrying the block and generation hashes, the per-transaction
//! hash pairs and the sub-cache merkle roots.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::{pack, unpack, FieldFormat, FieldValue, Record, Reader, Schema};
use crate::error::CoreError;
use crate::transaction::Transaction;
use crate::types::{GenerationHashProof, Hash256, PublicKey, Signature};

/// Number of pad bytes at the head of every block and statement file.
pub const DB_OFFSET_BYTES: usize = 800;

/// Size of the fixed block header.
pub const HEADER_LEN: usize = 372;

/// Network epoch (2021-03-16 00:06:25 UTC) as unix seconds. Block
/// timestamps are milliseconds since this instant.
pub const NETWORK_EPOCH_UNIX_SECS: u64 = 1_615_853_185;

/// Ordered wire layout of the block header.
pub const HEADER_SCHEMA: &Schema = &[
    ("size", FieldFormat::U32),
    ("verifiable_entity_reserved", FieldFormat::U32),
    ("signature", FieldFormat::Bytes(64)),
    ("signer_public_key", FieldFormat::Bytes(32)),
    ("entity_body_reserved", FieldFormat::U32),
    ("version", FieldFormat::U8),
    ("network", FieldFormat::U8),
    ("type", FieldFormat::U16),
    ("height", FieldFormat::U64),
    ("timestamp", FieldFormat::U64),
    ("difficulty", FieldFormat::U64),
    ("generation_hash_proof", FieldFormat::Bytes(80)),
    ("previous_block_hash", FieldFormat::Bytes(32)),
    ("transactions_hash", FieldFormat::Bytes(32)),
    ("receipts_hash", FieldFormat::Bytes(32)),
    ("state_hash", FieldFormat::Bytes(32)),
    ("beneficiary_address", FieldFormat::Bytes(24)),
    ("fee_multiplier", FieldFormat::U32),
];

// ==============================================================================
// Header
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Nemesis,
    Normal,
    Importance,
}

impl BlockType {
    pub fn code(self) -> u16 {
        match self {
            Self::Nemesis => 0x8043,
            Self::Normal => 0x8143,
            Self::Importance => 0x8243,
        }
    }

    /// Nemesis and importance blocks carry the 52-byte importance footer.
    pub fn has_importance_footer(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl TryFrom<u16> for BlockType {
    type Error = CoreError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0x8043 => Ok(Self::Nemesis),
            0x8143 => Ok(Self::Normal),
            0x8243 => Ok(Self::Importance),
            other => Err(CoreError::UnknownBlockType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Size of header plus footer; the trailer is not included.
    pub size: u32,
    pub verifiable_entity_reserved: u32,
    pub signature: Signature,
    pub signer_public_key: PublicKey,
    pub entity_body_reserved: u32,
    pub version: u8,
    pub network: u8,
    pub block_type: BlockType,
    pub height: u64,
    pub timestamp: u64,
    pub difficulty: u64,
    pub generation_hash_proof: GenerationHashProof,
    pub previous_block_hash: Hash256,
    pub transactions_hash: Hash256,
    pub receipts_hash: Hash256,
    pub state_hash: Hash256,
    pub beneficiary_address: Address,
    pub fee_multiplier: u32,
    /// Signer address on the header's network.
    pub harvester: Address,
}

/// Decode a block header. `bytes` must be exactly [`HEADER_LEN`] long.
pub fn decode_header(bytes: &[u8]) -> Result<BlockHeader, CoreError> {
    let record = unpack(bytes, HEADER_SCHEMA)?;

    let network = unsigned(&record, "network")? as u8;
    let signer_public_key = PublicKey(fixed(&record, "signer_public_key")?);
    let block_type = BlockType::try_from(unsigned(&record, "type")? as u16)?;

    Ok(BlockHeader {
        size: unsigned(&record, "size")? as u32,
        verifiable_entity_reserved: unsigned(&record, "verifiable_entity_reserved")? as u32,
        signature: Signature(fixed(&record, "signature")?),
        harvester: Address::from_public_key(&signer_public_key, network),
        signer_public_key,
        entity_body_reserved: unsigned(&record, "entity_body_reserved")? as u32,
        version: unsigned(&record, "version")? as u8,
        network,
        block_type,
        height: unsigned(&record, "height")?,
        timestamp: unsigned(&record, "timestamp")?,
        difficulty: unsigned(&record, "difficulty")?,
        generation_hash_proof: GenerationHashProof(fixed(&record, "generation_hash_proof")?),
        previous_block_hash: Hash256(fixed(&record, "previous_block_hash")?),
        transactions_hash: Hash256(fixed(&record, "transactions_hash")?),
        receipts_hash: Hash256(fixed(&record, "receipts_hash")?),
        state_hash: Hash256(fixed(&record, "state_hash")?),
        beneficiary_address: Address(fixed(&record, "beneficiary_address")?),
        fee_multiplier: unsigned(&record, "fee_multiplier")? as u32,
    })
}

impl BlockHeader {
    /// Re-emit the exact 372-byte wire form.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let u = |v: u64| FieldValue::Unsigned(v);
        let b = |v: &[u8]| FieldValue::Bytes(v.to_vec());

        let record: Record = [
            ("size", u(self.size.into())),
            ("verifiable_entity_reserved", u(self.verifiable_entity_reserved.into())),
            ("signature", b(self.signature.as_bytes())),
            ("signer_public_key", b(self.signer_public_key.as_bytes())),
            ("entity_body_reserved", u(self.entity_body_reserved.into())),
            ("version", u(self.version.into())),
            ("network", u(self.network.into())),
            ("type", u(self.block_type.code().into())),
            ("height", u(self.height)),
            ("timestamp", u(self.timestamp)),
            ("difficulty", u(self.difficulty)),
            ("generation_hash_proof", b(self.generation_hash_proof.as_bytes())),
            ("previous_block_hash", b(self.previous_block_hash.as_bytes())),
            ("transactions_hash", b(self.transactions_hash.as_bytes())),
            ("receipts_hash", b(self.receipts_hash.as_bytes())),
            ("state_hash", b(self.state_hash.as_bytes())),
            ("beneficiary_address", b(self.beneficiary_address.as_bytes())),
            ("fee_multiplier", u(self.fee_multiplier.into())),
        ]
        .into_iter()
        .collect();

        pack(&record, HEADER_SCHEMA)
    }

    /// Block time as unix milliseconds.
    pub fn unix_timestamp_ms(&self) -> u64 {
        NETWORK_EPOCH_UNIX_SECS * 1000 + self.timestamp
    }
}

fn unsigned(record: &Record, name: &'static str) -> Result<u64, CoreError> {
    record
        .get(name)
        .and_then(FieldValue::as_u64)
        .ok_or(CoreError::LengthMismatch {
            context: name,
            expected: 8,
            actual: 0,
        })
}

fn fixed<const N: usize>(record: &Record, name: &'static str) -> Result<[u8; N], CoreError> {
    let bytes = record
        .get(name)
        .and_then(FieldValue::as_bytes)
        .unwrap_or_default();
    bytes.try_into().map_err(|_| CoreError::LengthMismatch {
        context: name,
        expected: N,
        actual: bytes.len(),
    })
}

// ==============================================================================
// Footer
// ==============================================================================

/// Importance snapshot carried by nemesis and importance blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportanceFooter {
    pub voting_eligible_accounts_count: u32,
    pub harvesting_eligible_accounts_count: u64,
    pub total_voting_balance: u64,
    pub previous_importance_block_hash: Hash256,
}

impl ImportanceFooter {
    pub const LEN: usize = 52;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFooter {
    pub importance: Option<ImportanceFooter>,
    pub transactions: Vec<Transaction>,
    /// Sum of `min(max_fee, size * fee_multiplier)` over top-level
    /// transactions.
    pub total_fee: u64,
    /// Top-level transactions plus every embedded transaction.
    pub tx_count: u64,
    /// Number of top-level transactions.
    pub statement_count: u64,
}

/// Decode the footer that follows `header`: the type-specific prefix and
/// then top-level transactions until `bytes` is exhausted.
pub fn decode_footer(bytes: &[u8], header: &BlockHeader) -> Result<BlockFooter, CoreError> {
    let mut reader = Reader::new(bytes, "block footer");

    let importance = if header.block_type.has_importance_footer() {
        Some(ImportanceFooter {
            voting_eligible_accounts_count: reader.read_u32()?,
            harvesting_eligible_accounts_count: reader.read_u64()?,
            total_voting_balance: reader.read_u64()?,
            previous_importance_block_hash: Hash256(reader.read_array()?),
        })
    } else {
        reader.skip(4)?;
        None
    };

    let mut transactions = Vec::new();
    while !reader.is_empty() {
        let id = transactions.len() as u32 + 1;
        transactions.push(Transaction::decode(&mut reader, id)?);
    }

    let total_fee = transactions
        .iter()
        .map(|tx| tx.fee(header.fee_multiplier))
        .sum();
    let tx_count = transactions
        .iter()
        .map(|tx| 1 + tx.embedded_tx_count() as u64)
        .sum();

    Ok(BlockFooter {
        importance,
        statement_count: transactions.len() as u64,
        transactions,
        total_fee,
        tx_count,
    })
}

// ==============================================================================
// Block Element
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHashes {
    pub entity_hash: Hash256,
    pub merkle_component_hash: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub footer: BlockFooter,
    pub block_hash: Hash256,
    pub generation_hash: Hash256,
    /// Present only when requested through [`BlockReadOptions`].
    pub transaction_hashes: Option<Vec<TransactionHashes>>,
    /// Present only when requested through [`BlockReadOptions`].
    pub sub_cache_merkle_roots: Option<Vec<Hash256>>,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.header.height
    }
}

/// Which optional trailer lists to retain when decoding blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReadOptions {
    pub save_tx_hashes: bool,
    pub save_sub_cache_merkle_roots: bool,
}

/// Decode one block element (header, footer, trailer) at the reader's
/// position.
pub fn decode_block(reader: &mut Reader<'_>, options: BlockReadOptions) -> Result<Block, CoreError> {
    let header = decode_header(reader.read_bytes(HEADER_LEN)?)?;
    let footer_len = (header.size as usize)
        .checked_sub(HEADER_LEN)
        .ok_or(CoreError::LengthMismatch {
            context: "block",
            expected: HEADER_LEN,
            actual: header.size as usize,
        })?;
    let footer = decode_footer(reader.read_bytes(footer_len)?, &header)?;

    let block_hash = Hash256(reader.read_array()?);
    let generation_hash = Hash256(reader.read_array()?);

    let hash_count = reader.read_u32()? as usize;
    let transaction_hashes = if options.save_tx_hashes {
        let hashes = (0..hash_count)
            .map(|_| {
                Ok(TransactionHashes {
                    entity_hash: Hash256(reader.read_array()?),
                    merkle_component_hash: Hash256(reader.read_array()?),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Some(hashes)
    } else {
        reader.skip(hash_count * 64)?;
        None
    };

    let root_count = reader.read_u32()? as usize;
    let sub_cache_merkle_roots = if options.save_sub_cache_merkle_roots {
        let roots = (0..root_count)
            .map(|_| Ok(Hash256(reader.read_array()?)))
            .collect::<Result<Vec<_>, CoreError>>()?;
        Some(roots)
    } else {
        reader.skip(root_count * 32)?;
        None
    };

    Ok(Block {
        header,
        footer,
        block_hash,
        generation_hash,
        transaction_hashes,
        sub_cache_merkle_roots,
    })
}

/// Decodes the blocks of one block file in order.
///
/// The file is read fully on construction; blocks are decoded lazily as the
/// iterator is advanced. A decode error ends iteration.
pub struct BlockFileReader {
    path: PathBuf,
    data: Vec<u8>,
    pos: usize,
    options: BlockReadOptions,
    failed: bool,
}

impl BlockFileReader {
    pub fn open(
        path: &Path,
        db_offset_bytes: usize,
        options: BlockReadOptions,
    ) -> Result<Self, CoreError> {
        let data = fs::read(path)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "read block file");
        Ok(Self::from_bytes(path.to_path_buf(), data, db_offset_bytes, options))
    }

    pub fn from_bytes(
        path: PathBuf,
        data: Vec<u8>,
        db_offset_bytes: usize,
        options: BlockReadOptions,
    ) -> Self {
        Self {
            path,
            pos: db_offset_bytes.min(data.len()),
            data,
            options,
            failed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for BlockFileReader {
    type Item = Result<Block, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let mut reader = Reader::new(&self.data[self.pos..], "block file");
        match decode_block(&mut reader, self.options) {
            Ok(block) => {
                self.pos += reader.position();
                Some(Ok(block))
            }
            Err(e) => {
                self.failed = true;
                tracing::warn!(path = %self.path.display(), offset = self.pos, error = %e, "block decode failed");
                Some(Err(e))
            }
        }
    }
}

/// Read and decode every block of one file.
pub fn read_block_file(
    path: &Path,
    db_offset_bytes: usize,
    options: BlockReadOptions,
) -> Result<Vec<Block>, CoreError> {
    BlockFileReader::open(path, db_offset_bytes, options)?.collect()
}

// ==============================================================================
// Summaries
// ==============================================================================

/// Flattened per-block statistics for tabular reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub timestamp: u64,
    pub unix_timestamp_ms: u64,
    pub block_type: BlockType,
    pub version: u8,
    pub network: u8,
    pub difficulty: u64,
    pub fee_multiplier: u32,
    pub size: u32,
    pub harvester: Address,
    pub beneficiary_address: Address,
    pub signer_public_key: PublicKey,
    pub block_hash: Hash256,
    pub generation_hash: Hash256,
    pub previous_block_hash: Hash256,
    pub transactions_hash: Hash256,
    pub receipts_hash: Hash256,
    pub state_hash: Hash256,
    pub statement_count: u64,
    pub tx_count: u64,
    pub total_fee: u64,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        let h = &block.header;
        Self {
            height: h.height,
            timestamp: h.timestamp,
            unix_timestamp_ms: h.unix_timestamp_ms(),
            block_type: h.block_type,
            version: h.version,
            network: h.network,
            difficulty: h.difficulty,
            fee_multiplier: h.fee_multiplier,
            size: h.size,
            harvester: h.harvester,
            beneficiary_address: h.beneficiary_address,
            signer_public_key: h.signer_public_key,
            block_hash: block.block_hash,
            generation_hash: block.generation_hash,
            previous_block_hash: h.previous_block_hash,
            transactions_hash: h.transactions_hash,
            receipts_hash: h.receipts_hash,
            state_hash: h.state_hash,
            statement_count: block.footer.statement_count,
            tx_count: block.footer.tx_count,
            total_fee: block.footer.total_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MAINNET;
    use crate::test_util::{
        aggregate_payload, block_bytes, block_file, embedded_tx, header_bytes, key_link_payload,
        public_key_from_byte, top_level_tx, transfer_payload, BlockSpec, FIXTURE_TRANSFER_PAYLOAD,
    };
    use crate::transaction::TransactionType;
    use crate::types::XYM_MOSAIC_IDS;

    #[test]
    fn header_round_trips_through_schema() {
        let bytes = header_bytes(&BlockSpec::normal(42), 0);
        assert_eq!(bytes.len(), HEADER_LEN);

        let header = decode_header(&bytes).expect("decode header");
        assert_eq!(header.height, 42);
        assert_eq!(header.block_type, BlockType::Normal);
        assert_eq!(header.encode().expect("encode"), bytes);

        let record = unpack(&bytes, HEADER_SCHEMA).expect("unpack");
        assert_eq!(pack(&record, HEADER_SCHEMA).expect("pack"), bytes);
    }

    #[test]
    fn header_rejects_wrong_length() {
        let bytes = header_bytes(&BlockSpec::normal(1), 0);
        assert!(matches!(
            decode_header(&bytes[..371]),
            Err(CoreError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn unknown_block_type_is_fatal() {
        let mut bytes = header_bytes(&BlockSpec::normal(1), 0);
        bytes[110..112].copy_from_slice(&0x8343u16.to_le_bytes());
        assert!(matches!(
            decode_header(&bytes),
            Err(CoreError::UnknownBlockType(0x8343))
        ));
    }

    #[test]
    fn harvester_is_derived_from_signer() {
        let mut spec = BlockSpec::normal(5);
        spec.signer = public_key_from_byte(9);
        let header = decode_header(&header_bytes(&spec, 0)).expect("decode header");
        assert_eq!(
            header.harvester,
            Address::from_public_key(&public_key_from_byte(9), MAINNET)
        );
    }

    #[test]
    fn fixture_transfer_block_stats() {
        let tx = top_level_tx(
            public_key_from_byte(7),
            TransactionType::Transfer,
            17_600,
            &FIXTURE_TRANSFER_PAYLOAD,
        );
        let bytes = block_bytes(&BlockSpec::normal(1), &[tx]);
        let block = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
            .expect("decode block");

        assert_eq!(block.footer.total_fee, 0);
        assert_eq!(block.footer.tx_count, 1);
        assert_eq!(block.footer.statement_count, 1);
        let tx = &block.footer.transactions[0];
        assert_eq!(tx.size, 176);
        let crate::transaction::TransactionPayload::Transfer(transfer) = &tx.payload else {
            panic!("expected transfer");
        };
        assert_eq!(
            transfer.recipient_address.to_string(),
            "NAOTO55CLDBWQ4UG47RLCFMTKDZHUX2LGFZVJ7A"
        );
    }

    #[test]
    fn aggregate_fee_and_tx_count_invariants() {
        let embedded: Vec<Vec<u8>> = (0u8..4)
            .map(|i| {
                embedded_tx(
                    public_key_from_byte(30 + i),
                    TransactionType::Transfer,
                    &transfer_payload([40 + i; 24], &[(XYM_MOSAIC_IDS[0], 1)], &[]),
                )
            })
            .collect();
        let aggregate = top_level_tx(
            public_key_from_byte(1),
            TransactionType::AggregateComplete,
            1_000_000,
            &aggregate_payload(&embedded, &[0xCC; 104]),
        );
        let link = top_level_tx(
            public_key_from_byte(2),
            TransactionType::VrfKeyLink,
            50,
            &key_link_payload(public_key_from_byte(3), 1),
        );

        let mut spec = BlockSpec::normal(10);
        spec.fee_multiplier = 100;
        let bytes = block_bytes(&spec, &[aggregate, link]);
        let block = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
            .expect("decode block");

        let footer = &block.footer;
        assert_eq!(footer.statement_count, 2);
        assert_eq!(footer.tx_count, 1 + 4 + 1);
        let aggregate_size = u64::from(footer.transactions[0].size);
        // Embedded transactions contribute no fee of their own.
        assert_eq!(footer.total_fee, (aggregate_size * 100).min(1_000_000) + 50);
        assert_eq!(footer.transactions[0].embedded_tx_count(), 4);
        assert_eq!(footer.transactions[1].id, 2);
    }

    #[test]
    fn importance_footer_is_decoded() {
        let mut spec = BlockSpec::normal(720);
        spec.block_type = BlockType::Importance;
        let bytes = block_bytes(&spec, &[]);
        let block = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
            .expect("decode block");
        let importance = block.footer.importance.expect("importance footer");
        assert_eq!(importance.voting_eligible_accounts_count, 0);
        assert!(block.footer.transactions.is_empty());
    }

    #[test]
    fn trailer_lists_are_kept_on_request() {
        let mut spec = BlockSpec::normal(3);
        spec.tx_hash_count = 2;
        spec.merkle_root_count = 3;
        let bytes = block_bytes(&spec, &[]);

        let skipped = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
            .expect("decode block");
        assert!(skipped.transaction_hashes.is_none());
        assert!(skipped.sub_cache_merkle_roots.is_none());

        let options = BlockReadOptions {
            save_tx_hashes: true,
            save_sub_cache_merkle_roots: true,
        };
        let mut reader = Reader::new(&bytes, "test");
        let kept = decode_block(&mut reader, options).expect("decode block");
        assert!(reader.is_empty());
        assert_eq!(kept.transaction_hashes.map(|h| h.len()), Some(2));
        assert_eq!(kept.sub_cache_merkle_roots.map(|r| r.len()), Some(3));
    }

    #[test]
    fn file_reader_skips_pad_and_yields_blocks_in_order() {
        let data = block_file(&[
            block_bytes(&BlockSpec::normal(1), &[]),
            block_bytes(&BlockSpec::normal(2), &[]),
        ]);
        let heights: Vec<u64> = BlockFileReader::from_bytes(
            PathBuf::from("00000.dat"),
            data,
            DB_OFFSET_BYTES,
            BlockReadOptions::default(),
        )
        .map(|block| block.expect("decode").height())
        .collect();
        assert_eq!(heights, vec![1, 2]);
    }

    #[test]
    fn summary_flattens_counts() {
        let bytes = block_bytes(&BlockSpec::normal(8), &[]);
        let block = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
            .expect("decode block");
        let summary = BlockSummary::from(&block);
        assert_eq!(summary.height, 8);
        assert_eq!(summary.tx_count, 0);
        let json = serde_json::to_value(&summary).expect("serialize summary");
        assert_eq!(json["block_type"], "normal");
        assert_eq!(
            json["harvester"].as_str().map(str::len),
            Some(39),
            "addresses serialize as base32 text"
        );
    }
}
