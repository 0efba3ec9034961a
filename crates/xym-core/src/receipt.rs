//! Receipt decoding.
//!
//! Receipts are emitted by the chain (not signed by accounts) and live in
//! the statement files. Each carries an 8-byte header (size, version, type)
//! followed by a payload selected by the numeric type. Unlike transaction
//! types, receipt types are used as plain `u16` values.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::Reader;
use crate::error::CoreError;

// ==============================================================================
// Receipt Types
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptType {
    Reserved,
    MosaicRentalFee,
    NamespaceRentalFee,
    HarvestFee,
    LockHashCompleted,
    LockHashExpired,
    LockSecretCompleted,
    LockSecretExpired,
    LockHashCreated,
    LockSecretCreated,
    MosaicExpired,
    NamespaceExpired,
    NamespaceDeleted,
    Inflation,
    TransactionGroup,
}

impl ReceiptType {
    pub fn code(self) -> u16 {
        match self {
            Self::Reserved => 0x0000,
            Self::MosaicRentalFee => 0x124D,
            Self::NamespaceRentalFee => 0x134E,
            Self::HarvestFee => 0x2143,
            Self::LockHashCompleted => 0x2248,
            Self::LockHashExpired => 0x2348,
            Self::LockSecretCompleted => 0x2252,
            Self::LockSecretExpired => 0x2352,
            Self::LockHashCreated => 0x3148,
            Self::LockSecretCreated => 0x3152,
            Self::MosaicExpired => 0x414D,
            Self::NamespaceExpired => 0x414E,
            Self::NamespaceDeleted => 0x424E,
            Self::Inflation => 0x5143,
            Self::TransactionGroup => 0xE143,
        }
    }
}

impl TryFrom<u16> for ReceiptType {
    type Error = CoreError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Ok(match code {
            0x0000 => Self::Reserved,
            0x124D => Self::MosaicRentalFee,
            0x134E => Self::NamespaceRentalFee,
            0x2143 => Self::HarvestFee,
            0x2248 => Self::LockHashCompleted,
            0x2348 => Self::LockHashExpired,
            0x2252 => Self::LockSecretCompleted,
            0x2352 => Self::LockSecretExpired,
            0x3148 => Self::LockHashCreated,
            0x3152 => Self::LockSecretCreated,
            0x414D => Self::MosaicExpired,
            0x414E => Self::NamespaceExpired,
            0x424E => Self::NamespaceDeleted,
            0x5143 => Self::Inflation,
            0xE143 => Self::TransactionGroup,
            other => return Err(CoreError::UnknownReceiptType(other)),
        })
    }
}

// ==============================================================================
// Payloads
// ==============================================================================

/// Identifies the transaction a receipt was produced by: `primary_id` is
/// the 1-based transaction position in the block, `secondary_id` the
/// embedded position (0 when not embedded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceiptSource {
    pub primary_id: u32,
    pub secondary_id: u32,
}

impl ReceiptSource {
    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self, CoreError> {
        Ok(Self {
            primary_id: reader.read_u32()?,
            secondary_id: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTransfer {
    pub mosaic_id: u64,
    pub amount: u64,
    pub sender_address: Address,
    pub recipient_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub mosaic_id: u64,
    pub amount: u64,
    pub target_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionGroup {
    pub source: ReceiptSource,
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptPayload {
    Reserved,
    BalanceTransfer(BalanceTransfer),
    BalanceCredit(BalanceChange),
    BalanceDebit(BalanceChange),
    ArtifactExpiry { artifact_id: u64 },
    Inflation { mosaic_id: u64, amount: u64 },
    TransactionGroup(TransactionGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub size: u32,
    pub version: u16,
    pub receipt_type: ReceiptType,
    pub payload: ReceiptPayload,
}

impl Receipt {
    pub const HEADER_LEN: usize = 8;

    /// Decode one receipt at the reader's position and advance by its
    /// declared size. Receipts are not padded.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, CoreError> {
        let size = reader.read_u32()?;
        let version = reader.read_u16()?;
        let receipt_type = ReceiptType::try_from(reader.read_u16()?)?;

        let payload_len = (size as usize)
            .checked_sub(Self::HEADER_LEN)
            .ok_or(CoreError::LengthMismatch {
                context: "receipt",
                expected: Self::HEADER_LEN,
                actual: size as usize,
            })?;
        let payload = decode_receipt_payload(reader.read_bytes(payload_len)?, receipt_type)?;

        Ok(Self {
            size,
            version,
            receipt_type,
            payload,
        })
    }

    /// Every receipt reachable from this one, depth first, including
    /// `self`.
    pub fn flatten(&self) -> Vec<&Receipt> {
        let mut out = vec![self];
        if let ReceiptPayload::TransactionGroup(group) = &self.payload {
            out.extend(group.receipts.iter().flat_map(Receipt::flatten));
        }
        out
    }
}

pub fn decode_receipt_payload(
    data: &[u8],
    receipt_type: ReceiptType,
) -> Result<ReceiptPayload, CoreError> {
    let mut r = Reader::new(data, "receipt payload");

    let payload = match receipt_type {
        ReceiptType::Reserved => {
            r.skip(r.remaining())?;
            ReceiptPayload::Reserved
        }
        ReceiptType::MosaicRentalFee | ReceiptType::NamespaceRentalFee => {
            ReceiptPayload::BalanceTransfer(BalanceTransfer {
                mosaic_id: r.read_u64()?,
                amount: r.read_u64()?,
                sender_address: Address(r.read_array()?),
                recipient_address: Address(r.read_array()?),
            })
        }
        ReceiptType::HarvestFee
        | ReceiptType::LockHashCompleted
        | ReceiptType::LockHashExpired
        | ReceiptType::LockSecretCompleted
        | ReceiptType::LockSecretExpired => {
            ReceiptPayload::BalanceCredit(read_balance_change(&mut r)?)
        }
        ReceiptType::LockHashCreated | ReceiptType::LockSecretCreated => {
            ReceiptPayload::BalanceDebit(read_balance_change(&mut r)?)
        }
        ReceiptType::MosaicExpired | ReceiptType::NamespaceExpired | ReceiptType::NamespaceDeleted => {
            ReceiptPayload::ArtifactExpiry {
                artifact_id: r.read_u64()?,
            }
        }
        ReceiptType::Inflation => ReceiptPayload::Inflation {
            mosaic_id: r.read_u64()?,
            amount: r.read_u64()?,
        },
        ReceiptType::TransactionGroup => {
            let source = ReceiptSource::decode(&mut r)?;
            let count = r.read_u32()?;
            let receipts = (0..count)
                .map(|_| Receipt::decode(&mut r))
                .collect::<Result<Vec<_>, _>>()?;
            ReceiptPayload::TransactionGroup(TransactionGroup { source, receipts })
        }
    };

    r.ensure_exhausted()?;
    Ok(payload)
}

fn read_balance_change(r: &mut Reader<'_>) -> Result<BalanceChange, CoreError> {
    Ok(BalanceChange {
        mosaic_id: r.read_u64()?,
        amount: r.read_u64()?,
        target_address: Address(r.read_array()?),
    })
}
