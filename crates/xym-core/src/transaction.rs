//! Transaction decoding.
//!
//! Top-level transactions carry a 128-byte header, embedded (aggregate
//! member) transactions a 48-byte one. Both are followed by a payload whose
//! layout is selected by the 2-byte type code. The code is stored
//! little-endian on the wire, so reading it as a `u16` yields the
//! conventional big-endian hex form (`0x4154` for transfers).

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::{padded_size, Reader};
use crate::error::CoreError;
use crate::types::{hex_bytes, Hash256, Mosaic, PublicKey, Signature};

/// First message byte marking a transfer as a delegated-harvesting request.
pub const DELEGATION_REQUEST_MARKER: u8 = 0xFE;

// ==============================================================================
// Transaction Types
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    AccountKeyLink,
    NodeKeyLink,
    AggregateComplete,
    AggregateBonded,
    VotingKeyLink,
    VrfKeyLink,
    MosaicDefinition,
    MosaicSupplyChange,
    NamespaceRegistration,
    AddressAlias,
    MosaicAlias,
    AccountMetadata,
    MosaicMetadata,
    NamespaceMetadata,
    MultisigAccountModification,
    HashLock,
    SecretLock,
    SecretProof,
    AccountAddressRestriction,
    AccountMosaicRestriction,
    AccountOperationRestriction,
    MosaicGlobalRestriction,
    MosaicAddressRestriction,
    Transfer,
}

impl TransactionType {
    pub fn code(self) -> u16 {
        match self {
            Self::AccountKeyLink => 0x414C,
            Self::NodeKeyLink => 0x424C,
            Self::AggregateComplete => 0x4141,
            Self::AggregateBonded => 0x4241,
            Self::VotingKeyLink => 0x4143,
            Self::VrfKeyLink => 0x4243,
            Self::MosaicDefinition => 0x414D,
            Self::MosaicSupplyChange => 0x424D,
            Self::NamespaceRegistration => 0x414E,
            Self::AddressAlias => 0x424E,
            Self::MosaicAlias => 0x434E,
            Self::AccountMetadata => 0x4144,
            Self::MosaicMetadata => 0x4244,
            Self::NamespaceMetadata => 0x4344,
            Self::MultisigAccountModification => 0x4155,
            Self::HashLock => 0x4148,
            Self::SecretLock => 0x4152,
            Self::SecretProof => 0x4252,
            Self::AccountAddressRestriction => 0x4150,
            Self::AccountMosaicRestriction => 0x4250,
            Self::AccountOperationRestriction => 0x4350,
            Self::MosaicGlobalRestriction => 0x4151,
            Self::MosaicAddressRestriction => 0x4251,
            Self::Transfer => 0x4154,
        }
    }
}

impl TryFrom<u16> for TransactionType {
    type Error = CoreError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Ok(match code {
            0x414C => Self::AccountKeyLink,
            0x424C => Self::NodeKeyLink,
            0x4141 => Self::AggregateComplete,
            0x4241 => Self::AggregateBonded,
            0x4143 => Self::VotingKeyLink,
            0x4243 => Self::VrfKeyLink,
            0x414D => Self::MosaicDefinition,
            0x424D => Self::MosaicSupplyChange,
            0x414E => Self::NamespaceRegistration,
            0x424E => Self::AddressAlias,
            0x434E => Self::MosaicAlias,
            0x4144 => Self::AccountMetadata,
            0x4244 => Self::MosaicMetadata,
            0x4344 => Self::NamespaceMetadata,
            0x4155 => Self::MultisigAccountModification,
            0x4148 => Self::HashLock,
            0x4152 => Self::SecretLock,
            0x4252 => Self::SecretProof,
            0x4150 => Self::AccountAddressRestriction,
            0x4250 => Self::AccountMosaicRestriction,
            0x4350 => Self::AccountOperationRestriction,
            0x4151 => Self::MosaicGlobalRestriction,
            0x4251 => Self::MosaicAddressRestriction,
            0x4154 => Self::Transfer,
            other => return Err(CoreError::UnknownTransactionType(other)),
        })
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AccountKeyLink => "account_key_link",
            Self::NodeKeyLink => "node_key_link",
            Self::AggregateComplete => "aggregate_complete",
            Self::AggregateBonded => "aggregate_bonded",
            Self::VotingKeyLink => "voting_key_link",
            Self::VrfKeyLink => "vrf_key_link",
            Self::MosaicDefinition => "mosaic_definition",
            Self::MosaicSupplyChange => "mosaic_supply_change",
            Self::NamespaceRegistration => "namespace_registration",
            Self::AddressAlias => "address_alias",
            Self::MosaicAlias => "mosaic_alias",
            Self::AccountMetadata => "account_metadata",
            Self::MosaicMetadata => "mosaic_metadata",
            Self::NamespaceMetadata => "namespace_metadata",
            Self::MultisigAccountModification => "multisig_account_modification",
            Self::HashLock => "hash_lock",
            Self::SecretLock => "secret_lock",
            Self::SecretProof => "secret_proof",
            Self::AccountAddressRestriction => "account_address_restriction",
            Self::AccountMosaicRestriction => "account_mosaic_restriction",
            Self::AccountOperationRestriction => "account_operation_restriction",
            Self::MosaicGlobalRestriction => "mosaic_global_restriction",
            Self::MosaicAddressRestriction => "mosaic_address_restriction",
            Self::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

// ==============================================================================
// Payload Types
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    Unlink,
    Link,
}

impl TryFrom<u8> for LinkAction {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unlink),
            1 => Ok(Self::Link),
            other => Err(CoreError::InvalidLinkAction(other)),
        }
    }
}

/// Account, node and VRF key links share one layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLink {
    pub linked_public_key: PublicKey,
    pub link_action: LinkAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingKeyLink {
    pub linked_public_key: PublicKey,
    pub start_epoch: u32,
    pub end_epoch: u32,
    pub link_action: LinkAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub transactions_hash: Hash256,
    pub payload_size: u32,
    pub embedded_transactions: Vec<EmbeddedTransaction>,
    /// Raw cosignature blob trailing the embedded transactions.
    #[serde(with = "hex_bytes")]
    pub cosignatures: Vec<u8>,
}

impl Aggregate {
    pub fn embedded_tx_count(&self) -> usize {
        self.embedded_transactions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicDefinition {
    pub id: u64,
    pub duration: u64,
    pub nonce: u32,
    pub flags: u8,
    pub divisibility: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicSupplyChange {
    pub mosaic_id: u64,
    pub delta: u64,
    pub action: u8,
}

/// The registration type selects how the leading identifier is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceRegistrationKind {
    Root { duration: u64 },
    Child { parent_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRegistration {
    pub id: u64,
    pub registration: NamespaceRegistrationKind,
    #[serde(with = "hex_bytes")]
    pub name: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAlias {
    pub namespace_id: u64,
    pub address: Address,
    pub alias_action: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicAlias {
    pub namespace_id: u64,
    pub mosaic_id: u64,
    pub alias_action: u8,
}

/// Account, mosaic and namespace metadata. `target_id` is the mosaic or
/// namespace id and is absent for account metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub target_address: Address,
    pub scoped_metadata_key: u64,
    pub target_id: Option<u64>,
    pub value_size_delta: i16,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigAccountModification {
    pub min_removal_delta: i8,
    pub min_approval_delta: i8,
    pub address_additions: Vec<Address>,
    pub address_deletions: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashLock {
    pub mosaic: Mosaic,
    pub duration: u64,
    pub hash: Hash256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretLock {
    pub recipient_address: Address,
    pub secret: Hash256,
    pub mosaic: Mosaic,
    pub duration: u64,
    pub hash_algorithm: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretProof {
    pub recipient_address: Address,
    pub secret: Hash256,
    pub hash_algorithm: u8,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

/// Account restriction modifications; `T` is an address, a mosaic id or a
/// transaction type code depending on the restriction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRestriction<T> {
    pub restriction_flags: u16,
    pub additions: Vec<T>,
    pub deletions: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicGlobalRestriction {
    pub mosaic_id: u64,
    pub reference_mosaic_id: u64,
    pub restriction_key: u64,
    pub previous_restriction_value: u64,
    pub new_restriction_value: u64,
    pub previous_restriction_type: u8,
    pub new_restriction_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicAddressRestriction {
    pub mosaic_id: u64,
    pub restriction_key: u64,
    pub previous_restriction_value: u64,
    pub new_restriction_value: u64,
    pub target_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub recipient_address: Address,
    pub mosaics: Vec<Mosaic>,
    #[serde(with = "hex_bytes")]
    pub message: Vec<u8>,
}

impl Transfer {
    pub fn is_delegation_request(&self) -> bool {
        self.message.first() == Some(&DELEGATION_REQUEST_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPayload {
    AccountKeyLink(KeyLink),
    NodeKeyLink(KeyLink),
    VrfKeyLink(KeyLink),
    VotingKeyLink(VotingKeyLink),
    AggregateComplete(Aggregate),
    AggregateBonded(Aggregate),
    MosaicDefinition(MosaicDefinition),
    MosaicSupplyChange(MosaicSupplyChange),
    NamespaceRegistration(NamespaceRegistration),
    AddressAlias(AddressAlias),
    MosaicAlias(MosaicAlias),
    AccountMetadata(Metadata),
    MosaicMetadata(Metadata),
    NamespaceMetadata(Metadata),
    MultisigAccountModification(MultisigAccountModification),
    HashLock(HashLock),
    SecretLock(SecretLock),
    SecretProof(SecretProof),
    AccountAddressRestriction(AccountRestriction<Address>),
    AccountMosaicRestriction(AccountRestriction<u64>),
    AccountOperationRestriction(AccountRestriction<u16>),
    MosaicGlobalRestriction(MosaicGlobalRestriction),
    MosaicAddressRestriction(MosaicAddressRestriction),
    Transfer(Transfer),
}

impl TransactionPayload {
    pub fn as_aggregate(&self) -> Option<&Aggregate> {
        match self {
            Self::AggregateComplete(aggregate) | Self::AggregateBonded(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

// ==============================================================================
// Transactions
// ==============================================================================

/// A top-level transaction as stored in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// 1-based position within the containing block.
    pub id: u32,
    pub size: u32,
    pub signature: Signature,
    pub signer_public_key: PublicKey,
    pub version: u8,
    pub network: u8,
    pub tx_type: TransactionType,
    pub max_fee: u64,
    pub deadline: u64,
    pub payload: TransactionPayload,
}

impl Transaction {
    pub const HEADER_LEN: usize = 128;

    /// Decode one transaction at the reader's position and advance past it,
    /// including its alignment padding.
    pub fn decode(reader: &mut Reader<'_>, id: u32) -> Result<Self, CoreError> {
        let size = reader.read_u32()?;
        reader.skip(4)?;
        let signature = Signature(reader.read_array()?);
        let signer_public_key = PublicKey(reader.read_array()?);
        reader.skip(4)?;
        let version = reader.read_u8()?;
        let network = reader.read_u8()?;
        let tx_type = TransactionType::try_from(reader.read_u16()?)?;
        let max_fee = reader.read_u64()?;
        let deadline = reader.read_u64()?;

        let payload_len = body_len(size, Self::HEADER_LEN, "transaction")?;
        let payload = decode_payload(reader.read_bytes(payload_len)?, tx_type, None)?;
        skip_padding(reader, size)?;

        Ok(Self {
            id,
            size,
            signature,
            signer_public_key,
            version,
            network,
            tx_type,
            max_fee,
            deadline,
            payload,
        })
    }

    pub fn signer_address(&self) -> Address {
        Address::from_public_key(&self.signer_public_key, self.network)
    }

    /// Fee actually charged: the declared maximum, capped by
    /// `size * fee_multiplier`.
    pub fn fee(&self, fee_multiplier: u32) -> u64 {
        self.max_fee
            .min(u64::from(self.size) * u64::from(fee_multiplier))
    }

    /// Number of embedded transactions; zero for non-aggregates.
    pub fn embedded_tx_count(&self) -> usize {
        self.payload
            .as_aggregate()
            .map_or(0, Aggregate::embedded_tx_count)
    }
}

/// A transaction embedded in an aggregate. Embedded transactions carry no
/// signature, fee or deadline of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTransaction {
    /// 1-based position within the containing aggregate.
    pub id: u32,
    pub size: u32,
    pub signer_public_key: PublicKey,
    pub version: u8,
    pub network: u8,
    pub tx_type: TransactionType,
    pub payload: TransactionPayload,
}

impl EmbeddedTransaction {
    pub const HEADER_LEN: usize = 48;

    pub fn decode(reader: &mut Reader<'_>, id: u32) -> Result<Self, CoreError> {
        let size = reader.read_u32()?;
        reader.skip(4)?;
        let signer_public_key = PublicKey(reader.read_array()?);
        reader.skip(4)?;
        let version = reader.read_u8()?;
        let network = reader.read_u8()?;
        let tx_type = TransactionType::try_from(reader.read_u16()?)?;

        let payload_len = body_len(size, Self::HEADER_LEN, "embedded transaction")?;
        let payload = decode_payload(reader.read_bytes(payload_len)?, tx_type, Some(id))?;
        skip_padding(reader, size)?;

        Ok(Self {
            id,
            size,
            signer_public_key,
            version,
            network,
            tx_type,
            payload,
        })
    }

    pub fn signer_address(&self) -> Address {
        Address::from_public_key(&self.signer_public_key, self.network)
    }
}

fn body_len(size: u32, header_len: usize, context: &'static str) -> Result<usize, CoreError> {
    (size as usize)
        .checked_sub(header_len)
        .ok_or(CoreError::LengthMismatch {
            context,
            expected: header_len,
            actual: size as usize,
        })
}

/// Entities are 8-byte aligned; the final entity of a buffer may omit its
/// padding.
fn skip_padding(reader: &mut Reader<'_>, size: u32) -> Result<(), CoreError> {
    let pad = padded_size(size as usize) - size as usize;
    reader.skip(pad.min(reader.remaining()))
}

// ==============================================================================
// Payload Decoding
// ==============================================================================

/// Decode a transaction payload of the given type. The payload must not
/// include the transaction header.
pub fn decode_transaction_payload(
    data: &[u8],
    tx_type: TransactionType,
) -> Result<TransactionPayload, CoreError> {
    decode_payload(data, tx_type, None)
}

/// `embedded_id` is the position of the transaction inside its aggregate,
/// `None` at top level.
fn decode_payload(
    data: &[u8],
    tx_type: TransactionType,
    embedded_id: Option<u32>,
) -> Result<TransactionPayload, CoreError> {
    let mut r = Reader::new(data, "transaction payload");

    let payload = match tx_type {
        TransactionType::AccountKeyLink => TransactionPayload::AccountKeyLink(read_key_link(&mut r)?),
        TransactionType::NodeKeyLink => TransactionPayload::NodeKeyLink(read_key_link(&mut r)?),
        TransactionType::VrfKeyLink => TransactionPayload::VrfKeyLink(read_key_link(&mut r)?),
        TransactionType::VotingKeyLink => TransactionPayload::VotingKeyLink(VotingKeyLink {
            linked_public_key: PublicKey(r.read_array()?),
            start_epoch: r.read_u32()?,
            end_epoch: r.read_u32()?,
            link_action: LinkAction::try_from(r.read_u8()?)?,
        }),
        TransactionType::AggregateComplete | TransactionType::AggregateBonded => {
            if let Some(id) = embedded_id {
                return Err(CoreError::NestedAggregate(id));
            }
            let aggregate = read_aggregate(&mut r)?;
            if tx_type == TransactionType::AggregateComplete {
                TransactionPayload::AggregateComplete(aggregate)
            } else {
                TransactionPayload::AggregateBonded(aggregate)
            }
        }
        TransactionType::MosaicDefinition => {
            TransactionPayload::MosaicDefinition(MosaicDefinition {
                id: r.read_u64()?,
                duration: r.read_u64()?,
                nonce: r.read_u32()?,
                flags: r.read_u8()?,
                divisibility: r.read_u8()?,
            })
        }
        TransactionType::MosaicSupplyChange => {
            TransactionPayload::MosaicSupplyChange(MosaicSupplyChange {
                mosaic_id: r.read_u64()?,
                delta: r.read_u64()?,
                action: r.read_u8()?,
            })
        }
        TransactionType::NamespaceRegistration => {
            TransactionPayload::NamespaceRegistration(read_namespace_registration(&mut r)?)
        }
        TransactionType::AddressAlias => TransactionPayload::AddressAlias(AddressAlias {
            namespace_id: r.read_u64()?,
            address: Address(r.read_array()?),
            alias_action: r.read_u8()?,
        }),
        TransactionType::MosaicAlias => TransactionPayload::MosaicAlias(MosaicAlias {
            namespace_id: r.read_u64()?,
            mosaic_id: r.read_u64()?,
            alias_action: r.read_u8()?,
        }),
        TransactionType::AccountMetadata => {
            TransactionPayload::AccountMetadata(read_metadata(&mut r, false)?)
        }
        TransactionType::MosaicMetadata => {
            TransactionPayload::MosaicMetadata(read_metadata(&mut r, true)?)
        }
        TransactionType::NamespaceMetadata => {
            TransactionPayload::NamespaceMetadata(read_metadata(&mut r, true)?)
        }
        TransactionType::MultisigAccountModification => {
            let min_removal_delta = r.read_i8()?;
            let min_approval_delta = r.read_i8()?;
            let additions_count = r.read_u8()?;
            let deletions_count = r.read_u8()?;
            r.skip(4)?;
            TransactionPayload::MultisigAccountModification(MultisigAccountModification {
                min_removal_delta,
                min_approval_delta,
                address_additions: read_list(&mut r, additions_count, read_address)?,
                address_deletions: read_list(&mut r, deletions_count, read_address)?,
            })
        }
        TransactionType::HashLock => TransactionPayload::HashLock(HashLock {
            mosaic: read_mosaic(&mut r)?,
            duration: r.read_u64()?,
            hash: Hash256(r.read_array()?),
        }),
        TransactionType::SecretLock => TransactionPayload::SecretLock(SecretLock {
            recipient_address: Address(r.read_array()?),
            secret: Hash256(r.read_array()?),
            mosaic: read_mosaic(&mut r)?,
            duration: r.read_u64()?,
            hash_algorithm: r.read_u8()?,
        }),
        TransactionType::SecretProof => {
            let recipient_address = Address(r.read_array()?);
            let secret = Hash256(r.read_array()?);
            let proof_size = r.read_u16()?;
            let hash_algorithm = r.read_u8()?;
            TransactionPayload::SecretProof(SecretProof {
                recipient_address,
                secret,
                hash_algorithm,
                proof: r.read_bytes(proof_size.into())?.to_vec(),
            })
        }
        TransactionType::AccountAddressRestriction => {
            TransactionPayload::AccountAddressRestriction(read_account_restriction(
                &mut r,
                read_address,
            )?)
        }
        TransactionType::AccountMosaicRestriction => TransactionPayload::AccountMosaicRestriction(
            read_account_restriction(&mut r, |r| r.read_u64())?,
        ),
        TransactionType::AccountOperationRestriction => {
            TransactionPayload::AccountOperationRestriction(read_account_restriction(
                &mut r,
                |r| r.read_u16(),
            )?)
        }
        TransactionType::MosaicGlobalRestriction => {
            TransactionPayload::MosaicGlobalRestriction(MosaicGlobalRestriction {
                mosaic_id: r.read_u64()?,
                reference_mosaic_id: r.read_u64()?,
                restriction_key: r.read_u64()?,
                previous_restriction_value: r.read_u64()?,
                new_restriction_value: r.read_u64()?,
                previous_restriction_type: r.read_u8()?,
                new_restriction_type: r.read_u8()?,
            })
        }
        TransactionType::MosaicAddressRestriction => {
            TransactionPayload::MosaicAddressRestriction(MosaicAddressRestriction {
                mosaic_id: r.read_u64()?,
                restriction_key: r.read_u64()?,
                previous_restriction_value: r.read_u64()?,
                new_restriction_value: r.read_u64()?,
                target_address: Address(r.read_array()?),
            })
        }
        TransactionType::Transfer => TransactionPayload::Transfer(read_transfer(&mut r)?),
    };

    // Aggregates keep their trailing bytes as the cosignature blob, every
    // other layout must account for the whole payload.
    r.ensure_exhausted()?;
    Ok(payload)
}

fn read_address(r: &mut Reader<'_>) -> Result<Address, CoreError> {
    Ok(Address(r.read_array()?))
}

fn read_mosaic(r: &mut Reader<'_>) -> Result<Mosaic, CoreError> {
    Ok(Mosaic {
        mosaic_id: r.read_u64()?,
        amount: r.read_u64()?,
    })
}

fn read_list<T>(
    r: &mut Reader<'_>,
    count: u8,
    read: impl Fn(&mut Reader<'_>) -> Result<T, CoreError>,
) -> Result<Vec<T>, CoreError> {
    (0..count).map(|_| read(r)).collect()
}

fn read_key_link(r: &mut Reader<'_>) -> Result<KeyLink, CoreError> {
    Ok(KeyLink {
        linked_public_key: PublicKey(r.read_array()?),
        link_action: LinkAction::try_from(r.read_u8()?)?,
    })
}

fn read_namespace_registration(r: &mut Reader<'_>) -> Result<NamespaceRegistration, CoreError> {
    let identifier = r.read_u64()?;
    let id = r.read_u64()?;
    let registration = match r.read_u8()? {
        0 => NamespaceRegistrationKind::Root {
            duration: identifier,
        },
        1 => NamespaceRegistrationKind::Child {
            parent_id: identifier,
        },
        other => return Err(CoreError::InvalidRegistrationType(other)),
    };
    let name_size = r.read_u8()?;
    Ok(NamespaceRegistration {
        id,
        registration,
        name: r.read_bytes(name_size.into())?.to_vec(),
    })
}

fn read_metadata(r: &mut Reader<'_>, has_target_id: bool) -> Result<Metadata, CoreError> {
    let target_address = Address(r.read_array()?);
    let scoped_metadata_key = r.read_u64()?;
    let target_id = if has_target_id {
        Some(r.read_u64()?)
    } else {
        None
    };
    let value_size_delta = r.read_i16()?;
    let value_size = r.read_u16()?;
    Ok(Metadata {
        target_address,
        scoped_metadata_key,
        target_id,
        value_size_delta,
        value: r.read_bytes(value_size.into())?.to_vec(),
    })
}

fn read_account_restriction<T>(
    r: &mut Reader<'_>,
    read: impl Fn(&mut Reader<'_>) -> Result<T, CoreError>,
) -> Result<AccountRestriction<T>, CoreError> {
    let restriction_flags = r.read_u16()?;
    let additions_count = r.read_u8()?;
    let deletions_count = r.read_u8()?;
    r.skip(4)?;
    Ok(AccountRestriction {
        restriction_flags,
        additions: read_list(r, additions_count, &read)?,
        deletions: read_list(r, deletions_count, &read)?,
    })
}

fn read_transfer(r: &mut Reader<'_>) -> Result<Transfer, CoreError> {
    let recipient_address = Address(r.read_array()?);
    let message_size = r.read_u16()?;
    let mosaics_count = r.read_u8()?;
    r.skip(4 + 1)?;
    let mosaics = read_list(r, mosaics_count, read_mosaic)?;
    Ok(Transfer {
        recipient_address,
        mosaics,
        message: r.read_bytes(message_size.into())?.to_vec(),
    })
}

fn read_aggregate(r: &mut Reader<'_>) -> Result<Aggregate, CoreError> {
    let transactions_hash = Hash256(r.read_array()?);
    let payload_size = r.read_u32()?;
    r.skip(4)?;

    let mut embedded = r.sub_reader(payload_size as usize, "aggregate embedded transactions")?;
    let mut embedded_transactions = Vec::new();
    while !embedded.is_empty() {
        let id = embedded_transactions.len() as u32 + 1;
        embedded_transactions.push(EmbeddedTransaction::decode(&mut embedded, id)?);
    }

    Ok(Aggregate {
        transactions_hash,
        payload_size,
        embedded_transactions,
        cosignatures: r.rest().to_vec(),
    })
}
