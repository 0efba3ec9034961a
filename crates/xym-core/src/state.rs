//! Chain state accumulator.
//!
//! [`XymStateMap`] folds decoded blocks and receipts, in height order, into
//! per-account histories: sparse XYM balance deltas, harvest fees,
//! delegation requests, key-link intervals and harvesting relationships.
//! The whole map persists as a versioned bincode snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::block::{Block, NETWORK_EPOCH_UNIX_SECS};
use crate::error::CoreError;
use crate::receipt::{Receipt, ReceiptPayload, ReceiptType};
use crate::statement::StatementGroup;
use crate::transaction::{KeyLink, LinkAction, Transaction, TransactionPayload};
use crate::types::XYM_MOSAIC_IDS;

/// End height of a link interval that has not been closed yet.
pub const INFINITE_HEIGHT: u64 = u64::MAX;

const SNAPSHOT_MAGIC: &[u8; 8] = b"XYMSTATE";
const SNAPSHOT_VERSION: u32 = 1;

// ==============================================================================
// Account State
// ==============================================================================

/// Inclusive height range during which a key link was active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInterval {
    pub start: u64,
    /// [`INFINITE_HEIGHT`] while the link is open.
    pub end: u64,
}

impl LinkInterval {
    pub fn is_open(&self) -> bool {
        self.end == INFINITE_HEIGHT
    }

    pub fn contains(&self, height: u64) -> bool {
        self.start <= height && height <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Vrf,
    Node,
    Account,
}

impl LinkKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Vrf => "vrf_key_link",
            Self::Node => "node_key_link",
            Self::Account => "account_key_link",
        }
    }
}

/// Everything recorded for one address. Records are created on first
/// touch and never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Height → net XYM change (micro-units) at that height.
    pub xym_balance: BTreeMap<u64, i64>,
    /// Height → harvest fee credited at that height.
    pub harvest_fees: BTreeMap<u64, u64>,
    /// Remote address → heights at which delegation was requested.
    pub delegation_requests: BTreeMap<Address, Vec<u64>>,
    pub vrf_key_link: BTreeMap<Address, Vec<LinkInterval>>,
    pub node_key_link: BTreeMap<Address, Vec<LinkInterval>>,
    pub account_key_link: BTreeMap<Address, Vec<LinkInterval>>,
    /// Height → beneficiary of a block this account harvested.
    pub harvested: BTreeMap<u64, Address>,
    /// Height → harvester of a block that paid this account as beneficiary.
    pub delegated: BTreeMap<u64, Address>,
}

impl AccountState {
    fn links_mut(&mut self, kind: LinkKind) -> &mut BTreeMap<Address, Vec<LinkInterval>> {
        match kind {
            LinkKind::Vrf => &mut self.vrf_key_link,
            LinkKind::Node => &mut self.node_key_link,
            LinkKind::Account => &mut self.account_key_link,
        }
    }

    /// Balance after applying every delta at or below `height`.
    pub fn balance_at(&self, height: u64) -> i64 {
        self.xym_balance.range(..=height).map(|(_, delta)| delta).sum()
    }

    pub fn total_harvest_fees(&self) -> u64 {
        self.harvest_fees.values().sum()
    }
}

/// One point of an account's balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub height: u64,
    pub delta: i64,
    pub balance: i64,
    /// Unix milliseconds of the block, when its timestamp was recorded.
    pub unix_timestamp_ms: Option<u64>,
}

// ==============================================================================
// State Map
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XymStateMap {
    accounts: HashMap<Address, AccountState>,
    /// Linked (remote) address → main account, from account key links.
    account_map: HashMap<Address, Address>,
    /// Height → network timestamp (ms since the network epoch).
    block_timestamps: BTreeMap<u64, u64>,
    tracked_mosaics: Vec<u64>,
}

impl Default for XymStateMap {
    fn default() -> Self {
        Self::with_tracked_mosaics(XYM_MOSAIC_IDS.to_vec())
    }
}

impl XymStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map counting balances of `tracked_mosaics` instead of the XYM ids.
    pub fn with_tracked_mosaics(tracked_mosaics: Vec<u64>) -> Self {
        Self {
            accounts: HashMap::new(),
            account_map: HashMap::new(),
            block_timestamps: BTreeMap::new(),
            tracked_mosaics,
        }
    }

    pub fn tracked_mosaics(&self) -> &[u64] {
        &self.tracked_mosaics
    }

    fn is_tracked(&self, mosaic_id: u64) -> bool {
        self.tracked_mosaics.contains(&mosaic_id)
    }

    /// Get-or-create the record for `address`.
    pub fn account_mut(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_default()
    }

    pub fn get(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.accounts.keys()
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Main account behind a linked (remote) address, or the address itself.
    pub fn main_account(&self, address: &Address) -> Address {
        self.account_map.get(address).copied().unwrap_or(*address)
    }

    pub fn block_timestamp(&self, height: u64) -> Option<u64> {
        self.block_timestamps.get(&height).copied()
    }

    fn add_balance(&mut self, address: Address, height: u64, delta: i64) {
        *self.account_mut(address).xym_balance.entry(height).or_insert(0) += delta;
    }

    // ==========================================================================
    // Insertion
    // ==========================================================================

    /// Record harvesting information for `block`, then apply each of its
    /// top-level transactions with the block's fee multiplier.
    pub fn insert_block(&mut self, block: &Block) -> Result<(), CoreError> {
        let header = &block.header;
        let height = header.height;
        self.block_timestamps.insert(height, header.timestamp);

        let harvester = self.main_account(&header.harvester);
        let beneficiary = header.beneficiary_address;
        self.account_mut(harvester).harvested.insert(height, beneficiary);
        if harvester != beneficiary {
            self.account_mut(beneficiary).delegated.insert(height, harvester);
        }

        for tx in &block.footer.transactions {
            self.insert_transaction(tx, height, Some(header.fee_multiplier))?;
        }
        Ok(())
    }

    /// Apply one top-level transaction at `height`. The signer is charged
    /// `min(max_fee, size * fee_multiplier)` when a multiplier is given.
    pub fn insert_transaction(
        &mut self,
        tx: &Transaction,
        height: u64,
        fee_multiplier: Option<u32>,
    ) -> Result<(), CoreError> {
        let signer = tx.signer_address();
        self.apply_payload(signer, tx.network, &tx.payload, height)?;

        if let Some(multiplier) = fee_multiplier {
            self.add_balance(signer, height, -to_delta(tx.fee(multiplier)));
        }
        Ok(())
    }

    fn apply_payload(
        &mut self,
        signer: Address,
        network: u8,
        payload: &TransactionPayload,
        height: u64,
    ) -> Result<(), CoreError> {
        match payload {
            TransactionPayload::Transfer(transfer) => {
                if transfer.is_delegation_request() {
                    self.account_mut(signer)
                        .delegation_requests
                        .entry(transfer.recipient_address)
                        .or_default()
                        .push(height);
                } else {
                    for mosaic in &transfer.mosaics {
                        if self.is_tracked(mosaic.mosaic_id) {
                            let amount = to_delta(mosaic.amount);
                            self.add_balance(signer, height, -amount);
                            self.add_balance(transfer.recipient_address, height, amount);
                        }
                    }
                }
            }
            TransactionPayload::VrfKeyLink(link) => {
                self.apply_link(signer, network, link, LinkKind::Vrf, height)?
            }
            TransactionPayload::NodeKeyLink(link) => {
                self.apply_link(signer, network, link, LinkKind::Node, height)?
            }
            TransactionPayload::AccountKeyLink(link) => {
                let linked = Address::from_public_key(&link.linked_public_key, network);
                self.account_map.insert(linked, signer);
                self.apply_link(signer, network, link, LinkKind::Account, height)?
            }
            TransactionPayload::AggregateComplete(aggregate)
            | TransactionPayload::AggregateBonded(aggregate) => {
                for embedded in &aggregate.embedded_transactions {
                    self.apply_payload(
                        embedded.signer_address(),
                        embedded.network,
                        &embedded.payload,
                        height,
                    )?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_link(
        &mut self,
        signer: Address,
        network: u8,
        link: &KeyLink,
        kind: LinkKind,
        height: u64,
    ) -> Result<(), CoreError> {
        let linked = Address::from_public_key(&link.linked_public_key, network);
        let intervals = self
            .account_mut(signer)
            .links_mut(kind)
            .entry(linked)
            .or_default();

        match link.link_action {
            LinkAction::Link => intervals.push(LinkInterval {
                start: height,
                end: INFINITE_HEIGHT,
            }),
            LinkAction::Unlink => match intervals.last_mut() {
                Some(last) if last.is_open() => last.end = height,
                _ => {
                    return Err(CoreError::UnlinkWithoutLink {
                        account: signer,
                        linked,
                        category: kind.as_str(),
                        height,
                    })
                }
            },
        }
        Ok(())
    }

    /// Apply `receipt`, and any receipts grouped under it, at `height`.
    pub fn insert_receipt(&mut self, receipt: &Receipt, height: u64) {
        for leaf in receipt.flatten() {
            self.apply_receipt(leaf, height);
        }
    }

    fn apply_receipt(&mut self, receipt: &Receipt, height: u64) {
        match &receipt.payload {
            ReceiptPayload::BalanceTransfer(transfer) => {
                if self.is_tracked(transfer.mosaic_id) {
                    let amount = to_delta(transfer.amount);
                    self.add_balance(transfer.sender_address, height, -amount);
                    self.add_balance(transfer.recipient_address, height, amount);
                }
            }
            ReceiptPayload::BalanceCredit(credit) => {
                self.add_balance(credit.target_address, height, to_delta(credit.amount));
                if receipt.receipt_type == ReceiptType::HarvestFee {
                    *self
                        .account_mut(credit.target_address)
                        .harvest_fees
                        .entry(height)
                        .or_insert(0) += credit.amount;
                }
            }
            ReceiptPayload::BalanceDebit(debit) => {
                self.add_balance(debit.target_address, height, -to_delta(debit.amount));
            }
            // Members arrive separately through `flatten`.
            ReceiptPayload::TransactionGroup(_)
            | ReceiptPayload::Reserved
            | ReceiptPayload::ArtifactExpiry { .. }
            | ReceiptPayload::Inflation { .. } => {}
        }
    }

    /// Apply every receipt of `group` at the group's height. Returns the
    /// number of top-level receipts applied.
    pub fn insert_statements(&mut self, group: &StatementGroup) -> usize {
        let mut applied = 0;
        for receipt in group.receipts() {
            self.insert_receipt(receipt, group.height);
            applied += 1;
        }
        applied
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// Per-height balance history of `address`, oldest first.
    pub fn get_balance_series(&self, address: &Address) -> Vec<BalancePoint> {
        let Some(account) = self.accounts.get(address) else {
            return Vec::new();
        };
        let mut balance = 0i64;
        account
            .xym_balance
            .iter()
            .map(|(&height, &delta)| {
                balance += delta;
                BalancePoint {
                    height,
                    delta,
                    balance,
                    unix_timestamp_ms: self
                        .block_timestamp(height)
                        .map(|ts| NETWORK_EPOCH_UNIX_SECS * 1000 + ts),
                }
            })
            .collect()
    }

    /// Balance of `address` after every change at or below `height`.
    pub fn balance_at(&self, address: &Address, height: u64) -> i64 {
        self.accounts
            .get(address)
            .map_or(0, |account| account.balance_at(height))
    }

    // ==========================================================================
    // Snapshot
    // ==========================================================================

    pub fn to_snapshot(&self) -> Result<Vec<u8>, CoreError> {
        let body = bincode::serialize(self).map_err(|e| CoreError::Snapshot(e.to_string()))?;
        let mut out = Vec::with_capacity(SNAPSHOT_MAGIC.len() + 4 + body.len());
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, CoreError> {
        let header_len = SNAPSHOT_MAGIC.len() + 4;
        if bytes.len() < header_len || &bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(CoreError::Snapshot("missing snapshot magic".into()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[SNAPSHOT_MAGIC.len()..header_len]);
        let version = u32::from_le_bytes(version);
        if version != SNAPSHOT_VERSION {
            return Err(CoreError::Snapshot(format!(
                "unsupported snapshot version {version}, expected {SNAPSHOT_VERSION}"
            )));
        }
        bincode::deserialize(&bytes[header_len..]).map_err(|e| CoreError::Snapshot(e.to_string()))
    }

    pub fn write_snapshot(&self, path: &Path) -> Result<(), CoreError> {
        let bytes = self.to_snapshot()?;
        fs::write(path, &bytes)?;
        tracing::info!(
            path = %path.display(),
            accounts = self.len(),
            bytes = bytes.len(),
            "wrote state snapshot"
        );
        Ok(())
    }

    pub fn read_snapshot(path: &Path) -> Result<Self, CoreError> {
        let state = Self::from_snapshot(&fs::read(path)?)?;
        tracing::debug!(path = %path.display(), accounts = state.len(), "read state snapshot");
        Ok(state)
    }
}

/// Amounts are unsigned on the wire; deltas are signed. Real supply fits
/// comfortably, so out-of-range values saturate.
fn to_delta(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
