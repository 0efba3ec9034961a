//! Height-ordered merge of decoded blocks with the statement stream.
//!
//! Blocks and statement groups correlate by height only. Two strategies
//! share the same integrity rules: the batch reducer sorts a fully buffered
//! block set, the streaming merger holds out-of-order blocks in a min-heap
//! until the statement stream reaches their height.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::block::Block;
use crate::error::CoreError;
use crate::state::XymStateMap;
use crate::statement::StatementGroup;

use super::records::RecordSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub blocks: u64,
    pub statement_groups: u64,
    pub receipts: u64,
    /// Statement groups passed over because no block had their height.
    pub statement_groups_skipped: u64,
}

fn apply_group(
    state: &mut XymStateMap,
    group: &StatementGroup,
    sink: &mut impl RecordSink,
    stats: &mut MergeStats,
) -> Result<(), CoreError> {
    stats.receipts += state.insert_statements(group) as u64;
    stats.statement_groups += 1;
    sink.write_statements(group)
}

fn ensure_exhausted<I>(statements: &mut I) -> Result<(), CoreError>
where
    I: Iterator<Item = Result<StatementGroup, CoreError>>,
{
    let mut leftover = 0u64;
    for group in statements {
        group?;
        leftover += 1;
    }
    if leftover == 0 {
        Ok(())
    } else {
        Err(CoreError::IntegrityMismatch(format!(
            "{leftover} statement group(s) left after the last block"
        )))
    }
}

// ==============================================================================
// Batch
// ==============================================================================

/// Reduce a fully buffered block set against the statement stream.
///
/// Blocks are sorted by height and inserted one by one. A block whose
/// height is below the current statement height gets no receipts. The
/// statement stream is advanced until it reaches each block's height;
/// groups passed over on the way are counted in
/// [`MergeStats::statement_groups_skipped`]. Running out of statements
/// first is an integrity failure, as is any group left over at the end.
pub fn reduce_batch<I>(
    mut blocks: Vec<Block>,
    statements: I,
    state: &mut XymStateMap,
    sink: &mut impl RecordSink,
) -> Result<MergeStats, CoreError>
where
    I: IntoIterator<Item = Result<StatementGroup, CoreError>>,
{
    let mut statements = statements.into_iter();
    let mut stats = MergeStats::default();
    let mut current: Option<StatementGroup> = None;
    let mut current_applied = false;

    blocks.sort_by_key(Block::height);
    for block in &blocks {
        let height = block.height();
        state.insert_block(block)?;
        sink.write_block(block)?;
        stats.blocks += 1;

        if current.as_ref().is_some_and(|group| group.height > height) {
            continue;
        }

        while current.as_ref().map_or(true, |group| group.height < height) {
            if let Some(group) = &current {
                if !current_applied {
                    tracing::warn!(height = group.height, "no block for statement group");
                    stats.statement_groups_skipped += 1;
                }
            }
            current = Some(statements.next().transpose()?.ok_or_else(|| {
                CoreError::IntegrityMismatch(format!(
                    "statement stream ended before block height {height}"
                ))
            })?);
            current_applied = false;
        }

        if let Some(group) = &current {
            if group.height == height && !current_applied {
                apply_group(state, group, sink, &mut stats)?;
                current_applied = true;
            }
        }
    }

    if let Some(group) = current.as_ref().filter(|_| !current_applied) {
        return Err(CoreError::IntegrityMismatch(format!(
            "statement group at height {} has no block",
            group.height
        )));
    }
    ensure_exhausted(&mut statements)?;
    tracing::info!(
        blocks = stats.blocks,
        statement_groups = stats.statement_groups,
        receipts = stats.receipts,
        "batch merge complete"
    );
    Ok(stats)
}

// ==============================================================================
// Streaming
// ==============================================================================

/// Heap entry: ordered by height, then arrival order.
struct PendingBlock {
    height: u64,
    seq: u64,
    block: Block,
}

impl PartialEq for PendingBlock {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingBlock {}

impl PartialOrd for PendingBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.height, self.seq).cmp(&(other.height, other.seq))
    }
}

/// Incrementally merges blocks arriving in any order with the statement
/// stream. Memory use is bounded by how far block arrival runs ahead of
/// the statement stream.
pub struct StreamingMerger<I>
where
    I: Iterator<Item = Result<StatementGroup, CoreError>>,
{
    state: XymStateMap,
    statements: I,
    current: Option<StatementGroup>,
    pending: BinaryHeap<Reverse<PendingBlock>>,
    seq: u64,
    stats: MergeStats,
}

impl<I> StreamingMerger<I>
where
    I: Iterator<Item = Result<StatementGroup, CoreError>>,
{
    pub fn new(state: XymStateMap, mut statements: I) -> Result<Self, CoreError> {
        let current = statements.next().transpose()?;
        Ok(Self {
            state,
            statements,
            current,
            pending: BinaryHeap::new(),
            seq: 0,
            stats: MergeStats::default(),
        })
    }

    /// Blocks waiting for their statement group.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn state(&self) -> &XymStateMap {
        &self.state
    }

    /// Record `block`, then reduce every pending block whose height matches
    /// the next statement group.
    pub fn push(&mut self, block: Block, sink: &mut impl RecordSink) -> Result<(), CoreError> {
        sink.write_block(&block)?;
        self.pending.push(Reverse(PendingBlock {
            height: block.height(),
            seq: self.seq,
            block,
        }));
        self.seq += 1;

        loop {
            let Some(group) = &self.current else {
                break;
            };
            let ready = self
                .pending
                .peek()
                .is_some_and(|Reverse(next)| next.height == group.height);
            if !ready {
                break;
            }
            let Some(Reverse(next)) = self.pending.pop() else {
                break;
            };

            self.state.insert_block(&next.block)?;
            self.stats.blocks += 1;
            apply_group(&mut self.state, group, sink, &mut self.stats)?;
            self.current = self.statements.next().transpose()?;
        }
        Ok(())
    }

    /// Fails if any block is still waiting or any statement group was never
    /// matched.
    pub fn finish(mut self) -> Result<(XymStateMap, MergeStats), CoreError> {
        if let Some(Reverse(next)) = self.pending.peek() {
            return Err(CoreError::IntegrityMismatch(format!(
                "{} block(s) without statements, lowest height {}",
                self.pending.len(),
                next.height
            )));
        }
        if let Some(group) = &self.current {
            return Err(CoreError::IntegrityMismatch(format!(
                "statement group at height {} has no block",
                group.height
            )));
        }
        ensure_exhausted(&mut self.statements)?;
        tracing::info!(
            blocks = self.stats.blocks,
            statement_groups = self.stats.statement_groups,
            receipts = self.stats.receipts,
            "streaming merge complete"
        );
        Ok((self.state, self.stats))
    }
}
