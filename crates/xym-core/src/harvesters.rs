//! Harvesting relationship views over an accumulated [`XymStateMap`].
//!
//! Two views: a node graph at a single height (which harvesters are
//! delegated to which node through an active node key link) and a bubble
//! summary over a height range (how many blocks each account harvested or
//! had harvested on its behalf).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::state::{AccountState, XymStateMap};

/// Micro-units per whole XYM.
const MICRO_XYM: f64 = 1_000_000.0;

// ==============================================================================
// Harvester Graph
// ==============================================================================

/// Thresholds for [`XymStateMap::get_harvester_graph`]. Sizes are whole XYM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvesterGraphParams {
    /// Height at which link state and balances are evaluated.
    pub height: u64,
    /// Accounts holding less than this are ignored.
    pub min_harvester_size: f64,
    /// Nodes whose delegated balance totals less than this are dropped.
    pub min_node_size: f64,
    /// Also report accounts that harvested without a node key link.
    pub track_remote: bool,
}

impl Default for HarvesterGraphParams {
    fn default() -> Self {
        Self {
            height: u64::MAX,
            min_harvester_size: 10_000.0,
            min_node_size: 10_000.0,
            track_remote: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvesterNodeKind {
    Node,
    DelegatedHarvester,
    RemoteHarvester,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvesterGraphNode {
    pub address: Address,
    pub kind: HarvesterNodeKind,
    /// Whole XYM (summed over delegates for nodes).
    pub balance: f64,
    /// Square root of `balance`, for plotting.
    pub size: f64,
    /// Blocks since the current link started (mean over delegates for nodes).
    pub link_age: f64,
    /// First height with a balance change (earliest link start for nodes).
    pub min_height: u64,
}

/// Node → delegated harvester edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvesterGraphEdge {
    pub node: Address,
    pub harvester: Address,
    pub link_age: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvesterGraph {
    pub nodes: Vec<HarvesterGraphNode>,
    pub edges: Vec<HarvesterGraphEdge>,
}

struct Delegate {
    harvester: Address,
    balance: f64,
    link_age: u64,
    link_start: u64,
}

/// Node linked at `height`, if any, and the start of the relevant link
/// period (the active link's start, else the latest end seen).
fn active_node_link(account: &AccountState, height: u64) -> (Option<Address>, u64) {
    let mut link_start = 0;
    for (node, intervals) in &account.node_key_link {
        for interval in intervals {
            if interval.contains(height) {
                return (Some(*node), interval.start);
            }
            link_start = link_start.max(interval.end);
        }
    }
    (None, link_start)
}

impl XymStateMap {
    pub fn get_harvester_graph(&self, params: &HarvesterGraphParams) -> HarvesterGraph {
        let height = params.height;
        let mut harvesters = BTreeMap::new();
        let mut delegates_by_node: BTreeMap<Address, Vec<Delegate>> = BTreeMap::new();

        for (address, account) in self.accounts() {
            let balance = account.balance_at(height) as f64 / MICRO_XYM;
            if balance < params.min_harvester_size {
                continue;
            }

            let (node, link_start) = active_node_link(account, height);
            let link_age = height.saturating_sub(link_start);
            let min_height = account.xym_balance.keys().next().copied().unwrap_or(0);
            let entry = |kind| HarvesterGraphNode {
                address: *address,
                kind,
                balance,
                size: balance.sqrt(),
                link_age: link_age as f64,
                min_height,
            };

            match node {
                Some(node) => {
                    harvesters.insert(*address, entry(HarvesterNodeKind::DelegatedHarvester));
                    delegates_by_node.entry(node).or_default().push(Delegate {
                        harvester: *address,
                        balance,
                        link_age,
                        link_start,
                    });
                }
                None if params.track_remote => {
                    let harvested = if link_start <= height {
                        account.harvested.range(link_start..=height).count()
                    } else {
                        0
                    };
                    if harvested > 0 {
                        harvesters.insert(*address, entry(HarvesterNodeKind::RemoteHarvester));
                    }
                }
                None => {}
            }
        }

        let mut graph = HarvesterGraph::default();
        for (node, delegates) in &delegates_by_node {
            let total: f64 = delegates.iter().map(|d| d.balance).sum();
            if total < params.min_node_size {
                continue;
            }
            let mean_age =
                delegates.iter().map(|d| d.link_age as f64).sum::<f64>() / delegates.len() as f64;
            harvesters.insert(
                *node,
                HarvesterGraphNode {
                    address: *node,
                    kind: HarvesterNodeKind::Node,
                    balance: total,
                    size: total.sqrt(),
                    link_age: mean_age,
                    min_height: delegates.iter().map(|d| d.link_start).min().unwrap_or(0),
                },
            );
            graph.edges.extend(delegates.iter().map(|d| HarvesterGraphEdge {
                node: *node,
                harvester: d.harvester,
                link_age: d.link_age,
            }));
        }
        graph.nodes = harvesters.into_values().collect();

        tracing::debug!(
            height,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "built harvester graph"
        );
        graph
    }
}

// ==============================================================================
// Harvester Bubbles
// ==============================================================================

/// Height range and thresholds for [`XymStateMap::get_harvester_bubbles`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BubbleParams {
    pub min_height: u64,
    pub max_height: u64,
    /// Minimum harvested blocks for an account to appear as a node.
    pub min_harvester_size: usize,
    /// Minimum delegated blocks for an account to appear as a delegate.
    pub min_delegate_size: usize,
}

impl Default for BubbleParams {
    fn default() -> Self {
        Self {
            min_height: 0,
            max_height: u64::MAX,
            min_harvester_size: 1,
            min_delegate_size: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleKind {
    Node,
    Delegate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvesterBubble {
    pub address: Address,
    pub kind: BubbleKind,
    /// Number of blocks in range.
    pub size: usize,
    /// For delegates: the harvester that most often harvested on their
    /// behalf.
    pub parent: Option<Address>,
}

impl XymStateMap {
    /// Accounts that appear both as harvester and delegate are reported
    /// once, as a delegate.
    pub fn get_harvester_bubbles(&self, params: &BubbleParams) -> Vec<HarvesterBubble> {
        if params.min_height > params.max_height {
            return Vec::new();
        }
        let range = params.min_height..=params.max_height;
        let mut bubbles = BTreeMap::new();

        for (address, account) in self.accounts() {
            let harvested = account.harvested.range(range.clone()).count();
            if harvested > 0 && harvested >= params.min_harvester_size {
                bubbles.insert(
                    *address,
                    HarvesterBubble {
                        address: *address,
                        kind: BubbleKind::Node,
                        size: harvested,
                        parent: None,
                    },
                );
            }
        }

        for (address, account) in self.accounts() {
            let mut counts: BTreeMap<Address, usize> = BTreeMap::new();
            for (_, harvester) in account.delegated.range(range.clone()) {
                *counts.entry(*harvester).or_insert(0) += 1;
            }
            let delegated: usize = counts.values().sum();
            if delegated == 0 || delegated < params.min_delegate_size {
                continue;
            }
            // Ties go to the lowest address.
            let parent = counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(harvester, _)| *harvester);
            bubbles.insert(
                *address,
                HarvesterBubble {
                    address: *address,
                    kind: BubbleKind::Delegate,
                    size: delegated,
                    parent,
                },
            );
        }

        bubbles.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LinkInterval, INFINITE_HEIGHT};
    use crate::test_util::address_from_byte;

    fn funded(state: &mut XymStateMap, b: u8, height: u64, xym: i64) -> Address {
        let address = address_from_byte(b);
        state
            .account_mut(address)
            .xym_balance
            .insert(height, xym * 1_000_000);
        address
    }

    fn link(state: &mut XymStateMap, account: Address, node: Address, start: u64, end: u64) {
        state
            .account_mut(account)
            .node_key_link
            .entry(node)
            .or_default()
            .push(LinkInterval { start, end });
    }

    #[test]
    fn graph_groups_delegates_under_active_node() {
        let mut state = XymStateMap::new();
        let node = address_from_byte(100);
        let a = funded(&mut state, 1, 10, 20_000);
        let b = funded(&mut state, 2, 20, 30_000);
        let small = funded(&mut state, 3, 5, 50);
        let expired = funded(&mut state, 4, 5, 50_000);
        link(&mut state, a, node, 100, INFINITE_HEIGHT);
        link(&mut state, b, node, 150, INFINITE_HEIGHT);
        link(&mut state, small, node, 100, INFINITE_HEIGHT);
        link(&mut state, expired, node, 50, 120);

        let graph = state.get_harvester_graph(&HarvesterGraphParams {
            height: 200,
            ..HarvesterGraphParams::default()
        });

        let node_entry = graph
            .nodes
            .iter()
            .find(|n| n.address == node)
            .expect("node present");
        assert_eq!(node_entry.kind, HarvesterNodeKind::Node);
        assert_eq!(node_entry.balance, 50_000.0);
        assert_eq!(node_entry.link_age, 75.0);
        assert_eq!(node_entry.min_height, 100);

        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges.iter().all(|e| e.node == node));
        assert!(graph.nodes.iter().all(|n| n.address != small));
        // An expired link is not reported without remote tracking.
        assert!(graph.nodes.iter().all(|n| n.address != expired));
    }

    #[test]
    fn graph_tracks_remote_harvesters_on_request() {
        let mut state = XymStateMap::new();
        let solo = funded(&mut state, 1, 1, 20_000);
        state.account_mut(solo).harvested.insert(50, solo);

        let without = state.get_harvester_graph(&HarvesterGraphParams::default());
        assert!(without.nodes.is_empty());

        let with = state.get_harvester_graph(&HarvesterGraphParams {
            height: 100,
            track_remote: true,
            ..HarvesterGraphParams::default()
        });
        assert_eq!(with.nodes.len(), 1);
        assert_eq!(with.nodes[0].kind, HarvesterNodeKind::RemoteHarvester);
        assert_eq!(with.nodes[0].min_height, 1);
    }

    #[test]
    fn graph_drops_small_nodes() {
        let mut state = XymStateMap::new();
        let node = address_from_byte(100);
        let a = funded(&mut state, 1, 1, 15_000);
        link(&mut state, a, node, 1, INFINITE_HEIGHT);

        let graph = state.get_harvester_graph(&HarvesterGraphParams {
            height: 10,
            min_node_size: 20_000.0,
            ..HarvesterGraphParams::default()
        });
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].kind, HarvesterNodeKind::DelegatedHarvester);
    }

    #[test]
    fn bubbles_count_blocks_in_range() {
        let mut state = XymStateMap::new();
        let harvester = address_from_byte(1);
        let other = address_from_byte(2);
        let delegate = address_from_byte(3);
        for height in [10, 20, 30] {
            state.account_mut(harvester).harvested.insert(height, delegate);
            state.account_mut(delegate).delegated.insert(height, harvester);
        }
        state.account_mut(other).harvested.insert(25, delegate);
        state.account_mut(delegate).delegated.insert(25, other);

        let bubbles = state.get_harvester_bubbles(&BubbleParams {
            min_height: 15,
            max_height: 30,
            ..BubbleParams::default()
        });
        let by_address: BTreeMap<_, _> = bubbles.iter().map(|b| (b.address, b)).collect();

        assert_eq!(by_address[&harvester].kind, BubbleKind::Node);
        assert_eq!(by_address[&harvester].size, 2);
        assert_eq!(by_address[&other].size, 1);
        assert_eq!(by_address[&delegate].kind, BubbleKind::Delegate);
        assert_eq!(by_address[&delegate].size, 3);
        assert_eq!(by_address[&delegate].parent, Some(harvester));

        let strict = state.get_harvester_bubbles(&BubbleParams {
            min_harvester_size: 3,
            min_delegate_size: 5,
            ..BubbleParams::default()
        });
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].address, harvester);
    }
}
