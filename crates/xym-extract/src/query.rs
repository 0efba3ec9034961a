//! Read-side subcommands over a state snapshot.

use std::path::Path;

use eyre::WrapErr;

use xym_core::harvesters::{BubbleParams, HarvesterBubble, HarvesterGraph, HarvesterGraphParams};
use xym_core::state::BalancePoint;
use xym_core::{Address, XymStateMap};

use crate::cli::{BalanceArgs, BubblesArgs, HarvestersArgs};

fn load(snapshot: &Path) -> eyre::Result<XymStateMap> {
    XymStateMap::read_snapshot(snapshot)
        .wrap_err_with(|| format!("load state snapshot {}", snapshot.display()))
}

pub fn balance(args: &BalanceArgs) -> eyre::Result<Vec<BalancePoint>> {
    let address: Address = args.address.parse().context("parse --address")?;
    if !address.has_valid_checksum() {
        tracing::warn!(%address, "address checksum does not match; querying it as given");
    }
    let state = load(&args.snapshot)?;
    let series = state.get_balance_series(&address);
    if series.is_empty() {
        tracing::warn!(%address, "address has no balance history");
    }
    Ok(series)
}

pub fn harvesters(args: &HarvestersArgs) -> eyre::Result<HarvesterGraph> {
    let state = load(&args.snapshot)?;
    let params = HarvesterGraphParams {
        height: args.height.unwrap_or(u64::MAX),
        min_harvester_size: args.min_harvester_size,
        min_node_size: args.min_node_size,
        track_remote: args.track_remote,
    };
    Ok(state.get_harvester_graph(&params))
}

pub fn bubbles(args: &BubblesArgs) -> eyre::Result<Vec<HarvesterBubble>> {
    let state = load(&args.snapshot)?;
    let params = BubbleParams {
        min_height: args.min_height,
        max_height: args.max_height.unwrap_or(u64::MAX),
        min_harvester_size: args.min_harvester_size,
        min_delegate_size: args.min_delegate_size,
    };
    Ok(state.get_harvester_bubbles(&params))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use xym_core::block::{decode_block, BlockReadOptions};
    use xym_core::codec::Reader;
    use xym_core::harvesters::BubbleKind;
    use xym_core::test_util::{address_from_byte, block_bytes, public_key_from_byte, BlockSpec};

    use super::*;

    /// Account 0x10 harvests heights 1..=3, the last one for delegate 0x11.
    fn snapshot(dir: &Path) -> PathBuf {
        let mut state = XymStateMap::new();
        for height in 1..=3 {
            let spec = BlockSpec {
                signer: public_key_from_byte(0x10),
                beneficiary: (height == 3).then(|| address_from_byte(0x11)),
                ..BlockSpec::normal(height)
            };
            let bytes = block_bytes(&spec, &[]);
            let block = decode_block(&mut Reader::new(&bytes, "test"), BlockReadOptions::default())
                .expect("decode block");
            state.insert_block(&block).expect("insert block");
        }
        let path = dir.join("state_map.bin");
        state.write_snapshot(&path).expect("write snapshot");
        path
    }

    #[test]
    fn bubbles_read_from_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = BubblesArgs {
            snapshot: snapshot(dir.path()),
            min_height: 0,
            max_height: None,
            min_harvester_size: 1,
            min_delegate_size: 1,
        };
        let bubbles = bubbles(&args).expect("bubbles");

        let node = bubbles
            .iter()
            .find(|b| b.address == address_from_byte(0x10))
            .expect("node bubble");
        assert_eq!(node.kind, BubbleKind::Node);
        assert_eq!(node.size, 3);

        let delegate = bubbles
            .iter()
            .find(|b| b.address == address_from_byte(0x11))
            .expect("delegate bubble");
        assert_eq!(delegate.kind, BubbleKind::Delegate);
        assert_eq!(delegate.parent, Some(address_from_byte(0x10)));
    }

    #[test]
    fn balance_rejects_malformed_address() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = BalanceArgs {
            snapshot: snapshot(dir.path()),
            address: "not-an-address".into(),
        };
        assert!(balance(&args).is_err());
    }

    #[test]
    fn balance_of_unknown_address_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = BalanceArgs {
            snapshot: snapshot(dir.path()),
            address: address_from_byte(0x55).to_string(),
        };
        assert!(balance(&args).expect("balance").is_empty());
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let args = HarvestersArgs {
            snapshot: PathBuf::from("/nonexistent/state_map.bin"),
            height: None,
            min_harvester_size: 0.0,
            min_node_size: 0.0,
            track_remote: false,
        };
        let err = harvesters(&args).unwrap_err();
        assert!(format!("{err:#}").contains("load state snapshot"));
    }
}
