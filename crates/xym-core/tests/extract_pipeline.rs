use std::fs;
use std::path::Path;
use std::sync::Once;

use xym_core::block::{read_block_file, Block, BlockFileReader, BlockReadOptions, DB_OFFSET_BYTES};
use xym_core::extract::{
    discover_files, reduce_batch, ExtractPaths, FileSink, RecordReader, StreamingMerger,
};
use xym_core::receipt::ReceiptType;
use xym_core::statement::{StatementGroup, StatementStream};
use xym_core::test_util::{
    address_from_byte, balance_change_receipt, block_bytes, block_file, public_key_from_byte,
    statement_file, top_level_tx, transfer_payload, BlockSpec, StatementSpec,
};
use xym_core::transaction::TransactionType;
use xym_core::types::XYM_MOSAIC_IDS;
use xym_core::{CoreError, XymStateMap};

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xym_core=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

const SENDER: u8 = 0x21;
const RECIPIENT: u8 = 0x22;
const TRANSFER_AMOUNT: u64 = 5_000_000;
const MAX_FEE: u64 = 1_000;
const HARVEST_FEE: u64 = 100;

/// Lay out a small data directory: blocks 1..=3 over two nested block files
/// and `statement_groups` groups over two statement files. Block 2 carries
/// one transfer; group 1 credits the harvester.
fn write_data_dir(root: &Path, statement_groups: u64) {
    let blocks_dir = root.join("00000");
    fs::create_dir_all(&blocks_dir).expect("create block dir");

    let transfer = top_level_tx(
        public_key_from_byte(SENDER),
        TransactionType::Transfer,
        MAX_FEE,
        &transfer_payload(
            address_from_byte(RECIPIENT).0,
            &[(XYM_MOSAIC_IDS[0], TRANSFER_AMOUNT)],
            &[],
        ),
    );
    let block_2 = BlockSpec {
        fee_multiplier: 10,
        ..BlockSpec::normal(2)
    };
    fs::write(
        blocks_dir.join("00001.dat"),
        block_file(&[
            block_bytes(&BlockSpec::normal(1), &[]),
            block_bytes(&block_2, &[transfer]),
        ]),
    )
    .expect("write block file 1");
    fs::write(
        blocks_dir.join("00002.dat"),
        block_file(&[block_bytes(&BlockSpec::normal(3), &[])]),
    )
    .expect("write block file 2");

    let mut groups: Vec<StatementSpec> = (1..=statement_groups)
        .map(|_| StatementSpec::empty())
        .collect();
    if let Some(first) = groups.first_mut() {
        *first = StatementSpec::with_receipts(vec![balance_change_receipt(
            ReceiptType::HarvestFee,
            XYM_MOSAIC_IDS[0],
            HARVEST_FEE,
            harvester().0,
        )]);
    }
    let split = groups.len().min(2);
    fs::write(blocks_dir.join("00001.stmt"), statement_file(&groups[..split]))
        .expect("write statement file 1");
    fs::write(blocks_dir.join("00002.stmt"), statement_file(&groups[split..]))
        .expect("write statement file 2");

    // Not matching the store file pattern.
    fs::write(root.join("index.dat"), b"ignored").expect("write decoy");
}

fn harvester() -> xym_core::Address {
    address_from_byte(0xB0)
}

fn statements(root: &Path) -> StatementStream {
    let paths = discover_files(root, ".stmt").expect("discover statements");
    StatementStream::new(paths, DB_OFFSET_BYTES)
}

fn read_all_blocks(root: &Path) -> Vec<Block> {
    discover_files(root, ".dat")
        .expect("discover blocks")
        .iter()
        .flat_map(|path| {
            read_block_file(path, DB_OFFSET_BYTES, BlockReadOptions::default())
                .expect("read block file")
        })
        .collect()
}

fn assert_expected_state(state: &XymStateMap) {
    let sender = address_from_byte(SENDER);
    let recipient = address_from_byte(RECIPIENT);

    assert_eq!(state.balance_at(&harvester(), 3), HARVEST_FEE as i64);
    assert_eq!(state.balance_at(&recipient, 1), 0);
    assert_eq!(state.balance_at(&recipient, 2), TRANSFER_AMOUNT as i64);
    // 176-byte transaction at multiplier 10 is capped by max_fee.
    assert_eq!(
        state.balance_at(&sender, 3),
        -((TRANSFER_AMOUNT + MAX_FEE) as i64)
    );

    let harvested = &state.get(&harvester()).expect("harvester account").harvested;
    assert_eq!(harvested.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

    let series = state.get_balance_series(&recipient);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].height, 2);
    assert!(series[0].unix_timestamp_ms.is_some());
}

#[test]
fn discovery_matches_only_numbered_store_files() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    write_data_dir(dir.path(), 3);

    let blocks = discover_files(dir.path(), ".dat").expect("discover");
    let names: Vec<_> = blocks
        .iter()
        .map(|p| p.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_owned())
        .collect();
    assert_eq!(names, vec!["00001.dat", "00002.dat"]);
}

#[test]
fn batch_extraction_writes_records_and_snapshot() {
    init_tracing();
    let data = tempfile::tempdir().expect("data dir");
    let out = tempfile::tempdir().expect("output dir");
    write_data_dir(data.path(), 3);
    let paths = ExtractPaths::in_dir(out.path());

    let mut state = XymStateMap::new();
    let mut sink = FileSink::create(
        &paths.block_data,
        &paths.statement_data,
        Some(&paths.block_summaries),
    )
    .expect("create sink");
    let stats = reduce_batch(
        read_all_blocks(data.path()),
        statements(data.path()),
        &mut state,
        &mut sink,
    )
    .expect("batch merge");
    assert_eq!(sink.finish().expect("finish sink"), (3, 3));
    assert_eq!(stats.blocks, 3);
    assert_eq!(stats.statement_groups, 3);
    assert_eq!(stats.receipts, 1);
    assert_eq!(stats.statement_groups_skipped, 0);
    assert_expected_state(&state);

    // Block records read back in height order.
    let mut reader = RecordReader::open(&paths.block_data).expect("open block records");
    let mut heights = Vec::new();
    while let Some(block) = reader.next_record::<Block>().expect("read block record") {
        heights.push(block.height());
    }
    assert_eq!(heights, vec![1, 2, 3]);
    let transfer_block = read_all_blocks(data.path()).remove(1);
    assert_eq!(transfer_block.footer.tx_count, 1);

    // Resume after a known-good prefix.
    let mut reader = RecordReader::open(&paths.statement_data).expect("open statement records");
    assert_eq!(reader.skip(2).expect("skip"), 2);
    let group: StatementGroup = reader
        .next_record()
        .expect("read statement record")
        .expect("third record");
    assert_eq!(group.height, 3);
    assert_eq!(reader.skip(5).expect("skip past end"), 0);

    let summaries = fs::read_to_string(&paths.block_summaries).expect("read summaries");
    let lines: Vec<serde_json::Value> = summaries
        .lines()
        .map(|line| serde_json::from_str(line).expect("summary json"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["height"], 2);
    assert_eq!(lines[1]["tx_count"], 1);
    assert_eq!(lines[1]["total_fee"], MAX_FEE);

    state.write_snapshot(&paths.state_map).expect("write snapshot");
    let restored = XymStateMap::read_snapshot(&paths.state_map).expect("read snapshot");
    assert_eq!(restored, state);
}

#[test]
fn streaming_extraction_matches_batch() {
    init_tracing();
    let data = tempfile::tempdir().expect("data dir");
    write_data_dir(data.path(), 3);

    let mut batch_state = XymStateMap::new();
    reduce_batch(
        read_all_blocks(data.path()),
        statements(data.path()),
        &mut batch_state,
        &mut xym_core::extract::MemorySink::default(),
    )
    .expect("batch merge");

    // Feed the later block file first to exercise the heap.
    let mut files = discover_files(data.path(), ".dat").expect("discover blocks");
    files.reverse();
    let mut sink = xym_core::extract::MemorySink::default();
    let mut merger =
        StreamingMerger::new(XymStateMap::new(), statements(data.path())).expect("merger");
    for path in &files {
        let reader = BlockFileReader::open(path, DB_OFFSET_BYTES, BlockReadOptions::default())
            .expect("open block file");
        for block in reader {
            merger
                .push(block.expect("decode block"), &mut sink)
                .expect("push block");
        }
    }
    let (state, stats) = merger.finish().expect("finish");

    assert_eq!(stats.blocks, 3);
    assert_eq!(sink.block_heights, vec![3, 1, 2]);
    assert_eq!(sink.statement_heights, vec![1, 2, 3]);
    assert_expected_state(&state);
    assert_eq!(state, batch_state);
}

#[test]
fn one_statement_group_short_fails_both_merges() {
    init_tracing();
    let data = tempfile::tempdir().expect("data dir");
    write_data_dir(data.path(), 2);

    let err = reduce_batch(
        read_all_blocks(data.path()),
        statements(data.path()),
        &mut XymStateMap::new(),
        &mut xym_core::extract::MemorySink::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::IntegrityMismatch(_)));

    let mut sink = xym_core::extract::MemorySink::default();
    let mut merger =
        StreamingMerger::new(XymStateMap::new(), statements(data.path())).expect("merger");
    for block in read_all_blocks(data.path()) {
        merger.push(block, &mut sink).expect("push block");
    }
    assert_eq!(merger.pending(), 1);
    assert!(matches!(
        merger.finish(),
        Err(CoreError::IntegrityMismatch(_))
    ));
}
