//! The `extract` subcommand: discover store files, merge blocks with
//! statements and write the record streams and state snapshot.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{eyre, WrapErr};
use futures::future::try_join_all;
use tokio::sync::Semaphore;

use xym_core::block::{read_block_file, Block, BlockFileReader, BlockReadOptions};
use xym_core::extract::{
    discover_files, reduce_batch, ExtractPaths, FileSink, MergeStats, StreamingMerger,
};
use xym_core::{StatementStream, XymStateMap};

use crate::cli::ExtractArgs;

#[derive(Debug)]
pub struct ExtractReport {
    pub paths: ExtractPaths,
    pub stats: MergeStats,
    pub accounts: usize,
    pub block_records: u64,
    pub statement_records: u64,
}

pub async fn run(args: ExtractArgs) -> eyre::Result<ExtractReport> {
    if args.decode_concurrency == 0 {
        return Err(eyre!("--decode-concurrency must be at least 1"));
    }

    let block_files =
        discover_files(&args.input, &args.block_extension).context("discover block files")?;
    let statement_files = discover_files(&args.input, &args.statement_extension)
        .context("discover statement files")?;
    if block_files.is_empty() {
        tracing::warn!(input = %args.input.display(), extension = %args.block_extension, "no block files found");
    }
    tracing::info!(
        block_files = block_files.len(),
        statement_files = statement_files.len(),
        mode = if args.stream { "streaming" } else { "batch" },
        "starting extraction"
    );

    fs::create_dir_all(&args.output).context("create output directory")?;
    let paths = ExtractPaths::in_dir(&args.output);
    let sink = FileSink::create(
        &paths.block_data,
        &paths.statement_data,
        args.write_summaries.then_some(paths.block_summaries.as_path()),
    )
    .context("create record files")?;

    let options = BlockReadOptions {
        save_tx_hashes: args.save_tx_hashes,
        save_sub_cache_merkle_roots: args.save_subcache_merkle_roots,
    };
    let statements = StatementStream::new(statement_files, args.db_offset_bytes);

    let (state, stats, sink) = if args.stream {
        let db_offset_bytes = args.db_offset_bytes;
        tokio::task::spawn_blocking(move || {
            extract_streaming(block_files, statements, db_offset_bytes, options, sink)
        })
        .await
        .context("streaming merge task panicked")??
    } else {
        let blocks = decode_block_files(
            block_files,
            args.db_offset_bytes,
            options,
            args.decode_concurrency,
        )
        .await?;
        tokio::task::spawn_blocking(move || {
            let mut sink = sink;
            let mut state = XymStateMap::new();
            let stats = reduce_batch(blocks, statements, &mut state, &mut sink)
                .context("merge blocks with statements")?;
            Ok::<_, eyre::Report>((state, stats, sink))
        })
        .await
        .context("batch merge task panicked")??
    };

    let (block_records, statement_records) = sink.finish().context("flush record files")?;
    state
        .write_snapshot(&paths.state_map)
        .context("write state snapshot")?;

    Ok(ExtractReport {
        accounts: state.len(),
        paths,
        stats,
        block_records,
        statement_records,
    })
}

/// Decode every block file, at most `concurrency` at a time. Blocks come back
/// in file order; the reducer sorts them by height.
async fn decode_block_files(
    files: Vec<PathBuf>,
    db_offset_bytes: usize,
    options: BlockReadOptions,
    concurrency: usize,
) -> eyre::Result<Vec<Block>> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let tasks: Vec<_> = files
        .into_iter()
        .map(|path| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("decode semaphore closed")?;
                tracing::info!(path = %path.display(), "processing block file");
                let task_path = path.clone();
                let blocks = tokio::task::spawn_blocking(move || {
                    read_block_file(&task_path, db_offset_bytes, options)
                })
                .await
                .context("block decode task panicked")?
                .wrap_err_with(|| format!("decode block file {}", path.display()))?;
                Ok::<_, eyre::Report>(blocks)
            }
        })
        .collect();

    let per_file = try_join_all(tasks).await?;
    Ok(per_file.into_iter().flatten().collect())
}

fn extract_streaming(
    files: Vec<PathBuf>,
    statements: StatementStream,
    db_offset_bytes: usize,
    options: BlockReadOptions,
    mut sink: FileSink,
) -> eyre::Result<(XymStateMap, MergeStats, FileSink)> {
    let mut merger = StreamingMerger::new(XymStateMap::new(), statements)
        .context("read first statement group")?;

    for path in &files {
        tracing::info!(path = %path.display(), pending = merger.pending(), "processing block file");
        let reader = BlockFileReader::open(path, db_offset_bytes, options)
            .wrap_err_with(|| format!("open block file {}", path.display()))?;
        for block in reader {
            let block = block.wrap_err_with(|| format!("decode block file {}", path.display()))?;
            merger.push(block, &mut sink).context("merge block")?;
        }
    }

    let (state, stats) = merger.finish().context("finish streaming merge")?;
    Ok((state, stats, sink))
}
