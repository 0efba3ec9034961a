//! Statement stream decoding.
//!
//! Statement files hold one group per block height: transaction statements,
//! then address resolution statements, then mosaic resolution statements,
//! each prefixed by a `u32` count. Groups carry no height of their own; the
//! stream numbers them from 1 and keeps counting across file boundaries, so
//! the files must be supplied in chain order.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::Reader;
use crate::error::CoreError;
use crate::receipt::{Receipt, ReceiptSource};

// ==============================================================================
// Statement Types
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatement {
    pub source: ReceiptSource,
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResolution {
    pub source: ReceiptSource,
    pub resolved: Address,
}

/// Resolutions of one unresolved (alias) address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressResolutionStatement {
    pub unresolved: Address,
    pub resolutions: Vec<AddressResolution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicResolution {
    pub source: ReceiptSource,
    pub resolved: u64,
}

/// Resolutions of one unresolved (alias) mosaic id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicResolutionStatement {
    pub unresolved: u64,
    pub resolutions: Vec<MosaicResolution>,
}

/// All statements attached to one block height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementGroup {
    pub height: u64,
    pub transaction_statements: Vec<TransactionStatement>,
    pub address_resolution_statements: Vec<AddressResolutionStatement>,
    pub mosaic_resolution_statements: Vec<MosaicResolutionStatement>,
}

impl StatementGroup {
    /// Every top-level receipt of the group, in statement order.
    pub fn receipts(&self) -> impl Iterator<Item = &Receipt> {
        self.transaction_statements
            .iter()
            .flat_map(|statement| statement.receipts.iter())
    }

    pub fn receipt_count(&self) -> usize {
        self.transaction_statements
            .iter()
            .map(|statement| statement.receipts.len())
            .sum()
    }
}

// ==============================================================================
// Decoding
// ==============================================================================

/// Decode one statement triple at the reader's position.
pub fn decode_statement_group(
    reader: &mut Reader<'_>,
    height: u64,
) -> Result<StatementGroup, CoreError> {
    let transaction_statements = read_counted(reader, |r| {
        let source = ReceiptSource::decode(r)?;
        let receipt_count = r.read_u32()?;
        let receipts = (0..receipt_count)
            .map(|_| Receipt::decode(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransactionStatement { source, receipts })
    })?;

    let address_resolution_statements = read_counted(reader, |r| {
        let unresolved = Address(r.read_array()?);
        let resolutions = read_counted(r, |r| {
            Ok(AddressResolution {
                source: ReceiptSource::decode(r)?,
                resolved: Address(r.read_array()?),
            })
        })?;
        Ok(AddressResolutionStatement {
            unresolved,
            resolutions,
        })
    })?;

    let mosaic_resolution_statements = read_counted(reader, |r| {
        let unresolved = r.read_u64()?;
        let resolutions = read_counted(r, |r| {
            Ok(MosaicResolution {
                source: ReceiptSource::decode(r)?,
                resolved: r.read_u64()?,
            })
        })?;
        Ok(MosaicResolutionStatement {
            unresolved,
            resolutions,
        })
    })?;

    Ok(StatementGroup {
        height,
        transaction_statements,
        address_resolution_statements,
        mosaic_resolution_statements,
    })
}

fn read_counted<'a, T>(
    reader: &mut Reader<'a>,
    mut read: impl FnMut(&mut Reader<'a>) -> Result<T, CoreError>,
) -> Result<Vec<T>, CoreError> {
    let count = reader.read_u32()?;
    (0..count).map(|_| read(reader)).collect()
}

// ==============================================================================
// Stream
// ==============================================================================

/// Lazily decodes statement groups from a sequence of statement files.
///
/// Files are opened one at a time in the order given. Heights start at 1
/// and increase by one per group regardless of file boundaries. The first
/// error ends the stream.
pub struct StatementStream {
    paths: std::vec::IntoIter<PathBuf>,
    db_offset_bytes: usize,
    current: Option<(PathBuf, Vec<u8>, usize)>,
    height: u64,
    failed: bool,
}

impl StatementStream {
    pub fn new(paths: Vec<PathBuf>, db_offset_bytes: usize) -> Self {
        Self {
            paths: paths.into_iter(),
            db_offset_bytes,
            current: None,
            height: 0,
            failed: false,
        }
    }

    /// Height of the most recently yielded group (0 before the first).
    pub fn height(&self) -> u64 {
        self.height
    }

    fn next_group(&mut self) -> Result<Option<StatementGroup>, CoreError> {
        loop {
            if let Some((path, data, pos)) = &mut self.current {
                if *pos < data.len() {
                    let mut reader = Reader::new(&data[*pos..], "statement file");
                    let group = decode_statement_group(&mut reader, self.height + 1).map_err(|e| {
                        tracing::warn!(path = %path.display(), offset = *pos, error = %e, "statement decode failed");
                        e
                    })?;
                    *pos += reader.position();
                    self.height += 1;
                    return Ok(Some(group));
                }
            }

            let Some(path) = self.paths.next() else {
                self.current = None;
                return Ok(None);
            };
            let data = fs::read(&path)?;
            tracing::debug!(path = %path.display(), bytes = data.len(), start_height = self.height + 1, "processing statement file");
            let pos = self.db_offset_bytes.min(data.len());
            self.current = Some((path, data, pos));
        }
    }
}

impl Iterator for StatementStream {
    type Item = Result<StatementGroup, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_group() {
            Ok(group) => group.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::{ReceiptPayload, ReceiptType};
    use crate::test_util::{balance_change_receipt, statement_file, StatementSpec};
    use crate::types::XYM_MOSAIC_IDS;

    fn source(primary_id: u32) -> ReceiptSource {
        ReceiptSource {
            primary_id,
            secondary_id: 0,
        }
    }

    #[test]
    fn decodes_full_triple() {
        let spec = StatementSpec {
            transaction_statements: vec![(
                source(0),
                vec![balance_change_receipt(
                    ReceiptType::HarvestFee,
                    XYM_MOSAIC_IDS[0],
                    77,
                    [5; 24],
                )],
            )],
            address_resolutions: vec![([0x99; 24], vec![(source(1), [6; 24])])],
            mosaic_resolutions: vec![(0xE74B_99BA_41F4_AFEE, vec![(source(1), XYM_MOSAIC_IDS[0])])],
        };
        let bytes = spec.to_bytes();
        let mut reader = Reader::new(&bytes, "test");
        let group = decode_statement_group(&mut reader, 12).expect("decode group");
        assert!(reader.is_empty());

        assert_eq!(group.height, 12);
        assert_eq!(group.receipt_count(), 1);
        let receipt = group.receipts().next().expect("one receipt");
        assert!(matches!(receipt.payload, ReceiptPayload::BalanceCredit(_)));

        let address = &group.address_resolution_statements[0];
        assert_eq!(address.unresolved, Address([0x99; 24]));
        assert_eq!(address.resolutions[0].resolved, Address([6; 24]));

        let mosaic = &group.mosaic_resolution_statements[0];
        assert_eq!(mosaic.unresolved, XYM_MOSAIC_IDS[1]);
        assert_eq!(mosaic.resolutions[0].resolved, XYM_MOSAIC_IDS[0]);
    }

    #[test]
    fn stream_heights_continue_across_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("00000.stmt");
        let second = dir.path().join("00001.stmt");
        fs::write(&first, statement_file(&[StatementSpec::empty(), StatementSpec::empty()]))
            .expect("write first");
        fs::write(&second, statement_file(&[StatementSpec::empty()])).expect("write second");

        let heights: Vec<u64> = StatementStream::new(vec![first, second], 800)
            .map(|group| group.expect("decode").height)
            .collect();
        assert_eq!(heights, vec![1, 2, 3]);
    }

    #[test]
    fn stream_stops_after_truncated_group() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("00000.stmt");
        let mut bytes = statement_file(&[StatementSpec::empty()]);
        bytes.extend_from_slice(&[1, 0, 0, 0]);
        fs::write(&path, bytes).expect("write");

        let mut stream = StatementStream::new(vec![path], 800);
        assert_eq!(stream.next().expect("first").expect("ok").height, 1);
        assert!(matches!(
            stream.next(),
            Some(Err(CoreError::Truncated { .. }))
        ));
        assert!(stream.next().is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut stream = StatementStream::new(vec![PathBuf::from("/nonexistent/00000.stmt")], 800);
        assert!(matches!(stream.next(), Some(Err(CoreError::Io(_)))));
    }
}
