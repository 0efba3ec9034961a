pub mod address;
pub mod block;
pub mod codec;
pub mod error;
pub mod extract;
pub mod harvesters;
pub mod receipt;
pub mod state;
pub mod statement;
pub mod transaction;
pub mod types;

#[doc(hidden)]
pub mod test_util;

pub use address::Address;
pub use block::{Block, BlockFileReader, BlockReadOptions};
pub use error::CoreError;
pub use receipt::Receipt;
pub use state::XymStateMap;
pub use statement::{StatementGroup, StatementStream};
pub use transaction::{Transaction, TransactionType};
