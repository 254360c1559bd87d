pub mod address;
pub mod block;
pub mod model;
pub mod skeleton;
pub mod transaction;

pub use address::Address;
pub use block::{block_hash, Block, GENESIS_PREV_HASH};
pub use model::ModelData;
pub use skeleton::{BlockSignature, BlockSkeleton};
pub use transaction::{Flavor, Transaction, TransferTransaction};
