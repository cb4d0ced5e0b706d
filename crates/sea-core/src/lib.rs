pub mod bits;
pub mod error;
pub mod id;

pub use bits::{Bits, BitsAlias, BitsFun, BitsInterner, Polarity, SplitTree};
pub use error::SeaError;
pub use id::{AliasId, FidxId, NodeId, TvId};
