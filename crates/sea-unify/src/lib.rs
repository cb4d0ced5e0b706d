pub mod tv;
pub mod unify;

pub use tv::{DelayFresh, ErrReason, TvKind};
pub use unify::Unifier;
