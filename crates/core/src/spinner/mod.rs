pub mod session;
pub mod target;
pub mod wedges;

pub use session::{SpinPhase, SpinnerSession};
pub use target::{SpinError, SpinOutcome};
pub use wedges::WedgeSet;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpinnerError {
    #[error("label must not be blank")]
    EmptyLabel,
    #[error("'{0}' is already on the wheel")]
    DuplicateLabel(String),
    #[error("cannot move item {from} to {to}: wheel has {len} items")]
    IndexOutOfRange { from: usize, to: usize, len: usize },
    #[error("add at least 2 items to spin the wheel (have {count})")]
    NotEnoughWedges { count: usize },
    #[error("the wheel is spinning")]
    Busy,
    #[error("the wheel is not spinning")]
    NotSpinning,
    #[error(transparent)]
    Target(#[from] SpinError),
}
