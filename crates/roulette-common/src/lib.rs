pub mod errors;
pub mod id;
pub mod outbound;

pub use errors::{MatchError, RouletteError, StoreError};
pub use id::UserId;
pub use outbound::{Notice, Outbound, Payload};
