pub mod hasher;
pub mod record;
pub mod rotator;

pub use hasher::{HashError, RefreshTokenHasher};
pub use record::{RecordId, RefreshRecord};
pub use rotator::{RotationEngine, RotationPolicy, TokenPair};
