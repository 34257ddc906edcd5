pub mod claims;
pub mod signer;

pub use claims::{Claims, TokenKind};
pub use signer::{SignerError, SigningSecret, TokenSigner, TokenTtls, ACCEPTED_ALGORITHMS};
