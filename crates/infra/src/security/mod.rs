//! Request signing and device identity.

pub mod device_id;
pub mod signer;

pub use signer::HmacSigner;
