pub mod hash;
pub mod keys;
pub mod registry;
pub mod signature;

pub use hash::{hash_blake3, Hash};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use registry::KeyRegistry;
pub use signature::{sign, sign_hash, verify, verify_hash, Sig};
