pub mod aliases;
pub mod crypto;
pub mod db;
pub mod error;
pub mod types;
pub mod vault;

pub use crypto::KeyCipher;
pub use error::{KeyVaultError, Result};
pub use types::ProviderKey;
pub use vault::{KeyVault, SessionKeyCache};
