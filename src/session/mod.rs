//! Session credential persistence
//!
//! # Module Layout
//!
//! - [`credential`] -- the access/refresh token pair and its persistence keys
//! - [`jwt`]        -- client-side expiry inspection of access tokens
//! - [`scope`]      -- key-value persistence backends (memory, keyring, file)
//! - [`store`]      -- the two-scope token store

pub mod credential;
pub mod jwt;
pub mod scope;
pub mod store;

pub use credential::{CredentialKey, SessionCredential};
pub use scope::{CredentialScope, FileScope, KeyringScope, MemoryScope};
pub use store::{ScopeKind, TokenStore};
