//! Admin credentials.
//!
//! The public cache needs no authentication. Admin writes (settings, logo,
//! gallery and news management) need a bearer token, kept in the OS keychain
//! by `TokenStore` or supplied through `SCHOOLCACHE_TOKEN`.

pub mod token;

pub use token::TokenStore;
