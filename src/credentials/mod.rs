//! Credential context discovery
//!
//! The external tool may need browser cookies to reach some media. Which browser
//! works depends on the machine, so each job walks a [`DiscoveryChain`] of
//! candidate contexts until one succeeds. The winner is remembered in a shared
//! [`CredentialCache`] and tried first by later jobs.

mod cache;
mod chain;

pub use cache::CredentialCache;
pub use chain::{ChainState, DiscoveryChain};
