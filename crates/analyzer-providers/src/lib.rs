//! Concrete `ProviderClient` implementations consulted by condition leaves.

pub mod keyword_provider;

pub use keyword_provider::KeywordProvider;
