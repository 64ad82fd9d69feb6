//! Source Registry & Adapter contract (C2, C3; §4.2, §6.4).

pub mod adapter;
pub mod mock;
pub mod registry;

pub use adapter::{
    BirthEntry, BirthQuery, Capabilities, Capability, CensusFact, DeathEntry, FactSet,
    MarriageEntry, MarriageQuery, ParentLinks, PersonCandidate, PersonSearchQuery, SourceAdapter,
};
pub use mock::{MockAdapter, MockAdapterBuilder, MockFixtures};
pub use registry::SourceRegistry;
