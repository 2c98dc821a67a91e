//! Streaming RDS/RBDS group decoder: ingests 4-block groups from a tuner
//! feed, reassembles fragmented fields, and publishes station snapshots.

pub mod af;
pub mod analyzer;
pub mod assemblers;
pub mod ber;
pub mod charset;
pub mod clock;
pub mod decoder;
pub mod ecc;
pub mod eon;
pub mod frame;
pub mod group;
pub mod history;
pub mod oda;
pub mod pi;
pub mod snapshot;
pub mod station;
pub mod tmc;

pub use decoder::Decoder;
pub use group::{Group, RawGroup, Version};
pub use snapshot::Snapshot;
pub use station::StationState;
