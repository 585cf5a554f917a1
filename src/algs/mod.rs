//! Communication, wire format and the distributed algorithms built on them.

pub mod collective;
pub mod communicator;
pub mod distribute;
pub mod dual_graph;
pub mod metis_partition;
pub mod wire;

pub use distribute::hash_owner;
pub use dual_graph::DualGraph;
