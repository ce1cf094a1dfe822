// Network plumbing: newline framing and the neighbor table.

pub mod framing;
pub mod neighbor;

pub use framing::RecvBuffer;
pub use neighbor::{Neighbor, NeighborId, NeighborTable, NeighborType, PeerEvent};
