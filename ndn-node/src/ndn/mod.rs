// Named-data state and forwarding: locally published objects, the content
// cache, the pending interest table, and the INTEREST/OBJECT/NOOBJECT
// handlers that tie them to the neighbor links.

pub mod cache;
pub mod forwarding;
pub mod objects;
pub mod pit;

pub use cache::ContentCache;
pub use objects::{ObjectStore, ObjectStoreFull};
pub use pit::{Interface, InterfaceState, Pit, PitEntry, PitFull, RetiredInterest};
