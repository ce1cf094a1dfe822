// ndn-registrar
//
// The registration service: one UDP endpoint that tracks, per network, the
// set of currently registered members. The registry itself is synchronous
// state with no I/O so it can be exercised directly in tests; the datagram
// loop in `server` is a thin shell around it.

pub mod registry;
pub mod server;

pub use registry::{Registry, RegistryError};
pub use server::serve;
