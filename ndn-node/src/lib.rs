// ndn_node
//
// INTENTION:
// The node runtime of the overlay. One task owns the whole node state and
// drives a select loop over the user's commands, the TCP listener, the UDP
// registration socket, and every neighbor link; per-neighbor reader tasks
// only extract newline-framed lines and feed them back to that loop.

pub mod config;
pub mod ndn;
pub mod network;
pub mod node;
pub mod registration;
pub mod topology;
pub mod ui;

pub use config::NodeConfig;
pub use node::Node;
