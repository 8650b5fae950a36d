//! Ledger Protocol - textual wire messages
//!
//! Three conversations share one TCP port on the leader:
//! - Client -> Leader: greeting, then the numbers to sum and a per-element delay
//! - Leader -> Client: acknowledgements, baseline timing, final result or error
//! - Leader <-> Node: ready signal, task assignment, partial sums, verification votes
//!
//! Every message is a single newline-terminated line. Encoding is `Display`,
//! decoding is `FromStr`.

pub mod error;
pub mod messages;
pub mod numbers;

pub use error::ProtocolError;
pub use messages::{ClientRequest, LeaderReply, NodeCommand, NodeReply};
pub use numbers::{format_numbers, parse_numbers};
