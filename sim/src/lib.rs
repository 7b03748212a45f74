//! Host-side transport for the volley protocol: an in-memory full-duplex
//! wire, plus task loops that run the controller and responder roles on two
//! independently scheduled threads interacting only through that wire.

pub mod peer;
pub mod wire;

pub use peer::{run_controller, run_responder};
pub use wire::{Fault, Wire, WireError};
