//! A point-to-point payload/checksum exchange protocol for a full-duplex,
//! session-selected serial link between two microcontroller roles: the
//! responder provides a fixed-size payload, the controller sends it back with
//! a CRC-32 trailer appended, and the responder verifies the round trip.
//!
//! The crate is hardware-agnostic. Transports drive the [link::Exchange]
//! state machine either byte-by-byte from interrupt context (via
//! [link::handler::IsrLink]) or a session at a time through the blocking
//! [bus::Bus] seam. See the `volley_sim` crate for a host-side transport that
//! runs both roles on two threads.

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod checksum;
pub mod debug_util;
pub mod example_data;
pub mod frame;
pub mod link;
pub mod verify;
