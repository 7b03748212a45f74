//! Task loops for the two link roles, used by the example binaries and the
//! integration tests. Each loop owns its end's [Exchange] outright; the two
//! tasks share nothing but the wire.

use crate::wire::{Wire, WireError};
use log::info;
use volley::bus;
use volley::checksum::Policy;
use volley::example_data::RAMP_PAYLOAD;
use volley::link::{Exchange, Role, SessionOutcome};

/// Runs the controller end for `cycles` full protocol cycles (two sessions
/// each), returning every session outcome in order.
pub fn run_controller(
    wire: &mut Wire,
    policy: Policy,
    cycles: usize,
) -> Result<Vec<SessionOutcome>, WireError> {
    run_peer(Exchange::new(Role::Controller, policy), wire, cycles)
}

/// Runs the responder end for `cycles` full protocol cycles, with the ramp
/// sample payload staged before the first session begins.
pub fn run_responder(
    wire: &mut Wire,
    policy: Policy,
    cycles: usize,
) -> Result<Vec<SessionOutcome>, WireError> {
    let mut exchange = Exchange::new(Role::Responder, policy);
    exchange
        .stage_payload(&RAMP_PAYLOAD)
        .expect("no session is open yet");
    run_peer(exchange, wire, cycles)
}

fn run_peer(
    mut exchange: Exchange,
    wire: &mut Wire,
    cycles: usize,
) -> Result<Vec<SessionOutcome>, WireError> {
    let mut outcomes = Vec::with_capacity(cycles * 2);
    for _ in 0..cycles * 2 {
        outcomes.push(bus::run_session(&mut exchange, wire)?);
    }
    info!("{:?} done: {:?}", exchange.role(), exchange.stats());
    Ok(outcomes)
}
