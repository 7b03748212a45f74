//! Runs a controller and a responder on two threads over the simulated wire
//! for a handful of protocol cycles, and prints what each verification saw.
//!
//! Try `RUST_LOG=trace` for per-session frame dumps.

use log::info;
use std::thread;
use volley::checksum::Policy;
use volley_sim::{run_controller, run_responder, Wire};

const CYCLES: usize = 5;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (mut controller_wire, mut responder_wire) = Wire::pair();
    let responder = thread::spawn(move || {
        run_responder(&mut responder_wire, Policy::Reflected, CYCLES)
    });
    let controller = thread::spawn(move || {
        run_controller(&mut controller_wire, Policy::Reflected, CYCLES)
    });

    controller
        .join()
        .expect("controller thread")
        .expect("controller completed its cycles");
    let outcomes = responder
        .join()
        .expect("responder thread")
        .expect("responder completed its cycles");

    for (cycle, verification) in outcomes
        .iter()
        .filter_map(|outcome| outcome.verification)
        .enumerate()
    {
        info!(
            "cycle {cycle}: matched={} (received: {:08X}, computed: {:08X})",
            verification.matched, verification.received, verification.computed
        );
    }
}
