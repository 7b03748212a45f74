//! The blocking transport seam: a bus capable of moving one session's bytes
//! in a single full-duplex block exchange, and a driver that runs the state
//! machine over such a bus in straight-line code.

use crate::link::{Exchange, SessionOutcome};
use log::warn;

/// A transport capability for cooperative/blocking designs: the caller
/// decides when each session runs, and the bus is guaranteed not to start
/// the next transaction until asked.
pub trait Bus {
    type Error;

    /// Runs one bounded session: asserts the session select, pushes `tx` out
    /// while incoming bytes land in `rx`, deasserts, and returns how many
    /// bytes moved. Blocks until the exchange is done.
    ///
    /// Both slices are loans for the duration of this call only.
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> core::result::Result<usize, Self::Error>;

    /// Whether `err` leaves the link unusable, as opposed to having spoiled
    /// a single session.
    fn is_fatal(&self, _err: &Self::Error) -> bool {
        false
    }
}

/// Runs one complete session of `exchange` over `bus`.
///
/// This is the cooperative counterpart of the interrupt callbacks in
/// [crate::link::handler]: the same phase ordering and the same
/// re-queue-before-the-next-phase hand-off apply, collapsed into a single
/// blocking call. A bus error on a healthy link counts as a truncated
/// session and the cycle continues; a fatal error holds the current phase
/// and surfaces to the caller, which may retry the same phase after
/// recovery.
pub fn run_session<B: Bus>(
    exchange: &mut Exchange,
    bus: &mut B,
) -> core::result::Result<SessionOutcome, B::Error> {
    let buffers = exchange.begin_session();
    match bus.exchange(buffers.tx, buffers.rx) {
        Ok(moved) => Ok(exchange.complete_session(moved)),
        Err(err) if bus.is_fatal(&err) => {
            exchange.session_aborted();
            Err(err)
        }
        Err(_) => {
            warn!("bus error spoiled the session; counting it as truncated");
            Ok(exchange.complete_session(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Policy;
    use crate::example_data::RAMP_PAYLOAD;
    use crate::frame::PAYLOAD_SIZE;
    use crate::link::{Phase, Role};

    #[derive(Debug, PartialEq)]
    enum FakeBusError {
        Glitch,
        LinkDown,
    }

    /// A bus that answers every exchange with the ramp payload, or fails.
    struct FakeBus {
        fail_with: Option<FakeBusError>,
    }

    impl Bus for FakeBus {
        type Error = FakeBusError;

        fn exchange(
            &mut self,
            _tx: &[u8],
            rx: &mut [u8],
        ) -> core::result::Result<usize, FakeBusError> {
            if let Some(err) = self.fail_with.take() {
                return Err(err);
            }
            let n = rx.len().min(PAYLOAD_SIZE);
            rx[..n].copy_from_slice(&RAMP_PAYLOAD[..n]);
            Ok(n)
        }

        fn is_fatal(&self, err: &FakeBusError) -> bool {
            matches!(err, FakeBusError::LinkDown)
        }
    }

    #[test]
    fn clean_exchange_completes_the_session() {
        let mut controller = Exchange::new(Role::Controller, Policy::Reflected);
        let mut bus = FakeBus { fail_with: None };

        let outcome = run_session(&mut controller, &mut bus).unwrap();
        assert_eq!(outcome.report.byte_count, PAYLOAD_SIZE);
        assert!(!outcome.report.truncated);
        assert_eq!(controller.phase(), Phase::VerifyChecksum);
    }

    #[test]
    fn recoverable_error_counts_as_truncated() {
        let mut controller = Exchange::new(Role::Controller, Policy::Reflected);
        let mut bus = FakeBus {
            fail_with: Some(FakeBusError::Glitch),
        };

        let outcome = run_session(&mut controller, &mut bus).unwrap();
        assert!(outcome.report.truncated);
        assert_eq!(outcome.report.byte_count, 0);
        // The cycle moves on.
        assert_eq!(controller.phase(), Phase::VerifyChecksum);
    }

    #[test]
    fn fatal_error_holds_the_phase() {
        let mut controller = Exchange::new(Role::Controller, Policy::Reflected);
        let mut bus = FakeBus {
            fail_with: Some(FakeBusError::LinkDown),
        };

        let err = run_session(&mut controller, &mut bus).unwrap_err();
        assert_eq!(err, FakeBusError::LinkDown);
        assert_eq!(controller.phase(), Phase::ProvideData);
        assert_eq!(controller.stats().sessions_completed, 0);
    }
}
