//! An in-memory stand-in for the physical bus: two endpoints connected by a
//! single-slot channel per direction. One `exchange` call is one session;
//! both sides deposit their outgoing block and take the peer's, so the
//! channel slot doubles as the per-session completion signal between the
//! two tasks.

use crossbeam_channel::{bounded, Receiver, Sender};
use volley::bus::Bus;

/// Faults the wire can inject into a block it carries, for exercising the
/// protocol's anomaly paths end to end.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// XOR `mask` into the byte at `offset` of the outgoing block.
    FlipBit { offset: usize, mask: u8 },
    /// Cut the outgoing block down to `len` bytes.
    Truncate { len: usize },
}

#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    /// The peer endpoint is gone; nothing further can move on this link.
    Disconnected,
}

/// One endpoint of the simulated wire.
pub struct Wire {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    /// Sessions this endpoint has run so far; faults key off this index.
    sessions: usize,
    faults: Vec<(usize, Fault)>,
}

impl Wire {
    /// Creates two connected endpoints.
    pub fn pair() -> (Wire, Wire) {
        let (tx_a, rx_b) = bounded(1);
        let (tx_b, rx_a) = bounded(1);
        let endpoint = |tx, rx| Wire {
            tx,
            rx,
            sessions: 0,
            faults: Vec::new(),
        };
        (endpoint(tx_a, rx_a), endpoint(tx_b, rx_b))
    }

    /// Arms a fault applied to this endpoint's outgoing block in session
    /// number `session` (0-based, counting every session this endpoint
    /// runs).
    pub fn schedule_fault(&mut self, session: usize, fault: Fault) {
        self.faults.push((session, fault));
    }

    fn apply_faults(&mut self, block: &mut Vec<u8>) {
        let session = self.sessions;
        for &(_, fault) in self.faults.iter().filter(|(at, _)| *at == session) {
            match fault {
                Fault::FlipBit { offset, mask } => {
                    if let Some(byte) = block.get_mut(offset) {
                        *byte ^= mask;
                    }
                }
                Fault::Truncate { len } => block.truncate(len),
            }
        }
        self.faults.retain(|(at, _)| *at != session);
    }
}

impl Bus for Wire {
    type Error = WireError;

    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<usize, WireError> {
        let mut outgoing = tx.to_vec();
        self.apply_faults(&mut outgoing);
        self.sessions += 1;

        // The slot is free by the time a lock-step peer calls this, so the
        // send never blocks; the receive is the rendezvous.
        self.tx.send(outgoing).map_err(|_| WireError::Disconnected)?;
        let incoming = self.rx.recv().map_err(|_| WireError::Disconnected)?;

        let n = incoming.len().min(rx.len());
        rx[..n].copy_from_slice(&incoming[..n]);
        Ok(n)
    }

    fn is_fatal(&self, err: &WireError) -> bool {
        matches!(err, WireError::Disconnected)
    }
}
