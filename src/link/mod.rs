//! Implements the two-phase transaction state machine shared by both link
//! roles: which side sends in which phase, how the transmit and receive
//! buffers are cursored and handed off across phase boundaries, and what
//! gets reported when a session completes.

pub mod handler;

use crate::checksum::Policy;
use crate::debug_util;
use crate::frame::{self, FILLER_BYTE, FRAME_SIZE, PAYLOAD_SIZE, TRAILER_SIZE};
use crate::verify::{self, Verification};
use log::{debug, log_enabled, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An attempt to restage the transmit buffer while a session is open.
    SessionInProgress,
    /// A staged payload larger than [PAYLOAD_SIZE] was rejected.
    PayloadTooLarge,
    /// An attempt to attach more than one [Exchange] to a
    /// [handler::IsrLink] was detected.
    AlreadyAttached,
}
pub type Result<T> = core::result::Result<T, Error>;

/// The two link roles. The controller initiates every transaction; the
/// responder reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Controller,
    Responder,
}

/// The protocol phase. Both ends track their own copy and stay in lock-step:
/// a phase only flips on a completed transport-level transaction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The responder sends a payload; the controller receives it.
    ProvideData,
    /// The controller sends that payload back with a checksum trailer
    /// appended; the responder receives the frame and verifies it.
    VerifyChecksum,
}

impl Phase {
    /// The number of bytes one session of this phase moves over the wire.
    pub const fn wire_len(self) -> usize {
        match self {
            Phase::ProvideData => PAYLOAD_SIZE,
            Phase::VerifyChecksum => FRAME_SIZE,
        }
    }

    const fn next(self) -> Phase {
        match self {
            Phase::ProvideData => Phase::VerifyChecksum,
            Phase::VerifyChecksum => Phase::ProvideData,
        }
    }
}

impl Role {
    /// Whether this role drives the transmit side of `phase`.
    pub const fn sends_in(self, phase: Phase) -> bool {
        matches!(
            (self, phase),
            (Role::Responder, Phase::ProvideData) | (Role::Controller, Phase::VerifyChecksum)
        )
    }
}

/// Diagnostics for one completed phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseReport {
    /// The phase the session ran in.
    pub phase: Phase,
    /// The number of bytes actually moved, capped at the phase's wire
    /// length. For a truncated session this is the real short count, not a
    /// padded one.
    pub byte_count: usize,
    /// The session ended before the phase's full wire length was moved.
    pub truncated: bool,
    /// More bytes were offered than the phase's wire length; the excess was
    /// dropped.
    pub overflowed: bool,
}

/// Everything that fell out of one completed session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOutcome {
    pub report: PhaseReport,
    /// Present when this side just received and checked a checksummed frame.
    pub verification: Option<Verification>,
}

/// Various transfer-related stats.
#[derive(Default, Debug, Clone, Copy)]
pub struct LinkStats {
    /// The number of sessions that ran to a transaction boundary.
    pub sessions_completed: u32,
    /// The number of sessions that ended short of their wire length.
    pub truncated_sessions: u32,
    /// The number of sessions during which excess bytes had to be dropped.
    pub overflowed_sessions: u32,
    /// The number of received frames whose checksum matched.
    pub checksums_matched: u32,
    /// The number of received frames whose checksum did not match.
    pub checksums_mismatched: u32,
}

/// An exclusive loan of the two session buffers for the duration of one
/// block-granular session. Holding the loan mutably borrows the [Exchange],
/// so a second concurrent loan is rejected at compile time, and the
/// transport cannot retain either slice past the session.
pub struct SessionBuffers<'a> {
    /// The bytes to push out during this session.
    pub tx: &'a [u8],
    /// Where the transport writes incoming bytes.
    pub rx: &'a mut [u8],
}

/// One end of the link.
///
/// Owns the persistent transmit and receive buffers exclusively; they are
/// reused frame-over-frame and transports only ever see them as a
/// per-session [SessionBuffers] loan or one byte at a time. All event entry
/// points run to completion without blocking, so they are safe to call from
/// an interrupt or completion-callback context (see [handler::IsrLink] for
/// the shared-state wrapper that makes that sound).
pub struct Exchange {
    role: Role,
    policy: Policy,
    phase: Phase,
    tx_buf: [u8; FRAME_SIZE],
    rx_buf: [u8; FRAME_SIZE],
    /// Bytes of `tx_buf` handed to the transport this session.
    tx_sent: usize,
    /// Bytes stored into `rx_buf` this session. Never exceeds the phase's
    /// wire length, and therefore never the buffer capacity.
    rx_stored: usize,
    /// Bytes the transport offered this session, including dropped ones.
    rx_offered: usize,
    in_session: bool,
    tx_staged: bool,
    stats: LinkStats,
}

impl Exchange {
    /// Creates a new exchange for `role`, starting in [Phase::ProvideData]
    /// with zeroed buffers.
    ///
    /// A sending end must have data staged (via [Exchange::stage_payload])
    /// before its first session begins.
    pub fn new(role: Role, policy: Policy) -> Exchange {
        Exchange {
            role,
            policy,
            phase: Phase::ProvideData,
            tx_buf: [0; FRAME_SIZE],
            rx_buf: [0; FRAME_SIZE],
            tx_sent: 0,
            rx_stored: 0,
            rx_offered: 0,
            in_session: false,
            tx_staged: false,
            stats: LinkStats::default(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns stats about this instance's activity so far.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Whether this end transmits in the current phase.
    pub fn is_sender(&self) -> bool {
        self.role.sends_in(self.phase)
    }

    /// The bytes received during the most recently completed session. Valid
    /// until the next session starts; the storage is reused.
    pub fn received(&self) -> &[u8] {
        &self.rx_buf[..self.rx_stored]
    }

    /// Stages `data` as the payload to transmit, filler-extending it to
    /// [PAYLOAD_SIZE].
    ///
    /// Staging must happen strictly before the session that sends the data
    /// begins. Staging from inside the session-start event races an
    /// immediately-following transport pull on interrupt-driven transports,
    /// so that ordering is rejected here rather than supported.
    pub fn stage_payload(&mut self, data: &[u8]) -> Result<()> {
        if self.in_session {
            return Err(Error::SessionInProgress);
        }
        if data.len() > PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge);
        }
        self.tx_buf[..data.len()].copy_from_slice(data);
        self.tx_buf[data.len()..].fill(FILLER_BYTE);
        self.tx_staged = true;
        Ok(())
    }

    /// Signals that the far end opened a session (select asserted). Resets
    /// the phase cursors; the transmit buffer must already hold this phase's
    /// data by the time this fires.
    pub fn session_started(&mut self) {
        if self.is_sender() && !self.tx_staged {
            warn!(
                "{:?} session started with nothing staged; sending filler",
                self.phase
            );
        }
        self.in_session = true;
        self.tx_sent = 0;
        self.rx_stored = 0;
        self.rx_offered = 0;
    }

    /// Supplies the next byte to put on the wire.
    ///
    /// An exhausted sender (and the non-sending side of a full-duplex
    /// exchange) emits [FILLER_BYTE] so that trailing reads at the far end
    /// are deterministic.
    pub fn pull_tx_byte(&mut self) -> u8 {
        if self.is_sender() && self.tx_sent < self.phase.wire_len() {
            let byte = self.tx_buf[self.tx_sent];
            self.tx_sent += 1;
            byte
        } else {
            FILLER_BYTE
        }
    }

    /// Accepts one byte from the wire.
    ///
    /// Bytes beyond the phase's wire length are dropped and counted; the
    /// write index never exceeds the buffer, whatever the transport offers.
    pub fn push_rx_byte(&mut self, byte: u8) {
        if self.is_sender() {
            // Full duplex: the sending side clocks in don't-care bytes.
            return;
        }
        self.rx_offered += 1;
        if self.rx_stored < self.phase.wire_len() {
            self.rx_buf[self.rx_stored] = byte;
            self.rx_stored += 1;
        }
    }

    /// One full-duplex byte-granular exchange event: hands the received byte
    /// in and returns the next byte to load into the transmit register.
    pub fn exchange_byte(&mut self, incoming: u8) -> u8 {
        self.push_rx_byte(incoming);
        self.pull_tx_byte()
    }

    /// The current phase's session buffers, without touching any cursors.
    /// Block-granular transports use this between session start and
    /// completion.
    pub fn buffers(&mut self) -> SessionBuffers<'_> {
        let len = self.phase.wire_len();
        SessionBuffers {
            tx: &self.tx_buf[..len],
            rx: &mut self.rx_buf[..len],
        }
    }

    /// Starts a block-granular session: resets the cursors and loans the
    /// session buffers out for the transport (e.g. a DMA engine) to work on.
    /// Follow up with [Exchange::complete_session] once the block has moved.
    pub fn begin_session(&mut self) -> SessionBuffers<'_> {
        self.session_started();
        self.buffers()
    }

    /// Completes a block-granular session after `exchanged` bytes moved in
    /// each direction.
    pub fn complete_session(&mut self, exchanged: usize) -> SessionOutcome {
        let len = self.phase.wire_len();
        if self.is_sender() {
            self.tx_sent = exchanged.min(len);
        } else {
            self.rx_offered = exchanged;
            self.rx_stored = exchanged.min(len);
        }
        self.session_ended()
    }

    /// Signals the transaction boundary: the far end closed the session
    /// (select deasserted, or the declared block length was reached).
    ///
    /// Builds the phase report, verifies the frame if this side just
    /// received a checksummed one, performs the cross-phase buffer hand-off,
    /// and flips the phase. The next phase's transmit buffer is fully
    /// re-queued before this returns, so an interrupt-driven far end may
    /// open the next session the moment the surrounding event handler is
    /// done. Never blocks; a verification failure only affects the report,
    /// never the cycle.
    pub fn session_ended(&mut self) -> SessionOutcome {
        let phase = self.phase;
        let expected = phase.wire_len();
        let sender = self.is_sender();

        let byte_count = if sender { self.tx_sent } else { self.rx_stored };
        let truncated = byte_count < expected;
        let overflowed = !sender && self.rx_offered > expected;

        let mut verification = None;
        if sender {
            debug!(
                ">>> TX {:?} done, {} of {} bytes pulled",
                phase, byte_count, expected
            );
        } else {
            debug!(
                "<<< RX {:?} done, {}",
                phase,
                debug_util::FormatFrame(self.received())
            );
            if log_enabled!(log::Level::Trace) {
                debug_util::log_data_hex(log::Level::Trace, self.received());
            }
            match phase {
                Phase::ProvideData => self.requeue_echo(),
                Phase::VerifyChecksum => verification = self.check_received_frame(),
            }
        }

        self.stats.sessions_completed += 1;
        if truncated {
            self.stats.truncated_sessions += 1;
            warn!(
                "{:?} session ended short: {} of {} bytes",
                phase, byte_count, expected
            );
        }
        if overflowed {
            self.stats.overflowed_sessions += 1;
            warn!(
                "{:?} session overflowed: {} bytes offered, {} accepted",
                phase, self.rx_offered, expected
            );
        }
        if let Some(v) = verification {
            if v.matched {
                self.stats.checksums_matched += 1;
                debug!("checksum ok (received: {:08X})", v.received);
            } else {
                self.stats.checksums_mismatched += 1;
                warn!(
                    "checksum NOT OK! (computed: {:08X}, received: {:08X})",
                    v.computed, v.received
                );
            }
        }

        self.in_session = false;
        self.phase = phase.next();

        SessionOutcome {
            report: PhaseReport {
                phase,
                byte_count,
                truncated,
                overflowed,
            },
            verification,
        }
    }

    /// Discards an in-progress session after the transport reported a fatal
    /// condition. The cursors reset but the phase does not advance; the link
    /// resumes at the same phase once the transport recovers.
    pub fn session_aborted(&mut self) {
        warn!("{:?} session aborted; holding phase", self.phase);
        self.in_session = false;
        self.tx_sent = 0;
        self.rx_stored = 0;
        self.rx_offered = 0;
    }

    /// Cross-phase hand-off, run at the boundary of a receiving
    /// [Phase::ProvideData] session: the payload just received becomes the
    /// echo source for the frame sent back next phase.
    ///
    /// A short session echoes what was collected, filler-extended; the short
    /// count is flagged separately on the report so filler is never mistaken
    /// for real data. The trailer is computed from the buffer contents fixed
    /// here, not from anything still moving on the wire.
    fn requeue_echo(&mut self) {
        self.tx_buf[..self.rx_stored].copy_from_slice(&self.rx_buf[..self.rx_stored]);
        self.tx_buf[self.rx_stored..PAYLOAD_SIZE].fill(FILLER_BYTE);
        let checksum = self.policy.compute(&self.tx_buf[..PAYLOAD_SIZE]);
        frame::write_trailer(&mut self.tx_buf[..FRAME_SIZE], checksum);
        self.tx_staged = true;
        trace!("staged echo frame, trailer: {checksum:08X}");
    }

    /// Extracts and checks the trailer of a received [Phase::VerifyChecksum]
    /// frame. A session too short to carry a trailer has nothing to verify;
    /// the truncation flag on the phase report is the only signal for that
    /// cycle.
    fn check_received_frame(&self) -> Option<Verification> {
        let collected = self.received();
        if collected.len() < TRAILER_SIZE {
            return None;
        }
        let received = frame::read_trailer(collected);
        let computed = self.policy.compute(frame::payload(collected));
        Some(verify::verify(received, computed))
    }
}
