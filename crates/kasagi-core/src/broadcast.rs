//! Local fan-out of encoded frames to a room's sessions.
//!
//! Delivery is queue-and-forget: each session's socket task drains its
//! own outbound queue, so a slow client never stalls the room actor.
//! Per-session failures (socket task already gone) are logged and do not
//! interrupt fan-out to the remaining sessions.

use tracing::{debug, warn};

use kasagi_types::RoomId;

use crate::session::{OutboundFrame, SessionHandle};

/// Deliver one frame to every open session of a room.
///
/// Returns the number of sessions the frame was queued for.
pub fn fan_out<'a>(
    room_id: &RoomId,
    sessions: impl Iterator<Item = &'a SessionHandle>,
    frame: &OutboundFrame,
) -> usize {
    let mut delivered = 0_usize;
    for session in sessions {
        if !session.is_open() {
            debug!(room = %room_id, session = %session.id, "skipping closed session");
            continue;
        }
        if session.send(frame.clone()) {
            delivered = delivered.saturating_add(1);
        } else {
            warn!(room = %room_id, session = %session.id, "session queue gone, frame dropped");
        }
    }
    debug!(room = %room_id, delivered, "frame fanned out");
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasagi_types::SessionId;
    use tokio::sync::mpsc;

    #[test]
    fn closed_sessions_do_not_interrupt_fanout() {
        let (tx_open, mut rx_open) = mpsc::unbounded_channel();
        let open = SessionHandle::new(SessionId::new(), tx_open);

        let (tx_closed, rx_closed) = mpsc::unbounded_channel();
        let closed = SessionHandle::new(SessionId::new(), tx_closed);
        drop(rx_closed);

        let sessions = [closed, open];
        let frame = OutboundFrame::Binary(vec![1, 2, 3]);
        let delivered = fan_out(&RoomId::new("r1"), sessions.iter(), &frame);

        assert_eq!(delivered, 1);
        assert_eq!(rx_open.try_recv().ok(), Some(frame));
    }
}
