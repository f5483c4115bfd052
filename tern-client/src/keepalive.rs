//! Keep-alive timing for a connected session.
//!
//! The anchor moves on every outbound packet while no ping is outstanding
//! and on every PINGRESP. A PINGREQ is due one interval after the anchor;
//! the connection is considered dead one and a half intervals after it.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeepAliveAction {
    Idle,
    SendPing,
    TimedOut,
}

#[derive(Debug)]
pub(crate) struct KeepAlive {
    interval: Option<Duration>,
    anchor: Instant,
    ping_outstanding: bool,
}

impl KeepAlive {
    /// A `keep_alive` of zero disables the timer.
    pub(crate) fn new(keep_alive: u16, now: Instant) -> Self {
        let interval = match keep_alive {
            0 => None,
            secs => Some(Duration::from_secs(secs as u64)),
        };

        Self {
            interval,
            anchor: now,
            ping_outstanding: false,
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.interval.map(|interval| {
            if self.ping_outstanding {
                self.anchor + interval * 3 / 2
            } else {
                self.anchor + interval
            }
        })
    }

    /// When the connection counts as dead if nothing resets the anchor,
    /// whether or not a ping has gone out yet.
    pub(crate) fn dead_deadline(&self) -> Option<Instant> {
        self.interval.map(|interval| self.anchor + interval * 3 / 2)
    }

    pub(crate) fn on_outbound(&mut self, now: Instant) {
        if !self.ping_outstanding {
            self.anchor = now;
        }
    }

    pub(crate) fn on_ping_response(&mut self, now: Instant) {
        self.ping_outstanding = false;
        self.anchor = now;
    }

    pub(crate) fn poll(&mut self, now: Instant) -> KeepAliveAction {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {
                if self.ping_outstanding {
                    KeepAliveAction::TimedOut
                } else {
                    self.ping_outstanding = true;
                    KeepAliveAction::SendPing
                }
            }
            _ => KeepAliveAction::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled() {
        let now = Instant::now();
        let mut keep_alive = KeepAlive::new(0, now);

        assert_eq!(keep_alive.next_deadline(), None);
        assert_eq!(
            keep_alive.poll(now + Duration::from_secs(3600)),
            KeepAliveAction::Idle
        );
    }

    #[test]
    fn test_ping_then_timeout() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(15, start);

        assert_eq!(
            keep_alive.next_deadline(),
            Some(start + Duration::from_secs(15))
        );
        assert_eq!(
            keep_alive.poll(start + Duration::from_secs(14)),
            KeepAliveAction::Idle
        );
        assert_eq!(
            keep_alive.poll(start + Duration::from_secs(15)),
            KeepAliveAction::SendPing
        );

        // The PINGREQ write itself does not move the anchor
        keep_alive.on_outbound(start + Duration::from_secs(15));
        assert_eq!(
            keep_alive.next_deadline(),
            Some(start + Duration::from_millis(22_500))
        );
        assert_eq!(
            keep_alive.poll(start + Duration::from_secs(22)),
            KeepAliveAction::Idle
        );
        assert_eq!(
            keep_alive.poll(start + Duration::from_millis(22_500)),
            KeepAliveAction::TimedOut
        );
    }

    #[test]
    fn test_ping_response_resets() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(10, start);

        assert_eq!(
            keep_alive.poll(start + Duration::from_secs(10)),
            KeepAliveAction::SendPing
        );
        keep_alive.on_ping_response(start + Duration::from_secs(11));

        assert_eq!(
            keep_alive.next_deadline(),
            Some(start + Duration::from_secs(21))
        );
    }

    #[test]
    fn test_outbound_traffic_postpones_ping() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(10, start);

        keep_alive.on_outbound(start + Duration::from_secs(8));
        assert_eq!(
            keep_alive.poll(start + Duration::from_secs(10)),
            KeepAliveAction::Idle
        );
        assert_eq!(
            keep_alive.next_deadline(),
            Some(start + Duration::from_secs(18))
        );
    }

    #[test]
    fn test_dead_deadline() {
        let start = Instant::now();
        let mut keep_alive = KeepAlive::new(15, start);
        assert_eq!(
            keep_alive.dead_deadline(),
            Some(start + Duration::from_millis(22_500))
        );

        keep_alive.on_outbound(start + Duration::from_secs(5));
        assert_eq!(
            keep_alive.dead_deadline(),
            Some(start + Duration::from_millis(27_500))
        );

        assert_eq!(KeepAlive::new(0, start).dead_deadline(), None);
    }
}
