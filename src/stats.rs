use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of protocol events seen by one participant.
#[derive(Debug, Default)]
pub struct PeerStats {
    pings_sent: AtomicU64,
    pongs_sent: AtomicU64,
    pings_regenerated: AtomicU64,
    pongs_regenerated: AtomicU64,
    pings_dropped: AtomicU64,
    pongs_dropped: AtomicU64,
    stale_discarded: AtomicU64,
    grants: AtomicU64,
    critical_sections: AtomicU64,
    incarnations: AtomicU64,
}

/// Point-in-time copy of [`PeerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// PINGs forwarded by the control loop after a critical section.
    pub pings_sent: u64,
    /// PONGs forwarded downstream by the receiver loop.
    pub pongs_sent: u64,
    pub pings_regenerated: u64,
    pub pongs_regenerated: u64,
    pub pings_dropped: u64,
    pub pongs_dropped: u64,
    pub stale_discarded: u64,
    pub grants: u64,
    pub critical_sections: u64,
    pub incarnations: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl PeerStats {
    counter!(record_ping_sent, pings_sent);
    counter!(record_pong_sent, pongs_sent);
    counter!(record_ping_regenerated, pings_regenerated);
    counter!(record_pong_regenerated, pongs_regenerated);
    counter!(record_ping_dropped, pings_dropped);
    counter!(record_pong_dropped, pongs_dropped);
    counter!(record_stale, stale_discarded);
    counter!(record_grant, grants);
    counter!(record_critical_section, critical_sections);
    counter!(record_incarnation, incarnations);

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            pongs_sent: self.pongs_sent.load(Ordering::Relaxed),
            pings_regenerated: self.pings_regenerated.load(Ordering::Relaxed),
            pongs_regenerated: self.pongs_regenerated.load(Ordering::Relaxed),
            pings_dropped: self.pings_dropped.load(Ordering::Relaxed),
            pongs_dropped: self.pongs_dropped.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            grants: self.grants.load(Ordering::Relaxed),
            critical_sections: self.critical_sections.load(Ordering::Relaxed),
            incarnations: self.incarnations.load(Ordering::Relaxed),
        }
    }
}
