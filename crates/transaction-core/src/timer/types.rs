use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transaction timers, RFC 3261 Section 17 plus the stack's own housekeeping timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerType {
    /// INVITE request retransmit
    A,
    /// INVITE transaction timeout
    B,
    /// Wait for response retransmissions after a non-2xx to INVITE
    D,
    /// Non-INVITE request retransmit while Trying
    E1,
    /// Non-INVITE request retransmit while Proceeding
    E2,
    /// Non-INVITE transaction timeout
    F,
    /// INVITE final response retransmit
    G,
    /// Wait for ACK
    H,
    /// Absorb ACK retransmissions
    I,
    /// Absorb non-INVITE request retransmissions
    J,
    /// Absorb non-INVITE response retransmissions
    K,
    /// Send 100 Trying when the TU stays silent
    Trying,
    /// Reclaim a server transaction the TU abandoned
    CleanUp,
    /// Keep a client INVITE after a 2xx so retransmitted 2xx reach the TU
    StaleClient,
    /// Keep a server INVITE after a 2xx so the ACK reaches the TU
    StaleServer,
    /// Reclaim a stateless send
    Stateless,
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerType::A => "A",
            TimerType::B => "B",
            TimerType::D => "D",
            TimerType::E1 => "E1",
            TimerType::E2 => "E2",
            TimerType::F => "F",
            TimerType::G => "G",
            TimerType::H => "H",
            TimerType::I => "I",
            TimerType::J => "J",
            TimerType::K => "K",
            TimerType::Trying => "Trying",
            TimerType::CleanUp => "CleanUp",
            TimerType::StaleClient => "StaleClient",
            TimerType::StaleServer => "StaleServer",
            TimerType::Stateless => "Stateless",
        };
        f.write_str(name)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Base timer values. All other durations derive from these.
///
/// In configuration files the values are given in milliseconds:
///
/// ```toml
/// t1 = 500
/// t2 = 4000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// RTT estimate
    #[serde(with = "millis")]
    pub t1: Duration,
    /// Maximum retransmit interval for non-INVITE requests and INVITE responses
    #[serde(with = "millis")]
    pub t2: Duration,
    /// Maximum time a message remains in the network
    #[serde(with = "millis")]
    pub t4: Duration,
    /// Delay before a server INVITE sends 100 Trying on its own
    #[serde(with = "millis")]
    pub t100: Duration,
    /// Lifetime of stale INVITE transactions after a 2xx
    #[serde(with = "millis")]
    pub ts: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerSettings {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
            t100: Duration::from_millis(200),
            ts: Duration::from_secs(32),
        }
    }
}

impl TimerSettings {
    /// Settings with the given base values, rejected when they cannot drive
    /// a retransmission schedule.
    pub fn new(t1: Duration, t2: Duration, t4: Duration, t100: Duration, ts: Duration) -> Result<Self> {
        let settings = TimerSettings { t1, t2, t4, t100, ts };
        settings.validate()?;
        Ok(settings)
    }

    /// T1 must be non-zero and T2 at least T1.
    pub fn validate(&self) -> Result<()> {
        if self.t1.is_zero() {
            return Err(Error::InvalidTimerSettings("t1 must be greater than zero".to_string()));
        }
        if self.t2 < self.t1 {
            return Err(Error::InvalidTimerSettings(format!(
                "t2 ({} ms) is shorter than t1 ({} ms)",
                self.t2.as_millis(),
                self.t1.as_millis()
            )));
        }
        Ok(())
    }

    /// Timer B, F, H and J: 64*T1
    pub fn transaction_timeout(&self) -> Duration {
        self.t1 * 64
    }

    pub fn timer_b(&self) -> Duration {
        self.transaction_timeout()
    }

    /// Timer D is at least 32 seconds for unreliable transports.
    pub fn timer_d(&self) -> Duration {
        Duration::from_secs(32).max(self.transaction_timeout())
    }

    pub fn timer_f(&self) -> Duration {
        self.transaction_timeout()
    }

    pub fn timer_h(&self) -> Duration {
        self.transaction_timeout()
    }

    pub fn timer_i(&self) -> Duration {
        self.t4
    }

    pub fn timer_j(&self) -> Duration {
        self.transaction_timeout()
    }

    pub fn timer_k(&self) -> Duration {
        self.t4
    }

    /// Next retransmit interval: doubled and capped at T2, never below 1 ms.
    pub fn backoff(&self, current: Duration) -> Duration {
        (current * 2).min(self.t2).max(MIN_INTERVAL)
    }

    /// When a non-INVITE server transaction answers 100 on its own (RFC 4320):
    /// the time the client's Timer E takes to reach T2.
    pub fn non_invite_trying(&self) -> Duration {
        let mut interval = self.t1.max(MIN_INTERVAL);
        let mut total = Duration::ZERO;
        while interval < self.t2 {
            total += interval;
            interval *= 2;
        }
        total
    }
}
