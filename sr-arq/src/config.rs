//! Engine configuration.
//!
//! A [`Config`] can only be obtained through [`Config::new`] (or
//! [`Default`]), which enforces `seq_space ≥ 2 × window_size`.  Both state
//! machines are built from a validated [`Config`], so a sequence space too
//! small to tell packet generations apart is rejected at construction and
//! never reaches the protocol.  The space is also capped at
//! [`MAX_SEQ_SPACE`], which bounds both per-side buffers.

use thiserror::Error;

use crate::seq_space::SeqSpace;

/// Default number of in-flight packets.
pub const DEFAULT_WINDOW_SIZE: usize = 6;
/// Default sequence-space size.
pub const DEFAULT_SEQ_SPACE: u32 = 12;
/// Default retransmission timeout, in simulated time units.
pub const DEFAULT_TIMEOUT: f64 = 16.0;
/// Largest accepted sequence space.  The receiver keeps one slot per number.
pub const MAX_SEQ_SPACE: u32 = 1 << 16;

/// What the sender retransmits when its single timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetransmitPolicy {
    /// Resend only the oldest unacknowledged packet.
    OldestOnly,
    /// Resend every unacknowledged packet in the window.
    #[default]
    AllUnacked,
}

/// Errors raised by [`Config::new`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("sequence space {seq_space} is smaller than twice the window size {window_size}")]
    SeqSpaceTooSmall { seq_space: u32, window_size: usize },
    #[error("sequence space {0} exceeds the maximum of {}", MAX_SEQ_SPACE)]
    SeqSpaceTooLarge(u32),
    #[error("timeout must be a positive finite number, got {0}")]
    InvalidTimeout(f64),
}

/// Validated protocol parameters shared by sender and receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    window_size: usize,
    seq_space: SeqSpace,
    timeout: f64,
    policy: RetransmitPolicy,
}

impl Config {
    pub fn new(window_size: usize, seq_space: u32, timeout: f64) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        let too_small = u64::try_from(window_size)
            .map(|w| u64::from(seq_space) < w.saturating_mul(2))
            .unwrap_or(true);
        if too_small {
            return Err(ConfigError::SeqSpaceTooSmall {
                seq_space,
                window_size,
            });
        }
        if seq_space > MAX_SEQ_SPACE {
            return Err(ConfigError::SeqSpaceTooLarge(seq_space));
        }
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(ConfigError::InvalidTimeout(timeout));
        }
        Ok(Self {
            window_size,
            seq_space: SeqSpace::new(seq_space),
            timeout,
            policy: RetransmitPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RetransmitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn seq_space(&self) -> SeqSpace {
        self.seq_space
    }

    pub fn timeout(&self) -> f64 {
        self.timeout
    }

    pub fn policy(&self) -> RetransmitPolicy {
        self.policy
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            seq_space: SeqSpace::new(DEFAULT_SEQ_SPACE),
            timeout: DEFAULT_TIMEOUT,
            policy: RetransmitPolicy::AllUnacked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let c = Config::default();
        let rebuilt =
            Config::new(c.window_size(), c.seq_space().size(), c.timeout()).unwrap();
        assert_eq!(c, rebuilt);
        assert_eq!(c.policy(), RetransmitPolicy::AllUnacked);
    }

    #[test]
    fn exactly_twice_window_is_accepted() {
        assert!(Config::new(4, 8, 16.0).is_ok());
    }

    #[test]
    fn seq_space_below_twice_window_is_rejected() {
        assert_eq!(
            Config::new(4, 7, 16.0),
            Err(ConfigError::SeqSpaceTooSmall {
                seq_space: 7,
                window_size: 4
            })
        );
    }

    #[test]
    fn oversized_parameters_are_rejected() {
        assert!(Config::new(1 << 15, MAX_SEQ_SPACE, 16.0).is_ok());
        assert_eq!(
            Config::new(4, MAX_SEQ_SPACE + 1, 16.0),
            Err(ConfigError::SeqSpaceTooLarge(MAX_SEQ_SPACE + 1))
        );
        assert_eq!(
            Config::new(4, u32::MAX, 16.0),
            Err(ConfigError::SeqSpaceTooLarge(u32::MAX))
        );
        // a huge window can only pass with a huge space, which is capped
        assert!(matches!(
            Config::new(usize::MAX, u32::MAX, 16.0),
            Err(ConfigError::SeqSpaceTooSmall { .. })
        ));
        assert!(matches!(
            Config::new((1 << 15) + 1, MAX_SEQ_SPACE, 16.0),
            Err(ConfigError::SeqSpaceTooSmall { .. })
        ));
    }

    #[test]
    fn zero_window_is_rejected() {
        assert_eq!(Config::new(0, 8, 16.0), Err(ConfigError::ZeroWindow));
    }

    #[test]
    fn bad_timeouts_are_rejected() {
        assert!(matches!(
            Config::new(2, 4, 0.0),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            Config::new(2, 4, f64::NAN),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            Config::new(2, 4, f64::INFINITY),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn policy_override() {
        let c = Config::new(2, 4, 5.0)
            .unwrap()
            .with_policy(RetransmitPolicy::OldestOnly);
        assert_eq!(c.policy(), RetransmitPolicy::OldestOnly);
    }
}
