//! Clients for the external payment and SMS providers.
//!
//! Each provider is a trait with a mock variant (sandbox operation, no
//! network) and an HTTP variant (live). The variant is picked once at startup
//! from configuration.

pub mod payment;
pub mod sms;

use rand::Rng;

/// Decides whether a simulated provider call succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    Always,
    Never,
    /// Succeeds with the given probability in percent (0..=100).
    Rate(u8),
}

impl ApprovalPolicy {
    pub fn approves(&self) -> bool {
        match *self {
            Self::Always => true,
            Self::Never => false,
            Self::Rate(percent) if percent >= 100 => true,
            Self::Rate(percent) => rand::thread_rng().gen_range(0..100) < u32::from(percent),
        }
    }
}
