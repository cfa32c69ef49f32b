//! Request generations for discarding stale fetch results.
//!
//! Each fetch channel has a generation counter. Issuing a request bumps the
//! counter and hands out a [`RequestToken`]; when the response arrives it is
//! accepted only if its token still carries the channel's latest
//! generation. A newer request, or an explicit invalidation, makes every
//! older token stale.

use std::collections::BTreeMap;

use strum_macros::{AsRefStr, Display};

/// Independent fetch streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FetchChannel {
    Overrides,
    Timeline,
}

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
    pub channel: FetchChannel,
    pub generation: u64,
}

/// A response whose request has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Stale {channel} response (generation {received}, current {current})")]
pub struct StaleResponseError {
    pub channel: FetchChannel,
    pub received: u64,
    pub current: u64,
}

/// Generation counters per channel.
#[derive(Debug, Clone, Default)]
pub struct RequestGenerations {
    current: BTreeMap<FetchChannel, u64>,
}

impl RequestGenerations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request on `channel`, superseding older ones.
    pub fn issue(&mut self, channel: FetchChannel) -> RequestToken {
        let generation = self.current.entry(channel).or_insert(0);
        *generation += 1;
        RequestToken {
            channel,
            generation: *generation,
        }
    }

    /// Makes every outstanding token on `channel` stale.
    pub fn invalidate(&mut self, channel: FetchChannel) {
        *self.current.entry(channel).or_insert(0) += 1;
    }

    #[must_use]
    pub fn current(&self, channel: FetchChannel) -> u64 {
        self.current.get(&channel).copied().unwrap_or(0)
    }

    /// Checks that `token` is still the latest on its channel.
    ///
    /// # Errors
    ///
    /// * [`StaleResponseError`] if a newer request was issued or the
    ///   channel was invalidated.
    pub fn accept(&self, token: RequestToken) -> Result<(), StaleResponseError> {
        let current = self.current(token.channel);
        if token.generation == current {
            Ok(())
        } else {
            Err(StaleResponseError {
                channel: token.channel,
                received: token.generation,
                current,
            })
        }
    }
}
