//! Probe whose answer is set explicitly.

use std::sync::atomic::{AtomicU8, Ordering};

use tidelink_domain::LinkQuality;

use super::ports::ConnectivityProbe;

/// Link quality set by the host application, e.g. from platform network
/// callbacks.
#[derive(Debug)]
pub struct ManualLinkProbe {
    quality: AtomicU8,
}

impl ManualLinkProbe {
    #[must_use]
    pub fn new(initial: LinkQuality) -> Self {
        Self { quality: AtomicU8::new(encode(initial)) }
    }

    pub fn set(&self, quality: LinkQuality) {
        self.quality.store(encode(quality), Ordering::Release);
    }
}

impl Default for ManualLinkProbe {
    fn default() -> Self {
        Self::new(LinkQuality::HighQuality)
    }
}

impl ConnectivityProbe for ManualLinkProbe {
    fn link_quality(&self) -> LinkQuality {
        decode(self.quality.load(Ordering::Acquire))
    }
}

const fn encode(quality: LinkQuality) -> u8 {
    match quality {
        LinkQuality::HighQuality => 0,
        LinkQuality::Metered => 1,
        LinkQuality::Degraded => 2,
        LinkQuality::Unreachable => 3,
    }
}

const fn decode(raw: u8) -> LinkQuality {
    match raw {
        0 => LinkQuality::HighQuality,
        1 => LinkQuality::Metered,
        2 => LinkQuality::Degraded,
        _ => LinkQuality::Unreachable,
    }
}
