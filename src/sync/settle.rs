use std::time::Duration;

use bevy::math::Vec2;

/// Anything smaller than this (world units / scale factor) is jitter.
const MOTION_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    pub translation: Vec2,
    pub scale: f32,
}

impl CameraSample {
    fn differs_from(&self, other: &CameraSample) -> bool {
        self.translation.distance(other.translation) > MOTION_EPSILON
            || (self.scale - other.scale).abs() > MOTION_EPSILON
    }
}

/// Turns a stream of camera samples into discrete "the map came to rest"
/// moments. Starts out pending so the first rest after startup counts.
#[derive(Debug, Clone)]
pub struct SettleDetector {
    delay: Duration,
    last: Option<CameraSample>,
    last_motion: Duration,
    pending: bool,
}

impl SettleDetector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: None,
            last_motion: Duration::ZERO,
            pending: true,
        }
    }

    /// Motion the camera transform doesn't show, e.g. a tile zoom change.
    pub fn mark_motion(&mut self, now: Duration) {
        self.pending = true;
        self.last_motion = now;
    }

    /// Returns `true` exactly once per rest period.
    pub fn observe(&mut self, sample: CameraSample, now: Duration) -> bool {
        match self.last {
            Some(last) if sample.differs_from(&last) => self.mark_motion(now),
            None => self.last_motion = now,
            _ => {}
        }
        self.last = Some(sample);

        if self.pending && now.saturating_sub(self.last_motion) >= self.delay {
            self.pending = false;
            return true;
        }
        false
    }

    pub fn is_moving(&self) -> bool {
        self.pending
    }
}
