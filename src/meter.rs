//! # Level Metering
//!
//! The audio thread measures each channel's output level once per block
//! and publishes it; a UI polls the published value on a timer. The two
//! sides only share [`MeterReadout`], a handful of atomics.
//!
//! ## Ballistics
//!
//! The meter shows block RMS in dB. Rises are shown immediately; falls
//! glide down linearly over half a second, so short gaps don't make the
//! meter flicker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use nih_plug::nih_warn;
use nih_plug::prelude::{Smoother, SmoothingStyle};

/// Quietest level the meter reports.
pub const SILENCE_DB: f32 = -100.0;

/// Channels the readout has slots for.
pub const MAX_METER_CHANNELS: usize = 2;

/// How long a falling meter takes to reach its new level, in milliseconds.
const FALL_MS: f32 = 500.0;

/// Range mapped onto the segment display.
const DISPLAY_MIN_DB: f32 = -60.0;
const DISPLAY_MAX_DB: f32 = 6.0;

/// Segments in the discrete meter display.
pub const METER_SEGMENTS: usize = 10;

/// Rate at which [`MeterPoller`] refreshes.
pub const POLL_HZ: u32 = 24;

/// Linear gain to dB, floored at [`SILENCE_DB`].
pub fn gain_to_db(gain: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Root-mean-square of a block. Empty blocks are silent.
pub fn block_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Number of lit segments (out of `segments`) for a level in dB.
///
/// `[-60, +6]` dB maps linearly onto `[0, 1]`; segment `i` lights when
/// the level reaches `(i + 1) / segments`.
pub fn lit_segments(level_db: f32, segments: usize) -> usize {
    if segments == 0 || level_db.is_nan() {
        return 0;
    }
    let level = (level_db - DISPLAY_MIN_DB) / (DISPLAY_MAX_DB - DISPLAY_MIN_DB);
    (0..segments)
        .filter(|&i| level >= (i + 1) as f32 / segments as f32)
        .count()
}

/// The published, smoothed level of each channel. Written by the audio
/// thread, read from anywhere.
#[derive(Debug)]
pub struct MeterReadout {
    levels: [AtomicU32; MAX_METER_CHANNELS],
}

impl Default for MeterReadout {
    fn default() -> Self {
        Self {
            levels: std::array::from_fn(|_| AtomicU32::new(SILENCE_DB.to_bits())),
        }
    }
}

impl MeterReadout {
    /// Smoothed RMS of `channel` in dB. Unknown channels read as silence.
    pub fn rms_db(&self, channel: usize) -> f32 {
        self.levels
            .get(channel)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .unwrap_or(SILENCE_DB)
    }

    fn publish(&self, channel: usize, level_db: f32) {
        if let Some(slot) = self.levels.get(channel) {
            slot.store(level_db.to_bits(), Ordering::Relaxed);
        }
    }

    fn clear(&self) {
        for slot in &self.levels {
            slot.store(SILENCE_DB.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Audio-thread side of the meter: one smoother per channel.
#[derive(Debug)]
pub struct RmsMeter {
    smoothers: [Smoother<f32>; MAX_METER_CHANNELS],
    /// Level each smoother is currently falling towards.
    fall_targets: [f32; MAX_METER_CHANNELS],
    sample_rate: f32,
    readout: Arc<MeterReadout>,
}

impl Default for RmsMeter {
    fn default() -> Self {
        let meter = Self {
            smoothers: std::array::from_fn(|_| Smoother::new(SmoothingStyle::Linear(FALL_MS))),
            fall_targets: [SILENCE_DB; MAX_METER_CHANNELS],
            sample_rate: 44100.0,
            readout: Arc::new(MeterReadout::default()),
        };
        for smoother in &meter.smoothers {
            smoother.reset(SILENCE_DB);
        }
        meter
    }
}

impl RmsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for readers on other threads.
    pub fn readout(&self) -> Arc<MeterReadout> {
        Arc::clone(&self.readout)
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    /// Drop every channel back to silence.
    pub fn reset(&mut self) {
        for smoother in &self.smoothers {
            smoother.reset(SILENCE_DB);
        }
        self.fall_targets = [SILENCE_DB; MAX_METER_CHANNELS];
        self.readout.clear();
    }

    /// Measure one channel's processed block and publish the new level.
    pub fn update(&mut self, channel: usize, samples: &[f32]) {
        let (Some(smoother), Some(fall_target)) =
            (self.smoothers.get(channel), self.fall_targets.get_mut(channel))
        else {
            return;
        };
        if samples.is_empty() {
            return;
        }

        smoother.next_step(samples.len() as u32);
        let level_db = gain_to_db(block_rms(samples));
        if level_db >= smoother.previous_value() {
            smoother.reset(level_db);
            *fall_target = level_db;
        } else if level_db != *fall_target {
            // Retargeting restarts the ramp, so only do it when the level
            // being fallen towards actually changes.
            smoother.set_target(self.sample_rate, level_db);
            *fall_target = level_db;
        }

        self.readout.publish(channel, smoother.previous_value());
    }
}

/// A UI-side task that samples one channel's level at [`POLL_HZ`] and
/// hands the number of lit segments to a callback.
///
/// The task stops on [`stop()`](Self::stop) or when the poller is dropped.
pub struct MeterPoller {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MeterPoller {
    pub fn spawn<F>(readout: Arc<MeterReadout>, channel: usize, on_poll: F) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        Self::spawn_with_interval(
            readout,
            channel,
            Duration::from_secs(1) / POLL_HZ,
            on_poll,
        )
    }

    pub fn spawn_with_interval<F>(
        readout: Arc<MeterReadout>,
        channel: usize,
        interval: Duration,
        mut on_poll: F,
    ) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::spawn(move || loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    on_poll(lit_segments(readout.rms_db(channel), METER_SEGMENTS));
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Cancel the task and wait for it to finish.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which wakes the
        // `recv(stop_rx)` arm.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                nih_warn!("Meter poll task panicked");
            }
        }
    }
}

impl Drop for MeterPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
