//! # Feedback Delay
//!
//! One [`DelayLine`] and one [`OnePoleHighPass`] per channel, driven by a
//! shared feedback gain and wet level.
//!
//! ## Signal Flow (per channel, per sample)
//!
//! ```text
//! input ──┬─────────────────────────────────────────────(+)──► output
//!         │                                               ▲
//!         │                                         × wet │
//!         │                                               │
//!         └──►(+)──► tanh ──► [Delay Line] ──► [High-pass]┤
//!              ▲                                          │
//!              └──────────────── × feedback ◄─────────────┘
//! ```
//!
//! 1. `delayed = highpass(line.get(delay_samples))`
//! 2. `line.push(tanh(input + feedback * delayed))`
//! 3. `output = input + wet * delayed`
//!
//! The filter and the saturator both live inside the loop, so every
//! repeat is thinned and soft-clipped once more than the last one. The
//! `tanh` keeps whatever enters the line strictly inside (-1, 1), so even
//! with feedback at 1.0 the loop cannot run away. The dry signal is never
//! attenuated: the wet tap is added on top.

use std::num::NonZeroUsize;

use nih_plug::{nih_debug_assert, nih_debug_assert_failure};
use num_traits::{Float, FloatConst};

use super::delay_line::DelayLine;
use super::filter::OnePoleHighPass;

/// Cutoff of the damping high-pass in the feedback path.
const DAMPING_CUTOFF_HZ: f64 = 1000.0;

/// Default longest supported delay. The host-facing parameter stops at
/// 2 s; the extra 100 ms is headroom so the longest setting never touches
/// the end of the buffer.
pub const DEFAULT_MAX_DELAY_SECONDS: f64 = 2.1;

/// Sample rate assumed until `prepare()` tells us the real one.
const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

#[inline]
fn lit<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::zero)
}

/// A saturating feedback delay with `N` independent channels.
#[derive(Debug, Clone)]
pub struct Delay<T, const N: usize = 2> {
    delay_lines: [DelayLine<T>; N],
    filters: [OnePoleHighPass<T>; N],

    /// Per-channel delay time in seconds, as set by the owner.
    delay_times: [T; N],

    /// `delay_times` converted to whole samples at `sample_rate`. Always
    /// `< delay line capacity`.
    delay_times_samples: [usize; N],

    feedback: T,
    wet_level: T,

    sample_rate: T,
    max_delay_time: T,

    /// Channels in use since the last `prepare()`. `process()` never
    /// touches more than this many.
    active_channels: usize,
}

impl<T: Float + FloatConst, const N: usize> Delay<T, N> {
    /// Create a delay sized for [`DEFAULT_MAX_DELAY_SECONDS`] at 44.1 kHz
    /// with 0.5 s delay time, 0.5 feedback and 0.5 wet level on every
    /// channel.
    pub fn new() -> Self {
        let sample_rate: T = lit(DEFAULT_SAMPLE_RATE);
        let max_delay_time: T = lit(DEFAULT_MAX_DELAY_SECONDS);
        let capacity = capacity_for(max_delay_time, sample_rate);

        let mut delay = Self {
            delay_lines: std::array::from_fn(|_| DelayLine::new(capacity)),
            filters: std::array::from_fn(|_| OnePoleHighPass::new()),
            delay_times: [lit(0.5); N],
            delay_times_samples: [0; N],
            feedback: lit(0.5),
            wet_level: lit(0.5),
            sample_rate,
            max_delay_time,
            active_channels: N,
        };
        delay.update_filters();
        delay.update_delay_times();
        delay
    }

    /// Size the delay lines and filters for a new stream format.
    ///
    /// Allocates when the capacity changes. Call only while the audio
    /// engine is stopped.
    pub fn prepare(&mut self, sample_rate: f32, _max_block_size: usize, num_channels: usize) {
        nih_debug_assert!(
            num_channels <= N,
            "delay prepared for more channels than it owns"
        );
        nih_debug_assert!(sample_rate > 0.0, "sample rate must be positive");

        self.active_channels = num_channels.min(N);
        if sample_rate > 0.0 {
            self.sample_rate = lit(f64::from(sample_rate));
        }

        self.update_delay_line_size();
        self.update_delay_times();
        self.update_filters();
        for f in &mut self.filters {
            f.reset();
        }
    }

    /// Silence all delay lines and filter memories. Sizes and parameters
    /// are kept.
    pub fn reset(&mut self) {
        for f in &mut self.filters {
            f.reset();
        }
        for line in &mut self.delay_lines {
            line.clear();
        }
    }

    /// Number of channels this delay owns (`N`).
    pub fn num_channels(&self) -> usize {
        N
    }

    /// Change the longest supported delay time in seconds.
    ///
    /// Reallocates every delay line immediately, so any retained audio is
    /// lost. Existing per-channel delay times are re-clamped to the new
    /// maximum. Non-positive values are rejected.
    pub fn set_max_delay_time(&mut self, seconds: T) {
        if !(seconds > T::zero()) {
            nih_debug_assert_failure!("max delay time must be positive");
            return;
        }

        self.max_delay_time = seconds;
        for t in &mut self.delay_times {
            *t = t.min(seconds);
        }
        self.update_delay_line_size();
        self.update_delay_times();
    }

    pub fn max_delay_time(&self) -> T {
        self.max_delay_time
    }

    /// Feedback gain, clamped to `[0, 1]`.
    pub fn set_feedback(&mut self, feedback: T) {
        self.feedback = clamp_unit(feedback);
    }

    pub fn feedback(&self) -> T {
        self.feedback
    }

    /// Level of the delayed tap added to the dry signal, clamped to
    /// `[0, 1]`.
    pub fn set_wet_level(&mut self, wet_level: T) {
        self.wet_level = clamp_unit(wet_level);
    }

    pub fn wet_level(&self) -> T {
        self.wet_level
    }

    /// Set one channel's delay time in seconds, clamped to
    /// `[0, max_delay_time]`. An out-of-range channel is ignored.
    pub fn set_delay_time(&mut self, channel: usize, seconds: T) {
        if channel >= N {
            nih_debug_assert_failure!("delay channel {} out of range", channel);
            return;
        }

        let seconds = if seconds.is_nan() { T::zero() } else { seconds };
        self.delay_times[channel] = seconds.max(T::zero()).min(self.max_delay_time);
        self.delay_times_samples[channel] = self.seconds_to_samples(self.delay_times[channel]);
    }

    /// The delay time last set for `channel`, in seconds.
    pub fn delay_time(&self, channel: usize) -> Option<T> {
        self.delay_times.get(channel).copied()
    }

    /// The delay time of `channel` converted to samples.
    pub fn delay_time_samples(&self, channel: usize) -> Option<usize> {
        self.delay_times_samples.get(channel).copied()
    }

    /// Capacity of every delay line in samples.
    pub fn capacity(&self) -> usize {
        self.delay_lines[0].capacity()
    }

    /// Process a block of channels in place. Channel `ch` uses delay
    /// line `ch`; channels past `N` (or past the prepared count) pass
    /// through untouched.
    pub fn process(&mut self, block: &mut [&mut [T]]) {
        for (channel, samples) in block.iter_mut().enumerate().take(self.active_channels) {
            self.process_channel(channel, samples);
        }
    }

    /// Process one channel's samples in place.
    pub fn process_channel(&mut self, channel: usize, samples: &mut [T]) {
        let (Some(line), Some(filter)) = (
            self.delay_lines.get_mut(channel),
            self.filters.get_mut(channel),
        ) else {
            nih_debug_assert_failure!("delay channel {} out of range", channel);
            return;
        };
        let delay_samples = self.delay_times_samples[channel];
        let feedback = self.feedback;
        let wet_level = self.wet_level;

        for sample in samples.iter_mut() {
            let input = *sample;
            let delayed = filter.process(line.get(delay_samples));
            line.push((input + feedback * delayed).tanh());
            *sample = input + wet_level * delayed;
        }
    }

    fn seconds_to_samples(&self, seconds: T) -> usize {
        let samples = (seconds * self.sample_rate).round().to_usize().unwrap_or(0);
        // Rounding can land exactly on capacity when max_delay_time * rate
        // is a whole number.
        samples.min(self.capacity() - 1)
    }

    fn update_delay_line_size(&mut self) {
        let capacity = capacity_for(self.max_delay_time, self.sample_rate);
        for line in &mut self.delay_lines {
            if line.capacity() != capacity.get() {
                line.resize(capacity);
            } else {
                line.clear();
            }
        }
    }

    fn update_delay_times(&mut self) {
        for ch in 0..N {
            self.delay_times_samples[ch] = self.seconds_to_samples(self.delay_times[ch]);
        }
    }

    fn update_filters(&mut self) {
        for f in &mut self.filters {
            f.set_cutoff(lit(DAMPING_CUTOFF_HZ), self.sample_rate);
        }
    }
}

impl<T: Float + FloatConst, const N: usize> Default for Delay<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

fn capacity_for<T: Float>(max_delay_time: T, sample_rate: T) -> NonZeroUsize {
    let samples = (max_delay_time * sample_rate).ceil().to_usize().unwrap_or(1);
    NonZeroUsize::new(samples).unwrap_or(NonZeroUsize::MIN)
}

fn clamp_unit<T: Float>(value: T) -> T {
    if value.is_nan() {
        return T::zero();
    }
    value.max(T::zero()).min(T::one())
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(sample_rate: f32) -> Delay<f32, 2> {
        let mut delay = Delay::new();
        delay.prepare(sample_rate, 512, 2);
        delay
    }

    fn impulse_response(delay: &mut Delay<f32, 2>, len: usize) -> Vec<f32> {
        let mut block = vec![0.0_f32; len];
        block[0] = 1.0;
        delay.process_channel(0, &mut block);
        block
    }

    fn highpass_impulse_gain(sample_rate: f32) -> f32 {
        let mut hp = OnePoleHighPass::<f32>::new();
        hp.set_cutoff(1000.0, sample_rate);
        hp.impulse_gain()
    }

    #[test]
    fn test_delay_time_in_samples() {
        let mut delay = prepared(44100.0);
        delay.set_delay_time(0, 0.5);

        assert_eq!(delay.delay_time_samples(0), Some(22050));
    }

    /// An impulse comes back after the delay, scaled by wet * b0, and the
    /// second repeat is scaled down by the feedback.
    #[test]
    fn test_impulse_echoes() {
        let sr = 44100.0;
        let mut delay = prepared(sr);
        delay.set_delay_time(0, 0.5);
        delay.set_feedback(0.5);
        delay.set_wet_level(0.5);

        let d = delay.delay_time_samples(0).unwrap();
        let out = impulse_response(&mut delay, 2 * d + 8);
        let b0 = highpass_impulse_gain(sr);

        // Dry impulse passes unchanged; the line is silent until the echo.
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!(out[1..=d].iter().all(|s| s.abs() < 1e-9));

        // The tap is read before the current sample is pushed, so the
        // sample pushed at n reappears at n + d + 1.
        let first = out[d + 1];
        assert!(
            (first - 0.5 * b0 * 1.0_f32.tanh()).abs() < 1e-5,
            "first echo {first}"
        );

        let second = out[2 * d + 2];
        assert!(second.abs() > 1e-4, "second echo should exist");
        assert!(second.abs() < first.abs() * 0.6, "second echo must decay");
    }

    /// With no feedback there is exactly one echo.
    #[test]
    fn test_no_feedback_single_echo() {
        let mut delay = prepared(44100.0);
        delay.set_delay_time(0, 0.001); // 44 samples
        delay.set_feedback(0.0);
        delay.set_wet_level(1.0);

        let d = delay.delay_time_samples(0).unwrap();
        assert_eq!(d, 44);
        let out = impulse_response(&mut delay, 400);

        // Energy around the first echo (high-pass tail included) ...
        let echo_energy: f32 = out[d + 1..d + 16].iter().map(|s| s * s).sum();
        assert!(echo_energy > 0.1);

        // ... and nothing from the second echo position on: only one pass
        // through the line happened, and the filter's own ringing has
        // decayed by then.
        for (i, s) in out.iter().enumerate().skip(2 * d + 2) {
            assert!(s.abs() < 1e-3, "unexpected energy {s} at {i}");
        }
    }

    /// Whatever goes into the line is strictly inside (-1, 1).
    #[test]
    fn test_feedback_path_saturates() {
        let mut delay = prepared(1000.0);
        delay.set_delay_time(0, 0.005);
        delay.set_feedback(1.0);
        delay.set_wet_level(1.0);

        let mut block: Vec<f32> = (0..4000)
            .map(|i| if i % 7 == 0 { 50.0 } else { -30.0 })
            .collect();
        delay.process_channel(0, &mut block);

        for k in 0..delay.capacity() {
            let v = delay.delay_lines[0].get(k);
            assert!(v > -1.0 && v < 1.0, "line value {v} escaped (-1, 1)");
        }
        assert!(block.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_feedback_and_wet_are_clamped() {
        let mut delay = Delay::<f32, 2>::new();

        delay.set_feedback(1.5);
        assert_eq!(delay.feedback(), 1.0);
        delay.set_feedback(-0.2);
        assert_eq!(delay.feedback(), 0.0);

        delay.set_wet_level(7.0);
        assert_eq!(delay.wet_level(), 1.0);
        delay.set_wet_level(-1.0);
        assert_eq!(delay.wet_level(), 0.0);
        delay.set_wet_level(f32::NAN);
        assert_eq!(delay.wet_level(), 0.0);
    }

    /// Delay times in samples stay below capacity for every rate and
    /// every requested time, including ones past the maximum.
    #[test]
    fn test_capacity_invariant() {
        for sr in [8000.0, 22050.0, 44100.0, 48000.0, 88200.0, 96000.0, 192000.0] {
            for max in [0.001_f32, 0.5, 1.0, 2.0, 2.1] {
                let mut delay = Delay::<f32, 2>::new();
                delay.set_max_delay_time(max);
                delay.prepare(sr, 256, 2);

                for t in [0.0, 0.0005, 0.25, 0.5, 1.0, 2.0, 2.1, 5.0, -1.0] {
                    delay.set_delay_time(0, t);
                    delay.set_delay_time(1, t * 0.5);
                    for ch in 0..2 {
                        let samples = delay.delay_time_samples(ch).unwrap();
                        assert!(
                            samples < delay.capacity(),
                            "sr {sr}, max {max}, t {t}: {samples} >= {}",
                            delay.capacity()
                        );
                    }
                }

                // Changing the rate afterwards keeps the invariant too.
                delay.prepare(sr * 0.5, 256, 2);
                assert!(delay.delay_time_samples(0).unwrap() < delay.capacity());
            }
        }
    }

    #[test]
    fn test_capacity_from_max_delay_time() {
        let delay = prepared(48000.0);
        assert_eq!(delay.capacity(), (2.1_f32 * 48000.0).ceil() as usize);
    }

    #[test]
    fn test_delay_time_clamped_to_max() {
        let mut delay = prepared(1000.0);
        delay.set_max_delay_time(1.0);

        delay.set_delay_time(1, 3.0);
        assert_eq!(delay.delay_time(1), Some(1.0));
        assert_eq!(delay.delay_time_samples(1), Some(delay.capacity() - 1));

        delay.set_delay_time(1, -0.5);
        assert_eq!(delay.delay_time(1), Some(0.0));
        assert_eq!(delay.delay_time_samples(1), Some(0));
    }

    /// Shrinking the maximum pulls longer delay times down with it.
    #[test]
    fn test_shrinking_max_reclamps() {
        let mut delay = prepared(1000.0);
        delay.set_delay_time(0, 1.5);
        delay.set_max_delay_time(0.5);

        assert_eq!(delay.delay_time(0), Some(0.5));
        assert_eq!(delay.capacity(), 500);
        assert!(delay.delay_time_samples(0).unwrap() < 500);
    }

    #[test]
    fn test_unknown_channel_getters() {
        let delay = prepared(1000.0);
        assert_eq!(delay.delay_time(5), None);
        assert_eq!(delay.delay_time_samples(2), None);
        assert_eq!(delay.num_channels(), 2);
    }

    #[test]
    fn test_nan_delay_time_is_zero() {
        let mut delay = prepared(1000.0);
        delay.set_delay_time(0, f32::NAN);
        assert_eq!(delay.delay_time(0), Some(0.0));
        assert_eq!(delay.delay_time_samples(0), Some(0));
    }

    /// Channels are independent: the per-channel delay times can differ.
    #[test]
    fn test_per_channel_delay_times() {
        let mut delay = prepared(1000.0);
        delay.prepare(44100.0, 512, 2);
        delay.set_delay_time(0, 10.0 / 44100.0);
        delay.set_delay_time(1, 20.0 / 44100.0);
        delay.set_feedback(0.0);
        delay.set_wet_level(1.0);

        let mut left = vec![0.0_f32; 64];
        let mut right = vec![0.0_f32; 64];
        left[0] = 1.0;
        right[0] = 1.0;
        {
            let mut block: [&mut [f32]; 2] = [&mut left, &mut right];
            delay.process(&mut block);
        }

        assert!(left[11].abs() > 0.5);
        assert!(right[11].abs() < 1e-9);
        assert!(right[21].abs() > 0.5);
    }

    #[test]
    fn test_reset_silences_history() {
        let mut delay = prepared(1000.0);
        delay.set_delay_time(0, 0.01);
        delay.set_wet_level(1.0);

        let mut block = vec![1.0_f32; 8];
        delay.process_channel(0, &mut block);
        delay.reset();

        let mut silence = vec![0.0_f32; 64];
        delay.process_channel(0, &mut silence);
        assert!(silence.iter().all(|s| s.abs() < 1e-9));
        assert_eq!(delay.delay_time_samples(0), Some(10));
    }

    #[test]
    fn test_f64_delay() {
        let mut delay = Delay::<f64, 1>::new();
        delay.prepare(44100.0, 64, 1);
        delay.set_delay_time(0, 4.0 / 44100.0);
        delay.set_wet_level(1.0);

        let mut block = vec![0.0_f64; 16];
        block[0] = 0.5;
        delay.process(&mut [&mut block[..]]);

        assert!(block[5].abs() > 0.1);
    }
}
