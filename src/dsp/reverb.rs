//! # Room Reverb
//!
//! A mono Freeverb-style reverberator (Jezar's classic design), tuned the
//! same way as the stock reverb most plugin frameworks ship:
//!
//! ```text
//! input × 0.015 ──┬─► [Comb 1116] ─┐
//!                 ├─► [Comb 1188] ─┤
//!                 │      ...       (+)──► [Allpass 556] ─► [Allpass 441]
//!                 └─► [Comb 1617] ─┘          ─► [Allpass 341] ─► [Allpass 225] ─► × wet ─┐
//!                                                                                       (+)──► out
//! input ──────────────────────────────────────────────────────────────────────── × dry ─┘
//! ```
//!
//! The eight parallel combs build the dense decay; each has a one-pole
//! lowpass in its loop (the damping). The four series all-passes smear
//! the comb echoes into a diffuse tail. Tunings are in samples at
//! 44.1 kHz and are scaled to the running sample rate.

use nih_plug::prelude::{Smoother, SmoothingStyle};

/// Parameters of the reverb stage, all in `[0, 1]`.
///
/// `dry_level` is not derived here: the owner keeps `dry = 1 - wet`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    pub room_size: f32,
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet_level: 0.33,
            dry_level: 0.4,
        }
    }
}

const COMB_TUNINGS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS: [usize; 4] = [556, 441, 341, 225];

const INPUT_GAIN: f32 = 0.015;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
const WET_SCALE: f32 = 3.0;
const DRY_SCALE: f32 = 2.0;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Coefficient ramps last this long, in milliseconds.
const SMOOTHING_MS: f32 = 10.0;

/// Comb filter with a one-pole lowpass in its feedback loop.
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    last: f32,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            last: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, damp: f32, feedback: f32) -> f32 {
        let output = self.buffer[self.index];
        self.last = output * (1.0 - damp) + self.last * damp;
        self.buffer[self.index] = input + self.last * feedback;

        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.last = 0.0;
    }
}

/// Schroeder all-pass with a fixed 0.5 coefficient.
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.index];
        self.buffer[self.index] = input + buffered * ALLPASS_FEEDBACK;

        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }

        buffered - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// Mono room reverb.
#[derive(Debug)]
pub struct Reverb {
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],

    params: ReverbParams,
    sample_rate: f32,

    damping: Smoother<f32>,
    feedback: Smoother<f32>,
    wet_gain: Smoother<f32>,
    dry_gain: Smoother<f32>,
}

impl Reverb {
    pub fn new() -> Self {
        let reverb = Self {
            combs: std::array::from_fn(|i| CombFilter::new(COMB_TUNINGS[i])),
            allpasses: std::array::from_fn(|i| AllpassFilter::new(ALLPASS_TUNINGS[i])),
            params: ReverbParams::default(),
            sample_rate: 44100.0,
            damping: Smoother::new(SmoothingStyle::Linear(SMOOTHING_MS)),
            feedback: Smoother::new(SmoothingStyle::Linear(SMOOTHING_MS)),
            wet_gain: Smoother::new(SmoothingStyle::Linear(SMOOTHING_MS)),
            dry_gain: Smoother::new(SmoothingStyle::Linear(SMOOTHING_MS)),
        };
        reverb.snap_smoothers();
        reverb
    }

    /// Rebuild the filter buffers for `sample_rate`. Allocates.
    pub fn prepare(&mut self, sample_rate: f32) {
        let scale = sample_rate / 44100.0;
        let scaled = |tuning: usize| ((tuning as f32 * scale) as usize).max(1);

        self.combs = std::array::from_fn(|i| CombFilter::new(scaled(COMB_TUNINGS[i])));
        self.allpasses = std::array::from_fn(|i| AllpassFilter::new(scaled(ALLPASS_TUNINGS[i])));

        self.sample_rate = sample_rate;
        self.snap_smoothers();
    }

    /// Clear the tail and jump every coefficient to its target.
    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
        self.snap_smoothers();
    }

    /// Apply new parameters. Values are clamped to `[0, 1]`; the internal
    /// coefficients glide to their new targets over 10 ms.
    pub fn set_parameters(&mut self, params: ReverbParams) {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let params = ReverbParams {
            room_size: unit(params.room_size),
            damping: unit(params.damping),
            wet_level: unit(params.wet_level),
            dry_level: unit(params.dry_level),
        };
        // Called every block; retargeting with the same value would restart
        // the ramps.
        if params == self.params {
            return;
        }
        self.params = params;

        let [damping, feedback, wet_gain, dry_gain] = self.coefficients();
        self.damping.set_target(self.sample_rate, damping);
        self.feedback.set_target(self.sample_rate, feedback);
        self.wet_gain.set_target(self.sample_rate, wet_gain);
        self.dry_gain.set_target(self.sample_rate, dry_gain);
    }

    pub fn parameters(&self) -> ReverbParams {
        self.params
    }

    /// Process one channel in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = *sample * INPUT_GAIN;
            let damp = self.damping.next();
            let feedback = self.feedback.next();

            let mut output = 0.0;
            for comb in &mut self.combs {
                output += comb.process(input, damp, feedback);
            }
            for allpass in &mut self.allpasses {
                output = allpass.process(output);
            }

            let dry = self.dry_gain.next();
            let wet = self.wet_gain.next();
            *sample = output * wet + *sample * dry;
        }
    }

    /// Damping, comb feedback, wet gain and dry gain for the current
    /// parameters.
    fn coefficients(&self) -> [f32; 4] {
        [
            self.params.damping * DAMP_SCALE,
            comb_feedback(self.params.room_size),
            self.params.wet_level * WET_SCALE,
            self.params.dry_level * DRY_SCALE,
        ]
    }

    fn snap_smoothers(&self) {
        let [damping, feedback, wet_gain, dry_gain] = self.coefficients();
        self.damping.reset(damping);
        self.feedback.reset(feedback);
        self.wet_gain.reset(wet_gain);
        self.dry_gain.reset(dry_gain);
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

fn comb_feedback(room_size: f32) -> f32 {
    room_size * ROOM_SCALE + ROOM_OFFSET
}

/// Upper bound on how long the reverb rings after its input stops, in
/// samples.
///
/// Every pass around a comb scales its content by at most the comb
/// feedback `g` (the damping lowpass has unity gain at DC), so the slowest
/// comb reaches -60 dB after `-3 / log10(g)` passes of its own length.
/// Each all-pass rings on for another `-3 / log10(0.5)` passes of its
/// length after that.
pub fn tail_samples(room_size: f32, sample_rate: f32) -> u32 {
    let scale = (sample_rate / 44100.0).max(0.0);
    let longest_comb = COMB_TUNINGS.iter().max().copied().unwrap_or(0) as f32 * scale;
    let allpass_total = ALLPASS_TUNINGS.iter().sum::<usize>() as f32 * scale;

    let room_size = if room_size.is_nan() { 0.0 } else { room_size.clamp(0.0, 1.0) };
    let comb_passes = -3.0 / comb_feedback(room_size).log10();
    let allpass_passes = -3.0 / ALLPASS_FEEDBACK.log10();

    let tail = comb_passes * longest_comb + allpass_passes * allpass_total;
    tail.ceil().min(u32::MAX as f32) as u32
}
