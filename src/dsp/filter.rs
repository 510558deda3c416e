//! # One-Pole High-Pass Filter
//!
//! A first-order IIR high-pass that sits on the delay's read-out tap.
//! Every trip around the feedback loop passes through it once, so low
//! frequencies are stripped from each repeat in turn and the echoes get
//! thinner instead of building up mud.
//!
//! ## The Filter Equation
//!
//! ```text
//! y[n] = b0 * x[n] + b1 * x[n-1] - a1 * y[n-1]
//! ```
//!
//! The coefficients come from the bilinear transform of the analog
//! prototype `H(s) = s / (s + wc)`, with the cutoff pre-warped:
//!
//! ```text
//! k  = tan(pi * cutoff / sample_rate)
//! b0 =  1 / (1 + k)
//! b1 = -1 / (1 + k)
//! a1 = (k - 1) / (k + 1)
//! ```
//!
//! At DC the numerator `b0 + b1` is zero, so a constant input decays to
//! silence. At Nyquist the gain is exactly 1.

use num_traits::{Float, FloatConst};

/// A first-order (6 dB/octave) high-pass filter.
#[derive(Debug, Clone)]
pub struct OnePoleHighPass<T> {
    b0: T,
    b1: T,
    a1: T,

    /// Previous input sample.
    prev_input: T,

    /// Previous output sample.
    prev_output: T,
}

impl<T: Float + FloatConst> OnePoleHighPass<T> {
    /// Create a new filter initialized to passthrough (no filtering).
    ///
    /// With `b0 = 1` and the other coefficients zero the equation reduces
    /// to `y[n] = x[n]`. Call [`set_cutoff()`](Self::set_cutoff) before
    /// use.
    pub fn new() -> Self {
        Self {
            b0: T::one(),
            b1: T::zero(),
            a1: T::zero(),
            prev_input: T::zero(),
            prev_output: T::zero(),
        }
    }

    /// Recompute the coefficients for `cutoff_hz` at `sample_rate`.
    ///
    /// The cutoff is clamped below Nyquist; at Nyquist `tan()` blows up.
    pub fn set_cutoff(&mut self, cutoff_hz: T, sample_rate: T) {
        let nyquist_guard = sample_rate * T::from(0.49).unwrap_or_else(T::zero);
        let safe_cutoff = cutoff_hz.max(T::zero()).min(nyquist_guard);

        let k = (T::PI() * safe_cutoff / sample_rate).tan();
        let norm = T::one() / (T::one() + k);

        self.b0 = norm;
        self.b1 = -norm;
        self.a1 = (k - T::one()) * norm;
    }

    /// Process one sample through the filter.
    pub fn process(&mut self, input: T) -> T {
        let output = self.b0 * input + self.b1 * self.prev_input - self.a1 * self.prev_output;
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    /// Zero the filter's memory. Coefficients are kept.
    pub fn reset(&mut self) {
        self.prev_input = T::zero();
        self.prev_output = T::zero();
    }

    /// Gain applied to the first sample of an impulse, `b0`.
    pub fn impulse_gain(&self) -> T {
        self.b0
    }
}

impl<T: Float + FloatConst> Default for OnePoleHighPass<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
