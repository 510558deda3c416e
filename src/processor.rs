//! # Block Processor
//!
//! Everything the plugin does per audio block, without the host in the
//! way: snapshot the parameters, hand them to every channel's chain, run
//! the chains in place, update the meters.
//!
//! The nih-plug wrapper in `lib.rs` only translates host calls into calls
//! on this type, which keeps the whole signal path testable from plain
//! slices.

use std::sync::Arc;

use nih_plug::{nih_debug_assert, nih_log};

use crate::dsp::chain::{ChainSettings, EffectChain};
use crate::dsp::reverb;
use crate::meter::{MeterReadout, RmsMeter, MAX_METER_CHANNELS};
use crate::store::ParameterStore;

/// Most channels the processor runs chains for (stereo).
pub const MAX_CHANNELS: usize = 2;

/// Owns one [`EffectChain`] per channel plus the level meter.
pub struct Processor {
    store: Arc<ParameterStore>,
    chains: Vec<EffectChain>,
    meter: RmsMeter,
    sample_rate: f32,
}

impl Processor {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            chains: Vec::new(),
            meter: RmsMeter::new(),
            sample_rate: 44100.0,
        }
    }

    /// Build and size the per-channel chains. Allocates; never call from
    /// the audio thread while processing.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize, num_channels: usize) {
        nih_debug_assert!(num_channels <= MAX_CHANNELS, "more channels than chains");
        let num_channels = num_channels.clamp(1, MAX_CHANNELS);

        self.sample_rate = sample_rate;
        self.chains.resize_with(num_channels, EffectChain::new);

        let settings = self.store.snapshot();
        for chain in &mut self.chains {
            chain.update_from_settings(settings);
            chain.prepare(sample_rate, max_block_size);
            chain.reset();
        }
        self.meter.prepare(sample_rate);

        nih_log!(
            "Prepared {num_channels} channel(s) at {sample_rate} Hz, max block {max_block_size}"
        );
    }

    /// Clear all tails and meters. Sizes and parameters are kept.
    pub fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
        self.meter.reset();
    }

    /// Nothing is freed: the chains are reused on the next `prepare()`.
    pub fn release_resources(&mut self) {
        nih_log!("Released; keeping {} chain(s) for reuse", self.chains.len());
    }

    /// Process one block in place. Returns the effect tail in samples.
    ///
    /// `block` holds one slice per channel; channels without a chain are
    /// left untouched.
    pub fn process_block(&mut self, block: &mut [&mut [f32]]) -> u32 {
        let settings = self.store.snapshot();

        for (channel, (chain, samples)) in self.chains.iter_mut().zip(block.iter_mut()).enumerate()
        {
            chain.update_from_settings(settings);
            chain.process(samples);

            if channel < MAX_METER_CHANNELS {
                self.meter.update(channel, samples);
            }
        }

        tail_samples(&settings, self.sample_rate)
    }

    /// Smoothed RMS level of `channel` in dB, as last published.
    pub fn rms_db(&self, channel: usize) -> f32 {
        self.meter.readout().rms_db(channel)
    }

    /// Shared handle for UI-side meter readers.
    pub fn meter_readout(&self) -> Arc<MeterReadout> {
        self.meter.readout()
    }

    pub fn num_channels(&self) -> usize {
        self.chains.len()
    }

    pub fn chain(&self, channel: usize) -> Option<&EffectChain> {
        self.chains.get(channel)
    }
}

/// How long the output keeps sounding after the input stops.
///
/// The reverb tail runs into the delay and gets repeated there, so the two
/// add up. A fully dry reverb contributes nothing.
pub fn tail_samples(settings: &ChainSettings, sample_rate: f32) -> u32 {
    let delay_tail = delay_tail_samples(settings.delay_time, settings.delay_feedback, sample_rate);
    let reverb_tail = if settings.reverb_wet > 0.0 {
        reverb::tail_samples(settings.reverb_size, sample_rate)
    } else {
        0
    };

    delay_tail.saturating_add(reverb_tail)
}

/// How long the echoes keep sounding after the input stops.
///
/// Each repeat is scaled by `feedback`, so after N repeats the level is
/// `feedback^N`. Solving `feedback^N = 0.001` (-60 dB) gives
/// `N = -3 / log10(feedback)`; multiply by the delay length. The
/// saturator only ever makes repeats quieter, so this is an upper bound.
pub fn delay_tail_samples(delay_time: f32, feedback: f32, sample_rate: f32) -> u32 {
    let delay_samples = (delay_time * sample_rate).max(0.0);

    let tail = if feedback > 0.001 && feedback < 1.0 {
        let repeats = -3.0 / feedback.log10();
        repeats * delay_samples
    } else if feedback >= 1.0 {
        // The high-pass bleeds energy every pass, but there is no closed
        // form; cap at ten repeats.
        10.0 * delay_samples
    } else {
        // With no feedback, just one delay period for the single echo.
        delay_samples
    };

    tail.min(u32::MAX as f32) as u32
}
