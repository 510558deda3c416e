//! # Effect Chain
//!
//! The per-channel signal path: reverb first, then the feedback delay,
//! both in place on the same block.
//!
//! ```text
//! channel ──► [Reverb] ──► [Delay] ──► channel
//! ```
//!
//! A stereo track gets two of these. They share parameter values but no
//! state, so each side keeps its own reverb tail and echo history.

use super::delay::Delay;
use super::reverb::{Reverb, ReverbParams};

/// One block's worth of parameter values.
///
/// Built fresh from the parameter store at the top of every block and
/// passed by value into the chains. Ranges: `delay_time` in `[0, 2]`
/// seconds, everything else in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub delay_wet: f32,
    pub reverb_size: f32,
    pub reverb_damping: f32,
    pub reverb_wet: f32,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            delay_time: 0.5,
            delay_feedback: 0.5,
            delay_wet: 0.0,
            reverb_size: 0.5,
            reverb_damping: 0.5,
            reverb_wet: 0.5,
        }
    }
}

impl ChainSettings {
    /// Reverb parameters for these settings. The dry level always mirrors
    /// the wet level.
    pub fn reverb_params(&self) -> ReverbParams {
        ReverbParams {
            room_size: self.reverb_size,
            damping: self.reverb_damping,
            wet_level: self.reverb_wet,
            dry_level: 1.0 - self.reverb_wet,
        }
    }
}

/// Reverb followed by delay, for one audio channel.
#[derive(Debug, Default)]
pub struct EffectChain {
    reverb: Reverb,
    delay: Delay<f32>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size both stages for the stream format. The chain is mono, so the
    /// delay is prepared with a single active channel.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.reverb.prepare(sample_rate);
        self.delay.prepare(sample_rate, max_block_size, 1);
    }

    pub fn reset(&mut self) {
        self.reverb.reset();
        self.delay.reset();
    }

    /// Push a settings snapshot into both stages.
    ///
    /// Every delay channel gets the same delay time even though only the
    /// first is processed here; the delay keeps per-channel times so a
    /// stereo-linked instance could use them.
    pub fn update_from_settings(&mut self, settings: ChainSettings) {
        for channel in 0..self.delay.num_channels() {
            self.delay.set_delay_time(channel, settings.delay_time);
        }
        self.delay.set_feedback(settings.delay_feedback);
        self.delay.set_wet_level(settings.delay_wet);

        self.reverb.set_parameters(settings.reverb_params());
    }

    /// Run one channel's block through reverb then delay, in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        self.reverb.process(samples);
        self.delay.process_channel(0, samples);
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn delay(&self) -> &Delay<f32> {
        &self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ChainSettings {
        ChainSettings {
            delay_time: 0.25,
            delay_feedback: 0.3,
            delay_wet: 0.6,
            reverb_size: 0.7,
            reverb_damping: 0.2,
            reverb_wet: 0.35,
        }
    }

    #[test]
    fn test_update_reaches_both_stages() {
        let mut chain = EffectChain::new();
        chain.prepare(48000.0, 512);
        chain.update_from_settings(settings());

        let delay = chain.delay();
        assert_eq!(delay.delay_time(0), Some(0.25));
        assert_eq!(delay.delay_time(1), Some(0.25));
        assert_eq!(delay.delay_time_samples(0), Some(12000));
        assert!((delay.feedback() - 0.3).abs() < 1e-6);
        assert!((delay.wet_level() - 0.6).abs() < 1e-6);

        let reverb = chain.reverb().parameters();
        assert!((reverb.room_size - 0.7).abs() < 1e-6);
        assert!((reverb.damping - 0.2).abs() < 1e-6);
        assert!((reverb.wet_level - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_reverb_dry_is_one_minus_wet() {
        for wet in [0.0, 0.1, 0.5, 0.9, 1.0] {
            let params = ChainSettings {
                reverb_wet: wet,
                ..ChainSettings::default()
            }
            .reverb_params();
            assert!((params.dry_level - (1.0 - wet)).abs() < 1e-6);
        }
    }

    /// With both wet levels at zero only the reverb's dry gain is left.
    #[test]
    fn test_dry_path_gain() {
        let mut chain = EffectChain::new();
        chain.prepare(44100.0, 256);
        chain.update_from_settings(ChainSettings {
            delay_wet: 0.0,
            reverb_wet: 0.0,
            ..settings()
        });
        chain.reset();

        let mut block: Vec<f32> = (0..256).map(|i| ((i as f32) * 0.05).sin() * 0.1).collect();
        let input = block.clone();
        chain.process(&mut block);

        // Reverb dry gain is 2 * dry_level; the delay adds nothing.
        for (out, inp) in block.iter().zip(&input) {
            assert!((out - 2.0 * inp).abs() < 1e-6);
        }
    }

    /// The reverb runs before the delay: an impulse's first echo carries
    /// the reverb's dry-scaled copy.
    #[test]
    fn test_stage_order() {
        let mut chain = EffectChain::new();
        chain.prepare(44100.0, 256);
        chain.update_from_settings(ChainSettings {
            delay_time: 100.0 / 44100.0,
            delay_feedback: 0.0,
            delay_wet: 1.0,
            reverb_wet: 0.5,
            ..settings()
        });
        chain.reset();

        let mut block = vec![0.0_f32; 256];
        block[0] = 0.2;
        chain.process(&mut block);

        // Reverb dry gain at wet 0.5 is 2 * 0.5 = 1.0, so sample 0 is the
        // impulse itself. The echo at 101 is tanh of that, high-passed.
        assert!((block[0] - 0.2).abs() < 1e-6);
        assert!(block[101].abs() > 0.1);
    }

    #[test]
    fn test_reset_silences_chain() {
        let mut chain = EffectChain::new();
        chain.prepare(44100.0, 256);
        chain.update_from_settings(ChainSettings {
            delay_wet: 1.0,
            reverb_wet: 1.0,
            ..settings()
        });

        let mut block = vec![0.5_f32; 2048];
        chain.process(&mut block);
        chain.reset();

        let mut silence = vec![0.0_f32; 2048];
        chain.process(&mut silence);
        assert!(silence.iter().all(|s| *s == 0.0));
    }
}
