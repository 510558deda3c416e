//! # Dub Echo: An AU/VST3/CLAP Reverb + Delay Plugin
//!
//! A reverb feeding a saturating tape-style delay, built with
//! [nih-plug](https://github.com/robbert-vdh/nih-plug). Outputs Audio Unit
//! (AUv2), VST3, and CLAP formats from a single codebase.
//!
//! ## Signal Flow (per channel)
//!
//! ```text
//! Input ──► [Reverb] ──┬───────────────────────────────────────(+)──► Output
//!                      │                                        ▲
//!                      │                                  × wet │
//!                      │                                        │
//!                      └──►(+)──► tanh ──► [Delay Line] ──► [High-pass]
//!                           ▲                                   │
//!                           └────────── × feedback ◄────────────┘
//! ```
//!
//! ## Threads
//!
//! The host owns the [`params::DubEchoParams`]. Every change to one of them
//! is mirrored into a [`store::ParameterStore`], which is the only thing
//! the audio thread reads parameters from. All per-block work lives in
//! [`processor::Processor`]; the [`Plugin`] impl below only forwards host
//! calls to it.

pub mod dsp;
pub mod meter;
pub mod params;
pub mod processor;
pub mod state;
pub mod store;

use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;
use params::DubEchoParams;
use processor::Processor;
use store::ParameterStore;

/// The plugin as the host sees it.
pub struct DubEcho {
    params: Arc<DubEchoParams>,
    processor: Processor,
}

impl Default for DubEcho {
    fn default() -> Self {
        let store = Arc::new(ParameterStore::new());
        Self {
            params: Arc::new(DubEchoParams::new(&store)),
            processor: Processor::new(store),
        }
    }
}

impl DubEcho {
    /// The processor, for reading meters from outside the audio thread.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }
}

impl Plugin for DubEcho {
    const NAME: &'static str = "Dub Echo";
    const VENDOR: &'static str = "Dub Echo Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first: most DAW tracks are stereo.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Called when the plugin is loaded or the stream format changes. All
    /// allocation happens here.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_output_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);

        self.processor.prepare(
            buffer_config.sample_rate,
            buffer_config.max_buffer_size as usize,
            num_channels,
        );

        true
    }

    /// Playback stopped or the plugin was bypassed: drop every tail so
    /// old echoes don't come back on the next play.
    fn reset(&mut self) {
        self.processor.reset();
    }

    fn deactivate(&mut self) {
        self.processor.release_resources();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let tail = self.processor.process_block(buffer.as_slice());

        // Keep the host calling us while echoes are still ringing out.
        ProcessStatus::Tail(tail)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for DubEcho {
    const CLAP_ID: &'static str = "com.dub-echo-audio.dub-echo-v1";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Reverb into a saturating feedback delay");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Reverb,
    ];
}

impl Vst3Plugin for DubEcho {
    // `*b"..."` turns the 16-character ASCII literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"DubEchoFxPlugv01";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Reverb,
    ];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// nih_export_clap! exports `clap_entry` for CLAP hosts and
// nih_export_vst3! exports `GetPluginFactory` for VST3 hosts.
// clap_wrapper wraps the CLAP entry point as an AUv2 component for Logic.

nih_export_clap!(DubEcho);
nih_export_vst3!(DubEcho);
clap_wrapper::export_auv2!();
