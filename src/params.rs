//! # Plugin Parameters
//!
//! Six knobs: three for the reverb, three for the delay. Each one is
//! described once in [`ParamId::spec()`] and that table drives everything
//! else:
//!
//! - the host-facing `FloatParam`s in [`DubEchoParams`] (what the DAW
//!   automates and stores in its session),
//! - the [`ParameterStore`](crate::store::ParameterStore) slots the audio
//!   thread reads,
//! - the keys of saved state blobs.
//!
//! ## Host IDs
//!
//! The `#[id = "..."]` strings are what hosts save presets against. Once
//! published they must never change.
//!
//! ## Why a callback instead of reading the `FloatParam`s directly?
//!
//! Every change the host makes to a `FloatParam` (automation, a GUI
//! gesture, restoring a session) runs the parameter's value-changed
//! callback. We use that to mirror the new value into the store, so the
//! audio thread has one lock-free place to read from and the store can be
//! driven and tested without a host.

use std::sync::Arc;

use nih_plug::prelude::*;

use crate::store::ParameterStore;

/// Identifies one of the plugin's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    ReverbSize,
    ReverbDamping,
    ReverbWet,
    DelayTime,
    DelayFeedback,
    DelayWet,
}

/// How a parameter's value is shown to the user. Resolved when the
/// parameter table is built; nothing inspects parameter types at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDisplay {
    /// `0.42` is shown as `42%`.
    Percentage,
    /// Shown in seconds with two decimals.
    Seconds,
}

impl ValueDisplay {
    /// Unit suffix the host appends after the formatted value.
    pub const fn unit(self) -> &'static str {
        match self {
            ValueDisplay::Percentage => "%",
            ValueDisplay::Seconds => " s",
        }
    }
}

/// Static description of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Display name. Also the key in saved state blobs.
    pub name: &'static str,
    /// Host-facing ID. Must match the `#[id]` on [`DubEchoParams`].
    pub host_id: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    /// `1.0` is linear. Below 1 gives more resolution at the low end.
    pub skew: f32,
    pub display: ValueDisplay,
}

impl ParamSpec {
    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    fn range(&self) -> FloatRange {
        if self.skew == 1.0 {
            FloatRange::Linear {
                min: self.min,
                max: self.max,
            }
        } else {
            FloatRange::Skewed {
                min: self.min,
                max: self.max,
                factor: self.skew,
            }
        }
    }
}

const fn unit_spec(name: &'static str, host_id: &'static str, default: f32) -> ParamSpec {
    ParamSpec {
        name,
        host_id,
        default,
        min: 0.0,
        max: 1.0,
        step: 0.01,
        skew: 1.0,
        display: ValueDisplay::Percentage,
    }
}

const REVERB_SIZE: ParamSpec = unit_spec("Reverb Size", "rvsize", 0.5);
const REVERB_DAMPING: ParamSpec = unit_spec("Reverb Damping", "rvdamp", 0.5);
const REVERB_WET: ParamSpec = unit_spec("Reverb Dry/Wet", "rvwet", 0.5);
const DELAY_TIME: ParamSpec = ParamSpec {
    name: "Delay Time",
    host_id: "dltime",
    default: 0.5,
    min: 0.0,
    max: 2.0,
    step: 0.01,
    skew: 1.0,
    display: ValueDisplay::Seconds,
};
const DELAY_FEEDBACK: ParamSpec = unit_spec("Delay Feedback", "dlfdbk", 0.5);
// Defaults to 0 unlike the other mix controls; see DESIGN.md.
const DELAY_WET: ParamSpec = unit_spec("Delay Dry/Wet", "dlwet", 0.0);

impl ParamId {
    pub const COUNT: usize = 6;

    pub const ALL: [ParamId; Self::COUNT] = [
        ParamId::ReverbSize,
        ParamId::ReverbDamping,
        ParamId::ReverbWet,
        ParamId::DelayTime,
        ParamId::DelayFeedback,
        ParamId::DelayWet,
    ];

    pub const fn spec(self) -> &'static ParamSpec {
        match self {
            ParamId::ReverbSize => &REVERB_SIZE,
            ParamId::ReverbDamping => &REVERB_DAMPING,
            ParamId::ReverbWet => &REVERB_WET,
            ParamId::DelayTime => &DELAY_TIME,
            ParamId::DelayFeedback => &DELAY_FEEDBACK,
            ParamId::DelayWet => &DELAY_WET,
        }
    }

    pub const fn name(self) -> &'static str {
        self.spec().name
    }

    /// Position in [`ParamId::ALL`], used to index store slots.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look a parameter up by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    /// Render a value for display, without the unit.
    pub fn format_value(self, value: f32) -> String {
        match self.spec().display {
            ValueDisplay::Percentage => format!("{:.0}", value * 100.0),
            ValueDisplay::Seconds => format!("{value:.2}"),
        }
    }

    /// Parse what a user typed into a host's value field. Accepts the
    /// value with or without its unit.
    pub fn parse_value(self, text: &str) -> Option<f32> {
        let display = self.spec().display;
        let number = text.trim().trim_end_matches(display.unit().trim()).trim();
        let value: f32 = number.parse().ok()?;
        match display {
            ValueDisplay::Percentage => Some(value / 100.0),
            ValueDisplay::Seconds => Some(value),
        }
    }
}

/// Host-facing parameters.
///
/// The `#[derive(Params)]` macro registers these with the host, handles
/// their serialization in the host's session, and exposes them for
/// automation.
#[derive(Params)]
pub struct DubEchoParams {
    #[id = "rvsize"]
    pub reverb_size: FloatParam,

    #[id = "rvdamp"]
    pub reverb_damping: FloatParam,

    /// Reverb wet level. The reverb's dry level follows as `1 - wet`.
    #[id = "rvwet"]
    pub reverb_wet: FloatParam,

    /// Delay time in seconds, applied to both channels.
    #[id = "dltime"]
    pub delay_time: FloatParam,

    #[id = "dlfdbk"]
    pub delay_feedback: FloatParam,

    /// Level of the echoes added on top of the dry signal.
    #[id = "dlwet"]
    pub delay_wet: FloatParam,
}

impl DubEchoParams {
    /// Build the host parameters, each forwarding its changes into
    /// `store`.
    pub fn new(store: &Arc<ParameterStore>) -> Self {
        Self {
            reverb_size: float_param(ParamId::ReverbSize, store),
            reverb_damping: float_param(ParamId::ReverbDamping, store),
            reverb_wet: float_param(ParamId::ReverbWet, store),
            delay_time: float_param(ParamId::DelayTime, store),
            delay_feedback: float_param(ParamId::DelayFeedback, store),
            delay_wet: float_param(ParamId::DelayWet, store),
        }
    }
}

fn float_param(id: ParamId, store: &Arc<ParameterStore>) -> FloatParam {
    let spec = id.spec();

    FloatParam::new(spec.name, spec.default, spec.range())
        .with_step_size(spec.step)
        .with_unit(spec.display.unit())
        .with_value_to_string(Arc::new(move |value: f32| id.format_value(value)))
        .with_string_to_value(Arc::new(move |text: &str| id.parse_value(text)))
        .with_callback(store_callback(id, Arc::clone(store)))
}

/// The value-changed callback that mirrors `id` into the store.
fn store_callback(id: ParamId, store: Arc<ParameterStore>) -> Arc<dyn Fn(f32) + Send + Sync> {
    Arc::new(move |value: f32| store.set(id, value))
}
