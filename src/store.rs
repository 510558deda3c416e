//! # Parameter Store
//!
//! The one piece of state shared between the UI/host threads and the
//! audio thread: the current value of every parameter.
//!
//! Each parameter gets its own `AtomicU32` holding the `f32` bit pattern.
//! Reads and writes are single atomic operations, so neither side ever
//! waits on the other. There is no cross-parameter consistency: a
//! snapshot taken while the host is moving two knobs may see one new
//! value and one old one. At block rate that is inaudible.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::dsp::chain::ChainSettings;
use crate::params::ParamId;

/// Lock-free parameter values, one atomic slot per [`ParamId`].
#[derive(Debug)]
pub struct ParameterStore {
    slots: [AtomicU32; ParamId::COUNT],
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    /// A store holding every parameter's default.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|i| {
                AtomicU32::new(ParamId::ALL[i].spec().default.to_bits())
            }),
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        f32::from_bits(self.slots[id.index()].load(Ordering::Relaxed))
    }

    /// Store `value` clamped into the parameter's range. Non-finite values
    /// are dropped.
    pub fn set(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }

        let value = id.spec().clamp(value);
        self.slots[id.index()].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Value of the parameter with display name `name`.
    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        ParamId::from_name(name).map(|id| self.get(id))
    }

    /// Set the parameter with display name `name`. Returns `false` if no
    /// such parameter exists.
    pub fn set_by_name(&self, name: &str, value: f32) -> bool {
        match ParamId::from_name(name) {
            Some(id) => {
                self.set(id, value);
                true
            }
            None => false,
        }
    }

    pub fn reset_to_defaults(&self) {
        for id in ParamId::ALL {
            self.set(id, id.spec().default);
        }
    }

    /// Read every parameter once. Called at the top of each audio block.
    pub fn snapshot(&self) -> ChainSettings {
        ChainSettings {
            delay_time: self.get(ParamId::DelayTime),
            delay_feedback: self.get(ParamId::DelayFeedback),
            delay_wet: self.get(ParamId::DelayWet),
            reverb_size: self.get(ParamId::ReverbSize),
            reverb_damping: self.get(ParamId::ReverbDamping),
            reverb_wet: self.get(ParamId::ReverbWet),
        }
    }

    /// Every parameter's current value, in [`ParamId::ALL`] order.
    pub fn values(&self) -> [f32; ParamId::COUNT] {
        ParamId::ALL.map(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_starts_at_defaults() {
        let store = ParameterStore::new();
        assert_eq!(store.snapshot(), ChainSettings::default());
        for id in ParamId::ALL {
            assert_eq!(store.get(id), id.spec().default);
        }
    }

    #[test]
    fn test_set_clamps_into_range() {
        let store = ParameterStore::new();

        store.set(ParamId::DelayFeedback, 1.7);
        assert_eq!(store.get(ParamId::DelayFeedback), 1.0);

        store.set(ParamId::DelayWet, -0.3);
        assert_eq!(store.get(ParamId::DelayWet), 0.0);

        store.set(ParamId::DelayTime, 9.0);
        assert_eq!(store.get(ParamId::DelayTime), 2.0);

        store.set(ParamId::ReverbSize, 0.42);
        assert_eq!(store.get(ParamId::ReverbSize), 0.42);
    }

    #[test]
    fn test_non_finite_is_ignored() {
        let store = ParameterStore::new();
        store.set(ParamId::ReverbDamping, 0.3);

        store.set(ParamId::ReverbDamping, f32::NAN);
        store.set(ParamId::ReverbDamping, f32::INFINITY);

        assert_eq!(store.get(ParamId::ReverbDamping), 0.3);
    }

    #[test]
    fn test_by_name() {
        let store = ParameterStore::new();

        assert!(store.set_by_name("Delay Time", 1.25));
        assert_eq!(store.get_by_name("Delay Time"), Some(1.25));
        assert!(!store.set_by_name("Wobble", 1.0));
        assert_eq!(store.get_by_name("Wobble"), None);
    }

    #[test]
    fn test_snapshot_maps_every_field() {
        let store = ParameterStore::new();
        store.set(ParamId::DelayTime, 1.0);
        store.set(ParamId::DelayFeedback, 0.1);
        store.set(ParamId::DelayWet, 0.2);
        store.set(ParamId::ReverbSize, 0.3);
        store.set(ParamId::ReverbDamping, 0.4);
        store.set(ParamId::ReverbWet, 0.6);

        let s = store.snapshot();
        assert_eq!(s.delay_time, 1.0);
        assert_eq!(s.delay_feedback, 0.1);
        assert_eq!(s.delay_wet, 0.2);
        assert_eq!(s.reverb_size, 0.3);
        assert_eq!(s.reverb_damping, 0.4);
        assert_eq!(s.reverb_wet, 0.6);

        store.reset_to_defaults();
        assert_eq!(store.snapshot(), ChainSettings::default());
    }

    /// Two writers and a reader hammering the store never observe a value
    /// outside the parameter's range or a torn bit pattern.
    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(ParameterStore::new());

        let writers: Vec<_> = [0.25_f32, 0.75]
            .into_iter()
            .map(|v| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        store.set(ParamId::DelayFeedback, v);
                        store.set(ParamId::DelayTime, v * 2.0);
                    }
                })
            })
            .collect();

        for _ in 0..10_000 {
            let s = store.snapshot();
            assert!([0.5, 0.25, 0.75].contains(&s.delay_feedback));
            assert!([0.5, 1.5].contains(&s.delay_time));
        }

        for w in writers {
            w.join().unwrap();
        }
    }
}
