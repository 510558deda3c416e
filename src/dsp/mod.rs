//! # DSP Building Blocks
//!
//! - **`delay_line`**: ring buffer of past samples, read by offset.
//! - **`filter`**: one-pole high-pass used to thin out the delay feedback.
//! - **`delay`**: multi-channel saturating feedback delay.
//! - **`reverb`**: Freeverb-style comb/all-pass reverberator.
//! - **`chain`**: reverb followed by delay, one per audio channel.

pub mod chain;
pub mod delay;
pub mod delay_line;
pub mod filter;
pub mod reverb;
