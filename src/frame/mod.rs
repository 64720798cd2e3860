//! # Gauge Frame Module
//!
//! Encoding of weather readings into the fixed-width gauge frames.
//!
//! This module handles:
//! - The hardware contract constants (baselines, clamp ranges, status byte)
//! - Descriptor-driven frame encoding with per-field range validation
//! - Error flagging for clamped, zeroed, or missing fields
//! - Change detection across consecutive frames

pub mod encoder;
pub mod protocol;
