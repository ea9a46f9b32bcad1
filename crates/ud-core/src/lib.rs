//! Core types for the udotool workspace
//!
//! This crate holds the pieces every other crate agrees on: Linux input
//! event codes, the name tables used to resolve keys and axes, numeric
//! parsing with C-style radix prefixes, and sleeping on the monotonic clock.
//!
//! # Key Types
//!
//! - [`Axis`] - A resolved relative or absolute axis
//! - [`AxisMask`] - Which axis families a lookup may match
//! - [`HiresAxis`] - Pairing of a wheel axis with its high-resolution partner

pub mod codes;
pub mod names;
pub mod number;
pub mod time;

pub use names::{
    find_axis, find_key, hires_partner, Axis, AxisKind, AxisMask, HiresAxis, ABS_AXES, HIRES_AXES,
    KEYS, MAIN_ABS_AXES, MAIN_REL_AXES, MAIN_WHEEL_AXES, REL_AXES,
};
pub use number::{
    is_valid_delay, parse_c_integer, parse_c_signed, parse_float, parse_seconds, MAX_SLEEP_SEC, MIN_SLEEP_SEC,
};
pub use time::{secs_to_duration, sleep_monotonic};
