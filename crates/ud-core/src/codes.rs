//! Linux input event codes
//!
//! Values mirror `linux/input-event-codes.h` and `linux/input.h`. Only the
//! codes the engine refers to by name are listed here; the full key and axis
//! vocabulary lives in [`crate::names`].

// Event types
pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0;

// Relative axes
pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_Z: u16 = 0x02;
pub const REL_RX: u16 = 0x03;
pub const REL_RY: u16 = 0x04;
pub const REL_RZ: u16 = 0x05;
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_DIAL: u16 = 0x07;
pub const REL_WHEEL: u16 = 0x08;
pub const REL_MISC: u16 = 0x09;
pub const REL_WHEEL_HI_RES: u16 = 0x0b;
pub const REL_HWHEEL_HI_RES: u16 = 0x0c;

// Absolute axes
pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;
pub const ABS_Z: u16 = 0x02;
pub const ABS_RX: u16 = 0x03;
pub const ABS_RY: u16 = 0x04;
pub const ABS_RZ: u16 = 0x05;

// Keys and buttons
pub const KEY_MAX: u16 = 0x2ff;
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_TOOL_PEN: u16 = 0x140;
pub const BTN_TOOL_QUADTAP: u16 = 0x14f;

// Device properties
pub const INPUT_PROP_POINTER: u16 = 0x00;
pub const INPUT_PROP_DIRECT: u16 = 0x01;

pub const BUS_VIRTUAL: u16 = 0x06;

/// Upper bound of every absolute axis; percentages are scaled onto `[0, ABS_MAX_VALUE]`.
pub const ABS_MAX_VALUE: i32 = 1_000_000;

/// Key value for a press.
pub const KEY_PRESS: i32 = 1;
/// Key value for a release.
pub const KEY_RELEASE: i32 = 0;

/// Human-readable name of an event type, used in logs.
pub fn event_type_name(ev_type: u16) -> &'static str {
    match ev_type {
        EV_SYN => "SYN",
        EV_KEY => "KEY",
        EV_REL => "REL",
        EV_ABS => "ABS",
        _ => "?",
    }
}
