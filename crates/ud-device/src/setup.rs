//! Device capability description

use ud_config::{DeviceConfig, DeviceId};
use ud_core::codes::*;
use ud_core::{ABS_AXES, HIRES_AXES, REL_AXES};

/// Range shared by every absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsRange {
    pub minimum: i32,
    pub maximum: i32,
}

/// Everything declared to the kernel before the device is created
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSetup {
    pub name: String,
    pub bus: u16,
    pub id: DeviceId,
    pub event_types: Vec<u16>,
    pub properties: Vec<u16>,
    pub keys: Vec<u16>,
    pub rel_axes: Vec<u16>,
    pub abs_axes: Vec<u16>,
    pub abs_range: AbsRange,
}

impl DeviceSetup {
    /// Build the capability set for a configuration.
    ///
    /// This is the only place quirks are consulted: with the `libinput`
    /// quirk, digitizer tool buttons are left out.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let keys = (0..KEY_MAX)
            .filter(|&key| {
                !(config.quirks.libinput && (BTN_TOOL_PEN..=BTN_TOOL_QUADTAP).contains(&key))
            })
            .collect();

        let rel_axes = REL_AXES
            .iter()
            .map(|&(_, code)| code)
            .chain(HIRES_AXES.iter().map(|h| h.hi))
            .collect();

        let abs_axes = ABS_AXES.iter().map(|&(_, code)| code).collect();

        Self {
            name: config.name.clone(),
            bus: BUS_VIRTUAL,
            id: config.id,
            event_types: vec![EV_KEY, EV_REL, EV_ABS],
            properties: vec![INPUT_PROP_POINTER, INPUT_PROP_DIRECT],
            keys,
            rel_axes,
            abs_axes,
            abs_range: AbsRange {
                minimum: 0,
                maximum: ABS_MAX_VALUE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_libinput_quirk_hides_tool_buttons() {
        let setup = DeviceSetup::from_config(&DeviceConfig::default());
        assert!(!setup.keys.contains(&BTN_TOOL_PEN));
        assert!(!setup.keys.contains(&BTN_TOOL_QUADTAP));
        assert!(setup.keys.contains(&(BTN_TOOL_PEN - 1)));
        assert!(setup.keys.contains(&(BTN_TOOL_QUADTAP + 1)));
        assert_eq!(setup.keys.len(), KEY_MAX as usize - 16);
    }

    #[test]
    fn test_without_quirk_all_keys_declared() {
        let mut config = DeviceConfig::default();
        config.quirks.libinput = false;
        let setup = DeviceSetup::from_config(&config);
        assert_eq!(setup.keys.len(), KEY_MAX as usize);
        assert!(setup.keys.contains(&BTN_TOOL_PEN));
    }

    #[test]
    fn test_hires_axes_declared() {
        let setup = DeviceSetup::from_config(&DeviceConfig::default());
        assert!(setup.rel_axes.contains(&REL_WHEEL));
        assert!(setup.rel_axes.contains(&REL_WHEEL_HI_RES));
        assert!(setup.rel_axes.contains(&REL_HWHEEL_HI_RES));
        assert_eq!(setup.abs_range, AbsRange { minimum: 0, maximum: 1_000_000 });
    }
}
