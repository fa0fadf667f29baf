//! Fixed values of the programmer's USB protocol.

use crate::trace::ControlSetup;

/// Vendor/product ID of the programmer, used by the generated `open_dev`.
pub const PROGRAMMER_VENDOR_ID: u16 = 0x14B9;
pub const PROGRAMMER_PRODUCT_ID: u16 = 0x0001;

/// Bulk OUT endpoint carrying commands.
pub const COMMAND_ENDPOINT: u8 = 0x02;

/// Bulk IN endpoint carrying framed replies.
pub const REPLY_ENDPOINT: u8 = 0x86;

/// First byte of every reply frame.
pub const FRAME_PREFIX: u8 = 0x08;

/// Prefix byte plus the trailing u16 length.
pub const FRAME_OVERHEAD: usize = 3;

/// Control read that polls device status; always answered by one bulk read.
pub const STATUS_PROBE: ControlSetup = ControlSetup::new(0xC0, 0xB0, 0x0000, 0x0000, 0);

/// Last command of the programmer's startup sequence.
pub const STARTUP_END_CMD: &[u8] = &[
    0x1D, 0x10, 0x01, 0x09, 0x00, 0x00, 0x00, 0x15, 0x60, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1C, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x48,
    0x00, 0x12, 0xAA,
];

/// Known LED mask values.
pub const LED_NAMES: &[(u8, &str)] = &[
    (0x00, "off"),
    (0x01, "pass"),
    (0x02, "active"),
    (0x04, "fail"),
    (0x07, "all"),
];

/// Symbolic name of an LED mask, if known.
pub fn led_name(mask: u8) -> Option<&'static str> {
    LED_NAMES
        .iter()
        .find(|(value, _)| *value == mask)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_name() {
        assert_eq!(led_name(0x07), Some("all"));
        assert_eq!(led_name(0x04), Some("fail"));
        assert_eq!(led_name(0x30), None);
    }
}
