//! Replay script emitter.
//!
//! Lines belonging to one transaction unit are held in a pending buffer so
//! the session can drop the unit as a whole. Comments bypass the buffer.

use crate::protocol::constants::{PROGRAMMER_PRODUCT_ID, PROGRAMMER_VENDOR_ID};

const INDENT: &str = "    ";
/// Leading whitespace of continuation lines inside long literals.
const LITERAL_PREFIX: &str = "        ";
const LITERAL_LINE_BYTES: usize = 16;

/// Quote `data` as a string literal of `\xNN` escapes.
///
/// Payloads longer than 16 bytes are split over several lines, relying on
/// implicit concatenation of adjacent literals inside the call parentheses.
pub fn format_literal(data: &[u8]) -> String {
    if data.len() <= LITERAL_LINE_BYTES {
        return quote(data);
    }
    let mut out = String::with_capacity(data.len() * 4 + data.len() / 2);
    for chunk in data.chunks(LITERAL_LINE_BYTES) {
        out.push('\n');
        out.push_str(LITERAL_PREFIX);
        out.push_str(&quote(chunk));
    }
    out.push('\n');
    out.push_str(LITERAL_PREFIX);
    out
}

fn quote(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 2);
    out.push('"');
    for b in data {
        out.push_str(&format!("\\x{:02X}", b));
    }
    out.push('"');
    out
}

/// Buffered, indentation-aware writer of the generated script.
#[derive(Debug, Default)]
pub struct ScriptEmitter {
    depth: usize,
    pending: Vec<String>,
    committed: Vec<String>,
}

impl ScriptEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn indented(&self, line: &str) -> String {
        if line.is_empty() {
            return String::new();
        }
        format!("{}{}", INDENT.repeat(self.depth), line)
    }

    /// Buffer a line of the current unit.
    pub fn emit(&mut self, line: impl AsRef<str>) {
        let line = self.indented(line.as_ref());
        self.pending.push(line);
    }

    /// Write `# <text>` straight to the output.
    pub fn emit_comment(&mut self, text: &str) {
        let line = self.indented(&format!("# {}", text));
        self.committed.push(line);
    }

    /// Commit the pending unit.
    pub fn flush(&mut self) {
        self.committed.append(&mut self.pending);
    }

    /// Drop the pending unit; returns how many lines were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Imports and the `replay(dev)` header. Leaves the emitter indented
    /// inside the function body.
    pub fn prologue(&mut self) {
        for line in [
            "# Generated by bpreplay",
            "from bpmicro.cmd import bulk2, bulk86",
            "from bpmicro import cmd",
            "from bpmicro.usb import usb_wraps",
            "from bpmicro.usb import validate_read",
            "from bpmicro import fw",
            "import usb1",
            "",
            "def replay(dev):",
        ] {
            self.emit(line);
        }
        self.indent();
        self.emit("bulkRead, bulkWrite, controlRead, controlWrite = usb_wraps(dev)");
        self.emit("");
        self.flush();
    }

    /// Device discovery and `__main__` wiring.
    pub fn epilogue(&mut self) {
        let vid_pid = format!(
            "        if (vid, pid) == (0x{:04x}, 0x{:04x}):",
            PROGRAMMER_VENDOR_ID, PROGRAMMER_PRODUCT_ID
        );
        let lines = [
            "",
            "def open_dev(usbcontext=None):",
            "    if usbcontext is None:",
            "        usbcontext = usb1.USBContext()",
            "",
            "    print('Scanning for devices...')",
            "    for udev in usbcontext.getDeviceList(skip_on_error=True):",
            "        vid = udev.getVendorID()",
            "        pid = udev.getProductID()",
            vid_pid.as_str(),
            "            print('')",
            "            print('Found device')",
            "            print('Bus %03i Device %03i: ID %04x:%04x' % (",
            "                udev.getBusNumber(),",
            "                udev.getDeviceAddress(),",
            "                vid,",
            "                pid))",
            "            return udev.open()",
            "    raise Exception(\"Failed to find a device\")",
            "",
            "if __name__ == \"__main__\":",
            "    import argparse",
            "",
            "    parser = argparse.ArgumentParser(description='Replay captured USB packets')",
            "    args = parser.parse_args()",
            "",
            "    usbcontext = usb1.USBContext()",
            "    dev = open_dev(usbcontext)",
            "    dev.claimInterface(0)",
            "    dev.resetDevice()",
            "    replay(dev)",
        ];
        for line in lines {
            self.emit(line);
        }
        self.flush();
    }

    /// Commit anything pending and return the script text.
    pub fn finish(mut self) -> String {
        self.flush();
        let mut out = self.committed.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_short_literal() {
        assert_eq!(format_literal(&[]), "\"\"");
        assert_eq!(format_literal(&[0x0C, 0x07]), "\"\\x0C\\x07\"");
        assert_eq!(format_literal(&[0xAB; 16]).len(), 2 + 16 * 4);
    }

    #[test]
    fn test_format_long_literal() {
        let data: Vec<u8> = (0u8..18).collect();
        let text = format_literal(&data);
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("        \"\\x00\\x01"));
        assert_eq!(lines[2], "        \"\\x10\\x11\"");
        assert_eq!(lines[3], "        ");
    }

    #[test]
    fn test_discard_only_drops_pending() {
        let mut e = ScriptEmitter::new();
        e.emit("kept()");
        e.flush();
        e.emit("# bulk2 aggregate");
        e.emit("cmd.sn_read(dev)");
        assert_eq!(e.discard(), 2);
        assert_eq!(e.finish(), "kept()\n");
    }

    #[test]
    fn test_comment_commits_before_pending() {
        let mut e = ScriptEmitter::new();
        e.indent();
        e.emit("cmd.cmd_01(dev)");
        e.emit_comment("note");
        e.flush();
        assert_eq!(e.finish(), "    # note\n    cmd.cmd_01(dev)\n");
    }

    #[test]
    fn test_prologue_indents_body() {
        let mut e = ScriptEmitter::new();
        e.prologue();
        assert_eq!(e.depth(), 1);
        e.emit("cmd.readB0(dev)");
        e.dedent();
        e.epilogue();
        let script = e.finish();
        assert!(script.contains("def replay(dev):\n    bulkRead, bulkWrite"));
        assert!(script.contains("\n    cmd.readB0(dev)\n"));
        assert!(script.contains("(vid, pid) == (0x14b9, 0x0001)"));
        assert!(script.ends_with("    replay(dev)\n"));
    }

    #[test]
    fn test_dedent_saturates() {
        let mut e = ScriptEmitter::new();
        e.dedent();
        assert_eq!(e.depth(), 0);
    }
}
