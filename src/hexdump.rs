//! `addr: hex bytes  ascii` formatting, spec.md §10.1 (out of core scope as
//! a CLI tool; kept as a pure library helper). Grounded on
//! `original_source/src/assembler/assembler.py::dump` and
//! `original_source/src/emulator/devices/memory.py::dump`.

const BYTES_PER_ROW: usize = 16;

/// Render `bytes` as a multi-line hexdump, each row's address label
/// starting at `base` and advancing by `BYTES_PER_ROW`.
pub fn format(bytes: &[u8], base: u16) -> String {
    let mut out = String::new();
    for (row_index, chunk) in bytes.chunks(BYTES_PER_ROW).enumerate() {
        let addr = base.wrapping_add((row_index * BYTES_PER_ROW) as u16);
        out.push_str(&format!("{addr:04x}: "));
        for (i, byte) in chunk.iter().enumerate() {
            out.push_str(&format!("{byte:02x} "));
            if i == 7 {
                out.push(' ');
            }
        }
        for pad in chunk.len()..BYTES_PER_ROW {
            out.push_str("   ");
            if pad == 7 {
                out.push(' ');
            }
        }
        out.push(' ');
        for byte in chunk {
            let ch = if (0x20..0x7F).contains(byte) { *byte as char } else { '.' };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_single_short_row() {
        let dump = format(&[0x00, 0x04, 0x0C, 0x81, 0x11], 0);
        assert!(dump.starts_with("0000: 00 04 0c 81 11"));
        assert!(dump.trim_end().ends_with('.'));
    }

    #[test]
    fn prints_ascii_for_printable_bytes() {
        let dump = format(b"hi!", 0x1000);
        assert!(dump.contains("1000:"));
        assert!(dump.ends_with("hi!\n"));
    }

    #[test]
    fn address_advances_by_row_width() {
        let bytes: Vec<u8> = (0..20).collect();
        let dump = format(&bytes, 0);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("0010:"));
    }

    #[test]
    fn non_printable_bytes_become_dots() {
        let dump = format(&[0x00, 0x1F, 0x7F], 0);
        assert!(dump.trim_end().ends_with("..."));
    }
}
