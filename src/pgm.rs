//! Portable graymap output.

use std::io::{self, Write};

/// Pixels per line in ASCII graymaps, keeping lines under 70 characters.
const PIXELS_PER_LINE: usize = 8;

/// Writes `pixels` as a graymap.
///
/// Binary (`P5`) output stores one byte per pixel, so it is only produced when
/// `maxval` fits a byte and `ascii` is not set; otherwise `P2` is written.
///
/// # Arguments
/// * `out` - The destination.
/// * `width` - Image width, `pixels` holds `width * height` row-major values.
/// * `height` - Image height.
/// * `maxval` - The largest value a pixel can take.
/// * `pixels` - The gray levels.
/// * `ascii` - Forces the ASCII format.
pub fn write<W: Write>(
    out: &mut W,
    width: u16,
    height: u16,
    maxval: u16,
    pixels: &[u16],
    ascii: bool,
) -> io::Result<()> {
    let maxval = maxval.max(1);
    let ascii = ascii || maxval > u8::MAX as u16;

    writeln!(out, "P{}", if ascii { 2 } else { 5 })?;
    writeln!(out, "{width} {height}")?;
    writeln!(out, "{maxval}")?;

    if !ascii {
        let bytes: Vec<u8> = pixels.iter().map(|&p| p.min(maxval) as u8).collect();
        out.write_all(&bytes)?;
        return out.flush();
    }

    for row in pixels.chunks(width.max(1) as usize) {
        for line in row.chunks(PIXELS_PER_LINE) {
            let line: Vec<_> = line.iter().map(u16::to_string).collect();
            writeln!(out, "{}", line.join(" "))?;
        }
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_graymap() {
        let mut out = Vec::new();
        write(&mut out, 3, 1, 249, &[0, 100, 249], false).unwrap();

        assert_eq!(out, b"P5\n3 1\n249\n\x00\x64\xf9");
    }

    #[test]
    fn ascii_graymap_wraps_long_rows() {
        let pixels: Vec<u16> = (0..10).collect();
        let mut out = Vec::new();
        write(&mut out, 10, 1, 249, &pixels, true).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "P2\n10 1\n249\n0 1 2 3 4 5 6 7\n8 9\n"
        );
    }

    #[test]
    fn large_maxval_forces_ascii() {
        let mut out = Vec::new();
        write(&mut out, 2, 1, 999, &[998, 3], false).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "P2\n2 1\n999\n998 3\n");
    }
}
