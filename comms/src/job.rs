//! The job parameter block carried by every work request.

use bytes::{Buf, BufMut};

use crate::{Deserialize, Serialize, deserialize::ensure, error::Result};

/// Encoded size of a [`Job`], also the ceiling on any parameter block.
pub const JOB_SIZE: usize = 64;

/// Requests interior detection from the worker.
pub const FLAG_INTERIOR: u16 = 0x0100;

/// Reserved for boundary guessing, carried but not acted upon.
pub const FLAG_GUESS: u16 = 0x0200;

/// Which parameter of the iteration varies across the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `c` varies per pixel, `z0` is fixed.
    #[default]
    Mandelbrot,
    /// `z0` varies per pixel, `c` is fixed.
    Julia,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

/// A pixel rectangle of the image, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Everything a worker needs to evaluate one chunk.
///
/// Pixel `(x, y)` of the rectangle maps to `corner + delta * (rect.x + x, rect.y + y)`
/// in Mandelbrot mode and to `z0 + delta * (...)` in Julia mode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Job {
    pub mode: Mode,
    pub flags: u16,
    pub corner: Complex,
    pub z0: Complex,
    pub delta: Complex,
    pub iteration_limit: u32,
    pub rect: Rect,
}

impl Job {
    /// Encodes the job into a fixed size parameter block.
    pub fn to_bytes(&self) -> [u8; JOB_SIZE] {
        let mut out = [0; JOB_SIZE];
        self.serialize(&mut &mut out[..]);
        out
    }

    /// Decodes a parameter block, ignoring trailing bytes.
    pub fn from_bytes(mut buf: &[u8]) -> Result<Self> {
        Self::deserialize(&mut buf)
    }
}

fn put_complex<B: BufMut>(buf: &mut B, z: Complex) {
    buf.put_f64(z.re);
    buf.put_f64(z.im);
}

fn get_complex(buf: &mut &[u8]) -> Complex {
    Complex {
        re: buf.get_f64(),
        im: buf.get_f64(),
    }
}

impl Serialize for Job {
    fn serialize<B: BufMut>(&self, buf: &mut B) {
        let mode = match self.mode {
            Mode::Mandelbrot => 0,
            Mode::Julia => 1,
        };

        buf.put_u16(mode);
        buf.put_u16(self.flags);
        put_complex(buf, self.corner);
        put_complex(buf, self.z0);
        put_complex(buf, self.delta);
        buf.put_u32(self.iteration_limit);
        buf.put_u16(self.rect.x);
        buf.put_u16(self.rect.y);
        buf.put_u16(self.rect.width);
        buf.put_u16(self.rect.height);
    }
}

impl<'a> Deserialize<'a> for Job {
    fn deserialize(buf: &mut &'a [u8]) -> Result<Self> {
        ensure(buf, JOB_SIZE)?;

        // Any nonzero mode selects the Julia set.
        let mode = match buf.get_u16() {
            0 => Mode::Mandelbrot,
            _ => Mode::Julia,
        };
        let flags = buf.get_u16();
        let corner = get_complex(buf);
        let z0 = get_complex(buf);
        let delta = get_complex(buf);
        let iteration_limit = buf.get_u32();
        let rect = Rect {
            x: buf.get_u16(),
            y: buf.get_u16(),
            width: buf.get_u16(),
            height: buf.get_u16(),
        };

        Ok(Self {
            mode,
            flags,
            corner,
            z0,
            delta,
            iteration_limit,
            rect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProtocolErr;

    #[test]
    fn job_layout() {
        let job = Job {
            mode: Mode::Julia,
            flags: FLAG_INTERIOR,
            corner: Complex::new(1.0, -2.0),
            z0: Complex::new(0.5, 0.25),
            delta: Complex::new(0.125, -0.125),
            iteration_limit: 1000,
            rect: Rect {
                x: 16,
                y: 32,
                width: 8,
                height: 4,
            },
        };

        let bytes = job.to_bytes();

        assert_eq!(&bytes[0..4], &[0, 1, 0x01, 0x00]);
        assert_eq!(&bytes[4..12], &1.0f64.to_be_bytes());
        assert_eq!(&bytes[12..20], &(-2.0f64).to_be_bytes());
        assert_eq!(&bytes[44..52], &(-0.125f64).to_be_bytes());
        assert_eq!(&bytes[52..56], &1000u32.to_be_bytes());
        assert_eq!(&bytes[56..64], &[0, 16, 0, 32, 0, 8, 0, 4]);
        assert_eq!(Job::from_bytes(&bytes).unwrap(), job);
    }

    #[test]
    fn nonzero_mode_is_julia() {
        let mut bytes = Job::default().to_bytes();
        bytes[1] = 7;

        assert_eq!(Job::from_bytes(&bytes).unwrap().mode, Mode::Julia);
    }

    #[test]
    fn short_block_is_truncated() {
        let bytes = Job::default().to_bytes();

        assert_eq!(
            Job::from_bytes(&bytes[..40]),
            Err(ProtocolErr::Truncated {
                needed: JOB_SIZE,
                got: 40
            })
        );
    }
}
