//! The escape-time iteration.

use comms::{Complex, Job, Mode};

/// Iterates `z <- z^2 + c` from `z` until `|z|^2 >= 4` or `limit - 1` steps were taken.
///
/// # Returns
/// The number of steps taken, always below `limit` (0 when `limit` is 0).
#[inline]
pub fn escape(z: Complex, c: Complex, limit: u32) -> u32 {
    let (mut x_re, mut x_im) = (z.re, z.im);
    let mut count = 0;

    while count + 1 < limit {
        let re2 = x_re * x_re;
        let im2 = x_im * x_im;
        if re2 + im2 >= 4.0 {
            break;
        }

        x_im = 2.0 * x_re * x_im + c.im;
        x_re = re2 - im2 + c.re;
        count += 1;
    }

    count
}

/// Evaluates every pixel of the job's rectangle in row-major order.
///
/// Each pixel's coordinate is computed directly from its absolute position, so
/// a chunk yields exactly the values the whole image would at those pixels.
///
/// # Returns
/// The per-pixel counts and their sum.
pub fn render(job: &Job) -> (Vec<u16>, u64) {
    let rect = job.rect;
    let mut counts = Vec::with_capacity(rect.area());
    let mut total = 0u64;

    for row in 0..rect.height {
        let y = (rect.y as u32 + row as u32) as f64;

        for col in 0..rect.width {
            let x = (rect.x as u32 + col as u32) as f64;

            let count = match job.mode {
                Mode::Mandelbrot => {
                    let c = Complex::new(
                        job.corner.re + job.delta.re * x,
                        job.corner.im + job.delta.im * y,
                    );
                    escape(job.z0, c, job.iteration_limit)
                }
                Mode::Julia => {
                    let z = Complex::new(
                        job.z0.re + job.delta.re * x,
                        job.z0.im + job.delta.im * y,
                    );
                    escape(z, job.corner, job.iteration_limit)
                }
            };

            total += count as u64;
            counts.push(count as u16);
        }
    }

    (counts, total)
}
