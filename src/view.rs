//! Maps an image onto the complex plane and splits it into chunks.

use comms::{Complex, Job, Mode, PixelWidth, Rect, job::FLAG_INTERIOR, msg};

/// What part of which set to render, and at what size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub width: u16,
    pub height: u16,
    /// Point at the center of the image.
    pub center: Complex,
    /// Width of the image on the real axis; the height follows the aspect ratio.
    pub range: f64,
    /// The fixed `c` of a Julia set, `None` for the Mandelbrot set.
    pub julia: Option<Complex>,
    pub iterations: u32,
    pub interior: bool,
}

impl Default for View {
    fn default() -> Self {
        Self {
            width: 64,
            height: 24,
            center: Complex::new(-0.5, 0.0),
            range: 4.0,
            julia: None,
            iterations: 250,
            interior: false,
        }
    }
}

impl View {
    /// Returns the job covering the whole image.
    ///
    /// Pixel rows grow downwards, so the imaginary step is negative.
    pub fn job(&self) -> Job {
        let width = self.width as f64;
        let height = self.height as f64;
        let yrange = self.range * height / width;

        let top_left = Complex::new(
            self.center.re - self.range / 2.0,
            self.center.im + yrange / 2.0,
        );
        let delta = Complex::new(self.range / width, -yrange / height);

        let (mode, corner, z0) = match self.julia {
            None => (Mode::Mandelbrot, top_left, Complex::default()),
            Some(c) => (Mode::Julia, c, top_left),
        };

        Job {
            mode,
            flags: if self.interior { FLAG_INTERIOR } else { 0 },
            corner,
            z0,
            delta,
            iteration_limit: self.iterations,
            rect: Rect {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            },
        }
    }

    pub fn pixel_width(&self) -> PixelWidth {
        PixelWidth::for_limit(self.iterations)
    }

    /// Size in bytes of the reply to a chunk of the given size.
    pub fn reply_size(&self, chunk_width: u16, chunk_height: u16) -> usize {
        msg::reply_size(chunk_width, chunk_height, self.pixel_width())
    }

    /// Splits the image into row-major chunks, clipped at the right and bottom edges.
    ///
    /// # Arguments
    /// * `chunk_width` - Width of a full chunk, at least 1.
    /// * `chunk_height` - Height of a full chunk, at least 1.
    pub fn tiles(&self, chunk_width: u16, chunk_height: u16) -> Vec<Rect> {
        let (cw, ch) = (chunk_width.max(1), chunk_height.max(1));
        let mut tiles = Vec::new();

        for y in (0..self.height).step_by(ch as usize) {
            for x in (0..self.width).step_by(cw as usize) {
                tiles.push(Rect {
                    x,
                    y,
                    width: cw.min(self.width - x),
                    height: ch.min(self.height - y),
                });
            }
        }

        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_spans_the_set() {
        let job = View::default().job();

        assert_eq!(job.mode, Mode::Mandelbrot);
        assert_eq!(job.corner, Complex::new(-2.5, 0.75));
        assert_eq!(job.delta, Complex::new(4.0 / 64.0, -1.5 / 24.0));
        assert_eq!(job.z0, Complex::default());
        assert_eq!(job.iteration_limit, 250);
    }

    #[test]
    fn julia_moves_the_corner_to_z0() {
        let view = View {
            julia: Some(Complex::new(-0.8, 0.156)),
            center: Complex::new(0.0, 0.0),
            width: 100,
            height: 50,
            range: 3.0,
            ..Default::default()
        };
        let job = view.job();

        assert_eq!(job.mode, Mode::Julia);
        assert_eq!(job.corner, Complex::new(-0.8, 0.156));
        assert_eq!(job.z0, Complex::new(-1.5, 0.75));
    }

    #[test]
    fn tiles_cover_every_pixel_once() {
        let view = View {
            width: 70,
            height: 45,
            ..Default::default()
        };
        let tiles = view.tiles(32, 16);

        assert_eq!(tiles.len(), 3 * 3);
        assert_eq!(
            tiles[2],
            Rect {
                x: 64,
                y: 0,
                width: 6,
                height: 16
            }
        );
        assert_eq!(tiles[8].height, 13);

        let mut covered = vec![0u8; 70 * 45];
        for rect in &tiles {
            for y in rect.y..rect.y + rect.height {
                for x in rect.x..rect.x + rect.width {
                    covered[y as usize * 70 + x as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&n| n == 1));
    }

    #[test]
    fn reply_size_follows_the_limit() {
        let view = View {
            iterations: 1000,
            ..Default::default()
        };

        assert_eq!(view.reply_size(32, 32), 20 + 2048);
        assert_eq!(View::default().reply_size(32, 32), 20 + 1024);
    }
}
