use comms::{PixelWidth, Rect, WorkReply};
use log::{debug, warn};
use workforce::{Client, Owner};

/// What the engine carries for each chunk on the canvas' behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub rect: Rect,
    /// The view configuration the chunk was computed for.
    pub tag: u32,
}

/// The frame buffer chunks are assembled into.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u16,
    height: u16,
    pixel_width: PixelWidth,
    tag: u32,
    pixels: Vec<u16>,
    remaining: usize,
    progress: bool,
}

impl Canvas {
    /// Creates a new blank canvas.
    ///
    /// # Arguments
    /// * `width` - Image width in pixels.
    /// * `height` - Image height in pixels.
    /// * `pixel_width` - How counts are stored in replies.
    /// * `tag` - The configuration chunks must carry to be drawn.
    /// * `chunks` - The amount of chunks expected.
    pub fn new(width: u16, height: u16, pixel_width: PixelWidth, tag: u32, chunks: usize) -> Self {
        Self {
            width,
            height,
            pixel_width,
            tag,
            pixels: vec![0; width as usize * height as usize],
            remaining: chunks,
            progress: false,
        }
    }

    /// Prints a dot on stderr for every chunk drawn.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Row-major iteration counts.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn draw(&mut self, rect: &Rect, reply: &WorkReply<'_>) -> bool {
        if reply.len(self.pixel_width) < rect.area() {
            return false;
        }

        let stride = self.width as usize;
        let mut i = 0;
        for y in rect.y as usize..(rect.y + rect.height) as usize {
            for x in rect.x as usize..(rect.x + rect.width) as usize {
                // Length checked above.
                self.pixels[y * stride + x] = reply.count(self.pixel_width, i).unwrap_or_default();
                i += 1;
            }
        }

        true
    }
}

impl Client<Tile> for Canvas {
    fn chunk_done(&mut self, _owner: Owner, tile: &Tile, reply: &WorkReply<'_>) {
        if tile.tag != self.tag {
            debug!("discarding chunk computed for configuration {}", tile.tag);
            return;
        }

        if !self.draw(&tile.rect, reply) {
            warn!(
                "short reply for chunk at ({}, {}): {} bytes",
                tile.rect.x,
                tile.rect.y,
                reply.counts.len()
            );
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.progress {
            eprint!(".");
        }
    }

    fn finished(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use comms::RequestId;

    use super::*;

    fn reply(counts: &[u8]) -> WorkReply<'_> {
        WorkReply {
            id: RequestId {
                requester: 0,
                epoch: 0,
                chunk: 0,
                worker: 0,
            },
            iterations: 0,
            counts,
        }
    }

    fn tile(x: u16, y: u16, tag: u32) -> Tile {
        Tile {
            rect: Rect {
                x,
                y,
                width: 2,
                height: 2,
            },
            tag,
        }
    }

    #[test]
    fn draws_chunks_in_place() {
        let mut canvas = Canvas::new(4, 2, PixelWidth::One, 1, 2);

        canvas.chunk_done(Owner(0), &tile(2, 0, 1), &reply(&[1, 2, 3, 4]));
        assert!(!canvas.finished());
        canvas.chunk_done(Owner(0), &tile(0, 0, 1), &reply(&[5, 6, 7, 8]));

        assert!(canvas.finished());
        assert_eq!(canvas.pixels(), [5, 6, 1, 2, 7, 8, 3, 4]);
    }

    #[test]
    fn reads_two_byte_counts() {
        let mut canvas = Canvas::new(2, 2, PixelWidth::Two, 1, 1);

        canvas.chunk_done(
            Owner(0),
            &tile(0, 0, 1),
            &reply(&[0x01, 0x00, 0, 2, 0, 3, 0x10, 0x01]),
        );

        assert_eq!(canvas.pixels(), [256, 2, 3, 0x1001]);
    }

    #[test]
    fn ignores_other_configurations() {
        let mut canvas = Canvas::new(2, 2, PixelWidth::One, 1, 1);

        canvas.chunk_done(Owner(0), &tile(0, 0, 2), &reply(&[9, 9, 9, 9]));

        assert!(!canvas.finished());
        assert_eq!(canvas.pixels(), [0, 0, 0, 0]);
    }
}
