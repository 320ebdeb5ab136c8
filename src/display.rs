use log::warn;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub const PIXELS: usize = WIDTH * HEIGHT;

// one byte per pixel, row-major
pub type Pixels = [u8; PIXELS];

pub struct FrameBuffer {
    bit_buffer: Pixels,
    dirty: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            bit_buffer: [0; PIXELS],
            dirty: false,
        }
    }

    pub fn clear_buffer(&mut self) {
        self.bit_buffer = [0; PIXELS];
        self.dirty = true;
    }

    /// XORs an 8-pixel-wide sprite onto the buffer and reports a collision.
    ///
    /// The target cell is `(x + col) + (y + row) * WIDTH` with no clipping, so
    /// a sprite that runs off the right edge continues on the next row. Indices
    /// past the end of the buffer wrap back to the top.
    pub fn paint(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let mut vf = false;
        for (i, row) in sprite.iter().enumerate() {
            for j in 0..8 {
                let bit = (row >> (7 - j)) & 1;
                if bit == 0 {
                    continue;
                }
                let (nx, ny) = (x as usize + j, y as usize + i);
                let raw = nx + ny * WIDTH;
                if raw >= PIXELS {
                    warn!("Sprite pixel ({nx}, {ny}) outside framebuffer, wrapping");
                }
                let index = raw % PIXELS;
                if self.bit_buffer[index] == 1 {
                    vf = true;
                }
                self.bit_buffer[index] ^= 1;
            }
        }
        self.dirty = true;
        vf
    }

    pub fn pixels(&self) -> &Pixels {
        &self.bit_buffer
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.bit_buffer[(x + y * WIDTH) % PIXELS]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}
