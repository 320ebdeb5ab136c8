use log::{info, warn};

use crate::error::{Error, Result};
use crate::registers::{IndexRegister, ProgramCounter};

pub type TypeAddr = u16; // in reality u12
type FontBytes = [u8; 5 * 16];

pub const MEMORY_SIZE: usize = 4096;
pub const PROGRAM_START: TypeAddr = 0x200;
pub const MAX_PROGRAM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;
pub const FONT_START: usize = 0x000;
pub const FONT_GLYPH_BYTES: u16 = 5;
pub const STACK_DEPTH: usize = 16;

const ADDR_MASK: TypeAddr = 0x0FFF;

const DEFAULT_FONT: FontBytes = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

// 000 -> 04F font, 200 -> FFF program
// every access is masked to 12 bits
pub struct Memory {
    bytes: [u8; MEMORY_SIZE],
    pub pc: ProgramCounter,
    pub index: IndexRegister,
    pub stack: Stack,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        let mut bytes = [0; MEMORY_SIZE];
        bytes[FONT_START..FONT_START + DEFAULT_FONT.len()].copy_from_slice(&DEFAULT_FONT);
        Self {
            bytes,
            pc: ProgramCounter(PROGRAM_START),
            index: IndexRegister(0x0),
            stack: Stack::new(),
        }
    }

    pub fn set(&mut self, addr: TypeAddr, val: u8) {
        self.bytes[(addr & ADDR_MASK) as usize] = val;
    }

    pub fn get(&self, addr: TypeAddr) -> u8 {
        self.bytes[(addr & ADDR_MASK) as usize]
    }

    // big-endian, pc is not advanced
    pub fn fetch(&self) -> u16 {
        let (l, r) = (self.get(self.pc.0), self.get(self.pc.0.wrapping_add(1)));
        u16::from_be_bytes([l, r])
    }

    pub fn set_pc(&mut self, addr: TypeAddr) {
        self.pc.set_addr(addr);
    }

    pub fn set_index(&mut self, addr: TypeAddr) {
        self.index.set_addr(addr);
    }

    pub fn read_from_index(&self, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| self.get(self.index.offset(offset as u16)))
            .collect()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    // loads program instructions starting at address 0x200
    pub fn load_program(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::NoProgram);
        }
        if bytes.len() > MAX_PROGRAM_SIZE {
            return Err(Error::too_large(bytes.len()));
        }

        let start_index = PROGRAM_START as usize;
        self.bytes[start_index..start_index + bytes.len()].copy_from_slice(bytes);
        self.pc.set_addr(PROGRAM_START);
        info!("Loaded program [size: {}]", bytes.len());
        Ok(())
    }
}

// pointer wraps in both directions
pub struct Stack {
    addresses: [TypeAddr; STACK_DEPTH],
    sp: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self {
            addresses: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn push(&mut self, addr: TypeAddr) {
        if self.sp == STACK_DEPTH - 1 {
            warn!("Stack full, next push wraps to slot 0");
        }
        self.addresses[self.sp] = addr;
        self.sp = (self.sp + 1) % STACK_DEPTH;
    }

    pub fn pop(&mut self) -> TypeAddr {
        if self.sp == 0 {
            warn!("Stack underflow, wrapping to slot {}", STACK_DEPTH - 1);
        }
        self.sp = (self.sp + STACK_DEPTH - 1) % STACK_DEPTH;
        self.addresses[self.sp]
    }

    pub fn pointer(&self) -> usize {
        self.sp
    }
}
