// 16 8-bit data registers named V0 to VF
// I -> address register (12 bits, held in 16)
//
// 16-entry stack of return addresses
//
// Delay timer & Sound timer: Count down at 60 times / s until 0
//
// Display res: 64 width, 32 height, one byte per pixel
//
// 35 opcodes, each are 2 bytes (big-endian)
//      NNN: address
//      NN: 8-bit constant
//      N: 4-bit constant
//      X and Y: 4-bit register identifier
//
// Separately:
// CPU: 540 times per second
// Timer: 60 times per second
// Display and sound belong to the host

pub mod config;
pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod host;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod scheduler;
pub mod timer;

pub use config::{Config, Quirks, ShiftSource};
pub use decode::OpCodes;
pub use emulator::{CpuState, Emulator, Step};
pub use error::{Error, Result};
pub use host::{Chip8Core, Core, Metadata, CHIP8_METADATA};
pub use keyboard::{Input, InputKind, InputManager, KeyState};
pub use scheduler::{run_until_cancelled, CancelToken, Scheduler, SharedState};
