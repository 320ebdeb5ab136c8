use crate::{
    config::{Quirks, ShiftSource},
    decode::OpCodes,
    display::{FrameBuffer, Pixels},
    error::{Error, Result},
    keyboard::{KeyState, Keyboard},
    memory::{Memory, TypeAddr, FONT_GLYPH_BYTES, FONT_START},
    registers::Registers,
    timer::Timers,
};
use log::{debug, error, trace};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    Running,
    // pc still points at the FX0A
    AwaitingKey { register: u8 },
    // terminal
    Faulted { opcode: u16, address: TypeAddr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Executed(OpCodes),
    AwaitingKey,
}

pub struct Emulator {
    fb: FrameBuffer,
    regs: Registers,
    mem: Memory,
    timers: Timers,
    keys: Keyboard,
    state: CpuState,
    quirks: Quirks,
    rng: Box<dyn RngCore + Send>,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator {
    pub fn new() -> Self {
        Self {
            fb: FrameBuffer::new(),
            regs: Registers::new(),
            mem: Memory::new(),
            timers: Timers::default(),
            keys: Keyboard::new(),
            state: CpuState::Running,
            quirks: Quirks::default(),
            rng: Box::new(StdRng::from_entropy()),
        }
    }

    pub fn with_program(program: &[u8]) -> Result<Self> {
        let mut emu = Self::new();
        emu.load_program(program)?;
        Ok(emu)
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn set_quirks(&mut self, quirks: Quirks) {
        self.quirks = quirks;
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    // On failure the VM is left reset: font in place, everything else zeroed.
    pub fn load_program(&mut self, program: &[u8]) -> Result<()> {
        self.reset();
        self.mem.load_program(program)
    }

    pub fn reset(&mut self) {
        self.fb = FrameBuffer::new();
        self.regs = Registers::new();
        self.mem = Memory::new();
        self.timers = Timers::default();
        self.keys.reset();
        self.state = CpuState::Running;
    }

    pub fn fetch_decode(&self) -> OpCodes {
        OpCodes::decode_raw(self.mem.fetch())
    }

    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            CpuState::Faulted { opcode, address } => {
                Err(Error::UnimplementedOpcode { opcode, address })
            }
            CpuState::AwaitingKey { register } => Ok(self.resume_key_wait(register)),
            CpuState::Running => {
                let operation = self.fetch_decode();
                self.execute_ins(operation)
            }
        }
    }

    pub fn execute_ins(&mut self, ins: OpCodes) -> Result<Step> {
        debug!("Processing instruction [{:03X}: {:?}]", self.mem.pc.0, ins);
        match ins {
            OpCodes::ClearScreen => {
                self.fb.clear_buffer();
            }
            OpCodes::PopSubroutine => {
                let addr = self.mem.stack.pop();
                self.mem.set_pc(addr);
                trace!("return to {:03X}", addr);
            }
            OpCodes::Jump(addr) => {
                self.mem.set_pc(addr);
                return Ok(Step::Executed(ins));
            }
            OpCodes::PushSubroutine(addr) => {
                // the call's own address is saved; the return adds 2
                self.mem.stack.push(self.mem.pc.0);
                self.mem.set_pc(addr);
                return Ok(Step::Executed(ins));
            }
            OpCodes::SkipEqualConstant(vx, nn) => self.skip_if(self.regs.get(vx) == nn),
            OpCodes::SkipNotEqualConstant(vx, nn) => self.skip_if(self.regs.get(vx) != nn),
            OpCodes::SkipEqualRegister(vx, vy) => {
                self.skip_if(self.regs.get(vx) == self.regs.get(vy))
            }
            OpCodes::SkipNotEqualRegister(vx, vy) => {
                self.skip_if(self.regs.get(vx) != self.regs.get(vy))
            }
            OpCodes::SetRegister(vx, nn) => {
                self.regs.set_register(vx, nn);
            }
            OpCodes::AddToRegister(vx, nn) => {
                self.regs.add_to_register(vx, nn);
            }
            OpCodes::CopyRegister(vx, vy) => {
                self.regs.set_register(vx, self.regs.get(vy));
            }
            OpCodes::Or(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) | self.regs.get(vy));
            }
            OpCodes::And(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) & self.regs.get(vy));
            }
            OpCodes::XOr(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) ^ self.regs.get(vy));
            }
            // Flag is written before the result, so with X = F the result wins.
            OpCodes::Add(vx, vy) => {
                let (sum, carry) = self.regs.get(vx).overflowing_add(self.regs.get(vy));
                self.regs.set_flag(carry);
                self.regs.set_register(vx, sum);
            }
            OpCodes::SubtractForward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_flag(y <= x); // 0 on borrow
                self.regs.set_register(vx, x.wrapping_sub(y));
            }
            OpCodes::SubtractBackward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_flag(x <= y); // 0 on borrow
                self.regs.set_register(vx, y.wrapping_sub(x));
            }
            OpCodes::RightShift(vx, vy) => {
                let value = self.shift_operand(vx, vy);
                self.regs.set_flag(value & 1 == 1);
                self.regs.set_register(vx, value >> 1);
            }
            OpCodes::LeftShift(vx, vy) => {
                let value = self.shift_operand(vx, vy);
                self.regs.set_flag((value >> 7) & 1 == 1);
                self.regs.set_register(vx, value << 1);
            }
            OpCodes::SetIndexRegister(addr) => self.mem.set_index(addr),
            OpCodes::JumpWithOffset(addr) => {
                self.mem.set_pc(addr + self.regs.get(0) as u16);
                return Ok(Step::Executed(ins));
            }
            OpCodes::Random(vx, nn) => {
                let ransuu: u8 = self.rng.gen();
                self.regs.set_register(vx, nn & ransuu);
            }
            OpCodes::Display(reg_x, reg_y, height) => {
                let (x, y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                let sprite = self.mem.read_from_index(height as usize);
                trace!("Painting sprite at ({x}, {y}): {sprite:?}");
                let vf = self.fb.paint(x, y, &sprite);
                self.regs.set_flag(vf);
            }
            OpCodes::SkipIfPressed(vx) => {
                self.skip_if(self.keys.get_key_status_from_num(self.regs.get(vx)))
            }
            OpCodes::SkipIfNotPressed(vx) => {
                self.skip_if(!self.keys.get_key_status_from_num(self.regs.get(vx)))
            }
            OpCodes::CopyDelayToRegister(vx) => {
                self.regs.set_register(vx, self.timers.delay.count)
            }
            OpCodes::GetKey(vx) => {
                if self.keys.first_pressed().is_none() {
                    debug!("Waiting for key into V{vx:X}");
                    self.state = CpuState::AwaitingKey { register: vx };
                    return Ok(Step::AwaitingKey);
                }
                return Ok(self.resume_key_wait(vx));
            }
            OpCodes::CopyRegisterToDelay(vx) => self.timers.delay.set(self.regs.get(vx)),
            OpCodes::CopyRegisterToSound(vx) => self.timers.sound.set(self.regs.get(vx)),
            OpCodes::AddToIndex(vx) => {
                let value = self.regs.get(vx) as u16;
                self.regs
                    .set_flag((self.mem.index.0 as u32 + value as u32) > 0xFFF);
                self.mem.index.add(value);
            }
            OpCodes::PointChar(vx) => {
                let char = self.regs.get(vx) as u16;
                self.mem
                    .set_index(FONT_START as u16 + char * FONT_GLYPH_BYTES);
            }
            OpCodes::ToDecimal(vx) => {
                let value = self.regs.get(vx);
                let digits = [value / 100, (value / 10) % 10, value % 10];
                for (i, digit) in digits.into_iter().enumerate() {
                    self.mem.set(self.mem.index.offset(i as u16), digit);
                }
            }
            OpCodes::StoreRegisterToMemory(vx) => {
                for reg in 0..=vx {
                    self.mem
                        .set(self.mem.index.offset(reg as u16), self.regs.get(reg));
                }
                self.mem.index.add(vx as u16 + 1);
            }
            OpCodes::LoadRegisterFromMemory(vx) => {
                for reg in 0..=vx {
                    let reg_val = self.mem.get(self.mem.index.offset(reg as u16));
                    self.regs.set_register(reg, reg_val);
                }
                self.mem.index.add(vx as u16 + 1);
            }
            OpCodes::Unimplemented(opcode) => {
                let address = self.mem.pc.0;
                error!("Unimplemented opcode {opcode:#06X} at {address:#05X}");
                self.state = CpuState::Faulted { opcode, address };
                return Err(Error::UnimplementedOpcode { opcode, address });
            }
        }
        self.mem.pc.increment();
        trace!("Registers: {:?} [I: {:03X}]", self.regs, self.mem.index.0);
        Ok(Step::Executed(ins))
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.mem.pc.increment();
        }
    }

    fn shift_operand(&self, vx: u8, vy: u8) -> u8 {
        match self.quirks.shift_source {
            ShiftSource::Vx => self.regs.get(vx),
            ShiftSource::Vy => self.regs.get(vy),
        }
    }

    fn resume_key_wait(&mut self, register: u8) -> Step {
        match self.keys.first_pressed() {
            Some(key) => {
                debug!("Key {key:X} pressed, stored in V{register:X}");
                self.regs.set_register(register, key);
                self.mem.pc.increment();
                self.state = CpuState::Running;
                Step::Executed(OpCodes::GetKey(register))
            }
            None => Step::AwaitingKey,
        }
    }

    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay.count
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound.count
    }

    pub fn is_sound_active(&self) -> bool {
        self.timers.sound.is_active()
    }

    pub fn set_keys(&mut self, keys: KeyState) {
        self.keys.latch(keys);
    }

    pub fn keys_mut(&mut self) -> &mut Keyboard {
        &mut self.keys
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.fb
    }

    pub fn take_frame(&mut self) -> Option<&Pixels> {
        if self.fb.take_dirty() {
            Some(self.fb.pixels())
        } else {
            None
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn pc(&self) -> TypeAddr {
        self.mem.pc.0
    }

    pub fn index(&self) -> TypeAddr {
        self.mem.index.0
    }

    pub fn state(&self) -> CpuState {
        self.state
    }
}
