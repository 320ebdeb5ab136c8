use crate::memory::TypeAddr;

pub const FLAG_REGISTER: u8 = 0xF;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    registers: [u8; 16],
}

impl Registers {
    pub fn new() -> Self {
        Self { registers: [0; 16] }
    }

    pub fn set_register(&mut self, reg_num: u8, value: u8) {
        self.registers[(reg_num & 0xF) as usize] = value;
    }

    // no flag change, carry is simply dropped
    pub fn add_to_register(&mut self, reg_num: u8, value: u8) {
        let current = self.get(reg_num);
        self.set_register(reg_num, current.wrapping_add(value));
    }

    pub fn set_flag(&mut self, value: bool) {
        self.set_register(FLAG_REGISTER, value as u8);
    }

    pub fn get(&self, reg_num: u8) -> u8 {
        self.registers[(reg_num & 0xF) as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.registers
    }
}

// Special registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter(pub TypeAddr);

impl ProgramCounter {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(2);
    }

    pub fn skip(&mut self) {
        self.0 = self.0.wrapping_add(4);
    }

    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr;
    }
}

// I keeps all 16 bits, only memory accesses mask it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRegister(pub TypeAddr);

impl IndexRegister {
    pub fn set_addr(&mut self, addr: TypeAddr) {
        self.0 = addr;
    }

    pub fn add(&mut self, value: u16) {
        self.0 = self.0.wrapping_add(value);
    }

    pub fn offset(&self, by: u16) -> TypeAddr {
        self.0.wrapping_add(by)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_wraps_without_flag() {
        let mut regs = Registers::new();
        regs.set_register(0x3, 0xFF);
        regs.add_to_register(0x3, 0x02);
        assert_eq!(regs.get(0x3), 0x01);
        assert_eq!(regs.get(FLAG_REGISTER), 0);
    }

    #[test]
    fn test_pc_steps() {
        let mut pc = ProgramCounter(0x200);
        pc.increment();
        assert_eq!(pc.0, 0x202);
        pc.skip();
        assert_eq!(pc.0, 0x206);
    }

    #[test]
    fn test_index_wraps_at_16_bits() {
        let mut i = IndexRegister(0xFFFF);
        i.add(2);
        assert_eq!(i.0, 0x0001);
    }
}
