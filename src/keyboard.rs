// index is the key value 0x0..=0xF
pub type KeyState = [bool; 16];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keyboard {
    keys: KeyState,
}

impl Keyboard {
    pub fn new() -> Self {
        Self { keys: [false; 16] }
    }

    pub fn reset(&mut self) {
        self.keys = [false; 16];
    }

    pub fn latch(&mut self, keys: KeyState) {
        self.keys = keys;
    }

    pub fn set_key(&mut self, n: u8, pressed: bool) {
        self.keys[(n & 0xF) as usize] = pressed;
    }

    pub fn get_key_status_from_num(&self, n: u8) -> bool {
        self.keys[(n & 0xF) as usize]
    }

    pub fn first_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|&k| k).map(|n| n as u8)
    }

    pub fn state(&self) -> KeyState {
        self.keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Button,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub name: String,
    // 1..=16 -> 0x0..=0xF
    pub number: u8,
    pub active: bool,
    pub player: u8,
    pub kind: InputKind,
}

const KEY_NAMES: [&str; 16] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "A", "B", "C", "D", "E", "F",
];

#[derive(Debug, Clone)]
pub struct InputManager {
    inputs: Vec<Input>,
    keys: Keyboard,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            inputs: Self::default_inputs(),
            keys: Keyboard::new(),
        }
    }

    pub fn default_inputs() -> Vec<Input> {
        KEY_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| Input {
                name: format!("Button {name}"),
                number: i as u8 + 1,
                active: false,
                player: 1,
                kind: InputKind::Button,
            })
            .collect()
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn update(&mut self, inputs: Vec<Input>) {
        self.inputs = inputs;
    }

    pub fn max_players(&self) -> u8 {
        1
    }

    /// Applies the current inputs to the latch. Numbers outside 1..=16 are ignored,
    /// and keys not mentioned keep their previous state.
    pub fn check_keys(&mut self) -> KeyState {
        for input in &self.inputs {
            if let 1..=16 = input.number {
                self.keys.set_key(input.number - 1, input.active);
            }
        }
        self.keys.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pressed_scans_low_to_high() {
        let mut kb = Keyboard::new();
        assert_eq!(kb.first_pressed(), None);
        kb.set_key(0xC, true);
        kb.set_key(0x5, true);
        assert_eq!(kb.first_pressed(), Some(0x5));
        kb.reset();
        assert_eq!(kb.first_pressed(), None);
    }

    #[test]
    fn test_key_lookup_masks_high_bits() {
        let mut kb = Keyboard::new();
        kb.set_key(0x3, true);
        assert!(kb.get_key_status_from_num(0x13));
    }

    #[test]
    fn test_default_inputs_layout() {
        let inputs = InputManager::default_inputs();
        assert_eq!(inputs.len(), 16);
        assert_eq!(inputs[0].name, "Button 0");
        assert_eq!(inputs[0].number, 1);
        assert_eq!(inputs[15].name, "Button F");
        assert_eq!(inputs[15].number, 16);
        assert!(inputs.iter().all(|i| i.player == 1 && !i.active));
    }

    #[test]
    fn test_check_keys_maps_numbers_to_hex_keys() {
        let mut manager = InputManager::new();
        let mut inputs = InputManager::default_inputs();
        inputs[0].active = true;
        inputs[10].active = true;
        inputs.push(Input {
            name: "Bogus".into(),
            number: 17,
            active: true,
            player: 1,
            kind: InputKind::Button,
        });
        manager.update(inputs);

        let keys = manager.check_keys();
        assert!(keys[0x0]);
        assert!(keys[0xA]);
        assert_eq!(keys.iter().filter(|&&k| k).count(), 2);
        assert_eq!(manager.max_players(), 1);
    }
}
