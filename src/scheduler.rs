use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::Config;
use crate::display::{Pixels, PIXELS};
use crate::emulator::Emulator;
use crate::error::{Error, Result};
use crate::keyboard::{Input, InputManager, KeyState};

pub struct FrameSnapshot {
    pub pixels: Pixels,
    pub dirty: bool,
}

// Everything the host may touch while the VM is stepping elsewhere.
pub struct SharedState {
    keys: RwLock<KeyState>,
    input: Mutex<InputManager>,
    frame: Mutex<FrameSnapshot>,
    delay: AtomicU8,
    sound: AtomicU8,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new([false; 16]),
            input: Mutex::new(InputManager::new()),
            frame: Mutex::new(FrameSnapshot {
                pixels: [0; PIXELS],
                dirty: false,
            }),
            delay: AtomicU8::new(0),
            sound: AtomicU8::new(0),
        }
    }

    pub fn set_keys(&self, keys: KeyState) {
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = keys;
    }

    pub fn keys(&self) -> KeyState {
        *self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maps the host's button records onto the key latch.
    pub fn update_inputs(&self, inputs: &[Input]) {
        let keys = {
            let mut input = self.input.lock().unwrap_or_else(PoisonError::into_inner);
            input.update(inputs.to_vec());
            input.check_keys()
        };
        self.set_keys(keys);
    }

    pub fn inputs(&self) -> Vec<Input> {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inputs()
            .to_vec()
    }

    // Returns the frame only if it changed since the last call.
    pub fn take_frame(&self) -> Option<Pixels> {
        let mut frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        if frame.dirty {
            frame.dirty = false;
            Some(frame.pixels)
        } else {
            None
        }
    }

    pub fn frame(&self) -> Pixels {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pixels
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay.load(Ordering::Acquire)
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound.load(Ordering::Acquire)
    }

    /// Blanks the published frame (marked dirty) and zeroes the timer mirrors
    /// for a freshly loaded program. Host inputs are kept.
    pub fn reset(&self) {
        self.publish_frame(&[0; PIXELS]);
        self.delay.store(0, Ordering::Release);
        self.sound.store(0, Ordering::Release);
    }

    fn publish_frame(&self, pixels: &Pixels) {
        let mut frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        frame.pixels = *pixels;
        frame.dirty = true;
    }

    fn publish_timers(&self, emu: &Emulator) {
        self.delay.store(emu.delay_timer(), Ordering::Release);
        self.sound.store(emu.sound_timer(), Ordering::Release);
    }

    pub fn sync(&self, emu: &mut Emulator) {
        if let Some(pixels) = emu.take_frame() {
            self.publish_frame(pixels);
        }
        self.publish_timers(emu);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    next: Instant,
    max_catch_up: u32,
}

impl Pacer {
    pub fn new(period: Duration, start: Instant, max_catch_up: u32) -> Self {
        Self {
            period,
            next: start + period,
            max_catch_up: max_catch_up.max(1),
        }
    }

    // After a long stall only max_catch_up periods are replayed, then the
    // schedule restarts from now.
    pub fn due(&mut self, now: Instant) -> u32 {
        let mut count = 0;
        while self.next <= now && count < self.max_catch_up {
            self.next += self.period;
            count += 1;
        }
        if self.next <= now {
            warn!("Scheduler fell behind, dropping missed periods");
            self.next = now + self.period;
        }
        count
    }
}

/// Steps `emu` at the configured rates until `cancel` fires or the VM faults.
///
/// `config.quirks` replaces whatever quirks the VM carried. Blocks the calling
/// thread; cancellation is checked between steps.
pub fn run_until_cancelled(
    emu: &mut Emulator,
    shared: &SharedState,
    cancel: &CancelToken,
    config: &Config,
) -> Result<()> {
    emu.set_quirks(config.quirks);
    debug!("Quirks: {:?}", config.quirks);

    let start = Instant::now();
    let mut cpu = Pacer::new(config.cpu_period(), start, config.max_catch_up);
    let mut timers = Pacer::new(config.timer_period(), start, config.max_catch_up);

    while !cancel.is_cancelled() {
        let now = Instant::now();

        for _ in 0..timers.due(now) {
            emu.tick_timers();
        }

        let steps = cpu.due(now);
        if steps > 0 {
            emu.set_keys(shared.keys());
            for _ in 0..steps {
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(err) = emu.step() {
                    shared.sync(emu);
                    return Err(err);
                }
            }
        }
        shared.sync(emu);

        if config.poll_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(config.poll_interval);
        }
    }
    Ok(())
}

pub struct Scheduler {
    cancel: CancelToken,
    handle: JoinHandle<(Emulator, Result<()>)>,
}

impl Scheduler {
    pub fn start(mut emu: Emulator, shared: Arc<SharedState>, config: Config) -> Result<Self> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("chip8-cpu".into())
            .spawn(move || {
                info!(
                    "Scheduler started [cpu: {} Hz] [timers: {} Hz]",
                    config.cpu_hz, config.timer_hz
                );
                let result = run_until_cancelled(&mut emu, &shared, &token, &config);
                match &result {
                    Ok(()) => info!("Scheduler stopped"),
                    Err(err) => error!("Scheduler halted: {err}"),
                }
                (emu, result)
            })
            .map_err(Error::Spawn)?;
        Ok(Self { cancel, handle })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    // Hands the VM back along with how the run ended.
    pub fn join(self) -> Result<(Emulator, Result<()>)> {
        self.handle.join().map_err(|_| Error::SchedulerPanicked)
    }

    pub fn stop(self) -> Result<Emulator> {
        self.cancel();
        let (emu, result) = self.join()?;
        result.map(|()| emu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Quirks, ShiftSource};
    use crate::emulator::CpuState;

    fn fast_config() -> Config {
        Config::default()
            .with_cpu_hz(5_000)
            .with_timer_hz(1_000)
            .with_poll_interval(Duration::from_micros(100))
    }

    #[test]
    fn test_pacer_counts_elapsed_periods() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_millis(10), start, 8);
        assert_eq!(pacer.due(start), 0);
        assert_eq!(pacer.due(start + Duration::from_millis(9)), 0);
        assert_eq!(pacer.due(start + Duration::from_millis(10)), 1);
        assert_eq!(pacer.due(start + Duration::from_millis(35)), 2);
        assert_eq!(pacer.due(start + Duration::from_millis(35)), 0);
    }

    #[test]
    fn test_pacer_resyncs_after_stall() {
        let start = Instant::now();
        let mut pacer = Pacer::new(Duration::from_millis(1), start, 4);
        let late = start + Duration::from_secs(1);
        assert_eq!(pacer.due(late), 4);
        assert_eq!(pacer.due(late), 0);
        assert_eq!(pacer.due(late + Duration::from_millis(1)), 1);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        other.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_shared_frame_is_taken_once() {
        let shared = SharedState::new();
        let mut emu = Emulator::with_program(&[0x00, 0xE0]).unwrap();
        emu.step().unwrap();
        shared.sync(&mut emu);
        assert!(shared.take_frame().is_some());
        assert!(shared.take_frame().is_none());
        shared.sync(&mut emu);
        assert!(shared.take_frame().is_none());
    }

    #[test]
    fn test_cancelled_before_start_runs_nothing() {
        let mut emu = Emulator::with_program(&[0x70, 0x01, 0x12, 0x00]).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        run_until_cancelled(&mut emu, &SharedState::new(), &cancel, &fast_config()).unwrap();
        assert_eq!(emu.registers().get(0), 0);
    }

    #[test]
    fn test_scheduler_runs_and_stops() {
        // 200: V0 += 1; 202: jump 200
        let emu = Emulator::with_program(&[0x70, 0x01, 0x12, 0x00]).unwrap();
        let scheduler = Scheduler::start(emu, Arc::new(SharedState::new()), fast_config()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let emu = scheduler.stop().unwrap();
        assert!(emu.registers().get(0) > 0);
        assert!(emu.pc() == 0x200 || emu.pc() == 0x202);
    }

    #[test]
    fn test_scheduler_decays_timers() {
        // delay = 0xFF, then spin
        let emu = Emulator::with_program(&[0x60, 0xFF, 0xF0, 0x15, 0x12, 0x04]).unwrap();
        let shared = Arc::new(SharedState::new());
        let scheduler = Scheduler::start(emu, Arc::clone(&shared), fast_config()).unwrap();
        thread::sleep(Duration::from_millis(60));
        let emu = scheduler.stop().unwrap();
        assert!(emu.delay_timer() < 0xFF);
        assert_eq!(shared.delay_timer(), emu.delay_timer());
    }

    #[test]
    fn test_scheduler_feeds_keys_to_waiting_vm() {
        let emu = Emulator::with_program(&[0xF3, 0x0A, 0x12, 0x02]).unwrap();
        let shared = Arc::new(SharedState::new());
        let scheduler = Scheduler::start(emu, Arc::clone(&shared), fast_config()).unwrap();
        thread::sleep(Duration::from_millis(20));
        let mut keys = [false; 16];
        keys[0xB] = true;
        shared.set_keys(keys);
        thread::sleep(Duration::from_millis(30));
        let emu = scheduler.stop().unwrap();
        assert_eq!(emu.registers().get(3), 0xB);
        assert_eq!(emu.state(), CpuState::Running);
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn test_scheduler_halts_on_fault() {
        let emu = Emulator::with_program(&[0x60, 0x01, 0x00, 0x00]).unwrap();
        let scheduler = Scheduler::start(emu, Arc::new(SharedState::new()), fast_config()).unwrap();
        let (emu, result) = scheduler.join().unwrap();
        assert!(matches!(
            result,
            Err(Error::UnimplementedOpcode {
                opcode: 0x0000,
                address: 0x202
            })
        ));
        assert_eq!(emu.registers().get(0), 1);
    }

    #[test]
    fn test_scheduler_applies_config_quirks() {
        // V1 = 5; V2 = 3; shift 8126; spin
        let emu = Emulator::with_program(&[0x61, 0x05, 0x62, 0x03, 0x81, 0x26, 0x12, 0x06]).unwrap();
        let config = fast_config().with_quirks(Quirks {
            shift_source: ShiftSource::Vy,
        });
        let scheduler = Scheduler::start(emu, Arc::new(SharedState::new()), config).unwrap();
        thread::sleep(Duration::from_millis(30));
        let emu = scheduler.stop().unwrap();
        assert_eq!(emu.quirks().shift_source, ShiftSource::Vy);
        assert_eq!(emu.registers().get(1), 0x1);
    }

    #[test]
    fn test_shared_inputs_map_onto_keys() {
        let shared = SharedState::new();
        let mut inputs = InputManager::default_inputs();
        inputs[0].active = true;
        inputs[0xF].active = true;
        shared.update_inputs(&inputs);
        let keys = shared.keys();
        assert!(keys[0x0] && keys[0xF]);
        assert_eq!(keys.iter().filter(|&&k| k).count(), 2);
        assert_eq!(shared.inputs(), inputs);
    }

    #[test]
    fn test_shared_reset_publishes_blank_frame() {
        let shared = SharedState::new();
        let mut emu = Emulator::with_program(&[0x60, 0x09, 0xF0, 0x15, 0xD0, 0x05]).unwrap();
        for _ in 0..3 {
            emu.step().unwrap();
        }
        shared.sync(&mut emu);
        assert!(shared.take_frame().is_some());
        assert_eq!(shared.delay_timer(), 9);

        shared.reset();
        assert_eq!(shared.delay_timer(), 0);
        let frame = shared.take_frame().unwrap();
        assert!(frame.iter().all(|&p| p == 0));
    }
}
