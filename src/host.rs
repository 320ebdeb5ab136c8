use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};

use crate::config::Config;
use crate::emulator::Emulator;
use crate::error::{Error, Result};
use crate::keyboard::Input;
use crate::scheduler::{run_until_cancelled, CancelToken, SharedState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub core_name: &'static str,
    pub core_description: &'static str,
    pub core_developer: &'static str,
    pub platform_name: &'static str,
    pub platform_description: &'static str,
    pub platform_developer: &'static str,
    pub max_players: u8,
    pub release_year: u16,
    pub supported_file_extensions: &'static [&'static str],
}

pub const CHIP8_METADATA: Metadata = Metadata {
    core_name: "Chip8",
    core_description: "CHIP-8 Extension for the Cade Arcade System",
    core_developer: "Cade",
    platform_name: "CHIP-8",
    platform_description: "Chip 8 Interpreter",
    platform_developer: "Joseph Weisbecker",
    max_players: 1,
    release_year: 1970,
    supported_file_extensions: &["c8"],
};

pub trait Core {
    fn metadata(&self) -> &Metadata;

    fn supported_extensions(&self) -> &[&str] {
        self.metadata().supported_file_extensions
    }

    /// Builds a fresh machine from the program at `path`.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Runs the loaded program on the calling thread until cancelled.
    fn run(&mut self) -> Result<()>;
}

pub struct Chip8Core {
    config: Config,
    shared: Arc<SharedState>,
    cancel: CancelToken,
    emulator: Option<Emulator>,
}

impl Default for Chip8Core {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Chip8Core {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shared: Arc::new(SharedState::new()),
            cancel: CancelToken::new(),
            emulator: None,
        }
    }

    /// Same as [`Core::load`], for programs already in memory.
    ///
    /// Starts a new session: the published frame is blanked, the timer
    /// mirrors are zeroed and any earlier cancel is cleared.
    pub fn load_bytes(&mut self, program: &[u8]) -> Result<()> {
        self.emulator = None;
        self.shared.reset();
        self.cancel.reset();
        match Emulator::with_program(program) {
            Ok(emu) => {
                self.emulator = Some(emu.with_quirks(self.config.quirks));
                Ok(())
            }
            Err(err) => {
                error!("Failed to load program: {err}");
                Err(err)
            }
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn inputs(&self) -> Vec<Input> {
        self.shared.inputs()
    }

    // While `run` blocks, hosts go through `shared().update_inputs` instead.
    pub fn update_inputs(&self, inputs: &[Input]) {
        self.shared.update_inputs(inputs);
    }

    pub fn emulator(&self) -> Option<&Emulator> {
        self.emulator.as_ref()
    }
}

impl Core for Chip8Core {
    fn metadata(&self) -> &Metadata {
        &CHIP8_METADATA
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let program = fs::read(path).map_err(|source| {
            let err = Error::Io {
                path: path.to_path_buf(),
                source,
            };
            error!("{err}");
            err
        })?;
        self.load_bytes(&program)?;
        info!("Loaded {}", path.display());
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let emu = self.emulator.as_mut().ok_or(Error::NoProgram)?;
        info!("Running [cpu: {} Hz]", self.config.cpu_hz);
        let result = run_until_cancelled(emu, &self.shared, &self.cancel, &self.config);
        if let Err(err) = &result {
            error!("Run halted: {err}");
        }
        result
    }
}
