use std::path::PathBuf;

use thiserror::Error;

use crate::memory::{TypeAddr, MAX_PROGRAM_SIZE};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no program supplied")]
    NoProgram,
    #[error("program is too large ({size} bytes), max size is {max} bytes")]
    ProgramTooLarge { size: usize, max: usize },
    #[error("unable to read program {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unimplemented opcode {opcode:#06X} at {address:#05X}")]
    UnimplementedOpcode { opcode: u16, address: TypeAddr },
    #[error("unable to start scheduler thread")]
    Spawn(#[source] std::io::Error),
    #[error("scheduler thread panicked")]
    SchedulerPanicked,
}

impl Error {
    pub(crate) fn too_large(size: usize) -> Self {
        Self::ProgramTooLarge {
            size,
            max: MAX_PROGRAM_SIZE,
        }
    }

    /// Whether the error ends the current run rather than just a load attempt.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::UnimplementedOpcode { .. } | Self::SchedulerPanicked
        )
    }
}
