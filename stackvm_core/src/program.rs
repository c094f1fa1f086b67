/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::vm::CODE_SIZE;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// A flat stream of opcode bytes with their operands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<u8>,
}

#[derive(Debug)]
pub enum ProgramError {
    Read(std::io::Error),
    Write(std::io::Error),
    TooLarge(usize),
}

impl Program {
    pub fn from_bytes(code: impl Into<Vec<u8>>) -> Result<Self, ProgramError> {
        let code = code.into();
        if code.len() > CODE_SIZE {
            return Err(ProgramError::TooLarge(code.len()));
        }
        Ok(Self { code })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProgramError> {
        let code = std::fs::read(path).map_err(ProgramError::Read)?;
        Self::from_bytes(code)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProgramError> {
        std::fs::write(path, &self.code).map_err(ProgramError::Write)
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }
}

impl Error for ProgramError {}

impl Display for ProgramError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::Read(err) => write!(f, "could not read bytecode: {err}"),
            ProgramError::Write(err) => write!(f, "could not write bytecode: {err}"),
            ProgramError::TooLarge(len) => {
                write!(f, "program is {len} bytes, the limit is {CODE_SIZE}")
            }
        }
    }
}
