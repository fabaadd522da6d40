use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::MemoryConfig;
use crate::error::{MmuError, TraceError};
use crate::memory::{PhysicalStore, Word};
use crate::vm_manager::VMManager;

/// One line of a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read(u64),
    Write(u64, Word),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read(va) => write!(f, "r {:#x}", va),
            Operation::Write(va, value) => write!(f, "w {:#x} {}", va, value),
        }
    }
}

/// Result of executing one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Value(Word),
    Written,
    Failed(MmuError),
}

impl Outcome {
    /// Token written to the results file
    pub fn to_output(&self) -> String {
        match self {
            Outcome::Value(value) => value.to_string(),
            Outcome::Written => "ok".to_string(),
            Outcome::Failed(_) => "err".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

/// Read a geometry from JSON. Validation is left to the caller, after any overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MemoryConfig, TraceError> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Operation>, TraceError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_trace(&content)
}

/// Parse `r <va>` / `w <va> <value>` lines. Blank lines and `#` comments are skipped.
pub fn parse_trace(content: &str) -> Result<Vec<Operation>, TraceError> {
    let mut operations = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        let parse_error = |message: String| TraceError::Parse { line: number + 1, message };

        let operation = match tokens.as_slice() {
            ["r" | "R", va] => Operation::Read(parse_number(va).map_err(parse_error)?),
            ["w" | "W", va, value] => Operation::Write(
                parse_number(va).map_err(parse_error)?,
                parse_word(value).map_err(parse_error)?,
            ),
            [op @ ("r" | "R" | "w" | "W"), ..] => {
                return Err(parse_error(format!(
                    "wrong number of arguments for '{}': {}",
                    op,
                    tokens.len() - 1
                )));
            }
            [op, ..] => return Err(parse_error(format!("unknown operation '{}'", op))),
            [] => continue,
        };
        operations.push(operation);
    }
    Ok(operations)
}

fn parse_number(token: &str) -> Result<u64, String> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| format!("invalid virtual address: {}", token))
}

fn parse_word(token: &str) -> Result<Word, String> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| format!("invalid value: {}", token))?;
    let value = if negative { -magnitude } else { magnitude };
    Word::try_from(value).map_err(|_| format!("value out of range: {}", token))
}

/// Execute `operations` in order. Failures are recorded and do not stop the run.
pub fn run_trace<S: PhysicalStore>(vm: &mut VMManager<S>, operations: &[Operation]) -> Vec<Outcome> {
    operations
        .iter()
        .map(|&operation| {
            let outcome = match operation {
                Operation::Read(va) => vm.read(va).map(Outcome::Value),
                Operation::Write(va, value) => vm.write(va, value).map(|()| Outcome::Written),
            }
            .unwrap_or_else(Outcome::Failed);
            match outcome {
                Outcome::Failed(e) => log::info!("{} -> {}", operation, e),
                _ => log::info!("{} -> {}", operation, outcome.to_output()),
            }
            outcome
        })
        .collect()
}

pub fn format_results(results: &[Outcome]) -> String {
    let output: Vec<String> = results.iter().map(Outcome::to_output).collect();
    output.join(" ")
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[Outcome]) -> Result<(), TraceError> {
    fs::write(path.as_ref(), format_results(results))?;
    Ok(())
}
