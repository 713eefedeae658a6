use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::error::CollaboratorError;

pub const HOLD_OPEN_PROMPT: &str = "Press Enter to close...";

/// Line-oriented text channel used by `output`, `input` and `value=<input>`.
pub trait Console {
    fn read_line(&mut self, prompt: &str) -> Result<String, CollaboratorError>;

    fn write_line(&mut self, line: &str) -> Result<(), CollaboratorError>;

    /// Blocks until the user acknowledges termination.
    fn hold_open(&mut self) -> Result<(), CollaboratorError> {
        self.read_line(HOLD_OPEN_PROMPT).map(|_| ())
    }
}

/// Console on the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, CollaboratorError> {
        let mut stdout = io::stdout().lock();
        if !prompt.is_empty() {
            write!(stdout, "{prompt}")?;
            stdout.flush()?;
        }
        let mut line = String::new();
        // EOF reads as an empty line
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn write_line(&mut self, line: &str) -> Result<(), CollaboratorError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(())
    }
}

/// In-memory console with scripted input and captured output.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    inputs: VecDeque<String>,
    output: Vec<String>,
    prompts: Vec<String>,
    held_open: bool,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Captured output joined the way a terminal would show it.
    pub fn transcript(&self) -> String {
        self.output.iter().map(|line| format!("{line}\n")).collect()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn held_open(&self) -> bool {
        self.held_open
    }
}

impl Console for BufferConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, CollaboratorError> {
        self.prompts.push(prompt.to_string());
        self.inputs
            .pop_front()
            .ok_or_else(|| CollaboratorError::InputExhausted {
                prompt: prompt.to_string(),
            })
    }

    fn write_line(&mut self, line: &str) -> Result<(), CollaboratorError> {
        self.output.push(line.to_string());
        Ok(())
    }

    fn hold_open(&mut self) -> Result<(), CollaboratorError> {
        self.prompts.push(HOLD_OPEN_PROMPT.to_string());
        self.held_open = true;
        Ok(())
    }
}
