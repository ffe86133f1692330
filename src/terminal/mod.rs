use crossterm::tty::IsTty;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Where rendered frames go
pub trait Terminal {
    fn write(&mut self, text: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;

    /// Interactive terminals get in-place redraws, everything else
    /// gets an append-only log of snapshots
    fn is_interactive(&self) -> bool;
}

pub struct StdTerminal;

impl Terminal for StdTerminal {
    fn write(&mut self, text: &str) -> io::Result<()> {
        io::stdout().lock().write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }

    fn is_interactive(&self) -> bool {
        io::stdout().is_tty()
    }
}

/// Captures everything written, for tests and embedding
#[derive(Clone, Default)]
pub struct MemoryTerminal {
    writes: Arc<Mutex<Vec<String>>>,
    interactive: bool,
}

impl MemoryTerminal {
    pub fn new(interactive: bool) -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            interactive,
        }
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn output(&self) -> String {
        self.writes().concat()
    }

    pub fn clear(&self) {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Terminal for MemoryTerminal {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
pub struct FailingTerminal;

#[cfg(test)]
impl Terminal for FailingTerminal {
    fn write(&mut self, _text: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }

    fn is_interactive(&self) -> bool {
        true
    }
}
