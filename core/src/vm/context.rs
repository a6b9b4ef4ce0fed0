use std::fmt;
use std::io::{self, Write};

/// The host-facing side of a VM run: where builtin output goes. Defaults
/// to stdout; tests and embedders swap in their own sink.
pub struct VmContext {
    out: Box<dyn Write + Send>,
}

impl VmContext {
    pub fn new() -> Self {
        Self {
            out: Box::new(io::stdout()),
        }
    }

    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    /// Write failures are swallowed: output is best-effort, like printing
    /// to a closed pipe.
    pub fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }
}

impl Default for VmContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmContext").finish_non_exhaustive()
    }
}
