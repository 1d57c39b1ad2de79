use std::io::IsTerminal;

/// Injectable terminal detection, so tests can force non-interactive output.
pub trait TerminalClient: Send + Sync {
    /// Returns whether stdout is attached to a terminal.
    fn stdout_is_terminal(&self) -> bool;

    /// Returns whether stderr is attached to a terminal.
    fn stderr_is_terminal(&self) -> bool;
}

/// Terminal detection backed by the real process streams.
#[derive(Debug, Default)]
pub struct SystemTerminalClient;

impl TerminalClient for SystemTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        std::io::stdout().is_terminal()
    }

    fn stderr_is_terminal(&self) -> bool {
        std::io::stderr().is_terminal()
    }
}
