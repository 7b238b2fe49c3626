//! Trigger sources: console keypresses and remote function calls.
//!
//! Both map onto the same two commands; the orchestrator treats them
//! identically regardless of which channel they came from.

use std::str::FromStr;

use tokio::sync::mpsc;

/// A command that starts one of the two operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadCodes,
    ClearCodes,
}

impl Command {
    pub const READ_CODES: &'static str = "readCodes";
    pub const CLEAR_CODES: &'static str = "clearCodes";

    /// Console key binding: `r` reads, `c` clears.
    pub fn from_key(key: u8) -> Option<Self> {
        match key {
            b'r' => Some(Command::ReadCodes),
            b'c' => Some(Command::ClearCodes),
            _ => None,
        }
    }

    /// Remote function name.
    pub fn name(self) -> &'static str {
        match self {
            Command::ReadCodes => Self::READ_CODES,
            Command::ClearCodes => Self::CLEAR_CODES,
        }
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::READ_CODES => Ok(Command::ReadCodes),
            Self::CLEAR_CODES => Ok(Command::ClearCodes),
            _ => Err(()),
        }
    }
}

/// A non-blocking source of commands, polled once per tick.
pub trait TriggerSource {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Take at most one pending command. Unrecognized input is consumed
    /// and ignored.
    fn poll(&mut self) -> Option<Command>;
}

/// Single-byte console input (the serial port on a device).
pub struct KeypressTrigger {
    rx: mpsc::UnboundedReceiver<u8>,
}

impl KeypressTrigger {
    pub fn new(rx: mpsc::UnboundedReceiver<u8>) -> Self {
        Self { rx }
    }
}

impl TriggerSource for KeypressTrigger {
    fn name(&self) -> &'static str {
        "console"
    }

    fn poll(&mut self) -> Option<Command> {
        let key = self.rx.try_recv().ok()?;
        let command = Command::from_key(key);
        if command.is_none() {
            tracing::trace!(key, "ignoring key");
        }
        command
    }
}

/// Remote function invocations by name (`readCodes`, `clearCodes`).
pub struct RemoteTrigger {
    rx: mpsc::UnboundedReceiver<String>,
}

impl RemoteTrigger {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx }
    }
}

impl TriggerSource for RemoteTrigger {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn poll(&mut self) -> Option<Command> {
        let function = self.rx.try_recv().ok()?;
        match function.parse::<Command>() {
            Ok(command) => Some(command),
            Err(()) => {
                tracing::debug!(function = %function, "ignoring unknown remote function");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bindings() {
        assert_eq!(Command::from_key(b'r'), Some(Command::ReadCodes));
        assert_eq!(Command::from_key(b'c'), Some(Command::ClearCodes));
        assert_eq!(Command::from_key(b'R'), None);
        assert_eq!(Command::from_key(b'\n'), None);
    }

    #[test]
    fn remote_names() {
        assert_eq!("readCodes".parse::<Command>(), Ok(Command::ReadCodes));
        assert_eq!("clearCodes".parse::<Command>(), Ok(Command::ClearCodes));
        assert_eq!("readcodes".parse::<Command>(), Err(()));
        assert_eq!(Command::ClearCodes.name(), "clearCodes");
    }

    #[test]
    fn keypress_polls_one_at_a_time() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut trigger = KeypressTrigger::new(rx);

        assert_eq!(trigger.poll(), None);
        tx.send(b'r').unwrap();
        tx.send(b'x').unwrap();
        tx.send(b'c').unwrap();

        assert_eq!(trigger.poll(), Some(Command::ReadCodes));
        assert_eq!(trigger.poll(), None); // 'x' consumed and ignored
        assert_eq!(trigger.poll(), Some(Command::ClearCodes));
        assert_eq!(trigger.poll(), None);
    }

    #[test]
    fn remote_ignores_unknown_functions() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut trigger = RemoteTrigger::new(rx);

        tx.send("reboot".to_string()).unwrap();
        tx.send("clearCodes".to_string()).unwrap();

        assert_eq!(trigger.poll(), None);
        assert_eq!(trigger.poll(), Some(Command::ClearCodes));
    }

    #[test]
    fn closed_channel_yields_nothing() {
        let (tx, rx) = mpsc::unbounded_channel::<u8>();
        drop(tx);
        let mut trigger = KeypressTrigger::new(rx);
        assert_eq!(trigger.poll(), None);
    }
}
