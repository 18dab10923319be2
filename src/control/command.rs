//! Command type definitions for the control channel.

/// Literal payload asking the enforcement process to shut down.
pub const TERMINATE_PAYLOAD: &str = "TERMINATE";

/// Commands understood by the enforcement process's command loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Replace the running slot configuration (records joined by `#`).
    /// An empty configuration is valid and denies everything.
    Configure(String),

    /// Stop enforcing and exit.
    Terminate,
}

impl ControlCommand {
    /// Convert the command to the bytes sent on the wire.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            ControlCommand::Configure(configuration) => configuration.as_bytes().to_vec(),
            ControlCommand::Terminate => TERMINATE_PAYLOAD.as_bytes().to_vec(),
        }
    }

    /// Short label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ControlCommand::Configure(_) => "configure",
            ControlCommand::Terminate => "terminate",
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::Configure(configuration) => write!(f, "{}", configuration),
            ControlCommand::Terminate => write!(f, "{}", TERMINATE_PAYLOAD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads() {
        assert_eq!(ControlCommand::Terminate.to_payload(), b"TERMINATE".to_vec());
        assert_eq!(
            ControlCommand::Configure("1,04:F0:21:17:36:68,0".to_string()).to_payload(),
            b"1,04:F0:21:17:36:68,0".to_vec()
        );
        assert!(ControlCommand::Configure(String::new()).to_payload().is_empty());
    }
}
