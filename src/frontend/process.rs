use crate::error::{Result, RollgateError};
use std::process::Command;
use tracing::info;

/// An external program started once at boot and waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `nginx -c <conf>`
    pub fn nginx(program: impl Into<String>, conf: impl Into<String>) -> Self {
        Self::new(program, vec!["-c".to_string(), conf.into()])
    }

    /// `step certificates renew --daemon`
    pub fn step_renew(program: impl Into<String>) -> Self {
        Self::new(
            program,
            ["certificates", "renew", "--daemon"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

/// Run `cfg` and wait for it. A spawn failure or a non-zero exit is a
/// [`RollgateError::Process`].
pub fn run_to_completion(cfg: &ProcessConfig) -> Result<()> {
    info!(program = %cfg.program, args = ?cfg.args, "Running front-end process");
    let status = Command::new(&cfg.program)
        .args(&cfg.args)
        .status()
        .map_err(|e| RollgateError::process(&cfg.program, format!("failed to start: {e}")))?;
    if !status.success() {
        return Err(RollgateError::process(
            &cfg.program,
            format!("exited unsuccessfully ({status})"),
        ));
    }
    Ok(())
}
