use crate::config::ConfigError;
use crate::jsonplan::EncodeError;
use crate::plans::planfile::PlanFileError;
use crate::state::statefile::StateFileError;

/// Errors from the show command.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error("too many command line arguments; expected at most one path to a plan or state file")]
    TooManyArguments,

    /// Fetching the current state from the configured backend failed.
    #[error("failed to load state: {0:#}")]
    Backend(anyhow::Error),

    /// Setting up the command (backend, provider schemas) failed.
    #[error("error initializing: {0}")]
    Context(String),

    /// The given file is neither a readable plan nor a readable state.
    #[error(
        "failed to read the given file as a state or plan file\n\n\
         State read error: {state_err}\n\n\
         Plan read error: {plan_err}"
    )]
    BothFailed {
        state_err: StateFileError,
        plan_err: PlanFileError,
    },

    #[error("the --json flag is only supported for plan files; state files are shown in human-readable form only")]
    JsonUnsupportedForState,

    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] ConfigError),

    #[error("failed to encode plan as JSON: {0}")]
    Encode(#[from] EncodeError),
}
