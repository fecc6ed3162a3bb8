//! The show command: load a plan or state and render it.
//!
//! With a path, the file is tried as a plan file first and as a state file
//! second. Without a path, the current state of the selected workspace is
//! fetched from the state backend.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::ShowContext;
use crate::error::ShowError;
use crate::jsonplan;
use crate::output::formatter;
use crate::plans::planfile::{self, PlanFileError};
use crate::plans::Plan;
use crate::state::backend::{self, StateBackend};
use crate::state::models::State;
use crate::state::statefile::{self, StateFileError};

/// Parsed show arguments.
#[derive(Debug, Clone, Default)]
pub struct ShowArgs {
    pub path: Option<PathBuf>,
    pub json: bool,
}

impl ShowArgs {
    /// Build arguments from the positional paths. At most one is allowed,
    /// and JSON output requires one.
    pub fn from_paths(paths: &[PathBuf], json: bool) -> Result<Self, ShowError> {
        if paths.len() > 1 {
            return Err(ShowError::TooManyArguments);
        }
        if json && paths.is_empty() {
            return Err(ShowError::JsonUnsupportedForState);
        }
        Ok(Self {
            path: paths.first().cloned(),
            json,
        })
    }
}

/// A plan file's contents: the plan and the state it was computed against.
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: Plan,
    pub prior_state: statefile::File,
}

/// Outcome of interpreting a path as a plan or a state file.
#[derive(Debug)]
pub enum Resolution {
    Plan(LoadedPlan),
    State(statefile::File),
    BothFailed {
        plan_err: PlanFileError,
        state_err: StateFileError,
    },
}

/// What the command will render.
#[derive(Debug)]
pub enum Artifact {
    Plan(LoadedPlan),
    State(State),
    NoState,
}

/// Try `path` as a plan file, then as a state file. Every file handle is
/// closed before this returns.
pub fn resolve_path(path: &Path) -> Resolution {
    let plan_err = match open_plan(path) {
        Ok(loaded) => {
            debug!("Loaded plan file {}", path.display());
            return Resolution::Plan(loaded);
        }
        Err(e) => e,
    };
    debug!("{} is not a plan file: {}", path.display(), plan_err);

    match statefile::read_path(path) {
        Ok(file) => {
            debug!(serial = file.serial, "Loaded state file {}", path.display());
            Resolution::State(file)
        }
        Err(state_err) => Resolution::BothFailed {
            plan_err,
            state_err,
        },
    }
}

fn open_plan(path: &Path) -> Result<LoadedPlan, PlanFileError> {
    let mut reader = planfile::Reader::open(path)?;
    let plan = reader.read_plan()?;
    let prior_state = reader.read_prior_state()?;
    Ok(LoadedPlan { plan, prior_state })
}

/// Decide what to show.
pub async fn load(ctx: &ShowContext, args: &ShowArgs) -> Result<Artifact, ShowError> {
    let Some(ref path) = args.path else {
        // The JSON format describes plans only; fail before touching the backend.
        if args.json {
            return Err(ShowError::JsonUnsupportedForState);
        }
        return load_backend_state(ctx).await;
    };

    if args.json {
        // Anything that is not a plan cannot be shown as JSON; the file is
        // not read a second time as a state.
        return match open_plan(path) {
            Ok(loaded) => Ok(Artifact::Plan(loaded)),
            Err(e) => {
                debug!("{} is not a plan file: {}", path.display(), e);
                Err(ShowError::JsonUnsupportedForState)
            }
        };
    }

    match resolve_path(path) {
        Resolution::Plan(loaded) => Ok(Artifact::Plan(loaded)),
        Resolution::State(file) => Ok(Artifact::State(file.state)),
        Resolution::BothFailed {
            plan_err,
            state_err,
        } => Err(ShowError::BothFailed {
            state_err,
            plan_err,
        }),
    }
}

async fn load_backend_state(ctx: &ShowContext) -> Result<Artifact, ShowError> {
    let opened;
    let backend: &dyn StateBackend = match ctx.backend {
        Some(ref backend) => backend.as_ref(),
        None => {
            opened = backend::open_backend(&ctx.settings.state_backend, &ctx.settings.config_dir)
                .map_err(ShowError::Backend)?;
            opened.as_ref()
        }
    };

    let workspace = &ctx.settings.workspace;
    debug!(
        backend = backend.name(),
        workspace = workspace.as_str(),
        "Fetching current state"
    );
    let state = backend
        .refresh_state(workspace)
        .await
        .map_err(ShowError::Backend)?;

    match state {
        Some(state) if !state.is_empty() => Ok(Artifact::State(state)),
        _ => Ok(Artifact::NoState),
    }
}

/// Render an artifact. JSON output is the compact plan document and nothing
/// else.
pub fn render(ctx: &ShowContext, artifact: &Artifact, json: bool) -> Result<String, ShowError> {
    match (artifact, json) {
        (Artifact::Plan(loaded), true) => {
            let bytes = jsonplan::marshal_to_vec(
                &ctx.config,
                &loaded.plan,
                &loaded.prior_state.state,
                &ctx.schemas,
            )?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        (Artifact::Plan(loaded), false) => Ok(formatter::format_plan(
            &loaded.plan,
            &ctx.config,
            &ctx.schemas,
        )),
        (Artifact::State(_), true) => Err(ShowError::JsonUnsupportedForState),
        (Artifact::State(state), false) => {
            Ok(formatter::format_state(state, &ctx.config, &ctx.schemas))
        }
        (Artifact::NoState, _) => Ok("No state.".to_string()),
    }
}

/// Load and render in one step.
pub async fn run(ctx: &ShowContext, args: &ShowArgs) -> Result<String, ShowError> {
    let artifact = load(ctx, args).await?;
    render(ctx, &artifact, args.json)
}
