use std::fmt;

use serde::{Deserialize, Serialize};

/// The action planned for one resource instance object or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NoOp,
    Create,
    Read,
    Update,
    /// Replace by destroying the old object before creating the new one.
    DeleteThenCreate,
    /// Replace by creating the new object first (`create_before_destroy`).
    CreateThenDelete,
    Delete,
}

impl Action {
    /// The ordered list form used in the JSON plan format.
    pub fn json_actions(&self) -> &'static [&'static str] {
        match self {
            Action::NoOp => &["no-op"],
            Action::Create => &["create"],
            Action::Read => &["read"],
            Action::Update => &["update"],
            Action::DeleteThenCreate => &["delete", "create"],
            Action::CreateThenDelete => &["create", "delete"],
            Action::Delete => &["delete"],
        }
    }

    /// Symbol used in human-readable plan output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Action::Create => "+",
            Action::Update => "~",
            Action::Delete => "-",
            Action::DeleteThenCreate => "-/+",
            Action::CreateThenDelete => "+/-",
            Action::Read => "<=",
            Action::NoOp => " ",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => write!(f, "no-op"),
            Action::Create => write!(f, "create"),
            Action::Read => write!(f, "read"),
            Action::Update => write!(f, "update"),
            Action::DeleteThenCreate => write!(f, "delete-then-create"),
            Action::CreateThenDelete => write!(f, "create-then-delete"),
            Action::Delete => write!(f, "delete"),
        }
    }
}
