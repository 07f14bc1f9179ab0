//! Field-level merge of local declarations with remote records.
//!
//! Only parameters, schedules, and tags are mergeable. Every other field is
//! always taken from the local declaration.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::config::DeploymentSpec;
use crate::prefect::RemoteDeployment;

/// A deployment field whose local value can be pushed over the remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeField {
    /// Default flow parameters.
    Parameters,
    /// Schedules.
    Schedules,
    /// Tags.
    Tags,
}

impl MergeField {
    /// All mergeable fields.
    pub const ALL: [Self; 3] = [Self::Parameters, Self::Schedules, Self::Tags];

    const fn bit(self) -> u8 {
        match self {
            Self::Parameters => 0b001,
            Self::Schedules => 0b010,
            Self::Tags => 0b100,
        }
    }
}

impl fmt::Display for MergeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameters => write!(f, "parameters"),
            Self::Schedules => write!(f, "schedules"),
            Self::Tags => write!(f, "tags"),
        }
    }
}

/// The set of fields whose local value is pushed.
///
/// Fields outside the set keep the value stored on the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    fields: u8,
}

impl MergeOptions {
    /// No field is pushed; remote values are kept.
    #[must_use]
    pub const fn none() -> Self {
        Self { fields: 0 }
    }

    /// Every mergeable field is pushed.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            fields: MergeField::Parameters.bit() | MergeField::Schedules.bit() | MergeField::Tags.bit(),
        }
    }

    /// Adds a field to the set.
    #[must_use]
    pub const fn with(self, field: MergeField) -> Self {
        Self {
            fields: self.fields | field.bit(),
        }
    }

    /// Returns true if the local value of `field` is pushed.
    #[must_use]
    pub const fn contains(self, field: MergeField) -> bool {
        self.fields & field.bit() != 0
    }

    /// Returns the fields in the set.
    #[must_use]
    pub fn fields(self) -> Vec<MergeField> {
        MergeField::ALL
            .into_iter()
            .filter(|f| self.contains(*f))
            .collect()
    }
}

impl FromIterator<MergeField> for MergeOptions {
    fn from_iter<I: IntoIterator<Item = MergeField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

/// Merges a local declaration with the current remote record.
///
/// Without a remote record the local declaration is returned unchanged.
#[must_use]
pub fn merge(
    local: &DeploymentSpec,
    remote: Option<&RemoteDeployment>,
    options: MergeOptions,
) -> DeploymentSpec {
    let mut merged = local.clone();
    let Some(remote) = remote else {
        debug!("{}: no remote record, using local declaration", local.name);
        return merged;
    };

    if !options.contains(MergeField::Parameters) {
        merged.parameters.clone_from(&remote.parameters);
    }
    if !options.contains(MergeField::Schedules) {
        merged.schedules.clone_from(&remote.schedules);
    }
    if !options.contains(MergeField::Tags) {
        merged.tags.clone_from(&remote.tags);
    }

    debug!("{}: pushing local {:?}", local.name, options.fields());
    merged
}
