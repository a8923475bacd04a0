//! Keys addressing artifacts inside an optimization container.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Category of an optimization artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    Variable,
    AuxVariable,
    Constraint,
    Parameter,
    Expression,
    Dual,
    InitialCondition,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Variable => "variables",
            ArtifactKind::AuxVariable => "aux_variables",
            ArtifactKind::Constraint => "constraints",
            ArtifactKind::Parameter => "parameters",
            ArtifactKind::Expression => "expressions",
            ArtifactKind::Dual => "duals",
            ArtifactKind::InitialCondition => "initial_conditions",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one artifact table in a container: what it is, which entry type it
/// holds and which component type it applies to.
///
/// `meta` disambiguates tables that share entry and component (e.g. `ub`/`lb`
/// halves of a range constraint); empty when unused.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerKey {
    pub kind: ArtifactKind,
    pub entry: String,
    pub component_type: String,
    #[serde(default)]
    pub meta: String,
}

impl ContainerKey {
    pub fn new(kind: ArtifactKind, entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            kind,
            entry: entry.into(),
            component_type: component_type.into(),
            meta: String::new(),
        }
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = meta.into();
        self
    }

    pub fn variable(entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Variable, entry, component_type)
    }

    pub fn aux_variable(entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self::new(ArtifactKind::AuxVariable, entry, component_type)
    }

    pub fn constraint(entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Constraint, entry, component_type)
    }

    pub fn parameter(entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Parameter, entry, component_type)
    }

    pub fn dual(entry: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self::new(ArtifactKind::Dual, entry, component_type)
    }

    /// Same entry and component, different artifact kind. Used to name the dual
    /// table that mirrors a constraint table.
    pub fn as_kind(&self, kind: ArtifactKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// File-system friendly name, `Entry__Component[__meta]`.
    pub fn file_stem(&self) -> String {
        if self.meta.is_empty() {
            format!("{}__{}", self.entry, self.component_type)
        } else {
            format!("{}__{}__{}", self.entry, self.component_type, self.meta)
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_meta_only_when_set() {
        let key = ContainerKey::variable("ActivePowerVariable", "ThermalStandard");
        assert_eq!(key.to_string(), "variables/ActivePowerVariable__ThermalStandard");

        let key = ContainerKey::constraint("RangeLimit", "ThermalStandard").with_meta("ub");
        assert_eq!(key.file_stem(), "RangeLimit__ThermalStandard__ub");
    }

    #[test]
    fn dual_mirrors_constraint() {
        let con = ContainerKey::constraint("CopperPlateBalance", "System");
        let dual = con.as_kind(ArtifactKind::Dual);
        assert_eq!(dual.kind, ArtifactKind::Dual);
        assert_eq!(dual.entry, con.entry);
        assert_ne!(dual, con);
    }
}
