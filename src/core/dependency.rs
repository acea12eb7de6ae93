//! Declared external dependencies.
//!
//! Dependencies are never resolved here. A recipe declares them so the
//! user (or an outer package manager) can check they are present; the
//! build assumes they are.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::condition::PlatformCondition;
use super::platform::PlatformContext;

/// When a dependency is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPhase {
    /// Only needed while building
    Build,
    /// Needed by the installed software
    Runtime,
}

impl fmt::Display for DependencyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyPhase::Build => write!(f, "build"),
            DependencyPhase::Runtime => write!(f, "runtime"),
        }
    }
}

/// A single declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub phase: DependencyPhase,
    /// Only needed when this holds; `None` means everywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<PlatformCondition>,
}

impl Dependency {
    pub fn applies_to(&self, ctx: &PlatformContext) -> bool {
        self.on.as_ref().map_or(true, |c| c.eval(ctx))
    }
}

/// How dependencies are written in a recipe: a phase, a list of names,
/// and an optional condition shared by all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGroup {
    pub phase: DependencyPhase,
    pub names: Vec<String>,
    #[serde(default)]
    pub when: Option<PlatformCondition>,
}

impl DependencyGroup {
    pub fn expand(&self) -> impl Iterator<Item = Dependency> + '_ {
        self.names.iter().map(move |name| Dependency {
            name: name.clone(),
            phase: self.phase,
            on: self.when.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{CompilerFamily, CompilerId, HostOs};

    #[test]
    fn test_group_expansion_and_applicability() {
        let group = DependencyGroup {
            phase: DependencyPhase::Runtime,
            names: vec!["gtk+3".to_string(), "systemd".to_string()],
            when: Some(PlatformCondition::os(HostOs::Linux)),
        };

        let deps: Vec<Dependency> = group.expand().collect();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "gtk+3");

        let linux = PlatformContext::new(HostOs::Linux, CompilerId::new(CompilerFamily::Gcc, "13"));
        let mac = PlatformContext::new(
            HostOs::Macos,
            CompilerId::new(CompilerFamily::AppleClang, "15"),
        );
        assert!(deps.iter().all(|d| d.applies_to(&linux)));
        assert!(deps.iter().all(|d| !d.applies_to(&mac)));
    }

    #[test]
    fn test_unconditional_dependency() {
        let dep = Dependency {
            name: "glib".to_string(),
            phase: DependencyPhase::Runtime,
            on: None,
        };
        let other = PlatformContext::new(HostOs::Other, CompilerId::new(CompilerFamily::Clang, "17"));
        assert!(dep.applies_to(&other));
    }
}
