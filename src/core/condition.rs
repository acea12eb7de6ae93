//! Platform conditions and their evaluation.
//!
//! Conditions are declared as data in the recipe and evaluated by the single
//! pure function [`evaluate`]. In TOML they are written as small tables:
//!
//! ```toml
//! when = "always"
//! when = { os = "macos" }
//! when = { compiler = { family = "gcc", version = "5" } }
//! when = { not = { os = "macos" } }
//! when = { all = [{ os = "linux" }, { compiler = { family = "clang" } }] }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::platform::{CompilerFamily, HostOs, PlatformContext};

/// A predicate over the host OS family and the compiler identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCondition {
    /// Always true.
    Always,
    /// True when the host OS family matches.
    Os(HostOs),
    /// True when the compiler family matches and, if given, the version
    /// matches component-wise.
    Compiler {
        family: CompilerFamily,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    /// True when every inner condition is true.
    All(Vec<PlatformCondition>),
    /// True when at least one inner condition is true.
    Any(Vec<PlatformCondition>),
    /// Negation.
    Not(Box<PlatformCondition>),
}

impl PlatformCondition {
    pub fn os(os: HostOs) -> Self {
        PlatformCondition::Os(os)
    }

    pub fn compiler(family: CompilerFamily, version: Option<&str>) -> Self {
        PlatformCondition::Compiler {
            family,
            version: version.map(str::to_string),
        }
    }

    pub fn negate(self) -> Self {
        PlatformCondition::Not(Box::new(self))
    }

    /// Evaluate against a context. See [`evaluate`].
    pub fn eval(&self, ctx: &PlatformContext) -> bool {
        evaluate(self, ctx)
    }
}

impl Default for PlatformCondition {
    fn default() -> Self {
        PlatformCondition::Always
    }
}

impl fmt::Display for PlatformCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformCondition::Always => write!(f, "always"),
            PlatformCondition::Os(os) => write!(f, "os={}", os),
            PlatformCondition::Compiler {
                family,
                version: Some(v),
            } => write!(f, "compiler={}@{}", family, v),
            PlatformCondition::Compiler {
                family,
                version: None,
            } => write!(f, "compiler={}", family),
            PlatformCondition::All(items) => write_list(f, "all", items),
            PlatformCondition::Any(items) => write_list(f, "any", items),
            PlatformCondition::Not(inner) => write!(f, "not({})", inner),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, items: &[PlatformCondition]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, ")")
}

/// Evaluate a condition against a runtime context.
///
/// Total: every condition yields exactly `true` or `false`. `all([])` is
/// true and `any([])` is false.
pub fn evaluate(condition: &PlatformCondition, ctx: &PlatformContext) -> bool {
    match condition {
        PlatformCondition::Always => true,
        PlatformCondition::Os(os) => ctx.os == *os,
        PlatformCondition::Compiler { family, version } => {
            ctx.compiler.matches(*family, version.as_deref())
        }
        PlatformCondition::All(items) => items.iter().all(|c| evaluate(c, ctx)),
        PlatformCondition::Any(items) => items.iter().any(|c| evaluate(c, ctx)),
        PlatformCondition::Not(inner) => !evaluate(inner, ctx),
    }
}

/// Which declared conditions were exercised by a set of test contexts.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    /// Conditions that evaluated true for at least one context.
    pub hit: Vec<PlatformCondition>,
    /// Conditions that never evaluated true.
    pub missed: Vec<PlatformCondition>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missed.is_empty()
    }
}

/// Check branch coverage of `conditions` over `contexts`.
pub fn coverage<'a>(
    conditions: impl IntoIterator<Item = &'a PlatformCondition>,
    contexts: &[PlatformContext],
) -> Coverage {
    let mut cov = Coverage::default();
    for condition in conditions {
        if contexts.iter().any(|ctx| evaluate(condition, ctx)) {
            cov.hit.push(condition.clone());
        } else {
            cov.missed.push(condition.clone());
        }
    }
    cov
}
