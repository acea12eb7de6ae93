//! Recipe file parsing and validation.
//!
//! A recipe is a TOML file describing one package: where its source lives,
//! how to configure, build and install it on each platform, and how to
//! check the installed result. See `recipes/qemu.toml` for a full example.
//!
//! Recipes are loaded once per run and never mutated afterwards.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::condition::PlatformCondition;
use super::dependency::{Dependency, DependencyGroup};
use super::error::RecipeError;
use super::platform::{CompilerFamily, PlatformContext};
use crate::util::hash::is_sha256_hex;
use crate::util::template;

/// Placeholders available to build-time strings.
pub const BUILD_PLACEHOLDERS: &[&str] = &["prefix", "bin", "cc", "tool_prefix", "version", "jobs"];

/// Placeholders available to variant templates.
pub const VARIANT_PLACEHOLDERS: &[&str] =
    &["prefix", "bin", "cc", "tool_prefix", "version", "jobs", "variant"];

/// Placeholders available to global check templates.
pub const CHECK_PLACEHOLDERS: &[&str] =
    &["prefix", "bin", "cc", "tool_prefix", "version", "jobs", "workspace"];

/// A parsed recipe file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: RecipePackage,

    /// Where the source comes from
    pub source: RecipeSource,

    /// Declared dependencies, grouped by phase and condition
    #[serde(default)]
    pub dependencies: Vec<DependencyGroup>,

    /// Toolchains the package is known not to build with
    #[serde(default)]
    pub fails_with: Vec<FailsWith>,

    /// Environment overrides for every build step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Configure arguments
    pub configure: ConfigureSection,

    /// Ordered build steps
    #[serde(default = "default_steps")]
    pub steps: Vec<StepTemplate>,

    /// Post-install verification
    #[serde(default)]
    pub test: TestSection,
}

/// Package metadata in a recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipePackage {
    /// Package name (must be lowercase [a-z0-9_-])
    pub name: String,

    /// Exact version
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub license: Option<String>,
}

/// Source archive location. Fetching it is left to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSource {
    /// Download URL
    pub url: String,

    /// SHA256 hash of the archive
    pub sha256: String,

    /// Repository for development (head) builds
    #[serde(default)]
    pub head: Option<String>,
}

/// A toolchain the recipe refuses to build with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailsWith {
    pub compiler: CompilerFamily,

    /// Version prefix; `None` excludes the whole family
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,
}

impl FailsWith {
    pub fn condition(&self) -> PlatformCondition {
        PlatformCondition::compiler(self.compiler, self.version.as_deref())
    }

    fn describe(&self) -> String {
        let mut s = match &self.version {
            Some(v) => format!("{} {} is not supported", self.compiler, v),
            None => format!("{} is not supported", self.compiler),
        };
        if let Some(reason) = &self.reason {
            s.push_str(&format!(" ({})", reason));
        }
        s
    }
}

/// Configure arguments: a fixed base plus conditional fragments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureSection {
    /// Base arguments, always first and in this order
    #[serde(default)]
    pub args: Vec<String>,

    /// Mutually exclusive branch sets; exactly one branch of each applies
    #[serde(default)]
    pub exclusive: Vec<ExclusiveSet>,

    /// Independent fragments, each applied when its condition holds
    #[serde(default)]
    pub fragments: Vec<Fragment>,
}

/// A set of branches of which exactly one must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusiveSet {
    pub name: String,
    pub branches: Vec<Fragment>,
}

/// Arguments guarded by a condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub when: PlatformCondition,
    pub args: Vec<String>,
}

/// One build step as written in the recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,

    /// Append the composed configure arguments after `args`
    #[serde(default)]
    pub plan_args: bool,
}

fn default_steps() -> Vec<StepTemplate> {
    vec![
        StepTemplate {
            name: "configure".to_string(),
            command: "./configure".to_string(),
            args: Vec::new(),
            plan_args: true,
        },
        StepTemplate {
            name: "build".to_string(),
            command: "make".to_string(),
            args: vec!["-j{jobs}".to_string()],
            plan_args: false,
        },
        StepTemplate {
            name: "install".to_string(),
            command: "make".to_string(),
            args: vec!["install".to_string()],
            plan_args: false,
        },
    ]
}

/// The `[test]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSection {
    /// Expected variant output for release builds
    #[serde(default = "default_expect")]
    pub expect: String,

    /// Expected variant output for head builds
    #[serde(default)]
    pub expect_head: Option<String>,

    /// Treat the expectation as a regular expression. Placeholder values
    /// are escaped; literal regex braces are written `{{` and `}}`.
    #[serde(default)]
    pub regex: bool,

    #[serde(default)]
    pub variants: VariantTable,

    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,

    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

fn default_expect() -> String {
    "{version}".to_string()
}

impl Default for TestSection {
    fn default() -> Self {
        TestSection {
            expect: default_expect(),
            expect_head: None,
            regex: false,
            variants: VariantTable::default(),
            resources: Vec::new(),
            checks: Vec::new(),
        }
    }
}

/// The variant matrix: one invocation template run once per id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantTable {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// How a resource archive is unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveKind {
    Zip,
    TarGz,
    /// Stored as-is under its URL file name
    Raw,
}

/// An auxiliary file fetched for the global checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub url: String,
    pub sha256: String,

    /// Inferred from the URL when absent
    #[serde(default)]
    pub archive: Option<ArchiveKind>,

    /// Leading directory to strip from tar entries
    #[serde(default)]
    pub strip_prefix: Option<String>,
}

impl ResourceDescriptor {
    pub fn archive_kind(&self) -> ArchiveKind {
        if let Some(kind) = self.archive {
            return kind;
        }
        let path = self.url.split(['?', '#']).next().unwrap_or("").to_lowercase();
        if path.ends_with(".zip") {
            ArchiveKind::Zip
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Raw
        }
    }

    /// Last path segment of the URL.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or("");
        path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(self.name.as_str())
    }
}

/// What a global check is guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// A property of something the installed tools produce
    Artifact,
    /// Trust or signature of the installed files
    Integrity,
}

/// A global post-install check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    pub kind: CheckKind,

    #[serde(default)]
    pub when: PlatformCondition,

    /// Resource to stage first; the check runs inside it
    #[serde(default)]
    pub resource: Option<String>,

    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,

    /// Substrings that must all appear in the combined output
    #[serde(default)]
    pub expect: Vec<String>,
}

impl Recipe {
    /// Load and parse a recipe file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recipe: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse a recipe from TOML content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let recipe: Recipe = toml::from_str(content)
            .with_context(|| format!("failed to parse recipe: {}", path.display()))?;

        recipe
            .validate()
            .with_context(|| format!("in recipe {}", path.display()))?;
        Ok(recipe)
    }

    /// Validate the recipe contents.
    pub fn validate(&self) -> Result<(), RecipeError> {
        validate_package_name(&self.package.name)?;

        semver::Version::parse(&self.package.version).map_err(|e| {
            RecipeError::invalid(format!("invalid version '{}': {}", self.package.version, e))
        })?;

        validate_url("source", &self.source.url)?;
        validate_digest("source", &self.source.sha256)?;

        let mut names = HashSet::new();
        for set in &self.configure.exclusive {
            if set.name.is_empty() {
                return Err(RecipeError::invalid("exclusive set with an empty name"));
            }
            if !names.insert(set.name.as_str()) {
                return Err(RecipeError::invalid(format!(
                    "duplicate exclusive set '{}'",
                    set.name
                )));
            }
            if set.branches.len() < 2 {
                return Err(RecipeError::invalid(format!(
                    "exclusive set '{}' needs at least two branches",
                    set.name
                )));
            }
        }

        for arg in self.build_templates() {
            check_template(arg, BUILD_PLACEHOLDERS)?;
        }

        if self.steps.is_empty() {
            return Err(RecipeError::invalid("recipe declares no build steps"));
        }

        self.validate_test()
    }

    fn validate_test(&self) -> Result<(), RecipeError> {
        let test = &self.test;

        check_template(&test.expect, BUILD_PLACEHOLDERS)?;
        if let Some(head) = &test.expect_head {
            check_template(head, BUILD_PLACEHOLDERS)?;
        }

        let variants = &test.variants;
        if !variants.ids.is_empty() && variants.command.is_empty() {
            return Err(RecipeError::invalid("variants declared without a command"));
        }
        check_template(&variants.command, VARIANT_PLACEHOLDERS)?;
        for arg in &variants.args {
            check_template(arg, VARIANT_PLACEHOLDERS)?;
        }
        let mut seen = HashSet::new();
        for id in &variants.ids {
            if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c == '/') {
                return Err(RecipeError::invalid(format!("invalid variant id '{}'", id)));
            }
            if !seen.insert(id.as_str()) {
                return Err(RecipeError::invalid(format!("duplicate variant id '{}'", id)));
            }
        }

        let mut resources = HashSet::new();
        for resource in &test.resources {
            let name = &resource.name;
            if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
                return Err(RecipeError::invalid(format!("invalid resource name '{}'", name)));
            }
            if !resources.insert(resource.name.as_str()) {
                return Err(RecipeError::invalid(format!(
                    "duplicate resource '{}'",
                    resource.name
                )));
            }
            validate_url(&resource.name, &resource.url)?;
            validate_digest(&resource.name, &resource.sha256)?;
        }

        for check in &test.checks {
            if let Some(name) = &check.resource {
                if !resources.contains(name.as_str()) {
                    return Err(RecipeError::invalid(format!(
                        "check '{}' uses unknown resource '{}'",
                        check.name, name
                    )));
                }
            }
            if check.expect.is_empty() {
                return Err(RecipeError::invalid(format!(
                    "check '{}' has no expectations",
                    check.name
                )));
            }
            check_template(&check.command, CHECK_PLACEHOLDERS)?;
            for arg in check.args.iter().chain(&check.expect) {
                check_template(arg, CHECK_PLACEHOLDERS)?;
            }
        }

        Ok(())
    }

    /// Every string expanded at build time.
    fn build_templates(&self) -> impl Iterator<Item = &String> {
        let configure = &self.configure;
        configure
            .args
            .iter()
            .chain(configure.exclusive.iter().flat_map(|s| s.branches.iter().flat_map(|b| &b.args)))
            .chain(configure.fragments.iter().flat_map(|f| &f.args))
            .chain(self.env.values())
            .chain(
                self.steps
                    .iter()
                    .flat_map(|s| std::iter::once(&s.command).chain(&s.args)),
            )
    }

    /// All declared dependencies, flattened in declaration order.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.dependencies.iter().flat_map(|g| g.expand()).collect()
    }

    /// Dependencies that apply to a context.
    pub fn dependencies_for(&self, ctx: &PlatformContext) -> Vec<Dependency> {
        self.dependencies()
            .into_iter()
            .filter(|d| d.applies_to(ctx))
            .collect()
    }

    /// The first toolchain exclusion matching `ctx`, as an error.
    pub fn check_toolchain(&self, ctx: &PlatformContext) -> Result<(), RecipeError> {
        match self.fails_with.iter().find(|f| f.condition().eval(ctx)) {
            Some(exclusion) => Err(RecipeError::rejected(exclusion.describe(), ctx.to_string())),
            None => Ok(()),
        }
    }

    /// Every condition the recipe declares, for branch coverage checks.
    pub fn conditions(&self) -> Vec<&PlatformCondition> {
        let configure = &self.configure;
        configure
            .exclusive
            .iter()
            .flat_map(|s| s.branches.iter().map(|b| &b.when))
            .chain(configure.fragments.iter().map(|f| &f.when))
            .chain(self.dependencies.iter().filter_map(|g| g.when.as_ref()))
            .chain(self.test.checks.iter().map(|c| &c.when))
            .collect()
    }

    /// The expectation template for release or head builds.
    pub fn expectation(&self, head: bool) -> &str {
        match (&self.test.expect_head, head) {
            (Some(h), true) => h,
            _ => &self.test.expect,
        }
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.test.resources.iter().find(|r| r.name == name)
    }
}

fn check_template(s: &str, allowed: &[&str]) -> Result<(), RecipeError> {
    template::check(s, allowed).map_err(|e| RecipeError::invalid(e.to_string()))
}

fn validate_url(what: &str, url: &str) -> Result<(), RecipeError> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| RecipeError::invalid(format!("invalid URL '{}' for {}: {}", url, what, e)))
}

fn validate_digest(what: &str, digest: &str) -> Result<(), RecipeError> {
    if !is_sha256_hex(digest) {
        return Err(RecipeError::invalid(format!(
            "sha256 for {} must be a 64-character hex string, got '{}'",
            what, digest
        )));
    }
    Ok(())
}

/// Validate a package name.
fn validate_package_name(name: &str) -> Result<(), RecipeError> {
    if name.is_empty() {
        return Err(RecipeError::invalid("package name cannot be empty"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(RecipeError::invalid(format!(
            "package name '{}' must contain only lowercase letters, digits, '_' or '-'",
            name
        )));
    }

    if name.starts_with('-') || name.starts_with('_') {
        return Err(RecipeError::invalid(format!(
            "package name '{}' must start with a letter or digit",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::coverage;
    use crate::core::dependency::DependencyPhase;
    use crate::core::platform::HostOs;
    use crate::test_support::{context as ctx, minimal_recipe_toml, qemu_recipe};

    fn parse(content: &str) -> Result<Recipe> {
        Recipe::parse(content, Path::new("test.toml"))
    }

    #[test]
    fn test_parse_minimal_recipe() {
        let recipe = parse(&minimal_recipe_toml()).unwrap();
        assert_eq!(recipe.package.name, "hello");
        assert_eq!(recipe.steps.len(), 3);
        assert_eq!(recipe.steps[0].command, "./configure");
        assert!(recipe.steps[0].plan_args);
        assert_eq!(recipe.expectation(false), "{version}");
    }

    #[test]
    fn test_qemu_recipe_shape() {
        let recipe = qemu_recipe();
        assert_eq!(recipe.package.version, "9.0.2");
        assert_eq!(recipe.test.variants.ids.len(), 29);
        assert_eq!(recipe.configure.exclusive.len(), 1);
        assert_eq!(recipe.configure.exclusive[0].branches.len(), 2);
        assert_eq!(recipe.env.get("LIBTOOL").map(String::as_str), Some("glibtool"));
        assert_eq!(recipe.expectation(true), "QEMU Project");
        assert_eq!(recipe.test.checks.len(), 2);

        let image = recipe.resource("test-image").unwrap();
        assert_eq!(image.archive_kind(), ArchiveKind::Zip);
        assert_eq!(image.file_name(), "FD12FLOPPY.zip");
    }

    #[test]
    fn test_qemu_dependencies_per_platform() {
        let recipe = qemu_recipe();

        let linux = recipe.dependencies_for(&ctx(HostOs::Linux, "gcc@13"));
        let mac = recipe.dependencies_for(&ctx(HostOs::Macos, "apple-clang@15"));

        assert!(linux.iter().any(|d| d.name == "systemd"));
        assert!(linux.iter().any(|d| d.name == "flex" && d.phase == DependencyPhase::Build));
        assert!(!mac.iter().any(|d| d.name == "systemd"));
        assert!(!mac.iter().any(|d| d.name == "zlib"));
        assert!(mac.iter().any(|d| d.name == "pixman"));
    }

    #[test]
    fn test_toolchain_exclusion() {
        let recipe = qemu_recipe();

        let err = recipe
            .check_toolchain(&ctx(HostOs::Macos, "gcc@5"))
            .unwrap_err();
        assert!(matches!(err, RecipeError::ConfigurationRejected { .. }));
        assert!(err.to_string().contains("gcc 5"));

        assert!(recipe.check_toolchain(&ctx(HostOs::Macos, "gcc@13")).is_ok());
        assert!(recipe.check_toolchain(&ctx(HostOs::Linux, "clang@5")).is_ok());
    }

    #[test]
    fn test_rejects_bad_package_name() {
        let content = minimal_recipe_toml().replace("name = \"hello\"", "name = \"Hello\"");
        let err = parse(&content).unwrap_err();
        assert!(format!("{:#}", err).contains("lowercase"));
    }

    #[test]
    fn test_rejects_bad_digest() {
        let content = minimal_recipe_toml().replace(&"0".repeat(64), "abc123");
        let err = parse(&content).unwrap_err();
        assert!(format!("{:#}", err).contains("64-character hex"));
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let content = minimal_recipe_toml().replace("--prefix={prefix}", "--prefix={prefx}");
        let err = parse(&content).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown placeholder `{prefx}`"));
    }

    #[test]
    fn test_rejects_variant_placeholder_in_build() {
        let content = minimal_recipe_toml().replace("--prefix={prefix}", "--arch={variant}");
        assert!(parse(&content).is_err());
    }

    #[test]
    fn test_rejects_single_branch_exclusive_set() {
        let content = format!(
            "{}\n[[configure.exclusive]]\nname = \"ui\"\n\n[[configure.exclusive.branches]]\nwhen = {{ os = \"macos\" }}\nargs = [\"--enable-cocoa\"]\n",
            minimal_recipe_toml()
        );
        let err = parse(&content).unwrap_err();
        assert!(format!("{:#}", err).contains("at least two branches"));
    }

    #[test]
    fn test_rejects_check_with_unknown_resource() {
        let content = format!(
            "{}\n[[test.checks]]\nname = \"img\"\nkind = \"artifact\"\nresource = \"missing\"\ncommand = \"{{bin}}/img\"\nexpect = [\"ok\"]\n",
            minimal_recipe_toml()
        );
        let err = parse(&content).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown resource 'missing'"));
    }

    #[test]
    fn test_rejects_resource_name_outside_workspace() {
        for name in ["../../tmp/evil", "a/b", "..", ""] {
            let content = format!(
                "{}\n[[test.resources]]\nname = \"{}\"\nurl = \"https://example.com/img.zip\"\nsha256 = \"{}\"\n",
                minimal_recipe_toml(),
                name,
                "0".repeat(64)
            );
            let err = parse(&content).unwrap_err();
            assert!(format!("{:#}", err).contains("invalid resource name"), "{}", name);
        }
    }

    #[test]
    fn test_archive_kind_inference() {
        let mut resource = ResourceDescriptor {
            name: "fixture".to_string(),
            url: "https://example.com/fixtures/data.tar.gz?download=1".to_string(),
            sha256: "0".repeat(64),
            archive: None,
            strip_prefix: None,
        };
        assert_eq!(resource.archive_kind(), ArchiveKind::TarGz);
        assert_eq!(resource.file_name(), "data.tar.gz");

        resource.url = "https://example.com/disk.img".to_string();
        assert_eq!(resource.archive_kind(), ArchiveKind::Raw);

        resource.archive = Some(ArchiveKind::Zip);
        assert_eq!(resource.archive_kind(), ArchiveKind::Zip);
    }

    #[test]
    fn test_conditions_enumerates_every_branch() {
        let recipe = qemu_recipe();
        let conditions = recipe.conditions();
        assert!(conditions.contains(&&PlatformCondition::os(HostOs::Macos)));
        assert!(conditions.contains(&&PlatformCondition::os(HostOs::Linux)));
    }

    #[test]
    fn test_every_condition_reachable_across_host_families() {
        let recipe = qemu_recipe();
        let contexts: Vec<PlatformContext> =
            HostOs::ALL.iter().map(|os| ctx(*os, "gcc@13")).collect();
        let cov = coverage(recipe.conditions(), &contexts);
        assert!(cov.is_complete(), "unreachable conditions: {:?}", cov.missed);

        let linux_only = coverage(recipe.conditions(), &contexts[1..2]);
        assert!(!linux_only.is_complete());
        assert!(linux_only.missed.contains(&PlatformCondition::os(HostOs::Macos)));
    }
}
