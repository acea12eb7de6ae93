//! Output formatting for run reports (human/JSON/GitHub).

use std::fmt::Write as _;

use super::types::OutputFormat;
use crate::ops::slipway_run::RunReport;

/// Format a run report for display (human-readable).
pub fn format_report(report: &RunReport, verbose: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Run: {} v{} ({})",
        report.package, report.version, report.platform
    );
    let _ = writeln!(output, "{}", "=".repeat(50));
    let _ = writeln!(output);

    if let Some(build) = &report.build {
        for step in &build.steps {
            let _ = writeln!(output, "  [OK] {} ({:.2?})", step.name, step.duration);
            if verbose {
                let _ = writeln!(output, "      {}", step.command);
            }
        }
        let _ = writeln!(output);
    }

    if let Some(verification) = &report.verification {
        let _ = writeln!(
            output,
            "Variants: {}/{} passed",
            verification.passed_count(),
            verification.total()
        );
        for variant in verification.variants.values() {
            if variant.passed && !verbose {
                continue;
            }
            let status = if variant.passed { "[OK]" } else { "[FAIL]" };
            let _ = writeln!(output, "  {} {} ({:.2?})", status, variant.id, variant.duration);
            if let Some(message) = &variant.message {
                let _ = writeln!(output, "      {}", message);
            }
            if !variant.passed {
                for line in variant.output.lines().take(5) {
                    let _ = writeln!(output, "      > {}", line);
                }
            }
        }

        if !verification.checks.is_empty() || !verification.skipped.is_empty() {
            let _ = writeln!(output, "\nChecks:");
            for check in &verification.checks {
                let status = if check.passed { "[OK]" } else { "[FAIL]" };
                let _ = writeln!(output, "  {} {} ({:?})", status, check.name, check.kind);
                if let Some(message) = &check.message {
                    let _ = writeln!(output, "      {}", message);
                }
            }
            for name in &verification.skipped {
                let _ = writeln!(output, "  [SKIP] {}", name);
            }
        }

        for error in &verification.staging_errors {
            let _ = writeln!(output, "\n  Warning: {}", error);
        }
        let _ = writeln!(output);
    }

    let status = if report.passed { "PASSED" } else { "FAILED" };
    let _ = writeln!(output, "Result: {}", status);
    let _ = writeln!(output, "Total time: {:.2?}", report.total_duration);

    output
}

/// Format a run report as JSON.
pub fn format_report_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
}

/// Format a run report for GitHub Actions: `::error::` annotations for
/// each failure followed by a markdown job summary.
pub fn format_report_github_actions(report: &RunReport, recipe_path: Option<&str>) -> String {
    let mut output = String::new();
    let file_ref = recipe_path
        .map(|p| format!("file={},", p))
        .unwrap_or_default();

    if let Some(verification) = &report.verification {
        for variant in verification.variants.values().filter(|v| !v.passed) {
            let message = variant.message.as_deref().unwrap_or("failed");
            let _ = writeln!(
                output,
                "::error {}title=variant {}::{}",
                file_ref,
                variant.id,
                escape(message)
            );
        }
        for check in verification.checks.iter().filter(|c| !c.passed) {
            let message = check.message.as_deref().unwrap_or("failed");
            let _ = writeln!(
                output,
                "::error {}title=check {}::{}",
                file_ref,
                check.name,
                escape(message)
            );
        }
        for error in &verification.staging_errors {
            let _ = writeln!(
                output,
                "::warning {}title=staging::{}",
                file_ref,
                escape(&error.to_string())
            );
        }
    }

    let _ = writeln!(output, "::group::Run Summary");
    let _ = writeln!(output);
    let _ = writeln!(output, "## {} v{}", report.package, report.version);
    let _ = writeln!(output);
    let _ = writeln!(output, "**Platform:** {}", report.platform);
    if let Some(fingerprint) = &report.fingerprint {
        let _ = writeln!(output, "**Plan:** `{}`", &fingerprint[..fingerprint.len().min(16)]);
    }
    let _ = writeln!(output);

    if let Some(verification) = &report.verification {
        let _ = writeln!(output, "| Variant | Status | Duration |");
        let _ = writeln!(output, "|---------|--------|----------|");
        for variant in verification.variants.values() {
            let status = if variant.passed {
                ":white_check_mark:"
            } else {
                ":x:"
            };
            let _ = writeln!(
                output,
                "| {} | {} | {:.2?} |",
                variant.id, status, variant.duration
            );
        }
        let _ = writeln!(output);

        let failing: Vec<_> = verification.variants.values().filter(|v| !v.passed).collect();
        if !failing.is_empty() {
            let _ = writeln!(output, "### Failed Variants");
            for variant in failing {
                let _ = writeln!(output);
                let _ = writeln!(output, "<details>");
                let _ = writeln!(output, "<summary>{}</summary>", variant.id);
                let _ = writeln!(output);
                let _ = writeln!(output, "```");
                let _ = writeln!(output, "{}", variant.output.trim_end());
                let _ = writeln!(output, "```");
                let _ = writeln!(output);
                let _ = writeln!(output, "</details>");
            }
            let _ = writeln!(output);
        }
    }

    let (emoji, status) = if report.passed {
        (":heavy_check_mark:", "PASSED")
    } else {
        (":x:", "FAILED")
    };
    let _ = writeln!(output, "**Result:** {} {}", emoji, status);
    let _ = writeln!(output, "**Total time:** {:.2?}", report.total_duration);
    let _ = writeln!(output, "::endgroup::");

    output
}

/// Escape newlines for the GitHub Actions annotation format.
fn escape(message: &str) -> String {
    message.replace('\r', "").replace('\n', "%0A")
}

/// Format the report according to the requested output format.
pub fn format_report_for_output(
    report: &RunReport,
    format: OutputFormat,
    verbose: bool,
    recipe_path: Option<&str>,
) -> String {
    match format {
        OutputFormat::Human => format_report(report, verbose),
        OutputFormat::Json => format_report_json(report),
        OutputFormat::Github => format_report_github_actions(report, recipe_path),
    }
}
