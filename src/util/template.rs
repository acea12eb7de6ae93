//! `{name}` placeholder expansion for recipe strings.
//!
//! `{{` and `}}` produce literal braces.

use std::collections::BTreeMap;

use thiserror::Error;

/// Error expanding or scanning a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{name}}}` in `{template}`")]
    Unknown { name: String, template: String },

    #[error("unterminated placeholder in `{template}`")]
    Unterminated { template: String },
}

/// Placeholder values, keyed by name.
pub type Vars = BTreeMap<&'static str, String>;

enum Piece<'a> {
    Literal(&'a str),
    Var(&'a str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        let (head, tail) = rest.split_at(pos);
        if !head.is_empty() {
            pieces.push(Piece::Literal(head));
        }

        if tail.starts_with("{{") {
            pieces.push(Piece::Literal("{"));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            pieces.push(Piece::Literal("}"));
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            let end = tail.find('}').ok_or_else(|| TemplateError::Unterminated {
                template: template.to_string(),
            })?;
            pieces.push(Piece::Var(&tail[1..end]));
            rest = &tail[end + 1..];
        } else {
            // A lone closing brace is kept as-is.
            pieces.push(Piece::Literal("}"));
            rest = &tail[1..];
        }
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// Names of every placeholder used in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<&str>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|p| match p {
            Piece::Var(name) => Some(name),
            Piece::Literal(_) => None,
        })
        .collect())
}

/// Check that `template` only uses placeholders from `allowed`.
pub fn check(template: &str, allowed: &[&str]) -> Result<(), TemplateError> {
    for name in placeholders(template)? {
        if !allowed.contains(&name) {
            return Err(TemplateError::Unknown {
                name: name.to_string(),
                template: template.to_string(),
            });
        }
    }
    Ok(())
}

/// Substitute every placeholder in `template` from `vars`.
pub fn expand(template: &str, vars: &Vars) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Var(name) => match vars.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(TemplateError::Unknown {
                        name: name.to_string(),
                        template: template.to_string(),
                    })
                }
            },
        }
    }
    Ok(out)
}

/// Expand every template in a list, preserving order.
pub fn expand_all<'a>(
    templates: impl IntoIterator<Item = &'a String>,
    vars: &Vars,
) -> Result<Vec<String>, TemplateError> {
    templates.into_iter().map(|t| expand(t, vars)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut v = Vars::new();
        v.insert("prefix", "/opt/qemu".to_string());
        v.insert("variant", "x86_64".to_string());
        v
    }

    #[test]
    fn test_expand() {
        assert_eq!(
            expand("--prefix={prefix}", &vars()).unwrap(),
            "--prefix=/opt/qemu"
        );
        assert_eq!(
            expand("{prefix}/bin/qemu-system-{variant}", &vars()).unwrap(),
            "/opt/qemu/bin/qemu-system-x86_64"
        );
        assert_eq!(
            expand("--extra-cflags=-DNCURSES_WIDECHAR=1", &vars()).unwrap(),
            "--extra-cflags=-DNCURSES_WIDECHAR=1"
        );
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(expand("{{literal}}", &vars()).unwrap(), "{literal}");
        assert!(placeholders("{{literal}}").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_and_unterminated() {
        assert!(matches!(
            expand("{nope}", &vars()),
            Err(TemplateError::Unknown { .. })
        ));
        assert!(matches!(
            placeholders("--prefix={prefix"),
            Err(TemplateError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_check_allowed() {
        assert!(check("{prefix}/bin", &["prefix"]).is_ok());
        let err = check("{bin}/qemu-{variant}", &["bin"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown placeholder `{variant}` in `{bin}/qemu-{variant}`"
        );
    }
}
