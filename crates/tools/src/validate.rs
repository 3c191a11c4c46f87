//! Schema validation for built-in tool arguments.

use forgeloop_core::error::ToolError;
use forgeloop_security::WorkspaceSandbox;
use serde_json::Value;

use crate::args::{Args, as_bool, as_str_list, as_u64};
use crate::kind::{ArgType, ToolKind};

/// Check `args` against the declared specs of `kind`.
///
/// Every violation is collected so the model can fix all of them in one
/// retry.
pub fn validate(kind: ToolKind, args: &Args, sandbox: &WorkspaceSandbox) -> Result<(), ToolError> {
    let mut violations = Vec::new();

    for spec in kind.args() {
        let Some(value) = args.get(spec.name) else {
            if spec.required {
                violations.push(format!("missing required argument '{}'", spec.name));
            }
            continue;
        };

        let paths = match spec.ty {
            ArgType::String => match value {
                Value::String(s) => vec![s.clone()],
                _ => {
                    violations.push(format!("'{}' must be a string", spec.name));
                    continue;
                }
            },
            ArgType::Integer => {
                if as_u64(value).is_none() {
                    violations.push(format!("'{}' must be a non-negative integer", spec.name));
                }
                continue;
            }
            ArgType::Bool => {
                if as_bool(value).is_none() {
                    violations.push(format!("'{}' must be a boolean", spec.name));
                }
                continue;
            }
            ArgType::StringList => match as_str_list(value) {
                Some(list) if spec.required && list.is_empty() => {
                    violations.push(format!("'{}' must not be empty", spec.name));
                    continue;
                }
                Some(list) => list,
                None => {
                    violations.push(format!("'{}' must be a list of strings", spec.name));
                    continue;
                }
            },
        };

        if spec.is_path {
            for path in &paths {
                for problem in sandbox.check(path) {
                    violations.push(format!("'{}': {problem}", spec.name));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Validation(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sandbox() -> WorkspaceSandbox {
        WorkspaceSandbox::new("/tmp/project", &[".git".to_string(), ".env".to_string()])
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = Args::from_value(json!({"path": "src/main.rs", "content": "fn main() {}"}));
        assert!(validate(ToolKind::WriteFile, &args, &sandbox()).is_ok());
    }

    #[test]
    fn reports_all_violations_together() {
        let args = Args::from_value(json!({"path": "../etc/passwd", "content": 42}));
        let err = validate(ToolKind::WriteFile, &args, &sandbox()).unwrap_err();
        let ToolError::Validation(violations) = &err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(violations.len(), 2);
        assert!(err.to_string().starts_with("invalid arguments: "));
        assert!(err.to_string().contains("; "));
    }

    #[test]
    fn missing_required_keys() {
        let err = validate(ToolKind::SearchReplace, &Args::default(), &sandbox()).unwrap_err();
        let ToolError::Validation(violations) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            violations,
            vec![
                "missing required argument 'path'",
                "missing required argument 'search'",
                "missing required argument 'replace'",
            ]
        );
    }

    #[test]
    fn forbidden_and_absolute_paths_rejected() {
        for path in [".git/config", ".env", "/etc/hosts"] {
            let args = Args::from_value(json!({ "path": path }));
            assert!(
                validate(ToolKind::ReadFile, &args, &sandbox()).is_err(),
                "{path}"
            );
        }
    }

    #[test]
    fn list_paths_checked_individually() {
        let ok = Args::from_value(json!({"paths": ["src", "Cargo.toml"]}));
        assert!(validate(ToolKind::GitStage, &ok, &sandbox()).is_ok());

        let bad = Args::from_value(json!({"paths": ["src", "../secret"]}));
        assert!(validate(ToolKind::GitStage, &bad, &sandbox()).is_err());

        let empty = Args::from_value(json!({"paths": []}));
        assert!(validate(ToolKind::GitStage, &empty, &sandbox()).is_err());
    }

    #[test]
    fn lenient_scalar_types() {
        let args = Args::from_value(json!({"id": "3", "status": "done"}));
        assert!(validate(ToolKind::UpdateTodo, &args, &sandbox()).is_ok());

        let args = Args::from_value(json!({"id": "three"}));
        assert!(validate(ToolKind::UpdateTodo, &args, &sandbox()).is_err());
    }
}
