//! `git_*` tools: map arguments onto a `VcsOperation`.

use forgeloop_core::error::ToolError;
use forgeloop_core::vcs::{VcsOperation, VersionControl};

use crate::args::Args;
use crate::kind::ToolKind;

const DEFAULT_LOG_LIMIT: usize = 10;

/// Build the operation a `git_*` tool call asks for.
pub fn operation(kind: ToolKind, args: &Args) -> Result<VcsOperation, ToolError> {
    let op = match kind {
        ToolKind::GitStatus => VcsOperation::Status,
        ToolKind::GitStage => VcsOperation::Stage {
            paths: args.str_list("paths"),
        },
        ToolKind::GitCommit => {
            let message = args.str("message")?.trim();
            if message.is_empty() {
                return Err(ToolError::execution(kind.name(), "commit message is empty"));
            }
            VcsOperation::Commit {
                message: message.to_string(),
            }
        }
        ToolKind::GitPush => VcsOperation::Push,
        ToolKind::GitPull => VcsOperation::Pull,
        ToolKind::GitBranch => VcsOperation::Branch {
            name: args
                .opt_str("name")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        },
        ToolKind::GitCheckout => VcsOperation::Checkout {
            branch: args.str("branch")?.trim().to_string(),
            create: args.bool_or("create", false),
        },
        ToolKind::GitLog => VcsOperation::Log {
            limit: args.usize_or("limit", DEFAULT_LOG_LIMIT).clamp(1, 200),
        },
        ToolKind::GitDiff => VcsOperation::Diff {
            path: args.opt_str("path").map(str::to_string),
            staged: args.bool_or("staged", false),
        },
        ToolKind::GitDiscard => VcsOperation::Discard {
            path: args.str("path")?.to_string(),
        },
        other => return Err(ToolError::UnknownTool(other.name().to_string())),
    };
    if let VcsOperation::Checkout { branch, .. } | VcsOperation::Branch { name: Some(branch) } = &op
        && branch.starts_with('-')
    {
        return Err(ToolError::execution(
            kind.name(),
            format!("invalid branch name '{branch}'"),
        ));
    }
    Ok(op)
}

pub async fn execute(
    kind: ToolKind,
    vcs: &dyn VersionControl,
    args: &Args,
) -> Result<String, ToolError> {
    let op = operation(kind, args)?;
    vcs.run(op)
        .await
        .map_err(|e| ToolError::execution(kind.name(), e))
}
