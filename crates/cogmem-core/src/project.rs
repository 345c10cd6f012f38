//! Project id derivation and vector-collection naming.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Maps any character outside `[A-Za-z0-9_]` to `_`.
pub fn sanitize_repo_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Derives `<sanitized_repo_name>_<8-hex-chars>` from a repository's absolute
/// path. The hash covers the full path so that two repos with the same
/// leaf directory name never collide.
pub fn derive_project_id(repo_path: &Path) -> String {
    let repo_name = repo_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    let sanitized = sanitize_repo_name(&repo_name);

    let mut hasher = Sha256::new();
    hasher.update(repo_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    format!("{sanitized}_{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_special_characters() {
        assert_eq!(sanitize_repo_name("my-repo.git"), "my_repo_git");
    }

    #[test]
    fn same_path_yields_same_id() {
        let p = Path::new("/home/user/projects/my-repo");
        assert_eq!(derive_project_id(p), derive_project_id(p));
    }

    #[test]
    fn distinct_paths_with_same_leaf_name_dont_collide() {
        let a = derive_project_id(Path::new("/home/alice/my_concepts"));
        let b = derive_project_id(Path::new("/home/bob/my_concepts"));
        assert_ne!(a, b);
    }
}
