//! Ensures every workspace crate inherits the workspace version, so the
//! `jipcy --version` output and `jipcy_core::VERSION` never drift apart.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let text = std::fs::read_to_string(path.join("Cargo.toml"))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    text.parse().unwrap()
}

#[test]
fn all_members_use_workspace_version() {
    let root = workspace_root();
    let members = manifest(&root)["workspace"]["members"]
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(members.len(), 3);

    for member in members {
        let member = member.as_str().unwrap();
        let doc = manifest(&root.join(member));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool());
        assert_eq!(
            inherits,
            Some(true),
            "{} should use version.workspace = true",
            member
        );
    }
}

#[test]
fn workspace_version_matches_crate_constant() {
    let root = manifest(&workspace_root());
    let version = root["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, jipcy_core::VERSION);
}
