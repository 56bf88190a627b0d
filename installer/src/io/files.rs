//! Writes emitted file blocks beneath a root directory.

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, instrument};

use crate::core::files::FileBlock;
use crate::io::atomic::write_atomic;

/// Resolve `relative` under `root`, refusing absolute paths and `..`.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    let mut out = root.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("refusing path with '..': {relative}"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("refusing absolute path: {relative}")
            }
        }
    }
    if out == root {
        bail!("empty file path: {relative:?}");
    }
    Ok(out)
}

/// Write every block; later blocks for the same path overwrite earlier ones.
///
/// Returns the written paths in order. Paths are validated before anything
/// is written.
#[instrument(skip_all, fields(root = %root.display(), blocks = blocks.len()))]
pub fn write_file_blocks(root: &Path, blocks: &[FileBlock]) -> Result<Vec<PathBuf>> {
    let targets = blocks
        .iter()
        .map(|block| safe_join(root, &block.path))
        .collect::<Result<Vec<_>>>()?;
    for (target, block) in targets.iter().zip(blocks) {
        write_atomic(target, block.body.as_bytes())?;
        debug!(path = %target.display(), bytes = block.body.len(), "wrote file block");
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn block(path: &str, body: &str) -> FileBlock {
        FileBlock {
            path: path.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn writes_nested_files_last_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let written = write_file_blocks(
            temp.path(),
            &[
                block("src/app.ts", "one"),
                block("./src/app.ts", "two"),
                block("README.md", "readme"),
            ],
        )
        .expect("write");
        assert_eq!(written.len(), 3);
        assert_eq!(
            fs::read_to_string(temp.path().join("src/app.ts")).expect("read"),
            "two"
        );
    }

    #[test]
    fn refuses_escaping_paths_before_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = write_file_blocks(
            temp.path(),
            &[block("ok.txt", "x"), block("../evil.txt", "y")],
        )
        .expect_err("escape");
        assert!(err.to_string().contains(".."));
        assert!(!temp.path().join("ok.txt").exists());
        assert!(safe_join(temp.path(), "/etc/passwd").is_err());
    }
}
