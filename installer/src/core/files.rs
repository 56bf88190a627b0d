//! File blocks emitted in file-emission messages.

use serde::Serialize;

use crate::core::fence::fenced_blocks;

/// A destination path and the content to write there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBlock {
    pub path: String,
    pub body: String,
}

/// Every path-annotated fenced block, in order of appearance.
///
/// Blocks are returned as emitted; when a path repeats, the later block is the
/// one that ends up on disk.
pub fn extract_file_blocks(text: &str) -> Vec<FileBlock> {
    fenced_blocks(text)
        .into_iter()
        .filter_map(|block| {
            let path = block.path()?;
            Some(FileBlock {
                path: path.to_string(),
                body: block.content().to_string(),
            })
        })
        .collect()
}
