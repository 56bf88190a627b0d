//! Fenced code block detection over streamed text.

/// Opening and closing delimiter of a fenced block.
pub const FENCE: &str = "```";

/// A fenced block found in the text.
///
/// `body` excludes the fence lines. An unclosed block (still streaming, or a
/// model that never closed it) runs to the end of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Info string after the opening fence (`json`, `rust`, ...), trimmed.
    pub info: &'a str,
    pub body: &'a str,
    pub closed: bool,
}

impl<'a> FencedBlock<'a> {
    /// Destination path named by a `// <path>` comment on the first body line.
    ///
    /// Only a complete first line counts, so a path that is still streaming is
    /// never reported.
    pub fn path(&self) -> Option<&'a str> {
        let newline = self.body.find('\n')?;
        parse_path_comment(&self.body[..newline])
    }

    /// Body with the path comment line removed.
    pub fn content(&self) -> &'a str {
        match (self.path(), self.body.find('\n')) {
            (Some(_), Some(newline)) => &self.body[newline + 1..],
            _ => self.body,
        }
    }
}

/// All fenced blocks in order of appearance.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut open: Option<(&str, usize)> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_start();
        if !trimmed.starts_with(FENCE) {
            continue;
        }
        match open.take() {
            None => {
                let info = trimmed[FENCE.len()..].trim();
                open = Some((info, offset));
            }
            Some((info, body_start)) => blocks.push(FencedBlock {
                info,
                body: &text[body_start..line_start],
                closed: true,
            }),
        }
    }

    if let Some((info, body_start)) = open {
        blocks.push(FencedBlock {
            info,
            body: &text[body_start.min(text.len())..],
            closed: false,
        });
    }

    blocks
}

fn parse_path_comment(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("//")?;
    let path = rest.trim();
    if path.is_empty() || path.contains(char::is_whitespace) {
        return None;
    }
    if !(path.contains('/') || path.contains('.')) {
        return None;
    }
    Some(path)
}
