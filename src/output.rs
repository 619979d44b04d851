//! Sinks for recognized text: local files and the system clipboard.

use tokio::fs;

use crate::prelude::*;

/// Default file name for saved text, when no explicit path is given.
pub const DEFAULT_SAVE_NAME: &str = "recognized_text.txt";

/// Write recognized text to a local file.
pub async fn save_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text)
        .await
        .with_context(|| format!("failed to write recognized text to {:?}", path))
}

/// Copy recognized text to the system clipboard, verbatim.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().context("failed to open the system clipboard")?;
    clipboard
        .set_text(text.to_owned())
        .context("failed to copy text to the clipboard")
}
