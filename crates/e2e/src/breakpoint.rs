//! Operator breakpoint for debugging a scenario by hand

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Saves the cursor and prints the prompt in yellow
pub const PROMPT: &str =
    "\x1b[s    \x1b[93m[Breakpoint] Press \x1b[1;93m[RETURN]\x1b[0;93m to continue...\x1b[0m";

/// Restores the cursor saved by [`PROMPT`]
pub const RESTORE_CURSOR: &str = "\x1b[u";

/// Print the prompt and block until the operator sends a line.
///
/// End of input also resumes.
pub async fn wait_for_operator<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(PROMPT.as_bytes()).await?;
    writer.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    debug!("Breakpoint released");

    writer.write_all(RESTORE_CURSOR.as_bytes()).await?;
    writer.flush().await
}

/// Breakpoint on the process's own terminal
pub async fn wait_on_terminal() -> std::io::Result<()> {
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    wait_for_operator(&mut stdin, &mut stdout).await
}
