//! Subprocess invocation and artifact timestamp helpers.

use crate::vars::EnvPair;
use camino::Utf8Path;
use std::{
    io,
    process::{Command, ExitStatus},
    time::SystemTime,
};
use tracing::debug;

/// Hand an expanded recipe line to the shell interpreter.
///
/// The command string is passed verbatim to `shell -c`; the executor owns
/// only exit-status inspection. stdout and stderr are inherited so tool
/// output streams straight through. The overlay is applied on top of the
/// inherited environment, and the working directory is pinned to the
/// invocation root.
///
/// # Errors
///
/// Returns an [`io::Error`] if the shell process fails to spawn.
pub(crate) fn run_shell(
    shell: &str,
    command: &str,
    root: &Utf8Path,
    overlay: &[EnvPair],
) -> io::Result<ExitStatus> {
    debug!(shell, command, root = %root, "spawning recipe line");
    Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(root.as_std_path())
        .envs(overlay.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
}

/// The modification time of the artifact at `root/name`, or `None` when it
/// does not exist (or its metadata is unreadable, which for staleness
/// purposes is the same thing).
pub(crate) fn artifact_mtime(root: &Utf8Path, name: &str) -> Option<SystemTime> {
    root.join(name)
        .as_std_path()
        .metadata()
        .and_then(|meta| meta.modified())
        .ok()
}
