use std::path::{Path, PathBuf};

use lockbot_core::config::lockbot_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    lockbot_root(home).join(DAEMON_SOCKET)
}
