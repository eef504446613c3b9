use std::path::{Path, PathBuf};

/// Centralized helpers for files kept under the client state directory.

#[inline]
pub fn credential_file(state_dir: &Path) -> PathBuf { state_dir.join("credential") }

/// Scratch file written first and renamed over `credential_file`.
#[inline]
pub fn credential_tmp_file(state_dir: &Path) -> PathBuf { state_dir.join("credential.tmp") }
