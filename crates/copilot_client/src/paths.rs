use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

/// Application data directory (~/.local/share/copilot-api)
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".local")
        .join("share")
        .join("copilot-api")
}

pub fn github_token_path(app_dir: &Path) -> PathBuf {
    app_dir.join("github_token")
}

/// Creates the app directory and an empty token file, keeping it owner-only.
pub fn ensure_paths(app_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(app_dir)?;
    let token_path = github_token_path(app_dir);
    if !token_path.exists() {
        fs::write(&token_path, "")?;
    }
    restrict_permissions(&token_path)
}

#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}
