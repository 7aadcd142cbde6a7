use std::time::Duration;

use log::{info, warn};

use crate::config::FALLBACK_VSCODE_VERSION;
use crate::context::CopilotContext;

const AUR_PKGBUILD_URL: &str =
    "https://aur.archlinux.org/cgit/aur.git/plain/PKGBUILD?h=visual-studio-code-bin";

/// First non-empty `pkgver=` value of a PKGBUILD.
pub fn parse_pkgver(pkgbuild: &str) -> Option<String> {
    pkgbuild
        .lines()
        .filter_map(|line| line.strip_prefix("pkgver="))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Latest VSCode release according to the AUR package, or the pinned fallback.
pub async fn get_vscode_version(context: &CopilotContext) -> String {
    get_vscode_version_from(context, AUR_PKGBUILD_URL).await
}

async fn get_vscode_version_from(context: &CopilotContext, url: &str) -> String {
    let response = context
        .http_client()
        .get(url)
        .timeout(Duration::from_secs(20))
        .send()
        .await;

    let pkgbuild = match response {
        Ok(response) if response.status().is_success() => response.text().await.ok(),
        Ok(response) => {
            warn!("VSCode version lookup returned {}", response.status());
            None
        }
        Err(e) => {
            warn!("VSCode version lookup failed: {e}");
            None
        }
    };

    pkgbuild
        .as_deref()
        .and_then(parse_pkgver)
        .unwrap_or_else(|| FALLBACK_VSCODE_VERSION.to_string())
}

/// Resolves the version once and stores it in the context for header building.
pub async fn cache_vscode_version(context: &CopilotContext) {
    let version = get_vscode_version(context).await;
    info!("Using VSCode version: {version}");
    context.set_vscode_version(version).await;
}
