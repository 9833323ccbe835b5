//! Provider selection from the configuration.

use prlab_core::config::{Config, ProviderKind};
use prlab_core::{Error, PullRequestsManager, Result};
use prlab_github::GitHubManager;
use prlab_gitlab::GitLabManager;
use tracing::debug;

/// Build the manager of the configured provider.
pub fn build_manager(config: &Config) -> Result<Box<dyn PullRequestsManager>> {
    let base_url = config.effective_base_url();
    debug!(provider = %config.provider, base_url = base_url, "Building manager");

    let manager: Box<dyn PullRequestsManager> = match config.provider {
        ProviderKind::Github => Box::new(GitHubManager::with_base_url(
            base_url,
            config.resolve_token(),
        )),
        ProviderKind::GithubAnonymous => {
            let (Some(owner), Some(repo)) = (&config.owner, &config.repo) else {
                return Err(Error::Config(
                    "github-anonymous requires 'owner' and 'repo' to be set".to_string(),
                ));
            };
            Box::new(GitHubManager::anonymous(base_url, owner, repo))
        }
        ProviderKind::Gitlab => Box::new(GitLabManager::with_base_url(
            base_url,
            config.resolve_token(),
        )),
    };

    Ok(manager)
}
