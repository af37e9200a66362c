//! Peer repository URLs.

use serde::Serialize;

use crate::error::{Error, Result};

/// A peer's public repository, as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRepo {
    /// Repository owner, lowercased. Used as the peer's username.
    pub owner: String,
    pub repo: String,
    /// The cleaned URL (trimmed, trailing slash removed).
    pub url: String,
}

/// Parse a GitHub repository URL such as `https://github.com/alice/commands`.
///
/// # Errors
///
/// Returns `InvalidUrl` if the input is not an http(s) URL or does not name
/// an owner and repository on github.com.
pub fn parse_repo_url(input: &str) -> Result<PeerRepo> {
    let url = input.trim().trim_end_matches('/');
    if !url.starts_with("http") {
        return Err(Error::InvalidUrl(format!(
            "'{url}' is not a valid GitHub URL"
        )));
    }

    let invalid = || Error::InvalidUrl(format!("'{url}' is not a GitHub repository URL"));
    let idx = url.find("github.com/").ok_or_else(invalid)?;
    let mut segments = url[idx + "github.com/".len()..].split('/');
    let owner = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
    let repo = segments.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    Ok(PeerRepo {
        owner: owner.to_lowercase(),
        repo: repo.to_string(),
        url: url.to_string(),
    })
}

impl PeerRepo {
    /// `owner/repo`, with any `.git` suffix removed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo_name())
    }

    fn repo_name(&self) -> &str {
        self.repo.strip_suffix(".git").unwrap_or(&self.repo)
    }

    /// Raw-content URL of the peer's published document.
    #[must_use]
    pub fn raw_document_url(&self, raw_host: &str, branch: &str, file: &str) -> String {
        format!(
            "{}/{}/{}/{branch}/{file}",
            raw_host.trim_end_matches('/'),
            self.owner,
            self.repo_name()
        )
    }
}
