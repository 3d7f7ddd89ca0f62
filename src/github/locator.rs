//! Identity wrappers and API path builders for repositories and pull requests.

use url::Url;

use super::error::ClientError;

/// Public GitHub API base used when no enterprise host is configured.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Repository owner wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    /// Validates that the owner is non-empty and contains no path separator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidIdentifier`] for blank or slashed input.
    pub fn new(value: &str) -> Result<Self, ClientError> {
        validate_segment("owner", value).map(Self)
    }

    /// Borrow the owner value.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository name wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Validates that the name is non-empty and contains no path separator.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidIdentifier`] for blank or slashed input.
    pub fn new(value: &str) -> Result<Self, ClientError> {
        validate_segment("repository", value).map(Self)
    }

    /// Borrow the repository name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Pull request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Validates that the number is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidIdentifier`] for zero.
    pub fn new(value: u64) -> Result<Self, ClientError> {
        if value == 0 {
            return Err(ClientError::InvalidIdentifier {
                message: "pull request number must be positive".to_owned(),
            });
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Personal access token wrapper enforcing presence.
#[derive(Clone, PartialEq, Eq)]
pub struct PersonalAccessToken(String);

impl PersonalAccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingToken`] when the supplied string is blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, ClientError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ClientError::MissingToken);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for PersonalAccessToken {
    fn as_ref(&self) -> &str {
        self.value()
    }
}

impl std::fmt::Debug for PersonalAccessToken {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("PersonalAccessToken(***)")
    }
}

/// Owner and name of one repository.
///
/// # Example
///
/// ```
/// use octolens::github::locator::RepositoryLocator;
///
/// let locator = RepositoryLocator::parse("https://github.com/octo/repo")
///     .expect("should parse repository URL");
/// assert_eq!(locator.owner().as_str(), "octo");
/// assert_eq!(locator.repository_path(), "/repos/octo/repo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocator {
    owner: RepositoryOwner,
    repository: RepositoryName,
}

impl RepositoryLocator {
    /// Creates a locator from owner and repository name strings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidIdentifier`] when either part is invalid.
    pub fn from_owner_repo(owner: &str, repo: &str) -> Result<Self, ClientError> {
        Ok(Self {
            owner: RepositoryOwner::new(owner)?,
            repository: RepositoryName::new(repo)?,
        })
    }

    /// Parses `owner/name` as found in a repository's `full_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidIdentifier`] unless the input has exactly
    /// two non-empty segments.
    pub fn from_full_name(full_name: &str) -> Result<Self, ClientError> {
        let (owner, repo) = full_name
            .split_once('/')
            .ok_or_else(|| ClientError::InvalidIdentifier {
                message: format!("full name `{full_name}` must be owner/name"),
            })?;
        Self::from_owner_repo(owner, repo)
    }

    /// Accepts either a repository URL or `owner/name`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::parse`] for URLs and of
    /// [`Self::from_full_name`] otherwise.
    pub fn from_reference(input: &str) -> Result<Self, ClientError> {
        let trimmed = input.trim();
        if trimmed.contains("://") {
            Self::parse(trimmed)
        } else {
            Self::from_full_name(trimmed)
        }
    }

    /// Parses a repository URL in the form `https://github.com/<owner>/<repo>`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] when parsing fails or
    /// [`ClientError::InvalidIdentifier`] when the path lacks owner and name.
    pub fn parse(input: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(input).map_err(|error| ClientError::InvalidUrl(error.to_string()))?;
        let mut segments = parsed
            .path_segments()
            .ok_or_else(|| ClientError::InvalidUrl("URL cannot carry a path".to_owned()))?;

        let owner = segments.next().unwrap_or_default();
        let repo = segments
            .next()
            .unwrap_or_default()
            .trim_end_matches(".git");
        Self::from_owner_repo(owner, repo)
    }

    /// Repository owner.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    /// `owner/name`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner.as_str(), self.repository.as_str())
    }

    /// Path of `GET /repos/{owner}/{repo}`.
    #[must_use]
    pub fn repository_path(&self) -> String {
        format!("/repos/{}", self.full_name())
    }

    /// Path of `GET /repos/{owner}/{repo}/pulls/{number}`.
    #[must_use]
    pub fn pull_request_path(&self, number: PullRequestNumber) -> String {
        format!("{}/pulls/{}", self.repository_path(), number.get())
    }

    /// Path of `GET /repos/{owner}/{repo}/pulls/{number}/reviews`.
    #[must_use]
    pub fn reviews_path(&self, number: PullRequestNumber) -> String {
        format!("{}/reviews", self.pull_request_path(number))
    }
}

fn validate_segment(label: &str, value: &str) -> Result<String, ClientError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidIdentifier {
            message: format!("{label} must not be empty"),
        });
    }
    if trimmed.contains('/') {
        return Err(ClientError::InvalidIdentifier {
            message: format!("{label} `{trimmed}` must not contain '/'"),
        });
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{PersonalAccessToken, PullRequestNumber, RepositoryLocator};
    use crate::github::error::ClientError;

    #[test]
    fn builds_api_paths() {
        let locator = RepositoryLocator::from_owner_repo("octo", "cat").expect("valid locator");
        let number = PullRequestNumber::new(42).expect("valid number");

        assert_eq!(locator.repository_path(), "/repos/octo/cat");
        assert_eq!(locator.pull_request_path(number), "/repos/octo/cat/pulls/42");
        assert_eq!(locator.reviews_path(number), "/repos/octo/cat/pulls/42/reviews");
    }

    #[rstest]
    #[case("https://github.com/octo/cat", "octo", "cat")]
    #[case("https://github.com/octo/cat.git", "octo", "cat")]
    #[case("https://ghe.example.com/team/tool/pulls", "team", "tool")]
    fn parses_repository_urls(#[case] input: &str, #[case] owner: &str, #[case] repo: &str) {
        let locator = RepositoryLocator::parse(input).expect("URL should parse");

        assert_eq!(locator.owner().as_str(), owner);
        assert_eq!(locator.repository().as_str(), repo);
    }

    #[rstest]
    #[case("", "cat")]
    #[case("octo", "  ")]
    #[case("oc/to", "cat")]
    fn rejects_invalid_segments(#[case] owner: &str, #[case] repo: &str) {
        let result = RepositoryLocator::from_owner_repo(owner, repo);

        assert!(matches!(result, Err(ClientError::InvalidIdentifier { .. })));
    }

    #[test]
    fn splits_full_names() {
        let locator = RepositoryLocator::from_full_name("octo/cat").expect("valid full name");

        assert_eq!(locator.full_name(), "octo/cat");
        assert!(RepositoryLocator::from_full_name("octocat").is_err());
    }

    #[rstest]
    #[case("octo/cat")]
    #[case(" octo/cat ")]
    #[case("https://github.com/octo/cat")]
    fn resolves_references_in_either_form(#[case] input: &str) {
        let locator = RepositoryLocator::from_reference(input).expect("reference should resolve");

        assert_eq!(locator.full_name(), "octo/cat");
    }

    #[test]
    fn malformed_reference_url_is_invalid_url() {
        assert!(matches!(
            RepositoryLocator::from_reference("https://[broken"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_zero_pull_request_number() {
        assert!(PullRequestNumber::new(0).is_err());
    }

    #[test]
    fn blank_token_is_missing() {
        assert_eq!(
            PersonalAccessToken::new("   "),
            Err(ClientError::MissingToken)
        );
    }

    #[test]
    fn token_debug_output_is_redacted() {
        let token = PersonalAccessToken::new("ghp_secret").expect("valid token");

        assert!(!format!("{token:?}").contains("ghp_secret"));
        assert_eq!(token.value(), "ghp_secret");
    }
}
