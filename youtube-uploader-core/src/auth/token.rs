//! Access/refresh tokens and the on-disk token cache.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::UPLOAD_SCOPE;
use crate::error::AuthError;

/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Wire shape of a token endpoint reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// The credential persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    /// Builds the stored form of a fresh token. `previous_refresh` is kept when
    /// the reply carries no refresh token, which is the normal case for a
    /// refresh grant. An `expires_in` too large to be a date is rejected.
    pub fn from_response(
        response: TokenResponse,
        now: DateTime<Utc>,
        previous_refresh: Option<String>,
    ) -> Result<Self, AuthError> {
        let scopes = match response.scope.as_deref() {
            Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
            None => vec![UPLOAD_SCOPE.to_string()],
        };
        let expires_at = match response.expires_in {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::UnexpectedResponse(format!("expires_in out of range: {secs}"))
                    })?,
            ),
            None => None,
        };
        Ok(StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scopes,
            expires_at,
        })
    }

    /// A token without an expiry is assumed to still be good.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= at,
            None => false,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now) && self.has_scope(UPLOAD_SCOPE)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// JSON token file, read and rewritten wholesale on each run.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` for a missing file. A file that cannot be parsed is
    /// logged and also treated as absent, so the user is sent through a fresh
    /// authorization instead of being stuck.
    pub fn load(&self) -> Result<Option<StoredToken>, AuthError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(token_path = %self.path.display(), "No cached token");
                return Ok(None);
            }
            Err(e) => {
                return Err(AuthError::TokenCache {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        match serde_json::from_slice::<StoredToken>(&content) {
            Ok(token) => {
                info!(token_path = %self.path.display(), "Loaded cached token");
                Ok(Some(token))
            }
            Err(e) => {
                warn!(
                    token_path = %self.path.display(),
                    error = %e,
                    "Cached token is unreadable, ignoring it"
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        let io_err = |source| AuthError::TokenCache {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let json = serde_json::to_string_pretty(token)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(io_err)?;
        // `mode` only applies to new files; an older cache may be wider.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }
        file.write_all(json.as_bytes()).map_err(io_err)?;

        info!(token_path = %self.path.display(), "Saved token for future runs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn response(refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "ya29.fresh".into(),
            expires_in: Some(3599),
            refresh_token: refresh.map(str::to_string),
            scope: Some(UPLOAD_SCOPE.into()),
            token_type: Some("Bearer".into()),
        }
    }

    #[test]
    fn from_response_computes_expiry_and_keeps_old_refresh_token() {
        let token =
            StoredToken::from_response(response(None), now(), Some("1//old".into())).unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("1//old"));
        assert_eq!(token.expires_at, Some(now() + Duration::seconds(3599)));
        assert!(token.is_valid(now()));
    }

    #[test]
    fn new_refresh_token_wins() {
        let token =
            StoredToken::from_response(response(Some("1//new")), now(), Some("1//old".into()))
                .unwrap();
        assert_eq!(token.refresh_token.as_deref(), Some("1//new"));
    }

    #[test]
    fn expiry_applies_skew() {
        let token = StoredToken::from_response(response(None), now(), None).unwrap();
        assert!(!token.is_expired(now() + Duration::seconds(3500)));
        assert!(token.is_expired(now() + Duration::seconds(3540)));
        assert!(!token.can_refresh());
    }

    #[test]
    fn out_of_range_lifetime_is_rejected() {
        let mut huge = response(None);
        huge.expires_in = Some(i64::MAX);
        assert!(matches!(
            StoredToken::from_response(huge, now(), None),
            Err(AuthError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn token_without_upload_scope_is_invalid() {
        let mut token = StoredToken::from_response(response(None), now(), None).unwrap();
        token.scopes = vec!["https://www.googleapis.com/auth/youtube.readonly".into()];
        assert!(!token.is_valid(now()));
    }

    #[test]
    fn cache_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("nested").join("token.json"));
        assert_eq!(cache.load().unwrap(), None);

        let token = StoredToken::from_response(response(Some("1//r")), now(), None).unwrap();
        cache.save(&token).unwrap();
        assert_eq!(cache.load().unwrap(), Some(token));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(cache.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn save_tightens_permissions_of_an_existing_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let token = StoredToken::from_response(response(Some("1//r")), now(), None).unwrap();
        TokenCache::new(&path).save(&token).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(TokenCache::new(&path).load().unwrap(), Some(token));
    }

    #[test]
    fn corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, b"\x80\x04pickle").unwrap();
        assert_eq!(TokenCache::new(path).load().unwrap(), None);
    }
}
