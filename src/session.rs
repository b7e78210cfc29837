use crate::error::{ClientError, Result};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Bearer-token persistence. The CLI equivalent of the browser keeping the
/// access token in local storage: `login` stores it, a 401 clears it.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
}

impl Session {
    /// Token file location: `AITRACE_TOKEN_FILE` if set, otherwise
    /// `$HOME/.aitrace/token`.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = std::env::var("AITRACE_TOKEN_FILE") {
            if !path.trim().is_empty() {
                return Ok(Self::at(PathBuf::from(path)));
            }
        }
        let home = std::env::var("HOME")
            .map_err(|_| ClientError::Config("HOME is not set; cannot locate token file".into()))?;
        Ok(Self::at(PathBuf::from(home).join(".aitrace").join("token")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the saved token, or None when not logged in. Requests without
    /// a token proceed unauthenticated; the backend's 401 handles the rest.
    pub fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(_) => None,
        }
    }

    pub fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)?;
        debug!(path = %self.path.display(), "stored session token");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::at(dir.path().join("nested").join("token"));

        assert!(session.load().is_none());
        session.store("abc123").unwrap();
        assert_eq!(session.load().as_deref(), Some("abc123"));
        session.clear().unwrap();
        assert!(session.load().is_none());
        // Clearing twice is fine
        session.clear().unwrap();
    }

    #[test]
    fn whitespace_only_token_reads_as_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::at(dir.path().join("token"));
        session.store("  \n").unwrap();
        assert!(session.load().is_none());
    }
}
