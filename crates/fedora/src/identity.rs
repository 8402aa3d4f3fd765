//! The Fedora account packaging commands act as.

use std::path::PathBuf;

const REALM: &str = "FEDORAPROJECT.ORG";

/// Fedora account and optional Kerberos keytab.
///
/// The account name is exported as `LOGNAME` to every packaging command so
/// that `fedpkg` works under a random container UID without a passwd entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerIdentity {
    /// Fedora account (FAS) user name.
    pub fas_username: String,
    /// Keytab used to obtain a fresh ticket.
    pub keytab: Option<PathBuf>,
}

impl PackagerIdentity {
    /// Creates an identity without a keytab.
    #[must_use]
    pub fn new(fas_username: impl Into<String>) -> Self {
        Self {
            fas_username: fas_username.into(),
            keytab: None,
        }
    }

    /// Sets the keytab.
    #[must_use]
    pub fn with_keytab(mut self, keytab: Option<PathBuf>) -> Self {
        self.keytab = keytab;
        self
    }

    /// Kerberos principal of the account.
    #[must_use]
    pub fn principal(&self) -> String {
        format!("{}@{REALM}", self.fas_username)
    }

    /// Arguments for `kinit`.
    ///
    /// With a readable keytab a new ticket is requested; otherwise an
    /// existing ticket is renewed.
    #[must_use]
    pub fn kinit_args(&self) -> Vec<String> {
        match &self.keytab {
            Some(keytab) if keytab.is_file() => vec![
                self.principal(),
                "-k".to_string(),
                "-t".to_string(),
                keytab.display().to_string(),
            ],
            _ => vec!["-R".to_string(), self.principal()],
        }
    }

    /// Environment variables scoped to each packaging command.
    #[must_use]
    pub fn environment(&self) -> Vec<(String, String)> {
        vec![("LOGNAME".to_string(), self.fas_username.clone())]
    }
}
