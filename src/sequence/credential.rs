//! Narrow read-only view of a credential record
//!
//! The password is only reachable through a scoped unlock: the compiler
//! holds a `ScopedPassword` for as long as it needs the plaintext and the
//! guard locks the field again when it drops.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use zeroize::Zeroizing;

/// Field accessors the compiler needs from a credential store entry
pub trait Credential {
    fn title(&self) -> &str;
    fn username(&self) -> &str;
    fn url(&self) -> &str;
    fn notes(&self) -> &str;

    /// Decrypt the password into a transient buffer.
    fn unlock_password(&self) -> Zeroizing<String>;

    /// Zero any transient state created by `unlock_password`.
    fn lock_password(&self);
}

/// Plaintext password that exists only while the guard is alive
pub struct ScopedPassword<'a> {
    owner: &'a dyn Credential,
    plain: Zeroizing<String>,
}

impl<'a> ScopedPassword<'a> {
    pub fn unlock(owner: &'a dyn Credential) -> Self {
        let plain = owner.unlock_password();
        Self { owner, plain }
    }

    pub fn expose(&self) -> &str {
        self.plain.as_str()
    }
}

impl Drop for ScopedPassword<'_> {
    fn drop(&mut self) {
        // `plain` zeroizes itself once this returns
        self.owner.lock_password();
    }
}

/// In-memory credential handed to the daemon by a vault client
#[derive(Clone, Default)]
pub struct Entry {
    pub title: String,
    pub username: String,
    pub url: String,
    pub notes: String,
    password: Option<SecretString>,
}

impl Entry {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(SecretString::from(password.into())),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl Credential for Entry {
    fn title(&self) -> &str {
        &self.title
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn notes(&self) -> &str {
        &self.notes
    }

    fn unlock_password(&self) -> Zeroizing<String> {
        let plain = self
            .password
            .as_ref()
            .map(|secret| secret.expose_secret().to_owned())
            .unwrap_or_default();
        Zeroizing::new(plain)
    }

    fn lock_password(&self) {
        // The only plaintext copy is the buffer returned by unlock
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("url", &self.url)
            .field("has_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

/// Wire form of an entry; the password moves straight into a `SecretString`
#[derive(Deserialize, Default)]
pub struct EntryPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
}

impl fmt::Debug for EntryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPayload")
            .field("title", &self.title)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl From<EntryPayload> for Entry {
    fn from(payload: EntryPayload) -> Self {
        let password = if payload.password.is_empty() {
            None
        } else {
            Some(SecretString::from(payload.password))
        };
        Self {
            title: payload.title,
            username: payload.username,
            url: payload.url,
            notes: payload.notes,
            password,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    /// Credential double that counts unlock/lock calls
    #[derive(Default)]
    pub(crate) struct CountingCredential {
        pub entry: Entry,
        pub unlocks: Cell<u32>,
        pub locks: Cell<u32>,
    }

    impl CountingCredential {
        pub fn new(entry: Entry) -> Self {
            Self {
                entry,
                ..Default::default()
            }
        }
    }

    impl Credential for CountingCredential {
        fn title(&self) -> &str {
            self.entry.title()
        }

        fn username(&self) -> &str {
            self.entry.username()
        }

        fn url(&self) -> &str {
            self.entry.url()
        }

        fn notes(&self) -> &str {
            self.entry.notes()
        }

        fn unlock_password(&self) -> Zeroizing<String> {
            self.unlocks.set(self.unlocks.get() + 1);
            self.entry.unlock_password()
        }

        fn lock_password(&self) {
            self.locks.set(self.locks.get() + 1);
        }
    }

    #[test]
    fn test_scoped_password_locks_on_drop() {
        let credential = CountingCredential::new(Entry::new("alice", "secret"));
        {
            let password = ScopedPassword::unlock(&credential);
            assert_eq!(password.expose(), "secret");
            assert_eq!(credential.locks.get(), 0);
        }
        assert_eq!(credential.unlocks.get(), 1);
        assert_eq!(credential.locks.get(), 1);
    }

    #[test]
    fn test_entry_debug_hides_password() {
        let entry = Entry::new("alice", "hunter2");
        let printed = format!("{:?}", entry);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_payload_into_entry() {
        let payload: EntryPayload =
            serde_json::from_str(r#"{"username":"bob","password":"pw","url":"https://x"}"#)
                .unwrap();
        assert!(!format!("{:?}", payload).contains("\"pw\""));

        let entry = Entry::from(payload);
        assert_eq!(entry.username(), "bob");
        assert_eq!(entry.url(), "https://x");
        assert_eq!(entry.title(), "");
        assert_eq!(entry.unlock_password().as_str(), "pw");
    }

    #[test]
    fn test_missing_password_unlocks_empty() {
        let entry = Entry::default();
        assert!(entry.unlock_password().is_empty());
    }
}
