//! Login authorization gate.
//!
//! A user may log in when their credentials are valid and they either hold
//! the admin role or belong to the configured authorized group. Credential
//! checking and user resolution belong to an external [`Authenticator`];
//! role and group lookups belong to a [`Directory`].

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::properties::PropertyStore;
use crate::steps::ADMIN_ROLE;
use crate::storage::{Filter, Storage};

pub const USER_ROLES_COLLECTION: &str = "sys_user_has_role";
pub const GROUP_MEMBERS_COLLECTION: &str = "sys_user_grmember";

/// Shown when valid credentials lack authorization.
pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to access this instance. \
Only authorized users can login. Please contact your system administrator if you need access to this instance.";

/// Generic invalid-login message key.
pub const LOGIN_INVALID_MESSAGE: &str = "login_invalid";

/// Credential verification, owned by the identity subsystem.
pub trait Authenticator {
    type User;

    /// Check a username/password pair.
    fn authenticate(&self, user_name: &str, password: &str) -> bool;

    /// Resolve a username to the user record handed back on success.
    fn resolve(&self, user_name: &str) -> Option<Self::User>;

    /// Pending directory connection error, shown instead of the generic message.
    fn connection_error(&self) -> Option<String> {
        None
    }
}

/// Role and group membership lookups.
pub trait Directory {
    fn has_role(&self, user_name: &str, role: &str) -> Result<bool>;
    fn is_member(&self, user_name: &str, group: &str) -> Result<bool>;
}

/// Outcome of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision<U> {
    Granted(U),
    /// Denied; messages are shown to the user in order.
    Denied { messages: Vec<String> },
}

impl<U> LoginDecision<U> {
    pub fn is_granted(&self) -> bool {
        matches!(self, LoginDecision::Granted(_))
    }
}

/// Admin-or-authorized-group login gate.
pub struct LoginGate<'a, A: Authenticator> {
    authenticator: &'a A,
    directory: &'a dyn Directory,
    authorized_group: Option<String>,
}

impl<'a, A: Authenticator> LoginGate<'a, A> {
    pub fn new(authenticator: &'a A, directory: &'a dyn Directory, authorized_group: Option<String>) -> Self {
        Self {
            authenticator,
            directory,
            authorized_group,
        }
    }

    /// Build a gate whose authorized group is read from a property.
    pub fn from_property(
        authenticator: &'a A,
        directory: &'a dyn Directory,
        properties: &dyn PropertyStore,
        group_property: &str,
    ) -> Self {
        let group = match properties.get(group_property) {
            Ok(group) => group.filter(|g| !g.is_empty()),
            Err(e) => {
                log::error!("Error reading {}: {}", group_property, e);
                None
            }
        };
        Self::new(authenticator, directory, group)
    }

    /// Build a gate from the property named by `authorized-group-property`.
    pub fn from_config(
        authenticator: &'a A,
        directory: &'a dyn Directory,
        properties: &dyn PropertyStore,
        config: &OrchestratorConfig,
    ) -> Self {
        Self::from_property(authenticator, directory, properties, &config.authorized_group_property)
    }

    /// Decide whether `user_name` may log in.
    ///
    /// Directory lookup failures count as "not authorized".
    pub fn process(&self, user_name: &str, password: &str) -> LoginDecision<A::User> {
        let authenticated = self.authenticator.authenticate(user_name, password);

        let is_admin = self.lookup(self.directory.has_role(user_name, ADMIN_ROLE), user_name);
        let is_authorized = match &self.authorized_group {
            Some(group) => self.lookup(self.directory.is_member(user_name, group), user_name),
            None => false,
        };

        if authenticated && (is_admin || is_authorized) {
            if let Some(user) = self.authenticator.resolve(user_name) {
                log::info!("Login granted for {}", user_name);
                return LoginDecision::Granted(user);
            }
            log::error!("Authenticated user {} could not be resolved", user_name);
        }

        let mut messages = Vec::new();
        if authenticated && !is_admin && !is_authorized {
            messages.push(PERMISSION_DENIED_MESSAGE.to_string());
        }
        messages.push(
            self.authenticator
                .connection_error()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| LOGIN_INVALID_MESSAGE.to_string()),
        );

        log::info!("Login denied for {}", user_name);
        LoginDecision::Denied { messages }
    }

    fn lookup(&self, result: Result<bool>, user_name: &str) -> bool {
        result.unwrap_or_else(|e| {
            log::error!("Directory lookup failed for {}: {}", user_name, e);
            false
        })
    }
}

/// Directory answered from role and group membership records.
///
/// Role rows carry `user` and `role`; membership rows carry `user` and `group`.
pub struct StoredDirectory<'a, S: Storage> {
    storage: &'a S,
}

impl<'a, S: Storage> StoredDirectory<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }
}

impl<S: Storage> Directory for StoredDirectory<'_, S> {
    fn has_role(&self, user_name: &str, role: &str) -> Result<bool> {
        let row = self.storage.find_one(
            USER_ROLES_COLLECTION,
            &[Filter::eq("user", user_name), Filter::eq("role", role)],
        )?;
        Ok(row.is_some())
    }

    fn is_member(&self, user_name: &str, group: &str) -> Result<bool> {
        let row = self.storage.find_one(
            GROUP_MEMBERS_COLLECTION,
            &[Filter::eq("user", user_name), Filter::eq("group", group)],
        )?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostCloneError;
    use crate::properties::MemoryProperties;
    use crate::storage::{JsonlStorage, Record};
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct MockAuthenticator {
        passwords: HashMap<&'static str, &'static str>,
        connection_error: Option<String>,
    }

    impl MockAuthenticator {
        fn new() -> Self {
            let mut passwords = HashMap::new();
            passwords.insert("root", "r00t");
            passwords.insert("tester", "t3st");
            passwords.insert("visitor", "v1sit");
            Self {
                passwords,
                connection_error: None,
            }
        }
    }

    impl Authenticator for MockAuthenticator {
        type User = String;

        fn authenticate(&self, user_name: &str, password: &str) -> bool {
            self.passwords.get(user_name) == Some(&password)
        }

        fn resolve(&self, user_name: &str) -> Option<String> {
            self.passwords.contains_key(user_name).then(|| user_name.to_string())
        }

        fn connection_error(&self) -> Option<String> {
            self.connection_error.clone()
        }
    }

    fn seeded_storage() -> (JsonlStorage, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage = JsonlStorage::new(temp.path()).unwrap();
        storage
            .create(USER_ROLES_COLLECTION, &Record::new("r1").with("user", "root").with("role", "admin"))
            .unwrap();
        storage
            .create(
                GROUP_MEMBERS_COLLECTION,
                &Record::new("m1").with("user", "tester").with("group", "clone-testers"),
            )
            .unwrap();
        (storage, temp)
    }

    #[test]
    fn test_admin_is_granted() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, Some("clone-testers".to_string()));

        assert_eq!(gate.process("root", "r00t"), LoginDecision::Granted("root".to_string()));
    }

    #[test]
    fn test_group_member_is_granted() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, Some("clone-testers".to_string()));

        assert!(gate.process("tester", "t3st").is_granted());
    }

    #[test]
    fn test_valid_credentials_without_authorization_show_permission_message() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, Some("clone-testers".to_string()));

        let LoginDecision::Denied { messages } = gate.process("visitor", "v1sit") else {
            panic!("Expected denial");
        };
        assert_eq!(messages, vec![PERMISSION_DENIED_MESSAGE.to_string(), LOGIN_INVALID_MESSAGE.to_string()]);
    }

    #[test]
    fn test_bad_password_shows_only_generic_message() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, Some("clone-testers".to_string()));

        // Even an admin with a wrong password does not learn which check failed
        for user in ["root", "visitor", "nobody"] {
            let decision = gate.process(user, "wrong");
            assert_eq!(
                decision,
                LoginDecision::Denied {
                    messages: vec![LOGIN_INVALID_MESSAGE.to_string()]
                }
            );
        }
    }

    #[test]
    fn test_connection_error_replaces_generic_message() {
        let (storage, _temp) = seeded_storage();
        let mut auth = MockAuthenticator::new();
        auth.connection_error = Some("LDAP server unreachable".to_string());
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, None);

        let LoginDecision::Denied { messages } = gate.process("nobody", "x") else {
            panic!("Expected denial");
        };
        assert_eq!(messages, vec!["LDAP server unreachable".to_string()]);
    }

    #[test]
    fn test_no_group_configured_only_admins_pass() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let props = MemoryProperties::new();
        let gate = LoginGate::from_property(&auth, &directory, &props, "group.property");

        assert!(gate.process("root", "r00t").is_granted());
        assert!(!gate.process("tester", "t3st").is_granted());
    }

    #[test]
    fn test_group_read_from_property() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let props = MemoryProperties::new().with("group.property", "clone-testers");
        let gate = LoginGate::from_property(&auth, &directory, &props, "group.property");

        assert!(gate.process("tester", "t3st").is_granted());
    }

    #[test]
    fn test_group_property_name_from_config() {
        let (storage, _temp) = seeded_storage();
        let auth = MockAuthenticator::new();
        let directory = StoredDirectory::new(&storage);
        let config = OrchestratorConfig::from_yaml("authorized-group-property: clone.login.group\n").unwrap();
        let props = MemoryProperties::new()
            .with("clone.login.group", "clone-testers")
            .with("group.property", "someone-else");

        let gate = LoginGate::from_config(&auth, &directory, &props, &config);
        assert!(gate.process("tester", "t3st").is_granted());

        let gate = LoginGate::from_config(&auth, &directory, &props, &OrchestratorConfig::default());
        assert!(!gate.process("tester", "t3st").is_granted());
    }

    #[test]
    fn test_empty_connection_error_falls_back_to_generic_message() {
        let (storage, _temp) = seeded_storage();
        let mut auth = MockAuthenticator::new();
        auth.connection_error = Some(String::new());
        let directory = StoredDirectory::new(&storage);
        let gate = LoginGate::new(&auth, &directory, None);

        let LoginDecision::Denied { messages } = gate.process("nobody", "x") else {
            panic!("Expected denial");
        };
        assert_eq!(messages, vec![LOGIN_INVALID_MESSAGE.to_string()]);
    }

    struct FailingDirectory;

    impl Directory for FailingDirectory {
        fn has_role(&self, _user_name: &str, _role: &str) -> Result<bool> {
            Err(PostCloneError::Storage("directory offline".to_string()))
        }
        fn is_member(&self, _user_name: &str, _group: &str) -> Result<bool> {
            Err(PostCloneError::Storage("directory offline".to_string()))
        }
    }

    #[test]
    fn test_directory_failure_denies() {
        let auth = MockAuthenticator::new();
        let gate = LoginGate::new(&auth, &FailingDirectory, Some("clone-testers".to_string()));

        assert!(!gate.process("root", "r00t").is_granted());
    }
}
