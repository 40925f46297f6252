use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Employee,
    Manager,
    Accounts,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Employee => write!(f, "Employee"),
            Role::Manager => write!(f, "Manager"),
            Role::Accounts => write!(f, "Accounts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub department: String,
    /// Reporting manager.
    #[serde(default)]
    pub manager: Option<PersonId>,
}

/// Role and group membership lookup. The workflow only asks these questions
/// of the organisation; where the answers come from is up to the implementor.
pub trait Directory: Send + Sync {
    fn person(&self, id: PersonId) -> Option<Person>;

    fn person_by_email(&self, email: &str) -> Option<Person>;

    fn manager_of(&self, id: PersonId) -> Option<Person> {
        self.person(id)?.manager.and_then(|m| self.person(m))
    }

    fn is_accounts_member(&self, id: PersonId) -> bool;

    /// Whether anyone reports to `id`.
    fn has_reports(&self, id: PersonId) -> bool;

    fn roles(&self, id: PersonId) -> Vec<Role> {
        if self.person(id).is_none() {
            return vec![];
        }
        let mut roles = vec![Role::Employee];
        if self.has_reports(id) {
            roles.push(Role::Manager);
        }
        if self.is_accounts_member(id) {
            roles.push(Role::Accounts);
        }
        roles
    }
}

/// Directory backed by a fixed roster, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    people: HashMap<PersonId, Person>,
    accounts_team: Vec<PersonId>,
}

impl StaticDirectory {
    pub fn new(people: impl IntoIterator<Item = Person>, accounts_team: Vec<PersonId>) -> Self {
        Self {
            people: people.into_iter().map(|p| (p.id, p)).collect(),
            accounts_team,
        }
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

impl Directory for StaticDirectory {
    fn person(&self, id: PersonId) -> Option<Person> {
        self.people.get(&id).cloned()
    }

    fn person_by_email(&self, email: &str) -> Option<Person> {
        self.people
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn is_accounts_member(&self, id: PersonId) -> bool {
        self.accounts_team.contains(&id)
    }

    fn has_reports(&self, id: PersonId) -> bool {
        self.people.values().any(|p| p.manager == Some(id))
    }
}
