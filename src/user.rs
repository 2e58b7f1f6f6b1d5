use serde::{Deserialize, Serialize};

/// Caller role used by the transition guards. Authentication itself lives
/// outside this crate; records only ever see an already-identified user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub department: String,
    pub email: String,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
        department: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            full_name: full_name.into(),
            role,
            department: department.into(),
            email: email.into(),
        }
    }
}
