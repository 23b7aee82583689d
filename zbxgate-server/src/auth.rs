use std::fmt;

/// Caller privilege, resolved from the `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Read => "read",
            Role::Admin => "admin",
        }
    }

    /// Admin satisfies every requirement; read only satisfies read.
    pub fn satisfies(self, required: Role) -> bool {
        match required {
            Role::Read => true,
            Role::Admin => self == Role::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match the last whitespace-separated token of `header` against the admin
/// token, then the read token. Unset tokens never match.
pub fn resolve_role(
    header: Option<&str>,
    admin_token: Option<&str>,
    read_token: Option<&str>,
) -> Option<Role> {
    let presented = header?.split_whitespace().last()?;

    if admin_token.is_some_and(|t| t == presented) {
        Some(Role::Admin)
    } else if read_token.is_some_and(|t| t == presented) {
        Some(Role::Read)
    } else {
        None
    }
}
