//! Login and registration input, with the checks run before any request.

use std::fmt;

use crate::error::InvalidInputError;

/// Minimum password length accepted by the backend.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length accepted by the backend.
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Username and password for a login attempt.
///
/// # Security
///
/// The password is never exposed in Debug output.
#[derive(Clone)]
pub struct LoginForm {
    username: String,
    password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Use only when constructing the login request.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check that both fields are filled in.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if self.username.is_empty() {
            return Err(InvalidInputError::Missing { field: "Username" });
        }
        if self.password.is_empty() {
            return Err(InvalidInputError::Missing { field: "Password" });
        }
        Ok(())
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Input for creating a new account.
#[derive(Clone)]
pub struct RegistrationForm {
    username: String,
    name: String,
    password: String,
    password_confirm: String,
}

impl RegistrationForm {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        password: impl Into<String>,
        password_confirm: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into().trim().to_string(),
            name: name.into().trim().to_string(),
            password: password.into(),
            password_confirm: password_confirm.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn password_confirm(&self) -> &str {
        &self.password_confirm
    }

    /// Run the same field rules the backend enforces, without the
    /// uniqueness and password-strength checks only it can do.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        validate_username(&self.username)?;

        if self.name.is_empty() {
            return Err(InvalidInputError::Missing { field: "Name" });
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(InvalidInputError::Password {
                reason: format!(
                    "Password must be at least {} characters long",
                    MIN_PASSWORD_LENGTH
                ),
            });
        }

        if self.password != self.password_confirm {
            return Err(InvalidInputError::PasswordMismatch);
        }

        Ok(())
    }
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn validate_username(username: &str) -> Result<(), InvalidInputError> {
    if username.is_empty() {
        return Err(InvalidInputError::Missing { field: "Username" });
    }

    let len = username.chars().count();
    if len > MAX_USERNAME_LENGTH {
        return Err(InvalidInputError::Username {
            reason: format!(
                "Username must be at most {} characters long",
                MAX_USERNAME_LENGTH
            ),
        });
    }

    // Letters, digits and @/./+/-/_ only.
    if let Some(c) = username
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')))
    {
        return Err(InvalidInputError::Username {
            reason: format!("Username may not contain '{}'", c),
        });
    }

    Ok(())
}
