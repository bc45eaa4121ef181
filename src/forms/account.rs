//! Registration, login and profile forms

use super::{max_length, required, FormErrors};
use crate::models::{is_valid_username, UpdateProfileInput, User, USERNAME_MAX_LEN};
use crate::services::user::{LoginInput, RegisterInput};
use serde::{Deserialize, Serialize};

/// Minimum password length
pub const PASSWORD_MIN_LEN: usize = 8;

const NAME_MAX_LEN: usize = 150;

const USERNAME_HELP: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

fn check_username(errors: &mut FormErrors, raw: &str) -> String {
    let username = required(errors, "username", raw);
    if !username.is_empty() {
        max_length(errors, "username", username, USERNAME_MAX_LEN);
        if !is_valid_username(username) && username.chars().count() <= USERNAME_MAX_LEN {
            errors.add_field("username", USERNAME_HELP);
        }
    }
    username.to_string()
}

fn check_email(errors: &mut FormErrors, raw: &str) -> String {
    let email = raw.trim();
    if !email.is_empty() && !email.contains('@') {
        errors.add_field("email", "Enter a valid email address.");
    }
    email.to_string()
}

/// Sign-up form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegisterInput, FormErrors> {
        let mut errors = FormErrors::new();

        let username = check_username(&mut errors, &self.username);
        let first_name = required(&mut errors, "first_name", &self.first_name);
        max_length(&mut errors, "first_name", first_name, NAME_MAX_LEN);
        let last_name = required(&mut errors, "last_name", &self.last_name);
        max_length(&mut errors, "last_name", last_name, NAME_MAX_LEN);
        let email = check_email(&mut errors, &self.email);

        if self.password1.is_empty() {
            errors.add_field("password1", super::REQUIRED);
        } else {
            if self.password1.chars().count() < PASSWORD_MIN_LEN {
                errors.add_field(
                    "password1",
                    format!(
                        "This password is too short. It must contain at least {} characters.",
                        PASSWORD_MIN_LEN
                    ),
                );
            }
            if self.password1.chars().all(|c| c.is_ascii_digit()) {
                errors.add_field("password1", "This password is entirely numeric.");
            }
        }
        if self.password2.is_empty() {
            errors.add_field("password2", super::REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add_field("password2", "The two password fields didn't match.");
        }

        let input = RegisterInput {
            username,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            password: self.password1.clone(),
        };
        errors.into_result(input)
    }
}

/// Sign-in form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Where to go after signing in
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginInput, FormErrors> {
        let mut errors = FormErrors::new();
        let username = required(&mut errors, "username", &self.username);
        if self.password.is_empty() {
            errors.add_field("password", super::REQUIRED);
        }
        errors.into_result(LoginInput::new(username, self.password.clone()))
    }

    /// Local redirect target, if the submitted one is safe to follow
    pub fn safe_next(&self) -> Option<&str> {
        safe_redirect(self.next.as_deref())
    }
}

/// Accept only site-relative paths as redirect targets
pub(crate) fn safe_redirect(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

/// Own-profile edit form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl ProfileForm {
    /// Form pre-filled with the user's current values
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }

    pub fn validate(&self) -> Result<UpdateProfileInput, FormErrors> {
        let mut errors = FormErrors::new();

        let username = check_username(&mut errors, &self.username);
        let first_name = self.first_name.trim();
        max_length(&mut errors, "first_name", first_name, NAME_MAX_LEN);
        let last_name = self.last_name.trim();
        max_length(&mut errors, "last_name", last_name, NAME_MAX_LEN);
        let email = check_email(&mut errors, &self.email);

        errors.into_result(UpdateProfileInput {
            username,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
        })
    }
}
