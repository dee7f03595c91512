use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::forms::{checkbox, length_between};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Form body of `POST /login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub remember: bool,
}

impl LoginForm {
    pub fn normalize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_email(&self.email) {
            return Err("Please enter a valid email address.".into());
        }
        if self.password.is_empty() {
            return Err("Please enter your password.".into());
        }
        Ok(())
    }
}

/// Form body of `POST /register`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl RegisterForm {
    pub const USERNAME_MIN: usize = 2;
    pub const USERNAME_MAX: usize = 20;
    pub const PASSWORD_MIN: usize = 6;

    pub fn normalize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<(), String> {
        if !length_between(&self.username, Self::USERNAME_MIN, Self::USERNAME_MAX) {
            return Err(format!(
                "Username must be between {} and {} characters.",
                Self::USERNAME_MIN,
                Self::USERNAME_MAX
            ));
        }
        if !is_valid_email(&self.email) {
            return Err("Please enter a valid email address.".into());
        }
        if self.password.chars().count() < Self::PASSWORD_MIN {
            return Err(format!(
                "Password must be at least {} characters.",
                Self::PASSWORD_MIN
            ));
        }
        if self.password != self.confirm_password {
            return Err("Passwords must match.".into());
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}
