//! Client-side form checks run before any request is issued.
//!
//! Errors are keyed by wire field name so locally detected problems and
//! backend-reported ones render through the same `FieldErrors` path.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use crate::net::error::FieldErrors;
use crate::net::types::{ProfileUpdate, RegisterRequest};

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

/// Shape check equivalent to `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
#[must_use]
pub fn is_email_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    // Some dot must have at least one character on each side.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn check_username(errors: &mut FieldErrors, username: &str) {
    let len = username.trim().chars().count();
    if len == 0 {
        errors.push("username", "Username is required.");
    } else if len < USERNAME_MIN_CHARS {
        errors.push("username", format!("Username must be at least {USERNAME_MIN_CHARS} characters."));
    } else if len > USERNAME_MAX_CHARS {
        errors.push("username", format!("Username must be at most {USERNAME_MAX_CHARS} characters."));
    }
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("email", "Email is required.");
    } else if !is_email_shaped(email) {
        errors.push("email", "Enter a valid email address.");
    }
}

#[must_use]
pub fn login(username: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if username.trim().is_empty() {
        errors.push("username", "Username is required.");
    }
    if password.is_empty() {
        errors.push("password", "Password is required.");
    }
    errors
}

#[must_use]
pub fn registration(form: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&mut errors, &form.username);
    check_email(&mut errors, &form.email);

    if form.password.is_empty() {
        errors.push("password", "Password is required.");
    } else if form.password.chars().count() < PASSWORD_MIN_CHARS {
        errors.push("password", format!("Password must be at least {PASSWORD_MIN_CHARS} characters."));
    }

    if form.password_confirm.is_empty() {
        errors.push("password_confirm", "Please confirm the password.");
    } else if form.password != form.password_confirm {
        errors.push("password_confirm", "Passwords do not match.");
    }
    errors
}

#[must_use]
pub fn profile(update: &ProfileUpdate) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_username(&mut errors, &update.username);
    check_email(&mut errors, &update.email);
    errors
}
