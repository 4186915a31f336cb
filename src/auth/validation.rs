use lazy_static::lazy_static;
use regex::Regex;

use super::{
    dto::{SignInRequest, SignUpRequest},
    repo_types::NewUser,
};
use crate::error::AppError;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;
pub const NAME_MAX: usize = 50;
pub const AGE_RANGE: std::ops::RangeInclusive<i32> = 13..=120;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^(?-u:\w)+([.-]?(?-u:\w)+)*@(?-u:\w)+([.-]?(?-u:\w)+)*(\.(?-u:\w){2,3})+$")
                .unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn optional_name(value: Option<String>, label: &str) -> Result<Option<String>, AppError> {
    match present(value.as_deref()) {
        None => Ok(None),
        Some(v) if v.chars().count() > NAME_MAX => Err(AppError::validation(format!(
            "{label} must be at most {NAME_MAX} characters"
        ))),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Validated sign-up input. The password is kept verbatim; the rest is normalized.
#[derive(Debug)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i32>,
}

impl SignUp {
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
        }
    }
}

/// Checks fields in order and reports the first failure.
pub fn validate_sign_up(req: SignUpRequest) -> Result<SignUp, AppError> {
    let username = present(req.username.as_deref())
        .ok_or_else(|| AppError::validation("Username is required"))?
        .to_string();
    let email = present(req.email.as_deref())
        .ok_or_else(|| AppError::validation("Email is required"))?
        .to_lowercase();
    let password = req
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("Password is required"))?;

    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Please fill a valid email address"));
    }
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::validation(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }

    let first_name = optional_name(req.first_name, "First name")?;
    let last_name = optional_name(req.last_name, "Last name")?;
    if let Some(age) = req.age {
        if !AGE_RANGE.contains(&age) {
            return Err(AppError::validation(format!(
                "Age must be between {} and {}",
                AGE_RANGE.start(),
                AGE_RANGE.end()
            )));
        }
    }

    Ok(SignUp {
        username,
        email,
        password,
        first_name,
        last_name,
        age: req.age,
    })
}

/// Returns the trimmed username and the raw password.
pub fn validate_sign_in(req: SignInRequest) -> Result<(String, String), AppError> {
    let username = present(req.username.as_deref())
        .ok_or_else(|| AppError::validation("Username is required"))?
        .to_string();
    let password = req
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("Password is required"))?;
    Ok((username, password))
}
