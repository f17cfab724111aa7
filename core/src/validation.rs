//! Local form checks that run before any network call.
//!
//! Each validator returns the normalized request payload on success or the
//! per-field messages on failure. Lengths count Unicode scalar values of the
//! raw input; titles are not trimmed.

use crate::error::FieldErrors;
use crate::types::{CreateTodo, Credentials};

pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 1000;
pub const PASSWORD_MIN: usize = 6;

pub fn validate_todo_create(title: &str, description: Option<&str>) -> Result<CreateTodo, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title_len = title.chars().count();
    if title_len == 0 {
        errors.add("title", "Title is required");
    } else if title_len > TITLE_MAX {
        errors.add("title", "Title too long");
    }

    // A blank description is the same as leaving the field out.
    let description = description.filter(|d| !d.trim().is_empty());
    if let Some(d) = description {
        if d.chars().count() > DESCRIPTION_MAX {
            errors.add("description", "Description too long");
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(CreateTodo {
        title: title.to_string(),
        description: description.map(str::to_string),
        completed: false,
    })
}

pub fn validate_login(username: &str, password: &str) -> Result<Credentials, FieldErrors> {
    validate_credentials(username, password)
}

pub fn validate_signup(username: &str, password: &str) -> Result<Credentials, FieldErrors> {
    validate_credentials(username, password)
}

fn validate_credentials(username: &str, password: &str) -> Result<Credentials, FieldErrors> {
    let mut errors = FieldErrors::new();
    if username.trim().is_empty() {
        errors.add("username", "Username is required");
    }
    if password.chars().count() < PASSWORD_MIN {
        errors.add("password", "Password must be at least 6 characters");
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Credentials::new(username.trim(), password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_title_is_required() {
        let errors = validate_todo_create("", None).unwrap_err();
        assert_eq!(errors.get("title"), Some("Title is required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn boundary_lengths_pass() {
        let title = "t".repeat(TITLE_MAX);
        let description = "d".repeat(DESCRIPTION_MAX);
        let input = validate_todo_create(&title, Some(&description)).unwrap();
        assert_eq!(input.title.len(), TITLE_MAX);
        assert_eq!(input.description.as_deref(), Some(description.as_str()));
        assert!(!input.completed);

        assert!(validate_todo_create("x", None).is_ok());
        assert!(validate_todo_create("   ", None).is_ok());
    }

    #[test]
    fn multibyte_titles_count_characters() {
        let title = "é".repeat(TITLE_MAX);
        assert!(validate_todo_create(&title, None).is_ok());
    }

    #[test]
    fn overlong_fields_are_reported_together() {
        let title = "t".repeat(TITLE_MAX + 1);
        let description = "d".repeat(DESCRIPTION_MAX + 1);
        let errors = validate_todo_create(&title, Some(&description)).unwrap_err();
        assert_eq!(errors.get("title"), Some("Title too long"));
        assert_eq!(errors.get("description"), Some("Description too long"));
    }

    #[test]
    fn blank_description_is_dropped() {
        let input = validate_todo_create("Walk dog", Some("  \n")).unwrap();
        assert!(input.description.is_none());
    }

    #[test]
    fn credentials_rules() {
        let errors = validate_login(" ", "12345").unwrap_err();
        assert_eq!(errors.get("username"), Some("Username is required"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );

        let creds = validate_signup(" ada ", "123456").unwrap();
        assert_eq!(creds.username, "ada");
        assert_eq!(creds.password, "123456");
    }
}
