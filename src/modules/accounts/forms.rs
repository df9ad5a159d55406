//! Registration and login forms.

use serde::Deserialize;

use crate::forms::{clean_text, FieldSpec, FormErrors, FormValues, FormView, Widget};

const CONTROL: (&str, &str) = ("class", "form-control");

pub const USERNAME: FieldSpec = FieldSpec::text("username", "Username", 150)
    .with_attrs(&[CONTROL, ("placeholder", "Enter username")]);
pub const EMAIL: FieldSpec = FieldSpec::text("email", "Email address", 254)
    .with_widget(Widget::Email)
    .optional()
    .with_attrs(&[CONTROL, ("placeholder", "Enter email")]);
pub const PASSWORD1: FieldSpec = FieldSpec::text("password1", "Password", 0)
    .unbounded()
    .with_widget(Widget::Password)
    .with_attrs(&[CONTROL, ("placeholder", "Enter password")]);
pub const PASSWORD2: FieldSpec = FieldSpec::text("password2", "Confirm Password", 0)
    .unbounded()
    .with_widget(Widget::Password)
    .with_attrs(&[CONTROL, ("placeholder", "Confirm password")]);
pub const LOGIN_PASSWORD: FieldSpec = FieldSpec::text("password", "Password", 0)
    .unbounded()
    .with_widget(Widget::Password)
    .with_attrs(&[CONTROL]);

pub const REGISTRATION_FIELDS: [FieldSpec; 4] = [USERNAME, EMAIL, PASSWORD1, PASSWORD2];
pub const LOGIN_FIELDS: [FieldSpec; 2] = [USERNAME, LOGIN_PASSWORD];

pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, \
                                    numbers, and @/./+/-/_ characters.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub const PASSWORD_NUMERIC: &str = "This password is entirely numeric.";
pub const PASSWORD_SIMILAR: &str = "The password is too similar to the username.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both \
                                 fields may be case-sensitive.";

/// Password strength rules applied on registration.
#[derive(Debug, Clone, Copy)]
pub struct PasswordRules {
    pub min_length: usize,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RegistrationInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password1: Option<String>,
    #[serde(default)]
    pub password2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationInput {
    /// Username as it will be checked for uniqueness.
    pub fn username_candidate(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    fn values(&self) -> FormValues {
        let mut values = FormValues::new();
        if let Some(username) = &self.username {
            values.insert("username", username.clone());
        }
        if let Some(email) = &self.email {
            values.insert("email", email.clone());
        }
        values
    }

    pub fn view(&self, errors: &FormErrors) -> FormView {
        FormView::bound(&REGISTRATION_FIELDS, &self.values(), errors)
    }
}

pub fn empty_registration_view() -> FormView {
    FormView::unbound(&REGISTRATION_FIELDS, &FormValues::new())
}

/// Validate a registration. `username_taken` is the result of the store
/// lookup for [`RegistrationInput::username_candidate`].
pub fn validate_registration(
    input: &RegistrationInput,
    rules: PasswordRules,
    username_taken: bool,
) -> Result<CleanRegistration, FormErrors> {
    let mut errors = FormErrors::default();

    let username = clean_text(&USERNAME, input.username.as_deref(), &mut errors);
    if let Some(name) = &username {
        if !name.chars().all(is_username_char) {
            errors.add(USERNAME.name, INVALID_USERNAME);
        } else if username_taken {
            errors.add(USERNAME.name, USERNAME_TAKEN);
        }
    }

    let email = clean_text(&EMAIL, input.email.as_deref(), &mut errors);
    if let Some(address) = &email {
        if !looks_like_email(address) {
            errors.add(EMAIL.name, INVALID_EMAIL);
        }
    }

    let password1 = clean_text(&PASSWORD1, input.password1.as_deref(), &mut errors);
    let password2 = clean_text(&PASSWORD2, input.password2.as_deref(), &mut errors);

    if let (Some(first), Some(second)) = (&password1, &password2) {
        if first != second {
            errors.add(PASSWORD2.name, PASSWORD_MISMATCH);
        } else {
            for problem in password_problems(second, username.as_deref().unwrap_or(""), rules) {
                errors.add(PASSWORD2.name, problem);
            }
        }
    }

    match (username, password2) {
        (Some(username), Some(password)) if errors.is_empty() => Ok(CleanRegistration {
            username,
            email: email.unwrap_or_default(),
            password,
        }),
        _ => Err(errors),
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

fn looks_like_email(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !address.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
        && domain.contains('.')
}

/// Strength problems with `password`, in display order.
pub fn password_problems(password: &str, username: &str, rules: PasswordRules) -> Vec<String> {
    let mut problems = Vec::new();

    let lowered = password.to_lowercase();
    let name = username.to_lowercase();
    if name.chars().count() >= 3 && (lowered.contains(&name) || name.contains(&lowered)) {
        problems.push(PASSWORD_SIMILAR.to_string());
    }

    if password.chars().count() < rules.min_length {
        let unit = if rules.min_length == 1 { "character" } else { "characters" };
        problems.push(format!(
            "This password is too short. It must contain at least {} {}.",
            rules.min_length, unit
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        problems.push(PASSWORD_NUMERIC.to_string());
    }

    problems
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginInput {
    pub fn view(&self, errors: &FormErrors) -> FormView {
        let mut values = FormValues::new();
        if let Some(username) = &self.username {
            values.insert("username", username.clone());
        }
        FormView::bound(&LOGIN_FIELDS, &values, errors)
    }
}

pub fn empty_login_view() -> FormView {
    FormView::unbound(&LOGIN_FIELDS, &FormValues::new())
}

/// Presence checks only; credentials are verified against the store afterwards.
pub fn validate_login(input: &LoginInput) -> Result<(String, String), FormErrors> {
    let mut errors = FormErrors::default();
    let username = clean_text(&USERNAME, input.username.as_deref(), &mut errors);
    let password = clean_text(&LOGIN_PASSWORD, input.password.as_deref(), &mut errors);

    match (username, password) {
        (Some(username), Some(password)) if errors.is_empty() => Ok((username, password)),
        _ => Err(errors),
    }
}
