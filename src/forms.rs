// src/forms.rs
//! Login and signup forms with the client-side checks run before any
//! request reaches the service.

use thiserror::Error;

use crate::models::auth::NewUser;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Passwords do not match")]
    PasswordMismatch,
}

fn require(value: &str, field: &'static str) -> Result<(), FormError> {
    if value.trim().is_empty() {
        Err(FormError::Required(field))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    /// Username or email
    pub identity: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.identity, "Username or email")?;
        require(&self.password, "Password")
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), FormError> {
        require(&self.username, "Username")?;
        require(&self.email, "Email")?;
        require(&self.password, "Password")?;
        require(&self.password_confirm, "Password confirmation")?;
        if self.password != self.password_confirm {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            email_visibility: false,
            password: self.password.clone(),
            password_confirm: self.password_confirm.clone(),
        }
    }

    /// Credentials used to log in right after the account is created.
    pub fn login_form(&self) -> LoginForm {
        LoginForm::new(self.username.trim(), self.password.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupForm {
        SignupForm {
            username: "jdoe".to_string(),
            email: "jdoe@uni.edu".to_string(),
            password: "hunter22".to_string(),
            password_confirm: "hunter22".to_string(),
        }
    }

    #[test]
    fn test_login_requires_both_fields() {
        assert_eq!(
            LoginForm::new("  ", "secret").validate(),
            Err(FormError::Required("Username or email"))
        );
        assert_eq!(
            LoginForm::new("jdoe", "").validate(),
            Err(FormError::Required("Password"))
        );
        assert!(LoginForm::new("jdoe", "secret").validate().is_ok());
    }

    #[test]
    fn test_signup_checks_confirmation() {
        assert!(signup().validate().is_ok());

        let mut form = signup();
        form.password_confirm = "hunter23".to_string();
        assert_eq!(form.validate(), Err(FormError::PasswordMismatch));

        let mut form = signup();
        form.email = String::new();
        assert_eq!(form.validate(), Err(FormError::Required("Email")));
    }

    #[test]
    fn test_signup_trims_identity_fields() {
        let mut form = signup();
        form.username = " jdoe ".to_string();
        let user = form.to_new_user();
        assert_eq!(user.username, "jdoe");
        assert_eq!(form.login_form().identity, "jdoe");
    }
}
