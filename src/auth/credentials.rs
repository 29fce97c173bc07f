//! Credential management for DSpace authentication
//!
//! This module handles storage, retrieval, and validation of the DSpace login.
//! Credentials are read from the environment (optionally populated from a .env
//! file) and stored in .env files with owner-only permissions.

use std::env;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::app::client::{ClientConfig, DspaceSession};
use crate::constants::{auth, env as env_constants};
use crate::errors::{AuthError, AuthResult};

/// DSpace login; the password never appears in debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub(crate) password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Read `DSPACE_EMAIL` and `DSPACE_PASSWORD`
    pub fn from_env() -> AuthResult<Self> {
        Self::from_values(
            env::var(env_constants::EMAIL).ok(),
            env::var(env_constants::PASSWORD).ok(),
        )
    }

    fn from_values(email: Option<String>, password: Option<String>) -> AuthResult<Self> {
        match (email, password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok(Self::new(email.trim(), password))
            }
            _ => Err(AuthError::MissingCredentials),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication status information
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether the email environment variable is set
    pub email_set: bool,
    /// Whether the password environment variable is set
    pub password_set: bool,
    /// Whether .env file exists in current directory
    pub dotenv_file_exists: bool,
    /// Whether credentials have been verified (None = not tested)
    pub credentials_valid: Option<bool>,
}

impl AuthStatus {
    /// Check if both credentials are available in environment
    pub fn has_credentials(&self) -> bool {
        self.email_set && self.password_set
    }

    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.has_credentials(), self.credentials_valid) {
            (false, _) => "Missing credentials - run 'auth setup' to configure".to_string(),
            (true, None) => "Credentials configured but not verified".to_string(),
            (true, Some(true)) => "Credentials configured and verified".to_string(),
            (true, Some(false)) => "Credentials configured but rejected by DSpace".to_string(),
        }
    }
}

/// Check current authentication status
pub fn get_auth_status() -> AuthStatus {
    AuthStatus {
        email_set: env::var(env_constants::EMAIL).is_ok(),
        password_set: env::var(env_constants::PASSWORD).is_ok(),
        dotenv_file_exists: Path::new(".env").exists(),
        credentials_valid: None,
    }
}

/// Check if credentials exist in environment variables
pub fn check_credentials() -> bool {
    Credentials::from_env().is_ok()
}

/// Loose sanity check of an email address
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < auth::MIN_EMAIL_LENGTH || email.len() > auth::MAX_EMAIL_LENGTH {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Prompt user for credentials interactively
pub fn prompt_credentials() -> AuthResult<Credentials> {
    print!("DSpace email: ");
    io::stdout().flush().map_err(AuthError::CredentialStorage)?;

    let mut email = String::new();
    io::stdin()
        .read_line(&mut email)
        .map_err(AuthError::CredentialStorage)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        return Err(AuthError::InvalidEmail {
            reason: "Email cannot be empty".to_string(),
        });
    }
    if !is_valid_email(&email) {
        return Err(AuthError::InvalidEmail {
            reason: format!("'{}' does not look like an email address", email),
        });
    }

    let password = rpassword::prompt_password("DSpace password: ")
        .map_err(|e| AuthError::CredentialStorage(io::Error::new(io::ErrorKind::Other, e)))?;

    if password.is_empty() {
        return Err(AuthError::InvalidEmail {
            reason: "Password cannot be empty".to_string(),
        });
    }

    Ok(Credentials::new(email, password))
}

/// Save credentials to ./.env and export them to the current process
pub fn save_credentials(credentials: &Credentials) -> AuthResult<()> {
    write_env_file(Path::new(".env"), credentials)?;

    env::set_var(env_constants::EMAIL, &credentials.email);
    env::set_var(env_constants::PASSWORD, &credentials.password);

    println!("Credentials saved to .env file");

    #[cfg(unix)]
    println!("File permissions set to owner-only (600)");

    #[cfg(not(unix))]
    println!(
        "Warning: File permissions not set (non-Unix system). Please ensure .env file is protected."
    );

    Ok(())
}

/// Rewrite `env_path`, replacing existing credential lines and keeping the rest
fn write_env_file(env_path: &Path, credentials: &Credentials) -> AuthResult<()> {
    let email_prefix = format!("{}=", env_constants::EMAIL);
    let password_prefix = format!("{}=", env_constants::PASSWORD);
    let mut lines = Vec::new();
    let mut email_found = false;
    let mut password_found = false;

    if env_path.exists() {
        let reader = BufReader::new(File::open(env_path)?);
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.starts_with(&email_prefix) {
                lines.push(format!("{}{}", email_prefix, credentials.email));
                email_found = true;
            } else if trimmed.starts_with(&password_prefix) {
                lines.push(format!("{}{}", password_prefix, credentials.password));
                password_found = true;
            } else {
                lines.push(line);
            }
        }
    }

    if !email_found {
        lines.push(format!("{}{}", email_prefix, credentials.email));
    }
    if !password_found {
        lines.push(format!("{}{}", password_prefix, credentials.password));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(env_path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(auth::ENV_FILE_PERMISSIONS);
        file.set_permissions(perms)?;
    }

    Ok(())
}

/// Remove credential lines from ./.env, keeping any other settings
pub fn clear_credentials() -> AuthResult<bool> {
    let removed = strip_env_file(Path::new(".env"))?;
    env::remove_var(env_constants::EMAIL);
    env::remove_var(env_constants::PASSWORD);
    Ok(removed)
}

fn strip_env_file(env_path: &Path) -> AuthResult<bool> {
    if !env_path.exists() {
        return Ok(false);
    }

    let email_prefix = format!("{}=", env_constants::EMAIL);
    let password_prefix = format!("{}=", env_constants::PASSWORD);
    let contents = std::fs::read_to_string(env_path)?;
    let kept: Vec<&str> = contents
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with(&email_prefix) && !trimmed.starts_with(&password_prefix)
        })
        .collect();
    let removed = kept.len() != contents.lines().count();

    if kept.is_empty() {
        std::fs::remove_file(env_path)?;
    } else {
        std::fs::write(env_path, format!("{}\n", kept.join("\n")))?;
    }
    Ok(removed)
}

/// Verify credentials by opening a session against the configured server
///
/// Returns `Ok(false)` when the server rejects the login; transport and
/// configuration problems are returned as errors.
pub async fn verify_credentials(config: &ClientConfig) -> AuthResult<bool> {
    let credentials = Credentials::from_env()?;

    println!("Verifying credentials with {}...", config.base_url);

    match DspaceSession::connect(config, credentials).await {
        Ok(_) => {
            println!("Credentials verified successfully!");
            Ok(true)
        }
        Err(AuthError::AuthRejected { status, body }) => {
            println!("Login rejected (HTTP {}): {}", status, body);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Interactive credential setup workflow
pub async fn setup_credentials(config: &ClientConfig) -> AuthResult<()> {
    println!("DSpace Authentication Setup");
    println!("===========================");
    println!();
    println!("This will configure the DSpace account used to create submissions.");
    println!("Your credentials will be stored in a .env file in the current directory.");
    println!();

    if get_auth_status().has_credentials() {
        println!("Warning: Credentials are already configured.");
        print!("Do you want to update them? [y/N]: ");
        io::stdout().flush().map_err(AuthError::CredentialStorage)?;

        let mut response = String::new();
        io::stdin()
            .read_line(&mut response)
            .map_err(AuthError::CredentialStorage)?;

        if !response.trim().to_lowercase().starts_with('y') {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    let credentials = prompt_credentials()?;

    println!();
    save_credentials(&credentials)?;

    println!();
    match verify_credentials(config).await {
        Ok(true) => {
            println!();
            println!("Setup complete! You can now run uploads.");
        }
        Ok(false) => {
            println!();
            println!("Setup failed. Please check your credentials and try again.");
            println!("   You can run 'auth setup' again to re-enter your credentials.");
        }
        Err(e) => {
            println!();
            println!("Credentials saved but could not be verified: {}", e);
        }
    }

    Ok(())
}

/// Show current authentication status
pub async fn show_auth_status(config: &ClientConfig) -> AuthResult<()> {
    let mut status = get_auth_status();

    println!("DSpace Authentication Status");
    println!("============================");
    println!();
    println!("Server: {}", config.base_url);

    match env::var(env_constants::EMAIL) {
        Ok(email) => println!("Email: {} (set)", email),
        Err(_) => println!("Email: Not set"),
    }
    println!(
        "Password: {}",
        if status.password_set { "Set" } else { "Not set" }
    );
    println!(
        ".env file: {}",
        if status.dotenv_file_exists {
            "Exists"
        } else {
            "Not found"
        }
    );
    println!();

    if status.has_credentials() {
        match verify_credentials(config).await {
            Ok(valid) => status.credentials_valid = Some(valid),
            Err(e) => println!("Could not verify credentials: {}", e),
        }
        println!();
    }

    println!("Status: {}", status.status_message());

    if !status.has_credentials() {
        println!();
        println!("To configure credentials, run: dspace_uploader auth setup");
    } else if status.credentials_valid == Some(false) {
        println!();
        println!("To update credentials, run: dspace_uploader auth setup");
    }

    Ok(())
}
