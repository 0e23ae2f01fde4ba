use chrono::DateTime;
use diarum_core::auth::{LoginCredentials, RegisterData};

use crate::auth::{auth_service, AuthSession};
use crate::cli::AuthCommands;
use crate::commands::common::{backend_url, load_client_config};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands) -> Result<(), CliError> {
    let config = load_client_config()?;
    let base_url = backend_url(&config)?;
    let service = auth_service(&base_url)?;

    match command {
        AuthCommands::Login { identity, password } => {
            let session = service
                .login(&LoginCredentials { identity, password })
                .await?;
            println!("Signed in to {base_url} as {}", session.user.display_name());
        }
        AuthCommands::Register {
            username,
            email,
            password,
            password_confirm,
        } => {
            let session = service
                .register(&RegisterData {
                    username,
                    email,
                    password,
                    password_confirm,
                })
                .await?;
            println!(
                "Registered and signed in to {base_url} as {}",
                session.user.display_name()
            );
        }
        AuthCommands::Status => match service.restore_session().await? {
            Some(session) => println!("{}", describe_session(&base_url, &session)),
            None => println!("Not signed in to {base_url}."),
        },
        AuthCommands::Logout => {
            service.logout()?;
            println!("Signed out of {base_url}");
        }
    }
    Ok(())
}

pub fn describe_session(base_url: &str, session: &AuthSession) -> String {
    let expires = session
        .expires_at()
        .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
        .map_or_else(|| "unknown".to_string(), |at| at.to_rfc3339());
    let email = session.user.email.as_deref().unwrap_or("(no email)");
    format!(
        "Signed in to {base_url} as {} <{email}> (expires {expires})",
        session.user.display_name()
    )
}
