use anyhow::{Context, Result};
use service::users::{self, AccountServices};
use service::validation::UserInput;
use service::{DefaultPasswordPolicy, JwtIdentityProvider};
use tracing::{debug, error, info, trace};

use super::initdb::connect;
use crate::config::Settings;

#[derive(clap::Args, Clone)]
pub struct SuperuserArgs {
    /// Email address of the new account
    #[arg(long)]
    pub email: String,

    /// Username of the new account
    #[arg(long)]
    pub username: String,

    /// Password of the new account
    #[arg(long, env = "SUPERUSER_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl std::fmt::Debug for SuperuserArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperuserArgs")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

pub async fn create_superuser(settings: &Settings, args: SuperuserArgs) -> Result<()> {
    trace!("Entering create_superuser function");
    info!("Creating superuser '{}'", args.username);
    debug!("Database URL: {}", settings.database_url);

    let db = connect(&settings.database_url).await?;
    let identity = JwtIdentityProvider::new(&settings.identity).context("Invalid identity configuration")?;
    let password_policy = DefaultPasswordPolicy::new(settings.password.clone());
    let services = AccountServices {
        identity: &identity,
        password_policy: &password_policy,
    };

    let input = UserInput {
        email: Some(args.email),
        username: Some(args.username),
        password: Some(args.password),
    };
    match users::create_superuser(&db, services, input).await {
        Ok(user_model) => {
            info!(
                "Superuser '{}' created with ID {}",
                user_model.username, user_model.id
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to create superuser: {}", e);
            Err(e.into())
        }
    }
}
