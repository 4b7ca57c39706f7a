use chrono::Utc;
use model::entities::user;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::authorization::{authorize, Actor, Operation};
use crate::error::{is_unique_violation, FieldErrors, Result, ServiceError};
use crate::identity::IdentityProvider;
use crate::password::PasswordPolicy;
use crate::validation::{validate_user, UserInput, ValidUser};

const EMAIL_TAKEN: &str = "user with this email address already exists.";
const USERNAME_TAKEN: &str = "user with this username already exists.";

/// Collaborators the account operations need besides the database.
#[derive(Clone, Copy)]
pub struct AccountServices<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub password_policy: &'a dyn PasswordPolicy,
}

/// Flags applied to newly created accounts.
#[derive(Debug, Clone, Copy, Default)]
struct AccountFlags {
    is_staff: bool,
    is_superuser: bool,
}

async fn ensure_unique<C: ConnectionTrait>(
    db: &C,
    email: &str,
    username: &str,
    exclude_id: Option<i32>,
) -> Result<()> {
    let mut errors = FieldErrors::new();

    let mut email_query = user::Entity::find().filter(user::Column::Email.eq(email));
    let mut username_query = user::Entity::find().filter(user::Column::Username.eq(username));
    if let Some(id) = exclude_id {
        email_query = email_query.filter(user::Column::Id.ne(id));
        username_query = username_query.filter(user::Column::Id.ne(id));
    }

    if email_query.one(db).await?.is_some() {
        errors.add("email", EMAIL_TAKEN);
    }
    if username_query.one(db).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }
    errors.into_result()
}

fn map_unique_violation(err: sea_orm::DbErr) -> ServiceError {
    if is_unique_violation(&err) {
        warn!("Concurrent account write hit a unique constraint: {}", err);
        ServiceError::Validation(FieldErrors::single(
            FieldErrors::NON_FIELD,
            "A user with that email or username already exists.",
        ))
    } else {
        err.into()
    }
}

async fn insert_account(
    db: &DatabaseConnection,
    services: AccountServices<'_>,
    valid: ValidUser,
    flags: AccountFlags,
) -> Result<user::Model> {
    let password = valid.password.as_deref().unwrap_or_default();
    let password_hash = services.identity.hash_password(password)?;

    let txn = db.begin().await?;
    ensure_unique(&txn, &valid.email, &valid.username, None).await?;

    let new_user = user::ActiveModel {
        email: Set(valid.email),
        username: Set(valid.username),
        password_hash: Set(password_hash),
        is_staff: Set(flags.is_staff),
        is_superuser: Set(flags.is_superuser),
        is_active: Set(true),
        date_joined: Set(Utc::now()),
        last_login: Set(None),
        ..Default::default()
    };
    let user_model = new_user.insert(&txn).await.map_err(map_unique_violation)?;
    txn.commit().await?;
    Ok(user_model)
}

/// Register a new account. Open to anonymous actors.
#[instrument(skip(db, services, input))]
pub async fn register_user(
    db: &DatabaseConnection,
    services: AccountServices<'_>,
    actor: &Actor,
    input: UserInput,
) -> Result<user::Model> {
    authorize(actor, Operation::RegisterUser, None)?;
    let valid = validate_user(&input, None, true, services.password_policy)?;
    debug!("Registering user with username: {}", valid.username);

    let user_model = insert_account(db, services, valid, AccountFlags::default()).await?;
    info!("User registered with ID: {}, username: {}", user_model.id, user_model.username);
    Ok(user_model)
}

/// Create a staff superuser. Used by the command line, not reachable over HTTP.
#[instrument(skip(db, services, input))]
pub async fn create_superuser(
    db: &DatabaseConnection,
    services: AccountServices<'_>,
    input: UserInput,
) -> Result<user::Model> {
    let valid = validate_user(&input, None, true, services.password_policy)?;
    let flags = AccountFlags {
        is_staff: true,
        is_superuser: true,
    };
    let user_model = insert_account(db, services, valid, flags).await?;
    info!("Superuser created with ID: {}", user_model.id);
    Ok(user_model)
}

#[instrument(skip(db))]
pub async fn list_users(db: &DatabaseConnection, actor: &Actor) -> Result<Vec<user::Model>> {
    authorize(actor, Operation::ListUsers, None)?;
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} users from database", users.len());
    Ok(users)
}

#[instrument(skip(db))]
pub async fn get_user(db: &DatabaseConnection, actor: &Actor, user_id: i32) -> Result<user::Model> {
    authorize(actor, Operation::RetrieveUser, None)?;
    find_user(db, user_id).await
}

async fn find_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User"))
}

/// Update the actor's own account. With `partial` set, absent fields keep
/// their stored values; otherwise email and username are required.
#[instrument(skip(db, services, input))]
pub async fn update_user(
    db: &DatabaseConnection,
    services: AccountServices<'_>,
    actor: &Actor,
    user_id: i32,
    input: UserInput,
    partial: bool,
) -> Result<user::Model> {
    actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_user(&txn, user_id).await?;
    authorize(actor, Operation::UpdateUser, Some(existing.id))?;

    let fallback = partial.then_some(&existing);
    let valid = validate_user(&input, fallback, false, services.password_policy)?;
    ensure_unique(&txn, &valid.email, &valid.username, Some(existing.id)).await?;

    let mut active: user::ActiveModel = existing.into();
    active.email = Set(valid.email);
    active.username = Set(valid.username);
    if let Some(password) = valid.password.as_deref() {
        debug!("Rehashing password for user ID: {}", user_id);
        active.password_hash = Set(services.identity.hash_password(password)?);
    }

    let updated = active.update(&txn).await.map_err(map_unique_violation)?;
    txn.commit().await?;
    info!("User with ID {} updated successfully", user_id);
    Ok(updated)
}

/// Delete the actor's own account together with everything it owns.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, actor: &Actor, user_id: i32) -> Result<()> {
    actor.require_identity()?;
    let txn = db.begin().await?;
    let existing = find_user(&txn, user_id).await?;
    authorize(actor, Operation::DeleteUser, Some(existing.id))?;

    user::Entity::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;
    info!("User with ID {} deleted successfully", user_id);
    Ok(())
}
