//! Fixtures shared by the service unit tests.

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use model::entities::{like, review, user};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

use crate::authorization::{Actor, Identity};
use crate::identity::{tests::test_config, IdentityProvider, JwtIdentityProvider};
use crate::password::DefaultPasswordPolicy;
use crate::users::AccountServices;

pub(crate) const TEST_PASSWORD: &str = "Test-Password-2024";

pub(crate) async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub(crate) struct TestServices {
    pub identity: JwtIdentityProvider,
    pub password_policy: DefaultPasswordPolicy,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            identity: JwtIdentityProvider::new(&test_config()).expect("Failed to build identity provider"),
            password_policy: DefaultPasswordPolicy::default(),
        }
    }

    pub fn accounts(&self) -> AccountServices<'_> {
        AccountServices {
            identity: &self.identity,
            password_policy: &self.password_policy,
        }
    }

    pub async fn create_user(&self, db: &DatabaseConnection, email: &str, username: &str) -> user::Model {
        user::ActiveModel {
            email: Set(email.to_string()),
            username: Set(username.to_string()),
            password_hash: Set(self.identity.hash_password(TEST_PASSWORD).unwrap()),
            is_staff: Set(false),
            is_superuser: Set(false),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
            last_login: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to insert test user")
    }
}

pub(crate) fn actor_for(user: &user::Model) -> Actor {
    Actor::User(Identity::from(user.clone()))
}

pub(crate) async fn insert_review(
    db: &DatabaseConnection,
    author: &user::Model,
    movie_title: &str,
    rating: i32,
) -> review::Model {
    review::ActiveModel {
        movie_title: Set(movie_title.to_string()),
        content: Set(format!("Thoughts about {movie_title}")),
        rating: Set(rating),
        user_id: Set(author.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert test review")
}

pub(crate) async fn insert_like(db: &DatabaseConnection, user: &user::Model, review: &review::Model) -> like::Model {
    like::ActiveModel {
        user_id: Set(user.id),
        review_id: Set(review.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to insert test like")
}
