use crate::entities::{prelude::*, users};
use crate::utils::hash::hash_password;
use anyhow::{Result, bail};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// Creates a staff account, or promotes an existing account to staff.
/// Registration through the API can never grant these flags; this is the
/// only granting path. The password is only used when a new account is
/// created; promotion keeps the existing credentials.
pub async fn ensure_staff_account(
    db: &DatabaseConnection,
    username: &str,
    password: Option<&str>,
    email: Option<String>,
    superuser: bool,
) -> Result<users::Model> {
    let existing = Users::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?;

    match existing {
        Some(user) => {
            let mut active: users::ActiveModel = user.into();
            active.is_staff = Set(true);
            if superuser {
                active.is_superuser = Set(true);
            }
            Ok(active.update(db).await?)
        }
        None => {
            let Some(password) = password else {
                bail!("a password is required to create a new account");
            };

            let user = users::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                username: Set(username.to_string()),
                password_hash: Set(hash_password(password)?),
                email: Set(email),
                first_name: Set(None),
                last_name: Set(None),
                is_staff: Set(true),
                is_superuser: Set(superuser),
                created_at: Set(Utc::now()),
            };
            Ok(user.insert(db).await?)
        }
    }
}
