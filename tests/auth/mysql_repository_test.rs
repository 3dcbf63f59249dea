use chrono::{Duration, Utc};
use smartbudget::config::DbPool;
use smartbudget::modules::auth::{
    crud::{RefreshTokenCrud, UserCrud},
    interface::{AuthError, RefreshTokenRepository, UserRepository},
    model::{RefreshToken, User},
};
use smartbudget::modules::category::{
    crud::CategoryCrud,
    model::{default_categories_for, Category, CategoryRepository, CategoryType},
};
use smartbudget::services::tokens::{random_token, token_digest, ONE_TIME_TOKEN_BYTES, REFRESH_TOKEN_BYTES};
use uuid::Uuid;

use crate::common::{mysql_pool, test_email, test_username};

fn new_user(email: &str, username: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        username: username.to_string(),
        password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c29tZXNhbHQ$aGFzaA".to_string(),
        first_name: None,
        last_name: None,
        is_active: true,
        is_email_verified: true,
        email_verify_token: None,
        reset_token: None,
        reset_token_expiry: None,
        failed_login_attempts: 0,
        lockout_until: None,
        two_factor_enabled: false,
        two_factor_secret: None,
        last_login: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_refresh_token(user_id: &str) -> RefreshToken {
    let now = Utc::now();
    RefreshToken {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        token_hash: token_digest(&random_token(REFRESH_TOKEN_BYTES)),
        expires_at: now + Duration::days(7),
        revoked: false,
        created_at: now,
    }
}

async fn delete_user(db: &DbPool, id: &str) {
    // refresh_tokens and categories cascade
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await
        .ok();
}

#[tokio::test]
async fn rotating_the_same_refresh_token_twice_succeeds_once() {
    let Some(db) = mysql_pool().await else { return };
    let users = UserCrud::new(db.clone());
    let tokens = RefreshTokenCrud::new(db.clone());

    let user = new_user(&test_email(), &test_username());
    users.create(&user).await.unwrap();
    let original = new_refresh_token(&user.id);
    tokens.create(&original).await.unwrap();

    let now = Utc::now();
    let first = new_refresh_token(&user.id);
    let second = new_refresh_token(&user.id);
    assert!(tokens.rotate(&original.token_hash, &first, now).await.unwrap());
    assert!(!tokens.rotate(&original.token_hash, &second, now).await.unwrap());

    let stored = tokens.find_by_token_hash(&original.token_hash).await.unwrap().unwrap();
    assert!(stored.revoked);
    assert!(tokens.find_by_token_hash(&first.token_hash).await.unwrap().is_some());
    // The losing rotation rolled back its insert
    assert!(tokens.find_by_token_hash(&second.token_hash).await.unwrap().is_none());

    delete_user(&db, &user.id).await;
}

#[tokio::test]
async fn duplicate_email_insert_maps_to_user_exists() {
    let Some(db) = mysql_pool().await else { return };
    let users = UserCrud::new(db.clone());

    let email = test_email();
    let user = new_user(&email, &test_username());
    users.create(&user).await.unwrap();

    // Straight to the insert, as a racing registration would after both passed the pre-check
    let duplicate = new_user(&email, &test_username());
    assert!(matches!(users.create(&duplicate).await, Err(AuthError::UserExists)));
    assert!(users.find_by_id(&duplicate.id).await.unwrap().is_none());

    delete_user(&db, &user.id).await;
}

#[tokio::test]
async fn reset_token_completes_only_once() {
    let Some(db) = mysql_pool().await else { return };
    let users = UserCrud::new(db.clone());

    let user = new_user(&test_email(), &test_username());
    users.create(&user).await.unwrap();

    let digest = token_digest(&random_token(ONE_TIME_TOKEN_BYTES));
    let now = Utc::now();
    users
        .set_reset_token(&user.id, &digest, now + Duration::hours(1))
        .await
        .unwrap();

    let found = users.find_by_reset_token(&digest, now).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id.clone()));

    assert!(users.complete_password_reset(&user.id, &digest, "first-hash").await.unwrap());
    assert!(!users.complete_password_reset(&user.id, &digest, "second-hash").await.unwrap());

    let stored = users.find_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash, "first-hash");
    assert_eq!(stored.reset_token, None);
    assert!(users.find_by_reset_token(&digest, now).await.unwrap().is_none());

    delete_user(&db, &user.id).await;
}

#[tokio::test]
async fn default_categories_round_trip_through_enum_column() {
    let Some(db) = mysql_pool().await else { return };
    let users = UserCrud::new(db.clone());
    let categories = CategoryCrud::new(db.clone());

    let user = new_user(&test_email(), &test_username());
    users.create(&user).await.unwrap();

    categories
        .create_batch(&default_categories_for(&user.id, Utc::now()))
        .await
        .unwrap();

    let stored = sqlx::query_as::<_, Category>(
        "SELECT id, user_id, name, icon, color, type, created_at FROM categories WHERE user_id = ?",
    )
    .bind(&user.id)
    .fetch_all(&db)
    .await
    .unwrap();
    assert_eq!(stored.len(), 8);
    assert_eq!(stored.iter().filter(|c| c.kind == CategoryType::Income).count(), 2);
    let salaire = stored.iter().find(|c| c.name == "Salaire").expect("Salaire category");
    assert_eq!(salaire.kind, CategoryType::Income);

    delete_user(&db, &user.id).await;
}
