//! Fixtures shared by the model and handler tests.

use sqlx::SqlitePool;

use super::{insert_product, insert_user, NewUser, Product, ProductFields, User, UserRole};

pub async fn seed_user(db: &SqlitePool, email: &str) -> User {
    seed_user_with_role(db, email, UserRole::User).await
}

pub async fn seed_user_with_role(db: &SqlitePool, email: &str, role: UserRole) -> User {
    insert_user(
        db,
        NewUser {
            name: email.split('@').next().unwrap_or(email),
            email,
            password_hash: "not-a-real-hash",
            username: None,
            role,
        },
    )
    .await
    .unwrap()
}

pub async fn seed_product(db: &SqlitePool, owner_id: &str, sku: &str) -> Product {
    insert_product(
        db,
        owner_id,
        &ProductFields {
            name: sku,
            sku,
            price: 1.25,
            quantity: 10,
            status: super::DEFAULT_PRODUCT_STATUS,
            category_id: None,
            supplier_id: None,
        },
    )
    .await
    .unwrap()
}
