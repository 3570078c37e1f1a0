//! Database operations for the users table.

use lablib_engine::{Role, User, UserId};
use sqlx::{PgConnection, PgExecutor, Row};

/// Insert or refresh a user record.
pub async fn upsert_user<'e>(executor: impl PgExecutor<'e>, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, student_id, name, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            student_id = EXCLUDED.student_id,
            name = EXCLUDED.name,
            role = EXCLUDED.role,
            updated_at = now()
        "#,
    )
    .bind(user.id)
    .bind(&user.student_id)
    .bind(&user.name)
    .bind(user.role.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// Get a user by ID.
pub async fn get_user<'e>(
    executor: impl PgExecutor<'e>,
    id: UserId,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query("SELECT id, student_id, name, role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let role: String = row.try_get("role")?;
    Ok(Some(User {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        name: row.try_get("name")?,
        role: Role::parse(&role).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
    }))
}

/// Share-lock a user row so it cannot be removed while a loan is opened for
/// it. Returns whether the user exists.
pub async fn lock_user(conn: &mut PgConnection, id: UserId) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM users WHERE id = $1 FOR SHARE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.is_some())
}
