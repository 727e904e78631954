use crate::error::{StoreError, StoreResult};
use crate::models::{Book, NewBook, NewReview, Review, Role, User};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

/// Repository Trait
///
/// The Record Store contract: every read and write of books, reviews and accounts goes
/// through here. Each method is a single atomic statement (account creation is one
/// transaction); nothing is cached between calls.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's
/// request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Catalog Reads ---
    // All books in storage order, each with its reviews attached.
    async fn list_books(&self) -> StoreResult<Vec<Book>>;
    // `None` when no row matches; never an error for a missing id.
    async fn get_book(&self, id: i64) -> StoreResult<Option<Book>>;
    // Empty when the book has no reviews (or does not exist).
    async fn list_reviews(&self, book_id: i64) -> StoreResult<Vec<Review>>;

    // --- Catalog Writes ---
    // Returns the generated id. `Conflict` when (title, author) already exists.
    async fn add_book(&self, book: &NewBook) -> StoreResult<i64>;
    // Returns the affected-row count (1 on success).
    async fn add_review(&self, review: &NewReview) -> StoreResult<u64>;

    // --- Identity Store ---
    async fn get_user(&self, username: &str) -> StoreResult<Option<User>>;
    // `Conflict` when the username is taken.
    async fn create_user(&self, user: &User) -> StoreResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// connect
///
/// Opens the SQLite pool described by `db_url`. An in-memory database lives only as
/// long as its connection, so it is pinned to a single connection that never expires.
pub async fn connect(db_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    pool.connect_with(options).await
}

/// migrate
///
/// Applies the embedded schema migrations from `./migrations`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    /// list_books
    ///
    /// One query for the books, then one per book for its reviews. No explicit ordering.
    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let mut books = sqlx::query_as::<_, Book>("SELECT id, title, author FROM books")
            .fetch_all(&self.pool)
            .await?;

        for book in &mut books {
            book.reviews = self.list_reviews(book.id).await?;
        }

        Ok(books)
    }

    /// get_book
    ///
    /// Primary-key lookup. A missing row becomes `None` via `fetch_optional`.
    async fn get_book(&self, id: i64) -> StoreResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT id, title, author FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match book {
            Some(mut book) => {
                book.reviews = self.list_reviews(book.id).await?;
                Ok(Some(book))
            }
            None => {
                tracing::debug!(book_id = id, "Book not found");
                Ok(None)
            }
        }
    }

    async fn list_reviews(&self, book_id: i64) -> StoreResult<Vec<Review>> {
        let reviews =
            sqlx::query_as::<_, Review>("SELECT id, bookId, text FROM reviews WHERE bookId = ?")
                .bind(book_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(reviews)
    }

    /// add_book
    ///
    /// The `UNIQUE (title, author)` constraint is the only duplicate check; its violation
    /// is translated into `StoreError::Conflict`.
    async fn add_book(&self, book: &NewBook) -> StoreResult<i64> {
        let result = sqlx::query("INSERT INTO books (title, author) VALUES (?, ?)")
            .bind(&book.title)
            .bind(&book.author)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "Title + Author"))?;

        Ok(result.last_insert_rowid())
    }

    /// add_review
    ///
    /// No uniqueness rule and no check that the book exists.
    async fn add_review(&self, review: &NewReview) -> StoreResult<u64> {
        let result = sqlx::query("INSERT INTO reviews (bookId, text) VALUES (?, ?)")
            .bind(review.book_id)
            .bind(&review.text)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// get_user
    ///
    /// Loads the account row and its authorities. Unknown authority strings are skipped.
    async fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (String, String, bool)>(
            "SELECT username, password, enabled FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some((username, password_hash, enabled)) = row else {
            return Ok(None);
        };

        let authorities = sqlx::query_scalar::<_, String>(
            "SELECT authority FROM authorities WHERE username = ?",
        )
        .bind(&username)
        .fetch_all(&self.pool)
        .await?;

        let roles = authorities
            .iter()
            .filter_map(|a| Role::from_authority(a))
            .collect();

        Ok(Some(User {
            username,
            password_hash,
            enabled,
            roles,
        }))
    }

    /// create_user
    ///
    /// Inserts the account and its authorities in one transaction.
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (username, password, enabled) VALUES (?, ?, ?)")
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.enabled)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_insert(e, "Username"))?;

        for role in &user.roles {
            sqlx::query("INSERT INTO authorities (username, authority) VALUES (?, ?)")
                .bind(&user.username)
                .bind(role.authority())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
