use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, sqlite::SqliteRow};
use std::collections::BTreeSet;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Catalog Records (Mapped to Database) ---

/// Book
///
/// A row of the `books` table. `reviews` is not a column: the repository attaches the
/// book's reviews after the row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl<'r> FromRow<'r, SqliteRow> for Book {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Book {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            reviews: Vec::new(),
        })
    }
}

/// Review
///
/// A row of the `reviews` table. Serialized with the `bookId` field name the
/// clients of the API surface expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub book_id: i64,
    pub text: String,
}

impl<'r> FromRow<'r, SqliteRow> for Review {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Review {
            id: row.try_get("id")?,
            book_id: row.try_get("bookId")?,
            text: row.try_get("text")?,
        })
    }
}

// --- Request Payloads (Input Schemas) ---

/// NewBook
///
/// Input payload for `POST /books` and the admin add-book form. Any `id` or
/// `reviews` sent by the client is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewBook {
    #[schema(example = "Dune")]
    pub title: String,
    #[schema(example = "Herbert")]
    pub author: String,
}

impl NewBook {
    /// Returns the name of the first blank field, if any.
    pub fn blank_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.author.trim().is_empty() {
            Some("author")
        } else {
            None
        }
    }

    /// Attaches the generated id. A freshly inserted book has no reviews yet.
    pub fn into_book(self, id: i64) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            reviews: Vec::new(),
        }
    }
}

/// NewReview
///
/// Form payload for `POST /user/add-review`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub book_id: i64,
    #[serde(default)]
    pub text: String,
}

/// Message
///
/// Status/message body returned by the API surface on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Message {
    pub status: String,
    pub message: String,
}

impl Message {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

// --- Identity Store ---

/// Role
///
/// The two authorities a user can hold. Persisted in the `authorities` table with the
/// `ROLE_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn authority(self) -> &'static str {
        match self {
            Role::User => "ROLE_USER",
            Role::Admin => "ROLE_ADMIN",
        }
    }

    pub fn from_authority(authority: &str) -> Option<Self> {
        match authority {
            "ROLE_USER" => Some(Role::User),
            "ROLE_ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// User
///
/// An account of the identity store. `password_hash` is an Argon2id PHC string and
/// never leaves the server.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
}

/// Credentials
///
/// Form payload shared by `POST /login` and `POST /register`. No `Debug`: it carries
/// the plaintext password.
#[derive(Clone, Deserialize, Default)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
