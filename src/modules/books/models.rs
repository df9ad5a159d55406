use serde::{Deserialize, Serialize};

/// Which URL family created a book. Stored as `1` / `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum SourceType {
    #[default]
    Fbv = 1,
    Cbv = 2,
}

impl SourceType {
    pub const ALL: [SourceType; 2] = [SourceType::Fbv, SourceType::Cbv];

    pub const fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SourceType::Fbv),
            2 => Some(SourceType::Cbv),
            _ => None,
        }
    }

    /// Display label, also the delete confirmation label.
    pub const fn label(self) -> &'static str {
        match self {
            SourceType::Fbv => "FBV",
            SourceType::Cbv => "CBV",
        }
    }

    /// Path suffix of this family's routes.
    pub const fn slug(self) -> &'static str {
        match self {
            SourceType::Fbv => "fbv",
            SourceType::Cbv => "cbv",
        }
    }

    pub fn list_path(self) -> String {
        format!("/hello-{}/", self.slug())
    }

    pub fn create_path(self) -> String {
        format!("/books/create-{}/", self.slug())
    }

    pub fn edit_path(self, id: i64) -> String {
        format!("/books/{}/edit-{}/", id, self.slug())
    }

    pub fn delete_path(self, id: i64) -> String {
        format!("/books/{}/delete-{}/", id, self.slug())
    }
}

impl From<SourceType> for i64 {
    fn from(value: SourceType) -> Self {
        value.code()
    }
}

impl TryFrom<i64> for SourceType {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        SourceType::from_code(code).ok_or_else(|| format!("unknown source type {}", code))
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Stored path relative to the media root, e.g. `books/dune.png`.
    pub image: String,
    pub source_type: SourceType,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookRow {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub image: String,
    pub source_type: i64,
}

impl TryFrom<BookRow> for Book {
    type Error = anyhow::Error;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let source_type = SourceType::from_code(row.source_type).ok_or_else(|| {
            anyhow::anyhow!("book {} has unknown source type {}", row.id, row.source_type)
        })?;
        Ok(Book {
            id: row.id,
            title: row.title,
            author: row.author,
            image: row.image,
            source_type,
        })
    }
}

/// Fields of a book about to be inserted or written back.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub image: String,
    pub source_type: SourceType,
}
