use anyhow::Context;
use bookshelf_db::DbPool;

use super::models::{Book, BookRow, NewBook, SourceType};

const COLUMNS: &str = "id, title, author, image, source_type";

/// Persistence for [`Book`] records.
#[derive(Clone)]
pub struct BookStore {
    pool: DbPool,
}

impl BookStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Books of one family, oldest first.
    pub async fn list_by_type(&self, source_type: SourceType) -> anyhow::Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {COLUMNS} FROM book WHERE source_type = ? ORDER BY id"
        ))
        .bind(source_type.code())
        .fetch_all(&self.pool)
        .await
        .context("failed to list books")?;

        rows.into_iter().map(Book::try_from).collect()
    }

    pub async fn get(&self, id: i64) -> anyhow::Result<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(&format!("SELECT {COLUMNS} FROM book WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load book")?;

        row.map(Book::try_from).transpose()
    }

    pub async fn insert(&self, new: &NewBook) -> anyhow::Result<Book> {
        let done = sqlx::query(
            "INSERT INTO book (title, author, image, source_type) VALUES (?, ?, ?, ?)",
        )
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.image)
        .bind(new.source_type.code())
        .execute(&self.pool)
        .await
        .context("failed to insert book")?;

        let book = Book {
            id: done.last_insert_rowid(),
            title: new.title.clone(),
            author: new.author.clone(),
            image: new.image.clone(),
            source_type: new.source_type,
        };
        tracing::info!(
            book_id = book.id,
            source_type = book.source_type.code(),
            title = %book.title,
            "book created"
        );
        Ok(book)
    }

    /// Write title, author and image back. `source_type` never changes after
    /// creation. Returns `false` if the record no longer exists.
    pub async fn update(&self, book: &Book) -> anyhow::Result<bool> {
        let done = sqlx::query("UPDATE book SET title = ?, author = ?, image = ? WHERE id = ?")
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.image)
            .bind(book.id)
            .execute(&self.pool)
            .await
            .context("failed to update book")?;

        let updated = done.rows_affected() > 0;
        if updated {
            tracing::info!(book_id = book.id, "book updated");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM book WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete book")?;

        let deleted = done.rows_affected() > 0;
        if deleted {
            tracing::info!(book_id = id, "book deleted");
        }
        Ok(deleted)
    }

    pub async fn count(&self) -> anyhow::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM book")
            .fetch_one(&self.pool)
            .await
            .context("failed to count books")
    }

    pub async fn count_by_type(&self, source_type: SourceType) -> anyhow::Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM book WHERE source_type = ?")
            .bind(source_type.code())
            .fetch_one(&self.pool)
            .await
            .context("failed to count books")
    }
}
