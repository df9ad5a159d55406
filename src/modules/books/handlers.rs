//! Catalog pages. Each operation is written once and parameterized by the
//! [`SourceType`] of the URL family it is mounted under.

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use bookshelf_authz::{authorize, Action, Decision};
use bookshelf_http::error::AppError;
use bookshelf_kernel::settings::DeniedDelete;
use serde::Serialize;

use super::{
    forms::{BookDraft, BookForm, BookSubmission, ImageField, SourceTypeInput, UploadedFile},
    models::{Book, NewBook, SourceType},
    store::BookStore,
    UPLOAD_DIR,
};
use crate::{
    forms::FormView,
    modules::accounts::models::{User, UserSummary},
    views::Page,
    AppState,
};

/// How a create page decides the stored source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Forced by the URL family; submitted values are ignored.
    Fixed(SourceType),
    /// Chosen by the submitter on `/book-form/`.
    Selector,
}

impl CreateMode {
    fn source_input(self) -> SourceTypeInput {
        match self {
            CreateMode::Fixed(_) => SourceTypeInput::Ignore,
            CreateMode::Selector => SourceTypeInput::Accept,
        }
    }

    fn action(self) -> String {
        match self {
            CreateMode::Fixed(source) => source.create_path(),
            CreateMode::Selector => "/book-form/".to_string(),
        }
    }

    /// Page label; the selector label follows the submitted choice.
    fn label(self, submitted: Option<&str>) -> &'static str {
        match self {
            CreateMode::Fixed(SourceType::Fbv) => "FBV Create",
            CreateMode::Fixed(SourceType::Cbv) => "CBV Create",
            CreateMode::Selector => match submitted {
                Some("1") => "FBV Form",
                Some("2") => "CBV Form",
                _ => "Book Form",
            },
        }
    }
}

fn update_label(source: SourceType) -> &'static str {
    match source {
        SourceType::Fbv => "FBV Update",
        SourceType::Cbv => "CBV Update",
    }
}

#[derive(Debug, Serialize)]
pub struct BookView {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub image: String,
    pub image_url: String,
    pub source_type: SourceType,
    pub edit_url: String,
    pub delete_url: String,
}

impl BookView {
    fn new(state: &AppState, book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            image: book.image.clone(),
            image_url: state.media.url(&book.image),
            source_type: book.source_type,
            edit_url: book.source_type.edit_path(book.id),
            delete_url: book.source_type.delete_path(book.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListContext {
    user: UserSummary,
    label: &'static str,
    source_type: SourceType,
    create_url: String,
    books: Vec<BookView>,
}

#[derive(Debug, Serialize)]
pub struct FormContext {
    user: UserSummary,
    #[serde(rename = "type")]
    label: &'static str,
    action: String,
    form: FormView,
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<BookView>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmDeleteContext {
    user: UserSummary,
    #[serde(rename = "type")]
    label: &'static str,
    object: BookView,
    can_delete: bool,
    cancel_url: String,
}

#[derive(Debug, Serialize)]
pub struct FamilySummary {
    source_type: SourceType,
    label: &'static str,
    count: i64,
    list_url: String,
    create_url: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardContext {
    user: UserSummary,
    total: i64,
    families: Vec<FamilySummary>,
    selector_url: &'static str,
    logout_url: &'static str,
}

fn store(state: &AppState) -> BookStore {
    BookStore::new(state.pool.clone())
}

async fn load(state: &AppState, id: i64) -> Result<Book, AppError> {
    store(state)
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("book {} not found", id)))
}

/// Reject the request unless the policy allows `action` for `user`.
fn guard(user: &User, action: Action) -> Result<(), &'static str> {
    match authorize(&user.principal(), action) {
        Decision::Allow => Ok(()),
        Decision::Deny { reason } => Err(reason),
    }
}

pub async fn list(state: AppState, user: User, source: SourceType) -> Result<Response, AppError> {
    if let Err(reason) = guard(&user, Action::ListBooks) {
        return Err(AppError::forbidden(reason));
    }

    let books = store(&state).list_by_type(source).await?;
    let books = books.iter().map(|book| BookView::new(&state, book)).collect();

    Ok(Page::new(
        "book_list",
        ListContext {
            user: user.summary(),
            label: source.label(),
            source_type: source,
            create_url: source.create_path(),
            books,
        },
    )
    .into_response())
}

pub async fn create_form(user: User, mode: CreateMode) -> Result<Response, AppError> {
    let form = BookForm::new(None, mode.source_input());
    Ok(Page::new(
        "book_form",
        FormContext {
            user: user.summary(),
            label: mode.label(None),
            action: mode.action(),
            form: form.view(),
            object: None,
        },
    )
    .into_response())
}

pub async fn create_submit(
    state: AppState,
    user: User,
    mode: CreateMode,
    multipart: Multipart,
) -> Result<Response, AppError> {
    if let Err(reason) = guard(&user, Action::CreateBook) {
        return Err(AppError::forbidden(reason));
    }

    let submission = read_submission(multipart).await?;
    let form = BookForm::new(None, mode.source_input());

    let draft = match form.validate(&submission) {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(Page::new(
                "book_form",
                FormContext {
                    user: user.summary(),
                    label: mode.label(submission.source_type.as_deref()),
                    action: mode.action(),
                    form: form.bound_view(&submission, &errors),
                    object: None,
                },
            )
            .into_response())
        }
    };

    let source_type = match mode {
        CreateMode::Fixed(source) => source,
        CreateMode::Selector => draft.source_type.unwrap_or_default(),
    };
    let image = store_image(&state, &draft, None).await?;
    let inserted = store(&state)
        .insert(&NewBook {
            title: draft.title,
            author: draft.author,
            image: image.clone(),
            source_type,
        })
        .await;
    let book = match inserted {
        Ok(book) => book,
        Err(err) => {
            discard_upload(&state, &image).await;
            return Err(err.into());
        }
    };

    tracing::debug!(book_id = book.id, user_id = user.id, "create accepted");
    Ok(Redirect::to(&book.source_type.list_path()).into_response())
}

pub async fn update_form(
    state: AppState,
    user: User,
    id: i64,
    source: SourceType,
) -> Result<Response, AppError> {
    let book = load(&state, id).await?;
    let form = BookForm::new(Some(&book), SourceTypeInput::Ignore);

    Ok(Page::new(
        "book_form",
        FormContext {
            user: user.summary(),
            label: update_label(source),
            action: source.edit_path(id),
            form: form.view(),
            object: Some(BookView::new(&state, &book)),
        },
    )
    .into_response())
}

pub async fn update_submit(
    state: AppState,
    user: User,
    id: i64,
    source: SourceType,
    multipart: Multipart,
) -> Result<Response, AppError> {
    if let Err(reason) = guard(&user, Action::UpdateBook) {
        return Err(AppError::forbidden(reason));
    }

    let mut book = load(&state, id).await?;
    let submission = read_submission(multipart).await?;
    let form = BookForm::new(Some(&book), SourceTypeInput::Ignore);

    let draft = match form.validate(&submission) {
        Ok(draft) => draft,
        Err(errors) => {
            return Ok(Page::new(
                "book_form",
                FormContext {
                    user: user.summary(),
                    label: update_label(source),
                    action: source.edit_path(id),
                    form: form.bound_view(&submission, &errors),
                    object: Some(BookView::new(&state, &book)),
                },
            )
            .into_response())
        }
    };

    let replaced = matches!(draft.image, ImageField::Replace(_));
    book.image = store_image(&state, &draft, Some(&book)).await?;
    book.title = draft.title;
    book.author = draft.author;

    let updated = store(&state).update(&book).await;
    if replaced && !matches!(updated, Ok(true)) {
        discard_upload(&state, &book.image).await;
    }
    if !updated? {
        return Err(AppError::not_found(format!("book {} not found", id)));
    }
    Ok(Redirect::to(&book.source_type.list_path()).into_response())
}

pub async fn delete_confirm(
    state: AppState,
    user: User,
    id: i64,
    source: SourceType,
) -> Result<Response, AppError> {
    let book = load(&state, id).await?;

    Ok(Page::new(
        "book_confirm_delete",
        ConfirmDeleteContext {
            can_delete: guard(&user, Action::DeleteBook).is_ok(),
            user: user.summary(),
            label: source.label(),
            cancel_url: book.source_type.list_path(),
            object: BookView::new(&state, &book),
        },
    )
    .into_response())
}

pub async fn delete_submit(
    state: AppState,
    user: User,
    id: i64,
    source: SourceType,
) -> Result<Response, AppError> {
    if let Err(reason) = guard(&user, Action::DeleteBook) {
        return denied_delete(&state, reason);
    }

    let book = load(&state, id).await?;
    if !store(&state).delete(book.id).await? {
        return Err(AppError::not_found(format!("book {} not found", id)));
    }

    tracing::debug!(book_id = id, family = source.slug(), user_id = user.id, "delete accepted");
    Ok(Redirect::to(&book.source_type.list_path()).into_response())
}

fn denied_delete(state: &AppState, reason: &'static str) -> Result<Response, AppError> {
    match state.settings.auth.denied_delete {
        DeniedDelete::Redirect => {
            Ok(Redirect::to(&state.settings.auth.dashboard_url).into_response())
        }
        DeniedDelete::Forbidden => Err(AppError::forbidden(format!(
            "You do not have permission to delete books ({}).",
            reason
        ))),
    }
}

pub async fn dashboard(state: AppState, user: User) -> Result<Response, AppError> {
    let books = store(&state);
    let mut families = Vec::with_capacity(SourceType::ALL.len());
    for source in SourceType::ALL {
        families.push(FamilySummary {
            source_type: source,
            label: source.label(),
            count: books.count_by_type(source).await?,
            list_url: source.list_path(),
            create_url: source.create_path(),
        });
    }

    Ok(Page::new(
        "dashboard",
        DashboardContext {
            user: user.summary(),
            total: books.count().await?,
            families,
            selector_url: "/book-form/",
            logout_url: "/logout/",
        },
    )
    .into_response())
}

/// Save a replacement upload and return the image path the record should
/// point at.
async fn store_image(
    state: &AppState,
    draft: &BookDraft,
    current: Option<&Book>,
) -> Result<String, AppError> {
    match (&draft.image, current) {
        (ImageField::Replace(image), _) => Ok(state
            .media
            .save(UPLOAD_DIR, &image.original_name, image.extension, &image.bytes)
            .await?),
        (ImageField::Keep, Some(book)) => Ok(book.image.clone()),
        (ImageField::Keep, None) => Err(AppError::bad_request("an image is required")),
    }
}

/// Remove a freshly saved upload that no record ended up referencing.
async fn discard_upload(state: &AppState, image: &str) {
    if let Err(err) = state.media.remove(image).await {
        tracing::warn!(error = %err, path = %image, "failed to discard upload");
    }
}

async fn read_submission(mut multipart: Multipart) -> Result<BookSubmission, AppError> {
    let mut submission = BookSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                submission.image = Some(UploadedFile { file_name, bytes });
            }
            "title" => submission.title = Some(field.text().await.map_err(multipart_error)?),
            "author" => submission.author = Some(field.text().await.map_err(multipart_error)?),
            "source_type" => {
                submission.source_type = Some(field.text().await.map_err(multipart_error)?)
            }
            other => tracing::trace!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(submission)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large(err.body_text())
    } else {
        AppError::bad_request(err.body_text())
    }
}
