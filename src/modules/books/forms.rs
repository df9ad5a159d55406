//! The book form: title, author, cover image and, on the selector page only,
//! the source type.

use std::io::Cursor;

use axum::body::Bytes;
use image::{ImageFormat, ImageReader};

use super::models::{Book, SourceType};
use crate::forms::{clean_text, Choice, FieldSpec, FormErrors, FormValues, FormView, Widget, REQUIRED};

pub const TITLE: FieldSpec = FieldSpec::text("title", "Title", 200);
pub const AUTHOR: FieldSpec = FieldSpec::text("author", "Author", 200);
pub const IMAGE: FieldSpec = FieldSpec::text("image", "Image", 0)
    .unbounded()
    .with_widget(Widget::File)
    .with_attrs(&[("accept", "image/*")]);
pub const SOURCE_TYPE: FieldSpec = FieldSpec::text("source_type", "Source type", 0)
    .unbounded()
    .with_widget(Widget::Select)
    .optional()
    .with_choices(&[
        Choice { value: "1", label: "FBV" },
        Choice { value: "2", label: "CBV" },
    ]);

pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an \
                                 image or a corrupted image.";

/// A file part of a multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Raw values of a submitted book form.
#[derive(Debug, Clone, Default)]
pub struct BookSubmission {
    pub title: Option<String>,
    pub author: Option<String>,
    pub image: Option<UploadedFile>,
    pub source_type: Option<String>,
}

/// An upload that decoded as a supported image.
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub original_name: String,
    /// Canonical extension of the detected format.
    pub extension: &'static str,
    pub width: u32,
    pub height: u32,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub enum ImageField {
    /// Keep the image of the bound record.
    Keep,
    Replace(ValidImage),
}

/// A validated, not yet persisted book.
#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub image: ImageField,
    /// Chosen type when the form accepts one; otherwise decided by the caller.
    pub source_type: Option<SourceType>,
}

/// Whether submitted `source_type` values are read at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTypeInput {
    Ignore,
    Accept,
}

/// Book form, optionally bound to an existing record.
#[derive(Debug, Clone, Copy)]
pub struct BookForm<'a> {
    instance: Option<&'a Book>,
    source_type: SourceTypeInput,
}

impl<'a> BookForm<'a> {
    pub fn new(instance: Option<&'a Book>, source_type: SourceTypeInput) -> Self {
        Self {
            instance,
            source_type,
        }
    }

    fn fields(&self) -> Vec<FieldSpec> {
        let image = if self.instance.is_some() {
            IMAGE.optional()
        } else {
            IMAGE
        };
        let mut fields = vec![TITLE, AUTHOR, image];
        if self.source_type == SourceTypeInput::Accept {
            fields.push(SOURCE_TYPE);
        }
        fields
    }

    fn initial(&self) -> FormValues {
        let mut values = FormValues::new();
        if let Some(book) = self.instance {
            values.insert(TITLE.name, book.title.clone());
            values.insert(AUTHOR.name, book.author.clone());
            values.insert(IMAGE.name, book.image.clone());
        }
        values
    }

    /// The form before any submission.
    pub fn view(&self) -> FormView {
        FormView::unbound(&self.fields(), &self.initial())
    }

    /// A rejected submission shown again with its errors.
    pub fn bound_view(&self, submission: &BookSubmission, errors: &FormErrors) -> FormView {
        let mut values = self.initial();
        for (name, value) in [
            (TITLE.name, &submission.title),
            (AUTHOR.name, &submission.author),
            (SOURCE_TYPE.name, &submission.source_type),
        ] {
            match value {
                Some(value) => {
                    values.insert(name, value.clone());
                }
                None => {
                    values.remove(name);
                }
            }
        }
        FormView::bound(&self.fields(), &values, errors)
    }

    pub fn validate(&self, submission: &BookSubmission) -> Result<BookDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let title = clean_text(&TITLE, submission.title.as_deref(), &mut errors);
        let author = clean_text(&AUTHOR, submission.author.as_deref(), &mut errors);

        let image = match submission.image.as_ref().filter(|file| !is_blank_part(file)) {
            Some(file) => match check_image(file) {
                Ok(valid) => Some(ImageField::Replace(valid)),
                Err(message) => {
                    errors.add(IMAGE.name, message);
                    None
                }
            },
            None if self.instance.is_some() => Some(ImageField::Keep),
            None => {
                errors.add(IMAGE.name, REQUIRED);
                None
            }
        };

        let source_type = match self.source_type {
            SourceTypeInput::Ignore => None,
            SourceTypeInput::Accept => match parse_source_type(submission.source_type.as_deref()) {
                Ok(source) => Some(source),
                Err(message) => {
                    errors.add(SOURCE_TYPE.name, message);
                    None
                }
            },
        };

        match (title, author, image) {
            (Some(title), Some(author), Some(image)) if errors.is_empty() => Ok(BookDraft {
                title,
                author,
                image,
                source_type,
            }),
            _ => Err(errors),
        }
    }
}

/// Browsers send an unnamed, empty part when no file is picked.
fn is_blank_part(file: &UploadedFile) -> bool {
    file.file_name.is_empty() && file.bytes.is_empty()
}

/// Blank selects fall back to FBV.
pub fn parse_source_type(raw: Option<&str>) -> Result<SourceType, String> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Ok(SourceType::default());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(SourceType::from_code)
        .ok_or_else(|| format!("Select a valid choice. {} is not one of the available choices.", raw))
}

fn check_image(file: &UploadedFile) -> Result<ValidImage, &'static str> {
    if file.bytes.is_empty() {
        return Err(EMPTY_FILE);
    }

    let reader = ImageReader::new(Cursor::new(file.bytes.as_ref()))
        .with_guessed_format()
        .map_err(|_| INVALID_IMAGE)?;
    let format = match reader.format() {
        Some(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP)) => {
            format
        }
        _ => return Err(INVALID_IMAGE),
    };
    let extension = format.extensions_str().first().copied().ok_or(INVALID_IMAGE)?;
    let (width, height) = reader.into_dimensions().map_err(|_| INVALID_IMAGE)?;

    Ok(ValidImage {
        original_name: file.file_name.clone(),
        extension,
        width,
        height,
        bytes: file.bytes.clone(),
    })
}
