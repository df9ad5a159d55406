//! Field descriptors, bound form views, and the cleaning helpers shared by
//! the book and account forms.
//!
//! A form is a fixed list of [`FieldSpec`]s. Validation produces either a
//! cleaned value owned by the caller or a [`FormErrors`] map, and
//! [`FormView`] turns specs, submitted values and errors into the structure
//! handed to the client for display.

use std::collections::BTreeMap;

use serde::{ser::SerializeMap, Serialize, Serializer};

pub const REQUIRED: &str = "This field is required.";

/// Rendering hint for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Widget {
    Text,
    Email,
    Password,
    File,
    Select,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Choice {
    pub value: &'static str,
    pub label: &'static str,
}

/// Static description of one form field.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub widget: Widget,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "is_empty")]
    pub choices: &'static [Choice],
    #[serde(serialize_with = "attrs_as_map")]
    pub attrs: &'static [(&'static str, &'static str)],
}

impl FieldSpec {
    pub const fn text(name: &'static str, label: &'static str, max_length: usize) -> Self {
        Self {
            name,
            label,
            widget: Widget::Text,
            required: true,
            max_length: Some(max_length),
            choices: &[],
            attrs: &[],
        }
    }

    pub const fn with_widget(mut self, widget: Widget) -> Self {
        self.widget = widget;
        self
    }

    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub const fn unbounded(mut self) -> Self {
        self.max_length = None;
        self
    }

    pub const fn with_choices(mut self, choices: &'static [Choice]) -> Self {
        self.choices = choices;
        self
    }

    pub const fn with_attrs(mut self, attrs: &'static [(&'static str, &'static str)]) -> Self {
        self.attrs = attrs;
        self
    }
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

fn attrs_as_map<S: Serializer>(
    attrs: &&'static [(&'static str, &'static str)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(attrs.len()))?;
    for (key, value) in attrs.iter() {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

/// Per-field and form-wide validation messages.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// Flatten into `field: message` lines, for command-line output.
    pub fn messages(&self) -> Vec<String> {
        self.non_field
            .iter()
            .cloned()
            .chain(
                self.fields
                    .iter()
                    .flat_map(|(name, list)| list.iter().map(move |msg| format!("{name}: {msg}"))),
            )
            .collect()
    }
}

/// Displayed values keyed by field name.
pub type FormValues = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    #[serde(flatten)]
    pub spec: FieldSpec,
    pub value: Option<String>,
    pub errors: Vec<String>,
}

/// A form ready for display: field descriptors with their current values and errors.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub is_bound: bool,
    pub fields: Vec<FieldView>,
    pub non_field_errors: Vec<String>,
}

impl FormView {
    /// A form showing initial values only.
    pub fn unbound(specs: &[FieldSpec], initial: &FormValues) -> Self {
        Self::build(specs, initial, &FormErrors::default(), false)
    }

    /// A submitted form redisplayed with its values and errors.
    pub fn bound(specs: &[FieldSpec], values: &FormValues, errors: &FormErrors) -> Self {
        Self::build(specs, values, errors, true)
    }

    fn build(specs: &[FieldSpec], values: &FormValues, errors: &FormErrors, is_bound: bool) -> Self {
        let fields = specs
            .iter()
            .map(|spec| FieldView {
                spec: spec.clone(),
                // passwords are never echoed back
                value: match spec.widget {
                    Widget::Password => None,
                    _ => values.get(spec.name).cloned(),
                },
                errors: errors.field(spec.name).to_vec(),
            })
            .collect();

        Self {
            is_bound,
            fields,
            non_field_errors: errors.non_field().to_vec(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|field| field.spec.name == name)
    }
}

/// Clean a text input: trim it (except for passwords), then enforce
/// required-ness and maximum length. Returns `None` when the field is blank or
/// invalid; errors are recorded in `errors`.
pub fn clean_text(spec: &FieldSpec, raw: Option<&str>, errors: &mut FormErrors) -> Option<String> {
    let raw = raw.unwrap_or("");
    let value = match spec.widget {
        Widget::Password => raw,
        _ => raw.trim(),
    };

    if value.is_empty() {
        if spec.required {
            errors.add(spec.name, REQUIRED);
        }
        return None;
    }

    if let Some(max) = spec.max_length {
        let length = value.chars().count();
        if length > max {
            errors.add(
                spec.name,
                format!("Ensure this value has at most {max} characters (it has {length})."),
            );
            return None;
        }
    }

    Some(value.to_string())
}
