//! # Draft Validation
//!
//! Each entity declares its validation table as a [`Validator`]: an ordered list of
//! `(field, check)` pairs evaluated entirely client-side. A draft either passes every
//! rule or is rejected as a whole with a [`FieldErrors`] map naming each offending field.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Per-field validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field`. The first message recorded for a field wins.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

type Check<D> = Box<dyn Fn(&D) -> Option<String> + Send + Sync>;

/// An ordered table of field rules for a draft type `D`.
///
/// ```rust
/// use crud_sync::Validator;
///
/// #[derive(Default)]
/// struct Signup { login: String, password: String }
///
/// let rules = Validator::<Signup>::new()
///     .required("login", "Login is required", |d| &d.login)
///     .min_len("password", 8, "Password must be at least 8 characters long", |d| &d.password);
///
/// let errors = rules.validate(&Signup::default()).unwrap_err();
/// assert_eq!(errors.get("login"), Some("Login is required"));
/// assert_eq!(errors.len(), 2);
/// ```
pub struct Validator<D> {
    rules: Vec<(&'static str, Check<D>)>,
}

impl<D> Default for Validator<D> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<D: 'static> Validator<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom rule. `check` returns the message to show when the field is invalid.
    pub fn rule<F>(mut self, field: &'static str, check: F) -> Self
    where
        F: Fn(&D) -> Option<String> + Send + Sync + 'static,
    {
        self.rules.push((field, Box::new(check)));
        self
    }

    /// Fails when the trimmed text is empty.
    pub fn required<F>(self, field: &'static str, message: &'static str, get: F) -> Self
    where
        F: Fn(&D) -> &str + Send + Sync + 'static,
    {
        self.rule(field, move |draft| {
            get(draft).trim().is_empty().then(|| message.to_string())
        })
    }

    /// Fails when the text has fewer than `min` characters.
    pub fn min_len<F>(self, field: &'static str, min: usize, message: &'static str, get: F) -> Self
    where
        F: Fn(&D) -> &str + Send + Sync + 'static,
    {
        self.rule(field, move |draft| {
            (get(draft).chars().count() < min).then(|| message.to_string())
        })
    }

    /// Fails when the value falls outside `range`.
    pub fn range<N, F>(
        self,
        field: &'static str,
        range: RangeInclusive<N>,
        message: &'static str,
        get: F,
    ) -> Self
    where
        N: PartialOrd + Send + Sync + 'static,
        F: Fn(&D) -> N + Send + Sync + 'static,
    {
        self.rule(field, move |draft| {
            (!range.contains(&get(draft))).then(|| message.to_string())
        })
    }

    /// Fails unless the value is one of `allowed` (enumerated codes).
    pub fn one_of<N, F>(
        self,
        field: &'static str,
        allowed: &'static [N],
        message: &'static str,
        get: F,
    ) -> Self
    where
        N: PartialEq + Sync + 'static,
        F: Fn(&D) -> N + Send + Sync + 'static,
    {
        self.rule(field, move |draft| {
            let value = get(draft);
            (!allowed.contains(&value)).then(|| message.to_string())
        })
    }

    /// Names of the fields covered by at least one rule, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for (field, _) in &self.rules {
            if !seen.contains(field) {
                seen.push(*field);
            }
        }
        seen
    }

    /// Runs every rule. Only the first failing rule of each field is reported.
    pub fn validate(&self, draft: &D) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (field, check) in &self.rules {
            if errors.contains(field) {
                continue;
            }
            if let Some(message) = check(draft) {
                errors.insert(*field, message);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
