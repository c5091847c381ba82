use crate::common::Value;
use indexmap::IndexMap;

/// Free-form options passed through to lifecycle and relation hooks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HookOptions {
    values: IndexMap<String, Value>,
}

impl HookOptions {
    pub fn new() -> Self {
        HookOptions::default()
    }

    pub fn with<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// `true` when the option is set to boolean `true`.
    pub fn is_set(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::Bool(true)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Options of a save.
///
/// # Fields
/// - `skip_before_save`: do not run the before-save hook
/// - `skip_after_save`: do not run the after-save hook
/// - `skip_all`: run no hook at all
/// - `keep_new`: leave `is_new` set after a successful insert
/// - `extra`: free-form options forwarded to the hooks
///
/// ```rust,ignore
/// repository.save(&mut entity, &SaveOptions::new().keep_new())?;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveOptions {
    pub(crate) skip_before_save: bool,
    pub(crate) skip_after_save: bool,
    pub(crate) skip_all: bool,
    pub(crate) keep_new: bool,
    pub(crate) extra: HookOptions,
}

impl SaveOptions {
    pub fn new() -> Self {
        SaveOptions::default()
    }

    pub fn skip_before_save(mut self) -> Self {
        self.skip_before_save = true;
        self
    }

    pub fn skip_after_save(mut self) -> Self {
        self.skip_after_save = true;
        self
    }

    pub fn skip_all(mut self) -> Self {
        self.skip_all = true;
        self
    }

    pub fn keep_new(mut self) -> Self {
        self.keep_new = true;
        self
    }

    pub fn extra(mut self, extra: HookOptions) -> Self {
        self.extra = extra;
        self
    }

    pub fn runs_before_save(&self) -> bool {
        !self.skip_before_save && !self.skip_all
    }

    pub fn runs_after_save(&self) -> bool {
        !self.skip_after_save && !self.skip_all
    }

    pub fn is_keep_new(&self) -> bool {
        self.keep_new
    }

    pub fn get_extra(&self) -> &HookOptions {
        &self.extra
    }
}
