//! Builder for Graph API URLs.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DEFAULT_BASE_URL;
use crate::error::GraphError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One clause of a `filtering` parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Inclusive date range, serialized as `{"since":"YYYY-MM-DD","until":"YYYY-MM-DD"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub since: String,
    pub until: String,
}

/// Versioned Graph API route with its query parameters.
///
/// Every setter is idempotent and clears its parameter when given an empty,
/// false or absent value. Serialization failures are remembered and reported
/// by [`Route::build`].
#[derive(Debug, Clone)]
pub struct Route {
    base_url: String,
    version: String,
    path: String,
    params: BTreeMap<String, String>,
    error: Option<String>,
}

impl Route {
    /// `path` is appended to the version and must start with `/`.
    pub fn new(version: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            version: version.into(),
            path: path.into(),
            params: BTreeMap::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Current value of a query parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Set an arbitrary query parameter; an empty value clears it.
    #[must_use]
    pub fn param(self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.set(key, (!value.is_empty()).then_some(value))
    }

    fn set(mut self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => {
                self.params.insert(key.to_owned(), value);
            }
            None => {
                self.params.remove(key);
            }
        }
        self
    }

    fn flag(self, key: &str, on: bool, value: &str) -> Self {
        self.set(key, on.then(|| value.to_owned()))
    }

    fn list(self, key: &str, items: &[&str], render: impl FnOnce(&[&str]) -> String) -> Self {
        let value = (!items.is_empty()).then(|| render(items));
        self.set(key, value)
    }

    fn json<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(encoded) => self.set(key, Some(encoded)),
            Err(e) => {
                self.error.get_or_insert_with(|| format!("{key}: {e}"));
                self
            }
        }
    }

    #[must_use]
    pub fn fields(self, fields: &[&str]) -> Self {
        self.list("fields", fields, |f| f.join(","))
    }

    /// `limit(0)` is a valid limit; pass `None` to clear it.
    #[must_use]
    pub fn limit(self, limit: impl Into<Option<u32>>) -> Self {
        self.set("limit", limit.into().map(|l| l.to_string()))
    }

    /// Sets the `type` parameter.
    #[must_use]
    pub fn kind(self, kind: &str) -> Self {
        self.param("type", kind)
    }

    #[must_use]
    pub fn class(self, class: &str) -> Self {
        self.param("class", class)
    }

    #[must_use]
    pub fn location_types(self, types: &[&str]) -> Self {
        self.list("location_types", types, |t| format!("['{}']", t.join("','")))
    }

    #[must_use]
    pub fn action_breakdowns(self, breakdowns: &str) -> Self {
        self.param("action_breakdowns", breakdowns)
    }

    #[must_use]
    pub fn breakdowns(self, breakdowns: &[&str]) -> Self {
        self.list("breakdowns", breakdowns, |b| b.join(","))
    }

    #[must_use]
    pub fn level(self, level: &str) -> Self {
        self.param("level", level)
    }

    /// `time_increment=1`
    #[must_use]
    pub fn daily_time_increment(self, daily: bool) -> Self {
        self.flag("time_increment", daily, "1")
    }

    #[must_use]
    pub fn export_format(self, format: &str) -> Self {
        self.param("export_format", format)
    }

    /// Sets `time_range` and clears `date_preset`. A missing `until` means
    /// today; a missing `since` clears the range.
    #[must_use]
    pub fn time_range(self, since: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        let Some(since) = since else {
            return self.set("time_range", None);
        };
        let until = until.unwrap_or_else(|| Utc::now().date_naive());
        let range = TimeRange {
            since: since.format(DATE_FORMAT).to_string(),
            until: until.format(DATE_FORMAT).to_string(),
        };
        self.set("date_preset", None).json("time_range", &range)
    }

    /// Sets `date_preset` and clears `time_range`. `lifetime` is sent as
    /// `maximum`.
    #[must_use]
    pub fn date_preset(self, preset: &str) -> Self {
        if preset.is_empty() {
            return self.set("date_preset", None);
        }
        let preset = if preset == "lifetime" { "maximum" } else { preset };
        self.set("time_range", None)
            .set("date_preset", Some(preset.to_owned()))
    }

    #[must_use]
    pub fn default_summary(self, on: bool) -> Self {
        self.flag("default_summary", on, "true")
    }

    /// `use_unified_attribution_setting=true`
    #[must_use]
    pub fn unified_attribution_settings(self, on: bool) -> Self {
        self.flag("use_unified_attribution_setting", on, "true")
    }

    #[must_use]
    pub fn filtering(self, filters: &[Filter]) -> Self {
        if filters.is_empty() {
            return self.set("filtering", None);
        }
        self.json("filtering", filters)
    }

    #[must_use]
    pub fn effective_status(self, statuses: &[&str]) -> Self {
        self.list("effective_status", statuses, quoted_list)
    }

    #[must_use]
    pub fn ad_format(self, format: &str) -> Self {
        self.param("ad_format", format)
    }

    /// `metadata=1`
    #[must_use]
    pub fn metadata(self, on: bool) -> Self {
        self.flag("metadata", on, "1")
    }

    #[must_use]
    pub fn order(self, order: &str) -> Self {
        self.param("order", order)
    }

    #[must_use]
    pub fn filter(self, filter: &str) -> Self {
        self.param("filter", filter)
    }

    #[must_use]
    pub fn summary(self, summary: &str) -> Self {
        self.param("summary", summary)
    }

    #[must_use]
    pub fn q(self, query: &str) -> Self {
        self.param("q", query)
    }

    #[must_use]
    pub fn aggregation(self, aggregation: &str) -> Self {
        self.param("aggregation", aggregation)
    }

    #[must_use]
    pub fn action_attribution_windows(self, windows: &[&str]) -> Self {
        self.list("action_attribution_windows", windows, |w| w.join(","))
    }

    #[must_use]
    pub fn targeting_spec<T: Serialize + ?Sized>(self, spec: &T) -> Self {
        self.json("targeting_spec", spec)
    }

    #[must_use]
    pub fn targeting_option_list(self, options: &[&str]) -> Self {
        self.list("targeting_option_list", options, quoted_list)
    }

    /// Render the absolute URL, query keys in sorted order.
    ///
    /// # Errors
    /// Returns [`GraphError::Route`] for a remembered serialization failure
    /// or an unparsable base URL.
    pub fn build(&self) -> Result<String, GraphError> {
        if let Some(err) = &self.error {
            return Err(GraphError::Route(err.clone()));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GraphError::Route(format!("{}: {e}", self.base_url)))?;
        url.set_path(&format!("/{}{}", self.version, self.path));
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        Ok(url.into())
    }
}

fn quoted_list(items: &[&str]) -> String {
    format!("[\"{}\"]", items.join("\",\""))
}
