//! Tuning configuration (spec §4.5): a small set of named options merged
//! from built-in defaults with user overrides supplied as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// GenomicSQLite connection tuning options.
///
/// Options with a direct SQLite PRAGMA equivalent are applied by
/// [`crate::conn::open`]; the remainder (`threads`, `zstd_level`,
/// `outer_page_KiB`, `web`, `force_prefetch`) describe the page-compression
/// VFS this crate does not reimplement (spec §1 out-of-scope) but are kept
/// on the struct, round-tripped through [`GenomicSqliteConfig::to_json`],
/// for interface fidelity with spec §6's `genomicsqlite_default_config_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenomicSqliteConfig {
    pub threads: i64,
    pub inner_page_kib: i64,
    pub outer_page_kib: i64,
    pub zstd_level: i64,
    pub unsafe_load: bool,
    pub page_cache_mib: i64,
    pub immutable: bool,
    pub web: bool,
    pub force_prefetch: bool,
}

impl Default for GenomicSqliteConfig {
    /// Defaults target bulk-load-then-query workloads (spec §4.5): large
    /// inner pages, medium outer pages, moderate compression, generous
    /// cache.
    fn default() -> Self {
        Self {
            threads: 0,
            inner_page_kib: 16,
            outer_page_kib: 32,
            zstd_level: 6,
            unsafe_load: false,
            page_cache_mib: 1024,
            immutable: false,
            web: false,
            force_prefetch: false,
        }
    }
}

impl GenomicSqliteConfig {
    /// Merge a user-supplied JSON object over the defaults. Unknown keys
    /// are ignored; keys present but with the wrong type fall back to the
    /// default value for that key rather than erroring, matching the
    /// forgiving merge the teacher's CLI layer applies to `clap` defaults.
    pub fn merged(overrides: &Value) -> Self {
        let mut config = Self::default();
        let Some(obj) = overrides.as_object() else {
            return config;
        };
        if let Some(v) = obj.get("threads").and_then(Value::as_i64) {
            config.threads = v;
        }
        if let Some(v) = obj.get("inner_page_KiB").and_then(Value::as_i64) {
            config.inner_page_kib = v;
        }
        if let Some(v) = obj.get("outer_page_KiB").and_then(Value::as_i64) {
            config.outer_page_kib = v;
        }
        if let Some(v) = obj.get("zstd_level").and_then(Value::as_i64) {
            config.zstd_level = v;
        }
        if let Some(v) = obj.get("unsafe_load").and_then(Value::as_bool) {
            config.unsafe_load = v;
        }
        if let Some(v) = obj.get("page_cache_MiB").and_then(Value::as_i64) {
            config.page_cache_mib = v;
        }
        if let Some(v) = obj.get("immutable").and_then(Value::as_bool) {
            config.immutable = v;
        }
        if let Some(v) = obj.get("web").and_then(Value::as_bool) {
            config.web = v;
        }
        if let Some(v) = obj.get("force_prefetch").and_then(Value::as_bool) {
            config.force_prefetch = v;
        }
        config
    }

    /// Render as the JSON shape spec §6's `genomicsqlite_default_config_json`
    /// describes (camel-cased page-size keys to match the documented option
    /// names).
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "threads": self.threads,
            "inner_page_KiB": self.inner_page_kib,
            "outer_page_KiB": self.outer_page_kib,
            "zstd_level": self.zstd_level,
            "unsafe_load": self.unsafe_load,
            "page_cache_MiB": self.page_cache_mib,
            "immutable": self.immutable,
            "web": self.web,
            "force_prefetch": self.force_prefetch,
        })
    }
}

/// `genomicsqlite_default_config_json()` (spec §6).
pub fn default_config_json() -> String {
    GenomicSqliteConfig::default().to_json().to_string()
}
