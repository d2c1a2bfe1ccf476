use std::fmt;

use mlua::Lua;
use serde::Deserialize;

/// On-disk configuration file.
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub session: SessionOptions,
}

fn default_version() -> u32 {
    1
}

/// How the standard libraries are made available to scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibPolicy {
    /// Open nothing beyond what the interpreter always has.
    Ignore,
    /// Open every safe standard library.
    #[default]
    Load,
    /// Open `base` and `package`; register the rest in `package.preload`.
    Preload,
}

/// Options consumed by [`Session::init`](crate::session::Session::init).
#[derive(Clone, Deserialize)]
pub struct SessionOptions {
    #[serde(default)]
    pub libs: LibPolicy,

    /// Install IF, SET, COUNTER and COUNTER0 as globals.
    #[serde(default = "default_true")]
    pub extensions: bool,

    /// Extra libraries opened after the policy is applied.
    #[serde(default)]
    pub load: Vec<String>,

    /// Extra libraries registered in `package.preload`.
    #[serde(default)]
    pub preload: Vec<String>,

    /// Entries appended to `package.path`; `~` and `$VAR` are expanded.
    #[serde(default)]
    pub package_path: Vec<String>,

    #[serde(default = "default_true")]
    pub log_conversion_errors: bool,

    /// Memory limit in bytes; 0 means unlimited.
    #[serde(default)]
    pub memory_limit: usize,

    #[serde(default = "default_chunk_name")]
    pub chunk_name: String,

    #[serde(skip)]
    pub(crate) adopted: Option<Lua>,
}

fn default_true() -> bool {
    true
}

fn default_chunk_name() -> String {
    "luaw".to_string()
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            libs: LibPolicy::default(),
            extensions: true,
            load: Vec::new(),
            preload: Vec::new(),
            package_path: Vec::new(),
            log_conversion_errors: true,
            memory_limit: 0,
            chunk_name: default_chunk_name(),
            adopted: None,
        }
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("libs", &self.libs)
            .field("extensions", &self.extensions)
            .field("load", &self.load)
            .field("preload", &self.preload)
            .field("package_path", &self.package_path)
            .field("log_conversion_errors", &self.log_conversion_errors)
            .field("memory_limit", &self.memory_limit)
            .field("chunk_name", &self.chunk_name)
            .field("adopted", &self.adopted.is_some())
            .finish()
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_libs(mut self) -> Self {
        self.libs = LibPolicy::Ignore;
        self
    }

    pub fn load_libs(mut self) -> Self {
        self.libs = LibPolicy::Load;
        self
    }

    pub fn preload_libs(mut self) -> Self {
        self.libs = LibPolicy::Preload;
        self
    }

    pub fn extensions(mut self, enabled: bool) -> Self {
        self.extensions = enabled;
        self
    }

    pub fn custom_load<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn custom_preload<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn package_path(mut self, entry: impl Into<String>) -> Self {
        self.package_path.push(entry.into());
        self
    }

    pub fn log_conversion_errors(mut self, enabled: bool) -> Self {
        self.log_conversion_errors = enabled;
        self
    }

    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn chunk_name(mut self, name: impl Into<String>) -> Self {
        self.chunk_name = name.into();
        self
    }

    /// Run on an interpreter created elsewhere instead of a fresh one.
    ///
    /// A session built this way never closes the interpreter; closing only
    /// detaches from it.
    pub fn adopt(mut self, lua: Lua) -> Self {
        self.adopted = Some(lua);
        self
    }

    pub fn is_adopting(&self) -> bool {
        self.adopted.is_some()
    }
}
