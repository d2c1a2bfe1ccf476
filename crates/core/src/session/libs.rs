//! Standard library policy.

use mlua::{Lua, StdLib, Table, Value, Variadic};

use crate::config::loader::{check_library, expand};
use crate::config::{LibPolicy, SessionOptions};

use super::types::LuawError;

/// A standard library that can be named in options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    Base,
    Package,
    Coroutine,
    Table,
    Io,
    Os,
    String,
    Utf8,
    Math,
    Debug,
}

impl Library {
    /// Libraries registered in `package.preload` by the preload policy.
    const PRELOADABLE: [Library; 7] = [
        Library::Coroutine,
        Library::Table,
        Library::Io,
        Library::Os,
        Library::String,
        Library::Utf8,
        Library::Math,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Library::Base => "_G",
            Library::Package => "package",
            Library::Coroutine => "coroutine",
            Library::Table => "table",
            Library::Io => "io",
            Library::Os => "os",
            Library::String => "string",
            Library::Utf8 => "utf8",
            Library::Math => "math",
            Library::Debug => "debug",
        }
    }

    fn stdlib(self) -> StdLib {
        match self {
            // The base library is always open.
            Library::Base => StdLib::NONE,
            Library::Package => StdLib::PACKAGE,
            Library::Coroutine => StdLib::COROUTINE,
            Library::Table => StdLib::TABLE,
            Library::Io => StdLib::IO,
            Library::Os => StdLib::OS,
            Library::String => StdLib::STRING,
            Library::Utf8 => StdLib::UTF8,
            Library::Math => StdLib::MATH,
            Library::Debug => StdLib::DEBUG,
        }
    }
}

pub fn library_by_name(name: &str) -> Option<Library> {
    let lib = match name {
        "_G" | "base" => Library::Base,
        "package" => Library::Package,
        "coroutine" => Library::Coroutine,
        "table" => Library::Table,
        "io" => Library::Io,
        "os" => Library::Os,
        "string" => Library::String,
        "utf8" => Library::Utf8,
        "math" => Library::Math,
        "debug" => Library::Debug,
        _ => return None,
    };
    Some(lib)
}

/// Create the interpreter a session owns. Only the base library is open.
pub(crate) fn new_state() -> Result<Lua, LuawError> {
    Ok(Lua::new_with(StdLib::NONE, mlua::LuaOptions::default())?)
}

/// Apply the library policy and the custom lists to `lua`.
pub(crate) fn open(lua: &Lua, options: &SessionOptions) -> Result<(), LuawError> {
    let custom_load = options
        .load
        .iter()
        .map(|name| check_library(name))
        .collect::<Result<Vec<_>, _>>()?;
    let custom_preload = options
        .preload
        .iter()
        .map(|name| check_library(name))
        .collect::<Result<Vec<_>, _>>()?;

    match options.libs {
        LibPolicy::Ignore => {}
        LibPolicy::Load => lua.load_std_libs(StdLib::ALL_SAFE)?,
        LibPolicy::Preload => preload(lua, &Library::PRELOADABLE)?,
    }

    for lib in custom_load {
        lua.load_std_libs(lib.stdlib())?;
    }
    if !custom_preload.is_empty() {
        preload(lua, &custom_preload)?;
    }

    if !options.package_path.is_empty() {
        extend_package_path(lua, &options.package_path)?;
    }
    if options.memory_limit > 0 {
        lua.set_memory_limit(options.memory_limit)?;
    }

    tracing::debug!(
        policy = ?options.libs,
        load = ?options.load,
        preload = ?options.preload,
        "opened libraries"
    );
    Ok(())
}

/// Register loaders in `package.preload` so `require(name)` opens the library
/// on first use. Opens `package` itself if needed.
fn preload(lua: &Lua, libs: &[Library]) -> Result<(), LuawError> {
    let globals = lua.globals();
    if globals.raw_get::<Option<Table>>("package")?.is_none() {
        lua.load_std_libs(StdLib::PACKAGE)?;
    }
    let package: Table = globals.raw_get("package")?;
    let preload: Table = package.raw_get("preload")?;

    for &lib in libs {
        let name = lib.name();
        let loader = lua.create_function(move |lua, _: Variadic<Value>| {
            lua.load_std_libs(lib.stdlib())?;
            lua.globals().raw_get::<Value>(name)
        })?;
        preload.raw_set(name, loader)?;
    }
    Ok(())
}

fn extend_package_path(lua: &Lua, entries: &[String]) -> Result<(), LuawError> {
    let Some(package) = lua.globals().raw_get::<Option<Table>>("package")? else {
        tracing::warn!("package library is not open, ignoring package_path");
        return Ok(());
    };
    let mut path: String = package.raw_get("path")?;
    for entry in entries {
        let entry = expand(entry)?;
        if !path.is_empty() {
            path.push(';');
        }
        path.push_str(&entry);
    }
    package.raw_set("path", path)?;
    Ok(())
}
