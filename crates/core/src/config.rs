//! C1: the Settings Resolver.
//!
//! Materializes an immutable [`DbSettings`] from a connection-URL key/value
//! map, falling back to process environment variables (`RELDB_<KEY>`) before
//! the compiled-in default, per `spec.md` §4.1.

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use crate::error::SettingsError;

macro_rules! settings {
    (
        $(#[$struct_attr:meta])*
        pub struct DbSettings {
            $(
                $(#[$field_attr:meta])*
                $field:ident : $ty:ty = $key:literal => $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$struct_attr])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct DbSettings {
            $(
                $(#[$field_attr])*
                pub $field: $ty,
            )*
        }

        impl DbSettings {
            /// The option keys this resolver recognizes.
            pub const KEYS: &'static [&'static str] = &[$($key),*];

            fn resolve_fields(params: &BTreeMap<String, String>) -> Result<Self, SettingsError> {
                Ok(Self {
                    $(
                        $field: resolve_one($key, params, $default)?,
                    )*
                })
            }
        }
    };
}

fn resolve_one<T>(key: &str, params: &BTreeMap<String, String>, default: T) -> Result<T, SettingsError>
where
    T: FromStr,
{
    let raw = params
        .get(key)
        .cloned()
        .or_else(|| env::var(format!("RELDB_{key}")).ok());
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| SettingsError::InvalidValue(key.to_owned(), raw)),
    }
}

settings! {
    /// Immutable, resolved database settings (`spec.md` §4.1, abridged table).
    pub struct DbSettings {
        analyze_auto: u32 = "ANALYZE_AUTO" => 2000,
        analyze_sample: u32 = "ANALYZE_SAMPLE" => 10000,
        auto_compact_fill_rate: u8 = "AUTO_COMPACT_FILL_RATE" => 90,
        case_insensitive_identifiers: bool = "CASE_INSENSITIVE_IDENTIFIERS" => false,
        database_to_upper: bool = "DATABASE_TO_UPPER" => true,
        database_to_lower: bool = "DATABASE_TO_LOWER" => false,
        drop_restrict: bool = "DROP_RESTRICT" => true,
        lob_timeout_ms: u64 = "LOB_TIMEOUT" => 300_000,
        max_compact_time_ms: u64 = "MAX_COMPACT_TIME" => 200,
        max_query_timeout_ms: u64 = "MAX_QUERY_TIMEOUT" => 0,
        mv_store: bool = "MV_STORE" => true,
        compress: bool = "COMPRESS" => false,
        ignore_catalogs: bool = "IGNORE_CATALOGS" => false,
        reuse_space: bool = "REUSE_SPACE" => true,
        zero_based_enums: bool = "ZERO_BASED_ENUMS" => false,
        query_cache_size: usize = "QUERY_CACHE_SIZE" => 8,
    }
}

/// `DEFAULT_ESCAPE` is a string, not numeric, so it isn't wired through the
/// `FromStr`-generic `settings!` macro above.
pub const DEFAULT_ESCAPE: &str = "\\";

impl DbSettings {
    /// Resolve settings from a connection-URL key/value map (§4.1, §6).
    ///
    /// Fails with [`SettingsError::UnsupportedCombination`] when both
    /// `DATABASE_TO_LOWER=true` and `DATABASE_TO_UPPER=true` are explicitly
    /// set in `params` (not merely defaulted).
    pub fn resolve(params: &BTreeMap<String, String>) -> Result<Self, SettingsError> {
        let both_folding_set = params.get("DATABASE_TO_UPPER").map(String::as_str) == Some("true")
            && params.get("DATABASE_TO_LOWER").map(String::as_str) == Some("true");
        if both_folding_set {
            return Err(SettingsError::UnsupportedCombination);
        }
        let mut resolved = Self::resolve_fields(params)?;
        // DATABASE_TO_UPPER defaults true; an explicit DATABASE_TO_LOWER=true
        // without an explicit DATABASE_TO_UPPER should disable the default.
        if params.get("DATABASE_TO_LOWER").map(String::as_str) == Some("true")
            && !params.contains_key("DATABASE_TO_UPPER")
        {
            resolved.database_to_upper = false;
        }
        Ok(resolved)
    }

    pub fn case_folding(&self) -> reldb_data_structures::CaseFolding {
        use reldb_data_structures::CaseFolding;
        if self.database_to_upper {
            CaseFolding::Upper
        } else if self.database_to_lower {
            CaseFolding::Lower
        } else if self.case_insensitive_identifiers {
            CaseFolding::PreserveCaseInsensitiveCompare
        } else {
            CaseFolding::Preserve
        }
    }
}

impl Default for DbSettings {
    fn default() -> Self {
        Self::resolve(&BTreeMap::new()).expect("defaults never fail to resolve")
    }
}

/// `FILE_LOCK` connection option (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileLockMethod {
    No,
    #[default]
    File,
    Socket,
    Fs,
    Serialized,
}

impl FromStr for FileLockMethod {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NO" => Ok(Self::No),
            "FILE" => Ok(Self::File),
            "SOCKET" => Ok(Self::Socket),
            "FS" => Ok(Self::Fs),
            "SERIALIZED" => Ok(Self::Serialized),
            other => Err(SettingsError::InvalidValue("FILE_LOCK".to_owned(), other.to_owned())),
        }
    }
}

/// `ACCESS_MODE_DATA` connection option (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl FromStr for AccessMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rw" => Ok(Self::ReadWrite),
            "r" => Ok(Self::ReadOnly),
            other => Err(SettingsError::InvalidValue(
                "ACCESS_MODE_DATA".to_owned(),
                other.to_owned(),
            )),
        }
    }
}

/// A parsed `db-scheme:<name>[;KEY=VALUE]*` connection URL (§6).
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionUrl {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

/// Connection keys recognized outside of [`DbSettings::KEYS`] (§6).
const EXTRA_KEYS: &[&str] = &[
    "CIPHER",
    "FILE_LOCK",
    "ACCESS_MODE_DATA",
    "AUTO_SERVER",
    "AUTO_SERVER_PORT",
    "DB_CLOSE_ON_EXIT",
    "PAGE_SIZE",
    "CACHE_TYPE",
    "LOCK_MODE",
    "DATABASE_EVENT_LISTENER",
    "JAVA_OBJECT_SERIALIZER",
    "MODE",
    "TRACE_LEVEL_FILE",
    "TRACE_LEVEL_SYSTEM_OUT",
    "RECOVER",
    "WRITE_DELAY",
    "NETWORK_TIMEOUT",
    "OPEN_NEW",
    "AUTO_RECONNECT",
    "DEFAULT_ESCAPE",
];

impl ConnectionUrl {
    /// Parse `db-scheme:<name>[;KEY=VALUE]*`.
    pub fn parse(url: &str) -> Result<Self, SettingsError> {
        let rest = url
            .split_once(':')
            .map(|(_, rest)| rest)
            .ok_or_else(|| SettingsError::InvalidValue("url".to_owned(), url.to_owned()))?;
        let mut parts = rest.split(';');
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SettingsError::InvalidValue("url".to_owned(), url.to_owned()))?
            .to_owned();

        let mut params = BTreeMap::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| SettingsError::InvalidValue("url".to_owned(), part.to_owned()))?;
            let key = key.to_ascii_uppercase();
            if !DbSettings::KEYS.contains(&key.as_str()) && !EXTRA_KEYS.contains(&key.as_str()) {
                return Err(SettingsError::UnknownOption(key));
            }
            params.insert(key, value.to_owned());
        }

        Ok(Self { name, params })
    }

    pub fn settings(&self) -> Result<DbSettings, SettingsError> {
        DbSettings::resolve(&self.params)
    }
}
