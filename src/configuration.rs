use config::{ConfigError, Environment, File, Source};

/// Bcrypt's accepted cost range
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub hasher: HasherSettings,
    pub token: TokenSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Password hashing settings
///
/// Changing `cost` only affects digests created afterwards; every stored
/// digest records the cost it was produced with.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct HasherSettings {
    pub cost: u32,
}

/// Session token settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TokenSettings {
    pub issuer: String,
    pub secret: String,
    pub expiry_hours: i64,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.hasher.cost) {
            return Err(ConfigError::Message(format!(
                "hasher.cost must be between {} and {}, got {}",
                MIN_HASH_COST, MAX_HASH_COST, self.hasher.cost
            )));
        }
        if self.token.expiry_hours <= 0 {
            return Err(ConfigError::Message(format!(
                "token.expiry_hours must be positive, got {}",
                self.token.expiry_hours
            )));
        }
        if self.token.issuer.trim().is_empty() {
            return Err(ConfigError::Message("token.issuer must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Load settings from `configuration.{yaml,toml,json}` (optional) and
/// `APP__`-prefixed environment variables, e.g. `APP__TOKEN__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    load_configuration(File::with_name("configuration").required(false))
}

/// Build settings from the built-in defaults, one extra source, and the
/// environment. Environment variables always win.
pub fn load_configuration<S>(source: S) -> Result<Settings, ConfigError>
where
    S: Source + Send + Sync + 'static,
{
    let settings = config::Config::builder()
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "127.0.0.1")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "session_auth")?
        .set_default("database.max_connections", 5)?
        .set_default("hasher.cost", i64::from(bcrypt::DEFAULT_COST))?
        .set_default("token.issuer", "session-auth")?
        .set_default("token.secret", "")?
        .set_default("token.expiry_hours", 8)?
        .add_source(source)
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
