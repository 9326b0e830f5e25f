use std::{collections::HashMap, path::Path};

use anyhow::{bail, Context, Result};
use hocon::{Hocon, HoconLoader};

/// Layered configuration lookup: process environment first, then the scoped section
/// of the hocon document, then the document root.
#[derive(Debug)]
pub struct ConfigLoader {
    hocon: Hocon,
    env: HashMap<String, String>,
    scope: String,
}

impl ConfigLoader {
    pub fn new(path: impl AsRef<Path>, scope: String) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The config file {:?} was not found", path);
        }

        let hocon = HoconLoader::new()
            .load_file(path)
            .with_context(|| format!("Failed to find or load config file at: {:?}", path))?
            .hocon()?;

        Ok(Self::from_hocon(hocon, scope))
    }

    pub fn from_str(contents: &str, scope: String) -> Result<Self> {
        let hocon = HoconLoader::new()
            .load_str(contents)
            .context("Failed to parse config")?
            .hocon()?;

        Ok(Self::from_hocon(hocon, scope))
    }

    fn from_hocon(hocon: Hocon, scope: String) -> Self {
        let env = std::env::vars().collect::<HashMap<_, _>>();

        Self { hocon, env, scope }
    }

    /// Replaces the captured environment. Mostly useful to keep tests hermetic.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.env.get(name) {
            return Some(Value::String(value.clone()));
        }

        let scope = &self.hocon[self.scope.as_str()];
        if matches!(scope, Hocon::Hash(_)) {
            if let Some(value) = Self::map_hocon(scope, name) {
                return Some(value);
            }
        }

        Self::map_hocon(&self.hocon, name)
    }

    pub fn load<T: Config>(&self) -> Result<T> {
        let res = T::load(self)?;
        Ok(res)
    }

    fn map_hocon(hocon: &Hocon, name: &str) -> Option<Value> {
        match &hocon[name] {
            Hocon::Real(f64) => Some(Value::Float(*f64 as f32)),
            Hocon::Integer(i64) => Some(Value::Integer(*i64)),
            Hocon::String(string) => Some(Value::String(string.clone())),
            Hocon::Boolean(bool) => Some(Value::Boolean(*bool)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f32),
    Boolean(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(val) => Some(*val),
            Value::String(val) => Hocon::String(val.clone()).as_bool(),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Integer(val) => usize::try_from(*val).ok(),
            Value::String(val) => val.parse::<usize>().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(val) => u64::try_from(*val).ok(),
            Value::String(val) => val.parse::<u64>().ok(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(val) => Some(*val),
            Value::Integer(val) => Some(*val as f32),
            Value::String(val) => val.parse::<f32>().ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(val) => Some(val.clone()),
            Value::Boolean(true) => Some("true".to_string()),
            Value::Boolean(false) => Some("false".to_string()),
            Value::Float(val) => Some(val.to_string()),
            Value::Integer(val) => Some(val.to_string()),
        }
    }
}

pub trait Config {
    fn load(config: &ConfigLoader) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        board_size = 9
        stream {
            history_steps = 4
            sample_fraction = 0.5
            shuffle_games = false
        }
    "#;

    fn loader(scope: &str) -> ConfigLoader {
        ConfigLoader::from_str(CONFIG, scope.to_string())
            .unwrap()
            .with_env(HashMap::new())
    }

    #[test]
    fn test_get_reads_scoped_value() {
        let config = loader("stream");
        assert_eq!(config.get("history_steps").and_then(|v| v.as_usize()), Some(4));
        assert_eq!(config.get("shuffle_games").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn test_get_falls_back_to_root() {
        let config = loader("stream");
        assert_eq!(config.get("board_size").and_then(|v| v.as_usize()), Some(9));
    }

    #[test]
    fn test_get_missing_value() {
        let config = loader("stream");
        assert_eq!(config.get("worker_count"), None);
    }

    #[test]
    fn test_env_overrides_file() {
        let env = HashMap::from([("board_size".to_string(), "13".to_string())]);
        let config = loader("stream").with_env(env);
        assert_eq!(config.get("board_size").and_then(|v| v.as_usize()), Some(13));
    }

    #[test]
    fn test_integer_as_f32() {
        assert_eq!(Value::Integer(1).as_f32(), Some(1.0));
        assert_eq!(Value::Float(0.5).as_usize(), None);
    }

    #[test]
    fn test_negative_integer_is_not_usize() {
        assert_eq!(Value::Integer(-3).as_usize(), None);
    }
}
