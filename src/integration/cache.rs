use std::env;
use std::fmt;
use std::time::Duration;

use log::{error, warn};
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::user;

use super::Result;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 6379,
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("REDIS_HOST").ok();
        let port = env::var("REDIS_PORT")
            .unwrap_or_else(|_| "6379".to_string())
            .parse()
            .ok();

        if let (Some(host), Some(port)) = (host, port) {
            Some(Self { host, port })
        } else {
            warn!("REDIS env is not configured, profile cache is disabled");
            None
        }
    }

    pub async fn connect(&self) -> Result<Redis> {
        let con = redis::Client::open(format!("redis://{}:{}", &self.host, &self.port))?
            .get_connection_manager()
            .await?;

        Ok(Redis { con })
    }
}

pub enum Key<'a> {
    Card(&'a user::Id),
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Card(id) => write!(f, "card:{id}"),
        }
    }
}

#[derive(Clone)]
pub struct Redis {
    con: redis::aio::ConnectionManager,
}

impl Redis {
    pub async fn json_get<T>(&self, key: Key<'_>) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let mut con = self.con.clone();
        let raw: Option<String> = match con.get(key.to_string()).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to get value for key {key}: {e:?}");
                return None;
            }
        };

        raw.and_then(|r| match serde_json::from_str::<T>(&r) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to deserialize cached value for key {key}: {e:?}");
                None
            }
        })
    }

    pub async fn json_set_ex<T>(&self, key: Key<'_>, value: &T, ttl: Duration)
    where
        T: Serialize,
    {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to serialize value for key {key}: {e:?}");
                return;
            }
        };

        let mut con = self.con.clone();
        let res: redis::RedisResult<()> = con.set_ex(key.to_string(), raw, ttl.as_secs()).await;
        if let Err(e) = res {
            error!("Failed to set value for key {key}: {e:?}");
        }
    }
}
