use std::env;
use std::time::Duration;

use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;

use super::Result;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5432,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("consultation"),
        }
    }
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        db: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            db: db.into(),
        }
    }

    pub fn env() -> Result<Self> {
        let host = env::var("PG_HOST")?;
        let port = env::var("PG_PORT")?.parse()?;
        let user = env::var("PG_USER")?;
        let password = env::var("PG_PASSWORD")?;
        let db = env::var("PG_DB")?;
        Ok(Self {
            host,
            port,
            user,
            password,
            db,
        })
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        )
    }

    pub fn connect(&self) -> Result<Pool> {
        let manager = ConnectionManager::<PgConnection>::new(self.url());
        let pool = r2d2::Pool::builder()
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        Ok(pool)
    }
}


#[cfg(test)]
pub mod tests {
    use diesel::connection::SimpleConnection;
    use testcontainers_modules::postgres::Postgres;
    use testcontainers_modules::testcontainers::ContainerAsync;
    use testcontainers_modules::testcontainers::runners::AsyncRunner;

    use super::{Config, Pool};

    const SCHEMA: &str = include_str!("../../migrations/2025-01-01-000000_init/up.sql");

    pub struct TestContainer {
        _postgres: ContainerAsync<Postgres>,
        pub pool: Pool,
    }

    impl TestContainer {
        pub async fn init() -> Self {
            let postgres = Postgres::default().start().await.unwrap();

            let config = Config::new(
                postgres.get_host().await.unwrap().to_string(),
                postgres.get_host_port_ipv4(5432).await.unwrap(),
                "postgres",
                "postgres",
                "postgres",
            );

            let pool = config.connect().unwrap();
            pool.get().unwrap().batch_execute(SCHEMA).unwrap();

            Self {
                _postgres: postgres,
                pool,
            }
        }
    }
}
