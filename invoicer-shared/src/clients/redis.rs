use redis::aio::ConnectionManager;

#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("connected to Redis");
        Ok(Self { conn })
    }

    /// Counts one hit against `key` and returns the hits so far in the current
    /// window. The first hit opens a `window_secs` window; increment and
    /// expiry run in one transaction so a key never outlives its window.
    pub async fn window_hit(&self, key: &str, window_secs: u64) -> Result<u64, redis::RedisError> {
        let mut conn = self.conn.clone();
        let (hits,): (u64,) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(hits)
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
