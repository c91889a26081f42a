//! Redis-list message transport.
//!
//! Each queue is a Redis list; publishing is an `RPUSH` and consumers pop from
//! the head. Redis lists survive restarts when the server runs with AOF, which
//! is what "durable queue" and "persistent delivery" mean here.

use std::time::Duration;

use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Connection, Pool};

use crate::domain::repository::{Channel, Transport};
use crate::error::TransportError;

#[derive(Clone)]
pub struct RedisTransport {
    pub pool: Pool,
    /// Upper bound for every Redis round trip, connection checkout included.
    pub timeout: Duration,
}

impl Transport for RedisTransport {
    type Channel = RedisChannel;

    async fn connect(&self) -> Result<RedisChannel, TransportError> {
        let mut conn = bounded(self.timeout, "pool checkout", self.pool.get())
            .await
            .map_err(TransportError::Connect)?;
        let _: String = bounded(self.timeout, "PING", redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(TransportError::Connect)?;
        Ok(RedisChannel {
            conn,
            timeout: self.timeout,
        })
    }
}

pub struct RedisChannel {
    conn: Connection,
    timeout: Duration,
}

impl Channel for RedisChannel {
    async fn assert_queue(&mut self, queue: &str) -> Result<(), TransportError> {
        let kind: String = bounded(
            self.timeout,
            "TYPE",
            redis::cmd("TYPE").arg(queue).query_async(&mut self.conn),
        )
        .await
        .map_err(|source| TransportError::AssertQueue {
            queue: queue.to_owned(),
            source,
        })?;
        match kind.as_str() {
            "none" | "list" => Ok(()),
            other => Err(TransportError::AssertQueue {
                queue: queue.to_owned(),
                source: anyhow::anyhow!("key holds a {other}, expected a list"),
            }),
        }
    }

    async fn send_to_queue(&mut self, queue: &str, payload: &[u8]) -> Result<(), TransportError> {
        let _: i64 = bounded(
            self.timeout,
            "RPUSH",
            self.conn.rpush(queue, payload.to_vec()),
        )
        .await
        .map_err(|source| TransportError::Send {
            queue: queue.to_owned(),
            source,
        })?;
        Ok(())
    }
}

async fn bounded<T, E>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = Result<T, E>>,
) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(anyhow::anyhow!("{what} timed out after {timeout:?}")),
    }
}
