use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::instrument;

use continent_core::traits::HotCache;

use crate::error::CacheError;

/// C2 implementation backed by `redis`'s auto-reconnecting connection
/// manager, cloned cheaply per call the way this crate's other gateways
/// share a single pooled handle.
#[derive(Clone)]
pub struct RedisHotCache {
    conn: ConnectionManager,
}

impl RedisHotCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl HotCache for RedisHotCache {
    type Error = CacheError;

    #[instrument(skip(self, value))]
    async fn setnx_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
    ) -> Result<bool, Self::Error> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
    ) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn hset_mapping(
        &self,
        key: &str,
        mapping: &[(String, Vec<u8>)],
    ) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, mapping).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(topic, payload).await?;
        Ok(())
    }
}
