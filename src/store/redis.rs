//! Redis-backed counter store.
//!
//! Every operation goes through the shared `RetryPolicy`; the connection
//! itself is an `aio::ConnectionManager`, which transparently reconnects
//! between attempts. Batches are submitted as one `redis::pipe()` round
//! trip and fail as a unit on any connectivity error.

use super::retry::RetryPolicy;
use super::{CounterStore, StoreError, StoreOp, StoreReply};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Value};

#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    retry: RetryPolicy,
}

impl RedisCounterStore {
    /// Open a managed connection to the store at `url`.
    pub async fn connect(url: &str, retry: RetryPolicy) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(|e| StoreError::Unavailable {
            attempts: 1,
            last_error: e.to_string(),
        })?;
        let conn = retry
            .run("CONNECT", || {
                let client = client.clone();
                async move { ConnectionManager::new(client).await }
            })
            .await?;
        Ok(RedisCounterStore { conn, retry })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.retry
            .run("INCR", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.incr(key, 1i64).await }
            })
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.retry
            .run("GET", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.get(key).await }
            })
            .await
    }

    async fn pf_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.retry
            .run("PFADD", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                let member = member.to_string();
                async move { conn.pfadd(key, member).await }
            })
            .await
    }

    async fn pf_count(&self, key: &str) -> Result<u64, StoreError> {
        self.retry
            .run("PFCOUNT", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.pfcount(key).await }
            })
            .await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError> {
        self.retry
            .run("LPUSH", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                let value = value.to_string();
                async move { conn.lpush(key, value).await }
            })
            .await
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        self.retry
            .run("LTRIM", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.ltrim(key, start as isize, stop as isize).await }
            })
            .await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        self.retry
            .run("LRANGE", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.lrange(key, start as isize, stop as isize).await }
            })
            .await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.retry
            .run("SADD", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                let member = member.to_string();
                async move { conn.sadd(key, member).await }
            })
            .await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.retry
            .run("SMEMBERS", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.smembers(key).await }
            })
            .await
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError> {
        self.retry
            .run("EXPIRE", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.expire(key, seconds).await }
            })
            .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let ttl: i64 = self
            .retry
            .run("TTL", || {
                let mut conn = self.conn.clone();
                let key = key.to_string();
                async move { conn.ttl(key).await }
            })
            .await?;
        // -1 means no expiration, -2 means no such key
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let reply: String = self
            .retry
            .run("PING", || {
                let mut conn = self.conn.clone();
                async move { redis::cmd("PING").query_async(&mut conn).await }
            })
            .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unexpected(format!("PING answered {:?}", reply)))
        }
    }

    async fn pipeline(&self, ops: &[StoreOp]) -> Result<Vec<StoreReply>, StoreError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let pipe = build_pipeline(ops);
        let values: Vec<Value> = self
            .retry
            .run("PIPELINE", || {
                let pipe = pipe.clone();
                let mut conn = self.conn.clone();
                async move { pipe.query_async(&mut conn).await }
            })
            .await?;
        if values.len() != ops.len() {
            return Err(StoreError::Unexpected(format!(
                "pipeline returned {} replies for {} operations",
                values.len(),
                ops.len()
            )));
        }
        ops.iter()
            .zip(values)
            .map(|(op, value)| reply_from_value(op, value))
            .collect()
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.retry
            .run("FLUSHALL", || {
                let mut conn = self.conn.clone();
                async move { redis::cmd("FLUSHALL").query_async(&mut conn).await }
            })
            .await
    }
}

fn build_pipeline(ops: &[StoreOp]) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    for op in ops {
        match op {
            StoreOp::Incr(key) => {
                pipe.cmd("INCR").arg(key);
            }
            StoreOp::Get(key) => {
                pipe.cmd("GET").arg(key);
            }
            StoreOp::PfAdd(key, member) => {
                pipe.cmd("PFADD").arg(key).arg(member);
            }
            StoreOp::PfCount(key) => {
                pipe.cmd("PFCOUNT").arg(key);
            }
            StoreOp::LPush(key, value) => {
                pipe.cmd("LPUSH").arg(key).arg(value);
            }
            StoreOp::LTrim(key, start, stop) => {
                pipe.cmd("LTRIM").arg(key).arg(start).arg(stop);
            }
            StoreOp::LRange(key, start, stop) => {
                pipe.cmd("LRANGE").arg(key).arg(start).arg(stop);
            }
            StoreOp::SAdd(key, member) => {
                pipe.cmd("SADD").arg(key).arg(member);
            }
            StoreOp::SMembers(key) => {
                pipe.cmd("SMEMBERS").arg(key);
            }
            StoreOp::Expire(key, seconds) => {
                pipe.cmd("EXPIRE").arg(key).arg(seconds);
            }
        }
    }
    pipe
}

fn reply_from_value(op: &StoreOp, value: Value) -> Result<StoreReply, StoreError> {
    match op {
        StoreOp::Incr(_)
        | StoreOp::PfAdd(..)
        | StoreOp::PfCount(_)
        | StoreOp::LPush(..)
        | StoreOp::SAdd(..)
        | StoreOp::Expire(..) => match value {
            Value::Int(n) => Ok(StoreReply::Int(n)),
            Value::Nil => Ok(StoreReply::Int(0)),
            other => Err(unexpected(op, &other)),
        },
        StoreOp::Get(_) => match value {
            Value::Nil => Ok(StoreReply::Text(None)),
            Value::Data(bytes) => Ok(StoreReply::Text(Some(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))),
            other => Err(unexpected(op, &other)),
        },
        StoreOp::LTrim(..) => match value {
            Value::Okay | Value::Status(_) => Ok(StoreReply::Done),
            other => Err(unexpected(op, &other)),
        },
        StoreOp::LRange(..) | StoreOp::SMembers(_) => match value {
            Value::Nil => Ok(StoreReply::Items(Vec::new())),
            Value::Bulk(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Data(bytes) => {
                            out.push(String::from_utf8_lossy(&bytes).into_owned())
                        }
                        other => return Err(unexpected(op, &other)),
                    }
                }
                Ok(StoreReply::Items(out))
            }
            other => Err(unexpected(op, &other)),
        },
    }
}

fn unexpected(op: &StoreOp, value: &Value) -> StoreError {
    StoreError::Unexpected(format!("{:?} answered {:?}", op, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_replies() {
        let op = StoreOp::Incr("site:example.com:pv".to_string());
        assert_eq!(
            reply_from_value(&op, Value::Int(7)).unwrap(),
            StoreReply::Int(7)
        );
        assert!(reply_from_value(&op, Value::Okay).is_err());
    }

    #[test]
    fn test_get_replies() {
        let op = StoreOp::Get("site:example.com:pv".to_string());
        assert_eq!(
            reply_from_value(&op, Value::Nil).unwrap(),
            StoreReply::Text(None)
        );
        assert_eq!(
            reply_from_value(&op, Value::Data(b"42".to_vec())).unwrap(),
            StoreReply::Text(Some("42".to_string()))
        );
    }

    #[test]
    fn test_list_replies() {
        let op = StoreOp::LRange("logs:example.com".to_string(), 0, 49);
        let value = Value::Bulk(vec![
            Value::Data(b"{\"a\":1}".to_vec()),
            Value::Data(b"{\"b\":2}".to_vec()),
        ]);
        assert_eq!(
            reply_from_value(&op, value).unwrap(),
            StoreReply::Items(vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()])
        );
    }

    #[test]
    fn test_ltrim_status_reply() {
        let op = StoreOp::LTrim("logs:example.com".to_string(), 0, 999);
        assert_eq!(reply_from_value(&op, Value::Okay).unwrap(), StoreReply::Done);
        assert!(reply_from_value(&op, Value::Int(1)).is_err());
    }
}
