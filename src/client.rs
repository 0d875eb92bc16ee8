use std::{collections::HashSet, hash::Hash, marker::PhantomData, time::Duration};

use bincode::Options;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::warn;

use crate::{
    endpoint::ServiceEndpoint,
    stats::Latency,
    wire::{self, Discipline, Op, Request},
};

/// Everything caught at the facade boundary. Converted into the sentinel
/// result of the failing operation, a `warn!` entry is the only trace left.
#[derive(Debug, Error)]
enum Failure {
    #[error("encode fail: {0}")]
    Encode(crate::Error),
    #[error("decode fail: {0}")]
    Decode(crate::Error),
    #[error("transport fail: {0}")]
    Transport(crate::Error),
}

/// Client stub for a map replicated behind a BFT service endpoint.
///
/// One instance serves one logical caller; every operation takes `&mut self`
/// and blocks until the replicated reply arrives or `invoke_timeout`
/// elapses. Mutations are submitted through the ordered path, reads through
/// the unordered one.
///
/// A failed put/get/remove is indistinguishable from "key absent" without
/// inspecting the logs. That mirrors the service's defensive client design
/// and is kept on purpose.
#[derive(Debug)]
pub struct MapClient<K, V, E> {
    endpoint: E,
    pub invoke_timeout: Duration,
    latencies: [Latency; 5],
    _marker: PhantomData<(K, V)>,
}

impl<K, V, E> MapClient<K, V, E> {
    pub fn new(endpoint: E) -> Self {
        Self::with_capacity_hint(endpoint, 0)
    }

    /// `expected_ops` sizes the per-operation latency accumulators up front.
    pub fn with_capacity_hint(endpoint: E, expected_ops: usize) -> Self {
        Self {
            endpoint,
            invoke_timeout: Duration::from_secs(10),
            latencies: std::array::from_fn(|_| Latency::with_capacity(expected_ops)),
            _marker: PhantomData,
        }
    }

    pub fn latency(&self, op: Op) -> &Latency {
        &self.latencies[op.tag() as usize]
    }
}

impl<K, V, E> MapClient<K, V, E>
where
    K: Serialize + DeserializeOwned + Eq + Hash,
    V: Serialize + DeserializeOwned,
    E: ServiceEndpoint,
{
    pub async fn put(&mut self, key: &K, value: &V) -> Option<V> {
        match self.try_put(key, value).await {
            Ok(previous) => previous,
            Err(err) => {
                warn!("put fail: {err}");
                None
            }
        }
    }

    pub async fn get(&mut self, key: &K) -> Option<V> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!("get fail: {err}");
                None
            }
        }
    }

    pub async fn remove(&mut self, key: &K) -> Option<V> {
        match self.try_remove(key).await {
            Ok(previous) => previous,
            Err(err) => {
                warn!("remove fail: {err}");
                None
            }
        }
    }

    /// Number of entries in the replicated map, `-1` when the operation
    /// fails.
    pub async fn size(&mut self) -> i32 {
        match self.try_size().await {
            Ok(size) => size,
            Err(err) => {
                warn!("size fail: {err}");
                -1
            }
        }
    }

    /// All keys currently in the replicated map, empty when the operation
    /// fails.
    pub async fn key_set(&mut self) -> HashSet<K> {
        match self.try_key_set().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!("key_set fail: {err}");
                Default::default()
            }
        }
    }

    pub async fn close(self) -> crate::Result<()> {
        self.endpoint.close().await
    }

    async fn try_put(&mut self, key: &K, value: &V) -> Result<Option<V>, Failure> {
        let request = Request::put(encode_blob(key)?, encode_blob(value)?);
        let reply = self.dispatch(request).await?;
        decode_value_reply(&reply)
    }

    async fn try_get(&mut self, key: &K) -> Result<Option<V>, Failure> {
        let reply = self.dispatch(Request::get(encode_blob(key)?)).await?;
        decode_value_reply(&reply)
    }

    async fn try_remove(&mut self, key: &K) -> Result<Option<V>, Failure> {
        let reply = self.dispatch(Request::remove(encode_blob(key)?)).await?;
        decode_value_reply(&reply)
    }

    async fn try_size(&mut self) -> Result<i32, Failure> {
        let reply = self.dispatch(Request::size()).await?;
        wire::decode_size_reply(&reply).map_err(|err| Failure::Decode(err.into()))
    }

    async fn try_key_set(&mut self) -> Result<HashSet<K>, Failure> {
        let reply = self.dispatch(Request::key_set()).await?;
        wire::decode_key_set_reply(&reply)
            .map_err(|err| Failure::Decode(err.into()))?
            .iter()
            .map(|blob| decode_blob(blob))
            .collect()
    }

    /// Submit one encoded request through the discipline the operation kind
    /// selects, recording the round-trip time of every submission that
    /// returns a reply.
    async fn dispatch(&mut self, request: Request) -> Result<Bytes, Failure> {
        let op = request.op;
        let buf = request.encode();
        let invoke_timeout = self.invoke_timeout;
        let start = Instant::now();
        let result = {
            let endpoint = &mut self.endpoint;
            timeout(invoke_timeout, async move {
                match op.discipline() {
                    Discipline::Ordered => endpoint.invoke_ordered(buf).await,
                    Discipline::Unordered => endpoint.invoke_unordered(buf).await,
                }
            })
            .await
        };
        let reply = match result {
            Ok(result) => result.map_err(Failure::Transport)?,
            Err(elapsed) => Err(Failure::Transport(elapsed.into()))?,
        };
        self.latencies[op.tag() as usize].record(start.elapsed());
        Ok(reply)
    }
}

// the bulk surface of an associative container is not part of the demo
// protocol, fail loud instead of degrading silently
impl<K, V, E> MapClient<K, V, E> {
    pub fn clear(&mut self) {
        unimplemented!("clear is not supported")
    }

    pub fn contains_key(&self, _key: &K) -> bool {
        unimplemented!("contains_key is not supported")
    }

    pub fn contains_value(&self, _value: &V) -> bool {
        unimplemented!("contains_value is not supported")
    }

    pub fn entry_set(&self) -> Vec<(K, V)> {
        unimplemented!("entry_set is not supported")
    }

    pub fn is_empty(&self) -> bool {
        unimplemented!("is_empty is not supported")
    }

    pub fn put_all(&mut self, _entries: impl IntoIterator<Item = (K, V)>) {
        unimplemented!("put_all is not supported")
    }

    pub fn values(&self) -> Vec<V> {
        unimplemented!("values is not supported")
    }
}

fn encode_blob(value: &impl Serialize) -> Result<Bytes, Failure> {
    Ok(bincode::options()
        .serialize(value)
        .map_err(|err| Failure::Encode(err.into()))?
        .into())
}

// bincode::options() rejects trailing bytes, a blob is exactly one value
fn decode_blob<T: DeserializeOwned>(blob: &[u8]) -> Result<T, Failure> {
    bincode::options()
        .deserialize(blob)
        .map_err(|err| Failure::Decode(err.into()))
}

fn decode_value_reply<V: DeserializeOwned>(reply: &[u8]) -> Result<Option<V>, Failure> {
    wire::decode_value_reply(reply)
        .map_err(|err| Failure::Decode(err.into()))?
        .map(|blob| decode_blob(&blob))
        .transpose()
}
