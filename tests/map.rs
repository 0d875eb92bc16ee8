use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use bftmap::{wire, MapClient, Op, ServiceEndpoint};

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// In-process stand-in for the replicated service: decodes requests with the
/// shared wire contract, applies them to a local map, and records which
/// discipline every operation arrived through.
#[derive(Debug, Default)]
struct TestService {
    entries: HashMap<Bytes, Bytes>,
    ordered: Vec<Op>,
    unordered: Vec<Op>,
    fail: bool,
}

impl TestService {
    fn apply(&mut self, request: &[u8]) -> bftmap::Result<Bytes> {
        if self.fail {
            bftmap::bail!("injected endpoint fail")
        }
        let request = wire::Request::decode(request)?;
        Ok(match request.op {
            Op::Put => {
                let previous = self
                    .entries
                    .insert(request.key.unwrap(), request.value.unwrap());
                wire::encode_value_reply(previous.as_deref())
            }
            Op::Get => wire::encode_value_reply(
                self.entries.get(&request.key.unwrap()).map(|value| &**value),
            ),
            Op::Remove => {
                let previous = self.entries.remove(&request.key.unwrap());
                wire::encode_value_reply(previous.as_deref())
            }
            Op::Size => wire::encode_size_reply(self.entries.len() as _),
            Op::KeySet => wire::encode_key_set_reply(self.entries.keys().map(|key| &**key)),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct SharedService(Arc<Mutex<TestService>>);

#[async_trait::async_trait]
impl ServiceEndpoint for SharedService {
    async fn invoke_ordered(&mut self, request: Bytes) -> bftmap::Result<Bytes> {
        let mut service = self.0.lock().unwrap();
        let op = wire::Request::decode(&request)?.op;
        service.ordered.push(op);
        service.apply(&request)
    }

    async fn invoke_unordered(&mut self, request: Bytes) -> bftmap::Result<Bytes> {
        let mut service = self.0.lock().unwrap();
        let op = wire::Request::decode(&request)?.op;
        service.unordered.push(op);
        service.apply(&request)
    }

    async fn close(self) -> bftmap::Result<()> {
        Ok(())
    }
}

fn client(service: &SharedService) -> MapClient<String, String, SharedService> {
    MapClient::with_capacity_hint(service.clone(), 16)
}

#[tokio::test]
async fn scenario() {
    init();
    let service = SharedService::default();
    let mut client = client(&service);

    assert_eq!(client.put(&"1".into(), &"1".into()).await, None);
    assert_eq!(client.put(&"2".into(), &"2".into()).await, None);
    assert_eq!(client.get(&"1".into()).await, Some("1".into()));
    assert_eq!(client.size().await, 2);
    assert_eq!(
        client.key_set().await,
        ["1".to_string(), "2".to_string()].into()
    );
    assert_eq!(client.remove(&"1".into()).await, Some("1".into()));
    assert_eq!(client.size().await, 1);
    assert_eq!(client.get(&"1".into()).await, None);

    client.close().await.unwrap()
}

#[tokio::test]
async fn put_returns_previous_value() {
    let service = SharedService::default();
    let mut client = client(&service);
    assert_eq!(client.put(&"k".into(), &"old".into()).await, None);
    assert_eq!(
        client.put(&"k".into(), &"new".into()).await,
        Some("old".into())
    );
    assert_eq!(client.get(&"k".into()).await, Some("new".into()))
}

#[tokio::test]
async fn discipline_selection() {
    let service = SharedService::default();
    let mut client = client(&service);

    client.put(&"k".into(), &"v".into()).await;
    client.get(&"k".into()).await;
    client.size().await;
    client.key_set().await;
    client.remove(&"k".into()).await;

    let service = service.0.lock().unwrap();
    assert_eq!(service.ordered, [Op::Put, Op::Remove]);
    assert_eq!(service.unordered, [Op::Get, Op::Size, Op::KeySet])
}

#[tokio::test]
async fn empty_map() {
    let service = SharedService::default();
    let mut client = client(&service);
    assert_eq!(client.size().await, 0);
    assert!(client.key_set().await.is_empty());
    assert_eq!(client.get(&"never written".into()).await, None)
}

#[tokio::test]
async fn latency_accounting() {
    let service = SharedService::default();
    let mut client = client(&service);

    for i in 0..3 {
        client.put(&format!("{i}"), &"v".into()).await;
    }
    client.get(&"0".into()).await;

    assert_eq!(client.latency(Op::Put).len(), 3);
    assert_eq!(client.latency(Op::Get).len(), 1);
    assert_eq!(client.latency(Op::Remove).len(), 0);
    assert_eq!(client.latency(Op::Size).len(), 0);
    assert_eq!(client.latency(Op::KeySet).len(), 0)
}

#[tokio::test]
async fn endpoint_failure_turns_into_sentinels() {
    init();
    let service = SharedService::default();
    service.0.lock().unwrap().fail = true;
    let mut client = client(&service);

    assert_eq!(client.put(&"k".into(), &"v".into()).await, None);
    assert_eq!(client.get(&"k".into()).await, None);
    assert_eq!(client.remove(&"k".into()).await, None);
    assert_eq!(client.size().await, -1);
    assert!(client.key_set().await.is_empty());

    // failed submissions leave no latency samples behind
    for op in Op::ALL {
        assert_eq!(client.latency(op).len(), 0)
    }
}

#[derive(Debug)]
struct CorruptService;

#[async_trait::async_trait]
impl ServiceEndpoint for CorruptService {
    async fn invoke_ordered(&mut self, _: Bytes) -> bftmap::Result<Bytes> {
        Ok(Bytes::from_static(&[1, 2, 3]))
    }

    async fn invoke_unordered(&mut self, _: Bytes) -> bftmap::Result<Bytes> {
        Ok(Bytes::from_static(&[1, 2, 3]))
    }

    async fn close(self) -> bftmap::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn malformed_reply_turns_into_sentinels() {
    init();
    let mut client = MapClient::<String, String, _>::new(CorruptService);
    assert_eq!(client.get(&"k".into()).await, None);
    assert_eq!(client.size().await, -1);
    assert!(client.key_set().await.is_empty());
    // the round trip itself completed, so it is still timed
    assert_eq!(client.latency(Op::Get).len(), 1)
}

#[derive(Debug)]
struct StalledService;

#[async_trait::async_trait]
impl ServiceEndpoint for StalledService {
    async fn invoke_ordered(&mut self, _: Bytes) -> bftmap::Result<Bytes> {
        std::future::pending().await
    }

    async fn invoke_unordered(&mut self, _: Bytes) -> bftmap::Result<Bytes> {
        std::future::pending().await
    }

    async fn close(self) -> bftmap::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_endpoint_times_out() {
    init();
    let mut client = MapClient::<String, String, _>::new(StalledService);
    client.invoke_timeout = Duration::from_millis(50);
    assert_eq!(client.get(&"k".into()).await, None);
    assert_eq!(client.size().await, -1);
    assert_eq!(client.latency(Op::Get).len(), 0)
}

#[test]
#[should_panic(expected = "clear is not supported")]
fn clear_fails_fast() {
    let service = SharedService::default();
    client(&service).clear()
}

#[test]
#[should_panic(expected = "contains_key is not supported")]
fn contains_key_fails_fast() {
    let service = SharedService::default();
    client(&service).contains_key(&"k".into());
}

#[test]
#[should_panic(expected = "contains_value is not supported")]
fn contains_value_fails_fast() {
    let service = SharedService::default();
    client(&service).contains_value(&"v".into());
}

#[test]
#[should_panic(expected = "entry_set is not supported")]
fn entry_set_fails_fast() {
    let service = SharedService::default();
    client(&service).entry_set();
}

#[test]
#[should_panic(expected = "is_empty is not supported")]
fn is_empty_fails_fast() {
    let service = SharedService::default();
    client(&service).is_empty();
}

#[test]
#[should_panic(expected = "put_all is not supported")]
fn put_all_fails_fast() {
    let service = SharedService::default();
    client(&service).put_all([("k".to_string(), "v".to_string())])
}

#[test]
#[should_panic(expected = "values is not supported")]
fn values_fails_fast() {
    let service = SharedService::default();
    client(&service).values();
}
