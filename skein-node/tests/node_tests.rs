//! End-to-end node tests.
//!
//! Each test runs a node over in-memory pipes. The test plays both the client
//! and the `lin-kv`/`seq-kv` service nodes, answering key-value calls from
//! simulated stores.

use std::time::Duration;

use serde_json::{json, Value};
use skein_kv::{KvError, KvStore, SimulatedKvStore};
use skein_log::CommitStrategy;
use skein_node::{NodeConfig, NodeResult};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

const PIPE_BYTES: usize = 256 * 1024;

struct Cluster {
    to_node: DuplexStream,
    from_node: Lines<BufReader<DuplexStream>>,
    lin: SimulatedKvStore,
    seq: SimulatedKvStore,
    /// When false, key-value calls are swallowed without a reply.
    answer_kv: bool,
    next_msg_id: u64,
    node: JoinHandle<NodeResult<()>>,
}

impl Cluster {
    async fn start(config: NodeConfig) -> Self {
        let (to_node, node_input) = duplex(PIPE_BYTES);
        let (node_output, from_node) = duplex(PIPE_BYTES);

        let node = tokio::spawn(skein_node::run(BufReader::new(node_input), node_output, config));

        let mut cluster = Self {
            to_node,
            from_node: BufReader::new(from_node).lines(),
            lin: SimulatedKvStore::linearizable(42),
            seq: SimulatedKvStore::sequential(43),
            answer_kv: true,
            next_msg_id: 1,
            node,
        };

        let reply = cluster
            .request(json!({"type": "init", "node_id": "n1", "node_ids": ["n1", "n2"]}))
            .await;
        assert_eq!(reply["type"], "init_ok");
        cluster
    }

    async fn write_line(&mut self, message: &Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.to_node.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_request(&mut self, mut body: Value) -> u64 {
        let msg_id = self.next_msg_id;
        self.next_msg_id += 1;
        body["msg_id"] = json!(msg_id);
        self.write_line(&json!({"src": "c1", "dest": "n1", "body": body}))
            .await;
        msg_id
    }

    /// Sends one request and returns its reply body.
    async fn request(&mut self, body: Value) -> Value {
        self.requests(vec![body]).await.remove(0)
    }

    /// Sends all requests at once and returns their reply bodies in request
    /// order, serving key-value calls in the meantime.
    async fn requests(&mut self, bodies: Vec<Value>) -> Vec<Value> {
        let mut ids = Vec::new();
        for body in bodies {
            ids.push(self.send_request(body).await);
        }

        let mut replies: Vec<Option<Value>> = vec![None; ids.len()];
        while replies.iter().any(Option::is_none) {
            let line = tokio::time::timeout(Duration::from_secs(10), self.from_node.next_line())
                .await
                .expect("node stalled")
                .unwrap()
                .expect("node closed its output");
            let message: Value = serde_json::from_str(&line).unwrap();

            match message["dest"].as_str().unwrap() {
                "lin-kv" | "seq-kv" => self.serve_kv(&message).await,
                "c1" => {
                    let in_reply_to = message["body"]["in_reply_to"].as_u64().unwrap();
                    let slot = ids.iter().position(|id| *id == in_reply_to).unwrap();
                    replies[slot] = Some(message["body"].clone());
                }
                other => panic!("unexpected destination {other}"),
            }
        }

        replies.into_iter().map(Option::unwrap).collect()
    }

    async fn serve_kv(&mut self, message: &Value) {
        if !self.answer_kv {
            return;
        }

        let service = message["dest"].as_str().unwrap().to_string();
        let store = if service == "lin-kv" { &self.lin } else { &self.seq };
        let body = &message["body"];
        let key = body["key"].as_str().unwrap();

        let result = match body["type"].as_str().unwrap() {
            "read" => store
                .read(key)
                .await
                .map(|value| json!({"type": "read_ok", "value": value})),
            "write" => store
                .write(key, body["value"].as_i64().unwrap())
                .await
                .map(|()| json!({"type": "write_ok"})),
            "cas" => store
                .compare_and_swap(
                    key,
                    body["from"].as_i64().unwrap(),
                    body["to"].as_i64().unwrap(),
                    body["create_if_not_exists"].as_bool().unwrap_or(false),
                )
                .await
                .map(|()| json!({"type": "cas_ok"})),
            other => panic!("unexpected kv request {other}"),
        };

        let mut reply = result.unwrap_or_else(|e| {
            let code = match e {
                KvError::KeyNotFound { .. } => 20,
                KvError::PreconditionFailed { .. } => 22,
                _ => 13,
            };
            json!({"type": "error", "code": code, "text": e.to_string()})
        });
        reply["in_reply_to"] = body["msg_id"].clone();

        self.write_line(&json!({"src": service, "dest": "n1", "body": reply}))
            .await;
    }

    async fn shutdown(self) -> NodeResult<()> {
        drop(self.to_node);
        self.node.await.unwrap()
    }
}

fn send(key: &str, msg: i64) -> Value {
    json!({"type": "send", "key": key, "msg": msg})
}

#[tokio::test]
async fn test_send_poll_commit_list() {
    let mut cluster = Cluster::start(NodeConfig::for_testing()).await;

    let reply = cluster.request(send("k1", 9)).await;
    assert_eq!(reply["type"], "send_ok");
    assert_eq!(reply["offset"], 1);

    let reply = cluster.request(send("k1", 5)).await;
    assert_eq!(reply["offset"], 2);

    let reply = cluster
        .request(json!({"type": "poll", "offsets": {"k1": 1}}))
        .await;
    assert_eq!(reply["type"], "poll_ok");
    assert_eq!(reply["msgs"], json!({"k1": [[1, 9], [2, 5]]}));

    let reply = cluster
        .request(json!({"type": "commit_offsets", "offsets": {"k1": 1}}))
        .await;
    assert_eq!(reply["type"], "commit_offsets_ok");

    let reply = cluster
        .request(json!({"type": "list_committed_offsets", "keys": ["k1", "k2"]}))
        .await;
    assert_eq!(reply["type"], "list_committed_offsets_ok");
    assert_eq!(reply["offsets"], json!({"k1": 1}));

    let reply = cluster
        .request(json!({"type": "poll", "offsets": {"k1": 5}}))
        .await;
    assert_eq!(reply["msgs"], json!({"k1": []}));

    // Offsets and records in lin-kv, commits in seq-kv.
    assert_eq!(cluster.lin.peek("offset:k1"), Some(2));
    assert_eq!(cluster.lin.peek("log:k1:2"), Some(5));
    assert_eq!(cluster.seq.peek("commit:k1"), Some(1));

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_sends_get_distinct_offsets() {
    let mut cluster = Cluster::start(NodeConfig::for_testing()).await;

    let bodies = (0..20).map(|i| send("hot", i)).collect();
    let replies = cluster.requests(bodies).await;

    let mut offsets: Vec<u64> = replies
        .iter()
        .map(|r| r["offset"].as_u64().unwrap())
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, (1..=20).collect::<Vec<u64>>());

    let reply = cluster
        .request(json!({"type": "poll", "offsets": {"hot": 1}}))
        .await;
    assert_eq!(reply["msgs"]["hot"].as_array().unwrap().len(), 20);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_local_commits_skip_seq_kv() {
    let config = NodeConfig::for_testing().with_commit_strategy(CommitStrategy::Local);
    let mut cluster = Cluster::start(config).await;

    cluster
        .request(json!({"type": "commit_offsets", "offsets": {"k1": 3}}))
        .await;
    let reply = cluster
        .request(json!({"type": "list_committed_offsets", "keys": ["k1"]}))
        .await;

    assert_eq!(reply["offsets"], json!({"k1": 3}));
    assert_eq!(cluster.seq.op_counts().writes, 0);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_protocol_errors() {
    let mut cluster = Cluster::start(NodeConfig::for_testing()).await;

    let reply = cluster.request(json!({"type": "txn", "txn": []})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], 10);

    let reply = cluster
        .request(json!({"type": "poll", "offsets": ["k1"]}))
        .await;
    assert_eq!(reply["code"], 12);

    let reply = cluster.request(json!({"type": "send", "key": "k1"})).await;
    assert_eq!(reply["code"], 12);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kv_failure_is_reported() {
    let mut cluster = Cluster::start(NodeConfig::for_testing()).await;

    cluster.lin.fault_config().force_read_fail = true;
    let reply = cluster.request(send("k1", 1)).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], 13);

    // The next send goes through.
    let reply = cluster.request(send("k1", 1)).await;
    assert_eq!(reply["offset"], 1);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_kv_timeout_is_reported() {
    let config = NodeConfig::for_testing().with_kv_timeout(Duration::from_millis(50));
    let mut cluster = Cluster::start(config).await;

    cluster.answer_kv = false;
    let reply = cluster.request(send("k1", 1)).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], 0);

    cluster.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_before_init() {
    let (mut to_node, node_input) = duplex(PIPE_BYTES);
    let (node_output, from_node) = duplex(PIPE_BYTES);
    let node = tokio::spawn(skein_node::run(
        BufReader::new(node_input),
        node_output,
        NodeConfig::for_testing(),
    ));

    let request = json!({"src": "c1", "dest": "n1", "body": {"type": "send", "msg_id": 1, "key": "k", "msg": 1}});
    to_node
        .write_all(format!("{request}\n").as_bytes())
        .await
        .unwrap();
    drop(to_node);

    node.await.unwrap().unwrap();

    let mut lines = BufReader::new(from_node).lines();
    let reply: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["body"]["code"], 11);
    assert_eq!(reply["body"]["in_reply_to"], 1);
    assert_eq!(lines.next_line().await.unwrap(), None);
}
