//! 单目标执行器集成测试
//!
//! 测试范围:
//! - 元数据服务 leader 跟随与传输失败重试
//! - 单分区调用的 leader 变更处理
//! - 重试次数上限

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::{build_cache, host, meta_host, parts_of, MockMetaService, PartReply, ScriptedStorage};
use graphdb_client::client::{
    PartitionedBatch, RequestRouter, Route, RpcResponse, RpcStatsCollector, SingleTargetExecutor,
};
use graphdb_client::config::{ClientOptions, ClientRole};
use graphdb_client::core::{ClientError, ErrorCode, HostAddr};
use graphdb_client::meta::{LeaderTracker, MetaClient, PartitionDirectory, ServiceLeader};

struct Fixture {
    router: RequestRouter,
    executor: SingleTargetExecutor,
    stats: Arc<RpcStatsCollector>,
}

fn fixture(meta_addrs: Vec<HostAddr>) -> Fixture {
    let parts = parts_of(&[(1, &["c"]), (2, &["a", "b"])]);
    let directory = Arc::new(PartitionDirectory::with_cache(build_cache(&[(1, "nba", parts)])));
    let router = RequestRouter::new(directory, Arc::new(LeaderTracker::new()));
    let stats = Arc::new(RpcStatsCollector::new());

    let mut options = ClientOptions::new(meta_addrs.clone(), host("local"), ClientRole::Graph);
    options.retry_count = 3;
    options.retry_interval = Duration::from_millis(10);
    options.rpc_timeout = Duration::from_secs(5);

    let service = Arc::new(ServiceLeader::new(meta_addrs).expect("创建失败"));
    let executor = SingleTargetExecutor::new(router.clone(), service, Arc::clone(&stats), &options);
    Fixture {
        router,
        executor,
        stats,
    }
}

fn part2_request() -> PartitionedBatch<i64> {
    let mut parts = BTreeMap::new();
    // 1 % 2 + 1 == 2
    parts.insert(2, vec![1]);
    PartitionedBatch::new(1, parts)
}

/// 测试元数据调用跟随 leader 提示
#[tokio::test]
async fn test_service_follows_leader_hint() {
    let f = fixture(vec![meta_host("m1"), meta_host("m2"), meta_host("m3")]);
    let meta = MockMetaService::new();
    meta.set_leader(Some(meta_host("m3")));
    let client = MetaClient::new(meta.clone(), f.executor.clone());

    let spaces = client.list_spaces().await.expect("调用应该成功");
    assert!(spaces.is_empty());
    assert_eq!(f.executor.service().leader(), meta_host("m3"));
    assert_eq!(meta.calls().last(), Some(&meta_host("m3")));
    // 最多一次 leader 变更后命中
    assert!(meta.calls().len() <= 2);
}

/// 测试元数据服务全部不可达时返回 RpcFailed
#[tokio::test]
async fn test_service_transport_failure_exhausted() {
    let addrs = vec![meta_host("m1"), meta_host("m2")];
    let f = fixture(addrs.clone());
    let meta = MockMetaService::new();
    for addr in &addrs {
        meta.set_down(addr, true);
    }
    let client = MetaClient::new(meta.clone(), f.executor.clone());

    let err = client.list_spaces().await.expect_err("调用应该失败");
    assert!(matches!(err, ClientError::RpcFailed(_)));
    // 首次尝试加 3 次重试
    assert_eq!(meta.calls().len(), 4);

    let stats = f.stats.snapshot();
    assert_eq!(stats.rpc_sent, 4);
    assert_eq!(stats.rpc_failed, 4);
    assert_eq!(stats.retries, 3);
}

/// 测试传输失败后切换到其他节点
#[tokio::test]
async fn test_service_transport_failure_rotates() {
    let f = fixture(vec![meta_host("m1"), meta_host("m2")]);
    let meta = MockMetaService::new();
    meta.set_down(&meta_host("m1"), true);
    let client = MetaClient::new(meta.clone(), f.executor.clone());

    client.list_spaces().await.expect("调用应该成功");
    assert_eq!(f.executor.service().leader(), meta_host("m2"));
    assert_eq!(meta.calls().last(), Some(&meta_host("m2")));
}

/// 测试远端错误码转换为错误
#[tokio::test]
async fn test_service_remote_error() {
    let f = fixture(vec![meta_host("m1")]);
    let meta = MockMetaService::new();
    let client = MetaClient::new(meta.clone(), f.executor.clone());

    let err = client.get_space(9).await.expect_err("空间不存在");
    assert_eq!(err, ClientError::Remote(ErrorCode::SpaceNotFound));
    assert_eq!(meta.calls().len(), 1);
}

/// 测试单分区调用在 leader 变更后重试到新 leader
#[tokio::test]
async fn test_part_leader_changed_then_succeeded() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    storage.push_reply(&host("a"), 2, PartReply::LeaderChanged(Some(host("b"))));

    let response = f
        .executor
        .send_to_part(1, 2, part2_request(), storage.as_ref())
        .await
        .expect("调用应该成功");

    assert_eq!(response.code(), ErrorCode::Succeeded);
    assert_eq!(response.data, vec![(2, 1)]);
    assert_eq!(f.router.leaders().get(1, 2), Some(host("b")));
    assert_eq!(
        storage.calls(),
        vec![(host("a"), vec![2]), (host("b"), vec![2])]
    );
}

/// 测试提示的 leader 不是副本时回退到第一个副本
#[tokio::test]
async fn test_part_hint_outside_replicas_ignored() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    storage.push_reply(&host("b"), 2, PartReply::LeaderChanged(Some(host("z"))));
    f.router.leaders().update(1, 2, host("b"));

    let response = f
        .executor
        .send_to_part(1, 2, part2_request(), storage.as_ref())
        .await
        .expect("调用应该成功");

    assert_eq!(response.code(), ErrorCode::Succeeded);
    // 不会发往副本列表之外的主机，目标与路由器一致
    assert_eq!(
        storage.calls(),
        vec![(host("b"), vec![2]), (host("a"), vec![2])]
    );
    let part_hosts = f
        .router
        .directory()
        .get_part_hosts(1, 2)
        .expect("分区应该存在");
    assert_eq!(f.router.leaders().resolve(&part_hosts), Ok(host("a")));
}

/// 测试 leader 一直变化时返回最后一次应答
#[tokio::test]
async fn test_part_leader_changed_exhausted() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    storage.always(&host("a"), 2, PartReply::LeaderChanged(Some(host("b"))), 10);
    storage.always(&host("b"), 2, PartReply::LeaderChanged(Some(host("a"))), 10);

    let response = f
        .executor
        .send(
            host("a"),
            Route::Part {
                space_id: 1,
                part_id: 2,
            },
            part2_request(),
            storage.as_ref(),
        )
        .await
        .expect("应该返回最后一次应答");

    assert_eq!(response.code(), ErrorCode::LeaderChanged);
    assert_eq!(storage.calls().len(), 4);
}

/// 测试其他错误码原样返回
#[tokio::test]
async fn test_part_other_code_returned() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    storage.push_reply(&host("a"), 2, PartReply::Fail(ErrorCode::StoreFailure));

    let response = f
        .executor
        .send_to_part(1, 2, part2_request(), storage.as_ref())
        .await
        .expect("调用应该返回应答");

    assert_eq!(response.code(), ErrorCode::StoreFailure);
    assert_eq!(storage.calls().len(), 1);
}

/// 测试单分区传输失败不影响元数据服务 leader
#[tokio::test]
async fn test_part_transport_failure() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    storage.set_down(&host("a"));

    let err = f
        .executor
        .send_to_part(1, 2, part2_request(), storage.as_ref())
        .await
        .expect_err("调用应该失败");

    assert!(matches!(err, ClientError::RpcFailed(_)));
    assert_eq!(storage.calls().len(), 4);
    assert_eq!(f.executor.service().leader(), meta_host("m1"));
    assert!(f.router.leaders().get(1, 2).is_none());
}

/// 测试分区不存在
#[tokio::test]
async fn test_part_not_found() {
    let f = fixture(vec![meta_host("m1")]);
    let storage = ScriptedStorage::new();
    let err = f
        .executor
        .send_to_part(1, 9, part2_request(), storage.as_ref())
        .await
        .expect_err("分区不存在");
    assert_eq!(err.to_error_code(), ErrorCode::PartNotFound);
    assert!(storage.calls().is_empty());
}
