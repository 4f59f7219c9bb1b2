//! 元数据服务接口
//!
//! `MetaService` 是元数据服务的传输层抽象，每个方法对应一个远程调用。
//! `MetaClient` 通过单目标执行器调用它，统一处理 leader 跟随、重试和错误码转换。

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{
    ConfigItem, HeartbeatReq, HeartbeatResp, HostItem, ListConfigsReq, ListHostsReq,
    ListSpacesReq, MetaResponse, SpaceIdName, SpaceReq,
};
use crate::client::single_target::SingleTargetExecutor;
use crate::client::transport::RemoteProcedure;
use crate::config::ConfigModule;
use crate::core::error::{ClientError, ClientResult, ErrorCode};
use crate::core::types::{
    EdgeSchemaItem, GraphSpaceID, HostAddr, IndexItem, PartsMap, SpaceDesc, TagSchemaItem,
};

/// 元数据服务的远程方法
#[async_trait]
pub trait MetaService: Send + Sync + 'static {
    async fn heartbeat(
        &self,
        host: &HostAddr,
        req: HeartbeatReq,
    ) -> ClientResult<MetaResponse<HeartbeatResp>>;

    async fn list_spaces(
        &self,
        host: &HostAddr,
        req: ListSpacesReq,
    ) -> ClientResult<MetaResponse<Vec<SpaceIdName>>>;

    async fn get_space(&self, host: &HostAddr, req: SpaceReq)
        -> ClientResult<MetaResponse<SpaceDesc>>;

    async fn get_parts_alloc(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<PartsMap>>;

    /// 返回每个标签的全部版本
    async fn list_tag_schemas(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<TagSchemaItem>>>;

    /// 返回每个边类型的全部版本
    async fn list_edge_schemas(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<EdgeSchemaItem>>>;

    async fn list_tag_indexes(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<IndexItem>>>;

    async fn list_edge_indexes(
        &self,
        host: &HostAddr,
        req: SpaceReq,
    ) -> ClientResult<MetaResponse<Vec<IndexItem>>>;

    async fn list_configs(
        &self,
        host: &HostAddr,
        req: ListConfigsReq,
    ) -> ClientResult<MetaResponse<Vec<ConfigItem>>>;

    /// 存储主机列表，附带各主机最近一次心跳上报的 leader 分区
    async fn list_hosts(
        &self,
        host: &HostAddr,
        req: ListHostsReq,
    ) -> ClientResult<MetaResponse<Vec<HostItem>>>;
}

macro_rules! meta_procedure {
    ($(#[$doc:meta])* $name:ident, $method:ident, $label:literal, $req:ty, $value:ty) => {
        $(#[$doc])*
        pub struct $name(pub Arc<dyn MetaService>);

        #[async_trait]
        impl RemoteProcedure for $name {
            type Request = $req;
            type Response = MetaResponse<$value>;

            fn name(&self) -> &'static str {
                $label
            }

            async fn call(
                &self,
                host: &HostAddr,
                request: Self::Request,
            ) -> ClientResult<Self::Response> {
                self.0.$method(host, request).await
            }
        }
    };
}

meta_procedure!(HeartbeatProc, heartbeat, "heartBeat", HeartbeatReq, HeartbeatResp);
meta_procedure!(
    ListSpacesProc,
    list_spaces,
    "listSpaces",
    ListSpacesReq,
    Vec<SpaceIdName>
);
meta_procedure!(GetSpaceProc, get_space, "getSpace", SpaceReq, SpaceDesc);
meta_procedure!(
    GetPartsAllocProc,
    get_parts_alloc,
    "getPartsAlloc",
    SpaceReq,
    PartsMap
);
meta_procedure!(
    ListTagSchemasProc,
    list_tag_schemas,
    "listTags",
    SpaceReq,
    Vec<TagSchemaItem>
);
meta_procedure!(
    ListEdgeSchemasProc,
    list_edge_schemas,
    "listEdges",
    SpaceReq,
    Vec<EdgeSchemaItem>
);
meta_procedure!(
    ListTagIndexesProc,
    list_tag_indexes,
    "listTagIndexes",
    SpaceReq,
    Vec<IndexItem>
);
meta_procedure!(
    ListEdgeIndexesProc,
    list_edge_indexes,
    "listEdgeIndexes",
    SpaceReq,
    Vec<IndexItem>
);
meta_procedure!(
    ListConfigsProc,
    list_configs,
    "listConfigs",
    ListConfigsReq,
    Vec<ConfigItem>
);
meta_procedure!(ListHostsProc, list_hosts, "listHosts", ListHostsReq, Vec<HostItem>);

/// 元数据服务客户端
#[derive(Clone)]
pub struct MetaClient {
    service: Arc<dyn MetaService>,
    executor: SingleTargetExecutor,
}

impl std::fmt::Debug for MetaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaClient")
            .field("leader", &self.executor.service().leader())
            .finish()
    }
}

impl MetaClient {
    pub fn new(service: Arc<dyn MetaService>, executor: SingleTargetExecutor) -> Self {
        Self { service, executor }
    }

    pub fn executor(&self) -> &SingleTargetExecutor {
        &self.executor
    }

    async fn call_leader<P: RemoteProcedure<Response = MetaResponse<T>>, T: Send + 'static>(
        &self,
        procedure: P,
        request: P::Request,
    ) -> ClientResult<T> {
        let response = self
            .executor
            .send_to_service(true, request, &procedure)
            .await?;
        match response.code {
            ErrorCode::Succeeded => Ok(response.value),
            ErrorCode::LeaderChanged => Err(ClientError::LeaderChanged {
                leader: response.leader,
            }),
            code => Err(ClientError::Remote(code)),
        }
    }

    pub async fn heartbeat(&self, req: HeartbeatReq) -> ClientResult<HeartbeatResp> {
        self.call_leader(HeartbeatProc(self.service.clone()), req)
            .await
    }

    pub async fn list_spaces(&self) -> ClientResult<Vec<SpaceIdName>> {
        self.call_leader(ListSpacesProc(self.service.clone()), ListSpacesReq)
            .await
    }

    pub async fn get_space(&self, space_id: GraphSpaceID) -> ClientResult<SpaceDesc> {
        self.call_leader(GetSpaceProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn get_parts_alloc(&self, space_id: GraphSpaceID) -> ClientResult<PartsMap> {
        self.call_leader(GetPartsAllocProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn list_tag_schemas(&self, space_id: GraphSpaceID) -> ClientResult<Vec<TagSchemaItem>> {
        self.call_leader(ListTagSchemasProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn list_edge_schemas(
        &self,
        space_id: GraphSpaceID,
    ) -> ClientResult<Vec<EdgeSchemaItem>> {
        self.call_leader(ListEdgeSchemasProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn list_tag_indexes(&self, space_id: GraphSpaceID) -> ClientResult<Vec<IndexItem>> {
        self.call_leader(ListTagIndexesProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn list_edge_indexes(&self, space_id: GraphSpaceID) -> ClientResult<Vec<IndexItem>> {
        self.call_leader(ListEdgeIndexesProc(self.service.clone()), SpaceReq { space_id })
            .await
    }

    pub async fn list_configs(&self, module: ConfigModule) -> ClientResult<Vec<ConfigItem>> {
        self.call_leader(ListConfigsProc(self.service.clone()), ListConfigsReq { module })
            .await
    }

    pub async fn list_hosts(&self) -> ClientResult<Vec<HostItem>> {
        self.call_leader(ListHostsProc(self.service.clone()), ListHostsReq)
            .await
    }
}
