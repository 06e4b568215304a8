//! Thanos `info.Info` service.
//!
//! # Design Notes
//! The answer is fixed at construction. The bridge advertises the whole
//! representable time range because the backend, not this process, decides
//! what data exists. A successful `Info` call says nothing about backend
//! health.

use tonic::{Request, Response, Status};

use querybridge_common::COMPONENT_TYPE;

use crate::proto::thanos::info::{
    InfoRequest, InfoResponse, QueryApiInfo, StoreInfo, TsdbInfo, info_server::Info,
};
use crate::proto::thanos::{Label, ZLabelSet};

/// Label naming the backend this bridge forwards to.
pub const BACKEND_LABEL: &str = "query-backend";

pub struct InfoService {
    response: InfoResponse,
}

impl InfoService {
    /// `backend` is the target URL exactly as configured.
    pub fn new(backend: &str) -> Self {
        let labels = ZLabelSet {
            labels: vec![Label {
                name: BACKEND_LABEL.to_string(),
                value: backend.to_string(),
            }],
        };

        let response = InfoResponse {
            label_sets: vec![labels],
            component_type: COMPONENT_TYPE.to_string(),
            store: Some(StoreInfo {
                min_time: i64::MIN,
                max_time: i64::MAX,
                supports_sharding: false,
                supports_without_replica_labels: true,
                tsdb_infos: vec![TsdbInfo {
                    labels: None,
                    min_time: i64::MIN,
                    max_time: i64::MAX,
                }],
            }),
            query: Some(QueryApiInfo {}),
        };

        Self { response }
    }
}

#[tonic::async_trait]
impl Info for InfoService {
    async fn info(&self, _: Request<InfoRequest>) -> Result<Response<InfoResponse>, Status> {
        Ok(Response::new(self.response.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_full_range_descriptor() {
        // Nothing listens here; Info must not care.
        let svc = InfoService::new("http://127.0.0.1:1/prometheus");

        let info = svc
            .info(Request::new(InfoRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(info.component_type, "query");
        assert_eq!(info.label_sets.len(), 1);
        assert_eq!(info.label_sets[0].labels[0].name, BACKEND_LABEL);
        assert_eq!(
            info.label_sets[0].labels[0].value,
            "http://127.0.0.1:1/prometheus"
        );

        let store = info.store.unwrap();
        assert_eq!(store.min_time, i64::MIN);
        assert_eq!(store.max_time, i64::MAX);
        assert!(store.supports_without_replica_labels);
        assert_eq!(store.tsdb_infos.len(), 1);
        assert_eq!(store.tsdb_infos[0].min_time, i64::MIN);
        assert_eq!(store.tsdb_infos[0].max_time, i64::MAX);
        assert_eq!(store.tsdb_infos[0].labels, None);
        assert_eq!(info.query, Some(QueryApiInfo {}));
    }

    #[tokio::test]
    async fn backend_label_is_not_normalized() {
        let svc = InfoService::new("http://prometheus:9090");

        let info = svc
            .info(Request::new(InfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(info.label_sets[0].labels[0].value, "http://prometheus:9090");
    }
}
