//! Create / Delete / Get / List behavior against an in-memory pool API.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use common::*;
use mkspool_core::labels::{
    ANNOTATION_NODE_ID, ANNOTATION_POOL_ID, LABEL_ARCH, LABEL_CAPACITY_TYPE, LABEL_INSTANCE_TYPE,
    LABEL_MANAGED_BY, LABEL_NODEPOOL, LABEL_OS, LABEL_REGISTERED, LABEL_TOPOLOGY_ZONE,
};
use mkspool_core::{ConditionStatus, Taint, TaintEffect};
use mkspool_provider::{ProviderError, ProviderSettings, Termination};

#[tokio::test(start_paused = true)]
async fn concurrent_creates_share_one_pool() {
    let h = harness(FakePoolApi::auto_provisioning()).await;
    let cancel = CancellationToken::new();

    let first = {
        let provider = h.provider.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            provider
                .create(&cancel, &claim("claim-a", "b3-8", Some("gra7-a")))
                .await
        })
    };
    let second = {
        let provider = h.provider.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            provider
                .create(&cancel, &claim("claim-b", "b3-8", Some("gra7-a")))
                .await
        })
    };

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    let pools = h.api.pools_named("karpenter-b3-8-gra7-a");
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].desired_nodes, 2);
    assert_eq!(h.api.call_count("CreateNodePool"), 1);

    assert_eq!(a.pool_id(), Some(pools[0].id.as_str()));
    assert_eq!(b.pool_id(), Some(pools[0].id.as_str()));
    assert_ne!(a.node_id(), b.node_id());
    assert_ne!(a.status.provider_id, b.status.provider_id);
    assert!(a.status.provider_id.starts_with("openstack:///inst-"));
}

#[tokio::test(start_paused = true)]
async fn create_scales_pool_found_by_listing() {
    let api = FakePoolApi::auto_provisioning();
    let pool_id = api.add_pool("karpenter-b3-8-gra7-a", "b3-8", 1);
    api.add_node(&pool_id, ready_node("old", "inst-old", "b3-8"));
    let h = harness(api).await;

    let created = h
        .provider
        .create(&CancellationToken::new(), &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap();

    assert_eq!(h.api.pool(&pool_id).unwrap().desired_nodes, 2);
    assert_eq!(h.api.call_count("CreateNodePool"), 0);
    assert_ne!(created.node_id(), Some("old"));
    assert_eq!(
        h.provider.cached_pool_id("karpenter-b3-8-gra7-a").await,
        Some(pool_id)
    );
    assert!(h.metrics.contains("pool_operation:scale_up:success"));
    assert!(h.metrics.contains("node_provisioning:b3-8:gra7-a:success"));
}

#[tokio::test(start_paused = true)]
async fn stale_cache_entry_is_revalidated() {
    let h = harness(FakePoolApi::auto_provisioning()).await;
    let cancel = CancellationToken::new();

    let first = h
        .provider
        .create(&cancel, &claim("c1", "c3-16", Some("gra7-b")))
        .await
        .unwrap();
    let first_pool = first.pool_id().unwrap().to_string();

    // Pool disappears behind the orchestrator's back.
    h.api.with_state(|s| {
        s.pools.remove(&first_pool);
        s.nodes.remove(&first_pool);
    });

    let second = h
        .provider
        .create(&cancel, &claim("c2", "c3-16", Some("gra7-b")))
        .await
        .unwrap();
    let second_pool = second.pool_id().unwrap().to_string();

    assert_ne!(first_pool, second_pool);
    assert_eq!(h.api.call_count("CreateNodePool"), 2);
    assert_eq!(
        h.provider.cached_pool_id("karpenter-c3-16-gra7-b").await,
        Some(second_pool)
    );
}

#[tokio::test(start_paused = true)]
async fn new_pool_template_binds_nodes() {
    let mut class = node_class("default");
    class.spec.monthly_billed = true;
    class.spec.tags.insert("team".into(), "ml".into());
    let h = harness_with(
        FakePoolApi::auto_provisioning(),
        vec![class],
        ProviderSettings::default(),
    )
    .await;

    let mut request = claim("c", "b3-8", Some("gra7-c"));
    request
        .labels
        .insert(LABEL_NODEPOOL.into(), "general".into());
    request.labels.insert("unrelated".into(), "x".into());
    request.taints.push(Taint {
        key: "dedicated".into(),
        value: Some("ml".into()),
        effect: TaintEffect::NoSchedule,
    });

    let created = h
        .provider
        .create(&CancellationToken::new(), &request)
        .await
        .unwrap();

    let req = h.api.create_request(created.pool_id().unwrap()).unwrap();
    assert_eq!(req.name, "karpenter-b3-8-gra7-c");
    assert_eq!(req.flavor_name, "b3-8");
    assert_eq!(req.desired_nodes, 1);
    assert!(!req.autoscale);
    assert!(req.monthly_billed);
    assert!(!req.anti_affinity);
    assert_eq!(req.availability_zones, vec!["gra7-c".to_string()]);

    let template = req.template.unwrap();
    let labels = &template.metadata.labels;
    assert_eq!(labels[LABEL_MANAGED_BY], "karpenter");
    assert_eq!(labels[LABEL_INSTANCE_TYPE], "b3-8");
    assert_eq!(labels[LABEL_TOPOLOGY_ZONE], "gra7-c");
    assert_eq!(labels[LABEL_CAPACITY_TYPE], "on-demand");
    assert_eq!(labels[LABEL_ARCH], "amd64");
    assert_eq!(labels[LABEL_OS], "linux");
    assert_eq!(labels[LABEL_REGISTERED], "true");
    assert_eq!(labels[LABEL_NODEPOOL], "general");
    assert_eq!(labels["team"], "ml");
    assert!(!labels.contains_key("unrelated"));
    assert!(template.metadata.annotations.is_empty());
    assert!(template.metadata.finalizers.is_empty());
    assert_eq!(template.spec.taints.len(), 1);

    assert_eq!(created.labels[LABEL_INSTANCE_TYPE], "b3-8");
    assert_eq!(created.labels[LABEL_TOPOLOGY_ZONE], "gra7-c");
    assert_eq!(created.labels[LABEL_CAPACITY_TYPE], "on-demand");
    assert!(created.annotations.contains_key(ANNOTATION_POOL_ID));
    assert!(created.annotations.contains_key(ANNOTATION_NODE_ID));
}

#[tokio::test(start_paused = true)]
async fn zone_defaults_to_first_zone_of_region() {
    let h = harness(FakePoolApi::auto_provisioning()).await;

    let created = h
        .provider
        .create(&CancellationToken::new(), &claim("c", "r3-32", None))
        .await
        .unwrap();

    assert_eq!(created.labels[LABEL_TOPOLOGY_ZONE], "gra7-a");
    assert_eq!(h.api.pools_named("karpenter-r3-32-gra7-a").len(), 1);
}

#[tokio::test]
async fn create_rejects_unusable_requests() {
    let mut broken = node_class("broken");
    broken.spec.kube_id.clear();
    let h = harness_with(
        FakePoolApi::new(),
        vec![node_class("default"), broken],
        ProviderSettings::default(),
    )
    .await;
    let cancel = CancellationToken::new();

    let mut no_flavor = claim("c", "b3-8", None);
    no_flavor.requirements.clear();
    let err = h.provider.create(&cancel, &no_flavor).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));

    let mut unknown_class = claim("c", "b3-8", None);
    unknown_class.node_class_ref = Some("missing".into());
    let err = h.provider.create(&cancel, &unknown_class).await.unwrap_err();
    assert!(matches!(err, ProviderError::InsufficientCapacity(_)));

    let mut not_ready = claim("c", "b3-8", None);
    not_ready.node_class_ref = Some("broken".into());
    let err = h.provider.create(&cancel, &not_ready).await.unwrap_err();
    match err {
        ProviderError::NodeClassNotReady(message) => assert_eq!(message, "kubeId is required"),
        other => panic!("expected NodeClassNotReady, got {other:?}"),
    }

    assert!(h.api.calls().is_empty());
    assert!(h.metrics.contains("node_provisioning:unknown:unknown:no_flavor"));
    assert!(h.metrics.contains("node_provisioning:unknown:unknown:nodeclass_not_ready"));
}

#[tokio::test(start_paused = true)]
async fn create_returns_within_one_interval_of_node_ready() {
    let h = harness(FakePoolApi::new()).await;
    let started = Instant::now();

    let api = h.api.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        let pool_id = api.pools_named("karpenter-b3-8-gra7-a")[0].id.clone();
        let mut node = ready_node("n1", "", "b3-8");
        node.status = "INSTALLING".into();
        api.add_node(&pool_id, node);

        tokio::time::sleep(Duration::from_secs(13)).await;
        api.with_state(|s| {
            let node = &mut s.nodes.get_mut(&pool_id).unwrap()[0];
            node.status = "READY".into();
            node.instance_id = "inst-n1".into();
        });
    });

    let created = h
        .provider
        .create(&CancellationToken::new(), &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(25));
    assert!(elapsed <= Duration::from_secs(36), "took {elapsed:?}");
    assert_eq!(created.status.provider_id, "openstack:///inst-n1");
    assert_eq!(created.node_id(), Some("n1"));
}

#[tokio::test(start_paused = true)]
async fn create_times_out_without_ready_node() {
    let settings = ProviderSettings {
        node_timeout: Duration::from_secs(60),
        ..Default::default()
    };
    let h = harness_with(FakePoolApi::new(), vec![node_class("default")], settings).await;
    let started = Instant::now();

    let err = h
        .provider
        .create(&CancellationToken::new(), &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(61));
    assert!(h.metrics.contains("node_provisioning:b3-8:gra7-a:timeout"));
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failures_are_swallowed() {
    let api = FakePoolApi::auto_provisioning();
    api.with_state(|s| s.transient_node_list_failures = 2);
    let h = harness(api).await;
    let started = Instant::now();

    let created = h
        .provider
        .create(&CancellationToken::new(), &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap();

    assert!(created.node_id().is_some());
    // Two failed ticks, then success on the third.
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(h.api.call_count("ListNodePoolNodes"), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_wait() {
    let h = harness(FakePoolApi::new()).await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        trigger.cancel();
    });
    let started = Instant::now();

    let err = h
        .provider
        .create(&cancel, &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(16));
}

#[tokio::test(start_paused = true)]
async fn delete_last_node_removes_pool() {
    let h = harness(FakePoolApi::auto_provisioning()).await;
    let cancel = CancellationToken::new();

    let created = h
        .provider
        .create(&cancel, &claim("c", "b3-8", Some("gra7-a")))
        .await
        .unwrap();
    let pool_id = created.pool_id().unwrap().to_string();
    assert!(h.provider.cached_pool_id("karpenter-b3-8-gra7-a").await.is_some());

    let termination = h.provider.delete(&cancel, &created).await.unwrap();

    assert_eq!(termination, Termination::PoolDeleted);
    assert!(h.api.pool(&pool_id).is_none());
    assert!(h.provider.cached_pool_id("karpenter-b3-8-gra7-a").await.is_none());
    assert!(h.metrics.contains("pool_operation:delete:success"));
}

#[tokio::test]
async fn delete_scales_down_larger_pool() {
    let api = FakePoolApi::new();
    let pool_id = api.add_pool("karpenter-b3-8-gra7-a", "b3-8", 3);
    let h = harness(api).await;

    let mut bound = claim("c", "b3-8", Some("gra7-a"));
    bound.bind(&pool_id, "n1", "node-n1");

    let termination = h
        .provider
        .delete(&CancellationToken::new(), &bound)
        .await
        .unwrap();

    assert_eq!(termination, Termination::ScaledDown);
    assert_eq!(h.api.pool(&pool_id).unwrap().desired_nodes, 2);
    assert!(h.metrics.contains("pool_operation:scale_down:success"));
}

#[tokio::test]
async fn delete_tolerates_missing_pool_and_rejects_unbound_claim() {
    let h = harness(FakePoolApi::new()).await;
    let cancel = CancellationToken::new();

    let err = h
        .provider
        .delete(&cancel, &claim("c", "b3-8", None))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.api.calls().is_empty());

    let mut gone = claim("c", "b3-8", None);
    gone.bind("pool-404", "n1", "node-n1");
    assert_eq!(
        h.provider.delete(&cancel, &gone).await.unwrap(),
        Termination::AlreadyGone
    );
}

#[tokio::test]
async fn delete_propagates_unexpected_read_failures() {
    let api = FakePoolApi::new();
    let pool_id = api.add_pool("karpenter-b3-8-gra7-a", "b3-8", 2);
    api.with_state(|s| s.unreadable_pools.insert(pool_id.clone()));
    let h = harness(api).await;

    let mut bound = claim("c", "b3-8", None);
    bound.bind(&pool_id, "n1", "node-n1");
    let err = h
        .provider
        .delete(&CancellationToken::new(), &bound)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Api { .. }));
    assert_eq!(h.api.pool(&pool_id).unwrap().desired_nodes, 2);
}

#[tokio::test]
async fn get_finds_node_by_provider_id() {
    let api = FakePoolApi::new();
    let unmanaged = api.add_pool("system", "b3-8", 1);
    api.add_node(&unmanaged, ready_node("sys", "abc123", "b3-8"));
    let broken = api.add_pool("karpenter-b3-8-gra7-a", "b3-8", 1);
    let managed = api.add_pool("karpenter-c3-16-gra7-b", "c3-16", 1);
    api.add_node(&managed, ready_node("n7", "abc123", "c3-16"));
    api.with_state(|s| s.broken_pools.insert(broken.clone()));
    let h = harness(api).await;

    let found = h
        .provider
        .get(&CancellationToken::new(), "openstack:///abc123")
        .await
        .unwrap();

    assert_eq!(found.pool_id(), Some(managed.as_str()));
    assert_eq!(found.node_id(), Some("n7"));
    assert_eq!(found.status.provider_id, "openstack:///abc123");
    assert_eq!(found.status.node_name, "node-n7");
    assert_eq!(found.labels[LABEL_INSTANCE_TYPE], "c3-16");
    assert_eq!(found.labels[LABEL_TOPOLOGY_ZONE], "gra7-b");
    assert_eq!(found.labels[LABEL_ARCH], "amd64");
}

#[tokio::test]
async fn get_rejects_malformed_provider_id_without_remote_calls() {
    let h = harness(FakePoolApi::new()).await;

    let err = h
        .provider
        .get(&CancellationToken::new(), "abc123")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(h.api.calls().is_empty());

    let err = h
        .provider
        .get(&CancellationToken::new(), "openstack:///missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn list_is_best_effort() {
    let api = FakePoolApi::new();
    let zoned = api.add_pool("karpenter-b3-8-x", "b3-8", 1);
    api.update_pool(&zoned, |p| p.availability_zone = Some("gra7-b".into()));
    api.add_node(&zoned, ready_node("n1", "i1", "b3-8"));
    let named = api.add_pool("karpenter-b3-8-gra7-c", "b3-8", 1);
    api.add_node(&named, ready_node("n2", "i2", ""));
    let plain = api.add_pool("karpenter-b3-16", "b3-16", 1);
    api.add_node(&plain, ready_node("n3", "i3", "b3-16"));
    let broken = api.add_pool("karpenter-c3-8-gra7-a", "c3-8", 1);
    api.with_state(|s| s.broken_pools.insert(broken.clone()));
    let system = api.add_pool("system", "b3-8", 1);
    api.add_node(&system, ready_node("sys", "isys", "b3-8"));
    let h = harness(api).await;

    let claims = h.provider.list(&CancellationToken::new()).await.unwrap();

    let zones: HashSet<(String, String)> = claims
        .iter()
        .map(|c| {
            (
                c.node_id().unwrap().to_string(),
                c.labels[LABEL_TOPOLOGY_ZONE].clone(),
            )
        })
        .collect();
    assert_eq!(
        zones,
        HashSet::from([
            ("n1".to_string(), "gra7-b".to_string()),
            ("n2".to_string(), "gra7-c".to_string()),
            ("n3".to_string(), "gra7-a".to_string()),
        ])
    );
    // Falls back to the pool flavor when the node does not report one.
    let n2 = claims.iter().find(|c| c.node_id() == Some("n2")).unwrap();
    assert_eq!(n2.labels[LABEL_INSTANCE_TYPE], "b3-8");
    assert!(h.metrics.contains("pools_active:4"));
}

#[tokio::test]
async fn repair_policies_cover_unready_nodes() {
    let h = harness(FakePoolApi::new()).await;
    let policies = h.provider.repair_policies();

    assert_eq!(h.provider.name(), "ovhcloud");
    assert_eq!(policies.len(), 2);
    assert!(policies.iter().all(|p| p.condition_type == "Ready"));
    assert!(policies.iter().all(|p| p.toleration == Duration::from_secs(600)));
    assert_eq!(policies[0].condition_status, ConditionStatus::False);
    assert_eq!(policies[1].condition_status, ConditionStatus::Unknown);
}
