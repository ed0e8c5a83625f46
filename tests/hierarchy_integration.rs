use std::sync::Arc;

use asset_hierarchy::config::{DatabaseConfig, DeletePolicy, HierarchyConfig};
use asset_hierarchy::logic::closure_violations;
use asset_hierarchy::{
    serve, ClosureEdge, CreateRequest, DeleteRequest, HierarchyService, HierarchyStore,
    MemoryStore, PostgresStore, UpdateRequest,
};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> Value {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
            .expect("request failed")
            .json()
            .await
            .expect("response is not JSON")
    }

    async fn get(&self, path: &str) -> Value {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request failed")
            .json()
            .await
            .expect("response is not JSON")
    }
}

async fn spawn_server(store: Arc<MemoryStore>, config: HierarchyConfig) -> TestClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let service = Arc::new(HierarchyService::new(store, config));
    tokio::spawn(async move {
        serve(listener, service).await.unwrap();
    });
    TestClient::new(format!("http://{}", address))
}

fn edge(ancestor: i64, descendant: i64, depth: i32) -> ClosureEdge {
    ClosureEdge::new(ancestor, descendant, depth)
}

#[tokio::test]
async fn test_electronics_scenarios_over_http() {
    let store = Arc::new(MemoryStore::new());
    let client = spawn_server(store.clone(), HierarchyConfig::default()).await;

    let health = client.get("/health").await;
    assert_eq!(health["status"], "healthy");

    // 1-3: build Electronics > Laptops > Gaming
    let res = client
        .post("/group/add", json!({"parent_id": 0, "name": "Electronics", "description": ""}))
        .await;
    assert_eq!(res, json!({"code": 1000, "msg": "success", "data": {"id": 1}}));
    assert_eq!(store.list_closure_edges().await.unwrap(), vec![edge(1, 1, 0)]);

    let res = client
        .post("/group/add", json!({"parent_id": 1, "name": "Laptops", "description": ""}))
        .await;
    assert_eq!(res["data"]["id"], 2);

    let res = client
        .post("/group/add", json!({"parent_id": 2, "name": "Gaming", "description": ""}))
        .await;
    assert_eq!(res["data"]["id"], 3);
    assert_eq!(
        store.list_closure_edges().await.unwrap(),
        vec![
            edge(1, 1, 0),
            edge(1, 2, 1),
            edge(1, 3, 2),
            edge(2, 2, 0),
            edge(2, 3, 1),
            edge(3, 3, 0),
        ]
    );

    // 4: rename leaves the closure table alone
    let before = store.list_closure_edges().await.unwrap();
    let res = client
        .post("/group/update", json!({"id": 2, "name": "Notebooks", "description": ""}))
        .await;
    assert_eq!(res["code"], 1000);
    assert_eq!(store.get_node(2).await.unwrap().unwrap().name, "Notebooks");
    assert_eq!(store.list_closure_edges().await.unwrap(), before);

    // 5: deleting a middle group reparents Gaming under Electronics
    let res = client.post("/group/delete", json!({"id": 2})).await;
    assert_eq!(res["code"], 1000);
    assert!(store.get_node(2).await.unwrap().is_none());
    assert_eq!(
        store.list_closure_edges().await.unwrap(),
        vec![edge(1, 1, 0), edge(1, 3, 1), edge(3, 3, 0)]
    );

    // 6: unknown ids are successful no-ops
    let res = client
        .post("/group/update", json!({"id": 999, "name": "Ghost", "description": ""}))
        .await;
    assert_eq!(res["code"], 1000);
    assert_eq!(res["data"]["rows_affected"], 0);

    let res = client.get("/group/integrity").await;
    assert_eq!(res["data"], json!([]));
}

#[tokio::test]
async fn test_restrict_policy_over_http() {
    let store = Arc::new(MemoryStore::new());
    let config = HierarchyConfig {
        delete_policy: DeletePolicy::Restrict,
        ..HierarchyConfig::default()
    };
    let client = spawn_server(store.clone(), config).await;

    client
        .post("/group/add", json!({"parent_id": 0, "name": "Electronics"}))
        .await;
    client
        .post("/group/add", json!({"parent_id": 1, "name": "Laptops"}))
        .await;

    let res = client.post("/group/delete", json!({"id": 1})).await;
    assert_eq!(res["code"], 1001);
    assert_eq!(res["data"], "group 1 still has 1 child group(s)");
    assert_eq!(store.list_nodes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_keep_closure_consistent() {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(spawn_server(store.clone(), HierarchyConfig::default()).await);

    client
        .post("/group/add", json!({"parent_id": 0, "name": "Root"}))
        .await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .post("/group/add", json!({"parent_id": 1, "name": format!("Child {}", i)}))
                .await
        }));
    }
    for handle in handles {
        let res = handle.await.unwrap();
        assert_eq!(res["code"], 1000);
    }

    let node_ids: Vec<i64> = store
        .list_nodes()
        .await
        .unwrap()
        .into_iter()
        .map(|group| group.id)
        .collect();
    assert_eq!(node_ids.len(), 17);
    let edges = store.list_closure_edges().await.unwrap();
    assert!(closure_violations(&node_ids, &edges).is_empty());
}

/// Runs the closure maintenance against a real PostgreSQL database when
/// `TEST_DATABASE_URL` points at one; the tables are emptied first.
#[tokio::test]
async fn test_postgres_closure_maintenance() {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        println!("TEST_DATABASE_URL not set, skipping PostgreSQL test");
        return;
    };

    let store = PostgresStore::connect(&database_url, &DatabaseConfig::default())
        .await
        .expect("Failed to connect to PostgreSQL");
    store.migrate().await.unwrap();
    sqlx::query("TRUNCATE asset_groups, closure_table RESTART IDENTITY")
        .execute(store.pool())
        .await
        .unwrap();

    let store = Arc::new(store);
    for policy in [DeletePolicy::Reparent, DeletePolicy::Cascade, DeletePolicy::Restrict] {
        let service = HierarchyService::new(
            store.clone(),
            HierarchyConfig {
                delete_policy: policy,
                ..HierarchyConfig::default()
            },
        );

        let electronics = service
            .create(CreateRequest::root("Electronics", ""))
            .await
            .unwrap()
            .id;
        let laptops = service
            .create(CreateRequest::new(electronics, "Laptops", ""))
            .await
            .unwrap()
            .id;
        let gaming = service
            .create(CreateRequest::new(laptops, "Gaming", ""))
            .await
            .unwrap()
            .id;
        assert!(service.verify().await.unwrap().is_empty());

        let missing = service.create(CreateRequest::new(-1, "Orphan", "")).await;
        assert!(missing.is_err());

        service
            .update(UpdateRequest::new(laptops, "Notebooks", ""))
            .await
            .unwrap();

        if policy == DeletePolicy::Restrict {
            assert!(service.delete(DeleteRequest { id: laptops }).await.is_err());
            service.delete(DeleteRequest { id: gaming }).await.unwrap();
        }
        service.delete(DeleteRequest { id: laptops }).await.unwrap();
        service.delete(DeleteRequest { id: electronics }).await.unwrap();
        assert!(service.verify().await.unwrap().is_empty(), "{:?}", policy);

        if policy == DeletePolicy::Reparent {
            service.delete(DeleteRequest { id: gaming }).await.unwrap();
        }
        assert!(store.list_nodes().await.unwrap().is_empty(), "{:?}", policy);
        assert!(store.list_closure_edges().await.unwrap().is_empty(), "{:?}", policy);
    }
}
