use serde_json::{json, Value};

use scholar_gateway::{Filter, GatewayError, MemoryGateway, QueryGateway, QueryGatewayExt, Select};

fn seeded() -> MemoryGateway {
    MemoryGateway::new()
        .with_rows(
            "schools",
            vec![
                json!({"id": "s1", "tenant_id": "t1", "name": "North", "is_default": false}),
                json!({"id": "s2", "tenant_id": "t1", "name": "South", "is_default": true}),
                json!({"id": "s3", "tenant_id": "t2", "name": "East", "is_default": false}),
            ],
        )
        .with_rpc("is_school_admin_for_school", |args: &Value| {
            Ok(json!(args["school_uuid"] == "s1"))
        })
}

/// G1. Filters combine with AND semantics
#[tokio::test]
async fn test_filters_are_conjunctive() {
    let gw = seeded();

    let rows = gw
        .select(&Select::from("schools").eq("tenant_id", "t1").neq("is_default", true))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "s1");
}

/// G2. `in` filters and projections
#[tokio::test]
async fn test_in_filter_and_projection() {
    let gw = seeded();

    let rows = gw
        .select(
            &Select::from("schools")
                .columns("id,name")
                .is_in("id", ["s1", "s3"])
                .order("name", true),
        )
        .await
        .unwrap();

    assert_eq!(rows, vec![json!({"id": "s3", "name": "East"}), json!({"id": "s1", "name": "North"})]);
}

/// G3. single() distinguishes none from one
#[tokio::test]
async fn test_single_row_semantics() {
    let gw = seeded();

    let default = gw
        .select_single(&Select::from("schools").eq("is_default", true))
        .await
        .unwrap();
    assert_eq!(default["id"], "s2");

    let err = gw
        .select_single(&Select::from("schools").eq("tenant_id", "nope"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::NoRows { relation: "schools".to_string() });
}

/// G4. Upsert merges on the conflict columns
#[tokio::test]
async fn test_upsert_merges_on_conflict_columns() {
    let gw = MemoryGateway::new().with_rows(
        "sm_settings",
        vec![json!({"id": "x", "school_id": "s1", "key": "theme", "value": "light"})],
    );

    gw.upsert(
        "sm_settings",
        json!([
            {"school_id": "s1", "key": "theme", "value": "dark"},
            {"school_id": "s1", "key": "locale", "value": "en"}
        ]),
        &["school_id", "key"],
    )
    .await
    .unwrap();

    let rows = gw.rows("sm_settings");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "x");
    assert_eq!(rows[0]["value"], "dark");
    assert!(rows[1]["id"].is_string());
}

/// G5. RPC arguments reach the handler
#[tokio::test]
async fn test_rpc_receives_arguments() {
    let gw = seeded();

    assert!(gw
        .rpc_bool("is_school_admin_for_school", json!({"school_uuid": "s1"}))
        .await
        .unwrap());
    assert!(!gw
        .rpc_bool("is_school_admin_for_school", json!({"school_uuid": "s2"}))
        .await
        .unwrap());
    assert_eq!(gw.call_count(), 2);
}

/// G6. Writes without filters are refused
#[tokio::test]
async fn test_unfiltered_writes_are_refused() {
    let gw = seeded();

    let err = gw.update("schools", &[], json!({"name": "x"})).await.unwrap_err();
    assert!(matches!(err, GatewayError::Invalid(_)));

    let removed = gw
        .delete("schools", &[Filter::Eq("tenant_id".into(), json!("t2"))])
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(gw.rows("schools").len(), 2);
}
