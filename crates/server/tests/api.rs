//! HTTP-level tests of the API router against a migrated SQLite database.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use db::{
    models::{reference::ReferenceKind, structure::Structure, user::User},
    test_utils::{create_test_pool, insert_path, insert_reference, insert_structure, insert_user},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use server::{AppState, routes};
use services::services::{
    config::Config,
    datasource::{DataSourceError, SourceFetcher},
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

/// Serves a fixed body for every URL, or fails when none is set.
struct FixedFetcher(Option<&'static str>);

#[async_trait]
impl SourceFetcher for FixedFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, DataSourceError> {
        self.0
            .map(str::to_string)
            .ok_or_else(|| DataSourceError::Payload("unreachable".into()))
    }
}

struct TestApp {
    router: Router,
    pool: SqlitePool,
    structure: Structure,
    user: User,
    _temp_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with(Config::default(), FixedFetcher(None)).await
    }

    async fn with(config: Config, fetcher: FixedFetcher) -> Self {
        let (pool, temp_dir) = create_test_pool().await;
        let structure = insert_structure(&pool, "PNE").await;
        let user = insert_user(&pool, "admin", structure.id).await;
        let state = AppState::new(pool.clone(), config, Arc::new(fetcher));
        Self {
            router: routes::router(state),
            pool,
            structure,
            user,
            _temp_dir: temp_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("response")
    }

    fn get(&self, uri: &str) -> Request<Body> {
        self.get_as(&self.user, uri)
    }

    fn get_as(&self, user: &User, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", user.api_token))
            .body(Body::empty())
            .expect("request")
    }

    fn json(&self, method: &str, uri: &str, body: Value) -> Request<Body> {
        self.json_as(&self.user, method, uri, body)
    }

    fn json_as(&self, user: &User, method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", user.api_token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let response = app
        .send(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["database_ready"], true);
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let app = TestApp::new().await;
    let anonymous = app
        .send(Request::builder().uri("/api/paths").body(Body::empty()).unwrap())
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .send(
            Request::builder()
                .uri("/api/paths")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_list_and_profile_path() {
    let app = TestApp::new().await;
    let gr = insert_reference(&app.pool, ReferenceKind::Network, app.structure.id, "GR").await;
    let pr = insert_reference(&app.pool, ReferenceKind::Network, app.structure.id, "PR").await;
    let created = app
        .send(app.json(
            "POST",
            "/api/paths",
            json!({
                "name": "Sentier du lac",
                "geom": "LINESTRING Z (0 0 100, 3 4 100, 3 4 110)",
                "networks": [pr.id, gr.id],
            }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    let id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["ascent"], 10);

    let list = body_json(app.send(app.get("/api/paths")).await).await;
    assert_eq!(list["data"][0]["id"], id);
    assert_eq!(list["data"][0]["trails"], json!([]));
    assert_eq!(list["data"][0]["networks"], json!(["GR", "PR"]));

    let detail = body_json(app.send(app.get(&format!("/api/paths/{id}"))).await).await;
    assert_eq!(detail["data"]["can_edit"], true);
    assert_eq!(detail["data"]["name"], "Sentier du lac");

    let profile = body_json(app.send(app.get(&format!("/api/paths/{id}/profile"))).await).await;
    assert_eq!(
        profile["data"],
        json!([[0.0, 100.0], [5.0, 100.0], [15.0, 110.0]])
    );
}

#[tokio::test]
async fn test_path_list_without_trail_model() {
    let config = Config {
        trail_model_enabled: false,
        ..Config::default()
    };
    let app = TestApp::with(config, FixedFetcher(None)).await;
    insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 1 1)").await;

    let list = body_json(app.send(app.get("/api/paths")).await).await;
    assert!(list["data"][0].get("trails").is_none());
    assert_eq!(list["data"][0]["networks"], json!([]));
}

#[tokio::test]
async fn test_invalid_geometry_is_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .send(app.json("POST", "/api/paths", json!({"geom": "POINT(1 1)"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_non_finite_coordinates_are_bad_request() {
    let app = TestApp::new().await;
    for geom in ["LINESTRING(0 0, NaN 1)", "LINESTRING(0 0, inf 1)"] {
        let response = app
            .send(app.json("POST", "/api/paths", json!({ "geom": geom })))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{geom}");
    }
    let list = body_json(app.send(app.get("/api/paths")).await).await;
    assert_eq!(list["data"], json!([]));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = TestApp::new().await;
    let response = app.send(app.get("/api/paths/999")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_structure_edit_redirects_to_detail() {
    let app = TestApp::new().await;
    let other_structure = insert_structure(&app.pool, "Ecrins").await;
    let outsider = insert_user(&app.pool, "outsider", other_structure.id).await;
    let path = insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 1 1)").await;

    let update = app
        .send(app.json_as(
            &outsider,
            "PUT",
            &format!("/api/paths/{}", path.id),
            json!({"geom": "LINESTRING(0 0, 2 2)"}),
        ))
        .await;
    assert_eq!(update.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        update.headers()[header::LOCATION],
        format!("/api/paths/{}", path.id).as_str()
    );

    let delete = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/paths/{}", path.id))
                .header(header::AUTHORIZATION, format!("Bearer {}", outsider.api_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(delete.status(), StatusCode::SEE_OTHER);

    let detail = app.send(app.get_as(&outsider, &format!("/api/paths/{}", path.id))).await;
    assert_eq!(detail.status(), StatusCode::OK);
    assert_eq!(body_json(detail).await["data"]["can_edit"], false);
}

#[tokio::test]
async fn test_graph_endpoint_revalidation() {
    let app = TestApp::new().await;
    let empty = app.send(app.get("/api/paths/graph.json")).await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert!(empty.headers().get(header::LAST_MODIFIED).is_none());
    assert_eq!(body_json(empty).await, json!({"nodes": {}, "edges": {}}));

    let path = insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 10 0)").await;
    let response = app.send(app.get("/api/paths/graph.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    let last_modified = response.headers()[header::LAST_MODIFIED].clone();
    let graph = body_json(response).await;
    assert_eq!(
        graph["edges"][path.id.to_string()],
        json!({"nodes_id": [1, 2], "length": 10.0, "id": path.id})
    );

    let mut conditional = app.get("/api/paths/graph.json");
    conditional
        .headers_mut()
        .insert(header::IF_MODIFIED_SINCE, last_modified);
    let response = app.send(conditional).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_layers_and_exports() {
    let app = TestApp::new().await;
    let path = insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 3 4)").await;

    let layer = body_json(app.send(app.get("/api/paths/layer.geojson")).await).await;
    assert_eq!(layer["type"], "FeatureCollection");
    assert_eq!(layer["features"][0]["geometry"]["type"], "LineString");
    assert_eq!(layer["features"][0]["properties"]["id"], path.id);

    let export = app.send(app.get("/api/paths/export.csv")).await;
    assert_eq!(export.status(), StatusCode::OK);
    assert!(
        export.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let csv = String::from_utf8(body_bytes(export).await).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,name,valid,length"));
    assert!(lines.next().unwrap().starts_with(&format!("{},path-{}", path.id, path.id)));
}

#[tokio::test]
async fn test_trail_lifecycle() {
    let app = TestApp::new().await;
    let a = insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 10 0)").await;
    let b = insert_path(&app.pool, app.structure.id, "LINESTRING(10 0, 10 10)").await;

    let created = app
        .send(app.json(
            "POST",
            "/api/trails",
            json!({
                "name": "Tour du lac",
                "departure": "Parking",
                "topology": [
                    {"path": a.id, "start": 0.5, "end": 1.0},
                    {"path": b.id, "start": 0.0, "end": 1.0}
                ]
            }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let trail = body_json(created).await["data"].clone();
    let trail_id = trail["id"].as_i64().unwrap();
    let topology_id = trail["topology_id"].as_i64().unwrap();

    let detail = body_json(app.send(app.get(&format!("/api/trails/{trail_id}"))).await).await;
    assert_eq!(detail["data"]["name"], "Tour du lac");
    assert_eq!(detail["data"]["length"], 15.0);

    let initial = body_json(
        app.send(app.get(&format!("/api/trails/new?topology={topology_id}")))
            .await,
    )
    .await;
    assert_eq!(
        initial["data"]["topology"],
        json!([
            {"path": a.id, "start": 0.5, "end": 1.0},
            {"path": b.id, "start": 0.0, "end": 1.0}
        ])
    );

    let paths = body_json(app.send(app.get("/api/paths")).await).await;
    assert_eq!(
        paths["data"][0]["trails"],
        json!([{"id": trail_id, "name": "Tour du lac"}])
    );

    let layer = body_json(app.send(app.get("/api/trails/layer.geojson")).await).await;
    assert_eq!(layer["features"].as_array().unwrap().len(), 1);

    let deleted = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/trails/{trail_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {}", app.user.api_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = app.send(app.get(&format!("/api/trails/{trail_id}"))).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_new_trail_form_with_unknown_topology() {
    let app = TestApp::new().await;
    let response = app.send(app.get("/api/trails/new?topology=42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let unknown = body_json(response).await;
    assert_eq!(unknown["data"]["topology"], json!([]));
    assert_eq!(unknown["data"]["name"], "");

    let blank = body_json(app.send(app.get("/api/trails/new")).await).await;
    assert_eq!(blank["data"]["topology"], json!([]));
}

#[tokio::test]
async fn test_intervention_on_point_and_line() {
    let app = TestApp::new().await;
    insert_path(&app.pool, app.structure.id, "LINESTRING(0 0, 10 0)").await;

    let on_point = app
        .send(app.json(
            "POST",
            "/api/interventions",
            json!({"name": "Débroussaillage", "date": "2014-06-10", "geom": "POINT(4 1)", "width": 2.0}),
        ))
        .await;
    assert_eq!(on_point.status(), StatusCode::CREATED);
    let on_point = body_json(on_point).await;
    assert_eq!(on_point["data"]["length"], 0.0);
    assert_eq!(on_point["data"]["status"], "planned");

    let on_line = body_json(
        app.send(app.json(
            "POST",
            "/api/interventions",
            json!({"name": "Balisage", "date": "2014-06-11", "geom": "LINESTRING(2 1, 6 1)", "width": 2.0}),
        ))
        .await,
    )
    .await;
    assert_eq!(on_line["data"]["length"], 4.0);
    assert_eq!(on_line["data"]["area"], 8.0);

    let id = on_line["data"]["id"].as_i64().unwrap();
    let detail = body_json(app.send(app.get(&format!("/api/interventions/{id}"))).await).await;
    let start = detail["data"]["topology"][0]["start"].as_f64().unwrap();
    assert!((start - 0.2).abs() < 1e-9);

    let missing_geom = app
        .send(app.json(
            "POST",
            "/api/interventions",
            json!({"name": "Sans lieu", "date": "2014-06-12"}),
        ))
        .await;
    assert_eq!(missing_geom.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_lists_are_structure_scoped() {
    let app = TestApp::new().await;
    let created = app
        .send(app.json("POST", "/api/admin/stake", json!({"label": "High"})))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let entry_id = body_json(created).await["data"]["id"].as_i64().unwrap();

    let other_structure = insert_structure(&app.pool, "Ecrins").await;
    let outsider = insert_user(&app.pool, "outsider", other_structure.id).await;
    let theirs = body_json(app.send(app.get_as(&outsider, "/api/admin/stake")).await).await;
    assert_eq!(theirs["data"], json!([]));

    let rename = app
        .send(app.json_as(
            &outsider,
            "PUT",
            &format!("/api/admin/stake/{entry_id}"),
            json!({"label": "Hijacked"}),
        ))
        .await;
    assert_eq!(rename.status(), StatusCode::NOT_FOUND);

    let ours = body_json(app.send(app.get("/api/admin/stake")).await).await;
    assert_eq!(ours["data"][0]["label"], "High");

    let unknown = app.send(app.get("/api/admin/trek")).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_last_list_redirect() {
    let app = TestApp::new().await;
    let initial = app.send(app.get("/api/last-list")).await;
    assert_eq!(initial.status(), StatusCode::SEE_OTHER);
    assert_eq!(initial.headers()[header::LOCATION], "/api/paths");

    app.send(app.get("/api/interventions?status=planned")).await;
    let after = app.send(app.get("/api/last-list")).await;
    assert_eq!(
        after.headers()[header::LOCATION],
        "/api/interventions?status=planned"
    );
}

const REMOTE_GEOJSON: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [6.1, 44.8]}, "properties": {}}
]}"#;

#[tokio::test]
async fn test_datasource_listing_and_proxy() {
    let app = TestApp::with(Config::default(), FixedFetcher(Some(REMOTE_GEOJSON))).await;
    let created = app
        .send(app.json(
            "POST",
            "/api/datasources",
            json!({"title": "Refuges", "url": "https://example.org/refuges.json", "type": "GEOJSON"}),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    let geojson_url = created["data"]["geojson_url"].as_str().unwrap().to_string();

    let listing = body_json(app.send(app.get("/api/datasources")).await).await;
    assert_eq!(listing["data"][0]["geojson_url"], geojson_url.as_str());

    let collection = body_json(app.send(app.get(&geojson_url)).await).await;
    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["features"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_datasource_listing_follows_accept_language() {
    let app = TestApp::new().await;
    let created = app
        .send(app.json(
            "POST",
            "/api/datasources",
            json!({
                "title": "Refuges",
                "url": "https://example.org/refuges.json",
                "type": "GEOJSON",
                "titles": {"it": "Rifugi", "fr": "Refuges et gîtes"},
            }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let listing_in = |language: &'static str| {
        Request::builder()
            .uri("/api/datasources")
            .header(header::AUTHORIZATION, format!("Bearer {}", app.user.api_token))
            .header(header::ACCEPT_LANGUAGE, language)
            .body(Body::empty())
            .unwrap()
    };
    let italian = body_json(app.send(listing_in("it-IT,it;q=0.9")).await).await;
    assert_eq!(italian["data"][0]["title"], "Rifugi");

    let spanish = body_json(app.send(listing_in("es")).await).await;
    assert_eq!(spanish["data"][0]["title"], "Refuges et gîtes");

    let unlisted = body_json(app.send(app.get("/api/datasources")).await).await;
    assert_eq!(unlisted["data"][0]["title"], "Refuges et gîtes");
}

#[tokio::test]
async fn test_unreachable_datasource_yields_empty_collection() {
    let app = TestApp::new().await;
    let created = body_json(
        app.send(app.json(
            "POST",
            "/api/datasources",
            json!({"title": "Hors ligne", "url": "https://example.org/down", "type": "SITRA"}),
        ))
        .await,
    )
    .await;
    let geojson_url = created["data"]["geojson_url"].as_str().unwrap().to_string();

    let response = app.send(app.get(&geojson_url)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"type": "FeatureCollection", "features": []})
    );

    let unknown = app
        .send(app.get("/api/datasource/datasource-999.geojson"))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
