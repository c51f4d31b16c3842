use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use catalog_back::{
    AppState, app,
    config::MediaConfig,
    database::MemoryCatalogStore,
    models::UserRole,
    services::image_binder::MediaStorage,
    utils::jwt,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "catalog-test-boundary";

struct TestApp {
    dir: TempDir,
    router: Router,
    store: MemoryCatalogStore,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = MediaConfig {
            root: dir.path().to_path_buf(),
            url_prefix: "/media".to_string(),
        };
        let media = MediaStorage::new(&config);
        media.ensure_dirs().await.unwrap();

        let store = MemoryCatalogStore::new();
        store.add_category(1).await;

        let state = AppState::new(Arc::new(store.clone()), media, SECRET);
        Self {
            dir,
            router: app::router(state, &config),
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

fn bearer(role: UserRole) -> String {
    format!("Bearer {}", jwt::generate_token(SECRET, 3, role).unwrap())
}

#[derive(Default)]
struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn request(mut self, method: &str, uri: &str, auth: Option<String>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}

fn product_form() -> MultipartBody {
    MultipartBody::default()
        .text("product_name", "\"Tee\"")
        .text("brand", "Acme")
        .text("is_feature", "true")
        .text("category_id", "1")
        .text("description", "Soft cotton")
        .text(
            "variants",
            r#"{"price": 19.5, "stock": 3, "attributes": {"color": "red"}, "image_count": 1}"#,
        )
        .file("variant_images", "Front View.png", b"png bytes")
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert!(body["media"]["uploads"].as_str().unwrap().ends_with("uploads"));

    std::fs::remove_dir_all(app.dir.path().join("uploads")).unwrap();
    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn create_accepts_trailing_slash() {
    let app = TestApp::new().await;

    let (status, created) = app
        .send(product_form().request("POST", "/products/", Some(bearer(UserRole::Admin))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["product_name"], "Tee");

    let (status, _) = app
        .send(product_form().request("POST", "/products/", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.counts().await, (1, 1, 1));
}

#[tokio::test]
async fn mutations_require_an_admin_token() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(product_form().request("POST", "/products", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication required");

    let (status, _) = app
        .send(product_form().request("POST", "/products", Some("Token abc".to_string())))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(product_form().request("POST", "/products", Some("Bearer not-a-jwt".to_string())))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(product_form().request(
            "POST",
            "/products",
            Some(bearer(UserRole::Customer)),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");

    let (status, _) = app
        .send(
            Request::delete("/products/products/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.store.counts().await, (0, 0, 0));
}

#[tokio::test]
async fn product_lifecycle_over_http() {
    let app = TestApp::new().await;

    let (status, created) = app
        .send(product_form().request("POST", "/products", Some(bearer(UserRole::Admin))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["product_name"], "Tee");
    assert_eq!(created["admin_id"], 3);

    let image_url = created["variants"][0]["images"][0].as_str().unwrap().to_string();
    assert!(image_url.ends_with("_front_view.png"));

    let response = app
        .router
        .clone()
        .oneshot(Request::get(&image_url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = app.get(&format!("/products/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["variants"][0]["price"], 19.5);
    assert_eq!(fetched["variants"][0]["attributes"]["color"], "red");

    let (status, featured) = app.get("/products/featuredproducts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(featured.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/products/category/1").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/products/category/5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Category with ID 5 does not exist.");
    let (status, _) = app.get("/products/category/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = app
        .send(
            MultipartBody::default()
                .text("brand", "Globex")
                .text("is_feature", "false")
                .request(
                    "PUT",
                    &format!("/products/products/{}", id),
                    Some(bearer(UserRole::Admin)),
                ),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["brand"], "Globex");
    assert_eq!(updated["is_feature"], false);
    assert_eq!(updated["variants"][0]["images"][0], image_url.as_str());

    let (status, body) = app
        .send(
            Request::delete(format!("/products/products/{}", id))
                .header(header::AUTHORIZATION, bearer(UserRole::Admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Product deleted successfully");

    let (status, _) = app.get(&format!("/products/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_submissions_are_bad_requests() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            MultipartBody::default()
                .text("product_name", "Tee")
                .text("brand", "Acme")
                .text("is_feature", "true")
                .text("category_id", "1")
                .text("description", "Soft cotton")
                .text(
                    "variants",
                    r#"{"price": 10, "stock": 3, "attributes": {"color": "red"}, "image_count": 2}"#,
                )
                .file("variant_images", "a.png", b"a")
                .request("POST", "/products", Some(bearer(UserRole::Admin))),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Not enough images"));

    let (status, _) = app.get("/products/rating/by-rating?min_rating=7").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.counts().await, (0, 0, 0));
}

#[tokio::test]
async fn bulk_upload_reports_failed_rows() {
    let app = TestApp::new().await;
    let csv = concat!(
        "product_name,brand,is_feature,category_id,description,price,stock,attributes,image_filenames\n",
        "Tee,Acme,true,1,Soft,10,5,\"{\"\"color\"\": \"\"red\"\"}\",a.png\n",
        "Tee,Acme,true,1,Soft,10,5,\"{\"\"size\"\": \"\"M\"\"}\",a.png\n",
    );

    let (status, report) = app
        .send(
            MultipartBody::default()
                .file("file", "catalog.csv", csv.as_bytes())
                .file("images", "a.png", b"a")
                .request(
                    "POST",
                    "/products/bulk-upload",
                    Some(bearer(UserRole::Admin)),
                ),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["uploaded"], 1);
    assert_eq!(report["errors"], 1);
    assert_eq!(report["error_details"][0]["attributes"], r#"{"size": "M"}"#);
    assert!(
        report["error_details"][0]["error"]
            .as_str()
            .unwrap()
            .contains("color")
    );
    assert!(report["error_file"].is_string());

    let (status, body) = app
        .send(
            MultipartBody::default()
                .file("images", "a.png", b"a")
                .request(
                    "POST",
                    "/products/bulk-upload",
                    Some(bearer(UserRole::Admin)),
                ),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "CSV file is required");
}
