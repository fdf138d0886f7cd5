//! CanvasClient against a wiremock stand-in for the Canvas REST API.

use std::time::Duration;

use cpn_e2e::canvas::{CanvasClient, DefaultView, NewCourse, NewModuleItem};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> CanvasClient {
    CanvasClient::new(&server.uri(), "tok", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn create_course_returns_server_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/courses"))
        .and(header("Authorization", "Bearer tok"))
        .and(body_partial_json(json!({
            "course": {
                "name": "IGNORE: CPN TESTING",
                "course_code": "ignore_cpn_testing",
                "default_view": "modules"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 4242,
            "name": "IGNORE: CPN TESTING",
            "course_code": "ignore_cpn_testing",
            "default_view": "modules",
            "workflow_state": "unpublished"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let course = client(&server)
        .create_course(
            "1",
            &NewCourse {
                name: "IGNORE: CPN TESTING".into(),
                course_code: "ignore_cpn_testing".into(),
                default_view: DefaultView::Modules,
            },
        )
        .await
        .unwrap();

    assert_eq!(course.id, 4242);
    assert_eq!(course.default_view.as_deref(), Some("modules"));
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/courses/9/assignments"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"errors": [{"message": "Invalid access token."}]})),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .create_assignment(9, "Test Assignment")
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("create assignment"), "{msg}");
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("Invalid access token."), "{msg}");
}

#[tokio::test]
async fn session_url_is_exchanged_for_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login/session_token"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_url": "https://canvas.example/login/session_token?session_token=abc"
        })))
        .mount(&server)
        .await;

    let url = client(&server).session_url().await.unwrap();
    assert_eq!(url, "https://canvas.example/login/session_token?session_token=abc");
}

#[tokio::test]
async fn list_modules_detects_next_page() {
    let server = MockServer::start().await;
    let base = format!("{}/api/v1/courses/3/modules", server.uri());
    let link = format!(
        r#"<{base}?page=1&per_page=1>; rel="current",<{base}?page=2&per_page=1>; rel="next",<{base}?page=1&per_page=1>; rel="first",<{base}?page=12&per_page=1>; rel="last""#
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .and(query_param("per_page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", link.as_str())
                .set_body_json(json!([{"id": 1, "name": "Module 0", "position": 1}])),
        )
        .mount(&server)
        .await;

    let page = client(&server).list_modules(3, 1).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.link_header.unwrap().contains(r#"rel="next""#));
    assert!(page.links.has_next());
    assert_eq!(page.links.next(), Some(format!("{base}?page=2&per_page=1").as_str()));
}

#[tokio::test]
async fn list_modules_without_link_header_has_no_next() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let page = client(&server).list_modules(3, 100).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.link_header.is_none());
    assert!(!page.links.has_next());
}

#[tokio::test]
async fn list_all_modules_follows_next_links() {
    let server = MockServer::start().await;
    let base = format!("{}/api/v1/courses/3/modules", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!(r#"<{base}?page=2&per_page=100>; rel="current""#).as_str())
                .set_body_json(json!([{"id": 3, "name": "Module 2", "position": 3}])),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!(r#"<{base}?page=2&per_page=100>; rel="next""#).as_str())
                .set_body_json(json!([
                    {"id": 1, "name": "Module 0", "position": 1},
                    {"id": 2, "name": "Module 1", "position": 2}
                ])),
        )
        .mount(&server)
        .await;

    let modules = client(&server).list_all_modules(3).await.unwrap();
    let ids: Vec<u64> = modules.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn list_all_modules_refuses_off_host_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", r#"<https://elsewhere.example/steal?page=2>; rel="next""#)
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let err = client(&server).list_all_modules(3).await.unwrap_err();
    assert!(err.to_string().contains("off-host"));
}

#[tokio::test]
async fn default_view_is_sent_form_encoded() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/courses/8"))
        .and(body_string("course%5Bdefault_view%5D=feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 8, "name": "x"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_default_view(8, DefaultView::Feed)
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_course_sends_delete_event() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/courses/8"))
        .and(body_json(json!({"event": "delete"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"delete": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_course(8).await.unwrap();
}

#[tokio::test]
async fn module_item_body_is_wrapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/courses/8/modules/5/items"))
        .and(body_json(json!({
            "module_item": {"title": "Test module item", "type": "ExternalUrl", "external_url": "https://www.ox.ac.uk"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 61, "title": "Test module item", "type": "ExternalUrl", "module_id": 5,
            "external_url": "https://www.ox.ac.uk"
        })))
        .mount(&server)
        .await;

    let item = client(&server)
        .create_module_item(8, 5, &NewModuleItem::external_url("Test module item", "https://www.ox.ac.uk"))
        .await
        .unwrap();
    assert_eq!(item.id, 61);
    assert_eq!(item.kind, "ExternalUrl");
    assert_eq!(item.module_id, Some(5));
}

#[tokio::test]
async fn list_all_modules_refuses_userinfo_redirect_to_other_server() {
    let canvas = MockServer::start().await;
    let other = MockServer::start().await;
    let canvas_authority = canvas.uri().trim_start_matches("http://").to_string();
    let other_authority = other.uri().trim_start_matches("http://").to_string();

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "Link",
                    format!(r#"<http://{canvas_authority}@{other_authority}/steal>; rel="next""#).as_str(),
                )
                .set_body_json(json!([])),
        )
        .mount(&canvas)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&other)
        .await;

    let err = client(&canvas).list_all_modules(3).await.unwrap_err();
    assert!(err.to_string().contains("off-host"), "{err}");
}

#[tokio::test]
async fn list_all_modules_refuses_lookalike_host() {
    let server = MockServer::start().await;
    let port = server.address().port();
    let host = format!("http://localhost:{port}");
    let lookalike = format!("http://localhost.evil.example:{port}/steal?page=2");

    Mock::given(method("GET"))
        .and(path("/api/v1/courses/3/modules"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!(r#"<{lookalike}>; rel="next""#).as_str())
                .set_body_json(json!([])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let canvas = CanvasClient::new(&host, "tok", Duration::from_secs(5)).unwrap();
    let err = canvas.list_all_modules(3).await.unwrap_err();
    assert!(err.to_string().contains("off-host"), "{err}");
}
