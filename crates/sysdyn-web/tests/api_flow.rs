//! End-to-end tests over the router: the upload → simulate → derive
//! pipeline plus the error paths, all via `tower::ServiceExt::oneshot`.
//! The image endpoints need system fonts, so only their precondition
//! failures are exercised here.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use sysdyn_web::config::Config;
use sysdyn_web::router::build_router;
use sysdyn_web::state::AppState;

const BOUNDARY: &str = "sysdyn-test-boundary";

const TEACUP_XMILE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xmile version="1.0" xmlns="http://docs.oasis-open.org/xmile/ns/XMILE/v1.0">
  <header><name>Teacup</name></header>
  <sim_specs><start>0</start><stop>30</stop><dt>0.125</dt></sim_specs>
  <model>
    <variables>
      <stock name="Teacup Temperature">
        <eqn>180</eqn>
        <outflow>Heat Loss to Room</outflow>
      </stock>
      <flow name="Heat Loss to Room">
        <eqn>(Teacup Temperature - Room Temperature) / Characteristic Time</eqn>
      </flow>
      <aux name="Room Temperature"><eqn>70</eqn></aux>
      <aux name="Characteristic Time"><eqn>10</eqn></aux>
    </variables>
  </model>
</xmile>
"#;

const POPULATION_MDL: &str = "\
Population= INTEG (births - deaths, 1000)\n\t~\tpeople\n\t~\t|\n\
births= Population * birth rate\n\t~\t~\t|\n\
deaths= Population / average lifetime\n\t~\t~\t|\n\
birth rate= 0.04\n\t~\t~\t|\n\
average lifetime= 70\n\t~\t~\t|\n\
FINAL TIME = 50\n\t~\t~\t|\n\
INITIAL TIME = 0\n\t~\t~\t|\n\
TIME STEP = 0.5\n\t~\t~\t|\n";

fn app() -> Router {
    build_router(AppState::new(Config::default()))
}

fn upload_request(field_name: &str, filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request succeeds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).expect("request builds")).await
}

#[tokio::test]
async fn xmile_pipeline_end_to_end() {
    let app = app();

    let (status, body) = send(&app, upload_request("file", "teacup.xmile", TEACUP_XMILE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Model teacup.xmile loaded successfully.");
    assert_eq!(body["format"], "xmile");
    assert_eq!(body["variables"], 4);
    let model_id = body["model_id"].as_str().expect("model_id present").to_string();

    let (status, body) = get(&app, "/simulate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_id"], model_id.as_str());
    assert_eq!(body["method"], "euler");
    assert_eq!(body["time"][0], 0.0);
    let series = body["series"].as_object().expect("series object");
    assert!(series.contains_key("teacup_temperature"));
    assert!(series.contains_key("heat_loss_to_room"));

    let (status, body) = get(&app, "/model_report").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stocks"], serde_json::json!(["teacup_temperature"]));
    assert_eq!(body["flows"], serde_json::json!(["heat_loss_to_room"]));
    assert_eq!(
        body["constants"],
        serde_json::json!(["room_temperature", "characteristic_time"])
    );

    // The teacup cools toward room temperature through one balancing loop
    let (status, body) = get(&app, "/cld").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let members = body["loops"][0].as_array().expect("loop members");
    assert!(members.contains(&Value::String("teacup_temperature".to_string())));

    let (status, body) = get(&app, "/feedback_loops").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_loops"][0]["polarity"], "balancing");

    let (status, body) = get(&app, "/simulation_summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["final_time"], 30.0);
    let final_temp = body["stocks"]["teacup_temperature"].as_f64().expect("stock value");
    assert!(final_temp > 70.0 && final_temp < 180.0);

    let (status, body) = get(&app, "/sd_report").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["model_structure"].is_object());
    assert!(body["simulation_summary"].is_object());
    assert_eq!(body["feedback_loops"]["feedback_loops"][0]["polarity"], "balancing");
}

#[tokio::test]
async fn convert_returns_a_python_file() {
    let app = app();
    send(&app, upload_request("file", "teacup.xmile", TEACUP_XMILE)).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/convert").body(Body::empty()).expect("request builds"))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/x-python"));
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("Teacup.py"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    let source = String::from_utf8(bytes.to_vec()).expect("utf-8 source");
    assert!(source.contains("def heat_loss_to_room(state, time):"));
    assert!(source.contains("state[\"teacup_temperature\"] = 180.0"));
    assert!(source.contains("if __name__ == \"__main__\":"));
}

#[tokio::test]
async fn vensim_upload_and_loops() {
    let app = app();
    let (status, body) = send(&app, upload_request("file", "population.mdl", POPULATION_MDL)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["format"], "vensim");

    let (status, body) = get(&app, "/feedback_loops").await;
    assert_eq!(status, StatusCode::OK);
    let loops = body["feedback_loops"].as_array().expect("loops array");
    assert_eq!(loops.len(), 2);
    let mut polarities: Vec<&str> = loops
        .iter()
        .map(|l| l["polarity"].as_str().expect("polarity"))
        .collect();
    polarities.sort_unstable();
    assert_eq!(polarities, vec!["balancing", "reinforcing"]);
}

#[tokio::test]
async fn endpoints_require_an_uploaded_model() {
    let app = app();
    for uri in ["/simulate", "/convert", "/sfd", "/cld", "/model_report", "/feedback_loops", "/sd_report"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "no_model", "{uri}");
    }
    // /visualize and /simulation_summary gate on results
    let (status, body) = get(&app, "/visualize").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_results");
}

#[tokio::test]
async fn visualize_requires_results_not_just_a_model() {
    let app = app();
    send(&app, upload_request("file", "teacup.xmile", TEACUP_XMILE)).await;
    let (status, body) = get(&app, "/visualize").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_results");
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let app = app();
    let (status, body) = send(&app, upload_request("file", "model.csv", "a,b\n1,2\n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_format");
}

#[tokio::test]
async fn malformed_xmile_is_unprocessable() {
    let app = app();
    let (status, body) =
        send(&app, upload_request("file", "broken.xmile", "<xmile><model></wrong></model></xmile>")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "model_parse");
}

#[tokio::test]
async fn algebraic_loop_is_unprocessable() {
    let src = "a= b\n\t~\t~\t|\nb= a\n\t~\t~\t|\n";
    let app = app();
    let (status, body) = send(&app, upload_request("file", "loop.mdl", src)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_model");
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = app();
    let (status, body) = send(&app, upload_request("attachment", "pop.mdl", POPULATION_MDL)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_upload");
}

#[tokio::test]
async fn reupload_drops_previous_results() {
    let app = app();
    send(&app, upload_request("file", "teacup.xmile", TEACUP_XMILE)).await;
    let (status, _) = get(&app, "/simulate").await;
    assert_eq!(status, StatusCode::OK);

    // A fresh upload replaces the session; old results must be gone
    send(&app, upload_request("file", "population.mdl", POPULATION_MDL)).await;
    let (status, body) = get(&app, "/simulation_summary").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_results");
}
