use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use ewb_api::{build_router, ApiState};
use ewb_core::{EngineConfig, SimulationEngine};

fn app() -> Router {
    build_router(ApiState::new(SimulationEngine::new(EngineConfig::default())))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn divider() -> Value {
    json!({
        "components": [
            { "name": "supply", "kind": "voltage_source", "params": { "voltage": 5 } },
            { "name": "load", "kind": "resistor", "params": { "resistance": "10" } }
        ],
        "wires": [["supply.+", "load.1"], ["load.2", "supply.-"]]
    })
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn operating_point_of_created_circuit() {
    let app = app();
    let (status, created) = call(&app, "POST", "/v1/circuits", Some(divider())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["summary"]["node_count"], 2);
    let id = created["id"].as_u64().unwrap();

    let (status, run) = call(
        &app,
        "POST",
        &format!("/v1/circuits/{}/run/dc", id),
        Some(json!({ "sweep": "operating_point" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let amps = run["result"]["variables"]["i(r2)"][0].as_f64().unwrap();
    assert!((amps - 0.5).abs() < 1e-9);

    let run_id = run["run_id"].as_u64().unwrap();
    let (status, fetched) = call(&app, "GET", &format!("/v1/runs/{}", run_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["fingerprint"], run["fingerprint"]);
}

#[tokio::test]
async fn circuit_can_be_edited_piece_by_piece() {
    let app = app();
    let (_, created) = call(&app, "POST", "/v1/circuits", Some(json!({}))).await;
    let id = created["id"].as_u64().unwrap();
    let base = format!("/v1/circuits/{}", id);

    let (status, source) = call(
        &app,
        "POST",
        &format!("{}/components", base),
        Some(json!({ "kind": "v", "params": { "voltage": 2 } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, load) = call(
        &app,
        "POST",
        &format!("{}/components", base),
        Some(json!({ "kind": "resistor", "label": "load" })),
    )
    .await;
    assert_eq!(load["device"], "R2");
    assert_eq!(load["parameters"]["resistance"], 1000.0);

    for (a, b) in [(&source["terminals"][0], &load["terminals"][0]), (&load["terminals"][1], &source["terminals"][1])] {
        let (status, _) = call(&app, "POST", &format!("{}/wires", base), Some(json!({ "a": a, "b": b }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, nodes) = call(&app, "GET", &format!("{}/nodes", base), None).await;
    assert_eq!(nodes.as_array().unwrap().len(), 2);

    let (_, report) = call(&app, "GET", &format!("{}/validate", base), None).await;
    assert_eq!(report["ground"]["policy"], "default");

    let (status, patched) = call(
        &app,
        "PATCH",
        &format!("{}/components/{}", base, load["id"]),
        Some(json!({ "params": { "resistance": "4k" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["parameters"]["resistance"], 4000.0);

    let (_, netlist) = call(&app, "GET", &format!("{}/netlist", base), None).await;
    let deck = netlist["deck"].as_str().unwrap();
    assert!(deck.contains("R2 n1 0 4k"), "{}", deck);

    let (status, run) = call(
        &app,
        "POST",
        &format!("{}/run/tran", base),
        Some(json!({ "step": 1e-4, "end": 1e-3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["result"]["axis"]["name"], "time");

    let (status, removed) = call(&app, "DELETE", &format!("{}/components/{}", base, load["id"]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["removed_wires"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn errors_use_the_envelope() {
    let app = app();
    let (status, body) = call(&app, "GET", "/v1/circuits/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (_, created) = call(&app, "POST", "/v1/circuits", Some(divider())).await;
    let base = format!("/v1/circuits/{}", created["id"]);
    let terminal = &created["components"][0]["terminals"][0];

    let (status, body) = call(
        &app,
        "POST",
        &format!("{}/wires", base),
        Some(json!({ "a": terminal, "b": terminal })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_CONNECTION");

    let (status, body) = call(
        &app,
        "POST",
        &format!("{}/run/tran", base),
        Some(json!({ "step": 0.0, "end": 1e-3 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_PARAMETER");

    let (status, body) = call(
        &app,
        "PATCH",
        &format!("{}/components/1", base),
        Some(json!({ "params": { "resistance": 5 } })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "INVALID_PARAMETER");

    let (_, empty) = call(&app, "POST", "/v1/circuits", Some(json!({}))).await;
    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/circuits/{}/run/dc", empty["id"]),
        Some(json!({ "sweep": "operating_point" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "EMPTY_CIRCUIT");
}

#[tokio::test]
async fn one_shot_simulation_sweeps_a_source() {
    let app = app();
    let (status, run) = call(
        &app,
        "POST",
        "/v1/simulate",
        Some(json!({
            "circuit": divider(),
            "analysis": {
                "analysis": "dc",
                "sweep": "source",
                "source": "V1",
                "start": 0.0,
                "stop": 2.0,
                "increment": 1.0
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["result"]["axis"]["name"], "v1");
    let currents: Vec<f64> = run["result"]["variables"]["i(r2)"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(currents.len(), 3);
    assert!((currents[2] - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn cancel_without_a_run_reports_false() {
    let app = app();
    let (_, created) = call(&app, "POST", "/v1/circuits", Some(divider())).await;
    let (status, body) = call(&app, "POST", &format!("/v1/circuits/{}/cancel", created["id"]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn circuit_titles_reach_the_deck() {
    let app = app();
    let mut titled = divider();
    titled["title"] = json!("bench divider");

    let (status, run) = call(
        &app,
        "POST",
        "/v1/simulate",
        Some(json!({
            "circuit": titled.clone(),
            "analysis": { "analysis": "dc", "sweep": "operating_point" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["title"], "bench divider");

    let (_, created) = call(&app, "POST", "/v1/circuits", Some(titled)).await;
    let id = created["id"].as_u64().unwrap();
    let (_, netlist) = call(&app, "GET", &format!("/v1/circuits/{}/netlist", id), None).await;
    assert_eq!(netlist["title"], "bench divider");
    assert!(netlist["deck"].as_str().unwrap().starts_with("* bench divider\n"));

    let (_, untitled) = call(&app, "POST", "/v1/circuits", Some(divider())).await;
    let id = untitled["id"].as_u64().unwrap();
    let (status, run) = call(
        &app,
        "POST",
        &format!("/v1/circuits/{}/run/dc", id),
        Some(json!({ "sweep": "operating_point" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["title"], format!("circuit {}", id));
}
