//! Record shapes returned by the control plane.

use super::helpers::{Harness, WAIT, TestSupervisor, bot_id, config, harness};
use botvisor::command::domain::CommandDefinition;
use botvisor::command::services::TemplateCatalog;
use botvisor::instance::{
    adapters::{InMemoryBotGateway, memory::InMemoryBotStore},
    services::{ControlPlane, OperationReport},
};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

type Plane = ControlPlane<InMemoryBotStore, InMemoryBotGateway, DefaultClock>;

fn plane(supervisor: &Arc<TestSupervisor>) -> Plane {
    ControlPlane::new(Arc::clone(supervisor), Arc::new(TemplateCatalog::builtin()))
}

fn record(report: &OperationReport) -> Value {
    serde_json::to_value(report).expect("report serialises")
}

async fn started(harness: &Harness, plane: &Plane, raw: &str) -> Value {
    let bot = config(raw);
    harness.seed(&bot, &[CommandDefinition::simple("ping", "pong")]);
    let report = plane.start(bot).await;
    harness
        .supervisor
        .wait_until_ready(&bot_id(raw), WAIT)
        .await
        .expect("instance ready");
    record(&report)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_and_double_start_records(harness: Harness) {
    let plane = plane(&harness.supervisor);

    let first = started(&harness, &plane, "cp").await;
    let second = record(&plane.start(config("cp")).await);

    assert_eq!(
        first,
        json!({"success": true, "message": "bot cp started", "commands_loaded": 1})
    );
    assert_eq!(
        second,
        json!({"success": false, "error": "bot cp is already running"})
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stop_then_status_records(harness: Harness) {
    let plane = plane(&harness.supervisor);
    started(&harness, &plane, "cp").await;

    let stopped = record(&plane.stop("cp").await);
    let status = record(&plane.status("cp"));
    let again = record(&plane.stop("cp").await);

    assert_eq!(
        stopped,
        json!({"success": true, "message": "bot cp stopped", "forced": false})
    );
    assert_eq!(
        status,
        json!({"success": false, "error": "bot cp is not running"})
    );
    assert_eq!(again["success"], json!(false));
}

#[rstest]
#[case::start_by_id("start_by_id")]
#[case::stop("stop")]
#[case::restart("restart")]
#[case::reload("reload")]
#[case::status("status")]
#[case::command_stats("command_stats")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_ids_are_reported_without_side_effects(
    harness: Harness,
    #[case] operation: &str,
) {
    let plane = plane(&harness.supervisor);
    let raw = "bad id!";

    let report = match operation {
        "start_by_id" => plane.start_by_id(raw).await,
        "stop" => plane.stop(raw).await,
        "restart" => plane.restart(raw).await,
        "reload" => plane.reload(raw).await,
        "status" => plane.status(raw),
        _ => plane.command_stats(raw),
    };
    let value = record(&report);

    assert_eq!(value["success"], json!(false));
    assert!(value.get("message").is_none());
    assert!(
        value["error"]
            .as_str()
            .is_some_and(|error| error.contains("invalid characters")),
        "unexpected record {value}"
    );
    assert!(harness.supervisor.status_all().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_all_serialises_instances_by_id(harness: Harness) {
    let plane = plane(&harness.supervisor);
    started(&harness, &plane, "alpha").await;
    started(&harness, &plane, "beta").await;

    let value = record(&plane.status_all());
    let single = record(&plane.status("alpha"));

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["message"], json!("2 bot(s) supervised"));
    let instances = value["instances"]
        .as_object()
        .expect("instances is a map");
    assert_eq!(
        instances.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["alpha", "beta"]
    );
    assert_eq!(instances["beta"]["bot_id"], json!("beta"));
    assert_eq!(instances["beta"]["phase"], json!("ready"));
    assert_eq!(instances["beta"]["prefix_commands"], json!(1));
    assert_eq!(single["message"], json!("bot alpha is ready"));
    assert_eq!(single["state"]["phase"], json!("ready"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_status_all_has_an_empty_map(harness: Harness) {
    let plane = plane(&harness.supervisor);

    let value = record(&plane.status_all());

    assert_eq!(
        value,
        json!({"success": true, "message": "0 bot(s) supervised", "instances": {}})
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_records(harness: Harness) {
    let plane = plane(&harness.supervisor);

    let missing = record(&plane.reload("cp").await);
    started(&harness, &plane, "cp").await;
    harness
        .store
        .upsert_command(&bot_id("cp"), CommandDefinition::simple("hello", "hi"))
        .expect("definition stored");
    let applied = record(&plane.reload("cp").await);

    assert_eq!(
        missing,
        json!({"success": false, "error": "bot cp is not running"})
    );
    assert_eq!(applied["success"], json!(true));
    assert_eq!(applied["message"], json!("commands reloaded for bot cp"));
    let mut installed: Vec<&str> = applied["installed"]
        .as_array()
        .expect("installed is a list")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    installed.sort_unstable();
    assert_eq!(installed, vec!["hello", "ping"]);
    assert_eq!(applied["skipped"], json!([]));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_and_start_by_id_records(harness: Harness) {
    let plane = plane(&harness.supervisor);
    started(&harness, &plane, "cp").await;

    let restarted = record(&plane.restart("cp").await);
    harness
        .supervisor
        .wait_until_ready(&bot_id("cp"), WAIT)
        .await
        .expect("instance ready again");
    plane.stop("cp").await;
    let by_id = record(&plane.start_by_id("cp").await);
    let unknown = record(&plane.start_by_id("ghost").await);

    assert_eq!(
        restarted,
        json!({
            "success": true,
            "message": "bot cp restarted",
            "commands_loaded": 1,
            "forced": false,
        })
    );
    assert_eq!(
        by_id,
        json!({"success": true, "message": "bot cp started", "commands_loaded": 1})
    );
    assert_eq!(unknown["success"], json!(false));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn command_stats_combine_store_and_usage(harness: Harness) {
    let plane = plane(&harness.supervisor);
    started(&harness, &plane, "cp").await;
    harness
        .store
        .upsert_command(
            &bot_id("cp"),
            CommandDefinition::simple("off", "never").with_enabled(false),
        )
        .expect("definition stored");
    harness.say("cp", "alice", "!ping", 1).await;

    let value = record(&plane.command_stats("cp"));

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["total"], json!(2));
    assert_eq!(value["simple"], json!(2));
    assert_eq!(value["code_based"], json!(0));
    assert_eq!(value["enabled"], json!(1));
    assert_eq!(value["disabled"], json!(1));
    assert_eq!(value["total_usage"], json!(1));
    assert_eq!(value["errors"], json!(0));
    assert_eq!(
        value["usage"]["ping"],
        json!({"invocations": 1, "errors": 0})
    );
    assert!(value["last_active"].is_string());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn catalog_records(harness: Harness) {
    let plane = plane(&harness.supervisor);
    let params: BTreeMap<String, String> = [("sides".to_owned(), "20".to_owned())].into();

    let templates = record(&plane.templates());
    let variables = record(&plane.variables());
    let generated = record(&plane.generate_command("simple", "roll", &params));
    let unknown_kind = record(&plane.generate_command("weird", "roll", &params));
    let unknown_name = record(&plane.generate_command("simple", "nope", &params));

    assert_eq!(templates["success"], json!(true));
    assert!(templates["categories"]["fun"].as_array().is_some_and(|fun| !fun.is_empty()));
    assert!(
        variables["variables"]
            .as_array()
            .is_some_and(|tokens| tokens.iter().any(|entry| entry["token"] == json!("$username")))
    );
    assert_eq!(generated["success"], json!(true));
    assert_eq!(generated["definition"]["type"], json!("simple"));
    assert_eq!(generated["definition"]["trigger"], json!("roll"));
    assert_eq!(
        generated["definition"]["response"],
        json!("$username rolled **$random(1,20)**")
    );
    assert_eq!(generated["warnings"], json!([]));
    assert_eq!(
        unknown_kind,
        json!({"success": false, "error": "unknown command kind: weird"})
    );
    assert_eq!(
        unknown_name,
        json!({"success": false, "error": "no simple template named 'nope'"})
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn generated_definitions_are_validated(harness: Harness) {
    let plane = plane(&harness.supervisor);
    let params: BTreeMap<String, String> =
        [("sides".to_owned(), "os.exit()".to_owned())].into();

    let value = record(&plane.generate_command("code-based", "dice", &params));

    assert_eq!(value["success"], json!(false));
    assert!(
        value["error"]
            .as_str()
            .is_some_and(|error| error.starts_with("validation rejected")),
        "unexpected record {value}"
    );
    assert!(value["definition"]["code"]
        .as_str()
        .is_some_and(|code| code.contains("os.exit()")));
}
