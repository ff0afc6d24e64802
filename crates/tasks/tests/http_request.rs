use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use oscbridge_core::config::HttpBridge;
use oscbridge_core::{Argument, FactStore, Message};
use oscbridge_rules::Task;
use oscbridge_sources::{HttpBridgeSource, Source};
use oscbridge_tasks::default_tasks;

async fn started_bridge() -> HttpBridgeSource {
    let source = HttpBridgeSource::new(
        HttpBridge {
            name: "web".into(),
            prefix: String::new(),
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        },
        false,
    );
    source.start().await.unwrap();
    source
}

fn http_task(params: serde_json::Value) -> Box<dyn Task> {
    let registry = default_tasks(true, Arc::new(HashMap::new()));
    let mut task = registry["http_request"]();
    task.set_parameters(params.as_object().unwrap());
    task.validate().unwrap();
    task
}

#[tokio::test]
async fn get_request_reaches_the_bridge() {
    let bridge = started_bridge().await;
    let mut events = bridge.take_events().unwrap();
    let addr = bridge.local_addr().unwrap();

    let task = http_task(json!({
        "url": format!("http://{}/?address=/scene/recall&args[]=int,4", addr),
    }));
    task.execute(&FactStore::new()).await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        Message::new("/scene/recall", vec![Argument::int(4)])
    );
    bridge.stop().await;
}

#[tokio::test]
async fn rejected_request_is_a_task_error() {
    let bridge = started_bridge().await;
    let addr = bridge.local_addr().unwrap();

    let post = http_task(json!({
        "url": format!("http://{}/?address=/a", addr),
        "method": "POST",
        "body": "ignored",
        "headers": ["Content-Type: text/plain"],
    }));
    let err = post.execute(&FactStore::new()).await.unwrap_err();
    assert!(err.to_string().contains("405"), "{err}");

    let bad = http_task(json!({"url": format!("http://{}/", addr)}));
    let err = bad.execute(&FactStore::new()).await.unwrap_err();
    assert!(err.to_string().contains("400"), "{err}");
    bridge.stop().await;
}
