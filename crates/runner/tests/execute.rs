//! Executor integration tests against a scripted mock dispatcher.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use drover_runner::{
    Error, Executor, HttpRequest, Requester, RequestOptions, RhaiEngine, ScriptEngine, State,
    Waiter,
};
use drovefile::{Drovefile, Phase};

#[derive(Debug, Clone)]
struct Call {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
}

enum Scripted {
    Respond { status: u16, json: Option<String> },
    Fail(String),
}

#[derive(Default)]
struct MockRequester {
    calls: Mutex<Vec<Call>>,
    queue: Mutex<VecDeque<Scripted>>,
}

impl MockRequester {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push_status(&self, status: u16) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Respond { status, json: None });
    }

    fn push_json(&self, status: u16, body: &str) {
        self.queue.lock().unwrap().push_back(Scripted::Respond {
            status,
            json: Some(body.to_string()),
        });
    }

    fn push_fail(&self, message: &str) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

/// Hands the shared mock to the executor, which wants an owned
/// `Box<dyn Requester>`.
struct SharedRequester(Arc<MockRequester>);

#[async_trait]
impl Requester for SharedRequester {
    async fn do_request(
        &self,
        req: HttpRequest,
        _opts: &RequestOptions,
    ) -> Result<reqwest::Response, Error> {
        self.0.calls.lock().unwrap().push(Call {
            method: req.method.clone(),
            url: req.url.to_string(),
            headers: req
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
        });

        let scripted = self
            .0
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Scripted::Respond {
                status: 200,
                json: None,
            });

        match scripted {
            Scripted::Respond { status, json } => {
                let mut builder = http::Response::builder().status(status);
                let body = match json {
                    Some(body) => {
                        builder = builder.header("content-type", "application/json");
                        body
                    }
                    None => String::new(),
                };
                Ok(reqwest::Response::from(builder.body(body).unwrap()))
            }
            Scripted::Fail(message) => Err(Error::Response(message)),
        }
    }
}

fn executor(mock: &Arc<MockRequester>) -> Executor {
    Executor::new(
        Box::new(|| Box::new(RhaiEngine::new()) as Box<dyn ScriptEngine>),
        Box::new(SharedRequester(Arc::clone(mock))),
    )
}

fn parse(src: &str) -> Drovefile {
    Drovefile::parse(src).expect("test drovefile must parse")
}

#[tokio::test]
async fn phases_run_in_order() {
    let src = "
### Setup
POST https://t.example.com/setup
---
### Setup-Each
POST https://t.example.com/setup-each
---
### Tests
GET https://t.example.com/test1
---
GET https://t.example.com/test2
---
### Teardown-Each
POST https://t.example.com/teardown-each
---
### Teardown
POST https://t.example.com/teardown
";
    let mock = MockRequester::new();
    executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap();

    assert_eq!(
        mock.urls(),
        vec![
            "https://t.example.com/setup",
            "https://t.example.com/setup-each",
            "https://t.example.com/test1",
            "https://t.example.com/teardown-each",
            "https://t.example.com/setup-each",
            "https://t.example.com/test2",
            "https://t.example.com/teardown-each",
            "https://t.example.com/teardown",
        ]
    );
}

#[tokio::test]
async fn false_condition_skips_dispatch_and_script() {
    // The URI is unparsable and the script would fail, but neither is
    // ever touched when the condition resolves to false.
    let src = "
GET not-even-a-uri

[Options]
condition = false

[Script]
assert(false, \"must not run\");
";
    let mock = MockRequester::new();
    executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap();

    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn teardown_runs_after_aborted_setup() {
    let src = "
### Setup
GET https://t.example.com/boom

[Script]
assert(response.status_code == 200, \"setup must succeed\");

---
### Tests
GET https://t.example.com/never
---
### Teardown
POST https://t.example.com/cleanup
";
    let mock = MockRequester::new();
    mock.push_status(500);

    let err = executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    // The test step never ran, the teardown did.
    assert_eq!(
        mock.urls(),
        vec!["https://t.example.com/boom", "https://t.example.com/cleanup"]
    );
    assert!(err.to_string().contains("script failed"));
}

#[tokio::test]
async fn teardown_failure_is_reported_alongside() {
    let src = "
### Setup
GET https://t.example.com/boom

[Script]
assert(response.status_code == 200);

---
### Teardown
GET https://t.example.com/cleanup

[Script]
assert(response.status_code == 200);
";
    let mock = MockRequester::new();
    mock.push_status(500);
    mock.push_status(500);

    let err = executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    match err {
        Error::Multi(errs) => assert_eq!(errs.len(), 2),
        other => panic!("expected a multi-error, got {other}"),
    }
}

#[tokio::test]
async fn substitution_failure_in_teardown_continues_cleanup() {
    let src = "
### Tests
GET https://t.example.com/ok
---
### Teardown
GET https://t.example.com/{{.neverSet}}
---
POST https://t.example.com/final
";
    let mock = MockRequester::new();

    let err = executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    assert!(err.is_params_parsing());
    assert_eq!(
        mock.urls(),
        vec!["https://t.example.com/ok", "https://t.example.com/final"]
    );
}

#[tokio::test]
async fn no_abort_collects_all_failures() {
    let src = "
### Tests
GET https://t.example.com/a

[Script]
assert(response.status_code == 200);
---
GET https://t.example.com/b

[Script]
assert(response.status_code == 200);
---
GET https://t.example.com/c
";
    let mock = MockRequester::new();
    mock.push_status(500);
    mock.push_status(500);
    mock.push_status(200);

    let mut exec = executor(&mock);
    exec.no_abort = true;

    let err = exec
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    assert_eq!(mock.calls().len(), 3);
    match err {
        Error::Multi(errs) => assert_eq!(errs.len(), 2),
        other => panic!("expected a multi-error, got {other}"),
    }
}

#[tokio::test]
async fn always_abort_wins_over_no_abort() {
    let src = "
### Tests
GET https://t.example.com/a

[Options]
alwaysAbort = true

[Script]
assert(response.status_code == 200);
---
GET https://t.example.com/b
";
    let mock = MockRequester::new();
    mock.push_status(500);

    let mut exec = executor(&mock);
    exec.no_abort = true;

    exec.execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    assert_eq!(mock.urls(), vec!["https://t.example.com/a"]);
}

#[tokio::test]
async fn http_dispatch_failure_respects_abort_policy() {
    let src = "
### Tests
GET https://t.example.com/down
---
GET https://t.example.com/next
";
    let mock = MockRequester::new();
    mock.push_fail("connection refused");

    let err = executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("connection refused"));
    assert_eq!(mock.urls(), vec!["https://t.example.com/down"]);
}

#[tokio::test]
async fn script_state_flows_into_later_requests() {
    let src = "
### Tests
GET https://t.example.com/login

[Script]
let token = response.body.token;
---
GET https://t.example.com/use/{{.token}}
";
    let mock = MockRequester::new();
    mock.push_json(200, r#"{"token":"abc123"}"#);

    executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap();

    assert_eq!(mock.urls()[1], "https://t.example.com/use/abc123");
}

#[tokio::test]
async fn pre_script_writes_parameters_for_its_own_request() {
    let src = "
GET https://t.example.com/{{.segment}}

[PreScript]
let segment = \"from-pre\";
";
    let mock = MockRequester::new();

    executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap();

    assert_eq!(mock.urls(), vec!["https://t.example.com/from-pre"]);
}

#[tokio::test]
async fn initial_params_reach_templates() {
    let src = "GET https://t.example.com/{{.tenant}}\n";
    let mock = MockRequester::new();

    let mut initial = State::new();
    initial.insert("tenant".into(), serde_json::json!("acme"));

    executor(&mock)
        .execute_file(&parse(src), &initial)
        .await
        .unwrap();

    assert_eq!(mock.urls(), vec!["https://t.example.com/acme"]);
}

#[tokio::test]
async fn defaults_apply_to_every_request() {
    let src = "
[Defaults]

[Header]
X-Origin: drover

[Auth]
token = \"tkn\"

GET https://t.example.com/with-defaults
";
    let mock = MockRequester::new();

    executor(&mock)
        .execute_file(&parse(src), &State::new())
        .await
        .unwrap();

    let call = &mock.calls()[0];
    assert!(call
        .headers
        .contains(&("x-origin".to_string(), "drover".to_string())));
    assert!(call
        .headers
        .contains(&("authorization".to_string(), "Bearer tkn".to_string())));
    assert_eq!(call.method, "GET");
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let src = "GET https://t.example.com/anything\n";
    let mock = MockRequester::new();

    let mut exec = executor(&mock);
    exec.dry = true;

    exec.execute_file(&parse(src), &State::new()).await.unwrap();
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn skipped_phases_do_not_run() {
    let src = "
### Setup
POST https://t.example.com/setup
---
### Tests
GET https://t.example.com/test
";
    let mock = MockRequester::new();

    let mut exec = executor(&mock);
    exec.skip = vec![Phase::Setup];

    exec.execute_file(&parse(src), &State::new()).await.unwrap();
    assert_eq!(mock.urls(), vec!["https://t.example.com/test"]);
}

#[tokio::test]
async fn waiter_gates_each_dispatch() {
    struct CountingWaiter(AtomicUsize);

    #[async_trait]
    impl Waiter for CountingWaiter {
        async fn wait(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let src = "
### Tests
GET https://t.example.com/a
---
GET https://t.example.com/b

[Options]
condition = false
";
    let mock = MockRequester::new();
    let waiter = Arc::new(CountingWaiter(AtomicUsize::new(0)));

    struct SharedWaiter(Arc<CountingWaiter>);
    #[async_trait]
    impl Waiter for SharedWaiter {
        async fn wait(&self) {
            self.0.wait().await;
        }
    }

    let mut exec = executor(&mock);
    exec.waiter = Box::new(SharedWaiter(Arc::clone(&waiter)));

    exec.execute_file(&parse(src), &State::new()).await.unwrap();

    // One gate per dispatched request; the skipped request never waits.
    assert_eq!(waiter.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn directory_discovery_skips_underscored_entries() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::create_dir(root.join("_archived")).unwrap();
    std::fs::write(
        root.join("_archived/hidden.drove"),
        "GET https://t.example.com/hidden\n",
    )
    .unwrap();
    std::fs::write(root.join("_wip.drove"), "GET https://t.example.com/wip\n").unwrap();
    std::fs::write(root.join("notes.txt"), "not a drovefile").unwrap();
    std::fs::write(root.join("a.drove"), "GET https://t.example.com/a\n").unwrap();
    std::fs::write(root.join("b.drove"), "GET https://t.example.com/b\n").unwrap();

    let mock = MockRequester::new();
    executor(&mock)
        .execute(&[root.to_path_buf()], State::new())
        .await
        .unwrap();

    assert_eq!(
        mock.urls(),
        vec!["https://t.example.com/a", "https://t.example.com/b"]
    );
}

#[tokio::test]
async fn batch_continues_past_parse_failures() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    std::fs::write(root.join("broken.drove"), "### nonsense\n").unwrap();
    std::fs::write(root.join("good.drove"), "GET https://t.example.com/good\n").unwrap();

    let mock = MockRequester::new();
    let err = executor(&mock)
        .execute(&[root.to_path_buf()], State::new())
        .await
        .unwrap_err();

    assert_eq!(mock.urls(), vec!["https://t.example.com/good"]);
    match err {
        Error::Batch { total, failed, .. } => {
            assert_eq!(total, 2);
            assert_eq!(failed, 1);
        }
        other => panic!("expected a batch error, got {other}"),
    }
}

#[tokio::test]
async fn empty_directory_reports_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockRequester::new();

    let err = executor(&mock)
        .execute(&[dir.path().to_path_buf()], State::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoFiles));
}

#[tokio::test]
async fn single_file_path_executes_directly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.drove");
    std::fs::write(&path, "GET https://t.example.com/single\n").unwrap();

    let mock = MockRequester::new();
    executor(&mock)
        .execute(&[PathBuf::from(&path)], State::new())
        .await
        .unwrap();

    assert_eq!(mock.urls(), vec!["https://t.example.com/single"]);
}
