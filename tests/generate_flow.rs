//! End-to-end generation against a real git repository and a mock endpoint.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use diffscribe::ai::{OpenAiClient, ReqwestTransport, RetryPolicy};
use diffscribe::config::{ConfigStore, JsonFileStore, MemoryStore, ModelConfig, Settings};
use diffscribe::generate::{GenerateOptions, GenerateOutcome, Generator};
use diffscribe::git::GitRepository;
use diffscribe::utils::interaction::ConsoleInteraction;
use git2::{Repository, Signature};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Temporary repository with one commit of `README.md`.
struct TestRepo {
    temp_dir: TempDir,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        fs::write(temp_dir.path().join("README.md"), "# demo\n")?;

        let mut index = repo.index()?;
        index.add_path(Path::new("README.md"))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("Test User", "test@example.com")?;
        repo.commit(Some("HEAD"), &signature, &signature, "Initial", &tree, &[])?;

        Ok(Self { temp_dir })
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn write(&self, name: &str, content: &str) -> Result<()> {
        fs::write(self.path().join(name), content)?;
        Ok(())
    }
}

fn client() -> OpenAiClient {
    let transport = ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap();
    OpenAiClient::new(
        Arc::new(transport),
        RetryPolicy {
            max_attempts: 2,
            max_delay: Duration::from_millis(10),
        },
    )
}

fn store_for(server: &MockServer) -> MemoryStore {
    let mut model = ModelConfig::new("gpt-test", server.uri());
    model.api_key = Some("sk-test".to_string());
    MemoryStore::new(Settings::default().with_model_added(model).unwrap())
}

fn ok_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"content": text}}],
        "usage": {"prompt_tokens": 50, "completion_tokens": 8}
    })
}

async fn generate(
    store: &MemoryStore,
    repo: &TestRepo,
    options: &GenerateOptions,
) -> (GenerateOutcome, String, String) {
    let repository = GitRepository::discover_from(repo.path());
    let mut interaction = ConsoleInteraction::new(std::io::empty(), false);
    let mut output: Vec<u8> = Vec::new();
    let mut status: Vec<u8> = Vec::new();
    let outcome = {
        let mut generator = Generator::new(
            store,
            &repository,
            client(),
            &mut interaction,
            &mut output,
            &mut status,
        );
        generator.run(options).await.unwrap()
    };
    (
        outcome,
        String::from_utf8(output).unwrap(),
        String::from_utf8(status).unwrap(),
    )
}

#[tokio::test]
async fn generates_message_for_working_tree_changes() {
    let repo = TestRepo::new().unwrap();
    repo.write("README.md", "# demo\n\nUsage notes.\n").unwrap();
    repo.write("main.rs", "fn main() {}\n").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_body("```\nDocument usage\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let (outcome, output, _) = generate(&store, &repo, &GenerateOptions::default()).await;

    assert!(matches!(outcome, GenerateOutcome::Generated(_)));
    assert_eq!(output.trim(), "Document usage");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("Usage notes."));
    assert!(body.contains("main.rs"));

    let model = store.get_model_by_id_or_name("gpt-test").unwrap().unwrap();
    assert!(model.last_used.is_some());
    assert_eq!(store.usage().len(), 1);
}

#[tokio::test]
async fn clean_tree_makes_no_request() {
    let repo = TestRepo::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let (outcome, output, status) = generate(&store, &repo, &GenerateOptions::default()).await;
    assert_eq!(outcome, GenerateOutcome::NoChanges);
    assert!(output.is_empty());
    assert!(status.contains("No changes"));
}

#[tokio::test]
async fn context_overflow_retries_once_with_truncated_diff() {
    let repo = TestRepo::new().unwrap();
    for i in 0..6 {
        let content: String = (0..80).map(|n| format!("line {i}-{n}\n")).collect();
        repo.write(&format!("file{i}.txt"), &content).unwrap();
    }

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "message": "This model's maximum context length is 2000 tokens. However, you requested 5200 tokens.",
                "code": "context_length_exceeded"
            }
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Add data files")))
        .with_priority(2)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let (outcome, output, status) = generate(&store, &repo, &GenerateOptions::default()).await;

    match outcome {
        GenerateOutcome::Generated(generated) => {
            assert!(generated.omitted_files.is_some());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(output.trim(), "Add data files");
    assert!(status.contains("truncated"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].body.len() < requests[0].body.len());
    assert!(String::from_utf8_lossy(&requests[1].body).contains("diff truncated"));
    assert!(store.usage()[0].truncated);
}

#[test]
fn json_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());
    let mut model = ModelConfig::new("llama", "http://localhost:11434");
    model.aliases = vec!["local".to_string()];
    store.add_model(model).unwrap();

    let reopened = JsonFileStore::new(dir.path());
    let settings = reopened.load_settings().unwrap();
    assert_eq!(settings.models.len(), 1);
    assert_eq!(settings.models[0].aliases, vec!["local".to_string()]);
    assert_eq!(
        settings.default_model_id(),
        Some(settings.models[0].id.as_str())
    );
    assert!(reopened.settings_path().exists());
}
