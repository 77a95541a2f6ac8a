use assert_cmd::Command;
use photo_export::cli::{resolve_selection, GroupArg};
use photo_export_core::contract::{AlbumDescriptor, Listing, MockPhotoSource, Selection};
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("photo-export").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("export").and(predicate::str::contains("albums")));
}

#[test]
fn export_without_token_fails_with_env_hint() {
    let mut cmd = Command::cargo_bin("photo-export").expect("Binary exists");
    cmd.args([
        "export",
        "--source",
        "vk",
        "--subject",
        "durov",
        "--sink",
        "yandex-disk",
    ])
    .env_remove("VK_TOKEN");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("VK_TOKEN"));
}

#[test]
fn unknown_sink_is_rejected() {
    let mut cmd = Command::cargo_bin("photo-export").expect("Binary exists");
    cmd.args(["export", "--source", "vk", "--subject", "durov", "--sink", "dropbox"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("dropbox"));
}

async fn mount_vk(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/vk/users.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": [{ "id": 1, "first_name": "Pavel", "last_name": "Durov" }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vk/photos.get"))
        .and(query_param("album_id", "profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": { "count": 2, "items": [
                { "album_id": -6, "date": 1, "likes": { "count": 7 },
                  "sizes": [{ "type": "z", "url": format!("{}/cdn/a.jpg", server.uri()) }] },
                { "album_id": -6, "date": 2, "likes": { "count": 9 },
                  "sizes": [{ "type": "w", "url": format!("{}/cdn/b.jpg", server.uri()) }] }
            ] }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vk/photos.get"))
        .and(query_param("album_id", "wall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": { "error_code": 200, "error_msg": "Access denied" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vk/photos.getAlbums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": { "count": 0, "items": [] }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/b.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"b".to_vec()))
        .mount(server)
        .await;
}

async fn mount_yandex(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/disk"))
        .and(query_param("fields", "user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "user": { "login": "ivan", "display_name": "Ivan Petrov" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/disk/resources"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/disk/resources/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "href": format!("{}/upload-target", server.uri())
        })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-target"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn export_all_runs_end_to_end_against_mocked_providers() {
    let server = MockServer::start().await;
    mount_vk(&server).await;
    mount_yandex(&server).await;

    let manifests = tempdir().unwrap();
    let config = NamedTempFile::new().unwrap();
    write(
        config.path(),
        format!(
            "manifest_dir: {}\nvk:\n  api_url: {uri}/vk\nyandex_disk:\n  api_url: {uri}/disk\n",
            manifests.path().display(),
            uri = server.uri()
        ),
    )
    .unwrap();

    let config_path = config.path().to_path_buf();
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("photo-export")
            .expect("Binary exists")
            .args(["export", "--source", "vk", "--subject", "durov"])
            .args(["--sink", "yandex-disk", "--group", "all", "--config"])
            .arg(&config_path)
            .env("VK_TOKEN", "vk-token")
            .env("YANDEX_DISK_TOKEN", "disk-token")
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("exported 2 photo(s) to VKontakte/Pavel Durov"))
        .stdout(predicate::str::contains("nothing exported (Access denied)"));

    let manifest = std::fs::read_to_string(
        manifests
            .path()
            .join("VKontakte")
            .join("Pavel Durov")
            .join("metadata.json"),
    )
    .unwrap();
    assert_eq!(
        manifest,
        r#"[{"file_name":"7.jpg","size":"z"},{"file_name":"9.jpg","size":"w"}]"#
    );
}

#[tokio::test]
async fn album_selection_is_resolved_by_id() {
    let mut source = MockPhotoSource::new();
    source.expect_fetch_albums().returning(|| {
        Ok(Listing::ok(vec![AlbumDescriptor {
            id: "271".into(),
            title: "Holidays".into(),
        }]))
    });
    source
        .expect_subject_name()
        .return_const("Pavel Durov".to_string());

    let selection = resolve_selection(&source, GroupArg::Album, Some("271".into()))
        .await
        .unwrap();
    assert_eq!(
        selection,
        Selection::Album(AlbumDescriptor {
            id: "271".into(),
            title: "Holidays".into(),
        })
    );

    let err = resolve_selection(&source, GroupArg::Album, Some("999".into()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no album with id 999"));

    let err = resolve_selection(&source, GroupArg::Album, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--album-id"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Collects the debug rendering of every emitted event.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use photo_export::cli::{run, Cli, Commands, SinkKind, SourceKind};

    let cli = Cli {
        command: Commands::Export {
            source: SourceKind::Vk,
            subject: "durov".into(),
            sink: SinkKind::YandexDisk,
            group: GroupArg::All,
            album_id: None,
            count: None,
            config: Some(std::path::PathBuf::from("dummy.yaml")),
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "missing config file must fail");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
