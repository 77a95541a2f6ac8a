use photo_export_core::config::GoogleDriveSettings;
use photo_export_core::contract::{FolderHandle, PhotoRecord, PhotoSink};
use photo_export_core::manifest::ManifestWriter;
use photo_export_core::sink::google_drive::FOLDER_MIME_TYPE;
use photo_export_core::sink::GoogleDriveSink;
use photo_export_core::ExportError;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> GoogleDriveSettings {
    GoogleDriveSettings {
        api_url: server.uri(),
        upload_url: format!("{}/upload", server.uri()),
    }
}

async fn mount_shared_folder(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", "sharedWithMe = true"))
        .and(header("Authorization", "Bearer drive-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{
                "id": "shared-1",
                "name": "Photo exports",
                "mimeType": FOLDER_MIME_TYPE,
                "permissions": [
                    { "role": "writer", "emailAddress": "exporter@project.iam.gserviceaccount.com" },
                    { "role": "owner", "emailAddress": "owner@example.com" }
                ]
            }]
        })))
        .mount(server)
        .await;
}

async fn connected_sink() -> (MockServer, GoogleDriveSink) {
    let server = MockServer::start().await;
    mount_shared_folder(&server).await;
    let sink = GoogleDriveSink::connect(settings(&server), "drive-token", ManifestWriter::new("."))
        .await
        .expect("connect should succeed");
    (server, sink)
}

fn folder_query(name: &str, parent: &str) -> String {
    format!(
        "name = '{name}' and '{parent}' in parents and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false"
    )
}

fn file_query(name: &str, parent: &str) -> String {
    format!(
        "name = '{name}' and '{parent}' in parents and mimeType != '{FOLDER_MIME_TYPE}' and trashed = false"
    )
}

#[tokio::test]
async fn connect_uses_first_shared_folder_and_its_owner() {
    let (_server, sink) = connected_sink().await;
    assert_eq!(sink.account_name(), "owner@example.com");
    assert_eq!(
        sink.root_folder(),
        FolderHandle {
            id: "shared-1".into(),
            path: String::new(),
        }
    );
}

#[tokio::test]
async fn connect_without_shared_folder_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .mount(&server)
        .await;

    let result =
        GoogleDriveSink::connect(settings(&server), "drive-token", ManifestWriter::new(".")).await;
    assert!(matches!(result, Err(ExportError::Auth(_))));
}

#[tokio::test]
async fn ensure_folder_twice_creates_once() {
    let (server, sink) = connected_sink().await;
    let query = folder_query("VKontakte", "shared-1");
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", query.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", query.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "folder-vk", "name": "VKontakte" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "folder-vk" })))
        .expect(1)
        .mount(&server)
        .await;

    let root = sink.root_folder();
    let first = sink.ensure_folder("VKontakte", &root).await.unwrap();
    let second = sink.ensure_folder("VKontakte", &root).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first,
        FolderHandle {
            id: "folder-vk".into(),
            path: "VKontakte".into(),
        }
    );
}

#[tokio::test]
async fn folder_names_with_quotes_are_escaped() {
    let (server, sink) = connected_sink().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", folder_query("Jeanne d\\'Arc", "shared-1").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "folder-ja", "name": "Jeanne d'Arc" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let folder = sink
        .ensure_folder("Jeanne d'Arc", &sink.root_folder())
        .await
        .unwrap();
    assert_eq!(folder.id, "folder-ja");
}

#[tokio::test]
async fn upload_deletes_existing_file_then_uploads() {
    let (server, sink) = connected_sink().await;
    let content = b"\xff\xd8\xff jpeg".to_vec();
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", file_query("3.jpg", "folder-album").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "old-3", "name": "3.jpg" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/files/old-3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/3.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload/session-3", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/session-3"))
        .and(body_bytes(content.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "new-3" })))
        .expect(1)
        .mount(&server)
        .await;

    let record = PhotoRecord {
        group_key: "271".into(),
        file_name: "3.jpg".into(),
        size_label: "w".into(),
        source_url: format!("{}/photos/3.jpg", server.uri()),
    };
    let folder = FolderHandle {
        id: "folder-album".into(),
        path: "VKontakte/Pavel Durov/Holidays".into(),
    };
    sink.upload(&record, &folder).await.unwrap();
}

#[tokio::test]
async fn rejected_transmit_is_transfer_error() {
    let (server, sink) = connected_sink().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", file_query("5.jpg", "folder-album").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/5.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": { "code": 403, "message": "The user's Drive storage quota has been exceeded." }
        })))
        .mount(&server)
        .await;

    let record = PhotoRecord {
        group_key: "271".into(),
        file_name: "5.jpg".into(),
        size_label: "w".into(),
        source_url: format!("{}/photos/5.jpg", server.uri()),
    };
    let folder = FolderHandle {
        id: "folder-album".into(),
        path: "VKontakte/Pavel Durov/Holidays".into(),
    };
    let err = sink.upload(&record, &folder).await.unwrap_err();
    match err {
        ExportError::Transfer { file_name, reason } => {
            assert_eq!(file_name, "5.jpg");
            assert!(reason.contains("403"), "unexpected reason: {reason}");
        }
        other => panic!("expected transfer error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_fetch_keeps_previous_export() {
    let (server, sink) = connected_sink().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", file_query("3.jpg", "folder-album").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "old-3", "name": "3.jpg" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/3.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let record = PhotoRecord {
        group_key: "271".into(),
        file_name: "3.jpg".into(),
        size_label: "w".into(),
        source_url: format!("{}/photos/3.jpg", server.uri()),
    };
    let folder = FolderHandle {
        id: "folder-album".into(),
        path: "VKontakte/Pavel Durov/Holidays".into(),
    };
    let err = sink.upload(&record, &folder).await.unwrap_err();
    assert!(matches!(err, ExportError::Transfer { ref file_name, .. } if file_name == "3.jpg"));
}

#[tokio::test]
async fn rejected_upload_session_keeps_previous_export() {
    let (server, sink) = connected_sink().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", file_query("3.jpg", "folder-album").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{ "id": "old-3", "name": "3.jpg" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/3.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/files"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let record = PhotoRecord {
        group_key: "271".into(),
        file_name: "3.jpg".into(),
        size_label: "w".into(),
        source_url: format!("{}/photos/3.jpg", server.uri()),
    };
    let folder = FolderHandle {
        id: "folder-album".into(),
        path: "VKontakte/Pavel Durov/Holidays".into(),
    };
    assert!(sink.upload(&record, &folder).await.is_err());
}

#[tokio::test]
async fn concurrently_created_folder_resolves_to_earliest() {
    let (server, sink) = connected_sink().await;
    let query = folder_query("VKontakte", "shared-1");
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", query.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "folder-mine" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("q", query.as_str()))
        .and(query_param("orderBy", "createdTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                { "id": "folder-theirs", "name": "VKontakte" },
                { "id": "folder-mine", "name": "VKontakte" }
            ]
        })))
        .mount(&server)
        .await;

    let folder = sink
        .ensure_folder("VKontakte", &sink.root_folder())
        .await
        .unwrap();
    assert_eq!(folder.id, "folder-theirs");
    assert_eq!(folder.path, "VKontakte");
}
