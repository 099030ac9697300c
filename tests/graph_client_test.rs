use drive_fs::domain::ports::RemoteStore;
use drive_fs::{
    DirectoryInfo, DriveError, DriveFileSystem, FileInfo, FileSystemInfo, GraphClient,
    HashProvider, RemoteEntry, RemoteItem,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "test-token";
const BEARER: &str = "Bearer test-token";

fn file_json(id: &str, name: &str, size: u64, parent_path: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "size": size,
        "createdDateTime": "2024-03-01T10:00:00Z",
        "lastModifiedDateTime": "2024-03-02T11:30:00Z",
        "file": {
            "mimeType": "application/octet-stream",
            "hashes": { "sha1Hash": "qvTGHdzF6KLavt4PO0gs2a6pQ00=" }
        },
        "parentReference": { "id": "parent", "driveId": "d1", "path": parent_path }
    })
}

fn folder_json(id: &str, name: &str, parent_path: Option<&str>) -> Value {
    let mut value = json!({
        "id": id,
        "name": name,
        "size": 0,
        "createdDateTime": "2024-03-01T10:00:00Z",
        "lastModifiedDateTime": "2024-03-01T10:00:00Z",
        "folder": { "childCount": 0 }
    });
    if let Some(path) = parent_path {
        value["parentReference"] = json!({ "id": "parent", "path": path });
    }
    value
}

fn drive(server: &MockServer, chunk_size: usize) -> Arc<DriveFileSystem<GraphClient>> {
    let client = GraphClient::new(server.base_url(), TOKEN);
    Arc::new(DriveFileSystem::new(client, chunk_size))
}

fn root_entry(fs: &Arc<DriveFileSystem<GraphClient>>) -> RemoteEntry<GraphClient> {
    RemoteEntry::new(Arc::clone(fs), RemoteItem::folder("root", "root"))
}

#[tokio::test]
async fn test_get_item_by_path_sends_bearer_token() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET)
            .path("/me/drive/root:/Documents/report.pdf")
            .header("Authorization", BEARER);
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(file_json("f1", "report.pdf", 20, "/drive/root:/Documents"));
    });

    let fs = drive(&server, 1024);
    let ct = CancellationToken::new();
    let entry = fs
        .get_item("/Documents/report.pdf", &ct)
        .await
        .unwrap()
        .unwrap();

    lookup.assert();
    assert_eq!(entry.full_name(), "/drive/root:/Documents/report.pdf");
    assert_eq!(entry.length(), 20);
    assert!(!entry.is_directory());
    assert_eq!(
        entry.last_write_time_utc().to_rfc3339(),
        "2024-03-02T11:30:00+00:00"
    );
    assert_eq!(entry.get_hash("sha1").unwrap().len(), 20);
}

#[tokio::test]
async fn test_get_item_root() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(GET).path("/me/drive/root");
        let mut root = folder_json("root-id", "root", None);
        root["parentReference"] = json!({ "driveId": "d1", "driveType": "personal" });
        then.status(200).json_body(root);
    });

    let fs = drive(&server, 1024);
    let root = fs.root(&CancellationToken::new()).await.unwrap();

    lookup.assert();
    assert!(root.is_directory());
    assert!(root.item().parent_path().is_none());
    assert_eq!(root.full_name(), "/root");
}

#[tokio::test]
async fn test_get_item_missing_is_none() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/me/drive/root:/nope.txt");
        then.status(404).json_body(json!({
            "error": { "code": "itemNotFound", "message": "The resource could not be found." }
        }));
    });

    let fs = drive(&server, 1024);
    let result = fs.get_item("nope.txt", &CancellationToken::new()).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_get_items_follows_next_link() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET).path("/me/drive/items/root/children");
        then.status(200).json_body(json!({
            "value": [
                file_json("a", "a.txt", 1, "/drive/root:"),
                folder_json("b", "B", Some("/drive/root:"))
            ],
            "@odata.nextLink": server.url("/next/root/page2")
        }));
    });
    let second = server.mock(|when, then| {
        when.method(GET)
            .path("/next/root/page2")
            .header("Authorization", BEARER);
        then.status(200).json_body(json!({
            "value": [ file_json("c", "c.txt", 3, "/drive/root:") ]
        }));
    });

    let fs = drive(&server, 1024);
    let children = root_entry(&fs)
        .get_items(&CancellationToken::new())
        .await
        .unwrap();

    first.assert();
    second.assert();
    let names: Vec<&str> = children.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["a.txt", "B", "c.txt"]);
    assert!(children[1].is_directory());
    assert_eq!(children[2].full_name(), "/drive/root:/c.txt");
}

#[tokio::test]
async fn test_remote_error_body_is_decoded() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/me/drive/items/root/children");
        then.status(403).json_body(json!({
            "error": { "code": "accessDenied", "message": "Access denied" }
        }));
    });

    let fs = drive(&server, 1024);
    let result = root_entry(&fs).get_items(&CancellationToken::new()).await;

    match result {
        Err(DriveError::Remote {
            status,
            code,
            message,
        }) => {
            assert_eq!(status, 403);
            assert_eq!(code, "accessDenied");
            assert_eq!(message, "Access denied");
        }
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_plain_text_error_falls_back_to_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/me/drive/items/x1");
        then.status(502).body("bad gateway");
    });

    let client = GraphClient::new(server.base_url(), TOKEN);
    let result = client
        .delete(&RemoteItem::file("x1", "x", 1), &CancellationToken::new())
        .await;

    match result {
        Err(DriveError::Remote {
            status,
            code,
            message,
        }) => {
            assert_eq!(status, 502);
            assert_eq!(code, "Bad Gateway");
            assert_eq!(message, "bad gateway");
        }
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_open_read_streams_content() {
    let server = MockServer::start();
    let download = server.mock(|when, then| {
        when.method(GET)
            .path("/me/drive/items/f1/content")
            .header("Authorization", BEARER);
        then.status(200).body("file payload");
    });

    let fs = drive(&server, 1024);
    let entry = RemoteEntry::new(Arc::clone(&fs), RemoteItem::file("f1", "p.bin", 12));
    let mut stream = entry.open_read(&CancellationToken::new()).await.unwrap();
    let mut buf = String::new();
    stream.read_to_string(&mut buf).await.unwrap();

    download.assert();
    assert_eq!(buf, "file payload");
}

#[tokio::test]
async fn test_open_read_without_content_is_empty() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/me/drive/items/f2/content");
        then.status(404).json_body(json!({
            "error": {
                "code": "itemNotFound",
                "message": "The specified item does not have content."
            }
        }));
    });

    let fs = drive(&server, 1024);
    let entry = RemoteEntry::new(Arc::clone(&fs), RemoteItem::file("f2", "stub.one", 0));
    let mut stream = entry.open_read(&CancellationToken::new()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();

    assert!(buf.is_empty());
}

#[tokio::test]
async fn test_no_content_message_outside_download_stays_remote() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/me/drive/items/root/children");
        then.status(400).json_body(json!({
            "error": {
                "code": "invalidRequest",
                "message": "The specified item does not have content."
            }
        }));
    });

    let fs = drive(&server, 1024);
    let result = root_entry(&fs).get_items(&CancellationToken::new()).await;

    match result {
        Err(DriveError::Remote { status, code, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(code, "invalidRequest");
        }
        other => panic!("Expected Remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_file_uploads_through_session() {
    let server = MockServer::start();
    let session = server.mock(|when, then| {
        when.method(POST)
            .path("/me/drive/items/root:/letters.txt:/createUploadSession")
            .header("Authorization", BEARER);
        then.status(200).json_body(json!({
            "uploadUrl": server.url("/upload/session-1"),
            "expirationDateTime": "2030-01-01T00:00:00Z"
        }));
    });
    let first = server.mock(|when, then| {
        when.method(PUT)
            .path("/upload/session-1")
            .header("Content-Range", "bytes 0-3/10")
            .body("abcd");
        then.status(202).json_body(json!({ "nextExpectedRanges": ["4-"] }));
    });
    let second = server.mock(|when, then| {
        when.method(PUT)
            .path("/upload/session-1")
            .header("Content-Range", "bytes 4-7/10")
            .body("efgh");
        then.status(202).json_body(json!({ "nextExpectedRanges": ["8-"] }));
    });
    let last = server.mock(|when, then| {
        when.method(PUT)
            .path("/upload/session-1")
            .header("Content-Range", "bytes 8-9/10")
            .body("ij");
        then.status(201)
            .json_body(file_json("new-1", "letters.txt", 10, "/drive/root:"));
    });

    let fs = drive(&server, 4);
    let mut content = Cursor::new(b"abcdefghij".to_vec());
    let file = root_entry(&fs)
        .create_file("letters.txt", &mut content, 10, &CancellationToken::new())
        .await
        .unwrap();

    session.assert();
    first.assert();
    second.assert();
    last.assert();
    assert_eq!(file.name(), "letters.txt");
    assert_eq!(file.length(), 10);
    assert_eq!(file.full_name(), "/drive/root:/letters.txt");
}

#[tokio::test]
async fn test_chunk_gives_up_after_four_attempts() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/me/drive/items/root:/big.bin:/createUploadSession");
        then.status(200)
            .json_body(json!({ "uploadUrl": server.url("/upload/session-2") }));
    });
    let chunk = server.mock(|when, then| {
        when.method(PUT).path("/upload/session-2");
        then.status(500).json_body(json!({
            "error": { "code": "generalException", "message": "boom" }
        }));
    });

    let fs = drive(&server, 4);
    let mut content = Cursor::new(b"abcdefgh".to_vec());
    let result = root_entry(&fs)
        .create_file("big.bin", &mut content, 8, &CancellationToken::new())
        .await;

    chunk.assert_hits(4);
    match result {
        Err(DriveError::ChunkUpload {
            offset,
            attempts,
            source,
        }) => {
            assert_eq!(offset, 0);
            assert_eq!(attempts, 4);
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("Expected ChunkUpload error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_zero_length_file_uses_simple_upload() {
    let server = MockServer::start();
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path("/me/drive/items/root:/empty.txt:/content")
            .header("Authorization", BEARER);
        then.status(201)
            .json_body(file_json("e1", "empty.txt", 0, "/drive/root:"));
    });

    let fs = drive(&server, 4);
    let mut content = tokio::io::empty();
    let file = root_entry(&fs)
        .create_file("empty.txt", &mut content, 0, &CancellationToken::new())
        .await
        .unwrap();

    put.assert();
    assert_eq!(file.length(), 0);
}

#[tokio::test]
async fn test_create_directory_posts_folder_facet() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/me/drive/items/root/children")
            .json_body(json!({ "name": "Photos", "folder": {} }));
        then.status(201)
            .json_body(folder_json("p1", "Photos", Some("/drive/root:")));
    });

    let fs = drive(&server, 1024);
    let photos = root_entry(&fs)
        .create_directory("Photos", &CancellationToken::new())
        .await
        .unwrap();

    create.assert();
    assert!(photos.is_directory());
    assert_eq!(photos.full_name(), "/drive/root:/Photos");
}

#[tokio::test]
async fn test_cancel_slow_request() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/me/drive/items/root/children");
        then.status(200)
            .delay(Duration::from_secs(10))
            .json_body(json!({ "value": [] }));
    });

    let fs = drive(&server, 1024);
    let ct = CancellationToken::new();
    let canceller = ct.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let result = root_entry(&fs).get_items(&ct).await;

    assert!(matches!(result, Err(DriveError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
