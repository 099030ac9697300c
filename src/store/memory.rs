use crate::domain::model::{ChunkRange, Hashes, RemoteItem};
use crate::domain::ports::{ByteStream, RemoteStore, UploadRequest};
use crate::store::chunked::upload_in_chunks;
use crate::utils::cancel::cancellable;
use crate::utils::error::{DriveError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub const ROOT_ID: &str = "root";
const ROOT_PATH: &str = "/drive/root:";

#[derive(Debug)]
struct Node {
    item: RemoteItem,
    content: Option<Vec<u8>>,
    children: Vec<String>,
}

#[derive(Debug)]
struct State {
    nodes: HashMap<String, Node>,
    next_id: u64,
}

/// In-process drive with the same observable behavior as the HTTP client.
///
/// Items created through [`MemoryStore::insert_placeholder`] have no content;
/// downloading them yields `DriveError::ContentNotAvailable`.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    pending_chunk_failures: AtomicU32,
    chunk_attempts: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let root = Node {
            item: RemoteItem::folder(ROOT_ID, "root"),
            content: None,
            children: Vec::new(),
        };

        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID.to_string(), root);

        Self {
            state: Mutex::new(State { nodes, next_id: 1 }),
            pending_chunk_failures: AtomicU32::new(0),
            chunk_attempts: AtomicU32::new(0),
        }
    }

    pub fn root_item(&self) -> Result<RemoteItem> {
        let state = self.lock()?;
        Ok(state.node(ROOT_ID)?.item.clone())
    }

    pub fn insert_folder(&self, parent_id: &str, name: &str) -> Result<RemoteItem> {
        let mut state = self.lock()?;
        state.insert(parent_id, name, None, true)
    }

    pub fn insert_file(&self, parent_id: &str, name: &str, content: &[u8]) -> Result<RemoteItem> {
        let mut state = self.lock()?;
        state.insert(parent_id, name, Some(content.to_vec()), false)
    }

    /// A file-shaped item with no content, like a link or a cloud-only stub.
    pub fn insert_placeholder(&self, parent_id: &str, name: &str) -> Result<RemoteItem> {
        let mut state = self.lock()?;
        state.insert(parent_id, name, None, false)
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state.nodes.get(id)?.content.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.nodes.contains_key(id))
            .unwrap_or(false)
    }

    /// Make the next `count` chunk transfers fail with a transient 503.
    pub fn inject_chunk_failures(&self, count: u32) {
        self.pending_chunk_failures.store(count, Ordering::SeqCst);
    }

    /// Chunk transfers attempted so far, failed ones included.
    pub fn chunk_attempts(&self) -> u32 {
        self.chunk_attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| DriveError::UnexpectedResponse {
            message: "memory store state is poisoned".to_string(),
        })
    }

    fn take_injected_failure(&self) -> bool {
        self.pending_chunk_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn receive_chunk(
        &self,
        buffer: &mut Vec<u8>,
        range: ChunkRange,
        data: &Bytes,
    ) -> Result<()> {
        self.chunk_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_injected_failure() {
            return Err(DriveError::Remote {
                status: 503,
                code: "serviceNotAvailable".to_string(),
                message: format!("injected failure for {}", range.content_range()),
            });
        }

        let start = range.offset as usize;
        let end = start + data.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Store one chunk and commit the file once the last one arrives.
    fn accept_chunk(
        &self,
        buffer: &Mutex<Vec<u8>>,
        parent_id: &str,
        name: &str,
        range: ChunkRange,
        data: &Bytes,
    ) -> Result<Option<RemoteItem>> {
        let mut received = buffer.lock().map_err(|_| DriveError::UnexpectedResponse {
            message: "upload buffer is poisoned".to_string(),
        })?;
        self.receive_chunk(&mut received, range, data)?;

        if range.is_last() {
            let content = std::mem::take(&mut *received);
            self.commit_upload(parent_id, name, content).map(Some)
        } else {
            Ok(None)
        }
    }

    fn commit_upload(&self, parent_id: &str, name: &str, content: Vec<u8>) -> Result<RemoteItem> {
        let mut state = self.lock()?;
        state.put_file(parent_id, name, content)
    }
}

impl State {
    fn node(&self, id: &str) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| not_found(id))
    }

    fn folder(&self, id: &str) -> Result<&Node> {
        let node = self.node(id)?;
        if !node.item.is_folder() {
            return Err(DriveError::Remote {
                status: 400,
                code: "invalidRequest".to_string(),
                message: format!("Item '{}' is not a folder", node.item.name),
            });
        }
        Ok(node)
    }

    fn child_named(&self, parent_id: &str, name: &str) -> Option<&Node> {
        self.nodes.get(parent_id)?.children.iter().find_map(|id| {
            self.nodes
                .get(id)
                .filter(|node| node.item.name.eq_ignore_ascii_case(name))
        })
    }

    fn path_for_children_of(&self, parent_id: &str) -> Result<String> {
        let parent = self.node(parent_id)?;
        Ok(match parent.item.parent_path() {
            None => ROOT_PATH.to_string(),
            Some(path) => format!("{}/{}", path, parent.item.name),
        })
    }

    fn insert(
        &mut self,
        parent_id: &str,
        name: &str,
        content: Option<Vec<u8>>,
        is_folder: bool,
    ) -> Result<RemoteItem> {
        self.folder(parent_id)?;
        if self.child_named(parent_id, name).is_some() {
            return Err(DriveError::Remote {
                status: 409,
                code: "nameAlreadyExists".to_string(),
                message: format!("An item named '{}' already exists", name),
            });
        }

        let id = format!("item-{}", self.next_id);
        self.next_id += 1;

        let parent_path = self.path_for_children_of(parent_id)?;
        let item = match (is_folder, &content) {
            (true, _) => RemoteItem::folder(&id, name),
            (false, Some(bytes)) => {
                RemoteItem::file(&id, name, bytes.len() as u64).with_hashes(hashes_of(bytes))
            }
            (false, None) => RemoteItem::file(&id, name, 0),
        };
        let item = item.with_parent(parent_id, parent_path);

        self.nodes.insert(
            id.clone(),
            Node {
                item: item.clone(),
                content,
                children: Vec::new(),
            },
        );
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            parent.children.push(id);
        }
        Ok(item)
    }

    /// Upload semantics: an existing file with the same name is replaced.
    fn put_file(&mut self, parent_id: &str, name: &str, content: Vec<u8>) -> Result<RemoteItem> {
        let existing = self
            .child_named(parent_id, name)
            .map(|node| (node.item.id.clone(), node.item.is_folder()));

        match existing {
            Some((_, true)) => Err(DriveError::Remote {
                status: 409,
                code: "nameAlreadyExists".to_string(),
                message: format!("A folder named '{}' already exists", name),
            }),
            Some((id, false)) => {
                let node = self.nodes.get_mut(&id).ok_or_else(|| not_found(&id))?;
                node.item.size = content.len() as u64;
                node.item.last_modified_date_time = Utc::now();
                node.item = node.item.clone().with_hashes(hashes_of(&content));
                node.content = Some(content);
                Ok(node.item.clone())
            }
            None => self.insert(parent_id, name, Some(content), false),
        }
    }

    fn remove(&mut self, id: &str) -> Result<()> {
        let node = self.nodes.remove(id).ok_or_else(|| not_found(id))?;
        for child in node.children {
            self.remove(&child)?;
        }
        if let Some(parent_id) = node.item.parent_reference.and_then(|p| p.id) {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| c != id);
            }
        }
        Ok(())
    }
}

fn not_found(id: &str) -> DriveError {
    DriveError::Remote {
        status: 404,
        code: "itemNotFound".to_string(),
        message: format!("Item '{}' does not exist", id),
    }
}

fn hashes_of(content: &[u8]) -> Hashes {
    Hashes {
        sha1_hash: Some(STANDARD.encode(Sha1::digest(content))),
        crc32_hash: Some(STANDARD.encode(crc32fast::hash(content).to_be_bytes())),
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_item(&self, path: &str, ct: &CancellationToken) -> Result<Option<RemoteItem>> {
        cancellable(ct, async {
            let state = self.lock()?;
            let mut current = state.node(ROOT_ID)?;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                match state.child_named(&current.item.id, segment) {
                    Some(child) => current = child,
                    None => return Ok(None),
                }
            }
            Ok(Some(current.item.clone()))
        })
        .await
    }

    async fn list_children(
        &self,
        item: &RemoteItem,
        ct: &CancellationToken,
    ) -> Result<Vec<RemoteItem>> {
        cancellable(ct, async {
            let state = self.lock()?;
            let node = state.node(&item.id)?;
            Ok(node
                .children
                .iter()
                .filter_map(|id| state.nodes.get(id))
                .map(|child| child.item.clone())
                .collect())
        })
        .await
    }

    async fn delete(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<()> {
        cancellable(ct, async {
            if item.id == ROOT_ID {
                return Err(DriveError::Remote {
                    status: 403,
                    code: "accessDenied".to_string(),
                    message: "The root folder cannot be deleted".to_string(),
                });
            }
            self.lock()?.remove(&item.id)
        })
        .await
    }

    async fn download(&self, item: &RemoteItem, ct: &CancellationToken) -> Result<ByteStream> {
        cancellable(ct, async {
            let state = self.lock()?;
            let node = state.node(&item.id)?;
            if node.item.is_folder() {
                return Err(DriveError::Remote {
                    status: 400,
                    code: "invalidRequest".to_string(),
                    message: "Folders cannot be downloaded".to_string(),
                });
            }
            match &node.content {
                Some(content) => Ok(Box::pin(Cursor::new(content.clone())) as ByteStream),
                None => Err(DriveError::ContentNotAvailable),
            }
        })
        .await
    }

    async fn upload_file(
        &self,
        parent: &RemoteItem,
        request: UploadRequest<'_>,
        ct: &CancellationToken,
    ) -> Result<RemoteItem> {
        {
            let state = self.lock()?;
            state.folder(&parent.id)?;
        }

        let name = request.name.to_string();
        if request.length == 0 {
            return cancellable(ct, async { self.commit_upload(&parent.id, &name, Vec::new()) })
                .await;
        }

        // grows chunk by chunk; the declared length is not trusted up front
        let buffer = Mutex::new(Vec::new());
        let buffer = &buffer;
        let parent_id = parent.id.as_str();
        let name = name.as_str();
        upload_in_chunks(request, ct, move |range, data| async move {
            self.accept_chunk(buffer, parent_id, name, range, &data)
        })
        .await
    }

    async fn create_folder(
        &self,
        parent: &RemoteItem,
        name: &str,
        ct: &CancellationToken,
    ) -> Result<RemoteItem> {
        cancellable(ct, async { self.lock()?.insert(&parent.id, name, None, true) }).await
    }
}
