//! 工作者池
//!
//! 每个工作者是一个隔离的异步任务，持有自己的翻译会话，只通过类型化消息通信。
//! 请求以递增 ID 关联，响应经由 `pending` 表找到等待方；终止池时所有未完成的请求
//! 都以 `WorkerTerminated` 结束，工作者收到 `Shutdown` 后销毁自己的会话再退出。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::try_join_all;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use super::{Availability, TranslatorCapability, TranslatorSession};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 发往工作者的消息
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerRequest {
    /// 探测工作者内是否存在翻译能力
    InitCheck,
    Init { source: String, target: String },
    Translate { id: u64, text: String },
    /// 中止进行中的翻译，销毁会话并退出
    Shutdown,
}

/// 工作者返回的消息
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Ready,
    Error { message: String },
    Inited,
    InitError { message: String },
    Translated { id: u64, text: String },
    TranslateError { id: u64, message: String },
}

/// 一个运行中的工作者
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    responses: mpsc::UnboundedReceiver<WorkerResponse>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn post(&self, request: WorkerRequest) -> TranslationResult<()> {
        self.requests
            .send(request)
            .map_err(|_| TranslationError::WorkerTerminated)
    }

    pub async fn recv(&mut self) -> Option<WorkerResponse> {
        self.responses.recv().await
    }

    pub fn terminate(&self) {
        shutdown(&self.requests, &self.task);
    }
}

/// 请求工作者自行退出，消息无法送达时直接中止任务
fn shutdown(requests: &mpsc::UnboundedSender<WorkerRequest>, task: &JoinHandle<()>) {
    if requests.send(WorkerRequest::Shutdown).is_err() {
        task.abort();
    }
}

/// 创建隔离工作者的能力，执行环境可能禁止创建
pub trait WorkerSpawner: Send + Sync {
    fn spawn(&self) -> TranslationResult<WorkerHandle>;
}

/// 以 tokio 任务承载工作者
pub struct TokioWorkerSpawner {
    capability: Option<Arc<dyn TranslatorCapability>>,
    allowed: bool,
}

impl TokioWorkerSpawner {
    pub fn new(capability: Arc<dyn TranslatorCapability>) -> Self {
        Self {
            capability: Some(capability),
            allowed: true,
        }
    }

    /// 执行环境禁止创建工作者
    pub fn blocked() -> Self {
        Self {
            capability: None,
            allowed: false,
        }
    }

    /// 可以创建工作者，但工作者内没有翻译能力
    pub fn without_translator() -> Self {
        Self {
            capability: None,
            allowed: true,
        }
    }
}

impl WorkerSpawner for TokioWorkerSpawner {
    fn spawn(&self) -> TranslationResult<WorkerHandle> {
        if !self.allowed {
            return Err(TranslationError::WorkerUnavailable(
                "执行环境禁止创建工作者".to_string(),
            ));
        }
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(worker_main(self.capability.clone(), request_rx, response_tx));
        Ok(WorkerHandle {
            requests: request_tx,
            responses: response_rx,
            task,
        })
    }
}

async fn worker_main(
    capability: Option<Arc<dyn TranslatorCapability>>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
) {
    let mut session: Option<Arc<dyn TranslatorSession>> = None;
    // 随工作者一起被丢弃，未完成的翻译随之中止
    let mut running = JoinSet::new();

    loop {
        let request = tokio::select! {
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
            Some(_) = running.join_next(), if !running.is_empty() => continue,
        };

        match request {
            WorkerRequest::Shutdown => break,
            WorkerRequest::InitCheck => {
                let response = match capability {
                    Some(_) => WorkerResponse::Ready,
                    None => WorkerResponse::Error {
                        message: "工作者内没有翻译能力".to_string(),
                    },
                };
                let _ = responses.send(response);
            }
            WorkerRequest::Init { source, target } => {
                let response = match init_session(capability.as_deref(), &source, &target).await {
                    Ok(created) => {
                        session = Some(created);
                        WorkerResponse::Inited
                    }
                    Err(e) => WorkerResponse::InitError {
                        message: e.to_string(),
                    },
                };
                let _ = responses.send(response);
            }
            WorkerRequest::Translate { id, text } => {
                let Some(active) = session.clone() else {
                    let _ = responses.send(WorkerResponse::TranslateError {
                        id,
                        message: "no-translator".to_string(),
                    });
                    continue;
                };
                let responses = responses.clone();
                running.spawn(async move {
                    let response = match collect_stream(active.as_ref(), &text).await {
                        Ok(text) => WorkerResponse::Translated { id, text },
                        Err(e) => WorkerResponse::TranslateError {
                            id,
                            message: e.to_string(),
                        },
                    };
                    let _ = responses.send(response);
                });
            }
        }
    }

    running.abort_all();
    if let Some(session) = session {
        session.destroy();
    }
}

async fn init_session(
    capability: Option<&dyn TranslatorCapability>,
    source: &str,
    target: &str,
) -> TranslationResult<Arc<dyn TranslatorSession>> {
    let capability = capability.ok_or(TranslationError::CapabilityAbsent)?;
    if capability.availability(source, target).await? == Availability::Unavailable {
        return Err(TranslationError::PairUnsupported {
            source_lang: source.to_string(),
            target_lang: target.to_string(),
        });
    }
    capability.create(source, target, None).await
}

async fn collect_stream(session: &dyn TranslatorSession, text: &str) -> TranslationResult<String> {
    let mut stream = session.translate_streaming(text);
    let mut out = String::new();
    while let Some(chunk) = stream.next().await {
        out.push_str(&chunk?);
    }
    Ok(out)
}

/// 探测能否使用工作者：创建一个工作者并在限定时间内收到 `Ready`
pub async fn can_use_workers(spawner: &dyn WorkerSpawner) -> bool {
    let mut worker = match spawner.spawn() {
        Ok(worker) => worker,
        Err(e) => {
            tracing::info!("无法创建工作者，回退到单线程模式: {}", e);
            return false;
        }
    };
    if worker.post(WorkerRequest::InitCheck).is_err() {
        worker.terminate();
        return false;
    }

    let ready = tokio::time::timeout(constants::WORKER_PROBE_TIMEOUT, worker.recv()).await;
    worker.terminate();
    matches!(ready, Ok(Some(WorkerResponse::Ready)))
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<TranslationResult<String>>>>>;

/// 固定大小的工作者池，按轮询分发翻译请求
pub struct WorkerPool {
    workers: Vec<WorkerHandleSender>,
    pending: PendingMap,
    next_id: AtomicU64,
    cursor: AtomicUsize,
    terminated: AtomicBool,
}

struct WorkerHandleSender {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    task: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl WorkerPool {
    /// 创建 `size` 个工作者并等待全部完成初始化
    pub async fn create(
        spawner: &dyn WorkerSpawner,
        size: usize,
        source: &str,
        target: &str,
        init_timeout: Duration,
    ) -> TranslationResult<Self> {
        let mut handles = Vec::with_capacity(size.max(1));
        for _ in 0..size.max(1) {
            match spawner.spawn() {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    handles.iter().for_each(WorkerHandle::terminate);
                    return Err(e);
                }
            }
        }

        let init = try_join_all(
            handles
                .iter_mut()
                .map(|handle| init_worker(handle, source, target, init_timeout)),
        )
        .await;
        if let Err(e) = init {
            handles.iter().for_each(WorkerHandle::terminate);
            return Err(e);
        }

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let workers = handles
            .into_iter()
            .map(|handle| {
                let WorkerHandle {
                    requests,
                    responses,
                    task,
                } = handle;
                let dispatcher = tokio::spawn(dispatch_loop(responses, pending.clone()));
                WorkerHandleSender {
                    requests,
                    task,
                    dispatcher,
                }
            })
            .collect();

        tracing::debug!("工作者池已就绪: {} 个工作者", size.max(1));
        Ok(Self {
            workers,
            pending,
            next_id: AtomicU64::new(1),
            cursor: AtomicUsize::new(0),
            terminated: AtomicBool::new(false),
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn pick(&self) -> &WorkerHandleSender {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.workers.len();
        &self.workers[index]
    }

    pub async fn translate(&self, text: &str) -> TranslationResult<String> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(TranslationError::WorkerTerminated);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }

        let request = WorkerRequest::Translate {
            id,
            text: text.to_string(),
        };
        if self.pick().requests.send(request).is_err() {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(TranslationError::WorkerTerminated);
        }

        let _cleanup = PendingCleanup {
            id,
            pending: &self.pending,
        };
        rx.await.unwrap_or(Err(TranslationError::WorkerTerminated))
    }

    /// 终止全部工作者，未完成的请求以 `WorkerTerminated` 结束
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        for worker in self.workers.iter() {
            shutdown(&worker.requests, &worker.task);
            worker.dispatcher.abort();
        }
        if let Ok(mut pending) = self.pending.lock() {
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(TranslationError::WorkerTerminated));
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// 等待方被丢弃时移除对应的请求
struct PendingCleanup<'a> {
    id: u64,
    pending: &'a PendingMap,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

async fn init_worker(
    handle: &mut WorkerHandle,
    source: &str,
    target: &str,
    init_timeout: Duration,
) -> TranslationResult<()> {
    handle.post(WorkerRequest::Init {
        source: source.to_string(),
        target: target.to_string(),
    })?;

    let wait = async {
        while let Some(response) = handle.recv().await {
            match response {
                WorkerResponse::Inited => return Ok(()),
                WorkerResponse::InitError { message } => {
                    return Err(TranslationError::WorkerUnavailable(message))
                }
                _ => continue,
            }
        }
        Err(TranslationError::WorkerTerminated)
    };

    tokio::time::timeout(init_timeout, wait)
        .await
        .map_err(|_| TranslationError::WorkerUnavailable("init timeout".to_string()))?
}

async fn dispatch_loop(mut responses: mpsc::UnboundedReceiver<WorkerResponse>, pending: PendingMap) {
    while let Some(response) = responses.recv().await {
        let (id, result) = match response {
            WorkerResponse::Translated { id, text } => (id, Ok(text)),
            WorkerResponse::TranslateError { id, message } => {
                (id, Err(TranslationError::Backend(message)))
            }
            other => {
                tracing::trace!("忽略工作者消息: {:?}", other);
                continue;
            }
        };
        let entry = pending.lock().ok().and_then(|mut p| p.remove(&id));
        if let Some(tx) = entry {
            let _ = tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::backend::{ScriptedCapability, TextBehavior};

    fn spawner(capability: ScriptedCapability) -> TokioWorkerSpawner {
        TokioWorkerSpawner::new(Arc::new(capability))
    }

    #[tokio::test]
    async fn test_probe() {
        assert!(can_use_workers(&spawner(ScriptedCapability::new())).await);
        assert!(!can_use_workers(&TokioWorkerSpawner::blocked()).await);
        assert!(!can_use_workers(&TokioWorkerSpawner::without_translator()).await);
    }

    #[tokio::test]
    async fn test_round_robin_translation() {
        let capability = ScriptedCapability::new();
        let pool = WorkerPool::create(
            &spawner(capability.clone()),
            3,
            "en",
            "ja",
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(capability.sessions_created(), 3);

        let results = futures::future::join_all(
            ["one", "two", "three", "four"].iter().map(|text| pool.translate(text)),
        )
        .await;
        let results: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(results, vec!["[ja] one", "[ja] two", "[ja] three", "[ja] four"]);
        assert_eq!(pool.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_pair_fails_creation() {
        let capability = ScriptedCapability::new().with_unsupported_pair("en", "xx");
        let result = WorkerPool::create(&spawner(capability), 2, "en", "xx", Duration::from_secs(10)).await;
        assert!(matches!(result, Err(TranslationError::WorkerUnavailable(_))));
    }

    #[tokio::test]
    async fn test_terminate_rejects_in_flight() {
        let capability = ScriptedCapability::new().with_behavior("stuck", TextBehavior::Hang);
        let pool = WorkerPool::create(&spawner(capability), 1, "en", "ja", Duration::from_secs(10))
            .await
            .unwrap();

        let stuck = pool.translate("stuck");
        let terminate = async {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            pool.terminate();
        };
        let (result, _) = tokio::join!(stuck, terminate);
        assert_eq!(result, Err(TranslationError::WorkerTerminated));
        assert_eq!(pool.translate("again").await, Err(TranslationError::WorkerTerminated));
    }

    #[tokio::test]
    async fn test_terminate_destroys_worker_sessions() {
        let capability = ScriptedCapability::new();
        let pool = WorkerPool::create(
            &spawner(capability.clone()),
            3,
            "en",
            "ja",
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(capability.sessions_created(), 3);

        pool.terminate();
        // 工作者在自己的任务里处理退出消息
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(capability.sessions_destroyed(), 3);
    }

    #[tokio::test]
    async fn test_worker_failure_is_reported_per_request() {
        let capability = ScriptedCapability::new().with_behavior("bad", TextBehavior::Fail);
        let pool = WorkerPool::create(&spawner(capability), 2, "en", "ja", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(matches!(pool.translate("bad").await, Err(TranslationError::Backend(_))));
        assert_eq!(pool.translate("good").await.unwrap(), "[ja] good");
    }
}
