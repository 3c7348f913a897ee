use crate::config::Config;
use crate::error::{DualSubsError, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use log::{debug, trace, warn};
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// Builtin Google Translate
use translators::{GoogleTranslator, Translator as GoogleTranslatorTrait};

const MAX_TRANSLATE_RETRIES: usize = 2;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// Maps `(text, target language)` to translated text.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub to_lang: String,
    pub timeout_ms: u64,
    pub concurrency: usize,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            to_lang: "en".to_string(),
            timeout_ms: 30_000,
            concurrency: 4,
        }
    }
}

impl TranslatorConfig {
    pub fn new(to_lang: String) -> Self {
        Self {
            to_lang,
            ..Default::default()
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.translate_language.clone())
            .with_timeout_ms(config.translate_timeout_ms)
            .with_concurrency(config.translate_concurrency)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

pub struct GoogleTranslationBackend {
    translator: GoogleTranslator,
}

impl GoogleTranslationBackend {
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            translator: build_google_translator(config.timeout_ms),
        }
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslationBackend {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        trace!(
            "Translating text (-> {}): {}",
            target_language,
            text.chars().take(50).collect::<String>()
        );

        let to_lang = normalize_lang_code(target_language);
        self.translator
            .translate_async(text, "", &to_lang)
            .await
            .map_err(|e| DualSubsError::TranslationFailed(format!("Builtin translation failed: {}", e)))
    }
}

/// A text to translate, e.g. a cue's cleaned text or a hovered word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTask {
    pub id: u64,
    pub text: String,
    pub target_language: String,
}

#[derive(Debug)]
pub struct TranslationResult {
    pub id: u64,
    pub original: String,
    pub translated: Result<String>,
}

#[derive(Debug, Clone)]
struct QueuedTask {
    generation: u64,
    task: TranslationTask,
}

/// Background translation queue.
///
/// Tasks submitted before the last [`TranslationQueue::cancel_inflight`] are
/// dropped without producing results.
pub struct TranslationQueue {
    task_sender: mpsc::UnboundedSender<QueuedTask>,
    result_receiver: mpsc::UnboundedReceiver<TranslationResult>,
    generation: Arc<AtomicU64>,
    worker_handle: Option<JoinHandle<()>>,
}

impl TranslationQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(backend: Arc<dyn TranslationBackend>, config: &TranslatorConfig) -> Self {
        let (task_sender, task_receiver) = mpsc::unbounded_channel();
        let (result_sender, result_receiver) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));

        let worker_handle = tokio::spawn(Self::worker(
            task_receiver,
            result_sender,
            backend,
            config.concurrency.max(1),
            Arc::clone(&generation),
        ));

        Self {
            task_sender,
            result_receiver,
            generation,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn submit(&self, task: TranslationTask) {
        let generation = self.generation.load(Ordering::Relaxed);
        let _ = self.task_sender.send(QueuedTask { generation, task });
    }

    /// Completed translations so far (non-blocking).
    pub fn try_recv_results(&mut self) -> Vec<TranslationResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_receiver.try_recv() {
            results.push(result);
        }
        results
    }

    pub async fn recv(&mut self) -> Option<TranslationResult> {
        self.result_receiver.recv().await
    }

    /// Drop every queued and running task without stopping the worker.
    pub fn cancel_inflight(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shutdown(&mut self) {
        debug!("Shutting down translation queue");
        if let Some(handle) = self.worker_handle.take() {
            handle.abort();
        }
    }

    async fn worker(
        mut task_receiver: mpsc::UnboundedReceiver<QueuedTask>,
        result_sender: mpsc::UnboundedSender<TranslationResult>,
        backend: Arc<dyn TranslationBackend>,
        concurrency: usize,
        generation: Arc<AtomicU64>,
    ) {
        while let Some(first_task) = task_receiver.recv().await {
            let current_generation = generation.load(Ordering::Relaxed);

            // Collect everything already queued into one batch.
            let mut tasks = Vec::new();
            if first_task.generation == current_generation {
                tasks.push(first_task.task);
            }
            while let Ok(task) = task_receiver.try_recv() {
                if task.generation == current_generation {
                    tasks.push(task.task);
                }
            }

            if tasks.is_empty() {
                continue;
            }
            debug!("Processing {} translation tasks", tasks.len());

            let mut results = futures::stream::iter(tasks)
                .map(|task| {
                    Self::translate_with_retry(
                        task,
                        Arc::clone(&backend),
                        Arc::clone(&generation),
                        current_generation,
                    )
                })
                .buffer_unordered(concurrency);

            while let Some(result) = results.next().await {
                if generation.load(Ordering::Relaxed) != current_generation {
                    break;
                }
                if let Some(result) = result {
                    if result_sender.send(result).is_err() {
                        debug!("Translation results receiver dropped, exiting");
                        return;
                    }
                }
            }
        }
        debug!("Translation worker exiting (queue closed)");
    }

    async fn translate_with_retry(
        task: TranslationTask,
        backend: Arc<dyn TranslationBackend>,
        generation: Arc<AtomicU64>,
        task_generation: u64,
    ) -> Option<TranslationResult> {
        let mut attempt = 0usize;
        let mut delay_ms = RETRY_BASE_DELAY_MS;

        loop {
            if generation.load(Ordering::Relaxed) != task_generation {
                return None;
            }

            let err = match backend.translate(&task.text, &task.target_language).await {
                Ok(translated) if !translated.trim().is_empty() || task.text.trim().is_empty() => {
                    return Some(TranslationResult {
                        id: task.id,
                        original: task.text,
                        translated: Ok(translated),
                    });
                }
                Ok(_) => DualSubsError::TranslationFailed("empty translation".to_string()),
                Err(err) => err,
            };

            attempt += 1;
            warn!(
                "Translation of task {} failed (attempt {}): {}",
                task.id, attempt, err
            );
            if attempt > MAX_TRANSLATE_RETRIES {
                return Some(TranslationResult {
                    id: task.id,
                    original: task.text,
                    translated: Err(err),
                });
            }

            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            delay_ms = (delay_ms * 2).min(2_000);
        }
    }
}

impl Drop for TranslationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_google_translator(timeout_ms: u64) -> GoogleTranslator {
    let mut translator = GoogleTranslator::default();
    let timeout_secs = timeout_ms.div_ceil(1000).max(1) as usize;
    translator.timeout = timeout_secs;
    translator
}

fn normalize_lang_code(code: &str) -> String {
    match code {
        "zh" | "zh-Hans" => "zh-CN".to_string(),
        "zh-Hant" => "zh-TW".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Uppercases text; "flaky" fails on its first call, "broken" always fails.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl TranslationBackend for FakeBackend {
        async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
            let calls = {
                let mut calls = self.calls.lock();
                let count = calls.entry(text.to_string()).or_default();
                *count += 1;
                *count
            };
            match text {
                "broken" => Err(DualSubsError::TranslationFailed("backend down".to_string())),
                "flaky" if calls == 1 => Ok(String::new()),
                _ => Ok(format!("{}:{}", target_language, text.to_uppercase())),
            }
        }
    }

    fn task(id: u64, text: &str) -> TranslationTask {
        TranslationTask {
            id,
            text: text.to_string(),
            target_language: "de".to_string(),
        }
    }

    #[test]
    fn test_translator_config() {
        let config = TranslatorConfig::new("zh".to_string())
            .with_timeout_ms(5000)
            .with_concurrency(0);

        assert_eq!(config.to_lang, "zh");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_google_backend_uses_configured_timeout() {
        let backend = GoogleTranslationBackend::new(&TranslatorConfig::default().with_timeout_ms(4_500));
        assert_eq!(backend.translator.timeout, 5);

        let backend = GoogleTranslationBackend::new(&TranslatorConfig::default().with_timeout_ms(0));
        assert_eq!(backend.translator.timeout, 1);
    }

    #[tokio::test]
    async fn test_google_backend_skips_blank_text() {
        let backend = GoogleTranslationBackend::new(&TranslatorConfig::default());
        assert_eq!(backend.translate("  ", "de").await.unwrap(), "");
    }

    #[test]
    fn test_normalize_lang_code() {
        assert_eq!(normalize_lang_code("zh"), "zh-CN");
        assert_eq!(normalize_lang_code("zh-Hant"), "zh-TW");
        assert_eq!(normalize_lang_code("de"), "de");
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_translates_and_retries() {
        let backend = Arc::new(FakeBackend::default());
        let mut queue = TranslationQueue::spawn(backend.clone(), &TranslatorConfig::default());

        queue.submit(task(1, "hello"));
        queue.submit(task(2, "flaky"));

        let mut results = Vec::new();
        for _ in 0..2 {
            results.push(queue.recv().await.unwrap());
        }
        results.sort_by_key(|r| r.id);

        assert_eq!(results[0].translated.as_deref().unwrap(), "de:HELLO");
        assert_eq!(results[1].translated.as_deref().unwrap(), "de:FLAKY");
        assert_eq!(backend.calls.lock()["flaky"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_surfaces_failure() {
        let backend = Arc::new(FakeBackend::default());
        let mut queue = TranslationQueue::spawn(backend.clone(), &TranslatorConfig::default());

        queue.submit(task(7, "broken"));
        let result = queue.recv().await.unwrap();
        assert_eq!(result.id, 7);
        assert!(matches!(result.translated, Err(DualSubsError::TranslationFailed(_))));
        assert_eq!(backend.calls.lock()["broken"], MAX_TRANSLATE_RETRIES + 1);
    }

    #[tokio::test]
    async fn test_cancel_drops_queued_tasks() {
        let backend = Arc::new(FakeBackend::default());
        let mut queue = TranslationQueue::spawn(backend.clone(), &TranslatorConfig::default());

        queue.submit(task(1, "stale"));
        queue.cancel_inflight();
        queue.submit(task(2, "fresh"));

        let result = queue.recv().await.unwrap();
        assert_eq!(result.id, 2);
        assert!(queue.try_recv_results().is_empty());
        assert!(!backend.calls.lock().contains_key("stale"));
    }
}
