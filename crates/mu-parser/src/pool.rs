//! Thread pool for CPU-bound parsing
//!
//! Tree-sitter parsers are not Send + Sync, so parsing runs on
//! dedicated worker threads behind std mpsc channels. Each worker owns
//! one `Parser` and retargets it per request; async callers go through
//! `spawn_blocking`.

use std::sync::{Arc, Mutex, mpsc};

use mu_core::Lang;
use tree_sitter::Parser;

use crate::{ParsedFile, registry};

/// A parsing request sent to the pool. The job owns its source bytes.
#[derive(Debug)]
pub struct ParseRequest {
    pub source: Vec<u8>,
    pub display_path: String,
    pub language: Lang,
}

struct WorkerRequest {
    request: ParseRequest,
    reply: mpsc::Sender<ParsedFile>,
}

/// Channel-fronted parser pool.
pub struct ParserPool {
    sender: mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<WorkerRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        for worker_id in 0..num_workers {
            let receiver = Arc::clone(&receiver);
            std::thread::spawn(move || Self::worker_loop(worker_id, receiver));
        }

        Self { sender }
    }

    fn worker_loop(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkerRequest>>>) {
        tracing::debug!("parser worker {worker_id} started");
        let mut parser = Parser::new();

        loop {
            let next = {
                let guard = match receiver.lock() {
                    Ok(guard) => guard,
                    Err(_) => break,
                };
                guard.recv()
            };
            let WorkerRequest { request, reply } = match next {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!("parser worker {worker_id} shutting down");
                    break;
                }
            };

            let parsed = Self::parse_with(&mut parser, &request);
            if reply.send(parsed).is_err() {
                tracing::warn!("parse reply dropped, caller went away");
            }
        }
    }

    fn parse_with(parser: &mut Parser, request: &ParseRequest) -> ParsedFile {
        let lang = request.language;
        let text = String::from_utf8_lossy(&request.source).into_owned();

        if let Err(e) = parser.set_language(&registry::grammar_for(lang)) {
            return ParsedFile {
                path: request.display_path.clone(),
                language: lang,
                module: None,
                error: Some(format!("failed to load {lang} grammar: {e}")),
                has_errors: false,
            };
        }

        match parser.parse(&text, None) {
            Some(tree) => {
                let root = tree.root_node();
                let mut module =
                    registry::extractor_for(lang).extract(root, text.as_bytes(), &request.display_path);
                module.language = lang;
                ParsedFile {
                    path: request.display_path.clone(),
                    language: lang,
                    module: Some(module),
                    error: None,
                    has_errors: root.has_error(),
                }
            }
            None => ParsedFile {
                path: request.display_path.clone(),
                language: lang,
                module: None,
                error: Some("parser returned no tree".to_string()),
                has_errors: true,
            },
        }
    }

    /// Parse synchronously, blocking the calling thread.
    pub fn parse_blocking(&self, request: ParseRequest) -> Result<ParsedFile, mu_core::MuError> {
        let (reply, receive) = mpsc::channel();
        self.sender
            .send(WorkerRequest { request, reply })
            .map_err(|_| mu_core::MuError::Worker("parser pool is shut down".to_string()))?;
        receive
            .recv()
            .map_err(|_| mu_core::MuError::Worker("parser worker died".to_string()))
    }

    /// Parse from async context without blocking the runtime.
    pub async fn parse(&self, request: ParseRequest) -> Result<ParsedFile, mu_core::MuError> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || {
            let (reply, receive) = mpsc::channel();
            sender
                .send(WorkerRequest { request, reply })
                .map_err(|_| mu_core::MuError::Worker("parser pool is shut down".to_string()))?;
            receive
                .recv()
                .map_err(|_| mu_core::MuError::Worker("parser worker died".to_string()))
        })
        .await
        .map_err(|e| mu_core::MuError::Worker(format!("join error: {e}")))?
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Pool sized to the machine, at least two workers.
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);
    ParserPool::new(num_workers)
}
