//! Test doubles for the git, prompt, and peer seams.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::Document;
use crate::peer::PeerFetcher;
use crate::prompt::Prompt;
use crate::sync::Git;

type Handler = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Records every git invocation and answers through a handler closure that
/// receives the space-joined arguments.
pub struct FakeGit {
    workdir: PathBuf,
    calls: Mutex<Vec<String>>,
    handler: Handler,
}

impl FakeGit {
    pub fn new(
        workdir: impl Into<PathBuf>,
        handler: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            workdir: workdir.into(),
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Every command succeeds with empty output.
    pub fn ok(workdir: impl Into<PathBuf>) -> Self {
        Self::new(workdir, |_| Ok(String::new()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

impl Git for FakeGit {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.join(" ");
        self.calls.lock().unwrap().push(command.clone());
        (self.handler)(&command)
    }
}

pub fn git_error(command: &str, stderr: &str) -> Error {
    Error::Git {
        command: command.to_string(),
        stderr: stderr.to_string(),
    }
}

/// Make `dir` look like an initialized working tree.
pub fn fake_repository(dir: &Path) {
    std::fs::create_dir_all(dir.join(".git")).unwrap();
}

/// Answers questions from queues, falling back to each question's default.
#[derive(Default)]
pub struct ScriptedPrompt {
    confirms: Mutex<VecDeque<bool>>,
    inputs: Mutex<VecDeque<String>>,
    selections: Mutex<VecDeque<usize>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn confirm_with(self, answer: bool) -> Self {
        self.confirms.lock().unwrap().push_back(answer);
        self
    }

    pub fn input_with(self, answer: &str) -> Self {
        self.inputs.lock().unwrap().push_back(answer.to_string());
        self
    }

    pub fn select_with(self, index: usize) -> Self {
        self.selections.lock().unwrap().push_back(index);
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, message: &str, default: bool) -> bool {
        self.asked.lock().unwrap().push(message.to_string());
        self.confirms.lock().unwrap().pop_front().unwrap_or(default)
    }

    fn input(&self, message: &str) -> Option<String> {
        self.asked.lock().unwrap().push(message.to_string());
        self.inputs.lock().unwrap().pop_front()
    }

    fn select(&self, message: &str, _options: &[&str], default: usize) -> usize {
        self.asked.lock().unwrap().push(message.to_string());
        self.selections.lock().unwrap().pop_front().unwrap_or(default)
    }
}

/// Serves canned peer documents by url. Unknown urls fail with 404.
#[derive(Default)]
pub struct StaticFetcher {
    documents: HashMap<String, String>,
    failures: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` (raw JSON text) at `url`.
    pub fn serve(mut self, url: &str, body: &str) -> Self {
        self.documents.insert(url.to_string(), body.to_string());
        self
    }

    /// Answer `url` with an HTTP status.
    pub fn fail(mut self, url: &str, status: u16) -> Self {
        self.failures.insert(url.to_string(), status);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl PeerFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Document> {
        self.requests.lock().unwrap().push(url.to_string());
        if let Some(&status) = self.failures.get(url) {
            return Err(Error::PeerStatus {
                url: url.to_string(),
                status,
            });
        }
        let body = self.documents.get(url).ok_or_else(|| Error::PeerStatus {
            url: url.to_string(),
            status: 404,
        })?;
        Document::parse_feed(body).map_err(|e| Error::PeerPayload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
