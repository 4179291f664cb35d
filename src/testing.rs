//! In-process stand-ins for the browser, used by unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::browser::context::{BrowserEngine, Evaluation, PageContext};

type Responder = dyn Fn(&str, &str) -> Evaluation + Send + Sync;

struct Shared {
    /// Called with (current url, script) for every evaluation
    responder: Box<Responder>,
    failing: HashSet<String>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

/// Scriptable browser: every evaluation is answered by a closure
#[derive(Clone)]
pub struct FakeEngine {
    shared: Arc<Shared>,
}

impl FakeEngine {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Evaluation + Send + Sync + 'static,
    {
        Self::with_failing(responder, &[])
    }

    /// Like `new`, but navigating to any of `failing` returns an error
    pub fn with_failing<F>(responder: F, failing: &[&str]) -> Self
    where
        F: Fn(&str, &str) -> Evaluation + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                responder: Box::new(responder),
                failing: failing.iter().map(|u| u.to_string()).collect(),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                navigations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A context outside of any run, for component tests
    pub fn context(&self) -> Box<dyn PageContext> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeContext {
            shared: self.shared.clone(),
            url: Mutex::new("about:blank".to_string()),
        })
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.shared.navigations.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_context(&self) -> Result<Box<dyn PageContext>> {
        Ok(self.context())
    }
}

struct FakeContext {
    shared: Arc<Shared>,
    url: Mutex<String>,
}

#[async_trait]
impl PageContext for FakeContext {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.shared.navigations.lock().unwrap().push(url.to_string());
        if self.shared.failing.contains(url) {
            anyhow::bail!("net::ERR_CONNECTION_RESET at {}", url);
        }
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Evaluation {
        let url = self.url.lock().unwrap().clone();
        (self.shared.responder)(&url, script)
    }

    async fn close(&self) -> Result<()> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
