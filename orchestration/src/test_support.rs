//! Scripted worker stubs shared across the crate's tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::WorkerError;
use crate::state::{Message, SourceCitation};
use crate::worker::{Worker, WorkerOutput, WorkerRole};

/// Worker that answers every invocation with one fixed line.
pub struct EchoWorker {
    role: WorkerRole,
    reply: String,
    sources: Vec<SourceCitation>,
}

impl EchoWorker {
    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }
}

pub fn echo(role: WorkerRole, reply: &str) -> EchoWorker {
    EchoWorker {
        role,
        reply: reply.to_string(),
        sources: Vec::new(),
    }
}

#[async_trait]
impl Worker for EchoWorker {
    async fn invoke(&self, _history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        Ok(WorkerOutput {
            messages: vec![Message::ai(format!("{}: {}", self.role, self.reply))],
            sources: self.sources.clone(),
        })
    }
}

/// Worker that fails every invocation.
pub struct FailingWorker {
    role: WorkerRole,
    message: String,
}

pub fn failing(role: WorkerRole, message: &str) -> FailingWorker {
    FailingWorker {
        role,
        message: message.to_string(),
    }
}

#[async_trait]
impl Worker for FailingWorker {
    async fn invoke(&self, _history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        Err(WorkerError::new(self.role, self.message.clone()))
    }
}

/// Worker that fails a fixed number of times, then succeeds.
pub struct FlakyWorker {
    role: WorkerRole,
    failures_left: Mutex<u32>,
}

pub fn flaky(role: WorkerRole, failures: u32) -> FlakyWorker {
    FlakyWorker {
        role,
        failures_left: Mutex::new(failures),
    }
}

#[async_trait]
impl Worker for FlakyWorker {
    async fn invoke(&self, _history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        let mut left = self
            .failures_left
            .lock()
            .map_err(|_| WorkerError::new(self.role, "stub lock poisoned"))?;
        if *left > 0 {
            *left -= 1;
            return Err(WorkerError::new(self.role, "transient failure"));
        }
        Ok(WorkerOutput {
            messages: vec![Message::ai(format!("{} recovered", self.role))],
            sources: Vec::new(),
        })
    }
}

/// Worker that plays back scripted replies in order. Once the script is
/// exhausted (or in `repeating` mode) the last reply repeats forever.
pub struct ScriptedWorker {
    script: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedWorker {
    pub fn replies(replies: Vec<String>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            last: Mutex::new(String::new()),
        }
    }

    pub fn repeating(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(reply.to_string()),
        }
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn invoke(&self, _history: &[Message]) -> Result<WorkerOutput, WorkerError> {
        let reply = {
            let mut script = self
                .script
                .lock()
                .map_err(|_| WorkerError::new(WorkerRole::Arbiter, "stub lock poisoned"))?;
            let mut last = self
                .last
                .lock()
                .map_err(|_| WorkerError::new(WorkerRole::Arbiter, "stub lock poisoned"))?;
            if let Some(next) = script.pop_front() {
                *last = next.clone();
                next
            } else {
                last.clone()
            }
        };
        Ok(WorkerOutput {
            messages: vec![Message::ai(reply)],
            sources: Vec::new(),
        })
    }
}
