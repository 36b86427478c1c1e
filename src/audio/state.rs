use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Streaming,
}

/// Stream state shared between the controller and the ingest worker.
#[derive(Debug, Default)]
pub struct SharedStreamState {
    streaming: AtomicBool,
}

impl SharedStreamState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StreamState {
        if self.is_streaming() {
            StreamState::Streaming
        } else {
            StreamState::Stopped
        }
    }

    pub fn set(&self, state: StreamState) {
        self.streaming
            .store(state == StreamState::Streaming, Ordering::SeqCst);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}
