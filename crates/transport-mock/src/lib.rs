//! # Mock Transport
//!
//! In-memory [`Transport`] that plays the part of a Melody Audio module
//! behind a USB serial adapter. Tests and the demo binary script it:
//!
//! - device presence and permission answers
//! - open failures and injected read errors
//! - inbound bytes (`push_chunk` / `push_line`)
//!
//! Everything written is recorded and can be read back as lines.
//!
//! Clones share the same state, so a test keeps one handle while the
//! bridge owns another.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::todo
)]

use async_trait::async_trait;
use core_types::{DeviceDescriptor, Permission, Transport, TransportError};
use framing::{Framer, LineFramer, LINE_TERMINATOR};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How the mock answers a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    Grant,
    Deny,
    /// Suspend until [`MockTransport::resolve_permission`]
    Hold,
}

type Chunk = Result<Vec<u8>, TransportError>;

#[derive(Debug)]
struct MockState {
    device: DeviceDescriptor,
    present: bool,
    permission_mode: PermissionMode,
    granted: bool,
    pending_permission: Option<oneshot::Sender<Permission>>,
    open_error: Option<String>,
    open_delay: Option<Duration>,
    opens_in_progress: usize,
    max_concurrent_opens: usize,
    write_error: Option<String>,
    open: bool,
    open_count: usize,
    close_count: usize,
    permission_requests: usize,
    baud_rate: Option<u32>,
    writes: Vec<Vec<u8>>,
}

#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    inbound_tx: mpsc::UnboundedSender<Chunk>,
    inbound_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Chunk>>>,
}

impl MockTransport {
    /// Absent device, permission granted on request.
    pub fn new(device: DeviceDescriptor) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(MockState {
                device,
                present: false,
                permission_mode: PermissionMode::Grant,
                granted: false,
                pending_permission: None,
                open_error: None,
                open_delay: None,
                opens_in_progress: 0,
                max_concurrent_opens: 0,
                write_error: None,
                open: false,
                open_count: 0,
                close_count: 0,
                permission_requests: 0,
                baud_rate: None,
                writes: Vec::new(),
            })),
            inbound_tx,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_present(&self, present: bool) {
        let mut state = self.state();
        state.present = present;
        if !present {
            state.open = false;
        }
    }

    pub fn set_permission_mode(&self, mode: PermissionMode) {
        self.state().permission_mode = mode;
    }

    /// Answer a held permission request. Returns false if none is waiting.
    pub fn resolve_permission(&self, answer: Permission) -> bool {
        let pending = self.state().pending_permission.take();
        match pending {
            Some(tx) => tx.send(answer).is_ok(),
            None => false,
        }
    }

    pub fn has_pending_permission(&self) -> bool {
        self.state().pending_permission.is_some()
    }

    /// Make the next `open` fail with `reason`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.state().open_error = Some(reason.into());
    }

    /// Make every `write` fail until cleared with `None`.
    /// Make the next `open()` take `delay` before it completes
    pub fn delay_next_open(&self, delay: Duration) {
        self.state().open_delay = Some(delay);
    }

    /// Most `open()` calls ever in flight at once
    pub fn max_concurrent_opens(&self) -> usize {
        self.state().max_concurrent_opens
    }

    pub fn set_write_error(&self, reason: Option<String>) {
        self.state().write_error = reason;
    }

    /// Queue raw inbound bytes.
    pub fn push_chunk(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.inbound_tx.send(Ok(bytes.into()));
    }

    /// Queue one module response line (terminator appended).
    pub fn push_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(LINE_TERMINATOR);
        self.push_chunk(bytes);
    }

    /// Make the pending or next read fail.
    pub fn inject_read_error(&self, reason: impl Into<String>) {
        let _ = self.inbound_tx.send(Err(TransportError::Io(reason.into())));
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn open_count(&self) -> usize {
        self.state().open_count
    }

    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    pub fn permission_requests(&self) -> usize {
        self.state().permission_requests
    }

    pub fn baud_rate(&self) -> Option<u32> {
        self.state().baud_rate
    }

    /// Raw bytes of every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    /// Successful writes re-split into command lines.
    pub fn written_lines(&self) -> Vec<String> {
        let mut framer = LineFramer::new();
        self.state()
            .writes
            .iter()
            .flat_map(|bytes| framer.push(bytes))
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_device_present(&self, device: &DeviceDescriptor) -> bool {
        let state = self.state();
        state.present && state.device == *device
    }

    async fn has_permission(&self, _device: &DeviceDescriptor) -> bool {
        self.state().granted
    }

    async fn request_permission(&self, _device: &DeviceDescriptor) -> Permission {
        let waiter = {
            let mut state = self.state();
            state.permission_requests += 1;
            match state.permission_mode {
                PermissionMode::Grant => {
                    state.granted = true;
                    return Permission::Granted;
                }
                PermissionMode::Deny => return Permission::Denied,
                PermissionMode::Hold => {
                    let (tx, rx) = oneshot::channel();
                    state.pending_permission = Some(tx);
                    rx
                }
            }
        };

        // A dropped sender counts as a denial.
        let answer = waiter.await.unwrap_or(Permission::Denied);
        if answer == Permission::Granted {
            self.state().granted = true;
        }
        answer
    }

    async fn open(&self, device: &DeviceDescriptor, baud_rate: u32) -> Result<(), TransportError> {
        let delay = {
            let mut state = self.state();
            state.opens_in_progress += 1;
            state.max_concurrent_opens = state.max_concurrent_opens.max(state.opens_in_progress);
            state.open_delay.take()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.opens_in_progress = state.opens_in_progress.saturating_sub(1);
        if let Some(reason) = state.open_error.take() {
            return Err(TransportError::ConnectionFailed(reason));
        }
        if !state.present || state.device != *device {
            return Err(TransportError::ConnectionFailed(format!(
                "device {} not present",
                device
            )));
        }
        state.open = true;
        state.open_count += 1;
        state.baud_rate = Some(baud_rate);
        tracing::debug!(%device, baud_rate, "mock transport opened");
        Ok(())
    }

    async fn read_chunk(&self) -> Result<Vec<u8>, TransportError> {
        if !self.state().open {
            return Err(TransportError::NotConnected);
        }
        let mut rx = self.inbound_rx.lock().await;
        match rx.recv().await {
            Some(chunk) => chunk,
            None => Err(TransportError::Closed),
        }
    }

    async fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        if let Some(reason) = &state.write_error {
            return Err(TransportError::Io(reason.clone()));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.open {
            state.close_count += 1;
        }
        state.open = false;
        Ok(())
    }
}
