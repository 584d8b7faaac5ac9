// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Serializes runtime notifications into a vertex manager on a tokio task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Result, VertexError};
use crate::event::{InputDescriptor, InputInitializerEvent};
use crate::state::{BucketVertexManager, VertexState};

/// Reaction of an [`EventLoop`] to the events posted to it.
#[async_trait]
pub trait EventAction<E>: Send + Sync {
    fn on_start(&self);

    fn on_stop(&self);

    /// Handles one event. An error is passed to [`EventAction::on_error`] and
    /// does not stop the loop.
    async fn on_receive(&self, event: E) -> Result<()>;

    fn on_error(&self, error: VertexError);
}

/// Processes the events of a bounded channel one at a time on a tokio task.
pub struct EventLoop<E> {
    /// Name used in log messages.
    pub name: String,
    pub buffer_size: usize,
    stopped: Arc<AtomicBool>,
    action: Arc<dyn EventAction<E>>,
    tx_event: Option<mpsc::Sender<E>>,
}

impl<E: Send + 'static> EventLoop<E> {
    pub fn new(
        name: String,
        buffer_size: usize,
        action: Arc<dyn EventAction<E>>,
    ) -> Self {
        Self {
            name,
            buffer_size,
            stopped: Arc::new(AtomicBool::new(false)),
            action,
            tx_event: None,
        }
    }

    fn run(&self, mut rx_event: mpsc::Receiver<E>) {
        let name = self.name.clone();
        let stopped = self.stopped.clone();
        let action = self.action.clone();
        tokio::spawn(async move {
            info!("Starting vertex event loop {name}");
            while !stopped.load(Ordering::SeqCst) {
                let Some(event) = rx_event.recv().await else {
                    info!("Event channel of {name} closed, shutting down");
                    break;
                };
                if let Err(e) = action.on_receive(event).await {
                    error!("Vertex event loop {name} failed to process event: {e}");
                    action.on_error(e);
                }
            }
            info!("Vertex event loop {name} stopped");
        });
    }

    /// Spawns the loop task. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(VertexError::Internal(format!(
                "{} has already been stopped",
                self.name
            )));
        }
        self.action.on_start();

        let (tx_event, rx_event) = mpsc::channel::<E>(self.buffer_size);
        self.tx_event = Some(tx_event);
        self.run(rx_event);

        Ok(())
    }

    /// Stops the loop after the event being processed. Calling it again is a no-op.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.action.on_stop();
        }
    }

    pub fn get_sender(&self) -> Result<EventSender<E>> {
        let tx_event = self.tx_event.clone().ok_or_else(|| {
            VertexError::Internal(format!("Event loop {} is not started", self.name))
        })?;
        Ok(EventSender { tx_event })
    }
}

/// Handle for posting events to a started [`EventLoop`].
#[derive(Clone)]
pub struct EventSender<E> {
    tx_event: mpsc::Sender<E>,
}

impl<E> EventSender<E> {
    pub async fn post_event(&self, event: E) -> Result<()> {
        self.tx_event
            .send(event)
            .await
            .map_err(|e| VertexError::Internal(format!("Fail to send event due to {e}")))
    }
}

/// Notifications the runtime delivers to a vertex manager.
#[derive(Debug, Clone)]
pub enum VertexManagerEvent {
    Initialize(Vec<u8>),
    VertexStarted,
    RootInputInitialized {
        input_name: String,
        descriptor: InputDescriptor,
        events: Vec<InputInitializerEvent>,
    },
    SourceTaskCompleted {
        source_vertex: String,
        task_index: u32,
    },
    Custom(Vec<u8>),
}

/// Feeds events into one [`BucketVertexManager`].
///
/// The first error is kept and every later event is dropped, since the stage
/// is failed anyway.
pub struct VertexEventAction {
    manager: Mutex<BucketVertexManager>,
    failure: Mutex<Option<VertexError>>,
}

impl VertexEventAction {
    pub fn new(manager: BucketVertexManager) -> Self {
        Self {
            manager: Mutex::new(manager),
            failure: Mutex::new(None),
        }
    }

    pub fn state(&self) -> VertexState {
        self.manager.lock().state()
    }

    /// Message of the error that failed the vertex, if any.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().as_ref().map(|e| e.to_string())
    }

    fn handle(&self, event: VertexManagerEvent) -> Result<()> {
        let mut manager = self.manager.lock();
        match event {
            VertexManagerEvent::Initialize(payload) => manager.initialize(&payload),
            VertexManagerEvent::VertexStarted => manager.on_vertex_started(),
            VertexManagerEvent::RootInputInitialized {
                input_name,
                mut descriptor,
                events,
            } => manager.on_root_vertex_initialized(&input_name, &mut descriptor, events),
            VertexManagerEvent::SourceTaskCompleted {
                source_vertex,
                task_index,
            } => {
                manager.on_source_task_completed(&source_vertex, task_index);
                Ok(())
            }
            VertexManagerEvent::Custom(payload) => {
                manager.on_vertex_manager_event(&payload);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl EventAction<VertexManagerEvent> for VertexEventAction {
    fn on_start(&self) {
        info!("Starting vertex manager event loop");
    }

    fn on_stop(&self) {
        info!("Stopping vertex manager event loop");
    }

    async fn on_receive(&self, event: VertexManagerEvent) -> Result<()> {
        if self.failure.lock().is_some() {
            warn!("Vertex manager already failed, ignoring {event:?}");
            return Ok(());
        }
        self.handle(event)
    }

    fn on_error(&self, error: VertexError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::VertexConfig;
    use crate::test_utils::{bucket_splits, data_events, init_logging, TestContext};

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn root_input(input_name: &str, buckets: &[u32]) -> VertexManagerEvent {
        VertexManagerEvent::RootInputInitialized {
            input_name: input_name.to_string(),
            descriptor: InputDescriptor::new("HiveSplitGenerator"),
            events: data_events(bucket_splits(&format!("/{input_name}"), buckets)),
        }
    }

    #[tokio::test]
    async fn test_vertex_event_loop() -> Result<()> {
        init_logging();
        let context = Arc::new(TestContext::new(2));
        let action = Arc::new(VertexEventAction::new(BucketVertexManager::new(
            context.clone(),
        )));
        let mut event_loop: EventLoop<VertexManagerEvent> =
            EventLoop::new("bucket_vertex".to_string(), 16, action.clone());
        event_loop.start()?;
        let sender = event_loop.get_sender()?;

        let config = VertexConfig::new(2, "");
        sender
            .post_event(VertexManagerEvent::Initialize(config.to_payload()))
            .await?;
        sender.post_event(root_input("big", &[0, 1])).await?;
        sender.post_event(VertexManagerEvent::VertexStarted).await?;
        wait_until(|| context.scheduled_tasks.lock().len() == 2).await;
        assert_eq!(action.state(), VertexState::AllInputsSeen);
        assert!(action.failure().is_none());

        // the second report fails the vertex, later events are ignored
        sender.post_event(root_input("big", &[0])).await?;
        wait_until(|| action.failure().is_some()).await;
        sender.post_event(VertexManagerEvent::VertexStarted).await?;
        sender
            .post_event(VertexManagerEvent::Custom(vec![1, 2, 3]))
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(context.scheduled_tasks.lock().len(), 2);
        assert!(action
            .failure()
            .is_some_and(|msg| msg.starts_with("Protocol violation")));

        event_loop.stop();
        Ok(())
    }

    #[test]
    fn sender_requires_started_loop() {
        let context = Arc::new(TestContext::new(1));
        let action = Arc::new(VertexEventAction::new(BucketVertexManager::new(context)));
        let event_loop: EventLoop<VertexManagerEvent> =
            EventLoop::new("bucket_vertex".to_string(), 1, action);
        assert!(event_loop.get_sender().is_err());
    }

    #[test]
    fn stopped_loop_cannot_restart() {
        let context = Arc::new(TestContext::new(1));
        let action = Arc::new(VertexEventAction::new(BucketVertexManager::new(context)));
        let mut event_loop: EventLoop<VertexManagerEvent> =
            EventLoop::new("bucket_vertex".to_string(), 1, action);
        event_loop.stop();
        event_loop.stop();
        assert!(event_loop.start().is_err());
        assert!(event_loop.get_sender().is_err());
    }
}
