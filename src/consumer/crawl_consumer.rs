use crate::broker::{Broker, ConsumerSession, MessageStream, ProducerSession};
use crate::consumer::STREAMS_PER_TOPIC;
use crate::crawler::EventHandler;
use crate::event::CrawlEvent;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Broker sessions and workers held while a consumer runs
struct Sessions {
    producer: Arc<dyn ProducerSession>,
    consumer: Box<dyn ConsumerSession>,
    workers: Vec<JoinHandle<()>>,
}

impl Sessions {
    /// Ends the streams, waits for in-flight messages, then closes the producer
    async fn release(self, topic: &str) {
        self.consumer.shutdown().await;
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker for {} ended abnormally: {}", topic, e);
            }
        }
        self.producer.close().await;
    }
}

/// One subscription to one topic
pub struct CrawlConsumer {
    topic: String,
    group_id: String,
    chroot: Option<String>,
    start_page: Option<String>,
    broker: Arc<dyn Broker>,
    handler: Arc<dyn EventHandler>,
    executor: Handle,
    running: Arc<AtomicBool>,
    sessions: Mutex<Option<Sessions>>,
}

impl CrawlConsumer {
    /// Creates a stopped consumer
    ///
    /// # Arguments
    ///
    /// * `topic` - Topic to consume and publish to; also the seed host
    /// * `group_id` - Consumer group offsets are committed under
    /// * `chroot` - Path prefix the crawl is scoped to
    /// * `start_page` - Page appended to the chroot for the seed URL
    /// * `broker` - Broker the sessions are opened against
    /// * `handler` - Turns each event into follow-up events
    /// * `executor` - Runtime the stream workers are spawned on
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        topic: impl Into<String>,
        group_id: impl Into<String>,
        chroot: Option<String>,
        start_page: Option<String>,
        broker: Arc<dyn Broker>,
        handler: Arc<dyn EventHandler>,
        executor: Handle,
    ) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
            chroot,
            start_page,
            broker,
            handler,
            executor,
            running: Arc::new(AtomicBool::new(false)),
            sessions: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Opens the broker sessions, spawns the stream workers and publishes the
    /// seed event
    ///
    /// Starting a running consumer is a no-op. On failure every session
    /// opened so far is released and the consumer stays stopped.
    pub async fn start(&self) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Consumer for {} already running", self.topic);
            return Ok(());
        }

        match self.open().await {
            Ok(opened) => {
                *sessions = Some(opened);
                tracing::info!("Started consumer for {} (group {})", self.topic, self.group_id);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                tracing::error!("Could not start consumer for {}: {}", self.topic, e);
                Err(e)
            }
        }
    }

    /// Stops the workers and releases the broker sessions
    ///
    /// Returns once the message in flight (if any) has been handled. Stopping
    /// a stopped consumer is a no-op.
    pub async fn stop(&self) {
        let mut sessions = self.sessions.lock().await;
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Some(opened) = sessions.take() {
            opened.release(&self.topic).await;
        }
        tracing::info!("Stopped consumer for {}", self.topic);
    }

    async fn open(&self) -> Result<Sessions> {
        let producer = self.broker.connect_producer().await?;

        let consumer = match self.broker.connect_consumer(&self.group_id).await {
            Ok(consumer) => consumer,
            Err(e) => {
                producer.close().await;
                return Err(e.into());
            }
        };

        let streams = match consumer.create_streams(&self.topic, STREAMS_PER_TOPIC).await {
            Ok(streams) => streams,
            Err(e) => {
                consumer.shutdown().await;
                producer.close().await;
                return Err(e.into());
            }
        };

        let workers = streams
            .into_iter()
            .map(|stream| {
                let worker = Worker {
                    topic: self.topic.clone(),
                    chroot: self.chroot.clone(),
                    handler: self.handler.clone(),
                    producer: producer.clone(),
                    running: self.running.clone(),
                };
                self.executor.spawn(worker.run(stream))
            })
            .collect();

        let sessions = Sessions {
            producer,
            consumer,
            workers,
        };

        let seed = CrawlEvent::seed(&self.topic, self.chroot.as_deref(), self.start_page.as_deref());
        match publish(sessions.producer.as_ref(), &self.topic, &seed).await {
            Ok(()) => {
                tracing::info!("Published seed {}", seed);
                Ok(sessions)
            }
            Err(e) => {
                sessions.release(&self.topic).await;
                Err(e)
            }
        }
    }
}

async fn publish(producer: &dyn ProducerSession, topic: &str, event: &CrawlEvent) -> Result<()> {
    producer.send(topic, event.to_bytes()?).await?;
    Ok(())
}

/// Pulls messages from one stream until it ends or the consumer stops
struct Worker {
    topic: String,
    chroot: Option<String>,
    handler: Arc<dyn EventHandler>,
    producer: Arc<dyn ProducerSession>,
    running: Arc<AtomicBool>,
}

impl Worker {
    async fn run(self, mut stream: Box<dyn MessageStream>) {
        while self.running.load(Ordering::SeqCst) {
            let Some(payload) = stream.next_message().await else {
                break;
            };

            if let Err(e) = self.process(&payload).await {
                tracing::error!("Failed to process message on {}: {}", self.topic, e);
            }
        }
        tracing::debug!("Worker for {} exiting", self.topic);
    }

    async fn process(&self, payload: &[u8]) -> Result<()> {
        let event = CrawlEvent::from_bytes(payload)?;
        tracing::debug!("Received {}", event);

        if !self.in_chroot(&event) {
            tracing::warn!(
                "Event {} is outside chroot {}",
                event,
                self.chroot.as_deref().unwrap_or("")
            );
        }

        for next in self.handler.handle(&event).await? {
            if let Err(e) = publish(self.producer.as_ref(), &self.topic, &next).await {
                tracing::error!("Could not publish {}: {}", next, e);
            }
        }

        Ok(())
    }

    /// Returns true if the event's URL path lies under this consumer's chroot
    fn in_chroot(&self, event: &CrawlEvent) -> bool {
        let Some(chroot) = self.chroot.as_deref() else {
            return true;
        };
        event
            .url
            .as_deref()
            .and_then(|raw| url::Url::parse(raw).ok())
            .is_some_and(|url| url.path().starts_with(chroot))
    }
}
