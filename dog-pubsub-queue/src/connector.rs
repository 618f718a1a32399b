use std::env;

use tracing::info;

use crate::{
    backend::{BackendFactory, ClientSettings},
    config::{parse_flag, ENV_DEBUG},
    PubSubConfig, PubSubQueue, QueueCtx, QueueResult,
};

/// Connection name used when none is given
pub const DEFAULT_CONNECTION_NAME: &str = "pubsub";

/// Builds a [`PubSubQueue`] from a connection configuration.
///
/// The backend client is created through `factory` with a batch size of one
/// message per pull. Debug logging is on when the configuration asks for it
/// or when `APP_DEBUG` is set.
pub struct PubSubConnector<F: BackendFactory> {
    factory: F,
    connection_name: String,
}

impl<F: BackendFactory> PubSubConnector<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            connection_name: DEFAULT_CONNECTION_NAME.to_string(),
        }
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Validate `config` and build a queue over a fresh backend client.
    ///
    /// An empty `project_id` fails with [`crate::QueueError::Config`] before any
    /// client is created.
    pub fn connect(&self, config: PubSubConfig) -> QueueResult<PubSubQueue<F::Backend>> {
        config.validate()?;

        let debug_enabled = config.debug || env::var(ENV_DEBUG).map(|raw| parse_flag(&raw)).unwrap_or(false);
        let settings = ClientSettings::new(config.project_id.clone())
            .with_max_messages(1)
            .with_debug(debug_enabled);
        let backend = self.factory.create(&settings)?;

        info!(
            connection = %self.connection_name,
            project_id = %config.project_id,
            queue = %config.queue,
            debug = debug_enabled,
            "Connected pub/sub queue"
        );

        Ok(PubSubQueue::new(backend, config).with_context(QueueCtx::new(self.connection_name.clone())))
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::{backend::memory::MemoryPubSub, QueueError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_empty_project_id_builds_nothing() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let connector = PubSubConnector::new(move |settings: &ClientSettings| -> QueueResult<MemoryPubSub> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MemoryPubSub::with_settings(settings.clone()))
        });

        let err = connector.connect(PubSubConfig::default()).unwrap_err();

        match err {
            QueueError::Config { field, message } => {
                assert_eq!(field, "project_id");
                assert_eq!(message, "The PubSub project id is missing");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connect_uses_single_message_batches() {
        let connector = PubSubConnector::new(MemoryPubSub::factory()).with_connection_name("gcpubsub");

        let queue = connector
            .connect(PubSubConfig::new("project").with_debug(true))
            .unwrap();

        assert_eq!(queue.backend().settings().project_id, "project");
        assert_eq!(queue.backend().settings().max_messages, 1);
        assert!(queue.backend().settings().debug);
        assert_eq!(queue.connection_name(), "gcpubsub");
    }

    #[test]
    fn test_factory_errors_propagate() {
        let connector = PubSubConnector::new(|_: &ClientSettings| -> QueueResult<MemoryPubSub> {
            Err(QueueError::transport("credentials rejected"))
        });

        let err = connector.connect(PubSubConfig::new("project")).unwrap_err();
        assert!(err.is_transport());
    }
}
