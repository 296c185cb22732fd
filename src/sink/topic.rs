//! Log topic sink
//!
//! Replays a state into a fresh registry log topic. A record the broker
//! refuses is logged and skipped; the remaining records are still sent.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::ClientContext;
use tracing::{debug, info, warn};

use crate::config::TopicSinkConfig;
use crate::error::Result;
use crate::log::{LogReconstructor, LogRecord};
use crate::sink::Sink;
use crate::state::State;

/// Registry log topics are single-partition
const LOG_PARTITION: i32 = 0;

/// Synchronous producer of log records
pub trait RecordProducer {
    fn send(&mut self, topic: &str, record: &LogRecord) -> Result<()>;
}

/// Broker client settings for a topic sink declaration
pub fn client_config(config: &TopicSinkConfig) -> Result<ClientConfig> {
    let mechanism = config.sasl_mechanism()?;
    let tls = config.tls();

    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.seeds().join(","))
        .set("acks", "1")
        .set("message.timeout.ms", (config.ack_timeout_secs * 1000).to_string())
        .set(
            "security.protocol",
            match (mechanism.is_some(), tls.is_some()) {
                (false, false) => "plaintext",
                (false, true) => "ssl",
                (true, false) => "sasl_plaintext",
                (true, true) => "sasl_ssl",
            },
        );

    if let (Some(mechanism), Some(sasl)) = (mechanism, &config.sasl) {
        client
            .set("sasl.mechanisms", mechanism.as_str())
            .set("sasl.username", sasl.username.as_str())
            .set("sasl.password", sasl.password.as_str());
    }

    if let Some(tls) = tls {
        let files = [
            ("ssl.ca.location", &tls.ca_cert),
            ("ssl.certificate.location", &tls.client_cert),
            ("ssl.key.location", &tls.client_key),
        ];
        for (key, path) in files {
            if let Some(path) = path {
                client.set(key, path.display().to_string());
            }
        }
    }

    Ok(client)
}

/// Holds the delivery failure of the record in flight
#[derive(Default)]
struct DeliveryReport {
    failure: Mutex<Option<KafkaError>>,
}

impl DeliveryReport {
    fn take(&self) -> Option<KafkaError> {
        self.failure.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl ClientContext for DeliveryReport {}

impl ProducerContext for DeliveryReport {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        if let Err((err, _)) = result {
            *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.clone());
        }
    }
}

/// Producer backed by librdkafka; waits for each record's acknowledgement
pub struct KafkaProducer {
    producer: BaseProducer<DeliveryReport>,
    timeout: Duration,
}

impl KafkaProducer {
    pub fn connect(config: &TopicSinkConfig) -> Result<Self> {
        let producer: BaseProducer<DeliveryReport> =
            client_config(config)?.create_with_context(DeliveryReport::default())?;
        Ok(Self {
            producer,
            timeout: Duration::from_secs(config.ack_timeout_secs),
        })
    }
}

impl RecordProducer for KafkaProducer {
    fn send(&mut self, topic: &str, record: &LogRecord) -> Result<()> {
        self.producer.context().take();
        let message = BaseRecord::to(topic)
            .key(record.key.as_slice())
            .payload(record.value.as_slice())
            .partition(LOG_PARTITION);
        self.producer.send(message).map_err(|(err, _)| err)?;
        self.producer.flush(self.timeout)?;
        match self.producer.context().take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// Sink writing reconstructed log records to a topic
pub struct TopicSink {
    config: TopicSinkConfig,
    producer: Option<Box<dyn RecordProducer>>,
}

impl TopicSink {
    /// Connects lazily, on the first `put_state`
    pub fn new(config: TopicSinkConfig) -> Self {
        Self {
            config,
            producer: None,
        }
    }

    pub fn with_producer(config: TopicSinkConfig, producer: Box<dyn RecordProducer>) -> Self {
        Self {
            config,
            producer: Some(producer),
        }
    }

    pub fn records(&self, state: &State) -> Result<Vec<LogRecord>> {
        LogReconstructor::new(self.config.compatibility).records(state)
    }
}

impl Sink for TopicSink {
    fn put_state(&mut self, state: &State) -> Result<()> {
        let records = self.records(state)?;

        let mut producer = match self.producer.take() {
            Some(producer) => producer,
            None => {
                info!(seed = %self.config.seed, topic = %self.config.topic, "connecting to brokers");
                Box::new(KafkaProducer::connect(&self.config)?)
            }
        };

        let mut failed = 0;
        for (offset, record) in records.iter().enumerate() {
            match producer.send(&self.config.topic, record) {
                Ok(()) => debug!(offset, "produced record"),
                Err(err) => {
                    failed += 1;
                    warn!(offset, error = %err, "record had a produce error, continuing");
                }
            }
        }
        self.producer = Some(producer);

        if failed > 0 {
            warn!(failed, total = records.len(), "some records were not produced");
        } else {
            info!(total = records.len(), topic = %self.config.topic, "produced all records");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SaslConfig, TlsConfig};
    use crate::error::MigrateError;
    use crate::state::{CompatibilityLevel, SchemaType, SubjectSchema};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Captures sent records; refuses the record at `fail_at`
    struct CapturingProducer {
        sent: Rc<RefCell<Vec<(String, LogRecord)>>>,
        fail_at: Option<usize>,
        calls: usize,
    }

    impl RecordProducer for CapturingProducer {
        fn send(&mut self, topic: &str, record: &LogRecord) -> Result<()> {
            let call = self.calls;
            self.calls += 1;
            if Some(call) == self.fail_at {
                return Err(MigrateError::Io(std::io::Error::other("broker refused")));
            }
            self.sent.borrow_mut().push((topic.to_string(), record.clone()));
            Ok(())
        }
    }

    fn config() -> TopicSinkConfig {
        TopicSinkConfig {
            seed: "localhost:9092".to_string(),
            topic: "_schemas_copy".to_string(),
            compatibility: CompatibilityLevel::Full,
            ack_timeout_secs: 1,
            sasl: None,
            tls: None,
        }
    }

    fn state() -> State {
        State {
            subject_schemas: vec![SubjectSchema {
                subject: "user".to_string(),
                version: 1,
                id: 1,
                schema_type: SchemaType::Avro,
                schema: "\"string\"".to_string(),
                references: Vec::new(),
                metadata: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_sends_every_record_to_topic() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let producer = CapturingProducer {
            sent: Rc::clone(&sent),
            fail_at: None,
            calls: 0,
        };
        let mut sink = TopicSink::with_producer(config(), Box::new(producer));
        sink.put_state(&state()).unwrap();

        let sent = sent.borrow();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(topic, _)| topic == "_schemas_copy"));
        assert_eq!(sent[2].1.value, br#"{"compatibilityLevel":"FULL"}"#.to_vec());
    }

    #[test]
    fn test_produce_failure_is_not_fatal() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let producer = CapturingProducer {
            sent: Rc::clone(&sent),
            fail_at: Some(1),
            calls: 0,
        };
        let mut sink = TopicSink::with_producer(config(), Box::new(producer));
        sink.put_state(&state()).unwrap();

        assert_eq!(sent.borrow().len(), 2);
    }

    #[test]
    fn test_plaintext_client_config() {
        let mut config = config();
        config.seed = "broker-1:9092, broker-2:9092".to_string();
        let client = client_config(&config).unwrap();

        assert_eq!(client.get("bootstrap.servers"), Some("broker-1:9092,broker-2:9092"));
        assert_eq!(client.get("security.protocol"), Some("plaintext"));
        assert_eq!(client.get("acks"), Some("1"));
        assert_eq!(client.get("message.timeout.ms"), Some("1000"));
        assert_eq!(client.get("sasl.mechanisms"), None);
    }

    #[test]
    fn test_sasl_over_tls_client_config() {
        let mut config = config();
        config.sasl = Some(SaslConfig {
            mechanism: "scram-sha-512".to_string(),
            username: "migrator".to_string(),
            password: "secret".to_string(),
        });
        config.tls = Some(TlsConfig {
            enabled: true,
            ca_cert: Some("/etc/migrator/ca.pem".into()),
            client_cert: None,
            client_key: None,
        });
        let client = client_config(&config).unwrap();

        assert_eq!(client.get("security.protocol"), Some("sasl_ssl"));
        assert_eq!(client.get("sasl.mechanisms"), Some("SCRAM-SHA-512"));
        assert_eq!(client.get("sasl.username"), Some("migrator"));
        assert_eq!(client.get("sasl.password"), Some("secret"));
        assert_eq!(client.get("ssl.ca.location"), Some("/etc/migrator/ca.pem"));
        assert_eq!(client.get("ssl.certificate.location"), None);
    }

    #[test]
    fn test_tls_only_client_config() {
        let mut config = config();
        config.tls = Some(TlsConfig {
            enabled: true,
            ca_cert: None,
            client_cert: Some("/etc/migrator/client.pem".into()),
            client_key: Some("/etc/migrator/client.key".into()),
        });
        let client = client_config(&config).unwrap();

        assert_eq!(client.get("security.protocol"), Some("ssl"));
        assert_eq!(client.get("ssl.certificate.location"), Some("/etc/migrator/client.pem"));
        assert_eq!(client.get("ssl.key.location"), Some("/etc/migrator/client.key"));
    }

    #[test]
    fn test_unknown_mechanism_is_a_config_error() {
        let mut config = config();
        config.sasl = Some(SaslConfig {
            mechanism: "OAUTHBEARER".to_string(),
            username: "migrator".to_string(),
            password: "secret".to_string(),
        });
        assert!(matches!(
            client_config(&config),
            Err(MigrateError::InvalidConfig { .. })
        ));
    }
}
