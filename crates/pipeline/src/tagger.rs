//! Tagger - stamps agent identity onto envelopes
//!
//! Adds the deployment, job, index, and ip tags for any key the producer
//! did not already set. Empty identity values are skipped entirely.

use carrier_protocol::Envelope;

use crate::processor::EnvelopeProcessor;

/// Identity tagger.
#[derive(Debug, Clone, Default)]
pub struct Tagger {
    deployment: String,
    job: String,
    index: String,
    ip: String,
}

impl Tagger {
    pub fn new(
        deployment: impl Into<String>,
        job: impl Into<String>,
        index: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            deployment: deployment.into(),
            job: job.into(),
            index: index.into(),
            ip: ip.into(),
        }
    }
}

impl EnvelopeProcessor for Tagger {
    fn process(&self, envelope: &mut Envelope) {
        envelope.tag_if_absent("deployment", &self.deployment);
        envelope.tag_if_absent("job", &self.job);
        envelope.tag_if_absent("index", &self.index);
        envelope.tag_if_absent("ip", &self.ip);
    }
}

#[cfg(test)]
mod tests {
    use carrier_protocol::LogType;

    use super::*;

    fn tagger() -> Tagger {
        Tagger::new("my-dep", "my-job", "2", "10.0.0.1")
    }

    #[test]
    fn test_adds_identity_tags() {
        let mut envelope = Envelope::log("app", b"x".to_vec(), LogType::Out);
        tagger().process(&mut envelope);

        assert_eq!(envelope.tags["deployment"], "my-dep");
        assert_eq!(envelope.tags["job"], "my-job");
        assert_eq!(envelope.tags["index"], "2");
        assert_eq!(envelope.tags["ip"], "10.0.0.1");
    }

    #[test]
    fn test_existing_tags_win() {
        let mut envelope = Envelope::log("app", b"x".to_vec(), LogType::Out);
        envelope.tags.insert("job".into(), "producer-job".into());
        tagger().process(&mut envelope);

        assert_eq!(envelope.tags["job"], "producer-job");
        assert_eq!(envelope.tags["deployment"], "my-dep");
    }

    #[test]
    fn test_empty_identity_values_are_skipped() {
        let mut envelope = Envelope::log("app", b"x".to_vec(), LogType::Out);
        Tagger::new("", "job", "", "").process(&mut envelope);

        assert!(!envelope.tags.contains_key("deployment"));
        assert!(!envelope.tags.contains_key("index"));
        assert!(!envelope.tags.contains_key("ip"));
        assert_eq!(envelope.tags["job"], "job");
    }
}
