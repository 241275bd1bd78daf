//! Deterministic service and topic naming
//!
//! Gateways and workers derive names independently, so both sides must agree
//! on the same normalisation: split on anything that is not alphanumeric,
//! lower-case each segment and join with `-`.

/// Suffix appended to a service name to form its request topic.
pub const DEFAULT_TOPIC_SUFFIX: &str = "-procedures";

const REPLY_TOPIC_SUFFIX: &str = "-replies";

/// Normalise a client type into the logical service name used by discovery.
///
/// Returns an empty string when `client_type` has no alphanumeric content.
pub fn service_name(client_type: &str) -> String {
    client_type
        .split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Request topic for a client type (`CLIENT_1` -> `client-1-procedures`).
pub fn request_topic(client_type: &str, suffix: &str) -> String {
    format!("{}{}", service_name(client_type), suffix)
}

/// Private reply topic for a gateway instance.
pub fn reply_topic(instance_id: &str) -> String {
    format!("{}{}", service_name(instance_id), REPLY_TOPIC_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_service_name_examples() {
        assert_eq!(service_name("CLIENT-1"), "client-1");
        assert_eq!(service_name("CLIENT_1"), "client-1");
        assert_eq!(service_name("Blockly Executor"), "blockly-executor");
        assert_eq!(service_name("  blockly__executor. "), "blockly-executor");
        assert_eq!(service_name("---"), "");
    }

    #[test]
    fn test_request_topic() {
        assert_eq!(
            request_topic("CLIENT-1", DEFAULT_TOPIC_SUFFIX),
            "client-1-procedures"
        );
    }

    #[test]
    fn test_reply_topic() {
        assert_eq!(reply_topic("Gateway 7"), "gateway-7-replies");
    }

    proptest! {
        #[test]
        fn service_name_is_idempotent(input in "[ -~]{0,40}") {
            let once = service_name(&input);
            prop_assert_eq!(service_name(&once), once);
        }

        #[test]
        fn service_name_has_no_separator_runs(input in "[A-Za-z0-9 _.-]{0,40}") {
            let name = service_name(&input);
            prop_assert!(!name.contains("--"));
            prop_assert!(!name.starts_with('-'));
            prop_assert!(!name.ends_with('-'));
            prop_assert_eq!(name.to_lowercase(), name.clone());
        }
    }
}
