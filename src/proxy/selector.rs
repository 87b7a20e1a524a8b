//! Backend selection
//!
//! Picks one configured backend for a requested model id. Precedence, first
//! match wins:
//!
//! 1. first entry that is active AND whose `custom_model_id` matches
//! 2. first active entry
//! 3. first entry overall
//!
//! The active flag gates the exact match: a model id owned only by an
//! inactive entry is routed to the active fallback.

use crate::config::BackendEntry;

use super::error::ProxyError;

/// Select a backend for `requested_model` (may be empty)
pub(crate) fn select_backend<'a>(
    backends: &'a [BackendEntry],
    requested_model: &str,
) -> Result<&'a BackendEntry, ProxyError> {
    backends
        .iter()
        .find(|b| b.active && b.custom_model_id == requested_model)
        .or_else(|| backends.iter().find(|b| b.active))
        .or_else(|| backends.first())
        .ok_or(ProxyError::NoBackendAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamMode;

    fn backend(name: &str, model: &str, active: bool) -> BackendEntry {
        BackendEntry {
            name: name.to_string(),
            endpoint: format!("https://{name}.example.com"),
            custom_model_id: model.to_string(),
            target_model_id: format!("{model}-upstream"),
            stream_mode: StreamMode::Unset,
            active,
            simulate_stream: false,
        }
    }

    #[test]
    fn test_exact_match_among_active() {
        let backends = vec![
            backend("a", "gpt-4", true),
            backend("b", "claude", true),
        ];
        assert_eq!(select_backend(&backends, "claude").unwrap().name, "b");
    }

    #[test]
    fn test_first_exact_match_wins() {
        let backends = vec![
            backend("a", "other", true),
            backend("b", "gpt-4", true),
            backend("c", "gpt-4", true),
        ];
        assert_eq!(select_backend(&backends, "gpt-4").unwrap().name, "b");
    }

    #[test]
    fn test_falls_back_to_first_active() {
        let backends = vec![
            backend("a", "x", false),
            backend("b", "y", true),
            backend("c", "z", true),
        ];
        assert_eq!(select_backend(&backends, "unknown").unwrap().name, "b");
        assert_eq!(select_backend(&backends, "").unwrap().name, "b");
    }

    #[test]
    fn test_inactive_exact_match_is_skipped() {
        let backends = vec![
            backend("gpt4", "gpt-4", true),
            backend("gpt35", "gpt-3.5", false),
        ];
        assert_eq!(select_backend(&backends, "gpt-3.5").unwrap().name, "gpt4");
    }

    #[test]
    fn test_no_active_uses_first_entry() {
        let backends = vec![
            backend("a", "x", false),
            backend("b", "y", false),
        ];
        // Even an exact id match on a later entry doesn't count when inactive
        assert_eq!(select_backend(&backends, "y").unwrap().name, "a");
    }

    #[test]
    fn test_empty_list_is_no_backend() {
        assert!(matches!(
            select_backend(&[], "gpt-4"),
            Err(ProxyError::NoBackendAvailable)
        ));
    }
}
