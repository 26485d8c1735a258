//! API key pooling and per-call failover.
//!
//! Keys come from three places: the admin-managed settings list, a configured
//! backup key, and the process environment. The pool is deduplicated once,
//! then every call shuffles its own copy and walks it, trying each key at most
//! once. There is no backoff, no cooldown, and no per-key health tracking; the
//! first success wins and the last failure is what the caller sees.

use std::future::Future;

use rand::seq::SliceRandom;

#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    keys: Vec<String>,
}

impl KeyPool {
    /// Builds the pool from the three key sources, preserving source order
    /// while dropping duplicates and blank entries.
    pub fn collect(
        settings_keys: &[String],
        backup_key: Option<&str>,
        env_key: Option<&str>,
    ) -> Self {
        let mut keys: Vec<String> = Vec::new();
        let candidates = settings_keys
            .iter()
            .map(String::as_str)
            .chain(backup_key)
            .chain(env_key);
        for candidate in candidates {
            let candidate = candidate.trim();
            if candidate.is_empty() || keys.iter().any(|key| key == candidate) {
                continue;
            }
            keys.push(candidate.to_string());
        }
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RotationError<E>
where
    E: std::error::Error + 'static,
{
    #[error("no API keys are configured")]
    NoKeysAvailable,
    #[error("all {attempts} API keys failed")]
    AllKeysFailed {
        attempts: usize,
        #[source]
        last: E,
    },
}

/// Runs `operation` against keys from the pool until one succeeds.
///
/// Key order is freshly randomized for every call so a bad key at the front of
/// the settings list cannot starve the rest.
pub async fn generate_with_failover<T, E, F, Fut>(
    pool: &KeyPool,
    operation: F,
) -> Result<T, RotationError<E>>
where
    E: std::error::Error + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut keys = pool.keys.clone();
    keys.shuffle(&mut rand::rng());

    let attempts = keys.len();
    let mut last_error = None;
    for key in keys {
        match operation(key).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::warn!(
                    target: "studydesk.rotation",
                    error = %error,
                    "generation attempt failed, rotating to next key",
                );
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(last) => Err(RotationError::AllKeysFailed { attempts, last }),
        None => Err(RotationError::NoKeysAvailable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn collect_deduplicates_across_sources() {
        let settings = vec![
            "alpha".to_string(),
            " beta ".to_string(),
            "alpha".to_string(),
            String::new(),
        ];
        let pool = KeyPool::collect(&settings, Some("beta"), Some("gamma"));
        assert_eq!(pool.keys, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn collect_with_no_sources_is_empty() {
        let pool = KeyPool::collect(&[], None, None);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn empty_pool_is_its_own_error() {
        let pool = KeyPool::default();
        let result: Result<(), RotationError<Boom>> =
            generate_with_failover(&pool, |_key| async { Err(Boom) }).await;
        assert!(matches!(result, Err(RotationError::NoKeysAvailable)));
    }

    #[tokio::test]
    async fn each_key_is_tried_at_most_once() {
        let pool = KeyPool::collect(
            &["one".to_string(), "two".to_string(), "three".to_string()],
            None,
            None,
        );
        let seen: Mutex<Vec<String>> = Mutex::new(Vec::new());

        let result: Result<(), RotationError<Boom>> =
            generate_with_failover(&pool, |key| {
                seen.lock().expect("lock").push(key);
                async { Err(Boom) }
            })
            .await;

        assert!(matches!(
            result,
            Err(RotationError::AllKeysFailed { attempts: 3, .. })
        ));
        let mut seen = seen.into_inner().expect("into inner");
        seen.sort();
        assert_eq!(seen, vec!["one", "three", "two"]);
    }

    #[tokio::test]
    async fn first_success_stops_rotation() {
        let pool = KeyPool::collect(&["one".to_string(), "two".to_string()], None, None);
        let attempts = Mutex::new(0usize);

        let result: Result<&str, RotationError<Boom>> =
            generate_with_failover(&pool, |_key| {
                *attempts.lock().expect("lock") += 1;
                async { Ok("content") }
            })
            .await;

        assert_eq!(result.expect("succeeds"), "content");
        assert_eq!(*attempts.lock().expect("lock"), 1);
    }
}
