use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{Completer, CompleterError, CompleterInfo, CompleterRequest, CompleterResponse, CompletionResult};

/// Holds one named `Completer` per configured provider; resolves an
/// explicit/default/fallback provider by name.
#[derive(Clone)]
pub struct CompleterRegistry {
    completers: Arc<RwLock<HashMap<String, Arc<dyn Completer>>>>,
    default_id: Arc<RwLock<Option<String>>>,
}

impl CompleterRegistry {
    pub fn new(completers: Vec<Arc<dyn Completer>>, default_id: Option<String>) -> Self {
        let map = completers
            .into_iter()
            .map(|c| (c.info().id, c))
            .collect::<HashMap<_, _>>();
        Self {
            completers: Arc::new(RwLock::new(map)),
            default_id: Arc::new(RwLock::new(default_id)),
        }
    }

    pub async fn reload(&self, completers: Vec<Arc<dyn Completer>>, default_id: Option<String>) {
        let map = completers
            .into_iter()
            .map(|c| (c.info().id, c))
            .collect::<HashMap<_, _>>();
        *self.completers.write().await = map;
        *self.default_id.write().await = default_id;
    }

    pub async fn list(&self) -> Vec<CompleterInfo> {
        self.completers.read().await.values().map(|c| c.info()).collect()
    }

    async fn select(&self, provider_id: Option<&str>) -> CompletionResult<Arc<dyn Completer>> {
        let completers = self.completers.read().await;

        if let Some(id) = provider_id {
            return completers
                .get(id)
                .cloned()
                .ok_or_else(|| CompleterError::fatal(id, format!("provider `{id}` is not configured")));
        }

        if let Some(default_id) = self.default_id.read().await.clone() {
            if let Some(completer) = completers.get(&default_id) {
                return Ok(completer.clone());
            }
        }

        completers
            .values()
            .next()
            .cloned()
            .ok_or_else(|| CompleterError::fatal("registry", "no provider configured"))
    }

    pub async fn complete(
        &self,
        provider_id: Option<&str>,
        request: CompleterRequest,
    ) -> CompletionResult<CompleterResponse> {
        let completer = self.select(provider_id).await?;
        completer.complete(request).await
    }

    pub async fn is_available(&self, provider_id: Option<&str>) -> bool {
        match self.select(provider_id).await {
            Ok(completer) => completer.is_available(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockCompleter;

    #[tokio::test]
    async fn falls_back_to_only_configured_provider_when_no_default_set() {
        let mock: Arc<dyn Completer> = Arc::new(MockCompleter::new("solo"));
        let registry = CompleterRegistry::new(vec![mock], None);
        assert!(registry.is_available(None).await);
    }

    #[tokio::test]
    async fn unknown_explicit_provider_id_is_fatal() {
        let registry = CompleterRegistry::new(Vec::new(), None);
        let result = registry.select(Some("missing")).await;
        assert!(result.is_err());
        assert!(!result.unwrap_err().retryable);
    }
}
