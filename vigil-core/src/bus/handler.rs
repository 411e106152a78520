use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::{fmt, future::Future, marker::PhantomData, sync::Arc};

use super::{BusError, MessageHandler};

/// Adapts a typed async closure into a [`MessageHandler`].
///
/// The payload is decoded as JSON before the closure runs; a payload that
/// does not decode is reported as [`BusError::Decode`] and the closure is not
/// invoked.
pub struct JsonHandler<T, F> {
    f: F,
    _payload: PhantomData<fn() -> T>,
}

impl<T, F> fmt::Debug for JsonHandler<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonHandler")
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

#[async_trait]
impl<T, F, Fut> MessageHandler for JsonHandler<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::Result<()>> + Send + 'static,
{
    async fn handle(
        &self,
        subject: &str,
        payload: &[u8],
    ) -> Result<(), BusError> {
        let decoded: T =
            serde_json::from_slice(payload).map_err(|source| {
                BusError::Decode {
                    subject: subject.to_string(),
                    source,
                }
            })?;

        (self.f)(decoded).await.map_err(|err| BusError::Handler {
            subject: subject.to_string(),
            message: err.to_string(),
        })
    }
}

pub fn json_handler<T, F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::Result<()>> + Send + 'static,
{
    Arc::new(JsonHandler {
        f,
        _payload: PhantomData,
    })
}
