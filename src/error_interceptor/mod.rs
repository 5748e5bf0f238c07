//! Error interceptors: last-chance handlers for errors escaping the routes.

mod unexpected;

pub use unexpected::UnexpectedErrorInterceptor;

use crate::di::{Annotate, Args};
use crate::middleware::Outcome;
use async_trait::async_trait;
use std::sync::Arc;

/// The ErrorInterceptor trait
///
/// Interceptors attached along the matched scopes are consulted from the
/// innermost one outwards. The first whose [`check`](Self::check) accepts the
/// error reports it and then handles it: returning `Ok` swallows the error,
/// returning an error replaces it.
#[async_trait]
pub trait ErrorInterceptor: Send + Sync + 'static {
    fn check(&self, _err: &anyhow::Error) -> bool {
        true
    }

    async fn handle(&self, err: anyhow::Error) -> Outcome;

    fn report(&self, _err: &anyhow::Error) {}
}

impl<T: ErrorInterceptor> Annotate<T> {
    pub fn error_interceptor<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn ErrorInterceptor, _>(|it| it as Arc<dyn ErrorInterceptor>)
            .service_named("ErrorInterceptor", construct)
    }
}

/// Hands `err` to the first interceptor, from the back, that accepts it.
/// Without one the error is returned unchanged.
pub(crate) async fn intercept(interceptors: &[Arc<dyn ErrorInterceptor>], err: anyhow::Error) -> Outcome {
    let Some(interceptor) = interceptors.iter().rev().find(|it| it.check(&err)) else {
        return Err(err);
    };

    interceptor.report(&err);
    interceptor.handle(err).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpError;

    struct Teapot;

    #[async_trait]
    impl ErrorInterceptor for Teapot {
        fn check(&self, err: &anyhow::Error) -> bool {
            err.to_string().contains("tea")
        }

        async fn handle(&self, _err: anyhow::Error) -> Outcome {
            Err(HttpError::custom(418, "I'm a teapot").unwrap().into())
        }
    }

    struct Swallow;

    #[async_trait]
    impl ErrorInterceptor for Swallow {
        async fn handle(&self, _err: anyhow::Error) -> Outcome {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_last_matching_interceptor_handles() {
        let interceptors: Vec<Arc<dyn ErrorInterceptor>> = vec![Arc::new(Swallow), Arc::new(Teapot)];

        let err = intercept(&interceptors, anyhow::anyhow!("out of tea")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<HttpError>().unwrap().status(), 418);

        assert!(intercept(&interceptors, anyhow::anyhow!("coffee")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unhandled_error_passes_through() {
        let interceptors: Vec<Arc<dyn ErrorInterceptor>> = vec![Arc::new(Teapot)];

        let err = intercept(&interceptors, anyhow::anyhow!("coffee")).await.unwrap_err();
        assert_eq!(err.to_string(), "coffee");
    }
}
