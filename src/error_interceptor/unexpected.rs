use super::ErrorInterceptor;
use crate::di::{Annotate, Annotated, Token};
use crate::exception::HttpError;
use crate::logger::{Log, Logger};
use crate::middleware::Outcome;
use async_trait::async_trait;
use std::sync::Arc;

/// Reports errors that are not [`HttpError`]s and answers them with
/// `500 Internal Server Error`, hiding their details from the client.
pub struct UnexpectedErrorInterceptor {
    logger: Arc<dyn Log>,
}

impl UnexpectedErrorInterceptor {
    pub fn new(logger: Arc<dyn Log>) -> Self {
        Self {
            logger: logger.scope("UnexpectedErrorInterceptor"),
        }
    }
}

#[async_trait]
impl ErrorInterceptor for UnexpectedErrorInterceptor {
    fn check(&self, err: &anyhow::Error) -> bool {
        !err.is::<HttpError>()
    }

    async fn handle(&self, _err: anyhow::Error) -> Outcome {
        Err(HttpError::internal_server_error().into())
    }

    fn report(&self, err: &anyhow::Error) {
        self.logger.fatal(format!("{err:?}"));
    }
}

impl Annotated for UnexpectedErrorInterceptor {
    fn annotate() -> crate::Result<()> {
        Annotate::<UnexpectedErrorInterceptor>::new()
            .inject_param(0, Token::of::<Logger>())
            .error_interceptor(|args| Ok(UnexpectedErrorInterceptor::new(args.get_dyn::<dyn Log>(0)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_interceptor::intercept;
    use crate::logger::Level;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl Log for Recorder {
        fn log(&self, level: Level, message: &str) {
            self.records.lock().unwrap().push((level, message.to_string()));
        }

        fn scope(&self, _name: &str) -> Arc<dyn Log> {
            Arc::new(Recorder::default())
        }

        fn context(&self, _data: serde_json::Value) -> Arc<dyn Log> {
            Arc::new(Recorder::default())
        }
    }

    #[tokio::test]
    async fn test_unexpected_errors_become_internal() {
        let interceptor = UnexpectedErrorInterceptor {
            logger: Arc::new(Recorder::default()),
        };
        let interceptors: Vec<Arc<dyn ErrorInterceptor>> = vec![Arc::new(interceptor)];

        let err = intercept(&interceptors, anyhow::anyhow!("db is down")).await.unwrap_err();
        let http = err.downcast_ref::<HttpError>().unwrap();
        assert_eq!(http.status(), 500);
        assert_eq!(http.message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_http_errors_are_left_alone() {
        let recorder = Arc::new(Recorder::default());
        let interceptor = UnexpectedErrorInterceptor {
            logger: recorder.clone(),
        };
        let interceptors: Vec<Arc<dyn ErrorInterceptor>> = vec![Arc::new(interceptor)];

        let err = intercept(&interceptors, HttpError::not_found().into()).await.unwrap_err();
        assert_eq!(err.downcast_ref::<HttpError>().unwrap().status(), 404);
        assert!(recorder.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_with_fatal_level() {
        let recorder = Arc::new(Recorder::default());
        let interceptor = UnexpectedErrorInterceptor {
            logger: recorder.clone(),
        };

        interceptor.report(&anyhow::anyhow!("db is down"));
        let records = recorder.records.lock().unwrap();
        assert_eq!(records[0].0, Level::Fatal);
        assert!(records[0].1.contains("db is down"));
    }
}
