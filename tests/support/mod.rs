//! Controllers, middlewares and other building blocks shared by the
//! integration tests.
#![allow(dead_code)]

use octavo::exception::{ErrorKind, HttpError};
use octavo::formatter::{Formatter, FormatterOptions};
use octavo::prelude::*;
use octavo::schema::{number, object, string};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Mutex;

/// Prints pipeline events of the calling test when run with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Declares an application with a silent logger, `providers` and the routes
/// built by `routes`.
macro_rules! application {
    ($name:ident, [$($provider:expr),* $(,)?], $routes:expr) => {
        application!($name, [$($provider),*], $routes, |_config| {});
    };
    ($name:ident, [$($provider:expr),* $(,)?], $routes:expr, |$config:ident| $extra:block) => {
        struct $name;

        #[async_trait]
        impl Application for $name {
            async fn configure(&self, config: &mut ApplicationConfig) -> anyhow::Result<()> {
                config.routes($routes);
                let $config = config;
                $extra;
                Ok(())
            }
        }

        impl Annotated for $name {
            fn annotate() -> octavo::Result<()> {
                Annotate::<$name>::new().application(
                    [Provider::replace::<SilentLogger, Logger>(), $($provider),*],
                    |_| Ok($name),
                )
            }
        }
    };
}

pub struct Ping;

impl Annotated for Ping {
    fn annotate() -> octavo::Result<()> {
        Annotate::<Ping>::new()
            .action("ping", |_this: Arc<Ping>, _ctx| async move { anyhow::Ok("pong") })
            .action("data", |_this: Arc<Ping>, _ctx| async move {
                anyhow::Ok(json!({"ping": "pong"}))
            })
            .action("echo", |_this: Arc<Ping>, ctx: ControllerContext| async move {
                anyhow::Ok(ctx.body())
            })
            .action("nothing", |_this: Arc<Ping>, _ctx| async move { anyhow::Ok(()) })
            .action("me", |_this: Arc<Ping>, ctx: ControllerContext| async move {
                anyhow::Ok(ctx.state("user").unwrap_or(Value::Null))
            })
            .action("visit", |_this: Arc<Ping>, ctx: ControllerContext| async move {
                let session = ctx.session();
                let visits = session.get_as::<u64>("visits").unwrap_or_default() + 1;
                session.set("visits", visits);
                anyhow::Ok(json!({ "visits": visits }))
            })
            .controller(|_| Ok(Ping))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
}

/// In-memory book storage, one per application injector.
#[derive(Default)]
pub struct BookStore {
    books: Mutex<Vec<Book>>,
}

impl BookStore {
    pub fn all(&self) -> Vec<Book> {
        self.books.lock().unwrap().clone()
    }

    pub fn find(&self, id: u64) -> Option<Book> {
        self.books.lock().unwrap().iter().find(|book| book.id == id).cloned()
    }

    pub fn insert(&self, title: String) -> Book {
        let mut books = self.books.lock().unwrap();
        let book = Book {
            id: books.len() as u64 + 1,
            title,
        };
        books.push(book.clone());
        book
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut books = self.books.lock().unwrap();
        let before = books.len();
        books.retain(|book| book.id != id);
        books.len() != before
    }
}

impl Annotated for BookStore {
    fn annotate() -> octavo::Result<()> {
        Annotate::<BookStore>::new().service(|_| Ok(BookStore::default()))
    }
}

fn book_not_found() -> anyhow::Error {
    HttpError::with_message(ErrorKind::NotFound, "Book is not found")
        .named("BookIsNotFound")
        .into()
}

fn book_id(ctx: &ControllerContext) -> u64 {
    ctx.param("id").and_then(|id| id.as_u64()).unwrap_or_default()
}

pub struct Books {
    store: Arc<BookStore>,
}

impl Annotated for Books {
    fn annotate() -> octavo::Result<()> {
        let id = || RequestSchema::new().params(object([("id", number())]));

        Annotate::<Books>::new()
            .inject_param(0, Token::of::<BookStore>())
            .action("index", |this: Arc<Books>, _ctx| async move {
                anyhow::Ok(this.store.all())
            })
            .action("show", |this: Arc<Books>, ctx: ControllerContext| async move {
                this.store.find(book_id(&ctx)).ok_or_else(book_not_found)
            })
            .action("create", |this: Arc<Books>, ctx: ControllerContext| async move {
                let title = ctx.body()["title"].as_str().unwrap_or_default().to_string();
                anyhow::Ok(this.store.insert(title))
            })
            .action("destroy", |this: Arc<Books>, ctx: ControllerContext| async move {
                if this.store.remove(book_id(&ctx)) {
                    anyhow::Ok(())
                } else {
                    Err(book_not_found())
                }
            })
            .request("show", id())
            .request("destroy", id())
            .request("create", RequestSchema::new().body(object([("title", string())])))
            .describe("index", "Lists every book")
            .controller(|args| {
                Ok(Books {
                    store: args.get::<BookStore>(0)?,
                })
            })
    }
}

pub struct Broken;

impl Annotated for Broken {
    fn annotate() -> octavo::Result<()> {
        Annotate::<Broken>::new()
            .action("explode", |_this: Arc<Broken>, _ctx| async move {
                Err::<(), _>(anyhow::anyhow!("database is down"))
            })
            .action("forbidden", |_this: Arc<Broken>, ctx: ControllerContext| async move {
                ctx.set_status(StatusCode::FORBIDDEN);
                anyhow::Ok(())
            })
            .controller(|_| Ok(Broken))
    }
}

/// Adds `X-Brewed-With: tea` to every response below its scope.
pub struct Tea;

#[async_trait]
impl Middleware for Tea {
    async fn exec(&self, ctx: MiddlewareContext, next: Next) -> Outcome {
        let outcome = next.run().await;
        ctx.set_header("X-Brewed-With", "tea")?;
        outcome
    }
}

impl Annotated for Tea {
    fn annotate() -> octavo::Result<()> {
        Annotate::<Tea>::new().middleware(|_| Ok(Tea))
    }
}

pub struct RequireToken;

#[async_trait]
impl Policy for RequireToken {
    async fn exec(&self, ctx: PolicyContext) -> Outcome {
        match ctx.header("x-token") {
            Some("secret") => Ok(()),
            _ => Err(HttpError::unauthorized().into()),
        }
    }
}

impl Annotated for RequireToken {
    fn annotate() -> octavo::Result<()> {
        Annotate::<RequireToken>::new().policy(|_| Ok(RequireToken))
    }
}

pub struct CurrentUser;

#[async_trait]
impl ResolveState for CurrentUser {
    async fn resolve(&self, ctx: StateContext) -> anyhow::Result<Value> {
        let name = ctx.header("x-user").unwrap_or("guest");
        Ok(json!({ "name": name }))
    }
}

impl Annotated for CurrentUser {
    fn annotate() -> octavo::Result<()> {
        Annotate::<CurrentUser>::new().state(|_| Ok(CurrentUser))
    }
}

pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn format(&self, data: &Value) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(data)?)
    }
}

impl Annotated for YamlFormatter {
    fn annotate() -> octavo::Result<()> {
        Annotate::<YamlFormatter>::new().formatter(
            FormatterOptions::new(["application/x-yaml", "text/x-custom-accept"], "application/x-yaml"),
            |_| Ok(YamlFormatter),
        )
    }
}

/// JSON indented with tabs, registered in place of the default formatter.
pub struct TabbedJson;

impl Formatter for TabbedJson {
    fn format(&self, data: &Value) -> anyhow::Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        data.serialize(&mut serializer)?;
        Ok(String::from_utf8(out)?)
    }
}

impl Annotated for TabbedJson {
    fn annotate() -> octavo::Result<()> {
        Annotate::<TabbedJson>::new().formatter(
            FormatterOptions::new(["application/json"], "application/json"),
            |_| Ok(TabbedJson),
        )
    }
}

/// Answers database failures with `503 Service Unavailable`.
pub struct Unavailable;

#[async_trait]
impl ErrorInterceptor for Unavailable {
    fn check(&self, err: &anyhow::Error) -> bool {
        err.to_string().contains("database")
    }

    async fn handle(&self, _err: anyhow::Error) -> Outcome {
        Err(HttpError::service_unavailable().into())
    }
}

impl Annotated for Unavailable {
    fn annotate() -> octavo::Result<()> {
        Annotate::<Unavailable>::new().error_interceptor(|_| Ok(Unavailable))
    }
}
