//! Dependency injection: tokens, annotations, the metadata store and the
//! injector that builds annotated types on demand.

mod annotate;
mod builder;
mod factory;
mod injector;
pub mod metadata;
mod provider;
mod token;
mod value;

pub use annotate::{
    Annotate, Annotated, Args, InjectionKind, Provide, annotate, annotation_name, injection_kind,
};
pub use builder::InjectorBuilder;
pub use factory::{Factory, Statics};
pub use injector::{Injector, NullInjector, Resolve};
pub use provider::{Class, Provider};
pub use token::{InjectionToken, Token};
pub use value::{Casts, Value};
