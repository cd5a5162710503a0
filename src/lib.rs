//! # ferrous-container
//!
//! Metadata-driven dependency injection: classes are declared once to a
//! [`TypeRegistry`], containers bind labels to values, factories, getters or
//! those classes, and resolve object graphs on demand.
//!
//! ## Features
//!
//! - **Class metadata with inheritance**: subclasses inherit field injections, user data and constructor parameters
//! - **Four binding kinds**: values, factories, lazily cached getters and injectable classes
//! - **Parent containers**: child containers fall back to their parent and re-resolve inherited classes locally
//! - **Cycle detection**: cycles fail with the full resolution path instead of overflowing the stack
//! - **Method interception**: before/after hooks around injected method calls, sync and async
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_container::{Container, LoadOptions, TypeRegistry};
//! use std::sync::Arc;
//!
//! struct Engine {
//!     horsepower: u32,
//! }
//!
//! struct Car {
//!     engine: Arc<Engine>,
//!     name: Arc<String>,
//! }
//!
//! let registry = Arc::new(TypeRegistry::new());
//! registry
//!     .class::<Engine>()
//!     .singleton()
//!     .constructor(|_| Ok(Engine { horsepower: 300 }))
//!     .register()
//!     .unwrap();
//! registry
//!     .class::<Car>()
//!     .injectable()
//!     .constructor_types(["Engine", "car_name"])
//!     .constructor(|args| {
//!         Ok(Car {
//!             engine: args.get(0)?,
//!             name: args.get(1)?,
//!         })
//!     })
//!     .register()
//!     .unwrap();
//!
//! let container = Container::new(registry);
//! container.bind_value("car_name", "roadster".to_string()).unwrap();
//! container.load(&LoadOptions::default()).unwrap();
//!
//! let car = container.get_class::<Car>().unwrap();
//! assert_eq!(car.engine.horsepower, 300);
//! assert_eq!(car.name.as_str(), "roadster");
//! ```
//!
//! ## Child containers
//!
//! ```rust
//! use ferrous_container::{Container, TypeRegistry};
//! use std::sync::Arc;
//!
//! struct Request {
//!     user: Arc<String>,
//! }
//!
//! let registry = Arc::new(TypeRegistry::new());
//! registry
//!     .class::<Request>()
//!     .injectable()
//!     .constructor_types(["user"])
//!     .constructor(|args| Ok(Request { user: args.get(0)? }))
//!     .register()
//!     .unwrap();
//!
//! let root = Container::new(registry.clone());
//! root.bind_value("user", "anonymous".to_string()).unwrap();
//! root.get_class::<Request>().unwrap();
//!
//! let child = Container::new(registry);
//! child.extend(Some(&root));
//! child.bind_value("user", "alice".to_string()).unwrap();
//!
//! // The inherited class resolves its dependencies from the child.
//! assert_eq!(child.get_class::<Request>().unwrap().user.as_str(), "alice");
//! assert_eq!(root.get_class::<Request>().unwrap().user.as_str(), "anonymous");
//! ```

pub mod config;
pub mod container;
pub mod declare;
pub mod error;
pub mod label;
pub mod metadata;

// Internal modules
mod internal;

pub use config::{ContainerOptions, LoadOptions, ValueValidator, DEFAULT_MAX_DEPTH};
pub use container::{ClassLoaded, Container, ContainerMember, MemberKindTag, Producer, SubscriptionId};
pub use declare::{
    add_after_call_method, add_before_call_method, inject_field, inject_method, inject_parameter, mark_injectable,
    value_getter, ClassBuilder, InjectOptions, InjectableOptions,
};
pub use error::{DiError, DiResult};
pub use label::{class_name, container_label, is_container_label, ContainerLabel, Label};
pub use metadata::{
    AfterCallMethod, AnyArc, AnyObject, Args, BeforeCallMethod, ClassInfo, Metadata, MetadataRef, MethodBody,
    MethodContext, MethodParameterOption, ParameterSpec, ReturnValue, TypeRegistry, UserData, ValueGetter,
    CONSTRUCTOR_KEY,
};
