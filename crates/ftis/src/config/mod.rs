pub mod loader;
pub mod params;
pub mod schema;

pub use loader::{load_config, load_config_from_str};
pub use params::{
    validate_parameters, Overrides, ParamKind, ParamSpec, ParameterSchema, Parameters, CACHE,
};
pub use schema::{Config, Mode};
