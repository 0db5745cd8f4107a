mod config;
mod eval;
mod loader;
mod registry;
mod rollout;
mod rule;
mod status;
mod test_common;
mod util;
mod vars;

pub use config::*;
pub use eval::*;
pub use loader::{load_yaml, load_yaml_dir, load_yaml_str, LoadError};
pub use registry::{Error, Registry};
pub use rollout::{bucket, bucket_key, BUCKET_COUNT};
pub use rule::*;
pub use status::*;
pub use vars::*;
